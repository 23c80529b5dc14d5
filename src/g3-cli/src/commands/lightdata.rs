//! `lightdata` command

use std::path::Path;

use anyhow::{Context, Result};
use g3::LightData;

pub fn handle(input: &Path) -> Result<()> {
    let light = LightData::open(input).with_context(|| format!("Failed to read {}", input.display()))?;

    println!("Entity: {}", light.name);
    match light.guid() {
        Ok(guid) => println!("GUID:   {}", guid),
        Err(_) => println!("GUID:   {} (unparseable)", light.guid_text),
    }
    println!("Light records: {} bytes", light.records.len());
    Ok(())
}
