//! `guid` command

use anyhow::{Context, Result};
use g3::Guid;

pub fn handle(text: Option<&str>, count: usize) -> Result<()> {
    match text {
        Some(text) => {
            let guid = Guid::parse(text).with_context(|| format!("Cannot parse '{}'", text))?;
            println!("{}", guid);
            println!("bytes: {}", hex_bytes(&guid));
        }
        None => {
            for _ in 0..count {
                println!("{}", Guid::random());
            }
        }
    }
    Ok(())
}

/// Raw on-disk byte order, space separated
fn hex_bytes(guid: &Guid) -> String {
    guid.as_bytes()
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
