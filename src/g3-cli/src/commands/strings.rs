//! `strings` command: list or clear the string table

use std::path::Path;

use anyhow::{bail, Context, Result};
use g3::ClassRegistry;

use super::load;

pub fn handle(input: &Path, clear: bool, force: bool) -> Result<()> {
    let registry = ClassRegistry::with_builtins();
    let mut loaded = load(input, &registry)?;

    if !clear {
        for (index, s) in loaded.strings().iter() {
            println!("{:5}  {}", index, s);
        }
        return Ok(());
    }

    let before = loaded.strings().len();
    if let Err(blocking) = loaded.clear_string_table(force) {
        let names: Vec<&str> = blocking.iter().map(String::as_str).collect();
        bail!(
            "Not clearing: undecoded data in {} may reference the table; use --force to clear anyway",
            names.join(", ")
        );
    }

    loaded
        .save(input, &registry)
        .with_context(|| format!("Failed to save {}", input.display()))?;
    println!(
        "{}: {} strings before, {} after rebuild",
        input.display(),
        before,
        load(input, &registry)?.strings().len()
    );
    Ok(())
}
