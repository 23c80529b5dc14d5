//! `roundtrip` command: decode and re-encode without touching the file

use std::path::Path;

use anyhow::{Context, Result};
use g3::ClassRegistry;

use super::load;

/// Returns whether the re-encoded bytes equal the input
pub fn handle(input: &Path) -> Result<bool> {
    let registry = ClassRegistry::with_builtins();
    let original = std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let loaded = load(input, &registry)?;
    let encoded = loaded
        .to_bytes(&registry)
        .with_context(|| format!("Failed to re-encode {}", input.display()))?;

    match first_difference(&original, &encoded) {
        None => {
            println!("{}: identical ({} bytes)", input.display(), original.len());
            Ok(true)
        }
        Some(offset) => {
            println!(
                "{}: differs at offset {:#x} ({} -> {} bytes)",
                input.display(),
                offset,
                original.len(),
                encoded.len()
            );
            Ok(false)
        }
    }
}

fn first_difference(a: &[u8], b: &[u8]) -> Option<usize> {
    a.iter()
        .zip(b)
        .position(|(x, y)| x != y)
        .or_else(|| (a.len() != b.len()).then(|| a.len().min(b.len())))
}
