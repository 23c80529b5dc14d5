//! Configuration command handlers
//!
//! Handles the `configure` subcommand for setting up g3 CLI defaults.

use std::path::PathBuf;

use crate::config::Config;
use anyhow::{bail, Result};

/// Handle the configure command
pub fn handle(data_dir: Option<PathBuf>, enums: Option<PathBuf>, show: bool) -> Result<()> {
    let mut config = Config::load()?;

    if show || (data_dir.is_none() && enums.is_none()) {
        show_config(&config);
        return Ok(());
    }

    if let Some(dir) = data_dir {
        if !dir.is_dir() {
            bail!("{} is not a directory", dir.display());
        }
        config.data_dir = Some(dir);
    }
    if let Some(path) = enums {
        // Validate before storing
        g3::EnumRegistry::load(&path)?;
        config.enums = Some(path);
    }

    config.save()?;
    show_config(&config);
    Ok(())
}

/// Display current configuration
fn show_config(config: &Config) {
    match &config.data_dir {
        Some(dir) => println!("Data directory: {}", dir.display()),
        None => println!("No data directory configured"),
    }
    match &config.enums {
        Some(path) => println!("Enum definitions: {}", path.display()),
        None => println!("No enum definitions configured"),
    }
    println!("Archive extensions: {}", config.archive_extensions.join(", "));

    if let Ok(path) = Config::config_path() {
        println!("Config file: {}", path.display());
    }
}
