//! Configuration management for g3 CLI

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_EXTENSIONS: [&str; 2] = ["lrentdat", "node"];

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Directory searched by `scan` when none is given
    pub data_dir: Option<PathBuf>,

    /// TOML file with enum symbol definitions
    pub enums: Option<PathBuf>,

    /// Archive extensions considered by `scan`
    #[serde(default = "default_extensions")]
    pub archive_extensions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            enums: None,
            archive_extensions: default_extensions(),
        }
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("g3");

        Ok(config_dir.join("config.toml"))
    }

    /// Load configuration from file, or create default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

        toml::from_str(&contents).context("Failed to parse config file")
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory at {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(config_path, contents)
            .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

        Ok(())
    }

    /// Enum definitions from the configured file, or an empty registry
    pub fn enum_registry(&self) -> Result<g3::EnumRegistry> {
        match &self.enums {
            Some(path) => g3::EnumRegistry::load(path)
                .with_context(|| format!("Failed to load enum definitions from {}", path.display())),
            None => Ok(g3::EnumRegistry::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config {
            data_dir: Some(PathBuf::from("/games/g3/Data")),
            enums: None,
            archive_extensions: vec!["node".to_string()],
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.archive_extensions, ["lrentdat", "node"]);
    }

    #[test]
    fn test_extensions_default_when_omitted() {
        let config: Config = toml::from_str("data_dir = \"/data\"\n").unwrap();
        assert_eq!(config.archive_extensions.len(), 2);
    }
}
