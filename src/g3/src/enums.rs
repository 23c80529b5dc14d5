//! Symbolic names for enum-backed properties
//!
//! Only used for presentation; the wire value is always the raw integer.
//!
//! Definitions are TOML tables keyed by enum type:
//!
//! ```toml
//! [gEDirection]
//! gEDirection_Forward = 1
//! gEDirection_Back = 2
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::{read_file, Error, Result};

#[derive(Debug, Clone, Default)]
pub struct EnumRegistry {
    by_value: HashMap<String, BTreeMap<i32, String>>,
    by_symbol: HashMap<String, HashMap<String, i32>>,
}

impl EnumRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let tables: HashMap<String, BTreeMap<String, i32>> = toml::from_str(text)?;
        let mut registry = Self::new();
        for (enum_type, entries) in tables {
            for (symbol, value) in entries {
                registry.insert(&enum_type, value, symbol);
            }
        }
        Ok(registry)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = read_file(path)?;
        let text = String::from_utf8(bytes).map_err(|e| Error::format(&path.display().to_string(), e.to_string()))?;
        Self::from_toml_str(&text)
    }

    pub fn insert(&mut self, enum_type: &str, value: i32, symbol: impl Into<String>) {
        let symbol = symbol.into();
        self.by_symbol
            .entry(enum_type.to_string())
            .or_default()
            .insert(symbol.clone(), value);
        self.by_value
            .entry(enum_type.to_string())
            .or_default()
            .insert(value, symbol);
    }

    pub fn symbol(&self, enum_type: &str, value: i32) -> Option<&str> {
        self.by_value.get(enum_type)?.get(&value).map(String::as_str)
    }

    pub fn value(&self, enum_type: &str, symbol: &str) -> Option<i32> {
        self.by_symbol.get(enum_type)?.get(symbol).copied()
    }

    /// Symbol when known, the bare number otherwise
    pub fn describe(&self, enum_type: &str, value: i32) -> String {
        match self.symbol(enum_type, value) {
            Some(symbol) => symbol.to_string(),
            None => value.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_value.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFS: &str = r#"
[gEDirection]
gEDirection_Forward = 1
gEDirection_Back = 2

[gEEntityType]
gEEntityType_Game = 0
"#;

    #[test]
    fn test_lookup_both_ways() {
        let registry = EnumRegistry::from_toml_str(DEFS).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.symbol("gEDirection", 2), Some("gEDirection_Back"));
        assert_eq!(registry.value("gEEntityType", "gEEntityType_Game"), Some(0));
        assert_eq!(registry.describe("gEDirection", 9), "9");
        assert_eq!(registry.describe("gEUnknown", 1), "1");
    }

    #[test]
    fn test_bad_toml() {
        let err = EnumRegistry::from_toml_str("[gEDirection]\nForward = \"one\"").unwrap_err();
        assert!(matches!(err, Error::EnumDefinitions(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enums.toml");
        std::fs::write(&path, DEFS).unwrap();
        let registry = EnumRegistry::load(&path).unwrap();
        assert!(!registry.is_empty());
    }
}
