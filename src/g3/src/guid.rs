//! 128-bit identifiers
//!
//! Text form is `{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}`. The first three
//! groups are stored little-endian in the 16 raw bytes, the rest in order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

/// Byte positions of the 32 hex digits, in text order
const TEXT_ORDER: [usize; 16] = [3, 2, 1, 0, 5, 4, 7, 6, 8, 9, 10, 11, 12, 13, 14, 15];

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Guid([u8; 16]);

impl Guid {
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub const fn nil() -> Self {
        Self([0; 16])
    }

    pub fn random() -> Self {
        Self(rand::random())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn is_nil(&self) -> bool {
        self.0 == [0; 16]
    }

    /// Parse `{...}` or bare 8-4-4-4-12 text, case-insensitive
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let inner = match (trimmed.strip_prefix('{'), trimmed.strip_suffix('}')) {
            (Some(_), Some(_)) => &trimmed[1..trimmed.len() - 1],
            (None, None) => trimmed,
            _ => return Err(Error::InvalidGuid(text.to_string())),
        };

        let groups: Vec<&str> = inner.split('-').collect();
        let lengths: Vec<usize> = groups.iter().map(|g| g.len()).collect();
        if lengths != [8, 4, 4, 4, 12] {
            return Err(Error::InvalidGuid(text.to_string()));
        }

        let digits: String = groups.concat();
        let decoded = hex::decode(&digits).map_err(|_| Error::InvalidGuid(text.to_string()))?;

        let mut bytes = [0u8; 16];
        for (value, &slot) in decoded.iter().zip(TEXT_ORDER.iter()) {
            bytes[slot] = *value;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b: Vec<u8> = TEXT_ORDER.iter().map(|&i| self.0[i]).collect();
        write!(
            f,
            "{{{}-{}-{}-{}-{}}}",
            hex::encode_upper(&b[0..4]),
            hex::encode_upper(&b[4..6]),
            hex::encode_upper(&b[6..8]),
            hex::encode_upper(&b[8..10]),
            hex::encode_upper(&b[10..16])
        )
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self)
    }
}

impl FromStr for Guid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Guid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Guid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Guid::parse(&text).map_err(serde::de::Error::custom)
    }
}
