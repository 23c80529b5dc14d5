//! Exported static lighting for one entity
//!
//! Layout: `u16` name length + name, `u16` GUID text length + GUID text
//! (usually braced), then the static light records, kept verbatim.

use std::path::Path;

use serde::Serialize;

use crate::cursor::{Reader, Writer};
use crate::{read_file, source_name, write_file, Guid, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LightData {
    pub name: String,
    pub guid_text: String,
    #[serde(serialize_with = "serialize_len")]
    pub records: Vec<u8>,
}

fn serialize_len<S: serde::Serializer>(bytes: &[u8], s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&format!("{} bytes", bytes.len()))
}

impl LightData {
    pub fn new(name: impl Into<String>, guid: Guid, records: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            guid_text: guid.to_string(),
            records,
        }
    }

    /// Entity the lighting belongs to
    pub fn guid(&self) -> Result<Guid> {
        Guid::parse(&self.guid_text)
    }

    pub fn read(r: &mut Reader<'_>) -> Result<Self> {
        let name = r.read_str()?;
        let guid_text = r.read_str()?;
        let records = r.read_bytes(r.remaining())?.to_vec();
        Ok(Self {
            name,
            guid_text,
            records,
        })
    }

    pub fn write(&self, w: &mut Writer) -> Result<()> {
        w.write_str(&self.name)?;
        w.write_str(&self.guid_text)?;
        w.write_bytes(&self.records);
        Ok(())
    }

    pub fn from_bytes(source: &str, data: &[u8]) -> Result<Self> {
        Self::read(&mut Reader::new(source, data))
    }

    pub fn open(path: &Path) -> Result<Self> {
        let data = read_file(path)?;
        Self::from_bytes(&source_name(path), &data)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(self.records.len() + 64);
        self.write(&mut w)?;
        Ok(w.into_inner())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_file(path, &self.to_bytes()?)
    }
}
