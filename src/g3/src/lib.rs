//! # g3
//!
//! Codec for Genome files, the binary container format used by the engine's
//! world archives, templates and resource files.
//!
//! # Format Overview
//!
//! ## Envelope
//!
//! - Bytes 0-7: "GENOMFLE" magic
//! - Bytes 8-9: Version (typically 0x0001)
//! - Bytes 10-13: Offset of the `EF BE AD DE` marker
//! - Bytes 14+: Format-specific body
//! - Marker, then the string table
//!
//! ## String table
//!
//! - Byte 0: Present flag
//! - Bytes 1-4: Entry count
//! - Remaining: `u16` length + bytes per entry
//!
//! ## Example
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = g3::ClassRegistry::with_builtins();
//! let mut archive = g3::open_archive("world.lrentdat".as_ref(), &registry)?;
//!
//! for id in archive.graph().iter_depth_first() {
//!     let entity = archive.graph().get(id).expect("live entity");
//!     println!("{} {}", entity.guid(), entity.name);
//! }
//!
//! let root = archive.graph().roots()[0];
//! archive.graph_mut().set_guid(root, g3::Guid::random())?;
//! archive.save("world.lrentdat".as_ref(), &registry)?;
//! # Ok(())
//! # }
//! ```

mod archive;
pub mod classes;
mod class;
pub mod cursor;
pub mod embedded;
pub mod entity;
pub mod enums;
mod genome;
mod guid;
pub mod lightdata;
mod oneclass;
pub mod property;
mod registry;
mod string_table;
mod template;
pub mod types;

use std::path::PathBuf;

pub use archive::{
    open_archive, open_archive_bytes, open_archive_safe, ArchiveBody, ArchiveFile, ArchiveKind,
    DynamicContext, NodeHeader,
};
pub use class::{ClassBody, ClassHeader, ClassSlot, G3Class, PropertySet};
pub use classes::ClassData;
pub use cursor::{Reader, Writer};
pub use embedded::{
    create_archive, create_empty_lrentdat, create_empty_node, create_file, create_lrgeodat, AuxKind,
};
pub use entity::{
    clear_string_table_safe, DynamicPlacement, Entity, EntityData, EntityGraph, EntityId,
    GuidReference, TemplatePlacement, TransformPolicy,
};
pub use enums::EnumRegistry;
pub use genome::{is_genome_file, probe, GenomeBody, GenomeFile, Layout, Probe};
pub use guid::Guid;
pub use lightdata::LightData;
pub use oneclass::{open_one_class_resource, open_one_class_resource_bytes, OneClassBody, OneClassFile, ResourceKind};
pub use property::{ClassProperty, PropertyType, PropertyValue};
pub use registry::{ClassCodec, ClassRegistry, ReadContext, WriteContext};
pub use string_table::{SlotUsage, StringTable};
pub use template::{
    open_template, open_template_by_name, open_template_bytes, open_template_safe, TemplateBody, TemplateFile,
};

/// Magic bytes at offset 0 of every Genome file: "GENOMFLE"
pub const GENOME_MAGIC: [u8; 8] = *b"GENOMFLE";

/// Magic bytes at offset 14 of an `.lrentdat` archive: "GENOMEDL"
pub const LRENTDAT_MAGIC: [u8; 8] = *b"GENOMEDL";

/// Marker written at the sentinel offset (0xDEADBEEF little-endian)
pub const SENTINEL: [u8; 4] = [0xEF, 0xBE, 0xAD, 0xDE];

/// Size of the envelope header (magic, version, sentinel offset)
pub const HEADER_SIZE: usize = 14;

/// Archives smaller than this cannot hold a single entity
pub const MIN_ARCHIVE_SIZE: usize = 100;

/// Errors from Genome decoding and encoding
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("'{source_name}' is not a valid Genome file: {reason}")]
    Format { source_name: String, reason: String },

    #[error("Failed to decode '{source_name}' at offset {offset:#x}: {reason}")]
    Decode {
        source_name: String,
        offset: usize,
        reason: String,
    },

    #[error("Cannot encode value: {0}")]
    Encode(String),

    #[error("String table index {index} out of range (table has {len} entries)")]
    OutOfRange { index: usize, len: usize },

    #[error("Invalid GUID '{0}'")]
    InvalidGuid(String),

    #[error("Duplicate entity GUID {0}")]
    DuplicateGuid(Guid),

    #[error("Entity already has a class named '{0}'")]
    DuplicateClass(String),

    #[error("Unknown entity handle {0}")]
    UnknownEntity(usize),

    #[error("Invalid entity hierarchy: {0}")]
    Hierarchy(String),

    #[error("Failed to parse enum definitions: {0}")]
    EnumDefinitions(#[from] toml::de::Error),

    #[error("IO error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn format(source_name: &str, reason: impl Into<String>) -> Self {
        Error::Format {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors that mean "this is not (or no longer) a valid file",
    /// as opposed to misuse of the in-memory model
    pub fn is_corrupt_input(&self) -> bool {
        matches!(self, Error::Format { .. } | Error::Decode { .. })
    }
}

pub(crate) fn read_file(path: &std::path::Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn write_file(path: &std::path::Path, data: &[u8]) -> Result<()> {
    std::fs::write(path, data).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn source_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_constants() {
        assert_eq!(hex::encode_upper(GENOME_MAGIC), "47454E4F4D464C45");
        assert_eq!(hex::encode_upper(LRENTDAT_MAGIC), "47454E4F4D45444C");
        assert_eq!(u32::from_le_bytes(SENTINEL), 0xDEAD_BEEF);
    }

    #[test]
    fn test_error_display() {
        let err = Error::format("world.node", "bad signature");
        assert!(err.to_string().contains("'world.node'"));
        assert!(err.is_corrupt_input());

        let err = Error::Decode {
            source_name: "a.lrentdat".to_string(),
            offset: 0x20,
            reason: "size mismatch".to_string(),
        };
        assert!(err.to_string().contains("0x20"));

        let err = Error::OutOfRange { index: 7, len: 3 };
        assert!(err.to_string().contains("out of range"));
        assert!(!err.is_corrupt_input());
    }

    #[test]
    fn test_source_name_uses_file_name() {
        let path = std::path::Path::new("/data/Projects/G3_World_01.lrentdat");
        assert_eq!(source_name(path), "G3_World_01.lrentdat");
    }
}
