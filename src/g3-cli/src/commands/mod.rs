//! Command handlers for g3 CLI
//!
//! Each subcommand has its own module with handler functions. Files are
//! opened through [`load`], which picks the body type from the file's
//! extension and leading bytes.

pub mod configure;
pub mod dump;
pub mod guid;
pub mod info;
pub mod lightdata;
pub mod new;
pub mod roundtrip;
pub mod scan;
pub mod strings;

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use g3::{
    open_archive_bytes, open_one_class_resource_bytes, open_template_bytes, probe, ArchiveFile,
    ClassRegistry, EntityGraph, OneClassFile, Probe, ResourceKind, StringTable, TemplateFile,
};

/// A decoded Genome file of any supported kind
pub enum Loaded {
    Archive(ArchiveFile),
    Template(TemplateFile),
    OneClass(OneClassFile),
}

fn is_template(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tple"))
}

pub fn load(path: &Path, registry: &ClassRegistry) -> Result<Loaded> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path.display().to_string();

    // Template bodies can look like a class record, so trust the extension first
    let loaded = if is_template(path) {
        Loaded::Template(open_template_bytes(&name, &data, registry)?)
    } else {
        match probe(&data) {
            Probe::NotGenome => match ResourceKind::from_path(path) {
                Some(kind) => Loaded::OneClass(open_one_class_resource_bytes(&name, &data, kind, registry)?),
                None => bail!("{} is not a Genome file", path.display()),
            },
            Probe::OneClass => Loaded::OneClass(OneClassFile::from_bytes(&name, &data, registry)?),
            Probe::Lrentdat | Probe::Genome => Loaded::Archive(open_archive_bytes(&name, &data, registry)?),
        }
    };
    Ok(loaded)
}

impl Loaded {
    pub fn kind_label(&self) -> String {
        match self {
            Loaded::Archive(a) if a.is_lrentdat() => "archive (lrentdat)".to_string(),
            Loaded::Archive(_) => "archive (node)".to_string(),
            Loaded::Template(_) => "template".to_string(),
            Loaded::OneClass(f) => format!("one-class ({})", f.class().name),
        }
    }

    pub fn version(&self) -> u16 {
        match self {
            Loaded::Archive(f) => f.version,
            Loaded::Template(f) => f.version,
            Loaded::OneClass(f) => f.version,
        }
    }

    pub fn strings(&self) -> &StringTable {
        match self {
            Loaded::Archive(f) => f.strings(),
            Loaded::Template(f) => f.strings(),
            Loaded::OneClass(f) => f.strings(),
        }
    }

    pub fn graph(&self) -> Option<&EntityGraph> {
        match self {
            Loaded::Archive(f) => Some(f.graph()),
            Loaded::Template(f) => Some(f.graph()),
            Loaded::OneClass(_) => None,
        }
    }

    pub fn to_bytes(&self, registry: &ClassRegistry) -> g3::Result<Vec<u8>> {
        match self {
            Loaded::Archive(f) => f.to_bytes(registry),
            Loaded::Template(f) => f.to_bytes(registry),
            Loaded::OneClass(f) => f.to_bytes(registry),
        }
    }

    pub fn save(&self, path: &Path, registry: &ClassRegistry) -> g3::Result<()> {
        match self {
            Loaded::Archive(f) => f.save(path, registry),
            Loaded::Template(f) => f.save(path, registry),
            Loaded::OneClass(f) => f.save(path, registry),
        }
    }

    pub fn clear_string_table(&mut self, force: bool) -> Result<(), BTreeSet<String>> {
        match self {
            Loaded::Archive(f) => f.clear_string_table(force),
            Loaded::Template(f) => f.clear_string_table(force),
            Loaded::OneClass(f) => f.clear_string_table(force),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_picks_body_type() {
        let registry = ClassRegistry::with_builtins();
        let dir = tempfile::tempdir().unwrap();

        let node = dir.path().join("a.node");
        g3::create_empty_node(&registry).unwrap().save(&node, &registry).unwrap();
        assert!(matches!(load(&node, &registry).unwrap(), Loaded::Archive(_)));

        let sec = g3::create_file(&dir.path().join("a"), g3::AuxKind::Sector).unwrap();
        let loaded = load(&sec, &registry).unwrap();
        assert_eq!(loaded.kind_label(), "one-class (gCSector)");
        assert!(loaded.graph().is_none());

        // Class record without the Genome header
        let bare = dir.path().join("b.sec");
        let data = g3::cursor::decode_hex(g3::embedded::SEC_HEX).unwrap();
        std::fs::write(&bare, &data[g3::HEADER_SIZE..]).unwrap();
        assert_eq!(load(&bare, &registry).unwrap().kind_label(), "one-class (gCSector)");

        let junk = dir.path().join("junk.node");
        std::fs::write(&junk, b"not a genome file").unwrap();
        assert!(load(&junk, &registry).is_err());
    }
}
