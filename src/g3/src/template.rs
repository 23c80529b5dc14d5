//! Template files (`.tple`)
//!
//! Body: `u16 version`, `u32 entity count`, then template entity records
//! (`u16 version`, `bCGuid` id, `bCGuid` reference, `u16 name`, classes,
//! `i32 parent index`).

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::class::G3Class;
use crate::cursor::{Reader, Writer};
use crate::entity::{Entity, EntityData, EntityGraph, EntityId};
use crate::genome::{GenomeBody, GenomeFile};
use crate::registry::{ClassRegistry, ReadContext, WriteContext};
use crate::{read_file, source_name, Result};

#[derive(Debug, Clone)]
pub struct TemplateBody {
    pub version: u16,
    pub graph: EntityGraph,
}

impl Default for TemplateBody {
    fn default() -> Self {
        Self {
            version: 1,
            graph: EntityGraph::new(),
        }
    }
}

impl GenomeBody for TemplateBody {
    fn read_body(r: &mut Reader<'_>, ctx: &ReadContext<'_>) -> Result<Self> {
        let version = r.read_u16()?;
        let count = r.read_u32()? as usize;
        let mut records = Vec::with_capacity(count.min(r.remaining() / 32));
        for _ in 0..count {
            records.push(Entity::read_template(r, ctx)?);
        }
        let graph = EntityGraph::from_records(records, r)?;
        Ok(Self { version, graph })
    }

    fn write_body(&self, w: &mut Writer, ctx: &mut WriteContext<'_>) -> Result<()> {
        w.write_u16(self.version);
        w.write_u32(self.graph.len() as u32);
        for (entity, parent) in self.graph.to_records() {
            entity.write_record(w, parent, ctx)?;
        }
        Ok(())
    }

    fn classes(&self) -> Box<dyn Iterator<Item = &G3Class> + '_> {
        Box::new(self.graph.classes())
    }
}

pub type TemplateFile = GenomeFile<TemplateBody>;

impl GenomeFile<TemplateBody> {
    pub fn graph(&self) -> &EntityGraph {
        &self.body().graph
    }

    pub fn graph_mut(&mut self) -> &mut EntityGraph {
        &mut self.body_mut().graph
    }

    /// The item entity: first root of the template
    pub fn item(&self) -> Option<EntityId> {
        self.graph().roots().first().copied()
    }

    /// Name of the item entity
    pub fn item_name(&self) -> Option<&str> {
        let id = self.item()?;
        self.graph().get(id).map(|e| e.name.as_str())
    }

    /// Entity named by the item's reference GUID
    ///
    /// A nil reference means the item is its own reference. `None` when the
    /// reference points outside this file.
    pub fn reference(&self) -> Option<EntityId> {
        let item = self.item()?;
        match &self.graph().get(item)?.data {
            EntityData::Template(t) if !t.reference.guid.is_nil() => self.graph().by_guid(&t.reference.guid),
            _ => Some(item),
        }
    }
}

pub fn open_template(path: &Path, registry: &ClassRegistry) -> Result<TemplateFile> {
    let data = read_file(path)?;
    open_template_bytes(&source_name(path), &data, registry)
}

pub fn open_template_bytes(source: &str, data: &[u8], registry: &ClassRegistry) -> Result<TemplateFile> {
    TemplateFile::from_bytes(source, data, registry)
}

/// Like [`open_template`], but logs failures and returns `None`
pub fn open_template_safe(path: &Path, registry: &ClassRegistry) -> Option<TemplateFile> {
    match open_template(path, registry) {
        Ok(template) => Some(template),
        Err(e) => {
            warn!(file = %path.display(), error = %e, "Skipping template");
            None
        }
    }
}

/// First template among `files` whose item is called `name`
///
/// Only files whose name contains `name` are opened. Deleted (`_deleted*`)
/// and test (`Testzeug_*`) templates are skipped, as are unreadable files.
pub fn open_template_by_name<P: AsRef<Path>>(
    files: &[P],
    name: &str,
    registry: &ClassRegistry,
) -> Option<(PathBuf, TemplateFile)> {
    files.iter().map(AsRef::as_ref).find_map(|path| {
        let file_name = path.file_name()?.to_str()?;
        if !file_name.contains(name) || file_name.starts_with("_deleted") || file_name.starts_with("Testzeug_") {
            return None;
        }
        match open_template(path, registry) {
            Ok(template) if template.item_name() == Some(name) => Some((path.to_path_buf(), template)),
            Ok(_) => None,
            Err(e) => {
                info!(file = %path.display(), error = %e, "Failed to open template");
                None
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::PropertySet;
    use crate::classes::ClassData;
    use crate::entity::EntityData;
    use crate::property::{ClassProperty, PropertyValue};
    use crate::types::GuidValue;
    use crate::Guid;

    fn named(name: &str) -> TemplateFile {
        let mut body = TemplateBody::default();
        body.graph.insert(Entity::new_template(Guid::random(), name), None).unwrap();
        TemplateFile::new(body)
    }

    #[test]
    fn test_record_byte_layout() {
        let bytes = hex::decode(concat!(
            "47454E4F4D464C450100",
            "48000000", // sentinel
            "0100",     // body version
            "01000000", // entity count
            "5300",     // entity version
            "0102030405060708090A0B0C0D0E0F10",
            "01000000", // id valid
            "00000000000000000000000000000000",
            "00000000", // reference invalid
            "0000",     // name
            "00000000", // classes
            "FFFFFFFF", // parent
            "EFBEADDE",
            "01010000000800",
            "49745F53776F7264",
        ))
        .unwrap();
        let registry = ClassRegistry::with_builtins();
        let file = open_template_bytes("It_Sword.tple", &bytes, &registry).unwrap();

        let item = file.item().unwrap();
        let entity = file.graph().get(item).unwrap();
        assert_eq!(file.item_name(), Some("It_Sword"));
        assert_eq!(
            entity.guid(),
            Guid::from_bytes([1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16])
        );
        match &entity.data {
            EntityData::Template(t) => {
                assert_eq!(t.version, 0x53);
                assert!(t.guid_valid);
                assert!(t.reference.guid.is_nil());
                assert!(!t.reference.valid);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(file.reference(), Some(item));
        assert_eq!(file.to_bytes(&registry).unwrap(), bytes);
    }

    #[test]
    fn test_reference_follows_guid() {
        let mut file = sample();
        let item = file.item().unwrap();
        let child = file.graph().children(item)[0];
        let child_guid = file.graph().get(child).unwrap().guid();
        assert_eq!(file.reference(), None);

        if let EntityData::Template(t) = &mut file.graph_mut().get_mut(item).unwrap().data {
            t.reference = GuidValue::new(child_guid);
        }
        assert_eq!(file.reference(), Some(child));
    }

    #[test]
    fn test_open_by_name_skips_decoys() {
        let registry = ClassRegistry::with_builtins();
        let dir = tempfile::tempdir().unwrap();
        let save = |file_name: &str, template: &TemplateFile| {
            let path = dir.path().join(file_name);
            template.save(&path, &registry).unwrap();
            path
        };

        let deleted = save("_deleted_It_Sword.tple", &named("It_Sword"));
        let other = save("It_Sword_Old.tple", &named("It_Sword_Old"));
        let broken = dir.path().join("It_Sword_Broken.tple");
        std::fs::write(&broken, b"GENOMFLE").unwrap();
        let wanted = named("It_Sword");
        let path = save("It_Sword.tple", &wanted);

        let files = [deleted, other, broken, path.clone()];
        let (found_path, found) = open_template_by_name(&files, "It_Sword", &registry).unwrap();
        assert_eq!(found_path, path);
        assert_eq!(found.item_name(), Some("It_Sword"));
        assert!(open_template_by_name(&files, "It_Axe", &registry).is_none());
    }

    #[test]
    fn test_safe_open_failure() {
        let registry = ClassRegistry::new();
        assert!(open_template_safe(Path::new("/nonexistent/x.tple"), &registry).is_none());
    }

    fn sample() -> TemplateFile {
        let mut body = TemplateBody::default();
        let mut item = Entity::new_template(Guid::random(), "It_Sword");
        if let EntityData::Template(t) = &mut item.data {
            t.reference = GuidValue::new(Guid::random());
        }
        let mut props = PropertySet::default();
        props.upsert(ClassProperty::new(
            "MeshFileName",
            "bCString",
            PropertyValue::String("It_Sword.xcmsh".to_string()),
        ));
        item.add_class(G3Class::new("eCVisualMeshStatic_PS", props, 1, ClassData::Empty))
            .unwrap();
        let root = body.graph.insert(item, None).unwrap();
        body.graph
            .insert(Entity::new_template(Guid::random(), "It_Sword_Child"), Some(root))
            .unwrap();
        TemplateFile::new(body)
    }

    #[test]
    fn test_template_roundtrip() {
        let registry = ClassRegistry::with_builtins();
        let file = sample();
        let bytes = file.to_bytes(&registry).unwrap();

        let back = open_template_bytes("It_Sword.tple", &bytes, &registry).unwrap();
        assert_eq!(back.item_name(), Some("It_Sword"));
        assert_eq!(back.graph().len(), 2);
        let item = back.item().unwrap();
        let mesh = back.graph().get(item).unwrap().class("eCVisualMeshStatic_PS").unwrap();
        assert_eq!(
            mesh.property("MeshFileName").map(|p| &p.value),
            Some(&PropertyValue::String("It_Sword.xcmsh".to_string()))
        );
        assert_eq!(back.to_bytes(&registry).unwrap(), bytes);
    }
}
