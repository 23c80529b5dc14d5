//! World archives (`.lrentdat` and `.node`)
//!
//! An `.lrentdat` body is `GENOMEDL`, a version and one
//! `eCEntityDynamicContext` record whose data section ends with the entity
//! list. A `.node` body is a short spatial header followed by the entities.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::class::{read_class_frame, write_class_frame, ClassFrame, ClassHeader, Frame, G3Class, PropertySet};
use crate::cursor::{Reader, Writer};
use crate::entity::{Entity, EntityGraph};
use crate::genome::{GenomeBody, GenomeFile};
use crate::property::PropertyValue;
use crate::registry::{ClassRegistry, ReadContext, WriteContext};
use crate::types::{BoundingBox, FixedBinary, GuidValue};
use crate::{read_file, source_name, Error, Guid, Result, LRENTDAT_MAGIC, MIN_ARCHIVE_SIZE};

const DYNAMIC_CONTEXT_CLASS: &str = "eCEntityDynamicContext";

/// Header of an `.lrentdat`: the dynamic context minus its entities
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DynamicContext {
    pub version: u16,
    pub header: ClassHeader,
    pub properties: PropertySet,
    pub data_version: u16,
    pub visual_lod_factor: f32,
    pub object_cull_factor: f32,
    pub content_box: BoundingBox,
    pub flags: u8,
    pub table_flags: u16,
    pub table_version: u16,
    pub reserved: u8,
}

impl DynamicContext {
    /// `ID` property
    pub fn id(&self) -> Option<GuidValue> {
        match self.properties.get("ID").map(|p| &p.value) {
            Some(PropertyValue::Guid(g)) => Some(*g),
            _ => None,
        }
    }

    /// `ContextBox` property
    pub fn context_box(&self) -> Option<BoundingBox> {
        match self.properties.get("ContextBox").map(|p| &p.value) {
            Some(PropertyValue::Box(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn set_context_box(&mut self, bounds: BoundingBox) -> bool {
        self.properties.set_value("ContextBox", PropertyValue::Box(bounds))
    }

    fn read(r: &mut Reader<'_>, ctx: &ReadContext<'_>) -> Result<(Self, Vec<(Entity, i32)>)> {
        r.skip(LRENTDAT_MAGIC.len())?;
        let version = r.read_u16()?;

        let Frame::Class(ClassFrame {
            name,
            header,
            mut span,
        }) = read_class_frame(r, ctx)?
        else {
            return Err(r.decode_error("null dynamic context"));
        };
        if name != DYNAMIC_CONTEXT_CLASS {
            return Err(r.decode_error(format!(
                "expected {}, found class '{}'",
                DYNAMIC_CONTEXT_CLASS, name
            )));
        }

        let properties = PropertySet::read(&mut span, ctx)?;
        let data_version = span.read_u16()?;
        let visual_lod_factor = span.read_f32()?;
        let object_cull_factor = span.read_f32()?;
        let content_box = BoundingBox::read(&mut span)?;
        let flags = span.read_u8()?;
        let count = span.read_u32()? as usize;
        let table_flags = span.read_u16()?;
        let table_version = span.read_u16()?;
        let reserved = span.read_u8()?;

        let entities = read_entities(&mut span, ctx, count)?;
        span.expect_end("dynamic context")?;

        let context = Self {
            version,
            header,
            properties,
            data_version,
            visual_lod_factor,
            object_cull_factor,
            content_box,
            flags,
            table_flags,
            table_version,
            reserved,
        };
        Ok((context, entities))
    }

    fn write(&self, w: &mut Writer, graph: &EntityGraph, ctx: &mut WriteContext<'_>) -> Result<()> {
        w.write_bytes(&LRENTDAT_MAGIC);
        w.write_u16(self.version);

        let slot = write_class_frame(w, DYNAMIC_CONTEXT_CLASS, &self.header, ctx)?;
        self.properties.write(w, ctx)?;
        w.write_u16(self.data_version);
        w.write_f32(self.visual_lod_factor);
        w.write_f32(self.object_cull_factor);
        self.content_box.write(w);
        w.write_u8(self.flags);
        w.write_u32(graph.len() as u32);
        w.write_u16(self.table_flags);
        w.write_u16(self.table_version);
        w.write_u8(self.reserved);
        write_entities(w, graph, ctx)?;
        w.finish_len(slot)
    }
}

/// Header of a `.node` archive
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeHeader {
    pub version: u16,
    pub reserved: u16,
    pub node_version: u16,
    pub flags: u8,
    pub boundary: BoundingBox,
    pub spatial: [f32; 15],
}

impl NodeHeader {
    fn read(r: &mut Reader<'_>, ctx: &ReadContext<'_>) -> Result<(Self, Vec<(Entity, i32)>)> {
        let version = r.read_u16()?;
        let count = r.read_u32()? as usize;
        let header = Self {
            version,
            reserved: r.read_u16()?,
            node_version: r.read_u16()?,
            flags: r.read_u8()?,
            boundary: BoundingBox::read(r)?,
            spatial: r.read_f32_array::<15>()?,
        };
        let entities = read_entities(r, ctx, count)?;
        Ok((header, entities))
    }

    fn write(&self, w: &mut Writer, graph: &EntityGraph, ctx: &mut WriteContext<'_>) -> Result<()> {
        w.write_u16(self.version);
        w.write_u32(graph.len() as u32);
        w.write_u16(self.reserved);
        w.write_u16(self.node_version);
        w.write_u8(self.flags);
        self.boundary.write(w);
        w.write_f32_slice(&self.spatial);
        write_entities(w, graph, ctx)
    }
}

fn read_entities(r: &mut Reader<'_>, ctx: &ReadContext<'_>, count: usize) -> Result<Vec<(Entity, i32)>> {
    let mut entities = Vec::with_capacity(count.min(r.remaining() / 64));
    for _ in 0..count {
        entities.push(Entity::read_dynamic(r, ctx)?);
    }
    Ok(entities)
}

fn write_entities(w: &mut Writer, graph: &EntityGraph, ctx: &mut WriteContext<'_>) -> Result<()> {
    for (entity, parent) in graph.to_records() {
        entity.write_record(w, parent, ctx)?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ArchiveKind {
    Lrentdat(DynamicContext),
    Node(NodeHeader),
}

#[derive(Debug, Clone)]
pub struct ArchiveBody {
    pub kind: ArchiveKind,
    pub graph: EntityGraph,
}

impl GenomeBody for ArchiveBody {
    fn read_body(r: &mut Reader<'_>, ctx: &ReadContext<'_>) -> Result<Self> {
        let (kind, records) = if r.peek_at(0, LRENTDAT_MAGIC.len()) == Some(&LRENTDAT_MAGIC[..]) {
            let (context, records) = DynamicContext::read(r, ctx)?;
            (ArchiveKind::Lrentdat(context), records)
        } else {
            let (header, records) = NodeHeader::read(r, ctx)?;
            (ArchiveKind::Node(header), records)
        };
        let graph = EntityGraph::from_records(records, r)?;
        Ok(Self { kind, graph })
    }

    fn write_body(&self, w: &mut Writer, ctx: &mut WriteContext<'_>) -> Result<()> {
        match &self.kind {
            ArchiveKind::Lrentdat(context) => context.write(w, &self.graph, ctx),
            ArchiveKind::Node(header) => header.write(w, &self.graph, ctx),
        }
    }

    fn classes(&self) -> Box<dyn Iterator<Item = &G3Class> + '_> {
        Box::new(self.graph.classes())
    }
}

pub type ArchiveFile = GenomeFile<ArchiveBody>;

impl GenomeFile<ArchiveBody> {
    pub fn graph(&self) -> &EntityGraph {
        &self.body().graph
    }

    pub fn graph_mut(&mut self) -> &mut EntityGraph {
        &mut self.body_mut().graph
    }

    pub fn kind(&self) -> &ArchiveKind {
        &self.body().kind
    }

    pub fn is_lrentdat(&self) -> bool {
        matches!(self.kind(), ArchiveKind::Lrentdat(_))
    }

    /// Give the first root entity a new GUID
    pub fn set_root_guid(&mut self, guid: Guid) -> Result<()> {
        let root = self
            .graph()
            .roots()
            .first()
            .copied()
            .ok_or_else(|| Error::Hierarchy("archive has no root entity".to_string()))?;
        self.graph_mut().set_guid(root, guid)
    }
}

pub fn open_archive(path: &Path, registry: &ClassRegistry) -> Result<ArchiveFile> {
    let data = read_file(path)?;
    open_archive_bytes(&source_name(path), &data, registry)
}

pub fn open_archive_bytes(source: &str, data: &[u8], registry: &ClassRegistry) -> Result<ArchiveFile> {
    if !crate::is_genome_file(data) {
        return Err(Error::format(source, "missing GENOMFLE signature"));
    }
    if data.len() < MIN_ARCHIVE_SIZE {
        return Err(Error::format(
            source,
            format!("{} bytes is too small for an archive", data.len()),
        ));
    }
    let archive = ArchiveFile::from_bytes(source, data, registry)?;
    debug!(file = source, entities = archive.graph().len(), "Opened archive");
    Ok(archive)
}

/// Like [`open_archive`], but logs failures and returns `None`
pub fn open_archive_safe(path: &Path, registry: &ClassRegistry) -> Option<ArchiveFile> {
    match open_archive(path, registry) {
        Ok(archive) => Some(archive),
        Err(e) => {
            warn!(file = %path.display(), error = %e, "Skipping archive");
            None
        }
    }
}
