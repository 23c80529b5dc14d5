//! Files whose body is exactly one class record
//!
//! Resources (meshes, materials, animations), layer files and the
//! geometry/template contexts all share this shape. Some resources are
//! stored bare: the class record, then the marker and string table, with no
//! Genome header. They are written back the same way.

use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::class::{read_class, write_class, G3Class};
use crate::cursor::{Reader, Writer};
use crate::genome::{probe, GenomeBody, GenomeFile, Probe};
use crate::registry::{ClassRegistry, ReadContext, WriteContext};
use crate::{read_file, source_name, Error, Result};

/// Kinds of one-class files, by contained class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResourceKind {
    Mesh,
    Material,
    LodMesh,
    CollisionMesh,
    AnimationActor,
    AnimationMotion,
    GeometryContext,
    TemplateContext,
    DynamicLayer,
    GeometryLayer,
    TemplateLayer,
    Sector,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 12] = [
        ResourceKind::Mesh,
        ResourceKind::Material,
        ResourceKind::LodMesh,
        ResourceKind::CollisionMesh,
        ResourceKind::AnimationActor,
        ResourceKind::AnimationMotion,
        ResourceKind::GeometryContext,
        ResourceKind::TemplateContext,
        ResourceKind::DynamicLayer,
        ResourceKind::GeometryLayer,
        ResourceKind::TemplateLayer,
        ResourceKind::Sector,
    ];

    pub fn class_name(self) -> &'static str {
        match self {
            ResourceKind::Mesh => "eCResourceMeshComplex_PS",
            ResourceKind::Material => "eCResourceShaderMaterial_PS",
            ResourceKind::LodMesh => "eCResourceMeshLoD_PS",
            ResourceKind::CollisionMesh => "eCResourceCollisionMesh_PS",
            ResourceKind::AnimationActor => "eCResourceAnimationActor_PS",
            ResourceKind::AnimationMotion => "eCResourceAnimationMotion_PS",
            ResourceKind::GeometryContext => "eCGeometrySpatialContext",
            ResourceKind::TemplateContext => "eCEntityTemplateContext",
            ResourceKind::DynamicLayer => "gCDynamicLayer",
            ResourceKind::GeometryLayer => "gCGeometryLayer",
            ResourceKind::TemplateLayer => "gCTemplateLayer",
            ResourceKind::Sector => "gCSector",
        }
    }

    /// File extension without the dot
    pub fn extension(self) -> &'static str {
        match self {
            ResourceKind::Mesh => "xcmsh",
            ResourceKind::Material => "xshmat",
            ResourceKind::LodMesh => "xlmsh",
            ResourceKind::CollisionMesh => "xcom",
            ResourceKind::AnimationActor => "xact",
            ResourceKind::AnimationMotion => "xmot",
            ResourceKind::GeometryContext => "lrgeodat",
            ResourceKind::TemplateContext => "lrtpldat",
            ResourceKind::DynamicLayer => "lrent",
            ResourceKind::GeometryLayer => "lrgeo",
            ResourceKind::TemplateLayer => "lrtpl",
            ResourceKind::Sector => "sec",
        }
    }

    pub fn from_class_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.class_name() == name)
    }

    /// Case-insensitive, with or without the leading dot
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.');
        Self::ALL
            .into_iter()
            .find(|k| k.extension().eq_ignore_ascii_case(ext))
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

#[derive(Debug, Clone)]
pub struct OneClassBody {
    pub class: G3Class,
}

impl GenomeBody for OneClassBody {
    fn read_body(r: &mut Reader<'_>, ctx: &ReadContext<'_>) -> Result<Self> {
        let class = read_class(r, ctx)?.ok_or_else(|| r.decode_error("file holds a null class record"))?;
        Ok(Self { class })
    }

    fn write_body(&self, w: &mut Writer, ctx: &mut WriteContext<'_>) -> Result<()> {
        write_class(w, &self.class, ctx)
    }

    fn classes(&self) -> Box<dyn Iterator<Item = &G3Class> + '_> {
        Box::new(std::iter::once(&self.class))
    }
}

pub type OneClassFile = GenomeFile<OneClassBody>;

impl GenomeFile<OneClassBody> {
    pub fn class(&self) -> &G3Class {
        &self.body().class
    }

    pub fn class_mut(&mut self) -> &mut G3Class {
        &mut self.body_mut().class
    }

    pub fn kind(&self) -> Option<ResourceKind> {
        ResourceKind::from_class_name(&self.class().name)
    }
}

pub fn open_one_class_resource(path: &Path, kind: ResourceKind, registry: &ClassRegistry) -> Result<OneClassFile> {
    let data = read_file(path)?;
    open_one_class_resource_bytes(&source_name(path), &data, kind, registry)
}

pub fn open_one_class_resource_bytes(
    source: &str,
    data: &[u8],
    kind: ResourceKind,
    registry: &ClassRegistry,
) -> Result<OneClassFile> {
    let file = match probe(data) {
        Probe::NotGenome => OneClassFile::from_bare_bytes(source, data, bare_record_len(source, data)?, registry)?,
        _ => OneClassFile::from_bytes(source, data, registry)?,
    };
    let found = &file.class().name;
    if found != kind.class_name() {
        return Err(Error::format(
            source,
            format!("expected a {} class, found '{}'", kind.class_name(), found),
        ));
    }
    debug!(
        file = source,
        class = %found,
        opaque = file.class().is_opaque(),
        layout = ?file.layout(),
        "Opened one-class file"
    );
    Ok(file)
}

/// Offset of the span length in a present class record
const SPAN_LEN_OFFSET: usize = 15;

/// Length of the class record at the start of `data`, read from its frame
fn bare_record_len(source: &str, data: &[u8]) -> Result<usize> {
    let mut r = Reader::new(source, data);
    r.skip(2)?;
    if !r.read_bool()? {
        return Err(Error::format(source, "neither a Genome file nor a class record"));
    }
    r.skip(SPAN_LEN_OFFSET - r.position())?;
    let span = r.read_u32()? as usize;
    Ok(r.position() + span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::decode_hex;
    use crate::embedded::{LRGEODAT_HEX, LRTPL_HEX, SEC_HEX};
    use crate::genome::Layout;
    use crate::property::PropertyValue;
    use crate::types::BoundingBox;
    use crate::{ClassData, HEADER_SIZE};

    #[test]
    fn test_kind_lookup() {
        assert_eq!(ResourceKind::from_extension(".XCMSH"), Some(ResourceKind::Mesh));
        assert_eq!(ResourceKind::from_extension("lrgeodat"), Some(ResourceKind::GeometryContext));
        assert_eq!(ResourceKind::from_extension("tple"), None);
        assert_eq!(
            ResourceKind::from_class_name("gCSector"),
            Some(ResourceKind::Sector)
        );
        assert_eq!(
            ResourceKind::from_path(Path::new("World/G3_World_01.lrtpl")),
            Some(ResourceKind::TemplateLayer)
        );
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::from_class_name(kind.class_name()), Some(kind));
            assert_eq!(ResourceKind::from_extension(kind.extension()), Some(kind));
        }
    }

    #[test]
    fn test_open_geometry_context() {
        let registry = ClassRegistry::with_builtins();
        let data = decode_hex(LRGEODAT_HEX).unwrap();
        let file =
            open_one_class_resource_bytes("x.lrgeodat", &data, ResourceKind::GeometryContext, &registry)
                .unwrap();
        assert_eq!(file.kind(), Some(ResourceKind::GeometryContext));
        assert_eq!(
            file.class().property("ContextBox").map(|p| &p.value),
            Some(&PropertyValue::Box(BoundingBox::empty()))
        );
        assert!(matches!(file.class().data(), Some(ClassData::GeometryContext(_))));
        assert_eq!(file.to_bytes(&registry).unwrap(), data);
    }

    #[test]
    fn test_sector_flags() {
        let registry = ClassRegistry::with_builtins();
        let data = decode_hex(SEC_HEX).unwrap();
        let file = open_one_class_resource_bytes("x.sec", &data, ResourceKind::Sector, &registry).unwrap();
        assert!(matches!(file.class().data(), Some(ClassData::Sector(_))));
    }

    #[test]
    fn test_bare_record_roundtrip() {
        let registry = ClassRegistry::with_builtins();
        let enveloped = decode_hex(LRTPL_HEX).unwrap();
        let bare = &enveloped[HEADER_SIZE..];

        let file = open_one_class_resource_bytes("x.lrtpl", bare, ResourceKind::TemplateLayer, &registry).unwrap();
        assert_eq!(file.layout(), Layout::Bare);
        assert_eq!(file.class().name, "gCTemplateLayer");
        assert_eq!(
            file.class().property("IsPersistable").map(|p| &p.value),
            Some(&PropertyValue::Bool(true))
        );
        assert_eq!(file.to_bytes(&registry).unwrap(), bare);

        let err = open_one_class_resource_bytes("x.lrtpl", &[1, 0, 0], ResourceKind::TemplateLayer, &registry)
            .unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
    }

    #[test]
    fn test_kind_mismatch() {
        let registry = ClassRegistry::with_builtins();
        let data = decode_hex(LRTPL_HEX).unwrap();
        let err = open_one_class_resource_bytes("x.lrtpl", &data, ResourceKind::Mesh, &registry).unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
        assert!(err.to_string().contains("gCTemplateLayer"));
    }
}
