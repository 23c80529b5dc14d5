//! Built-in class codecs
//!
//! Most classes only need their properties decoded; their trailing data is
//! kept as raw bytes. A few carry typed data (`gCSector`, geometry contexts,
//! `gCParty_PS`).

mod party;
mod sector;
mod spatial;

use serde::Serialize;

pub use party::PartyData;
pub use sector::SectorData;
pub use spatial::GeometryContextData;

use crate::cursor::{Reader, Writer};
use crate::registry::{ClassCodec, ClassRegistry, ReadContext, WriteContext};
use crate::{Error, Guid, Result};

/// Class data following the data version
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ClassData {
    /// Nothing after the data version
    Empty,
    Raw(#[serde(serialize_with = "serialize_hex")] Vec<u8>),
    Sector(SectorData),
    GeometryContext(GeometryContextData),
    Party(PartyData),
}

fn serialize_hex<S: serde::Serializer>(bytes: &[u8], s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode_upper(bytes))
}

impl ClassData {
    pub fn guid_references(&self, out: &mut Vec<Guid>) {
        if let ClassData::Party(party) = self {
            out.extend(party.members.iter().filter_map(|m| m.guid()).filter(|g| !g.is_nil()));
        }
    }
}

/// Layer classes: properties only, data is just the version
const LAYER_CLASSES: [&str; 3] = ["gCDynamicLayer", "gCTemplateLayer", "gCGeometryLayer"];

/// Classes whose properties are decoded and whose data stays raw
const PROPERTY_CLASSES: [&str; 19] = [
    "eCIlluminated_PS",
    "eCVisualMeshStatic_PS",
    "eCVisualMeshDynamic_PS",
    "eCVisualAnimation_PS",
    "eCSpeedTree_PS",
    "eCVegetation_PS",
    "eCCollisionShape_PS",
    "gCNPC_PS",
    "gCAnchor_PS",
    "gCEnclave_PS",
    "gCInteraction_PS",
    "gCNavOffset_PS",
    "gCAIHelper_FreePoint_PS",
    "eCResourceMeshComplex_PS",
    "eCResourceShaderMaterial_PS",
    "eCResourceMeshLoD_PS",
    "eCResourceCollisionMesh_PS",
    "eCResourceAnimationActor_PS",
    "eCResourceAnimationMotion_PS",
];

pub(crate) fn register_builtins(registry: &mut ClassRegistry) {
    for name in LAYER_CLASSES {
        registry.register(
            name,
            ClassCodec {
                max_version: 1,
                ..ClassCodec::properties_only()
            },
        );
    }
    for name in PROPERTY_CLASSES {
        registry.register(name, ClassCodec::properties_only());
    }
    registry.register(
        "eCEntityTemplateContext",
        ClassCodec {
            max_version: 0x38,
            ..ClassCodec::properties_only()
        },
    );
    registry.register("gCSector", sector::codec());
    registry.register("eCGeometrySpatialContext", spatial::codec());
    registry.register("gCParty_PS", party::codec());
}

/// Keep whatever follows the data version
pub(crate) fn decode_raw(r: &mut Reader<'_>, _ctx: &ReadContext<'_>, _version: u16) -> Result<ClassData> {
    if r.is_empty() {
        return Ok(ClassData::Empty);
    }
    Ok(ClassData::Raw(r.read_bytes(r.remaining())?.to_vec()))
}

/// Write data that needs no codec
pub(crate) fn encode_untyped(data: &ClassData, w: &mut Writer, _ctx: &mut WriteContext<'_>) -> Result<()> {
    match data {
        ClassData::Empty => Ok(()),
        ClassData::Raw(bytes) => {
            w.write_bytes(bytes);
            Ok(())
        }
        other => Err(Error::Encode(format!(
            "{} data needs its registered codec",
            other.kind_name()
        ))),
    }
}

impl ClassData {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ClassData::Empty => "empty",
            ClassData::Raw(_) => "raw",
            ClassData::Sector(_) => "sector",
            ClassData::GeometryContext(_) => "geometry context",
            ClassData::Party(_) => "party",
        }
    }
}

fn mismatch(expected: &str, data: &ClassData) -> Error {
    Error::Encode(format!(
        "expected {} data, found {}",
        expected,
        data.kind_name()
    ))
}
