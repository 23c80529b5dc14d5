//! `eCGeometrySpatialContext` (.lrgeodat)

use serde::Serialize;

use super::{mismatch, ClassData};
use crate::cursor::{Reader, Writer};
use crate::registry::{ClassCodec, ReadContext, WriteContext};
use crate::types::{BoundingBox, FixedBinary};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeometryContextData {
    pub flags: [u8; 2],
    /// Inverted (empty) until geometry is assigned
    pub bounds: BoundingBox,
}

impl Default for GeometryContextData {
    fn default() -> Self {
        Self {
            flags: [1, 1],
            bounds: BoundingBox::empty(),
        }
    }
}

pub(super) fn codec() -> ClassCodec {
    ClassCodec {
        max_version: 0x53,
        decode,
        encode,
    }
}

fn decode(r: &mut Reader<'_>, _ctx: &ReadContext<'_>, _version: u16) -> Result<ClassData> {
    Ok(ClassData::GeometryContext(GeometryContextData {
        flags: r.read_array::<2>()?,
        bounds: BoundingBox::read(r)?,
    }))
}

fn encode(data: &ClassData, w: &mut Writer, _ctx: &mut WriteContext<'_>) -> Result<()> {
    match data {
        ClassData::GeometryContext(ctx) => {
            w.write_bytes(&ctx.flags);
            ctx.bounds.write(w);
            Ok(())
        }
        other => Err(mismatch("geometry context", other)),
    }
}
