//! `gCSector` (.sec): one flag byte after the data version

use serde::Serialize;

use super::{mismatch, ClassData};
use crate::cursor::{Reader, Writer};
use crate::registry::{ClassCodec, ReadContext, WriteContext};
use crate::Result;

/// `gCSector` data: a single state byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SectorData {
    pub flags: u8,
}

impl SectorData {
    pub fn is_enabled(&self) -> bool {
        self.flags & 1 != 0
    }
}

pub(super) fn codec() -> ClassCodec {
    ClassCodec {
        max_version: 0x1B,
        decode,
        encode,
    }
}

fn decode(r: &mut Reader<'_>, _ctx: &ReadContext<'_>, _version: u16) -> Result<ClassData> {
    Ok(ClassData::Sector(SectorData { flags: r.read_u8()? }))
}

fn encode(data: &ClassData, w: &mut Writer, _ctx: &mut WriteContext<'_>) -> Result<()> {
    match data {
        ClassData::Sector(sector) => {
            w.write_u8(sector.flags);
            Ok(())
        }
        other => Err(mismatch("sector", other)),
    }
}
