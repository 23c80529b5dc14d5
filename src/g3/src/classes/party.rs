//! `gCParty_PS`: the party leader's list of member proxies

use serde::Serialize;

use super::{mismatch, ClassData};
use crate::cursor::{Reader, Writer};
use crate::registry::{ClassCodec, ReadContext, WriteContext};
use crate::types::EntityProxy;
use crate::{Guid, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartyData {
    pub members: Vec<EntityProxy>,
}

impl PartyData {
    pub fn contains(&self, guid: &Guid) -> bool {
        self.members.iter().any(|m| m.guid().as_ref() == Some(guid))
    }

    /// Add a member unless already present
    pub fn add(&mut self, guid: Guid) -> bool {
        if self.contains(&guid) {
            return false;
        }
        self.members.push(EntityProxy::to(guid));
        true
    }

    pub fn remove(&mut self, guid: &Guid) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m.guid().as_ref() != Some(guid));
        self.members.len() != before
    }
}

pub(super) fn codec() -> ClassCodec {
    ClassCodec {
        max_version: u16::MAX,
        decode,
        encode,
    }
}

fn decode(r: &mut Reader<'_>, _ctx: &ReadContext<'_>, _version: u16) -> Result<ClassData> {
    let count = r.read_u32()? as usize;
    let mut members = Vec::with_capacity(count.min(r.remaining() / 3));
    for _ in 0..count {
        members.push(EntityProxy::read(r)?);
    }
    Ok(ClassData::Party(PartyData { members }))
}

fn encode(data: &ClassData, w: &mut Writer, _ctx: &mut WriteContext<'_>) -> Result<()> {
    let ClassData::Party(party) = data else {
        return Err(mismatch("party", data));
    };
    w.write_u32(party.members.len() as u32);
    for member in &party.members {
        member.write(w);
    }
    Ok(())
}
