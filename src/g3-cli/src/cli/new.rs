//! Arguments of the `new` command

use std::str::FromStr;

use clap::ValueEnum;
use g3::types::{BoundingBox, Vector3};
use g3::AuxKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NewKind {
    Lrentdat,
    Node,
    Lrent,
    Sec,
    Lrgeo,
    Lrgeodat,
    Lrtpl,
    Lrtpldat,
}

impl NewKind {
    /// Auxiliary template, or `None` for archives
    pub fn aux(self) -> Option<AuxKind> {
        match self {
            NewKind::Lrentdat | NewKind::Node => None,
            NewKind::Lrent => Some(AuxKind::Lrent),
            NewKind::Sec => Some(AuxKind::Sector),
            NewKind::Lrgeo => Some(AuxKind::Lrgeo),
            NewKind::Lrgeodat => Some(AuxKind::Lrgeodat),
            NewKind::Lrtpl => Some(AuxKind::Lrtpl),
            NewKind::Lrtpldat => Some(AuxKind::Lrtpldat),
        }
    }
}

/// Six comma-separated floats
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxArg(pub BoundingBox);

impl FromStr for BoxArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|v| v.trim().parse::<f32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("invalid number in box: {}", e))?;
        let [min_x, min_y, min_z, max_x, max_y, max_z] = values[..] else {
            return Err(format!("expected 6 values, got {}", values.len()));
        };
        Ok(BoxArg(BoundingBox::new(
            Vector3::new(min_x, min_y, min_z),
            Vector3::new(max_x, max_y, max_z),
        )))
    }
}
