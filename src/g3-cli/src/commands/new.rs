//! `new` command: create files from the built-in templates

use std::path::Path;

use anyhow::{bail, Result};
use g3::ClassRegistry;

use crate::cli::{BoxArg, NewKind};

pub fn handle(kind: NewKind, output: &Path, content_box: Option<BoxArg>) -> Result<()> {
    let registry = ClassRegistry::with_builtins();

    if content_box.is_some() && kind != NewKind::Lrgeodat {
        bail!("--box only applies to lrgeodat files");
    }

    let written = match (kind, kind.aux()) {
        (NewKind::Lrgeodat, Some(aux)) => match content_box {
            Some(BoxArg(bounds)) => g3::create_lrgeodat(output, bounds, &registry)?,
            None => g3::create_file(output, aux)?,
        },
        (_, Some(aux)) => g3::create_file(output, aux)?,
        (NewKind::Lrentdat, None) => {
            let target = output.with_extension("lrentdat");
            g3::create_empty_lrentdat(&registry)?.save(&target, &registry)?;
            target
        }
        (_, None) => {
            let target = output.with_extension("node");
            g3::create_empty_node(&registry)?.save(&target, &registry)?;
            target
        }
    };

    println!("Created {}", written.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_node_changes_extension() {
        let dir = tempfile::tempdir().unwrap();
        handle(NewKind::Node, &dir.path().join("Sector_01.tmp"), None).unwrap();
        assert!(dir.path().join("Sector_01.node").is_file());
    }

    #[test]
    fn test_box_only_for_lrgeodat() {
        let dir = tempfile::tempdir().unwrap();
        let bounds: BoxArg = "0,0,0,1,1,1".parse().unwrap();
        assert!(handle(NewKind::Sec, &dir.path().join("a"), Some(bounds)).is_err());
        handle(NewKind::Lrgeodat, &dir.path().join("a"), Some(bounds)).unwrap();
        assert!(dir.path().join("a.lrgeodat").is_file());
    }
}
