//! `info` command: classify and summarize a file

use std::path::Path;

use anyhow::Result;
use g3::{ArchiveKind, ClassRegistry};

use super::{load, Loaded};

pub fn handle(input: &Path) -> Result<()> {
    let registry = ClassRegistry::with_builtins();
    let loaded = load(input, &registry)?;

    println!("File:    {}", input.display());
    println!("Kind:    {}", loaded.kind_label());
    println!("Version: {}", loaded.version());
    println!("Strings: {}", loaded.strings().len());

    if let Some(graph) = loaded.graph() {
        println!("Entities: {} ({} roots)", graph.len(), graph.roots().len());
        let unresolved = graph.unresolved_references();
        if !unresolved.is_empty() {
            println!("Unresolved references: {}", unresolved.len());
        }
    }

    match &loaded {
        Loaded::Archive(archive) => match archive.kind() {
            ArchiveKind::Lrentdat(context) => {
                if let Some(id) = context.id() {
                    println!("Context ID: {}", id.guid);
                }
                if let Some(b) = context.context_box() {
                    println!(
                        "Context box: ({}, {}, {}) - ({}, {}, {})",
                        b.min.x, b.min.y, b.min.z, b.max.x, b.max.y, b.max.z
                    );
                }
            }
            ArchiveKind::Node(header) => {
                println!("Node version: {:#x}", header.node_version);
            }
        },
        Loaded::Template(template) => {
            if let Some(name) = template.item_name() {
                println!("Item: {}", name);
            }
        }
        Loaded::OneClass(file) => {
            let class = file.class();
            match class.properties() {
                Some(props) => println!("Properties: {}", props.properties.len()),
                None => println!("Class body kept opaque (no codec)"),
            }
        }
    }

    Ok(())
}
