//! `dump` command: print the decoded model

use std::path::Path;

use anyhow::{Context, Result};
use g3::{ClassProperty, ClassRegistry, EntityGraph, EntityId, EnumRegistry, G3Class, PropertyType, PropertyValue};
use serde_json::{json, Value};

use super::{load, Loaded};

pub fn handle(input: &Path, as_json: bool, enums: &EnumRegistry) -> Result<()> {
    let registry = ClassRegistry::with_builtins();
    let loaded = load(input, &registry)?;

    if as_json {
        let value = match &loaded {
            Loaded::OneClass(file) => serde_json::to_value(file.class())?,
            _ => {
                let graph = loaded.graph().context("file has no entity graph")?;
                Value::Array(
                    graph
                        .roots()
                        .iter()
                        .map(|&root| entity_json(graph, root))
                        .collect::<Result<_>>()?,
                )
            }
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match &loaded {
        Loaded::OneClass(file) => print_class(file.class(), 0, enums),
        _ => {
            if let Some(graph) = loaded.graph() {
                for &root in graph.roots() {
                    print_entity(graph, root, 0, enums);
                }
            }
        }
    }
    Ok(())
}

fn entity_json(graph: &EntityGraph, id: EntityId) -> Result<Value> {
    let entity = graph.get(id).context("dangling entity handle")?;
    let children = graph
        .children(id)
        .iter()
        .map(|&child| entity_json(graph, child))
        .collect::<Result<Vec<_>>>()?;
    Ok(json!({
        "guid": entity.guid(),
        "name": entity.name,
        "placement": entity.data,
        "classes": entity.classes,
        "children": children,
    }))
}

fn print_entity(graph: &EntityGraph, id: EntityId, depth: usize, enums: &EnumRegistry) {
    let Some(entity) = graph.get(id) else {
        return;
    };
    let indent = "  ".repeat(depth);
    println!("{}{} {}", indent, entity.guid(), entity.name);
    for class in &entity.classes {
        print_class(class, depth + 1, enums);
    }
    for &child in graph.children(id) {
        print_entity(graph, child, depth + 1, enums);
    }
}

fn print_class(class: &G3Class, depth: usize, enums: &EnumRegistry) {
    let indent = "  ".repeat(depth);
    let Some(props) = class.properties() else {
        println!("{}[{}] (opaque)", indent, class.name);
        return;
    };
    println!("{}[{}]", indent, class.name);
    for prop in &props.properties {
        println!("{}  {} = {}", indent, prop.name, describe(prop, enums));
    }
}

/// Human-readable property value; enums resolve to their symbol when known
fn describe(prop: &ClassProperty, enums: &EnumRegistry) -> String {
    match (&prop.value, prop.property_type()) {
        (PropertyValue::Enum { value, .. }, PropertyType::Enum(enum_type)) => enums.describe(&enum_type, *value),
        (PropertyValue::String(s), _) => format!("{:?}", s),
        (PropertyValue::Guid(g), _) => g.guid.to_string(),
        (PropertyValue::Raw(bytes), _) => format!("<{} raw bytes>", bytes.len()),
        (value, _) => serde_json::to_value(value)
            .ok()
            .and_then(|v| v.get("value").cloned())
            .map(|v| v.to_string())
            .unwrap_or_else(|| value.variant_name().to_string()),
    }
}
