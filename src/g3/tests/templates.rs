//! Round-trip and scenario tests against the embedded real files

use g3::cursor::decode_hex;
use g3::embedded::{
    LRENTDAT_HEX, LRENT_HEX, LRGEODAT_HEX, LRGEO_HEX, LRTPLDAT_HEX, LRTPL_HEX, NODE_HEX, SEC_HEX,
};
use g3::types::{BoundingBox, Vector3};
use g3::{
    open_archive, open_archive_bytes, open_one_class_resource_bytes, probe, ArchiveKind, ClassBody,
    ClassHeader, ClassRegistry, Entity, Error, G3Class, Guid, Probe, PropertyValue, ResourceKind,
    TransformPolicy,
};

const ONE_CLASS: [(&str, ResourceKind); 6] = [
    (LRENT_HEX, ResourceKind::DynamicLayer),
    (SEC_HEX, ResourceKind::Sector),
    (LRGEO_HEX, ResourceKind::GeometryLayer),
    (LRGEODAT_HEX, ResourceKind::GeometryContext),
    (LRTPL_HEX, ResourceKind::TemplateLayer),
    (LRTPLDAT_HEX, ResourceKind::TemplateContext),
];

fn sentinel(data: &[u8]) -> usize {
    u32::from_le_bytes([data[10], data[11], data[12], data[13]]) as usize
}

#[test]
fn archives_round_trip_byte_exact() {
    for registry in [ClassRegistry::with_builtins(), ClassRegistry::new()] {
        for (name, hex) in [("empty.lrentdat", LRENTDAT_HEX), ("empty.node", NODE_HEX)] {
            let data = decode_hex(hex).unwrap();
            let archive = open_archive_bytes(name, &data, &registry).unwrap();
            assert_eq!(archive.to_bytes(&registry).unwrap(), data, "{}", name);
        }
    }
}

#[test]
fn one_class_files_round_trip_byte_exact() {
    for registry in [ClassRegistry::with_builtins(), ClassRegistry::new()] {
        for (hex, kind) in ONE_CLASS {
            let data = decode_hex(hex).unwrap();
            let file = open_one_class_resource_bytes(kind.extension(), &data, kind, &registry).unwrap();
            assert_eq!(file.class().is_opaque(), registry.is_empty(), "{:?}", kind);
            assert_eq!(file.to_bytes(&registry).unwrap(), data, "{:?}", kind);
        }
    }
}

#[test]
fn sentinel_points_at_marker() {
    let registry = ClassRegistry::with_builtins();
    let mut archive = g3::create_empty_lrentdat(&registry).unwrap();
    let root = archive.graph().roots()[0];
    archive
        .graph_mut()
        .insert(Entity::new_dynamic(Guid::random(), "Child_With_A_Longer_Name"), Some(root))
        .unwrap();

    let data = archive.to_bytes(&registry).unwrap();
    let offset = sentinel(&data);
    assert_eq!(&data[offset..offset + 4], &[0xEF, 0xBE, 0xAD, 0xDE]);
    assert_eq!(data[offset + 4], 1);
}

#[test]
fn probe_classifies_templates() {
    assert_eq!(probe(&decode_hex(LRENTDAT_HEX).unwrap()), Probe::Lrentdat);
    assert_eq!(probe(&decode_hex(NODE_HEX).unwrap()), Probe::Genome);
    for (hex, kind) in ONE_CLASS {
        assert_eq!(probe(&decode_hex(hex).unwrap()), Probe::OneClass, "{:?}", kind);
    }
    assert_eq!(probe(b"GENOM"), Probe::NotGenome);
}

#[test]
fn signature_is_checked_before_anything_else() {
    let registry = ClassRegistry::with_builtins();
    let mut data = decode_hex(NODE_HEX).unwrap();
    data[7] = b'X';
    let err = open_archive_bytes("broken.node", &data, &registry).unwrap_err();
    assert!(matches!(err, Error::Format { .. }));

    let err = open_archive_bytes("short.node", b"GENOMF", &registry).unwrap_err();
    assert!(matches!(err, Error::Format { .. }));
}

#[test]
fn empty_lrentdat_scenario() {
    let registry = ClassRegistry::with_builtins();
    let original = decode_hex(LRENTDAT_HEX).unwrap();
    let archive = g3::create_empty_lrentdat(&registry).unwrap();

    let ArchiveKind::Lrentdat(context) = archive.kind() else {
        panic!("expected an lrentdat archive");
    };
    let bounds = context.context_box().unwrap();
    assert!(bounds.is_valid());

    let roots = archive.graph().roots();
    assert_eq!(roots.len(), 1);
    let root = archive.graph().get(roots[0]).unwrap();
    assert_eq!(root.name, "RootEntity");
    assert!(!root.guid().is_nil());

    // Only the root GUID differs from the template
    let data = archive.to_bytes(&registry).unwrap();
    assert_eq!(data.len(), original.len());
    let changed: Vec<usize> = (0..data.len()).filter(|&i| data[i] != original[i]).collect();
    assert!(changed.iter().all(|i| (0xA1..0xB1).contains(i)), "{:?}", changed);
    assert_eq!(&data[0xA1..0xB1], root.guid().as_bytes());
}

#[test]
fn unknown_class_survives_edit_and_save() {
    let registry = ClassRegistry::with_builtins();
    let mut archive = g3::create_empty_lrentdat(&registry).unwrap();
    let root = archive.graph().roots()[0];

    let custom = G3Class {
        name: "gCModdedThing_PS".to_string(),
        header: ClassHeader::default(),
        body: ClassBody::Opaque(vec![0x1E, 0x00, 0xDE, 0xAD, 0xBE]),
    };
    archive
        .graph_mut()
        .get_mut(root)
        .unwrap()
        .add_class(custom.clone())
        .unwrap();

    let data = archive.to_bytes(&registry).unwrap();
    let back = open_archive_bytes("modded.lrentdat", &data, &registry).unwrap();
    let entity = back.graph().get(back.graph().roots()[0]).unwrap();
    assert_eq!(entity.class("gCModdedThing_PS"), Some(&custom));
    assert_eq!(back.to_bytes(&registry).unwrap(), data);
}

#[test]
fn guids_stay_unique() {
    let registry = ClassRegistry::with_builtins();
    let mut archive = g3::create_empty_node(&registry).unwrap();
    let root = archive.graph().roots()[0];
    let taken = archive.graph().get(root).unwrap().guid();

    let err = archive
        .graph_mut()
        .insert(Entity::new_dynamic(taken, "Clone"), None)
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateGuid(g) if g == taken));

    let child = archive
        .graph_mut()
        .insert(Entity::new_dynamic(Guid::random(), "Child"), Some(root))
        .unwrap();
    assert!(archive.graph_mut().set_guid(child, taken).is_err());
    assert_eq!(archive.graph().by_guid(&taken), Some(root));
}

#[test]
fn duplicate_guid_in_file_is_rejected() {
    let registry = ClassRegistry::with_builtins();
    let mut archive = g3::create_empty_node(&registry).unwrap();
    let root = archive.graph().roots()[0];
    let child = archive
        .graph_mut()
        .insert(Entity::new_dynamic(Guid::random(), "Child"), Some(root))
        .unwrap();
    let guid = archive.graph().get(child).unwrap().guid();
    let mut data = archive.to_bytes(&registry).unwrap();

    // Overwrite the root GUID with the child's
    let root_guid = archive.graph().get(root).unwrap().guid();
    let at = data
        .windows(16)
        .position(|w| w == root_guid.as_bytes())
        .unwrap();
    data[at..at + 16].copy_from_slice(guid.as_bytes());

    let err = open_archive_bytes("dup.node", &data, &registry).unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
}

#[test]
fn reparented_hierarchy_survives_save() {
    let registry = ClassRegistry::with_builtins();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("world.node");

    let mut archive = g3::create_empty_node(&registry).unwrap();
    let root = archive.graph().roots()[0];
    let graph = archive.graph_mut();
    let a = graph.insert(Entity::new_dynamic(Guid::random(), "A"), Some(root)).unwrap();
    let b = graph.insert(Entity::new_dynamic(Guid::random(), "B"), Some(a)).unwrap();
    graph.reparent(b, Some(root), TransformPolicy::KeepWorld).unwrap();
    let b_guid = graph.get(b).unwrap().guid();
    archive.save(&path, &registry).unwrap();

    let back = open_archive(&path, &registry).unwrap();
    let b = back.graph().by_guid(&b_guid).unwrap();
    let parent = back.graph().parent(b).unwrap();
    assert_eq!(back.graph().get(parent).unwrap().name, "Root");
    assert_eq!(back.graph().len(), 3);
}

#[test]
fn lrgeodat_created_with_content_box() {
    let registry = ClassRegistry::with_builtins();
    let dir = tempfile::tempdir().unwrap();
    let bounds = BoundingBox::new(Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 2.0, 3.0));
    let path = g3::create_lrgeodat(&dir.path().join("G3_World_01.node"), bounds, &registry).unwrap();

    let data = std::fs::read(&path).unwrap();
    assert_eq!(data.len(), decode_hex(LRGEODAT_HEX).unwrap().len());
    let file =
        open_one_class_resource_bytes("G3_World_01.lrgeodat", &data, ResourceKind::GeometryContext, &registry)
            .unwrap();
    assert_eq!(
        file.class().property("ContextBox").map(|p| &p.value),
        Some(&PropertyValue::Box(bounds))
    );
}
