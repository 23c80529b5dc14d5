//! Entities and the entity graph
//!
//! Entities live in an arena addressed by [`EntityId`]. Parent links are ids,
//! never references, and a GUID index gives flat lookup across the graph.
//! On disk every entity record stores the index of its parent in the file's
//! entity list (`-1` for roots).

use std::collections::{BTreeSet, HashMap};

use glam::Mat4;
use serde::Serialize;

use crate::class::{read_class, write_class, ClassBody, ClassSlot, G3Class};
use crate::classes::ClassData;
use crate::cursor::{Reader, Writer};
use crate::property::PropertyValue;
use crate::registry::{ReadContext, WriteContext};
use crate::types::{BoundingBox, FixedBinary, GuidValue, Matrix, Sphere, Vector3};
use crate::{Error, Guid, Result, StringTable};

/// Handle of an entity inside one [`EntityGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityId(usize);

impl EntityId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// What happens to transforms when an entity moves to a new parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformPolicy {
    /// Keep the local matrix; the world matrix follows the new parent
    KeepLocal,
    /// Keep the world matrix; the local matrix is recomputed
    KeepWorld,
}

/// Placement block of a world (`.lrentdat`/`.node`) entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DynamicPlacement {
    pub version: u16,
    pub id_version: u16,
    pub guid_valid: bool,
    pub state_flags: [u8; 7],
    pub render_alpha: f32,
    pub insert_type: u16,
    pub world_matrix: Matrix,
    pub local_matrix: Matrix,
    pub world_tree_boundary: BoundingBox,
    pub world_node_boundary: BoundingBox,
    pub local_node_boundary: BoundingBox,
    pub world_node_sphere: Sphere,
    pub local_node_sphere: Sphere,
    pub view_range: f32,
    pub lod_flags: u8,
    pub uniform_scale: f32,
    pub render_priority: u32,
    pub alpha: f32,
    pub reserved: [u8; 6],
    pub trailer: [u8; 4],
}

impl Default for DynamicPlacement {
    fn default() -> Self {
        Self {
            version: 0x53,
            id_version: 1,
            guid_valid: false,
            state_flags: [1, 1, 0, 1, 0, 1, 1],
            render_alpha: 1.0,
            insert_type: 0,
            world_matrix: Matrix::IDENTITY,
            local_matrix: Matrix::IDENTITY,
            world_tree_boundary: BoundingBox::default(),
            world_node_boundary: BoundingBox::empty(),
            local_node_boundary: BoundingBox::empty(),
            world_node_sphere: Sphere::default(),
            local_node_sphere: Sphere {
                center: Vector3::new(-f32::MAX, 0.0, 0.0),
                radius: 0.0,
            },
            view_range: 1.0,
            lod_flags: 0,
            uniform_scale: 1.0,
            render_priority: u32::MAX,
            alpha: 1.0,
            reserved: [0; 6],
            trailer: [0xFF; 4],
        }
    }
}

/// Placement block of a template (`.tple`) entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplatePlacement {
    pub version: u16,
    pub guid_valid: bool,
    /// Entity the template was derived from, if any
    pub reference: GuidValue,
}

impl Default for TemplatePlacement {
    fn default() -> Self {
        Self {
            version: 0x53,
            guid_valid: true,
            reference: GuidValue::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EntityData {
    Dynamic(Box<DynamicPlacement>),
    Template(TemplatePlacement),
}

/// A GUID-keyed node owning an ordered list of classes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    guid: Guid,
    pub name: String,
    pub classes: Vec<G3Class>,
    pub data: EntityData,
}

impl Entity {
    pub fn new_dynamic(guid: Guid, name: impl Into<String>) -> Self {
        Self {
            guid,
            name: name.into(),
            classes: Vec::new(),
            data: EntityData::Dynamic(Box::default()),
        }
    }

    pub fn new_template(guid: Guid, name: impl Into<String>) -> Self {
        Self {
            guid,
            name: name.into(),
            classes: Vec::new(),
            data: EntityData::Template(TemplatePlacement::default()),
        }
    }

    /// GUID; change it through [`EntityGraph::set_guid`] once inserted
    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn placement(&self) -> Option<&DynamicPlacement> {
        match &self.data {
            EntityData::Dynamic(p) => Some(p),
            EntityData::Template(_) => None,
        }
    }

    pub fn placement_mut(&mut self) -> Option<&mut DynamicPlacement> {
        match &mut self.data {
            EntityData::Dynamic(p) => Some(p),
            EntityData::Template(_) => None,
        }
    }

    pub fn class(&self, name: &str) -> Option<&G3Class> {
        self.classes.iter().find(|c| c.name == name)
    }

    pub fn class_mut(&mut self, name: &str) -> Option<&mut G3Class> {
        self.classes.iter_mut().find(|c| c.name == name)
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.class(name).is_some()
    }

    pub fn add_class(&mut self, class: G3Class) -> Result<()> {
        if self.has_class(&class.name) {
            return Err(Error::DuplicateClass(class.name));
        }
        self.classes.push(class);
        Ok(())
    }

    /// Replace the class of the same name in place, or append it
    pub fn set_class(&mut self, class: G3Class) {
        match self.class_mut(&class.name) {
            Some(existing) => *existing = class,
            None => self.classes.push(class),
        }
    }

    pub fn remove_class(&mut self, name: &str) -> Option<G3Class> {
        let pos = self.classes.iter().position(|c| c.name == name)?;
        Some(self.classes.remove(pos))
    }

    /// Read a world entity record, returning it with its parent index
    pub(crate) fn read_dynamic(r: &mut Reader<'_>, ctx: &ReadContext<'_>) -> Result<(Self, i32)> {
        let version = r.read_u16()?;
        let id_version = r.read_u16()?;
        let id = GuidValue::read(r)?;
        let state_flags = r.read_array::<7>()?;
        let render_alpha = r.read_f32()?;
        let insert_type = r.read_u16()?;
        let classes = read_classes(r, ctx)?;
        let name = ctx.string(r)?;

        let placement = DynamicPlacement {
            version,
            id_version,
            guid_valid: id.valid,
            state_flags,
            render_alpha,
            insert_type,
            world_matrix: Matrix::read(r)?,
            local_matrix: Matrix::read(r)?,
            world_tree_boundary: BoundingBox::read(r)?,
            world_node_boundary: BoundingBox::read(r)?,
            local_node_boundary: BoundingBox::read(r)?,
            world_node_sphere: Sphere::read(r)?,
            local_node_sphere: Sphere::read(r)?,
            view_range: r.read_f32()?,
            lod_flags: r.read_u8()?,
            uniform_scale: r.read_f32()?,
            render_priority: r.read_u32()?,
            alpha: r.read_f32()?,
            reserved: r.read_array::<6>()?,
            trailer: [0; 4],
        };
        let parent = r.read_i32()?;
        let trailer = r.read_array::<4>()?;

        let entity = Self {
            guid: id.guid,
            name,
            classes,
            data: EntityData::Dynamic(Box::new(DynamicPlacement {
                trailer,
                ..placement
            })),
        };
        Ok((entity, parent))
    }

    /// Read a template entity record, returning it with its parent index
    pub(crate) fn read_template(r: &mut Reader<'_>, ctx: &ReadContext<'_>) -> Result<(Self, i32)> {
        let version = r.read_u16()?;
        let id = GuidValue::read(r)?;
        let reference = GuidValue::read(r)?;
        let name = ctx.string(r)?;
        let classes = read_classes(r, ctx)?;
        let parent = r.read_i32()?;

        let entity = Self {
            guid: id.guid,
            name,
            classes,
            data: EntityData::Template(TemplatePlacement {
                version,
                guid_valid: id.valid,
                reference,
            }),
        };
        Ok((entity, parent))
    }

    pub(crate) fn write_record(&self, w: &mut Writer, parent: i32, ctx: &mut WriteContext<'_>) -> Result<()> {
        match &self.data {
            EntityData::Dynamic(p) => {
                w.write_u16(p.version);
                w.write_u16(p.id_version);
                GuidValue {
                    guid: self.guid,
                    valid: p.guid_valid,
                }
                .write(w);
                w.write_bytes(&p.state_flags);
                w.write_f32(p.render_alpha);
                w.write_u16(p.insert_type);
                write_classes(w, &self.classes, ctx)?;
                ctx.write_string(w, &self.name)?;
                p.world_matrix.write(w);
                p.local_matrix.write(w);
                p.world_tree_boundary.write(w);
                p.world_node_boundary.write(w);
                p.local_node_boundary.write(w);
                p.world_node_sphere.write(w);
                p.local_node_sphere.write(w);
                w.write_f32(p.view_range);
                w.write_u8(p.lod_flags);
                w.write_f32(p.uniform_scale);
                w.write_u32(p.render_priority);
                w.write_f32(p.alpha);
                w.write_bytes(&p.reserved);
                w.write_i32(parent);
                w.write_bytes(&p.trailer);
            }
            EntityData::Template(t) => {
                w.write_u16(t.version);
                GuidValue {
                    guid: self.guid,
                    valid: t.guid_valid,
                }
                .write(w);
                t.reference.write(w);
                ctx.write_string(w, &self.name)?;
                write_classes(w, &self.classes, ctx)?;
                w.write_i32(parent);
            }
        }
        Ok(())
    }
}

fn read_classes(r: &mut Reader<'_>, ctx: &ReadContext<'_>) -> Result<Vec<G3Class>> {
    let count = r.read_u32()? as usize;
    let mut classes: Vec<G3Class> = Vec::with_capacity(count.min(r.remaining() / 3));
    for _ in 0..count {
        let class = read_class(r, ctx)?.ok_or_else(|| r.decode_error("null class record in entity"))?;
        if classes.iter().any(|c| c.name == class.name) {
            return Err(r.decode_error(format!("entity holds class '{}' twice", class.name)));
        }
        classes.push(class);
    }
    Ok(classes)
}

fn write_classes(w: &mut Writer, classes: &[G3Class], ctx: &mut WriteContext<'_>) -> Result<()> {
    w.write_u32(classes.len() as u32);
    for class in classes {
        write_class(w, class, ctx)?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct Node {
    entity: Entity,
    parent: Option<EntityId>,
    children: Vec<EntityId>,
}

/// A GUID reference that names no entity in the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuidReference {
    pub entity: EntityId,
    pub class: String,
    pub guid: Guid,
}

/// Arena of entities with parent/child links and a GUID index
///
/// Nil GUIDs are allowed (fresh templates use them) and are not indexed.
#[derive(Debug, Clone, Default)]
pub struct EntityGraph {
    slots: Vec<Option<Node>>,
    by_guid: HashMap<Guid, EntityId>,
    roots: Vec<EntityId>,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from file records (entity, parent index)
    pub(crate) fn from_records(records: Vec<(Entity, i32)>, r: &Reader<'_>) -> Result<Self> {
        let count = records.len();
        let mut graph = Self::new();
        let mut parents = Vec::with_capacity(count);

        for (i, (entity, parent)) in records.into_iter().enumerate() {
            let guid = entity.guid;
            if !guid.is_nil() && graph.by_guid.insert(guid, EntityId(i)).is_some() {
                return Err(r.decode_error(format!("duplicate entity GUID {}", guid)));
            }
            graph.slots.push(Some(Node {
                entity,
                parent: None,
                children: Vec::new(),
            }));
            parents.push(parent);
        }

        for (i, &parent) in parents.iter().enumerate() {
            let id = EntityId(i);
            match parent {
                -1 => graph.roots.push(id),
                p if p >= 0 && (p as usize) < count && p as usize != i => {
                    let parent_id = EntityId(p as usize);
                    graph.node_mut(id)?.parent = Some(parent_id);
                    graph.node_mut(parent_id)?.children.push(id);
                }
                p => {
                    return Err(r.decode_error(format!(
                        "entity {} has invalid parent index {}",
                        i, p
                    )))
                }
            }
        }

        graph
            .validate()
            .map_err(|e| r.decode_error(e.to_string()))?;
        Ok(graph)
    }

    /// Live entities in arena order with parent indices remapped
    pub(crate) fn to_records(&self) -> Vec<(&Entity, i32)> {
        let mut positions = HashMap::with_capacity(self.len());
        for (pos, id) in self.iter_flat().enumerate() {
            positions.insert(id, pos as i32);
        }
        self.iter_flat()
            .filter_map(|id| {
                let node = self.node(id).ok()?;
                let parent = node
                    .parent
                    .and_then(|p| positions.get(&p).copied())
                    .unwrap_or(-1);
                Some((&node.entity, parent))
            })
            .collect()
    }

    fn node(&self, id: EntityId) -> Result<&Node> {
        self.slots
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(Error::UnknownEntity(id.0))
    }

    fn node_mut(&mut self, id: EntityId) -> Result<&mut Node> {
        self.slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(Error::UnknownEntity(id.0))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.node(id).is_ok()
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.node(id).ok().map(|n| &n.entity)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.node_mut(id).ok().map(|n| &mut n.entity)
    }

    pub fn by_guid(&self, guid: &Guid) -> Option<EntityId> {
        self.by_guid.get(guid).copied()
    }

    pub fn parent(&self, id: EntityId) -> Option<EntityId> {
        self.node(id).ok()?.parent
    }

    pub fn children(&self, id: EntityId) -> &[EntityId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn roots(&self) -> &[EntityId] {
        &self.roots
    }

    /// Live entities in storage (and file) order
    pub fn iter_flat(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| EntityId(i))
    }

    /// Pre-order walk starting at each root in turn
    pub fn iter_depth_first(&self) -> DepthFirst<'_> {
        DepthFirst {
            graph: self,
            stack: self.roots.iter().rev().copied().collect(),
        }
    }

    /// Pre-order walk of one subtree, `id` included
    pub fn descendants(&self, id: EntityId) -> DepthFirst<'_> {
        DepthFirst {
            graph: self,
            stack: if self.contains(id) { vec![id] } else { Vec::new() },
        }
    }

    pub fn insert(&mut self, entity: Entity, parent: Option<EntityId>) -> Result<EntityId> {
        if let Some(p) = parent {
            self.node(p)?;
        }
        let guid = entity.guid;
        if !guid.is_nil() && self.by_guid.contains_key(&guid) {
            return Err(Error::DuplicateGuid(guid));
        }

        let id = EntityId(self.slots.len());
        self.slots.push(Some(Node {
            entity,
            parent,
            children: Vec::new(),
        }));
        if !guid.is_nil() {
            self.by_guid.insert(guid, id);
        }
        match parent {
            Some(p) => self.node_mut(p)?.children.push(id),
            None => self.roots.push(id),
        }
        Ok(id)
    }

    /// Remove `id` and its subtree, returning the removed entities in pre-order
    pub fn remove(&mut self, id: EntityId) -> Result<Vec<Entity>> {
        let parent = self.node(id)?.parent;
        let subtree: Vec<EntityId> = self.descendants(id).collect();

        match parent {
            Some(p) => self.node_mut(p)?.children.retain(|&c| c != id),
            None => self.roots.retain(|&r| r != id),
        }

        let mut removed = Vec::with_capacity(subtree.len());
        for sid in subtree {
            if let Some(node) = self.slots.get_mut(sid.0).and_then(Option::take) {
                if self.by_guid.get(&node.entity.guid) == Some(&sid) {
                    self.by_guid.remove(&node.entity.guid);
                }
                removed.push(node.entity);
            }
        }
        Ok(removed)
    }

    pub fn set_guid(&mut self, id: EntityId, guid: Guid) -> Result<()> {
        let old = self.node(id)?.entity.guid;
        if old == guid {
            return Ok(());
        }
        if !guid.is_nil() && self.by_guid.contains_key(&guid) {
            return Err(Error::DuplicateGuid(guid));
        }
        if self.by_guid.get(&old) == Some(&id) {
            self.by_guid.remove(&old);
        }
        if !guid.is_nil() {
            self.by_guid.insert(guid, id);
        }
        self.node_mut(id)?.entity.guid = guid;
        Ok(())
    }

    /// World matrix of a placed entity as a glam matrix
    pub fn world_transform(&self, id: EntityId) -> Option<Mat4> {
        Some(self.get(id)?.placement()?.world_matrix.to_glam())
    }

    /// Move `id` under `new_parent` (or to the top level)
    pub fn reparent(&mut self, id: EntityId, new_parent: Option<EntityId>, policy: TransformPolicy) -> Result<()> {
        let old_parent = self.node(id)?.parent;
        if let Some(p) = new_parent {
            self.node(p)?;
            if self.descendants(id).any(|d| d == p) {
                return Err(Error::Hierarchy(format!(
                    "cannot move entity {} below its own descendant {}",
                    id.0, p.0
                )));
            }
        }

        match old_parent {
            Some(p) => self.node_mut(p)?.children.retain(|&c| c != id),
            None => self.roots.retain(|&r| r != id),
        }
        self.node_mut(id)?.parent = new_parent;
        match new_parent {
            Some(p) => self.node_mut(p)?.children.push(id),
            None => self.roots.push(id),
        }

        let parent_world = new_parent
            .and_then(|p| self.world_transform(p))
            .unwrap_or(Mat4::IDENTITY);

        match policy {
            TransformPolicy::KeepWorld => {
                if let Some(placement) = self.node_mut(id)?.entity.placement_mut() {
                    let world = placement.world_matrix.to_glam();
                    placement.local_matrix = Matrix::from_glam(parent_world.inverse() * world);
                }
            }
            TransformPolicy::KeepLocal => self.propagate_world(id, parent_world)?,
        }
        Ok(())
    }

    /// Recompute world matrices of a subtree from local matrices
    fn propagate_world(&mut self, id: EntityId, parent_world: Mat4) -> Result<()> {
        let mut pending = vec![(id, parent_world)];
        while let Some((current, parent_world)) = pending.pop() {
            let node = self.node_mut(current)?;
            let world = match node.entity.placement_mut() {
                Some(placement) => {
                    let world = parent_world * placement.local_matrix.to_glam();
                    placement.world_matrix = Matrix::from_glam(world);
                    world
                }
                None => parent_world,
            };
            pending.extend(node.children.iter().map(|&c| (c, world)));
        }
        Ok(())
    }

    /// Check link symmetry, GUID index consistency and absence of cycles
    pub fn validate(&self) -> Result<()> {
        for id in self.iter_flat() {
            let node = self.node(id)?;
            match node.parent {
                Some(p) => {
                    let parent = self.node(p).map_err(|_| {
                        Error::Hierarchy(format!("entity {} points at missing parent {}", id.0, p.0))
                    })?;
                    if !parent.children.contains(&id) {
                        return Err(Error::Hierarchy(format!(
                            "entity {} is not listed as a child of {}",
                            id.0, p.0
                        )));
                    }
                }
                None if !self.roots.contains(&id) => {
                    return Err(Error::Hierarchy(format!("entity {} has no parent and is not a root", id.0)));
                }
                None => {}
            }
            for &child in &node.children {
                if self.node(child)?.parent != Some(id) {
                    return Err(Error::Hierarchy(format!(
                        "child {} of {} links to another parent",
                        child.0, id.0
                    )));
                }
            }
            let guid = node.entity.guid;
            if !guid.is_nil() && self.by_guid.get(&guid) != Some(&id) {
                return Err(Error::DuplicateGuid(guid));
            }
        }

        // Every live entity must be reachable from a root exactly once
        let reached = self.iter_depth_first().take(self.len() + 1).count();
        if reached != self.len() {
            return Err(Error::Hierarchy(format!(
                "{} of {} entities reachable from roots",
                reached,
                self.len()
            )));
        }
        Ok(())
    }

    /// GUID-valued references that resolve to no entity in this graph
    pub fn unresolved_references(&self) -> Vec<GuidReference> {
        let mut unresolved = Vec::new();
        for id in self.iter_flat() {
            let Some(entity) = self.get(id) else { continue };
            for class in &entity.classes {
                let mut guids = Vec::new();
                class.guid_references(&mut guids);
                unresolved.extend(
                    guids
                        .into_iter()
                        .filter(|g| *g != entity.guid && !self.by_guid.contains_key(g))
                        .map(|guid| GuidReference {
                            entity: id,
                            class: class.name.clone(),
                            guid,
                        }),
                );
            }
        }
        unresolved
    }

    pub fn classes(&self) -> impl Iterator<Item = &G3Class> + '_ {
        self.slots
            .iter()
            .flatten()
            .flat_map(|n| n.entity.classes.iter())
    }
}

/// Pre-order iterator over entity ids
pub struct DepthFirst<'a> {
    graph: &'a EntityGraph,
    stack: Vec<EntityId>,
}

impl Iterator for DepthFirst<'_> {
    type Item = EntityId;

    fn next(&mut self) -> Option<EntityId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.graph.children(id).iter().rev().copied());
        Some(id)
    }
}

/// Names of classes holding bytes that were not decoded
fn collect_opaque(class: &G3Class, out: &mut BTreeSet<String>) {
    match &class.body {
        ClassBody::Opaque(raw) => {
            if raw.len() > 4 {
                out.insert(class.name.clone());
            }
        }
        ClassBody::Parsed {
            properties, data, ..
        } => {
            if matches!(data, ClassData::Raw(bytes) if !bytes.is_empty()) {
                out.insert(class.name.clone());
            }
            for prop in &properties.properties {
                collect_opaque_value(&class.name, &prop.value, out);
            }
        }
    }
}

fn collect_opaque_value(owner: &str, value: &PropertyValue, out: &mut BTreeSet<String>) {
    match value {
        PropertyValue::Raw(bytes) if !bytes.is_empty() => {
            out.insert(owner.to_string());
        }
        PropertyValue::Array(items) => items.iter().for_each(|v| collect_opaque_value(owner, v, out)),
        PropertyValue::ClassArray(slots) => slots
            .iter()
            .filter_map(ClassSlot::class)
            .for_each(|c| collect_opaque(c, out)),
        PropertyValue::SmartPtr(Some(slot)) => {
            if let Some(class) = slot.class() {
                collect_opaque(class, out);
            }
        }
        _ => {}
    }
}

/// Clear `table` unless undecoded class bytes could still hold indices into it
///
/// Opaque spans, raw class data and raw property values all count, nested
/// classes included.
///
/// Returns the names of the blocking classes when refusing. With `force`
/// the table is cleared regardless.
pub fn clear_string_table_safe<'a>(
    classes: impl IntoIterator<Item = &'a G3Class>,
    table: &mut StringTable,
    force: bool,
) -> std::result::Result<(), BTreeSet<String>> {
    let mut blocking = BTreeSet::new();
    for class in classes {
        collect_opaque(class, &mut blocking);
    }
    if !blocking.is_empty() && !force {
        return Err(blocking);
    }
    table.clear();
    Ok(())
}
