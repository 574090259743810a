//! Reference resolution: turn identifier references into typed handles.
//!
//! Resolution runs once per package and fails on the first broken
//! reference. The result is an arena of per-entity link records indexed by
//! [`UnitIndex`], [`DataObjectIndex`], [`MetadataIndex`] and [`BehaviorIndex`],
//! plus an identifier table for O(1) lookups.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::behavior::BehaviorObject;
use crate::content::ContentUnit;
use crate::data::DataObject;
use crate::error::ResolutionError;
use crate::metadata::MetadataObject;
use crate::package::Package;
use crate::tree::Element;
use crate::types::{
    BehaviorIndex, Category, DataObjectIndex, EntityKind, Id, MetadataIndex, UnitIndex,
};

/// What an identifier names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntityRef {
    ContentUnit(UnitIndex),
    DataObject(DataObjectIndex),
    ByteStream {
        data_object: DataObjectIndex,
        stream: usize,
    },
    Metadata(MetadataIndex),
    Behavior(BehaviorIndex),
    /// An identified sub-element (reference, transform, pointer...).
    Other(EntityKind),
}

impl EntityRef {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::ContentUnit(_) => EntityKind::ContentUnit,
            EntityRef::DataObject(_) => EntityKind::DataObject,
            EntityRef::ByteStream { .. } => EntityKind::ByteStream,
            EntityRef::Metadata(_) => EntityKind::MetadataObject,
            EntityRef::Behavior(_) => EntityKind::BehaviorObject,
            EntityRef::Other(kind) => *kind,
        }
    }
}

/// Resolved relations of one content unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnitLinks {
    /// Child positions from the root down to this unit.
    pub path: Vec<usize>,
    pub parent: Option<UnitIndex>,
    /// Children in presentation order (`order` hints applied).
    pub children: Vec<UnitIndex>,
    pub data_object: Option<DataObjectIndex>,
    pub representation: Vec<MetadataIndex>,
    pub descriptive: Vec<MetadataIndex>,
    pub preservation: Vec<MetadataIndex>,
    pub any_metadata: Vec<MetadataIndex>,
    pub behavior: Option<BehaviorIndex>,
}

impl UnitLinks {
    /// Distance from the root (the root has depth 0).
    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

/// Resolved relations of one data object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DataObjectLinks {
    /// Targets of the data object's `repID`, in declared order.
    pub representation: Vec<MetadataIndex>,
    /// Content units pointing at this data object.
    pub unit_referrers: Vec<UnitIndex>,
    /// Metadata objects whose body points at this data object.
    pub metadata_referrers: Vec<MetadataIndex>,
    /// Behaviors with an input parameter pointing at this data object.
    pub behavior_referrers: Vec<BehaviorIndex>,
}

impl DataObjectLinks {
    /// Whether anything in the package points at this data object.
    pub fn is_referenced(&self) -> bool {
        !(self.unit_referrers.is_empty()
            && self.metadata_referrers.is_empty()
            && self.behavior_referrers.is_empty())
    }
}

/// Resolved relations of one metadata object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetadataLinks {
    /// Target of a pointer body.
    pub data_object: Option<DataObjectIndex>,
    pub unit_referrers: Vec<UnitIndex>,
    /// Data objects naming this metadata as representation.
    pub data_object_referrers: Vec<DataObjectIndex>,
}

/// Resolved relations of one behavior object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BehaviorLinks {
    pub parameter_data_objects: Vec<DataObjectIndex>,
    pub unit_referrers: Vec<UnitIndex>,
}

/// A package whose references are all resolved.
///
/// Owns the package; every relation is a handle into it.
#[derive(Debug, Clone)]
pub struct ResolvedGraph {
    package: Package,
    units: Vec<UnitLinks>,
    data_objects: Vec<DataObjectLinks>,
    metadata: Vec<MetadataLinks>,
    behaviors: Vec<BehaviorLinks>,
    identifiers: HashMap<String, EntityRef>,
}

impl ResolvedGraph {
    pub fn package(&self) -> &Package {
        &self.package
    }

    pub fn into_package(self) -> Package {
        self.package
    }

    /// Re-emit the package as a generic tree.
    pub fn to_element(&self) -> Element {
        self.package.to_element()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Content units
    // ─────────────────────────────────────────────────────────────────────────

    pub fn root(&self) -> UnitIndex {
        UnitIndex(0)
    }

    /// Content units in pre-order.
    pub fn units(&self) -> impl Iterator<Item = UnitIndex> + '_ {
        (0..self.units.len()).map(UnitIndex)
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// The content unit behind a handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not come from this graph.
    pub fn unit(&self, index: UnitIndex) -> &ContentUnit {
        self.units[index.0]
            .path
            .iter()
            .fold(&self.package.root, |unit, &i| unit.children[i].unit())
    }

    pub fn unit_links(&self, index: UnitIndex) -> &UnitLinks {
        &self.units[index.0]
    }

    pub fn parent(&self, index: UnitIndex) -> Option<UnitIndex> {
        self.units[index.0].parent
    }

    /// Ancestors from the parent up to the root.
    pub fn ancestors(&self, index: UnitIndex) -> impl Iterator<Item = UnitIndex> + '_ {
        std::iter::successors(self.parent(index), |&i| self.parent(i))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Data objects
    // ─────────────────────────────────────────────────────────────────────────

    pub fn data_objects(&self) -> impl Iterator<Item = DataObjectIndex> + '_ {
        (0..self.data_objects.len()).map(DataObjectIndex)
    }

    pub fn data_object(&self, index: DataObjectIndex) -> &DataObject {
        &self.package.data_objects()[index.0]
    }

    pub fn data_object_links(&self, index: DataObjectIndex) -> &DataObjectLinks {
        &self.data_objects[index.0]
    }

    /// Look up a data object by identifier.
    pub fn data_object_by_id(&self, id: &str) -> Option<DataObjectIndex> {
        match self.identifiers.get(id) {
            Some(EntityRef::DataObject(index)) => Some(*index),
            _ => None,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Metadata
    // ─────────────────────────────────────────────────────────────────────────

    pub fn metadata_objects(&self) -> impl Iterator<Item = MetadataIndex> + '_ {
        (0..self.metadata.len()).map(MetadataIndex)
    }

    pub fn metadata(&self, index: MetadataIndex) -> &MetadataObject {
        &self.package.metadata_objects()[index.0]
    }

    pub fn metadata_links(&self, index: MetadataIndex) -> &MetadataLinks {
        &self.metadata[index.0]
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Behaviors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn behaviors(&self) -> impl Iterator<Item = BehaviorIndex> + '_ {
        (0..self.behaviors.len()).map(BehaviorIndex)
    }

    pub fn behavior(&self, index: BehaviorIndex) -> &BehaviorObject {
        &self.package.behavior_objects()[index.0]
    }

    pub fn behavior_links(&self, index: BehaviorIndex) -> &BehaviorLinks {
        &self.behaviors[index.0]
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Identifiers
    // ─────────────────────────────────────────────────────────────────────────

    /// What an identifier names, if it is declared.
    pub fn lookup(&self, id: &str) -> Option<EntityRef> {
        self.identifiers.get(id).copied()
    }

    pub fn identifier_count(&self) -> usize {
        self.identifiers.len()
    }
}

/// Resolve every identifier reference of a package.
pub fn resolve(package: Package) -> Result<ResolvedGraph, ResolutionError> {
    let mut resolver = Resolver::default();

    // 1. Declare every identifier and lay out the unit arena
    resolver.declare_units(&package.root, Vec::new(), None)?;
    resolver.declare_data_objects(package.data_objects())?;
    resolver.declare_metadata(package.metadata_objects())?;
    resolver.declare_behaviors(package.behavior_objects())?;

    // 2. Resolve references by role
    resolver.link_units(&package.root)?;
    resolver.link_data_objects(package.data_objects())?;
    resolver.link_metadata(package.metadata_objects())?;
    resolver.link_behaviors(package.behavior_objects())?;

    // 3. The representation relation must be acyclic
    resolver.check_representation_cycles(&package)?;

    debug!(
        units = resolver.units.len(),
        data_objects = resolver.data_objects.len(),
        metadata = resolver.metadata.len(),
        behaviors = resolver.behaviors.len(),
        identifiers = resolver.identifiers.len(),
        "resolved package"
    );

    Ok(ResolvedGraph {
        package,
        units: resolver.units,
        data_objects: resolver.data_objects,
        metadata: resolver.metadata,
        behaviors: resolver.behaviors,
        identifiers: resolver.identifiers,
    })
}

const REPRESENTATION: &[Category] = &[Category::Rep, Category::Any];
const DESCRIPTIVE: &[Category] = &[Category::Dmd, Category::Any];
const PRESERVATION: &[Category] = &[Category::Pdi, Category::Any];

#[derive(Default)]
struct Resolver {
    units: Vec<UnitLinks>,
    data_objects: Vec<DataObjectLinks>,
    metadata: Vec<MetadataLinks>,
    behaviors: Vec<BehaviorLinks>,
    identifiers: HashMap<String, EntityRef>,
    categories: HashMap<MetadataIndex, Option<Category>>,
}

impl Resolver {
    fn declare(&mut self, id: &Id, entity: EntityRef) -> Result<(), ResolutionError> {
        if let Some(existing) = self.identifiers.get(id.as_str()) {
            return Err(ResolutionError::DuplicateIdentifier {
                id: id.to_string(),
                first: existing.kind(),
                second: entity.kind(),
            });
        }
        self.identifiers.insert(id.to_string(), entity);
        Ok(())
    }

    fn declare_opt(&mut self, id: Option<&Id>, kind: EntityKind) -> Result<(), ResolutionError> {
        match id {
            Some(id) => self.declare(id, EntityRef::Other(kind)),
            None => Ok(()),
        }
    }

    fn declare_units(
        &mut self,
        unit: &ContentUnit,
        path: Vec<usize>,
        parent: Option<UnitIndex>,
    ) -> Result<UnitIndex, ResolutionError> {
        let index = UnitIndex(self.units.len());
        self.units.push(UnitLinks {
            path: path.clone(),
            parent,
            ..Default::default()
        });
        if let Some(id) = &unit.id {
            self.declare(id, EntityRef::ContentUnit(index))?;
        }
        if let Some(pointer) = &unit.data_object_pointer {
            self.declare_opt(pointer.id.as_ref(), EntityKind::DataObjectPointer)?;
        }
        // Arena slots follow document order; `children` follows order hints.
        let mut declared = Vec::with_capacity(unit.children.len());
        for (position, child) in unit.children.iter().enumerate() {
            let mut child_path = path.clone();
            child_path.push(position);
            declared.push(self.declare_units(child.unit(), child_path, Some(index))?);
        }
        self.units[index.0].children = unit
            .child_order()
            .into_iter()
            .map(|position| declared[position])
            .collect();
        Ok(index)
    }

    fn declare_data_objects(&mut self, objects: &[DataObject]) -> Result<(), ResolutionError> {
        for (i, object) in objects.iter().enumerate() {
            let index = DataObjectIndex(i);
            self.data_objects.push(DataObjectLinks::default());
            self.declare(&object.id, EntityRef::DataObject(index))?;
            for transform in &object.transforms {
                self.declare_opt(transform.id.as_ref(), EntityKind::Transform)?;
            }
            for (stream_index, stream) in object.byte_streams.iter().enumerate() {
                if let Some(id) = &stream.id {
                    self.declare(
                        id,
                        EntityRef::ByteStream {
                            data_object: index,
                            stream: stream_index,
                        },
                    )?;
                }
                self.declare_opt(stream.file_location.id.as_ref(), EntityKind::FileLocation)?;
                for transform in &stream.transforms {
                    self.declare_opt(transform.id.as_ref(), EntityKind::Transform)?;
                }
            }
        }
        Ok(())
    }

    fn declare_metadata(&mut self, objects: &[MetadataObject]) -> Result<(), ResolutionError> {
        use crate::metadata::MetadataBody;

        for (i, object) in objects.iter().enumerate() {
            let index = MetadataIndex(i);
            self.metadata.push(MetadataLinks::default());
            self.categories.insert(index, object.category);
            self.declare(&object.id, EntityRef::Metadata(index))?;
            match &object.body {
                MetadataBody::Reference(r) => {
                    self.declare_opt(r.reference.id.as_ref(), EntityKind::MetadataReference)?
                }
                MetadataBody::Pointer(p) => {
                    self.declare_opt(p.id.as_ref(), EntityKind::DataObjectPointer)?
                }
                MetadataBody::Wrap(_) => {}
            }
        }
        Ok(())
    }

    fn declare_behaviors(&mut self, objects: &[BehaviorObject]) -> Result<(), ResolutionError> {
        for (i, object) in objects.iter().enumerate() {
            self.behaviors.push(BehaviorLinks::default());
            self.declare(&object.id, EntityRef::Behavior(BehaviorIndex(i)))?;
            if let Some(interface) = &object.interface_definition {
                self.declare_opt(interface.reference.id.as_ref(), EntityKind::InterfaceDefinition)?;
            }
            for mechanism in &object.mechanisms {
                self.declare_opt(mechanism.reference().id.as_ref(), EntityKind::Mechanism)?;
            }
            for pointer in object.parameter_pointers() {
                self.declare_opt(pointer.id.as_ref(), EntityKind::DataObjectPointer)?;
            }
        }
        Ok(())
    }

    fn target(&self, id: &Id, role: &'static str, from: &str) -> Result<EntityRef, ResolutionError> {
        self.identifiers
            .get(id.as_str())
            .copied()
            .ok_or_else(|| ResolutionError::UnresolvedReference {
                reference: id.to_string(),
                role,
                from: from.to_string(),
            })
    }

    /// Resolve a metadata reference whose category must be one of `allowed`
    /// (or absent). An empty `allowed` accepts every category.
    fn expect_metadata(
        &self,
        id: &Id,
        role: &'static str,
        from: &str,
        allowed: &[Category],
    ) -> Result<MetadataIndex, ResolutionError> {
        let expected = match allowed {
            [] => "a metadata object",
            [Category::Rep, ..] => "a metadata object of category REP or ANY",
            [Category::Dmd, ..] => "a metadata object of category DMD or ANY",
            _ => "a metadata object of category PDI or ANY",
        };
        let wrong = |found: String| ResolutionError::WrongReferenceKind {
            reference: id.to_string(),
            role,
            from: from.to_string(),
            expected,
            found,
        };
        match self.target(id, role, from)? {
            EntityRef::Metadata(index) => match self.categories.get(&index).copied().flatten() {
                Some(category) if !allowed.is_empty() && !allowed.contains(&category) => {
                    Err(wrong(format!("a metadata object of category {category}")))
                }
                _ => Ok(index),
            },
            other => Err(wrong(format!("a {}", other.kind()))),
        }
    }

    fn expect_data_object(
        &self,
        id: &Id,
        role: &'static str,
        from: &str,
    ) -> Result<DataObjectIndex, ResolutionError> {
        match self.target(id, role, from)? {
            EntityRef::DataObject(index) => Ok(index),
            other => Err(ResolutionError::WrongReferenceKind {
                reference: id.to_string(),
                role,
                from: from.to_string(),
                expected: "a data object",
                found: format!("a {}", other.kind()),
            }),
        }
    }

    fn expect_behavior(
        &self,
        id: &Id,
        role: &'static str,
        from: &str,
    ) -> Result<BehaviorIndex, ResolutionError> {
        match self.target(id, role, from)? {
            EntityRef::Behavior(index) => Ok(index),
            other => Err(ResolutionError::WrongReferenceKind {
                reference: id.to_string(),
                role,
                from: from.to_string(),
                expected: "a behavior object",
                found: format!("a {}", other.kind()),
            }),
        }
    }

    fn metadata_list(
        &self,
        ids: &[Id],
        role: &'static str,
        from: &str,
        allowed: &[Category],
    ) -> Result<Vec<MetadataIndex>, ResolutionError> {
        ids.iter()
            .map(|id| self.expect_metadata(id, role, from, allowed))
            .collect()
    }

    fn link_units(&mut self, root: &ContentUnit) -> Result<(), ResolutionError> {
        // Pre-order walk matches the arena layout of `declare_units`.
        let mut stack = vec![root];
        let mut index = 0;
        while let Some(unit) = stack.pop() {
            let here = UnitIndex(index);
            let from = unit.label();

            let representation = self.metadata_list(&unit.rep_ids, "repID", &from, REPRESENTATION)?;
            let descriptive = self.metadata_list(&unit.dmd_ids, "dmdID", &from, DESCRIPTIVE)?;
            let preservation = self.metadata_list(&unit.pdi_ids, "pdiID", &from, PRESERVATION)?;
            let any_metadata = self.metadata_list(&unit.any_md_ids, "anyMdID", &from, &[])?;
            let behavior = unit
                .behavior_id
                .as_ref()
                .map(|id| self.expect_behavior(id, "behaviorID", &from))
                .transpose()?;
            let data_object = unit
                .data_object_pointer
                .as_ref()
                .map(|p| self.expect_data_object(&p.data_object_id, "dataObjectID", &from))
                .transpose()?;

            for m in representation
                .iter()
                .chain(&descriptive)
                .chain(&preservation)
                .chain(&any_metadata)
            {
                let referrers = &mut self.metadata[m.0].unit_referrers;
                if !referrers.contains(&here) {
                    referrers.push(here);
                }
            }
            if let Some(b) = behavior {
                self.behaviors[b.0].unit_referrers.push(here);
            }
            if let Some(d) = data_object {
                self.data_objects[d.0].unit_referrers.push(here);
            }

            let links = &mut self.units[index];
            links.representation = representation;
            links.descriptive = descriptive;
            links.preservation = preservation;
            links.any_metadata = any_metadata;
            links.behavior = behavior;
            links.data_object = data_object;

            stack.extend(unit.children.iter().rev().map(|c| c.unit()));
            index += 1;
        }
        Ok(())
    }

    fn link_data_objects(&mut self, objects: &[DataObject]) -> Result<(), ResolutionError> {
        for (i, object) in objects.iter().enumerate() {
            let from = format!("data object '{}'", object.id);
            let representation =
                self.metadata_list(&object.rep_ids, "repID", &from, REPRESENTATION)?;
            for m in &representation {
                self.metadata[m.0].data_object_referrers.push(DataObjectIndex(i));
            }
            self.data_objects[i].representation = representation;
        }
        Ok(())
    }

    fn link_metadata(&mut self, objects: &[MetadataObject]) -> Result<(), ResolutionError> {
        for (i, object) in objects.iter().enumerate() {
            if let Some(target) = object.body.data_object_id() {
                let from = format!("metadata object '{}'", object.id);
                let d = self.expect_data_object(target, "dataObjectID", &from)?;
                self.metadata[i].data_object = Some(d);
                self.data_objects[d.0].metadata_referrers.push(MetadataIndex(i));
            }
        }
        Ok(())
    }

    fn link_behaviors(&mut self, objects: &[BehaviorObject]) -> Result<(), ResolutionError> {
        for (i, object) in objects.iter().enumerate() {
            let from = format!("behavior object '{}'", object.id);
            for pointer in object.parameter_pointers() {
                let d = self.expect_data_object(&pointer.data_object_id, "dataObjectID", &from)?;
                self.behaviors[i].parameter_data_objects.push(d);
                let referrers = &mut self.data_objects[d.0].behavior_referrers;
                if !referrers.contains(&BehaviorIndex(i)) {
                    referrers.push(BehaviorIndex(i));
                }
            }
        }
        Ok(())
    }

    /// Depth-first search over data object -> representation metadata ->
    /// pointed-at data object.
    fn check_representation_cycles(&self, package: &Package) -> Result<(), ResolutionError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            Active,
            Done,
        }

        fn visit(
            resolver: &Resolver,
            package: &Package,
            node: DataObjectIndex,
            marks: &mut [Mark],
            trail: &mut Vec<String>,
        ) -> Result<(), ResolutionError> {
            marks[node.0] = Mark::Active;
            trail.push(package.data_objects()[node.0].id.to_string());
            for m in &resolver.data_objects[node.0].representation {
                let Some(next) = resolver.metadata[m.0].data_object else {
                    continue;
                };
                trail.push(package.metadata_objects()[m.0].id.to_string());
                match marks[next.0] {
                    Mark::Active => {
                        let target = package.data_objects()[next.0].id.as_str();
                        let start = trail.iter().position(|s| s == target).unwrap_or(0);
                        let mut path = trail[start..].to_vec();
                        path.push(target.to_string());
                        return Err(ResolutionError::CyclicStructure { path });
                    }
                    Mark::Unvisited => visit(resolver, package, next, marks, trail)?,
                    Mark::Done => {}
                }
                trail.pop();
            }
            trail.pop();
            marks[node.0] = Mark::Done;
            Ok(())
        }

        let mut marks = vec![Mark::Unvisited; self.data_objects.len()];
        let mut trail = Vec::new();
        for i in 0..self.data_objects.len() {
            if marks[i] == Mark::Unvisited {
                visit(self, package, DataObjectIndex(i), &mut marks, &mut trail)?;
            }
        }
        Ok(())
    }
}
