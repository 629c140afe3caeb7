//! Type shapes: the cached structural facts the engine maps with
//!
//! A [`TypeShape`] is built once per concrete type from its `facet` shape and
//! never mutated afterwards. For structs it carries the field list, a name
//! index, the embedded-field map (fields promoted from `#[facet(flatten)]`
//! members, to any depth) and the flattened-field map (fields reachable
//! through named nested struct members, keyed by their joined path and by
//! their leaf name as the [`ConflictStrategy`] allows).
//!
//! Copyright (c) 2025 Mapwise Team
//! Licensed under the Apache-2.0 license

pub mod cache;

pub use cache::ShapeCache;

use crate::reflect::{describe, type_id, TypeDef};
use crate::settings::{ConflictStrategy, MapperSettings};
use facet_core::{Field, Shape};
use std::any::TypeId;
use std::collections::{HashMap, HashSet, VecDeque};

/// Positions of the struct fields to walk, outermost first
pub type FieldPath = Vec<usize>;

/// How nested struct fields are flattened into a shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenOptions {
    /// Levels of named nested structs to flatten
    pub depth: usize,
    pub conflict: ConflictStrategy,
    /// Also key fields by their joined path
    pub use_prefix: bool,
    pub separator: String,
}

impl FlattenOptions {
    pub fn from_settings(settings: &MapperSettings) -> Self {
        Self {
            depth: settings.flatten_depth,
            conflict: settings.flatten_conflict,
            use_prefix: settings.flatten_use_prefix,
            separator: settings.flatten_prefix_separator.clone(),
        }
    }

    fn join(&self, prefix: &str, name: &str) -> String {
        format!("{prefix}{}{name}", self.separator)
    }
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self::from_settings(&MapperSettings::default())
    }
}

/// One struct field as seen by the engine
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub position: usize,
    pub declared_type: &'static Shape,
    /// Struct, or pointer chain ending in a struct
    pub is_struct: bool,
    pub is_pointer: bool,
    /// Sequence or array
    pub is_slice: bool,
    pub is_map: bool,
    pub is_embedded: bool,
}

/// Cached structural description of one type
#[derive(Debug, Clone)]
pub struct TypeShape {
    pub shape: &'static Shape,
    pub kind: TypeDef,
    pub fields: Vec<FieldDescriptor>,
    pub fields_by_name: HashMap<&'static str, usize>,
    pub embedded_fields: HashMap<String, FieldPath>,
    pub flattened_fields: HashMap<String, FieldPath>,
}

impl TypeShape {
    /// Build the shape of `shape`
    ///
    /// Building never fails; non-struct types get empty field data.
    pub fn build(shape: &'static Shape, options: &FlattenOptions) -> Self {
        let kind = describe(shape);
        let mut built = Self {
            shape,
            kind,
            fields: Vec::new(),
            fields_by_name: HashMap::new(),
            embedded_fields: HashMap::new(),
            flattened_fields: HashMap::new(),
        };

        if let TypeDef::Struct(defs) = kind {
            built.fields = defs
                .iter()
                .enumerate()
                .map(|(position, field)| describe_field(position, field))
                .collect();
            built.fields_by_name = built
                .fields
                .iter()
                .map(|field| (field.name, field.position))
                .collect();
            built.embedded_fields = collect_embedded(shape, &built.fields_by_name);
            built.flattened_fields = collect_flattened(shape, &built.fields_by_name, options);
        }

        built
    }

    pub fn is_struct(&self) -> bool {
        self.kind.is_struct()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields_by_name.get(name).map(|&index| &self.fields[index])
    }

    /// Resolve a name through direct, embedded and flattened fields, in that order
    pub fn lookup(&self, name: &str) -> Option<FieldPath> {
        if let Some(&index) = self.fields_by_name.get(name) {
            return Some(vec![index]);
        }
        if let Some(path) = self.embedded_fields.get(name) {
            return Some(path.clone());
        }
        self.flattened_fields.get(name).cloned()
    }
}

fn describe_field(position: usize, field: &Field) -> FieldDescriptor {
    let declared = field.shape();
    let def = describe(declared);
    FieldDescriptor {
        name: field.name,
        position,
        declared_type: declared,
        is_struct: struct_behind_pointers(declared).is_some(),
        is_pointer: def.is_pointer(),
        is_slice: def.is_collection(),
        is_map: def.is_map(),
        is_embedded: field.is_flattened(),
    }
}

/// Follow pointer shapes; yields the struct at the end of the chain
pub fn struct_behind_pointers(shape: &'static Shape) -> Option<(&'static Shape, &'static [Field])> {
    let mut current = shape;
    loop {
        match describe(current) {
            TypeDef::Struct(fields) => return Some((current, fields)),
            TypeDef::Pointer(pointer) => current = pointer.elem,
            _ => return None,
        }
    }
}

/// Fields promoted from embedded members, shallowest first
///
/// A name already present in the outer struct, or already promoted from a
/// shallower (or earlier) embedded member, is never overwritten.
fn collect_embedded(
    root: &'static Shape,
    outer: &HashMap<&'static str, usize>,
) -> HashMap<String, FieldPath> {
    let mut promoted: HashMap<String, FieldPath> = HashMap::new();
    let mut queue: VecDeque<(&'static Shape, FieldPath, HashSet<TypeId>)> = VecDeque::new();

    let mut seen = HashSet::new();
    seen.insert(type_id(root));
    queue.push_back((root, Vec::new(), seen));

    while let Some((shape, prefix, seen)) = queue.pop_front() {
        let Some((_, fields)) = struct_behind_pointers(shape) else {
            continue;
        };
        for (position, field) in fields.iter().enumerate() {
            let mut path = prefix.clone();
            path.push(position);

            if !prefix.is_empty() && !outer.contains_key(field.name) {
                promoted
                    .entry(field.name.to_string())
                    .or_insert_with(|| path.clone());
            }

            if field.is_flattened() {
                if let Some((inner, _)) = struct_behind_pointers(field.shape()) {
                    if !seen.contains(&type_id(inner)) {
                        let mut seen = seen.clone();
                        seen.insert(type_id(inner));
                        queue.push_back((field.shape(), path, seen));
                    }
                }
            }
        }
    }

    promoted
}

/// A nested field competing for its leaf name
struct LeafCandidate {
    path: FieldPath,
    /// Name of the member the field was reached through
    parent: &'static str,
}

/// Fields reachable through nested struct members
///
/// Joined keys (embedded members contribute no segment) are claimed first,
/// shallowest first. Leaf names are then handed out per `options.conflict`.
/// Names of the outer struct are never shadowed.
fn collect_flattened(
    root: &'static Shape,
    outer: &HashMap<&'static str, usize>,
    options: &FlattenOptions,
) -> HashMap<String, FieldPath> {
    let mut flattened: HashMap<String, FieldPath> = HashMap::new();
    let mut leaves: Vec<(&'static str, LeafCandidate)> = Vec::new();

    struct Pending {
        shape: &'static Shape,
        prefix: FieldPath,
        joined: String,
        parent: &'static str,
        seen: HashSet<TypeId>,
        depth: usize,
    }

    let mut queue = VecDeque::new();
    queue.push_back(Pending {
        shape: root,
        prefix: Vec::new(),
        joined: String::new(),
        parent: "",
        seen: HashSet::from([type_id(root)]),
        depth: 0,
    });

    while let Some(pending) = queue.pop_front() {
        let Some((_, fields)) = struct_behind_pointers(pending.shape) else {
            continue;
        };
        for (position, field) in fields.iter().enumerate() {
            let mut path = pending.prefix.clone();
            path.push(position);

            let name = if pending.joined.is_empty() {
                field.name.to_string()
            } else {
                options.join(&pending.joined, field.name)
            };

            if pending.depth > 0 {
                if options.use_prefix && !outer.contains_key(name.as_str()) {
                    flattened.entry(name.clone()).or_insert_with(|| path.clone());
                }
                if !outer.contains_key(field.name) {
                    leaves.push((
                        field.name,
                        LeafCandidate {
                            path: path.clone(),
                            parent: pending.parent,
                        },
                    ));
                }
            }

            if pending.depth + 1 >= options.depth {
                continue;
            }
            if let Some((inner, _)) = struct_behind_pointers(field.shape()) {
                if pending.seen.contains(&type_id(inner)) {
                    continue;
                }
                let mut seen = pending.seen.clone();
                seen.insert(type_id(inner));
                let joined = if field.is_flattened() {
                    pending.joined.clone()
                } else {
                    name
                };
                queue.push_back(Pending {
                    shape: field.shape(),
                    prefix: path,
                    joined,
                    parent: field.name,
                    seen,
                    depth: pending.depth + 1,
                });
            }
        }
    }

    resolve_leaves(&mut flattened, leaves, options);
    flattened
}

fn resolve_leaves(
    flattened: &mut HashMap<String, FieldPath>,
    leaves: Vec<(&'static str, LeafCandidate)>,
    options: &FlattenOptions,
) {
    let mut order: Vec<&'static str> = Vec::new();
    let mut by_leaf: HashMap<&'static str, Vec<LeafCandidate>> = HashMap::new();
    for (leaf, candidate) in leaves {
        let candidates = by_leaf.entry(leaf).or_default();
        if candidates.is_empty() {
            order.push(leaf);
        }
        candidates.push(candidate);
    }

    for leaf in order {
        let Some(mut candidates) = by_leaf.remove(leaf) else {
            continue;
        };
        if candidates.len() == 1 {
            let only = candidates.remove(0);
            flattened.entry(leaf.to_string()).or_insert(only.path);
            continue;
        }
        match options.conflict {
            ConflictStrategy::KeepFirst => {
                let first = candidates.remove(0);
                flattened.entry(leaf.to_string()).or_insert(first.path);
            }
            ConflictStrategy::KeepLast => {
                if let Some(last) = candidates.pop() {
                    flattened.entry(leaf.to_string()).or_insert(last.path);
                }
            }
            ConflictStrategy::Skip => {
                tracing::trace!(leaf, "ambiguous flattened leaf name skipped");
            }
            ConflictStrategy::UsePrefix => {
                let mut rest = candidates.into_iter();
                if let Some(first) = rest.next() {
                    flattened.entry(leaf.to_string()).or_insert(first.path);
                }
                for candidate in rest {
                    let key = options.join(candidate.parent, leaf);
                    flattened.entry(key).or_insert(candidate.path);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use facet::Facet;

    #[derive(Debug, Default, Facet)]
    struct Base {
        id: i64,
        created_at: DateTime<Utc>,
    }

    #[derive(Debug, Default, Facet)]
    struct Audit {
        #[facet(flatten)]
        base: Base,
        created_by: String,
    }

    #[derive(Debug, Default, Facet)]
    struct Record {
        #[facet(flatten)]
        audit: Audit,
        id: String,
        name: String,
    }

    #[derive(Debug, Default, Facet)]
    struct Level3 {
        value3: String,
    }

    #[derive(Debug, Default, Facet)]
    struct Level2 {
        level3: Option<Box<Level3>>,
        value2: String,
    }

    #[derive(Debug, Default, Facet)]
    struct Level1 {
        level2: Level2,
        value1: String,
    }

    #[derive(Debug, Default, Facet)]
    struct Node {
        label: String,
        next: Option<Box<Node>>,
    }

    #[derive(Debug, Default, Facet)]
    struct Home {
        city: String,
    }

    #[derive(Debug, Default, Facet)]
    struct Work {
        city: String,
        floor: u8,
    }

    #[derive(Debug, Default, Facet)]
    struct Contact {
        home: Home,
        work: Work,
    }

    fn options(conflict: ConflictStrategy, use_prefix: bool) -> FlattenOptions {
        FlattenOptions {
            conflict,
            use_prefix,
            ..Default::default()
        }
    }

    #[test]
    fn test_field_descriptors() {
        let shape = TypeShape::build(Level2::SHAPE, &FlattenOptions::default());
        assert!(shape.is_struct());
        let level3 = shape.field("level3").unwrap();
        assert!(level3.is_pointer);
        assert!(level3.is_struct);
        assert_eq!(level3.position, 0);
        assert!(!shape.field("value2").unwrap().is_struct);
    }

    #[test]
    fn test_embedded_promotion_outer_wins() {
        let shape = TypeShape::build(Record::SHAPE, &FlattenOptions::default());
        assert!(shape.field("audit").unwrap().is_embedded);
        // `id` exists on Record itself, so Base::id is not promoted over it.
        assert!(!shape.embedded_fields.contains_key("id"));
        assert_eq!(shape.embedded_fields["created_by"], vec![0, 1]);
        assert_eq!(shape.embedded_fields["created_at"], vec![0, 0, 1]);
        assert_eq!(shape.lookup("id"), Some(vec![1]));
    }

    #[test]
    fn test_flattened_paths_and_leaf_names() {
        let shape = TypeShape::build(Level1::SHAPE, &FlattenOptions::default());
        assert_eq!(shape.flattened_fields["level2_value2"], vec![0, 1]);
        assert_eq!(shape.flattened_fields["level2_level3_value3"], vec![0, 0, 0]);
        assert_eq!(shape.flattened_fields["value3"], vec![0, 0, 0]);
        assert_eq!(shape.lookup("value2"), Some(vec![0, 1]));
        assert!(!shape.flattened_fields.contains_key("value1"));
    }

    #[test]
    fn test_flatten_depth_limit() {
        let options = FlattenOptions {
            depth: 2,
            ..Default::default()
        };
        let shape = TypeShape::build(Level1::SHAPE, &options);
        assert!(shape.flattened_fields.contains_key("level2_value2"));
        assert!(!shape.flattened_fields.contains_key("level2_level3_value3"));
    }

    #[test]
    fn test_custom_separator() {
        let options = FlattenOptions {
            separator: "__".to_string(),
            ..Default::default()
        };
        let shape = TypeShape::build(Level1::SHAPE, &options);
        assert_eq!(shape.flattened_fields["level2__level3__value3"], vec![0, 0, 0]);
        assert!(!shape.flattened_fields.contains_key("level2_value2"));
    }

    #[test]
    fn test_leaf_conflict_strategies() {
        let build = |conflict, use_prefix| {
            TypeShape::build(Contact::SHAPE, &options(conflict, use_prefix)).flattened_fields
        };

        let first = build(ConflictStrategy::KeepFirst, true);
        assert_eq!(first["city"], vec![0, 0]);
        assert_eq!(first["work_city"], vec![1, 0]);
        assert_eq!(first["floor"], vec![1, 1]);

        assert_eq!(build(ConflictStrategy::KeepLast, true)["city"], vec![1, 0]);

        let skipped = build(ConflictStrategy::Skip, true);
        assert!(!skipped.contains_key("city"));
        assert_eq!(skipped["home_city"], vec![0, 0]);

        let prefixed = build(ConflictStrategy::UsePrefix, false);
        assert_eq!(prefixed["city"], vec![0, 0]);
        assert_eq!(prefixed["work_city"], vec![1, 0]);
        assert!(!prefixed.contains_key("home_city"));
    }

    #[test]
    fn test_without_prefix_only_leaves_register() {
        let shape = TypeShape::build(Level1::SHAPE, &options(ConflictStrategy::KeepFirst, false));
        assert!(!shape.flattened_fields.contains_key("level2_value2"));
        assert_eq!(shape.lookup("value3"), Some(vec![0, 0, 0]));
    }

    #[test]
    fn test_recursive_type_terminates() {
        let shape = TypeShape::build(Node::SHAPE, &FlattenOptions::default());
        assert_eq!(shape.fields.len(), 2);
        assert!(shape.flattened_fields.is_empty());
    }

    #[test]
    fn test_non_struct_shape_is_empty() {
        let shape = TypeShape::build(<Vec<i32>>::SHAPE, &FlattenOptions::default());
        assert!(shape.fields.is_empty());
        assert!(shape.kind.element().is_some_and(|elem| elem.is_type::<i32>()));
    }
}
