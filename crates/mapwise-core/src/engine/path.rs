//! Source field resolution
//!
//! Resolves a target field name, or a dotted source path such as
//! `company.address.city`, against a source value. Each segment may cross
//! struct fields (direct, embedded or flattened), pointers, and maps keyed
//! by strings or integers. Any nil, missing or unsupported segment makes the
//! whole path unresolved.
//!
//! Values behind a lock are only readable while its guard is held, so the
//! walkers hand the value they reach to a continuation instead of returning
//! it.

use crate::error::{Error, Result};
use crate::reflect::{
    describe, follow, scalar, unwrap_all_pointers, Pointee, Scalar, ScalarKind, TypeDef,
};
use crate::shape::{struct_behind_pointers, ShapeCache};
use facet_core::{Def, Shape};
use facet_reflect::Peek;

/// Follow pointers until a non-pointer value; `None` on nil
pub fn deref_all<R, F>(value: Peek<'_, 'static>, f: F) -> Result<R>
where
    F: for<'x> FnOnce(Option<Peek<'x, 'static>>) -> Result<R>,
{
    if !describe(value.shape()).is_pointer() {
        return f(Some(value));
    }
    match follow(value) {
        Pointee::Nil => f(None),
        Pointee::Borrowed(inner) => deref_all(inner, f),
        Pointee::Locked(locked) => deref_all(locked.peek(), f),
        Pointee::Unreachable => Err(Error::UnreachablePointee {
            pointer_type: value.shape().to_string(),
        }),
    }
}

/// Walk positional struct fields, dereferencing pointers between steps
///
/// The value at the end of the path is passed on as is, pointer or not.
pub fn walk_fields<R, F>(value: Peek<'_, 'static>, path: &[usize], f: F) -> Result<R>
where
    F: for<'x> FnOnce(Option<Peek<'x, 'static>>) -> Result<R>,
{
    let Some((&index, rest)) = path.split_first() else {
        return f(Some(value));
    };
    deref_all(value, move |parent| {
        let field = parent
            .and_then(|parent| parent.into_struct().ok())
            .and_then(|fields| fields.field(index).ok());
        match field {
            Some(field) => walk_fields(field, rest, f),
            None => f(None),
        }
    })
}

/// Resolve a dotted path against a source value
pub fn resolve<R, F>(
    shapes: &ShapeCache,
    value: Peek<'_, 'static>,
    path: &str,
    f: F,
) -> Result<R>
where
    F: for<'x> FnOnce(Option<Peek<'x, 'static>>) -> Result<R>,
{
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return f(None);
    }
    resolve_segments(shapes, value, &segments, f)
}

fn resolve_segments<R, F>(
    shapes: &ShapeCache,
    value: Peek<'_, 'static>,
    segments: &[&str],
    f: F,
) -> Result<R>
where
    F: for<'x> FnOnce(Option<Peek<'x, 'static>>) -> Result<R>,
{
    let Some((&segment, rest)) = segments.split_first() else {
        return f(Some(value));
    };
    deref_all(value, move |current| {
        let Some(current) = current else {
            return f(None);
        };
        if let Def::Map(_) = current.shape().def {
            // Last entry wins, as when the map is rebuilt.
            let found = current
                .into_map()?
                .iter()
                .filter(|(key, _)| key_matches(*key, segment))
                .last();
            return match found {
                Some((_, entry)) => resolve_segments(shapes, entry, rest, f),
                None => f(None),
            };
        }
        if !describe(current.shape()).is_struct() {
            return f(None);
        }
        let Some(field_path) = shapes.get_or_build(current.shape()).lookup(segment) else {
            return f(None);
        };
        walk_fields(current, &field_path, move |found| match found {
            Some(found) => resolve_segments(shapes, found, rest, f),
            None => f(None),
        })
    })
}

fn key_matches(key: Peek<'_, 'static>, segment: &str) -> bool {
    match scalar::read(key) {
        Some(Scalar::Str(s)) => s == segment,
        Some(Scalar::Int(i)) => segment.parse::<i64>().map_or(false, |p| p == i),
        Some(Scalar::Uint(u)) => segment.parse::<u64>().map_or(false, |p| p == u),
        _ => false,
    }
}

/// Declared type at the end of a positional field path
pub fn type_at(root: &'static Shape, path: &[usize]) -> Option<&'static Shape> {
    let mut current = root;
    for &index in path {
        let (_, fields) = struct_behind_pointers(current)?;
        current = fields.get(index)?.shape();
    }
    Some(current)
}

/// Resolve a dotted path against a type instead of a value
///
/// Map segments resolve to the map's value type when its keys are strings
/// or integers.
pub fn resolve_type(
    shapes: &ShapeCache,
    root: &'static Shape,
    path: &str,
) -> Option<&'static Shape> {
    let mut current = root;
    for segment in path.split('.') {
        if segment.is_empty() {
            return None;
        }
        let shape = unwrap_all_pointers(current);
        current = match describe(shape) {
            TypeDef::Struct(_) => type_at(shape, &shapes.get_or_build(shape).lookup(segment)?)?,
            TypeDef::Map(key, value) => match describe(key) {
                TypeDef::Scalar(kind) if kind.is_integer() || kind == ScalarKind::String => value,
                _ => return None,
            },
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::FlattenOptions;
    use facet::Facet;
    use std::collections::HashMap;
    use std::sync::{Arc, RwLock};

    #[derive(Debug, Default, Facet)]
    struct Address {
        city: String,
    }

    #[derive(Debug, Default, Facet)]
    struct Company {
        address: Option<Box<Address>>,
        tags: HashMap<String, i32>,
    }

    #[derive(Debug, Default, Facet)]
    struct Person {
        company: Arc<RwLock<Company>>,
    }

    fn person(address: Option<Address>) -> Person {
        Person {
            company: Arc::new(RwLock::new(Company {
                address: address.map(Box::new),
                tags: HashMap::from([("vip".to_string(), 3)]),
            })),
        }
    }

    fn lookup(shapes: &ShapeCache, person: &Person, path: &str) -> Option<Scalar> {
        resolve(shapes, Peek::new(person), path, |found| {
            Ok(found.and_then(scalar::read))
        })
        .unwrap()
    }

    #[test]
    fn test_resolve_through_pointers_and_locks() {
        let shapes = ShapeCache::new(FlattenOptions::default());
        let person = person(Some(Address { city: "Oslo".into() }));
        assert_eq!(
            lookup(&shapes, &person, "company.address.city"),
            Some(Scalar::Str("Oslo".into()))
        );
        assert!(person.company.try_write().is_ok());
    }

    #[test]
    fn test_nil_segment_is_unresolved() {
        let shapes = ShapeCache::new(FlattenOptions::default());
        let person = person(None);
        assert_eq!(lookup(&shapes, &person, "company.address.city"), None);
        assert_eq!(lookup(&shapes, &person, "company.missing"), None);
        assert_eq!(lookup(&shapes, &person, "company..address"), None);
    }

    #[test]
    fn test_map_segment() {
        let shapes = ShapeCache::new(FlattenOptions::default());
        let person = person(None);
        assert_eq!(lookup(&shapes, &person, "company.tags.vip"), Some(Scalar::Int(3)));
        assert_eq!(lookup(&shapes, &person, "company.tags.other"), None);
    }

    #[test]
    fn test_walk_fields_passes_last_value_through() {
        let company = Company {
            address: Some(Box::new(Address { city: "Rome".into() })),
            tags: HashMap::new(),
        };
        let is_pointer = walk_fields(Peek::new(&company), &[0], |found| {
            Ok(found.is_some_and(|value| describe(value.shape()).is_pointer()))
        })
        .unwrap();
        assert!(is_pointer);

        let city = walk_fields(Peek::new(&company), &[0, 0], |found| {
            Ok(found.and_then(scalar::read))
        })
        .unwrap();
        assert_eq!(city, Some(Scalar::Str("Rome".into())));
    }

    #[test]
    fn test_resolve_type() {
        let shapes = ShapeCache::new(FlattenOptions::default());
        let root = Person::SHAPE;
        let resolved = |path| resolve_type(&shapes, root, path);
        assert!(resolved("company.address.city").is_some_and(|s| s.is_type::<String>()));
        assert!(resolved("company.tags.anything").is_some_and(|s| s.is_type::<i32>()));
        assert!(resolved("company.zip").is_none());
        // Named nested members are flattened, so the leaf name resolves too.
        assert!(resolved("company.city").is_some_and(|s| s.is_type::<String>()));
    }
}
