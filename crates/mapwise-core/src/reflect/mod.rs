//! Type classification over `facet` shapes
//!
//! Mappable types derive [`facet::Facet`]. The engine never names them: it
//! classifies each [`Shape`] into a [`TypeDef`], reads values through
//! [`Peek`] and writes new ones through a [`Partial`] builder.
//!
//! A member marked `#[facet(flatten)]` is an embedded member: its fields
//! are promoted into the containing struct for name matching. A
//! `#[facet(transparent)]` single-field wrapper such as `struct UserId(i64)`
//! maps like the type it wraps.
//!
//! # Module Organization
//!
//! - [`scalar`] - Scalar kinds and their typed reads and writes
//! - [`access`] - Pointer dereferencing for reads, lock guards included
//! - [`build`] - Copying and zero-filling values inside a builder
//!
//! # Example
//!
//! ```
//! use facet::Facet;
//! use mapwise_core::{describe, Mapper, TypeDef};
//!
//! #[derive(Debug, Default, Clone, PartialEq, Facet)]
//! pub struct User {
//!     pub name: String,
//!     pub age: i32,
//! }
//!
//! #[derive(Debug, Default, Clone, PartialEq, Facet)]
//! pub struct UserDto {
//!     pub name: String,
//!     pub age: i64,
//! }
//!
//! assert!(matches!(describe(User::SHAPE), TypeDef::Struct(fields) if fields.len() == 2));
//!
//! let mapper = Mapper::new();
//! let dto: UserDto = mapper.map(&User { name: "Ann".into(), age: 41 }).unwrap();
//! assert_eq!(dto.age, 41);
//! ```

pub mod access;
pub mod build;
pub mod scalar;

pub use access::{follow, LockedPeek, Pointee};
pub use build::{copy_from, fill_default, Produced};
pub use scalar::{Scalar, ScalarKind};

use chrono::{DateTime, Utc};
use facet_core::{Def, Field, Shape, Type, UserType};
use facet_reflect::Partial;
use std::any::TypeId;

/// Owned builder positioned at the frame being written
pub type Builder = Partial<'static, false>;

/// How a pointer-like wrapper is dereferenced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    /// `Option<T>`, the only nullable kind
    Option,
    /// `Box`, `Rc`, `Arc`: borrowed through directly
    Smart,
    /// `RwLock`, `Mutex`: read through a guard
    Lock,
    /// Pointers whose pointee cannot be reached by reading (`Weak`)
    Opaque,
}

/// Pointer-like wrapper description
#[derive(Debug, Clone, Copy)]
pub struct PointerInfo {
    pub elem: &'static Shape,
    pub kind: PointerKind,
    /// A new pointer can be built around a fresh pointee
    pub constructible: bool,
}

impl PointerInfo {
    pub fn nullable(&self) -> bool {
        self.kind == PointerKind::Option
    }
}

/// Structural description of a type
#[derive(Debug, Clone, Copy)]
pub enum TypeDef {
    /// Bool, numbers and strings
    Scalar(ScalarKind),
    /// Point in time (`chrono::DateTime<Utc>`)
    Time,
    /// Transparent single-field wrapper over another type
    Newtype(&'static Shape),
    /// Struct with named fields, in declaration order
    Struct(&'static [Field]),
    /// Growable sequence (`Vec<T>`)
    Seq(&'static Shape),
    /// Fixed-capacity array (`[T; N]`)
    Array(&'static Shape, usize),
    /// Key/value map
    Map(&'static Shape, &'static Shape),
    /// Pointer-like wrapper
    Pointer(PointerInfo),
    /// Enums, tuples, sets and everything else the engine does not map
    Unsupported,
}

impl TypeDef {
    pub fn is_struct(&self) -> bool {
        matches!(self, TypeDef::Struct(_))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, TypeDef::Pointer(_))
    }

    /// Sequences and fixed arrays
    pub fn is_collection(&self) -> bool {
        matches!(self, TypeDef::Seq(_) | TypeDef::Array(..))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, TypeDef::Map(..))
    }

    /// Element type of a sequence or array
    pub fn element(&self) -> Option<&'static Shape> {
        match self {
            TypeDef::Seq(elem) | TypeDef::Array(elem, _) => Some(elem),
            _ => None,
        }
    }
}

/// Classify a shape
pub fn describe(shape: &'static Shape) -> TypeDef {
    if let Some(kind) = ScalarKind::of(shape) {
        return TypeDef::Scalar(kind);
    }
    if shape.is_type::<DateTime<Utc>>() {
        return TypeDef::Time;
    }
    match shape.def {
        Def::Option(def) => {
            return TypeDef::Pointer(PointerInfo {
                elem: def.t,
                kind: PointerKind::Option,
                constructible: true,
            })
        }
        Def::Pointer(def) => {
            let Some(elem) = def.pointee() else {
                return TypeDef::Unsupported;
            };
            let kind = if def.vtable.borrow_fn.is_some() {
                PointerKind::Smart
            } else if def.vtable.read_fn.is_some() || def.vtable.lock_fn.is_some() {
                PointerKind::Lock
            } else {
                PointerKind::Opaque
            };
            return TypeDef::Pointer(PointerInfo {
                elem,
                kind,
                constructible: def.constructible_from_pointee(),
            });
        }
        Def::List(def) => return TypeDef::Seq(def.t),
        Def::Array(def) => return TypeDef::Array(def.t, def.n),
        Def::Map(def) => return TypeDef::Map(def.k, def.v),
        _ => {}
    }
    match shape.ty {
        Type::User(UserType::Struct(st)) if shape.inner.is_some() && st.fields.len() == 1 => {
            TypeDef::Newtype(st.fields[0].shape())
        }
        Type::User(UserType::Struct(st)) => TypeDef::Struct(st.fields),
        _ => TypeDef::Unsupported,
    }
}

/// Rust type identity of a shape
pub fn type_id(shape: &Shape) -> TypeId {
    shape.id.get()
}

/// Follow pointer shapes down to the first non-pointer
pub fn unwrap_all_pointers(shape: &'static Shape) -> &'static Shape {
    let mut current = shape;
    while let TypeDef::Pointer(pointer) = describe(current) {
        current = pointer.elem;
    }
    current
}

/// Unwrap one pointer level of a shape, if it is a pointer
pub fn unwrap_pointer(shape: &'static Shape) -> &'static Shape {
    match describe(shape) {
        TypeDef::Pointer(pointer) => pointer.elem,
        _ => shape,
    }
}
