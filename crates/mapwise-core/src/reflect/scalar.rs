//! Scalar kinds and their typed reads and writes
//!
//! Scalars travel through the engine as a [`Scalar`], widened to one of
//! five families. Reading dispatches on the concrete Rust type behind a
//! [`Peek`]; writing narrows back to the frame's kind with `as` casts.

use super::Builder;
use crate::error::{Error, Result};
use facet_core::Shape;
use facet_reflect::Peek;
use std::fmt;

/// Primitive scalar kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    String,
}

impl ScalarKind {
    /// Signed integer kinds
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            ScalarKind::I8 | ScalarKind::I16 | ScalarKind::I32 | ScalarKind::I64 | ScalarKind::Isize
        )
    }

    /// Unsigned integer kinds
    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            ScalarKind::U8 | ScalarKind::U16 | ScalarKind::U32 | ScalarKind::U64 | ScalarKind::Usize
        )
    }

    pub fn is_integer(self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub fn is_float(self) -> bool {
        matches!(self, ScalarKind::F32 | ScalarKind::F64)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }
}

/// A scalar value, widened to its family
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Uint(u) => write!(f, "{u}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Str(s) => write!(f, "{s:?}"),
        }
    }
}

macro_rules! scalar_table {
    (@widen Bool $v:ident) => { Scalar::Bool(*$v) };
    (@widen Str $v:ident) => { Scalar::Str($v.clone()) };
    (@widen Int $v:ident) => { Scalar::Int(*$v as i64) };
    (@widen Uint $v:ident) => { Scalar::Uint(*$v as u64) };
    (@widen Float $v:ident) => { Scalar::Float(*$v as f64) };
    (@narrow Bool $v:ident, $ty:ty) => { $v };
    (@narrow Str $v:ident, $ty:ty) => { $v };
    (@narrow $variant:ident $v:ident, $ty:ty) => { $v as $ty };
    (@zero Bool) => { Scalar::Bool(false) };
    (@zero Str) => { Scalar::Str(String::new()) };
    (@zero Int) => { Scalar::Int(0) };
    (@zero Uint) => { Scalar::Uint(0) };
    (@zero Float) => { Scalar::Float(0.0) };
    ($($kind:ident => $ty:ty as $variant:ident),* $(,)?) => {
        impl ScalarKind {
            /// Kind of `shape`, if it is one of the supported primitives
            pub fn of(shape: &Shape) -> Option<Self> {
                $(
                    if shape.is_type::<$ty>() {
                        return Some(ScalarKind::$kind);
                    }
                )*
                None
            }
        }

        /// Read the scalar behind `peek`; `None` for non-scalar shapes
        pub fn read(peek: Peek<'_, 'static>) -> Option<Scalar> {
            $(
                if let Ok(value) = peek.get::<$ty>() {
                    return Some(scalar_table!(@widen $variant value));
                }
            )*
            None
        }

        /// Write `value` into a frame of scalar kind `kind`
        ///
        /// `value` must already belong to the kind's family.
        pub fn write(builder: Builder, kind: ScalarKind, value: Scalar) -> Result<Builder> {
            match (kind, value) {
                $(
                    (ScalarKind::$kind, Scalar::$variant(v)) => {
                        Ok(builder.set(scalar_table!(@narrow $variant v, $ty))?)
                    }
                )*
                (kind, value) => Err(Error::Conversion {
                    source_type: format!("{value:?}"),
                    target_type: format!("{kind:?}"),
                    message: "scalar family mismatch".to_string(),
                }),
            }
        }

        /// Zero value of `kind`
        pub fn zero(kind: ScalarKind) -> Scalar {
            match kind {
                $( ScalarKind::$kind => scalar_table!(@zero $variant), )*
            }
        }
    };
}

scalar_table! {
    Bool => bool as Bool,
    I8 => i8 as Int,
    I16 => i16 as Int,
    I32 => i32 as Int,
    I64 => i64 as Int,
    Isize => isize as Int,
    U8 => u8 as Uint,
    U16 => u16 as Uint,
    U32 => u32 as Uint,
    U64 => u64 as Uint,
    Usize => usize as Uint,
    F32 => f32 as Float,
    F64 => f64 as Float,
    String => String as Str,
}
