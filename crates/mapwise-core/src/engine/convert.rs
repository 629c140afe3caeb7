//! Leaf conversions: scalars, defined types over scalars, and timestamps
//!
//! Numeric conversions follow the language-level cast semantics of `as`:
//! integers wrap to the target width, floats truncate toward zero (and
//! saturate when converted to integers).
//!
//! Integer to time decoding guesses the unit from the magnitude:
//! `>= 1e15` is nanoseconds, `>= 1e12` milliseconds, anything smaller is
//! seconds since the Unix epoch. The guess is ambiguous near the epoch and
//! for far-future dates. Time to integer always encodes seconds.

use crate::error::Error;
use crate::reflect::{describe, Scalar, ScalarKind, TypeDef};
use chrono::{DateTime, TimeZone, Utc};
use facet_core::Shape;

pub const NANOS_THRESHOLD: i128 = 1_000_000_000_000_000;
pub const MILLIS_THRESHOLD: i128 = 1_000_000_000_000;

#[derive(Debug, Clone, Copy)]
enum Number {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl Number {
    fn from_scalar(value: &Scalar) -> Option<Self> {
        match value {
            Scalar::Int(v) => Some(Number::Signed(*v)),
            Scalar::Uint(v) => Some(Number::Unsigned(*v)),
            Scalar::Float(v) => Some(Number::Float(*v)),
            Scalar::Bool(_) | Scalar::Str(_) => None,
        }
    }

    fn as_i64(self) -> i64 {
        match self {
            Number::Signed(v) => v,
            Number::Unsigned(v) => v as i64,
            Number::Float(v) => v as i64,
        }
    }

    fn as_u64(self) -> u64 {
        match self {
            Number::Signed(v) => v as u64,
            Number::Unsigned(v) => v,
            Number::Float(v) => v as u64,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Signed(v) => v as f64,
            Number::Unsigned(v) => v as f64,
            Number::Float(v) => v,
        }
    }

    fn cast(self, kind: ScalarKind) -> Option<Scalar> {
        let value = match kind {
            ScalarKind::I8 => Scalar::Int(self.as_i64() as i8 as i64),
            ScalarKind::I16 => Scalar::Int(self.as_i64() as i16 as i64),
            ScalarKind::I32 => Scalar::Int(self.as_i64() as i32 as i64),
            ScalarKind::I64 => Scalar::Int(self.as_i64()),
            ScalarKind::Isize => Scalar::Int(self.as_i64() as isize as i64),
            ScalarKind::U8 => Scalar::Uint(self.as_u64() as u8 as u64),
            ScalarKind::U16 => Scalar::Uint(self.as_u64() as u16 as u64),
            ScalarKind::U32 => Scalar::Uint(self.as_u64() as u32 as u64),
            ScalarKind::U64 => Scalar::Uint(self.as_u64()),
            ScalarKind::Usize => Scalar::Uint(self.as_u64() as usize as u64),
            ScalarKind::F32 => Scalar::Float(self.as_f64() as f32 as f64),
            ScalarKind::F64 => Scalar::Float(self.as_f64()),
            ScalarKind::Bool | ScalarKind::String => return None,
        };
        Some(value)
    }
}

/// Whether two scalar kinds convert directly
pub fn scalars_convertible(from: ScalarKind, to: ScalarKind) -> bool {
    from == to || (from.is_numeric() && to.is_numeric())
}

/// Convert a scalar of kind `from` into kind `to`
///
/// Returns `None` when no language-level conversion exists.
pub fn convert_scalar(value: &Scalar, from: ScalarKind, to: ScalarKind) -> Option<Scalar> {
    if !scalars_convertible(from, to) {
        return None;
    }
    match (value, to) {
        (Scalar::Bool(b), ScalarKind::Bool) => Some(Scalar::Bool(*b)),
        (Scalar::Str(s), ScalarKind::String) => Some(Scalar::Str(s.clone())),
        _ => Number::from_scalar(value)?.cast(to),
    }
}

/// Decode an integer timestamp using the magnitude heuristic
pub fn int_to_time(value: &Scalar) -> Option<DateTime<Utc>> {
    let raw: i128 = match value {
        Scalar::Int(v) => *v as i128,
        Scalar::Uint(v) => *v as i128,
        _ => return None,
    };
    let value = i64::try_from(raw).ok()?;
    if raw >= NANOS_THRESHOLD {
        Some(Utc.timestamp_nanos(value))
    } else if raw >= MILLIS_THRESHOLD {
        Utc.timestamp_millis_opt(value).single()
    } else {
        Utc.timestamp_opt(value, 0).single()
    }
}

/// Encode a time as whole seconds since the epoch, in integer kind `to`
pub fn time_to_int(time: &DateTime<Utc>, to: ScalarKind) -> Option<Scalar> {
    if !to.is_integer() {
        return None;
    }
    Number::Signed(time.timestamp()).cast(to)
}

pub fn timestamp_error(value: &Scalar, source: &Shape, target: &Shape) -> Error {
    Error::Conversion {
        source_type: source.to_string(),
        target_type: target.to_string(),
        message: format!("timestamp {value} is out of range"),
    }
}

/// Whether a value of `source` can ever be mapped into `target`
///
/// A static approximation used to validate rules at registration time.
/// Struct pairs are always compatible since name matching may be partial.
pub fn compatible(source: &'static Shape, target: &'static Shape) -> bool {
    if source.is_shape(target) {
        return true;
    }
    match (describe(source), describe(target)) {
        (TypeDef::Pointer(pointer), _) => compatible(pointer.elem, target),
        (_, TypeDef::Pointer(pointer)) => compatible(source, pointer.elem),
        (TypeDef::Newtype(inner), _) => compatible(inner, target),
        (_, TypeDef::Newtype(inner)) => compatible(source, inner),
        (TypeDef::Scalar(from), TypeDef::Scalar(to)) => scalars_convertible(from, to),
        (TypeDef::Time, TypeDef::Time) => true,
        (TypeDef::Scalar(kind), TypeDef::Time) | (TypeDef::Time, TypeDef::Scalar(kind)) => {
            kind.is_integer()
        }
        (TypeDef::Struct(_), TypeDef::Struct(_)) => true,
        (
            TypeDef::Seq(from) | TypeDef::Array(from, _),
            TypeDef::Seq(to) | TypeDef::Array(to, _),
        ) => compatible(from, to),
        (TypeDef::Map(from_key, from_value), TypeDef::Map(to_key, to_value)) => {
            compatible(from_key, to_key) && compatible(from_value, to_value)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet::Facet;
    use std::collections::HashMap;

    #[derive(Debug, Facet)]
    #[facet(transparent)]
    struct UserId(i64);

    #[test]
    fn test_integer_narrowing_wraps() {
        assert_eq!(
            convert_scalar(&Scalar::Int(300), ScalarKind::I64, ScalarKind::U8),
            Some(Scalar::Uint(44))
        );
        assert_eq!(
            convert_scalar(&Scalar::Int(-1), ScalarKind::I32, ScalarKind::U16),
            Some(Scalar::Uint(65535))
        );
    }

    #[test]
    fn test_float_to_int_truncates() {
        assert_eq!(
            convert_scalar(&Scalar::Float(3.9), ScalarKind::F64, ScalarKind::I32),
            Some(Scalar::Int(3))
        );
    }

    #[test]
    fn test_string_and_number_do_not_convert() {
        assert!(convert_scalar(&Scalar::Int(1), ScalarKind::I32, ScalarKind::String).is_none());
        assert!(convert_scalar(&Scalar::Bool(true), ScalarKind::Bool, ScalarKind::I8).is_none());
    }

    #[test]
    fn test_timestamp_thresholds() {
        let seconds = int_to_time(&Scalar::Int(1_700_000_000)).unwrap();
        assert_eq!(seconds, Utc.timestamp_opt(1_700_000_000, 0).unwrap());

        let millis = int_to_time(&Scalar::Int(1_700_000_000_123)).unwrap();
        assert_eq!(millis, Utc.timestamp_millis_opt(1_700_000_000_123).unwrap());

        let nanos = int_to_time(&Scalar::Uint(1_700_000_000_000_000_001)).unwrap();
        assert_eq!(nanos.timestamp_subsec_nanos(), 1);
    }

    #[test]
    fn test_millis_boundary_is_inclusive() {
        let below = int_to_time(&Scalar::Int(999_999_999_999)).unwrap();
        assert_eq!(below.timestamp(), 999_999_999_999);

        let at = int_to_time(&Scalar::Int(1_000_000_000_000)).unwrap();
        assert_eq!(at.timestamp(), 1_000_000_000);
        assert_eq!(at.timestamp_subsec_millis(), 0);
    }

    #[test]
    fn test_nanos_boundary_is_inclusive() {
        let below = int_to_time(&Scalar::Int(999_999_999_999_999)).unwrap();
        assert_eq!(below.timestamp(), 999_999_999_999);
        assert_eq!(below.timestamp_subsec_millis(), 999);

        let at = int_to_time(&Scalar::Uint(1_000_000_000_000_000)).unwrap();
        assert_eq!(at.timestamp(), 1_000_000);
        assert_eq!(at.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_time_encodes_seconds() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_999).unwrap();
        assert_eq!(time_to_int(&at, ScalarKind::I64), Some(Scalar::Int(1_700_000_000)));
        assert!(time_to_int(&at, ScalarKind::F64).is_none());
    }

    #[test]
    fn test_static_compatibility() {
        assert!(compatible(i32::SHAPE, <Option<i64>>::SHAPE));
        assert!(compatible(<Vec<u8>>::SHAPE, <[i64; 4]>::SHAPE));
        assert!(compatible(
            <HashMap<i32, String>>::SHAPE,
            <HashMap<i64, String>>::SHAPE
        ));
        assert!(compatible(UserId::SHAPE, u64::SHAPE));
        assert!(!compatible(String::SHAPE, i32::SHAPE));
        assert!(!compatible(<Vec<i32>>::SHAPE, i32::SHAPE));
    }
}
