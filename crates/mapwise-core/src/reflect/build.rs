//! Writing whole values into a builder frame
//!
//! Every helper here takes a [`Builder`] positioned at an uninitialized
//! frame and returns it with that frame fully initialized, still positioned
//! at the same frame.

use super::{access, describe, scalar, Builder, Pointee, PointerKind, TypeDef};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use facet_core::{Characteristic, Facet, PtrUninit};
use facet_reflect::{Peek, ReflectError, ReflectErrorKind};

/// A value computed by user code, ready to be written into a frame
pub trait Produced {
    fn peek(&self) -> Peek<'_, 'static>;

    /// Move the value into the builder's current frame
    fn install(self: Box<Self>, builder: Builder) -> std::result::Result<Builder, ReflectError>;
}

impl<V: Facet<'static>> Produced for V {
    fn peek(&self) -> Peek<'_, 'static> {
        Peek::new(self)
    }

    fn install(self: Box<Self>, builder: Builder) -> std::result::Result<Builder, ReflectError> {
        builder.set(*self)
    }
}

/// Copy `value` into the frame, which must have the same shape
///
/// Types with a `Clone` impl are cloned. Anything else is copied structure
/// by structure, at most `budget` pointer and field levels deep; below that
/// the frame is zero-filled.
pub fn copy_from(builder: Builder, value: Peek<'_, 'static>, budget: usize) -> Result<Builder> {
    let shape = value.shape();
    if !builder.shape().is_shape(shape) {
        return Err(Error::mismatch(&shape.to_string(), &builder.shape().to_string()));
    }
    if shape.is(Characteristic::Clone) {
        let data = value.data();
        let clone = move |dst: PtrUninit| {
            // SAFETY: `data` is a live value of `shape` and `dst` is a frame of the same shape
            unsafe { shape.call_clone_into(data, dst.assume_init()) }.ok_or(
                ReflectErrorKind::OperationFailed {
                    shape,
                    operation: "clone existing value",
                },
            )
        };
        // SAFETY: `clone` initializes the whole frame whenever it returns Ok
        return Ok(unsafe { builder.set_from_function(clone) }?);
    }
    if budget == 0 {
        return fill_default(builder);
    }
    let budget = budget - 1;

    match describe(shape) {
        TypeDef::Time => Ok(builder.set(*value.get::<DateTime<Utc>>()?)?),
        TypeDef::Pointer(pointer) if pointer.kind == PointerKind::Option => {
            match value.into_option()?.value() {
                Some(inner) => Ok(copy_from(builder.begin_some()?, inner, budget)?.end()?),
                None => Ok(builder.set_default()?),
            }
        }
        TypeDef::Pointer(pointer) if pointer.constructible => match access::follow(value) {
            Pointee::Borrowed(inner) => {
                let builder = copy_from(builder.begin_smart_ptr()?, inner, budget)?;
                Ok(builder.end()?)
            }
            Pointee::Locked(locked) => {
                let builder = copy_from(builder.begin_smart_ptr()?, locked.peek(), budget)?;
                Ok(builder.end()?)
            }
            Pointee::Nil | Pointee::Unreachable => Err(unreachable(shape)),
        },
        TypeDef::Seq(_) => {
            let items = value.into_list_like()?;
            let mut builder = builder.init_list_with_capacity(items.len())?;
            for item in items.iter() {
                builder = copy_from(builder.begin_list_item()?, item, budget)?.end()?;
            }
            Ok(builder)
        }
        TypeDef::Array(_, len) => {
            let items = value.into_list_like()?;
            let mut builder = builder.init_array()?;
            for index in 0..len {
                let item = items.get(index).ok_or_else(|| unreachable(shape))?;
                builder = copy_from(builder.begin_nth_field(index)?, item, budget)?.end()?;
            }
            Ok(builder)
        }
        TypeDef::Map(..) => {
            let mut builder = builder.init_map()?;
            for (key, entry) in value.into_map()?.iter() {
                builder = copy_from(builder.begin_key()?, key, budget)?.end()?;
                builder = copy_from(builder.begin_value()?, entry, budget)?.end()?;
            }
            Ok(builder)
        }
        TypeDef::Struct(_) | TypeDef::Newtype(_) => {
            let fields = value.into_struct()?;
            let mut builder = builder;
            for index in 0..fields.field_count() {
                let field = fields.field(index)?;
                builder = copy_from(builder.begin_nth_field(index)?, field, budget)?.end()?;
            }
            Ok(builder)
        }
        _ => Err(Error::Reflect {
            message: format!("cannot copy a value of {shape}"),
        }),
    }
}

/// Initialize the frame with the zero value of its type
///
/// Uses `Default` where the type has it, and otherwise builds the zero
/// value from the type's structure.
pub fn fill_default(builder: Builder) -> Result<Builder> {
    let shape = builder.shape();
    if shape.is(Characteristic::Default) {
        return Ok(builder.set_default()?);
    }
    match describe(shape) {
        TypeDef::Scalar(kind) => scalar::write(builder, kind, scalar::zero(kind)),
        TypeDef::Time => Ok(builder.set(DateTime::<Utc>::default())?),
        TypeDef::Pointer(pointer) if pointer.constructible => {
            let builder = fill_default(builder.begin_smart_ptr()?)?;
            Ok(builder.end()?)
        }
        TypeDef::Array(_, len) => {
            let mut builder = builder.init_array()?;
            for index in 0..len {
                builder = fill_default(builder.begin_nth_field(index)?)?.end()?;
            }
            Ok(builder)
        }
        TypeDef::Newtype(_) => Ok(fill_default(builder.begin_nth_field(0)?)?.end()?),
        TypeDef::Struct(fields) => {
            let mut builder = builder;
            for index in 0..fields.len() {
                builder = fill_default(builder.begin_nth_field(index)?)?.end()?;
            }
            Ok(builder)
        }
        _ => Err(Error::Reflect {
            message: format!("{shape} has no zero value"),
        }),
    }
}

fn unreachable(shape: &facet_core::Shape) -> Error {
    Error::UnreachablePointee {
        pointer_type: shape.to_string(),
    }
}
