//! Recursive value mapping
//!
//! A [`MappingSession`] performs one top-level mapping call. It owns the
//! cycle guard for that call tree and dispatches every node on the shapes
//! of the source and target, in this order:
//!
//! 1. a registered whole-value converter for the exact pair
//! 2. identical cloneable types (unless a configuration exists for the pair)
//! 3. pointers on either side (dereference, or allocate the target)
//! 4. transparent newtypes on either side, through their only field
//! 5. scalars
//! 6. integer timestamps and times, when time conversion is enabled
//! 7. struct to struct, field by field
//! 8. sequences and arrays, element by element
//! 9. maps, entry by entry
//!
//! Anything else is a type mismatch.
//!
//! The source is read lazily through [`Peek`] and the target is written
//! through a [`Builder`], so only the part of the source graph the guard
//! admits is ever visited. Every step leaves its target frame fully
//! initialized: a skipped frame keeps the target's current value, or gets
//! the zero value when there is none.

use super::convert::{convert_scalar, int_to_time, time_to_int, timestamp_error};
use super::path;
use super::Mapper;
use crate::config::{MappingConfiguration, MappingRule, RuleSource, Transform};
use crate::error::{Error, Result};
use crate::guard::CycleGuard;
use crate::reflect::{
    access, copy_from, describe, fill_default, follow, scalar, Builder, Pointee, PointerInfo,
    PointerKind, Produced, ScalarKind, TypeDef,
};
use crate::shape::{FieldDescriptor, TypeShape};
use chrono::{DateTime, Utc};
use facet_core::{Characteristic, Shape};
use facet_reflect::{Partial, Peek};
use tracing::trace;

/// Result of mapping one node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The target was written
    Applied,
    /// The target kept its current value
    Skipped,
}

/// Builder positioned back at the frame it was handed at
type Step = (Builder, Outcome);

fn mismatch(source: &Shape, target: &Shape) -> Error {
    Error::mismatch(&source.to_string(), &target.to_string())
}

fn unreachable(pointer: &Shape) -> Error {
    Error::UnreachablePointee {
        pointer_type: pointer.to_string(),
    }
}

/// Field `index` of a struct value, when there is a value
fn field_of<'mem>(
    value: Option<Peek<'mem, 'static>>,
    index: usize,
) -> Result<Option<Peek<'mem, 'static>>> {
    match value {
        Some(value) => Ok(Some(value.into_struct()?.field(index)?)),
        None => Ok(None),
    }
}

fn key_label(key: Peek<'_, 'static>) -> String {
    match scalar::read(key) {
        Some(value) => value.to_string(),
        None => format!("<{}>", key.shape()),
    }
}

/// State of one top-level mapping call
pub struct MappingSession<'m> {
    mapper: &'m Mapper,
    guard: CycleGuard,
    time_conversion: bool,
}

impl<'m> MappingSession<'m> {
    pub fn new(mapper: &'m Mapper) -> Self {
        Self {
            mapper,
            guard: CycleGuard::new(mapper.settings().max_depth),
            time_conversion: mapper.time_conversion_enabled(),
        }
    }

    /// Map `source` into the builder's current frame, guarded against
    /// cycles and excessive depth
    ///
    /// `existing` is the target's current value at this frame, if any.
    pub fn map_value(
        &mut self,
        source: Peek<'_, 'static>,
        builder: Builder,
        existing: Option<Peek<'_, 'static>>,
    ) -> Result<Step> {
        let token = match self.guard.enter(access::identity(source)) {
            Ok(token) => token,
            Err(reason) => {
                trace!(
                    ?reason,
                    source_type = %source.shape(),
                    depth = self.guard.depth(),
                    "descent blocked"
                );
                return self.skip(builder, existing);
            }
        };
        let result = self.dispatch(source, builder, existing);
        self.guard.exit(token);
        result
    }

    fn dispatch(
        &mut self,
        source: Peek<'_, 'static>,
        builder: Builder,
        existing: Option<Peek<'_, 'static>>,
    ) -> Result<Step> {
        let source_ty = source.shape();
        let target_ty = builder.shape();

        if let Some(converter) = self.mapper.configs().converter(source_ty, target_ty) {
            trace!(source_type = %source_ty, "using registered converter");
            let produced = converter(source).ok_or_else(|| mismatch(source_ty, target_ty))?;
            return self.install(produced, builder);
        }

        let config = self.mapper.configs().get(source_ty, target_ty);
        if source_ty.is_shape(target_ty)
            && config.is_none()
            && source_ty.is(Characteristic::Clone)
        {
            let builder = copy_from(builder, source, self.guard.max_depth())?;
            return Ok((builder, Outcome::Applied));
        }

        let target_def = describe(target_ty);
        match (describe(source_ty), target_def) {
            (TypeDef::Pointer(_), _) => {
                self.map_from_pointer(source, builder, existing, target_def)
            }
            (_, TypeDef::Pointer(pointer)) => {
                self.map_into_pointer(source, builder, existing, pointer)
            }
            (TypeDef::Newtype(_), _) => {
                let inner = source.into_struct()?.field(0)?;
                self.dispatch(inner, builder, existing)
            }
            (_, TypeDef::Newtype(_)) => {
                let current = field_of(existing, 0)?;
                let frame = builder.begin_nth_field(0)?;
                let (builder, outcome) = self.dispatch(source, frame, current)?;
                Ok((builder.end()?, outcome))
            }
            (TypeDef::Scalar(from), TypeDef::Scalar(to)) => {
                let converted = scalar::read(source)
                    .and_then(|value| convert_scalar(&value, from, to))
                    .ok_or_else(|| mismatch(source_ty, target_ty))?;
                Ok((scalar::write(builder, to, converted)?, Outcome::Applied))
            }
            (TypeDef::Time, TypeDef::Time) => {
                let time = *source.get::<DateTime<Utc>>()?;
                Ok((builder.set(time)?, Outcome::Applied))
            }
            (TypeDef::Scalar(kind), TypeDef::Time) if kind.is_integer() => {
                self.map_int_to_time(source, builder, existing)
            }
            (TypeDef::Time, TypeDef::Scalar(kind)) if kind.is_integer() => {
                self.map_time_to_int(source, builder, existing, kind)
            }
            (TypeDef::Struct(_), TypeDef::Struct(_)) => {
                let shapes = self.mapper.shapes();
                let source_shape = shapes.get_or_build(source_ty);
                let target_shape = shapes.get_or_build(target_ty);
                self.map_struct(
                    source,
                    builder,
                    existing,
                    &source_shape,
                    &target_shape,
                    config.as_deref(),
                )
            }
            (from, to) if from.is_collection() && to.is_collection() => {
                self.map_list(source, builder, to)
            }
            (TypeDef::Map(..), TypeDef::Map(key, _)) => self.map_entries(source, builder, key),
            _ => Err(mismatch(source_ty, target_ty)),
        }
    }

    /// Leave the frame with its current value, or zero when it has none
    fn keep(&self, builder: Builder, existing: Option<Peek<'_, 'static>>) -> Result<Builder> {
        match existing {
            Some(existing) => copy_from(builder, existing, self.guard.max_depth()),
            None => fill_default(builder),
        }
    }

    fn skip(&self, builder: Builder, existing: Option<Peek<'_, 'static>>) -> Result<Step> {
        Ok((self.keep(builder, existing)?, Outcome::Skipped))
    }

    /// Nil sources zero a nullable target and leave any other target alone
    fn map_from_pointer(
        &mut self,
        source: Peek<'_, 'static>,
        builder: Builder,
        existing: Option<Peek<'_, 'static>>,
        target: TypeDef,
    ) -> Result<Step> {
        match follow(source) {
            Pointee::Nil => match target {
                TypeDef::Pointer(pointer) if pointer.nullable() => {
                    Ok((builder.set_default()?, Outcome::Applied))
                }
                _ => self.skip(builder, existing),
            },
            Pointee::Borrowed(inner) => self.map_pointee(inner, builder, existing),
            Pointee::Locked(inner) => self.map_pointee(inner.peek(), builder, existing),
            Pointee::Unreachable => Err(unreachable(source.shape())),
        }
    }

    /// The pointer itself was entered; only nested pointers enter again.
    fn map_pointee(
        &mut self,
        inner: Peek<'_, 'static>,
        builder: Builder,
        existing: Option<Peek<'_, 'static>>,
    ) -> Result<Step> {
        if describe(inner.shape()).is_pointer() {
            self.map_value(inner, builder, existing)
        } else {
            self.dispatch(inner, builder, existing)
        }
    }

    /// Map into the pointee of the target, allocating a fresh one
    ///
    /// The pointer is only set when the pointee would be written; otherwise
    /// the target keeps its current value.
    fn map_into_pointer(
        &mut self,
        source: Peek<'_, 'static>,
        builder: Builder,
        existing: Option<Peek<'_, 'static>>,
        pointer: PointerInfo,
    ) -> Result<Step> {
        if !pointer.constructible {
            return Err(mismatch(source.shape(), builder.shape()));
        }
        if self.would_skip(source, pointer.elem, 0) {
            trace!(target_type = %builder.shape(), "pointee would be left unset");
            return self.skip(builder, existing);
        }

        let builder = match pointer.kind {
            PointerKind::Option => builder.begin_some()?,
            _ => builder.begin_smart_ptr()?,
        };
        let (builder, outcome) = match existing.map(follow) {
            Some(Pointee::Borrowed(current)) => self.dispatch(source, builder, Some(current))?,
            Some(Pointee::Locked(current)) => self.dispatch(source, builder, Some(current.peek()))?,
            _ => self.dispatch(source, builder, None)?,
        };
        Ok((builder.end()?, outcome))
    }

    /// Whether mapping `source` into a `target` frame would skip it
    ///
    /// `levels` counts the guard levels the real descent would have entered
    /// by this point.
    fn would_skip(&self, source: Peek<'_, 'static>, target: &'static Shape, levels: usize) -> bool {
        let source_ty = source.shape();
        let configs = self.mapper.configs();
        if configs.converter(source_ty, target).is_some() {
            return false;
        }
        if source_ty.is_shape(target)
            && source_ty.is(Characteristic::Clone)
            && configs.get(source_ty, target).is_none()
        {
            return false;
        }

        let target_def = describe(target);
        match (describe(source_ty), target_def) {
            (TypeDef::Pointer(_), _) => match follow(source) {
                Pointee::Nil => !matches!(target_def, TypeDef::Pointer(p) if p.nullable()),
                Pointee::Borrowed(inner) => self.would_skip_pointee(inner, target, levels),
                Pointee::Locked(inner) => self.would_skip_pointee(inner.peek(), target, levels),
                // Mapping reports the error.
                Pointee::Unreachable => false,
            },
            (_, TypeDef::Pointer(pointer)) => {
                pointer.constructible && self.would_skip(source, pointer.elem, levels)
            }
            (TypeDef::Newtype(_), _) => match field_of(Some(source), 0) {
                Ok(Some(inner)) => self.would_skip(inner, target, levels),
                _ => false,
            },
            (_, TypeDef::Newtype(inner)) => self.would_skip(source, inner, levels),
            (TypeDef::Scalar(kind), TypeDef::Time) | (TypeDef::Time, TypeDef::Scalar(kind)) => {
                kind.is_integer() && !self.time_conversion
            }
            _ => false,
        }
    }

    fn would_skip_pointee(
        &self,
        inner: Peek<'_, 'static>,
        target: &'static Shape,
        levels: usize,
    ) -> bool {
        if !describe(inner.shape()).is_pointer() {
            return self.would_skip(inner, target, levels);
        }
        if self.guard.would_block(access::identity(inner), levels + 1).is_some() {
            return true;
        }
        self.would_skip(inner, target, levels + 1)
    }

    /// Write a value produced by user code into the frame
    fn install(&mut self, produced: Box<dyn Produced>, builder: Builder) -> Result<Step> {
        if produced.peek().shape().is_shape(builder.shape()) {
            return Ok((produced.install(builder)?, Outcome::Applied));
        }
        self.map_value(produced.peek(), builder, None)
    }

    fn map_int_to_time(
        &mut self,
        source: Peek<'_, 'static>,
        builder: Builder,
        existing: Option<Peek<'_, 'static>>,
    ) -> Result<Step> {
        if !self.time_conversion {
            trace!(source_type = %source.shape(), "time conversion disabled");
            return self.skip(builder, existing);
        }
        let value = scalar::read(source).ok_or_else(|| mismatch(source.shape(), builder.shape()))?;
        let time = int_to_time(&value)
            .ok_or_else(|| timestamp_error(&value, source.shape(), builder.shape()))?;
        Ok((builder.set(time)?, Outcome::Applied))
    }

    fn map_time_to_int(
        &mut self,
        source: Peek<'_, 'static>,
        builder: Builder,
        existing: Option<Peek<'_, 'static>>,
        kind: ScalarKind,
    ) -> Result<Step> {
        if !self.time_conversion {
            trace!(target_type = %builder.shape(), "time conversion disabled");
            return self.skip(builder, existing);
        }
        let time = source.get::<DateTime<Utc>>()?;
        let value =
            time_to_int(time, kind).ok_or_else(|| mismatch(source.shape(), builder.shape()))?;
        Ok((scalar::write(builder, kind, value)?, Outcome::Applied))
    }

    /// Resolve every target field: override rule, same name, embedded
    /// member, flattened nested field; unresolved fields keep their value
    fn map_struct(
        &mut self,
        source: Peek<'_, 'static>,
        builder: Builder,
        existing: Option<Peek<'_, 'static>>,
        source_shape: &TypeShape,
        target_shape: &TypeShape,
        config: Option<&MappingConfiguration>,
    ) -> Result<Step> {
        let mut builder = builder;
        for field in &target_shape.fields {
            let current = field_of(existing, field.position)?;
            let frame = builder.begin_nth_field(field.position)?;
            builder = self
                .map_field(source, frame, current, field, source_shape, config)
                .map_err(|e| e.in_field(field.name))?
                .end()?;
        }
        Ok((builder, Outcome::Applied))
    }

    fn map_field(
        &mut self,
        source: Peek<'_, 'static>,
        builder: Builder,
        existing: Option<Peek<'_, 'static>>,
        field: &FieldDescriptor,
        source_shape: &TypeShape,
        config: Option<&MappingConfiguration>,
    ) -> Result<Builder> {
        if let Some(rule) = config.and_then(|config| config.rule(field.name)) {
            if rule.ignore {
                trace!(field = field.name, "ignored by configuration");
                return self.keep(builder, existing);
            }
            let active = rule
                .condition
                .as_ref()
                .map_or(true, |condition| condition(source));
            if active {
                return self.apply_rule(rule, source, source_shape, builder, existing);
            }
            trace!(field = field.name, "condition false, using default matching");
        }

        match source_shape.lookup(field.name) {
            Some(field_path) => path::walk_fields(source, &field_path, |found| {
                self.map_found(found, source, builder, existing, field)
            }),
            None => self.map_found(None, source, builder, existing, field),
        }
    }

    /// An embedded target member without a source counterpart is filled
    /// from the whole source
    fn map_found(
        &mut self,
        found: Option<Peek<'_, 'static>>,
        source: Peek<'_, 'static>,
        builder: Builder,
        existing: Option<Peek<'_, 'static>>,
        field: &FieldDescriptor,
    ) -> Result<Builder> {
        match found {
            Some(value) => Ok(self.map_value(value, builder, existing)?.0),
            None if field.is_embedded => Ok(self.map_value(source, builder, existing)?.0),
            None => {
                trace!(field = field.name, "no source for field");
                self.keep(builder, existing)
            }
        }
    }

    fn apply_rule(
        &mut self,
        rule: &MappingRule,
        source: Peek<'_, 'static>,
        source_shape: &TypeShape,
        builder: Builder,
        existing: Option<Peek<'_, 'static>>,
    ) -> Result<Builder> {
        let mapper = self.mapper;
        match &rule.source {
            Some(RuleSource::Field(source_path)) | Some(RuleSource::Path(source_path)) => {
                path::resolve(mapper.shapes(), source, source_path, |found| {
                    self.apply_resolved(rule, found, builder, existing)
                })
            }
            Some(RuleSource::Function { func, .. }) => match func(source) {
                Some(produced) => match &rule.transform {
                    Some(transform) => {
                        self.apply_transform(rule, transform, produced.peek(), builder, existing)
                    }
                    None => self.assign_soft(rule, produced, builder, existing),
                },
                None => self.apply_resolved(rule, None, builder, existing),
            },
            None => match source_shape.lookup(&rule.target_field) {
                Some(field_path) => path::walk_fields(source, &field_path, |found| {
                    self.apply_resolved(rule, found, builder, existing)
                }),
                None => self.apply_resolved(rule, None, builder, existing),
            },
        }
    }

    fn apply_resolved(
        &mut self,
        rule: &MappingRule,
        found: Option<Peek<'_, 'static>>,
        builder: Builder,
        existing: Option<Peek<'_, 'static>>,
    ) -> Result<Builder> {
        let Some(value) = found else {
            trace!(field = %rule.target_field, "rule source unresolved");
            return self.keep(builder, existing);
        };
        match &rule.transform {
            Some(transform) => self.apply_transform(rule, transform, value, builder, existing),
            None => Ok(self.map_value(value, builder, existing)?.0),
        }
    }

    /// Build the transform's input from `value`, then assign its output
    fn apply_transform(
        &mut self,
        rule: &MappingRule,
        transform: &Transform,
        value: Peek<'_, 'static>,
        builder: Builder,
        existing: Option<Peek<'_, 'static>>,
    ) -> Result<Builder> {
        // SAFETY: `transform.input` is the shape of the transform's argument type
        let input = unsafe { Partial::alloc_shape_owned(transform.input) }?;
        let (input, outcome) = self.map_value(value, input, None)?;
        if outcome == Outcome::Skipped {
            return self.keep(builder, existing);
        }
        let output = (transform.func)(input.build()?)?;
        self.assign_soft(rule, output, builder, existing)
    }

    /// Assign a computed value; a failed assignment keeps the current value
    fn assign_soft(
        &mut self,
        rule: &MappingRule,
        produced: Box<dyn Produced>,
        builder: Builder,
        existing: Option<Peek<'_, 'static>>,
    ) -> Result<Builder> {
        let target = builder.shape();
        if produced.peek().shape().is_shape(target) {
            return Ok(produced.install(builder)?);
        }

        // SAFETY: `target` is the shape of the frame being written
        let scratch = unsafe { Partial::alloc_shape_owned(target) }?;
        let attempt = self
            .map_value(produced.peek(), scratch, existing)
            .and_then(|(scratch, outcome)| Ok((scratch.build()?, outcome)));
        match attempt {
            Ok((value, Outcome::Applied)) => {
                copy_from(builder, value.peek(), self.guard.max_depth())
            }
            Ok((_, Outcome::Skipped)) => self.keep(builder, existing),
            Err(e) => {
                log::warn!(
                    "Computed value for field '{}' cannot be assigned: {}",
                    rule.target_field,
                    e
                );
                self.keep(builder, existing)
            }
        }
    }

    /// Always builds a new collection; arrays keep their fixed length
    fn map_list(
        &mut self,
        source: Peek<'_, 'static>,
        builder: Builder,
        target: TypeDef,
    ) -> Result<Step> {
        let items = source.into_list_like()?;
        let builder = match target {
            TypeDef::Array(_, len) => {
                let mut builder = builder.init_array()?;
                for index in 0..len {
                    let frame = builder.begin_nth_field(index)?;
                    let frame = match items.get(index) {
                        Some(item) => {
                            self.map_value(item, frame, None)
                                .map_err(|e| e.at_index(index))?
                                .0
                        }
                        None => fill_default(frame)?,
                    };
                    builder = frame.end()?;
                }
                builder
            }
            _ => {
                let mut builder = builder.init_list_with_capacity(items.len())?;
                for (index, item) in items.iter().enumerate() {
                    let frame = builder.begin_list_item()?;
                    builder = self
                        .map_value(item, frame, None)
                        .map_err(|e| e.at_index(index))?
                        .0
                        .end()?;
                }
                builder
            }
        };
        Ok((builder, Outcome::Applied))
    }

    /// Always builds a new map; colliding keys keep the last entry
    fn map_entries(
        &mut self,
        source: Peek<'_, 'static>,
        builder: Builder,
        key_shape: &'static Shape,
    ) -> Result<Step> {
        let mut builder = builder.init_map()?;
        for (source_key, source_value) in source.into_map()?.iter() {
            let label = key_label(source_key);
            // SAFETY: `key_shape` is the key shape of the target map
            let key = unsafe { Partial::alloc_shape_owned(key_shape) }?;
            let (key, outcome) = self
                .map_value(source_key, key, None)
                .map_err(|e| e.at_key(label.clone()))?;
            if outcome == Outcome::Skipped {
                trace!(key = %label, "map key skipped");
                continue;
            }
            let key = key.build()?;
            builder = copy_from(builder.begin_key()?, key.peek(), self.guard.max_depth())?.end()?;
            let frame = builder.begin_value()?;
            builder = self
                .map_value(source_value, frame, None)
                .map_err(|e| e.at_key(label))?
                .0
                .end()?;
        }
        Ok((builder, Outcome::Applied))
    }
}
