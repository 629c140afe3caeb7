//! The mapping engine and its public entry points
//!
//! [`Mapper`] is the explicit context every mapping runs against: it owns
//! the shape cache, the registry of sanctioned type pairs and the published
//! field override configurations. Share one mapper across an application (it
//! is `Send + Sync`) or create one per test for isolation.
//!
//! # Module Organization
//!
//! - [`dispatch`] - Recursive per-node mapping strategies
//! - [`convert`] - Scalar and timestamp conversions
//! - [`path`] - Source field and dotted path resolution
//!
//! Copyright (c) 2025 Mapwise Team
//! Licensed under the Apache-2.0 license

pub mod convert;
pub mod dispatch;
pub mod path;

pub use dispatch::{MappingSession, Outcome};

use crate::config::{ConfigBuilder, ConfigTable, ConverterFn};
use crate::error::{Error, Result};
use crate::reflect::{access, Builder, Produced};
use crate::registry::MappingRegistry;
use crate::settings::MapperSettings;
use crate::shape::{FlattenOptions, ShapeCache, TypeShape};
use facet::Facet;
use facet_reflect::{HeapValue, Partial, Peek};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Object-to-object mapper
#[derive(Debug)]
pub struct Mapper {
    settings: MapperSettings,
    time_conversion: AtomicBool,
    shapes: ShapeCache,
    registry: MappingRegistry,
    configs: ConfigTable,
}

impl Mapper {
    /// Create a mapper with default settings
    pub fn new() -> Self {
        Self::build(MapperSettings::default())
    }

    /// Create a mapper with explicit settings
    ///
    /// Fails with [`Error::Settings`] when the settings do not validate.
    pub fn with_settings(settings: MapperSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self::build(settings))
    }

    /// Create a mapper from default settings plus `MAPWISE_*` variables
    pub fn from_env() -> Result<Self> {
        MapperSettings::from_env().and_then(Self::with_settings)
    }

    fn build(settings: MapperSettings) -> Self {
        Self {
            time_conversion: AtomicBool::new(settings.enable_time_conversion),
            shapes: ShapeCache::new(FlattenOptions::from_settings(&settings)),
            registry: MappingRegistry::new(settings.registration_policy),
            configs: ConfigTable::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &MapperSettings {
        &self.settings
    }

    pub fn shapes(&self) -> &ShapeCache {
        &self.shapes
    }

    pub fn registry(&self) -> &MappingRegistry {
        &self.registry
    }

    pub fn configs(&self) -> &ConfigTable {
        &self.configs
    }

    /// Map `source` into a new `T`
    ///
    /// Target fields without a resolvable source get their zero value.
    pub fn map<T, S>(&self, source: &S) -> Result<T>
    where
        T: Facet<'static>,
        S: Facet<'static>,
    {
        let builder = Partial::alloc_owned::<T>()?;
        let value = self.map_peek(Peek::new(source), builder, None)?;
        Ok(value.materialize::<T>()?)
    }

    /// Map `source` into a new `T`, falling back to `T::default()` on error
    pub fn map_or_default<T, S>(&self, source: &S) -> T
    where
        T: Facet<'static> + Default,
        S: Facet<'static>,
    {
        match self.map(source) {
            Ok(target) => target,
            Err(e) => {
                log::warn!(
                    "Mapping {} -> {} failed, using default: {}",
                    S::SHAPE,
                    T::SHAPE,
                    e
                );
                T::default()
            }
        }
    }

    /// Map an optional source; `None` is a [`Error::NilSource`]
    pub fn map_option<T, S>(&self, source: Option<&S>) -> Result<T>
    where
        T: Facet<'static>,
        S: Facet<'static>,
    {
        match source {
            Some(source) => self.map(source),
            None => Err(Error::NilSource {
                target: T::SHAPE.to_string(),
            }),
        }
    }

    /// Map `source` into an existing target
    ///
    /// Target fields without a resolvable source keep their current values.
    /// On error the target is left unchanged.
    pub fn map_to<S, T>(&self, source: &S, target: &mut T) -> Result<()>
    where
        S: Facet<'static>,
        T: Facet<'static>,
    {
        let builder = Partial::alloc_owned::<T>()?;
        let value = self.map_peek(Peek::new(source), builder, Some(Peek::new(&*target)))?;
        *target = value.materialize::<T>()?;
        Ok(())
    }

    /// Map every element of `source`
    pub fn map_slice<T, S>(&self, source: &[S]) -> Result<Vec<T>>
    where
        T: Facet<'static>,
        S: Facet<'static>,
    {
        source
            .iter()
            .enumerate()
            .map(|(index, item)| self.map(item).map_err(|e| e.at_index(index)))
            .collect()
    }

    /// Map a reflected source into a fresh builder
    ///
    /// `existing` is the target's current value, kept wherever the source
    /// has nothing to say.
    pub fn map_peek(
        &self,
        source: Peek<'_, 'static>,
        builder: Builder,
        existing: Option<Peek<'_, 'static>>,
    ) -> Result<HeapValue<'static, false>> {
        let source_ty = source.shape();
        let target_ty = builder.shape();
        let span = tracing::debug_span!(
            "map",
            source_type = %source_ty,
            target_type = %target_ty
        );
        let _entered = span.enter();

        if access::is_nil(source) {
            return Err(Error::NilSource {
                target: target_ty.to_string(),
            });
        }
        self.registry.check(source_ty, target_ty)?;

        let (builder, outcome) = MappingSession::new(self).map_value(source, builder, existing)?;
        let value = builder.build()?;
        debug!(?outcome, "mapping finished");
        self.registry.record_success(source_ty, target_ty);
        Ok(value)
    }

    /// Start a field override configuration for `S -> T`
    pub fn config<S, T>(&self) -> ConfigBuilder<'_, S, T>
    where
        S: Facet<'static>,
        T: Facet<'static>,
    {
        ConfigBuilder::new(self)
    }

    /// Sanction mapping `S -> T` without any overrides
    ///
    /// Also sanctions collections and maps of these types.
    pub fn register<S: Facet<'static>, T: Facet<'static>>(&self) {
        self.registry.register(S::SHAPE, T::SHAPE);
    }

    /// Use a hand-written converter whenever an `S` is mapped into a `T`
    pub fn register_converter<S, T, F>(&self, convert: F)
    where
        S: Facet<'static>,
        T: Facet<'static> + 'static,
        F: Fn(&S) -> T + Send + Sync + 'static,
    {
        let converter: ConverterFn = Arc::new(move |source: Peek<'_, 'static>| {
            let source = source.get::<S>().ok()?;
            Some(Box::new(convert(source)) as Box<dyn Produced>)
        });
        self.configs.add_converter(S::SHAPE, T::SHAPE, converter);
        self.registry.register(S::SHAPE, T::SHAPE);
        log::info!("Registered converter {} -> {}", S::SHAPE, T::SHAPE);
    }

    /// Enable or disable integer timestamp <-> time conversion
    pub fn set_time_conversion(&self, enabled: bool) {
        self.time_conversion.store(enabled, Ordering::Relaxed);
    }

    pub fn time_conversion_enabled(&self) -> bool {
        self.time_conversion.load(Ordering::Relaxed)
    }

    /// Drop every configuration, converter, registration and cached shape
    pub fn clear(&self) {
        self.configs.clear();
        self.registry.clear();
        self.shapes.clear();
    }

    /// Cached shape of `T`
    pub fn shape_of<T: Facet<'static>>(&self) -> Arc<TypeShape> {
        self.shapes.get_or_build(T::SHAPE)
    }

    /// Whether `S -> T` is sanctioned, directly or through element types
    pub fn is_registered<S: Facet<'static>, T: Facet<'static>>(&self) -> bool {
        self.registry.is_registered(S::SHAPE, T::SHAPE)
    }
}

impl Default for Mapper {
    fn default() -> Self {
        Self::new()
    }
}
