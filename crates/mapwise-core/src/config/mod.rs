//! Per type-pair field override configuration
//!
//! A [`MappingConfiguration`] holds, for one (source, target) pair, a table
//! of target field name to [`MappingRule`]. Configurations are assembled by
//! the fluent [`ConfigBuilder`], validated against both types' shapes and
//! then published into the mapper's [`ConfigTable`], replacing any previous
//! configuration for the same pair.
//!
//! Typed closures are stored behind erased signatures keyed by the exact
//! type pair. They receive the source through a [`Peek`] and borrow the
//! typed value from it, so no source is ever copied to call them.

pub mod builder;

pub use builder::{ConditionalRuleBuilder, ConfigBuilder, FieldRuleBuilder};

use crate::error::Result;
use crate::reflect::{type_id, Produced};
use facet_core::Shape;
use facet_reflect::{HeapValue, Peek};
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Erased `Fn(&S) -> O`; `None` if the argument is not an `S`
pub type ValueFn = Arc<dyn Fn(Peek<'_, 'static>) -> Option<Box<dyn Produced>> + Send + Sync>;

/// Erased `Fn(&S) -> bool`
pub type Predicate = Arc<dyn Fn(Peek<'_, 'static>) -> bool + Send + Sync>;

/// Erased `Fn(V) -> O`, handed a fully built `V`
pub type TransformFn =
    Arc<dyn Fn(HeapValue<'static, false>) -> Result<Box<dyn Produced>> + Send + Sync>;

/// Erased whole-value converter `Fn(&S) -> T`
pub type ConverterFn = ValueFn;

/// Where a rule takes its value from
#[derive(Clone)]
pub enum RuleSource {
    /// A named source field (direct, embedded or flattened)
    Field(String),
    /// A dotted path through nested structs, pointers and maps
    Path(String),
    /// A function of the whole source value
    Function {
        func: ValueFn,
        output: &'static Shape,
    },
}

/// Function applied to the resolved source value
#[derive(Clone)]
pub struct Transform {
    pub func: TransformFn,
    pub input: &'static Shape,
    pub output: &'static Shape,
}

/// Rule family, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    DirectField,
    CustomFunction,
    Transform,
    Ignore,
}

/// Override for one target field
#[derive(Clone)]
pub struct MappingRule {
    pub target_field: String,
    pub source: Option<RuleSource>,
    pub transform: Option<Transform>,
    /// Rule only applies when this holds for the source
    pub condition: Option<Predicate>,
    pub ignore: bool,
}

impl MappingRule {
    pub fn new(target_field: impl Into<String>) -> Self {
        Self {
            target_field: target_field.into(),
            source: None,
            transform: None,
            condition: None,
            ignore: false,
        }
    }

    pub fn kind(&self) -> RuleKind {
        if self.ignore {
            RuleKind::Ignore
        } else if self.transform.is_some() {
            RuleKind::Transform
        } else if matches!(self.source, Some(RuleSource::Function { .. })) {
            RuleKind::CustomFunction
        } else {
            RuleKind::DirectField
        }
    }

    /// Source field name or dotted path, if the rule has one
    pub fn source_path(&self) -> Option<&str> {
        match &self.source {
            Some(RuleSource::Field(path)) | Some(RuleSource::Path(path)) => Some(path),
            _ => None,
        }
    }

    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }
}

impl fmt::Debug for MappingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingRule")
            .field("target_field", &self.target_field)
            .field("kind", &self.kind())
            .field("source_path", &self.source_path())
            .field("conditional", &self.is_conditional())
            .finish()
    }
}

/// Rule table for one (source, target) pair
#[derive(Clone)]
pub struct MappingConfiguration {
    pub source: &'static Shape,
    pub target: &'static Shape,
    pub rules: HashMap<String, MappingRule>,
}

impl MappingConfiguration {
    pub fn new(source: &'static Shape, target: &'static Shape) -> Self {
        Self {
            source,
            target,
            rules: HashMap::new(),
        }
    }

    pub fn rule(&self, target_field: &str) -> Option<&MappingRule> {
        self.rules.get(target_field)
    }
}

impl fmt::Debug for MappingConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingConfiguration")
            .field("source", &self.source.to_string())
            .field("target", &self.target.to_string())
            .field("rules", &self.rules)
            .finish()
    }
}

type PairKey = (TypeId, TypeId);

/// Published configurations and converters of one mapper
#[derive(Default)]
pub struct ConfigTable {
    configs: RwLock<HashMap<PairKey, Arc<MappingConfiguration>>>,
    converters: RwLock<HashMap<PairKey, ConverterFn>>,
}

impl ConfigTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a configuration, replacing the previous one for its pair
    pub fn publish(&self, config: MappingConfiguration) {
        let key = (type_id(config.source), type_id(config.target));
        let replaced = self
            .configs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::new(config))
            .is_some();
        if replaced {
            log::debug!("replaced mapping configuration for an already configured pair");
        }
    }

    pub fn get(&self, source: &Shape, target: &Shape) -> Option<Arc<MappingConfiguration>> {
        self.configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(type_id(source), type_id(target)))
            .cloned()
    }

    pub fn add_converter(&self, source: &Shape, target: &Shape, converter: ConverterFn) {
        self.converters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((type_id(source), type_id(target)), converter);
    }

    pub fn converter(&self, source: &Shape, target: &Shape) -> Option<ConverterFn> {
        self.converters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(type_id(source), type_id(target)))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.configs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.configs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.converters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl fmt::Debug for ConfigTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let converters = self
            .converters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("ConfigTable")
            .field("configs", &self.len())
            .field("converters", &converters)
            .finish()
    }
}
