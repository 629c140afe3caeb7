//! Fluent builder for field override configurations
//!
//! ```
//! use facet::Facet;
//! use mapwise_core::Mapper;
//!
//! #[derive(Debug, Facet)]
//! pub struct Person {
//!     pub first_name: String,
//!     pub last_name: String,
//! }
//!
//! #[derive(Debug, Default, Facet)]
//! pub struct Badge {
//!     pub label: String,
//! }
//!
//! let mapper = Mapper::new();
//! mapper
//!     .config::<Person, Badge>()
//!     .map("label")
//!     .from_fn(|p: &Person| format!("{} {}", p.first_name, p.last_name))
//!     .register()
//!     .unwrap();
//!
//! let badge: Badge = mapper
//!     .map(&Person { first_name: "Ada".into(), last_name: "King".into() })
//!     .unwrap();
//! assert_eq!(badge.label, "Ada King");
//! ```

use super::{MappingConfiguration, MappingRule, Predicate, RuleSource, Transform};
use crate::engine::convert::compatible;
use crate::engine::path::{resolve_type, type_at};
use crate::engine::Mapper;
use crate::error::{Error, Result};
use crate::reflect::Produced;
use crate::shape::TypeShape;
use facet::Facet;
use facet_core::Shape;
use facet_reflect::{HeapValue, Peek};
use std::marker::PhantomData;
use std::sync::Arc;

/// Builder for the configuration of one (source, target) pair
pub struct ConfigBuilder<'m, S: Facet<'static>, T: Facet<'static>> {
    mapper: &'m Mapper,
    config: MappingConfiguration,
    _pair: PhantomData<fn(&S) -> T>,
}

/// Rule builder for one target field
pub struct FieldRuleBuilder<'m, S: Facet<'static>, T: Facet<'static>> {
    parent: ConfigBuilder<'m, S, T>,
    field: String,
}

/// Rule builder for one target field guarded by a predicate
pub struct ConditionalRuleBuilder<'m, S: Facet<'static>, T: Facet<'static>> {
    parent: ConfigBuilder<'m, S, T>,
    field: String,
    condition: Predicate,
}

impl<'m, S: Facet<'static>, T: Facet<'static>> ConfigBuilder<'m, S, T> {
    pub(crate) fn new(mapper: &'m Mapper) -> Self {
        Self {
            mapper,
            config: MappingConfiguration::new(S::SHAPE, T::SHAPE),
            _pair: PhantomData,
        }
    }

    /// Start a rule for a target field
    pub fn map(self, target_field: impl Into<String>) -> FieldRuleBuilder<'m, S, T> {
        FieldRuleBuilder {
            parent: self,
            field: target_field.into(),
        }
    }

    /// Never write this target field
    pub fn ignore(self, target_field: impl Into<String>) -> Self {
        let mut rule = MappingRule::new(target_field);
        rule.ignore = true;
        self.insert(rule)
    }

    /// Rules collected so far
    pub fn rules(&self) -> impl Iterator<Item = &MappingRule> {
        self.config.rules.values()
    }

    /// Validate the rule table and publish it, replacing any previous
    /// configuration for this pair
    ///
    /// Also registers the pair with the mapper's registry.
    pub fn register(self) -> Result<()> {
        let source = S::SHAPE;
        let target = T::SHAPE;
        self.validate()?;

        log::info!(
            "Registered mapping configuration {} -> {} with {} rule(s)",
            source,
            target,
            self.config.rules.len()
        );
        self.mapper.configs().publish(self.config);
        self.mapper.registry().register(source, target);
        Ok(())
    }

    fn insert(mut self, rule: MappingRule) -> Self {
        self.config.rules.insert(rule.target_field.clone(), rule);
        self
    }

    fn existing(&self, field: &str) -> Option<&MappingRule> {
        self.config.rules.get(field)
    }

    fn validate(&self) -> Result<()> {
        let shapes = self.mapper.shapes();
        let source = S::SHAPE;
        let target_shape = shapes.get_or_build(T::SHAPE);
        let source_shape = shapes.get_or_build(source);

        if !target_shape.is_struct() {
            return Err(self.error(None, "target type is not a struct".to_string()));
        }

        for rule in self.config.rules.values() {
            let field = target_shape.field(&rule.target_field).ok_or_else(|| {
                self.error(
                    Some(&rule.target_field),
                    format!("target has no field `{}`", rule.target_field),
                )
            })?;
            if rule.ignore {
                continue;
            }

            let resolved = match &rule.source {
                Some(RuleSource::Field(path)) | Some(RuleSource::Path(path)) => {
                    resolve_type(shapes, source, path).ok_or_else(|| {
                        self.error(
                            Some(&rule.target_field),
                            format!("source path `{path}` does not resolve"),
                        )
                    })?
                }
                Some(RuleSource::Function { output, .. }) => *output,
                None => default_source_type(&source_shape, source, &rule.target_field)
                    .ok_or_else(|| {
                        self.error(
                            Some(&rule.target_field),
                            "no source field to transform".to_string(),
                        )
                    })?,
            };

            let assigned = match &rule.transform {
                Some(transform) => {
                    if !compatible(resolved, transform.input) {
                        return Err(self.error(
                            Some(&rule.target_field),
                            format!(
                                "transform input {} does not accept {resolved}",
                                transform.input
                            ),
                        ));
                    }
                    transform.output
                }
                None => resolved,
            };

            if !compatible(assigned, field.declared_type) {
                return Err(self.error(
                    Some(&rule.target_field),
                    format!("{} cannot be assigned to {}", assigned, field.declared_type),
                ));
            }
        }
        Ok(())
    }

    fn error(&self, field: Option<&str>, message: String) -> Error {
        Error::Configuration {
            source_type: std::any::type_name::<S>().to_string(),
            target_type: std::any::type_name::<T>().to_string(),
            field: field.map(str::to_string),
            message,
        }
    }
}

fn default_source_type(
    shape: &TypeShape,
    source: &'static Shape,
    name: &str,
) -> Option<&'static Shape> {
    type_at(source, &shape.lookup(name)?)
}

fn erase_fn<S, O, F>(f: F) -> RuleSource
where
    S: Facet<'static>,
    O: Facet<'static> + 'static,
    F: Fn(&S) -> O + Send + Sync + 'static,
{
    RuleSource::Function {
        func: Arc::new(move |source: Peek<'_, 'static>| {
            let source = source.get::<S>().ok()?;
            Some(Box::new(f(source)) as Box<dyn Produced>)
        }),
        output: O::SHAPE,
    }
}

impl<'m, S: Facet<'static>, T: Facet<'static>> FieldRuleBuilder<'m, S, T> {
    /// Take the value of a named source field
    pub fn from_field(self, source_field: impl Into<String>) -> ConfigBuilder<'m, S, T> {
        let mut rule = MappingRule::new(self.field);
        rule.source = Some(RuleSource::Field(source_field.into()));
        self.parent.insert(rule)
    }

    /// Take the value at a dotted path such as `company.address.city`
    ///
    /// A nil or missing segment leaves the target field unchanged.
    pub fn from_path(self, path: impl Into<String>) -> ConfigBuilder<'m, S, T> {
        let mut rule = MappingRule::new(self.field);
        rule.source = Some(RuleSource::Path(path.into()));
        self.parent.insert(rule)
    }

    /// Compute the value from the whole source
    pub fn from_fn<O, F>(self, f: F) -> ConfigBuilder<'m, S, T>
    where
        O: Facet<'static> + 'static,
        F: Fn(&S) -> O + Send + Sync + 'static,
    {
        let mut rule = MappingRule::new(self.field);
        rule.source = Some(erase_fn(f));
        self.parent.insert(rule)
    }

    /// Apply `f` to the resolved source value before assignment
    ///
    /// The value comes from the field or path rule already registered for
    /// this target field, or else from default name matching.
    pub fn transform<V, O, F>(self, f: F) -> ConfigBuilder<'m, S, T>
    where
        V: Facet<'static>,
        O: Facet<'static> + 'static,
        F: Fn(V) -> O + Send + Sync + 'static,
    {
        let source = self
            .parent
            .existing(&self.field)
            .filter(|rule| rule.condition.is_none())
            .and_then(|rule| match &rule.source {
                Some(RuleSource::Field(path)) => Some(RuleSource::Field(path.clone())),
                Some(RuleSource::Path(path)) => Some(RuleSource::Path(path.clone())),
                _ => None,
            });

        let mut rule = MappingRule::new(self.field);
        rule.source = source;
        rule.transform = Some(Transform {
            func: Arc::new(move |input: HeapValue<'static, false>| {
                let input = input.materialize::<V>()?;
                Ok(Box::new(f(input)) as Box<dyn Produced>)
            }),
            input: V::SHAPE,
            output: O::SHAPE,
        });
        self.parent.insert(rule)
    }

    /// Guard the rule with a predicate over the source
    ///
    /// When the predicate is false the field falls back to default matching.
    pub fn when<P>(self, predicate: P) -> ConditionalRuleBuilder<'m, S, T>
    where
        P: Fn(&S) -> bool + Send + Sync + 'static,
    {
        ConditionalRuleBuilder {
            parent: self.parent,
            field: self.field,
            condition: Arc::new(move |source: Peek<'_, 'static>| {
                source.get::<S>().map_or(false, |s| predicate(s))
            }),
        }
    }
}

impl<'m, S: Facet<'static>, T: Facet<'static>> ConditionalRuleBuilder<'m, S, T> {
    fn finish(self, source: RuleSource) -> ConfigBuilder<'m, S, T> {
        let mut rule = MappingRule::new(self.field);
        rule.source = Some(source);
        rule.condition = Some(self.condition);
        self.parent.insert(rule)
    }

    pub fn from_field(self, source_field: impl Into<String>) -> ConfigBuilder<'m, S, T> {
        let source = RuleSource::Field(source_field.into());
        self.finish(source)
    }

    pub fn from_path(self, path: impl Into<String>) -> ConfigBuilder<'m, S, T> {
        let source = RuleSource::Path(path.into());
        self.finish(source)
    }

    pub fn from_fn<O, F>(self, f: F) -> ConfigBuilder<'m, S, T>
    where
        O: Facet<'static> + 'static,
        F: Fn(&S) -> O + Send + Sync + 'static,
    {
        self.finish(erase_fn(f))
    }
}
