//! Registry of sanctioned (source, target) type pairs
//!
//! A pair is registered directly, or implied by its parts: a collection or
//! array pair by its element pair (one pointer level unwrapped on each
//! side), a map pair by its value pair, and additionally by its key pair
//! when both key types are structs. Lookups use type identity only.
//!
//! Copyright (c) 2025 Mapwise Team
//! Licensed under the Apache-2.0 license

use crate::error::{Error, Result};
use crate::reflect::{describe, type_id, unwrap_pointer, TypeDef};
use crate::settings::RegistrationPolicy;
use facet_core::Shape;
use std::any::TypeId;
use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

/// Registered type pairs plus the policy for everything else
#[derive(Debug)]
pub struct MappingRegistry {
    policy: RegistrationPolicy,
    pairs: RwLock<HashSet<(TypeId, TypeId)>>,
}

impl MappingRegistry {
    pub fn new(policy: RegistrationPolicy) -> Self {
        Self {
            policy,
            pairs: RwLock::new(HashSet::new()),
        }
    }

    pub fn policy(&self) -> RegistrationPolicy {
        self.policy
    }

    /// Sanction mapping from `source` to `target`
    pub fn register(&self, source: &'static Shape, target: &'static Shape) {
        let inserted = self
            .pairs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((type_id(source), type_id(target)));
        if inserted {
            tracing::debug!(
                source_type = %source,
                target_type = %target,
                "registered mapping pair"
            );
        }
    }

    /// Whether the pair is registered, directly or through its parts
    pub fn is_registered(&self, source: &'static Shape, target: &'static Shape) -> bool {
        let pairs = self.pairs.read().unwrap_or_else(PoisonError::into_inner);
        implied(&pairs, unwrap_pointer(source), unwrap_pointer(target))
            || pairs.contains(&(type_id(source), type_id(target)))
    }

    /// Enforce the policy before a top-level mapping starts
    pub fn check(&self, source: &'static Shape, target: &'static Shape) -> Result<()> {
        match self.policy {
            RegistrationPolicy::AutoRegister => Ok(()),
            RegistrationPolicy::Strict if self.is_registered(source, target) => Ok(()),
            RegistrationPolicy::Strict => Err(Error::Unregistered {
                source_type: source.to_string(),
                target_type: target.to_string(),
            }),
        }
    }

    /// Record a successful top-level mapping (auto-register policy only)
    pub fn record_success(&self, source: &'static Shape, target: &'static Shape) {
        if self.policy == RegistrationPolicy::AutoRegister && !self.is_registered(source, target) {
            self.register(source, target);
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.pairs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

fn implied(
    pairs: &HashSet<(TypeId, TypeId)>,
    source: &'static Shape,
    target: &'static Shape,
) -> bool {
    if pairs.contains(&(type_id(source), type_id(target))) {
        return true;
    }
    match (describe(source), describe(target)) {
        (
            TypeDef::Seq(source_elem) | TypeDef::Array(source_elem, _),
            TypeDef::Seq(target_elem) | TypeDef::Array(target_elem, _),
        ) => implied(pairs, unwrap_pointer(source_elem), unwrap_pointer(target_elem)),
        (TypeDef::Map(source_key, source_value), TypeDef::Map(target_key, target_value)) => {
            let values = implied(pairs, unwrap_pointer(source_value), unwrap_pointer(target_value));
            let custom_keys = describe(source_key).is_struct() && describe(target_key).is_struct();
            if custom_keys {
                values && implied(pairs, source_key, target_key)
            } else {
                values
            }
        }
        _ => false,
    }
}
