//! Mapwise Core - Reflective object-to-object mapping
//!
//! This crate copies and converts data between values of different types
//! (domain entities and DTOs, say) without per-field assignment code.
//!
//! # Main Components
//!
//! - **Reflection**: Types derive [`facet::Facet`]; the engine classifies
//!   their shapes, reads through `Peek` and writes through `Partial`
//! - **Shape Cache**: Thread-safe memoization of per-type structural facts
//! - **Registry**: Which (source, target) pairs may be mapped
//! - **Configuration**: Per-pair field overrides (paths, functions,
//!   transforms, conditions, ignores)
//! - **Engine**: The recursive, cycle-guarded mapping dispatcher
//!
//! # Example
//!
//! ```
//! use facet::Facet;
//! use mapwise_core::{Mapper, Result};
//!
//! #[derive(Debug, Default, Clone, Facet)]
//! pub struct User {
//!     pub first_name: String,
//!     pub last_name: String,
//!     pub age: i32,
//! }
//!
//! #[derive(Debug, Default, Clone, Facet)]
//! pub struct UserDto {
//!     pub first_name: String,
//!     pub full_name: String,
//!     pub age_text: String,
//! }
//!
//! fn example() -> Result<()> {
//!     let mapper = Mapper::new();
//!     mapper
//!         .config::<User, UserDto>()
//!         .map("full_name")
//!         .from_fn(|u: &User| format!("{} {}", u.first_name, u.last_name))
//!         .map("age_text")
//!         .from_fn(|u: &User| format!("{} years old", u.age))
//!         .register()?;
//!
//!     let user = User { first_name: "John".into(), last_name: "Doe".into(), age: 30 };
//!     let dto: UserDto = mapper.map(&user)?;
//!     assert_eq!(dto.first_name, "John");
//!     assert_eq!(dto.full_name, "John Doe");
//!     assert_eq!(dto.age_text, "30 years old");
//!     Ok(())
//! }
//! # example().unwrap();
//! ```
//!
//! Copyright (c) 2025 Mapwise Team
//! Licensed under the Apache-2.0 license

pub mod config;
pub mod engine;
pub mod error;
pub mod guard;
pub mod reflect;
pub mod registry;
pub mod settings;
pub mod shape;

// Re-export main types for convenience
pub use config::{
    ConditionalRuleBuilder, ConfigBuilder, FieldRuleBuilder, MappingConfiguration, MappingRule,
    RuleKind,
};
pub use engine::{Mapper, MappingSession, Outcome};
pub use error::{Error, Result};
pub use guard::{BlockReason, CycleGuard};
pub use reflect::{describe, PointerInfo, PointerKind, Scalar, ScalarKind, TypeDef};
pub use registry::MappingRegistry;
pub use settings::{ConflictStrategy, MapperSettings, RegistrationPolicy};
pub use shape::{FieldDescriptor, FlattenOptions, ShapeCache, TypeShape};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
