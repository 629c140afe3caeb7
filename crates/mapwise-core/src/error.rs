//! Error types for the Mapwise core library
//!
//! This module defines the error handling system for the mapping engine,
//! using thiserror for ergonomic error definitions and anyhow for flexible
//! error contexts when loading settings. Failures reported by the `facet`
//! reflection layer are flattened into [`Error::Reflect`].
//!
//! Errors raised deep inside a traversal are wrapped with field, index or map
//! key context while the recursion unwinds, so a failure in a nested
//! collection reports a traceable path (see [`Error::mapping_path`]).
//!
//! Copyright (c) 2025 Mapwise Team
//! Licensed under the Apache-2.0 license

use facet_core::FieldError;
use facet_reflect::{AllocError, ReflectError, ShapeMismatchError};
use thiserror::Error;

/// Main error type for Mapwise operations
#[derive(Error, Debug)]
pub enum Error {
    /// A source value was required but absent
    #[error("Nil source: a value is required to map into {target}")]
    NilSource { target: String },

    /// Strict registration policy rejected an unregistered type pair
    #[error("No mapping registered from {source_type} to {target_type}")]
    Unregistered {
        source_type: String,
        target_type: String,
    },

    /// A leaf conversion has no valid rule
    #[error("Type mismatch: cannot map {source_type} into {target_type}")]
    TypeMismatch {
        source_type: String,
        target_type: String,
    },

    /// A conversion rule exists but the value does not fit the target
    #[error("Conversion failed from {source_type} to {target_type}: {message}")]
    Conversion {
        source_type: String,
        target_type: String,
        message: String,
    },

    /// Invalid mapping configuration, detected at registration time
    #[error("Configuration error for {source_type} -> {target_type}: {message}")]
    Configuration {
        source_type: String,
        target_type: String,
        field: Option<String>,
        message: String,
    },

    /// A pointer is set but its pointee cannot be read (a `Weak` reference)
    #[error("Pointee of {pointer_type} cannot be reached")]
    UnreachablePointee { pointer_type: String },

    /// The reflection layer refused an operation
    #[error("Reflection error: {message}")]
    Reflect { message: String },

    /// Failure while mapping a struct field
    #[error("field `{field}`: {source}")]
    Field {
        field: String,
        #[source]
        source: Box<Error>,
    },

    /// Failure while mapping a collection element
    #[error("index {index}: {source}")]
    Index {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    /// Failure while converting or mapping a map entry
    #[error("map key {key}: {source}")]
    MapKey {
        key: String,
        #[source]
        source: Box<Error>,
    },

    /// Invalid mapper settings
    #[error("Settings error: {message}")]
    Settings {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// JSON parsing errors (settings files)
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap this error with the name of the struct field being mapped
    pub fn in_field(self, field: impl Into<String>) -> Self {
        Error::Field {
            field: field.into(),
            source: Box::new(self),
        }
    }

    /// Wrap this error with the index of the collection element being mapped
    pub fn at_index(self, index: usize) -> Self {
        Error::Index {
            index,
            source: Box::new(self),
        }
    }

    /// Wrap this error with a rendering of the map key being mapped
    pub fn at_key(self, key: impl Into<String>) -> Self {
        Error::MapKey {
            key: key.into(),
            source: Box::new(self),
        }
    }

    /// Build a type mismatch error from two type names
    pub fn mismatch(source_type: &str, target_type: &str) -> Self {
        Error::TypeMismatch {
            source_type: source_type.to_string(),
            target_type: target_type.to_string(),
        }
    }

    /// The innermost error, with all context wrappers removed
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Field { source, .. }
            | Error::Index { source, .. }
            | Error::MapKey { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Render the field/index/key context as a path such as `orders[2].total`
    ///
    /// Returns an empty string when the error carries no context.
    pub fn mapping_path(&self) -> String {
        let mut path = String::new();
        let mut current = self;
        loop {
            match current {
                Error::Field { field, source } => {
                    if !path.is_empty() {
                        path.push('.');
                    }
                    path.push_str(field);
                    current = source;
                }
                Error::Index { index, source } => {
                    path.push_str(&format!("[{index}]"));
                    current = source;
                }
                Error::MapKey { key, source } => {
                    path.push_str(&format!("[{key}]"));
                    current = source;
                }
                _ => return path,
            }
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<ReflectError> for Error {
    fn from(err: ReflectError) -> Self {
        Error::Reflect {
            message: err.to_string(),
        }
    }
}

impl From<AllocError> for Error {
    fn from(err: AllocError) -> Self {
        Error::Reflect {
            message: err.to_string(),
        }
    }
}

impl From<ShapeMismatchError> for Error {
    fn from(err: ShapeMismatchError) -> Self {
        Error::Reflect {
            message: err.to_string(),
        }
    }
}

impl From<FieldError> for Error {
    fn from(err: FieldError) -> Self {
        Error::Reflect {
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Settings {
            message: err.to_string(),
            source: Some(err),
        }
    }
}
