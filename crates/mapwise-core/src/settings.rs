//! Mapper settings
//!
//! Settings are resolved from, in increasing precedence:
//! - Default values
//! - A JSON settings file or string
//! - `MAPWISE_*` environment variables
//!
//! Copyright (c) 2025 Mapwise Team
//! Licensed under the Apache-2.0 license

use crate::error::{Error, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const ENV_TIME_CONVERSION: &str = "MAPWISE_TIME_CONVERSION";
pub const ENV_MAX_DEPTH: &str = "MAPWISE_MAX_DEPTH";
pub const ENV_FLATTEN_DEPTH: &str = "MAPWISE_FLATTEN_DEPTH";
pub const ENV_REGISTRATION_POLICY: &str = "MAPWISE_REGISTRATION_POLICY";
pub const ENV_FLATTEN_CONFLICT: &str = "MAPWISE_FLATTEN_CONFLICT";
pub const ENV_FLATTEN_PREFIX: &str = "MAPWISE_FLATTEN_PREFIX";
pub const ENV_FLATTEN_SEPARATOR: &str = "MAPWISE_FLATTEN_SEPARATOR";

/// How the mapper treats type pairs nobody registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationPolicy {
    /// The first successful mapping registers the pair
    #[default]
    AutoRegister,
    /// Unregistered pairs fail with [`Error::Unregistered`]
    Strict,
}

impl fmt::Display for RegistrationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationPolicy::AutoRegister => write!(f, "auto_register"),
            RegistrationPolicy::Strict => write!(f, "strict"),
        }
    }
}

impl FromStr for RegistrationPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "auto" | "auto_register" => Ok(RegistrationPolicy::AutoRegister),
            "strict" => Ok(RegistrationPolicy::Strict),
            other => Err(Error::Settings {
                message: format!("unknown registration policy `{other}`"),
                source: None,
            }),
        }
    }
}

/// Which nested field owns a leaf name claimed by several flattened fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// The shallowest, then earliest, field keeps the name
    #[default]
    KeepFirst,
    /// The deepest, then latest, field takes the name over
    KeepLast,
    /// Later fields are registered as `parent<separator>leaf` instead
    UsePrefix,
    /// An ambiguous leaf name is not registered at all
    Skip,
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConflictStrategy::KeepFirst => "keep_first",
            ConflictStrategy::KeepLast => "keep_last",
            ConflictStrategy::UsePrefix => "use_prefix",
            ConflictStrategy::Skip => "skip",
        };
        f.write_str(name)
    }
}

impl FromStr for ConflictStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "keep_first" | "first" => Ok(ConflictStrategy::KeepFirst),
            "keep_last" | "last" => Ok(ConflictStrategy::KeepLast),
            "use_prefix" | "prefix" => Ok(ConflictStrategy::UsePrefix),
            "skip" => Ok(ConflictStrategy::Skip),
            other => Err(Error::Settings {
                message: format!("unknown flatten conflict strategy `{other}`"),
                source: None,
            }),
        }
    }
}

/// Behavior knobs of a [`Mapper`](crate::Mapper)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperSettings {
    /// Integer timestamp <-> time conversion
    pub enable_time_conversion: bool,

    /// Maximum recursion depth of one mapping call
    pub max_depth: usize,

    /// How many levels of named nested structs are flattened into shapes
    pub flatten_depth: usize,

    /// Resolution of leaf names shared by several flattened fields
    pub flatten_conflict: ConflictStrategy,

    /// Also key flattened fields by their joined path, e.g. `address_city`
    pub flatten_use_prefix: bool,

    /// Separator of joined flattened paths
    pub flatten_prefix_separator: String,

    pub registration_policy: RegistrationPolicy,
}

impl Default for MapperSettings {
    fn default() -> Self {
        Self {
            enable_time_conversion: true,
            max_depth: 64,
            flatten_depth: 8,
            flatten_conflict: ConflictStrategy::KeepFirst,
            flatten_use_prefix: true,
            flatten_prefix_separator: "_".to_string(),
            registration_policy: RegistrationPolicy::AutoRegister,
        }
    }
}

impl MapperSettings {
    /// Parse settings from JSON text; missing keys keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Io {
            message: format!("failed to read settings file {}: {}", path.display(), e),
            source: e,
        })?;
        Self::from_json_str(&content)
    }

    /// Defaults with the process environment applied
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::default();
        settings.apply_overrides(std::env::vars())?;
        Ok(settings)
    }

    /// Apply `MAPWISE_*` overrides from a list of variables
    ///
    /// Unrelated variables are ignored. The result is validated.
    pub fn apply_overrides<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let value = value.as_ref().trim();
            match key.as_ref() {
                ENV_TIME_CONVERSION => {
                    self.enable_time_conversion = parse_flag(value)
                        .with_context(|| format!("invalid {ENV_TIME_CONVERSION}"))?;
                }
                ENV_MAX_DEPTH => {
                    self.max_depth = value
                        .parse()
                        .with_context(|| format!("invalid {ENV_MAX_DEPTH} `{value}`"))?;
                }
                ENV_FLATTEN_DEPTH => {
                    self.flatten_depth = value
                        .parse()
                        .with_context(|| format!("invalid {ENV_FLATTEN_DEPTH} `{value}`"))?;
                }
                ENV_REGISTRATION_POLICY => {
                    self.registration_policy = value.parse()?;
                }
                ENV_FLATTEN_CONFLICT => {
                    self.flatten_conflict = value.parse()?;
                }
                ENV_FLATTEN_PREFIX => {
                    self.flatten_use_prefix = parse_flag(value)
                        .with_context(|| format!("invalid {ENV_FLATTEN_PREFIX}"))?;
                }
                ENV_FLATTEN_SEPARATOR => {
                    self.flatten_prefix_separator = value.to_string();
                }
                _ => {}
            }
        }
        self.validate()
    }

    /// Reject settings the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(Error::Settings {
                message: "max_depth must be at least 1".to_string(),
                source: None,
            });
        }
        if self.flatten_depth == 0 {
            return Err(Error::Settings {
                message: "flatten_depth must be at least 1".to_string(),
                source: None,
            });
        }
        if self.flatten_prefix_separator.is_empty() {
            return Err(Error::Settings {
                message: "flatten_prefix_separator must not be empty".to_string(),
                source: None,
            });
        }
        Ok(())
    }

    /// Save settings as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn parse_flag(value: &str) -> anyhow::Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, found `{other}`"),
    }
}
