//! Configuration for kgstore.
//!
//! Settings are layered with `figment`, lowest priority first:
//!
//! 1. Built-in defaults ([`KgConfig::default`])
//! 2. An optional TOML file (`kgstore.toml` by default)
//! 3. Environment variables prefixed with `KGSTORE_`, using `__` to reach
//!    nested keys (`KGSTORE_VECTOR__LIMIT=25`)
//!
//! # Example
//!
//! ```rust
//! use kgstore_core::config::{CascadePolicy, KgConfig};
//!
//! let config = KgConfig::default();
//! assert_eq!(config.collections.nodes, "nodes");
//! assert_eq!(config.vector.limit, 10);
//! assert_eq!(config.consistency.cascade, CascadePolicy::Tolerant);
//! ```

use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::distance::DistanceMetric;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "kgstore.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "KGSTORE_";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A provider failed or the merged values do not fit [`KgConfig`].
    #[error("failed to extract configuration: {0}")]
    Extraction(#[from] Box<figment::Error>),

    /// A value was parsed but is not acceptable.
    #[error("invalid value for '{key}': {message}")]
    InvalidValue {
        /// Dotted key path.
        key: String,
        /// What is wrong with it.
        message: String,
    },

    /// The configuration could not be rendered.
    #[error("failed to serialize configuration: {0}")]
    Serialization(String),
}

/// Names of the three collections backing a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionsConfig {
    /// Node documents, keyed by node uid.
    pub nodes: String,
    /// Edge documents, keyed by edge uid.
    pub edges: String,
    /// Community documents, keyed by title.
    pub communities: String,
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            nodes: "nodes".to_string(),
            edges: "edges".to_string(),
            communities: "communities".to_string(),
        }
    }
}

/// Nearest-neighbor lookup settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    /// Node attribute holding the embedding.
    pub field: String,
    /// Number of neighbors returned.
    pub limit: usize,
    /// Distance measure requested from the store's index.
    pub metric: DistanceMetric,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            field: "embedding".to_string(),
            limit: 10,
            metric: DistanceMetric::Euclidean,
        }
    }
}

/// How cascades treat a neighbor that no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadePolicy {
    /// Skip the missing neighbor and continue.
    #[default]
    Tolerant,
    /// Fail with `NotFound` before anything is written.
    Strict,
}

/// How multi-document mutations are committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Atomic batch when the store offers one, sequential otherwise.
    #[default]
    Auto,
    /// Always best-effort sequential writes.
    Sequential,
    /// Require an atomic batch capability from the store.
    Atomic,
}

/// Consistency behaviour of the adjacency engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsistencyConfig {
    /// Missing-neighbor handling during cascades and adjacency repair.
    pub cascade: CascadePolicy,
    /// Commit strategy for multi-document writes.
    pub write_mode: WriteMode,
}

/// Logging settings for the embedding application.
///
/// The library never installs a subscriber; this is read by whoever does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` level filter.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Top-level kgstore configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KgConfig {
    /// Collection names.
    pub collections: CollectionsConfig,
    /// Vector lookup.
    pub vector: VectorConfig,
    /// Engine consistency behaviour.
    pub consistency: ConsistencyConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

impl KgConfig {
    /// Returns the layered figment (defaults, `kgstore.toml`, environment).
    #[must_use]
    pub fn figment() -> Figment {
        Self::figment_with_file(DEFAULT_CONFIG_FILE)
    }

    fn figment_with_file<P: AsRef<Path>>(path: P) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Loads configuration from `kgstore.toml` (if present) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment())
    }

    /// Loads configuration from the given TOML file and the environment.
    ///
    /// A missing file is not an error; the defaults apply.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment_with_file(path))
    }

    /// Extracts and validates a configuration from an arbitrary figment.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that deserialize fine but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let names = [
            ("collections.nodes", &self.collections.nodes),
            ("collections.edges", &self.collections.edges),
            ("collections.communities", &self.collections.communities),
        ];
        for (key, name) in names {
            if name.trim().is_empty() {
                return Err(invalid(key, "collection name cannot be empty"));
            }
        }
        if self.collections.nodes == self.collections.edges
            || self.collections.nodes == self.collections.communities
            || self.collections.edges == self.collections.communities
        {
            return Err(invalid(
                "collections",
                "nodes, edges and communities must use distinct collections",
            ));
        }

        if self.vector.field.trim().is_empty() {
            return Err(invalid("vector.field", "embedding field cannot be empty"));
        }
        if self.vector.limit == 0 {
            return Err(invalid("vector.limit", "must be greater than 0"));
        }

        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(invalid(
                "logging.level",
                &format!(
                    "'{}' is not one of {}",
                    self.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            ));
        }
        Ok(())
    }

    /// Renders the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialization(e.to_string()))
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
