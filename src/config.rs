//! Routing policy configuration.
//!
//! The recognized options are a per-source retry budget and a global set of error types that
//! are never retried:
//!
//! ```json
//! {
//!   "max_retry_counts": {"arn:topic-one": 3, "arn:topic-two": 5},
//!   "excluded_error_types": ["KeyError"]
//! }
//! ```
//!
//! Configs are immutable values passed explicitly into the routing layer. Validation happens
//! here, at load time, so evaluation never fails.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Per-source retry budget and globally excluded error types.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Maximum failed attempts per source before the record is exhausted.
    pub max_retry_counts: BTreeMap<String, u64>,
    /// Error types that are permanent: never redriven, never escalated.
    #[serde(default)]
    pub excluded_error_types: BTreeSet<String>,
}

impl RoutingConfig {
    /// Start building a config.
    pub fn builder() -> RoutingConfigBuilder {
        RoutingConfigBuilder::default()
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigurationError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigurationError::Io {
            path: path.display().to_string(),
            msg: e.to_string(),
        })?;
        Self::from_json_str(&text)
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_retry_counts.is_empty() {
            return Err(ConfigurationError::NoSources);
        }
        for (source, max) in &self.max_retry_counts {
            if source.trim().is_empty() {
                return Err(ConfigurationError::BlankIdentifier { what: "source id" });
            }
            if *max == 0 {
                return Err(ConfigurationError::InvalidMaxRetryCount { source_id: source.clone() });
            }
        }
        if self.excluded_error_types.iter().any(|e| e.trim().is_empty()) {
            return Err(ConfigurationError::BlankIdentifier { what: "excluded error type" });
        }
        Ok(())
    }

    /// Retry budget for `source`, if configured.
    pub fn max_for(&self, source: &str) -> Option<u64> {
        self.max_retry_counts.get(source).copied()
    }

    /// Check if `error_type` is permanently excluded.
    pub fn is_excluded(&self, error_type: &str) -> bool {
        self.excluded_error_types.contains(error_type)
    }
}

/// Builder for [`RoutingConfig`].
#[derive(Clone, Debug, Default)]
pub struct RoutingConfigBuilder {
    max_retry_counts: BTreeMap<String, u64>,
    excluded_error_types: BTreeSet<String>,
}

impl RoutingConfigBuilder {
    /// Set the retry budget for a source. Later calls for the same source win.
    pub fn source(mut self, source: impl Into<String>, max_retry_count: u64) -> Self {
        self.max_retry_counts.insert(source.into(), max_retry_count);
        self
    }

    /// Exclude an error type from retry and escalation.
    pub fn exclude(mut self, error_type: impl Into<String>) -> Self {
        self.excluded_error_types.insert(error_type.into());
        self
    }

    /// Build, validating inputs.
    pub fn build(self) -> Result<RoutingConfig, ConfigurationError> {
        let config = RoutingConfig {
            max_retry_counts: self.max_retry_counts,
            excluded_error_types: self.excluded_error_types,
        };
        config.validate()?;
        Ok(config)
    }
}
