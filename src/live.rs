//! Live-swappable routing engine.
//!
//! Reads are lock-free snapshots (`ArcSwap`). A reload validates the new config first; on
//! error the running engine stays in place, so a bad config never reaches evaluation.

use crate::config::RoutingConfig;
use crate::error::ConfigurationError;
use crate::routing::RoutingEngine;
use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::info;

/// Shared handle to the current [`RoutingEngine`].
#[derive(Clone, Debug)]
pub struct LiveRoutingEngine {
    inner: Arc<ArcSwap<RoutingEngine>>,
}

impl LiveRoutingEngine {
    /// Start with `engine`.
    pub fn new(engine: RoutingEngine) -> Self {
        Self { inner: Arc::new(ArcSwap::from_pointee(engine)) }
    }

    /// Build from a config.
    pub fn from_config(config: &RoutingConfig) -> Result<Self, ConfigurationError> {
        RoutingEngine::from_config(config).map(Self::new)
    }

    /// Snapshot the current engine. Decisions made on one snapshot are consistent.
    pub fn snapshot(&self) -> Arc<RoutingEngine> {
        self.inner.load_full()
    }

    /// Replace the engine outright.
    pub fn replace(&self, engine: RoutingEngine) {
        self.inner.store(Arc::new(engine));
    }

    /// Validate `config` and, if valid, publish the engine built from it.
    pub fn reload(&self, config: &RoutingConfig) -> Result<(), ConfigurationError> {
        let engine = RoutingEngine::from_config(config)?;
        info!(
            target: "redrive::routing",
            sources = config.max_retry_counts.len(),
            excluded = config.excluded_error_types.len(),
            "routing policy reloaded"
        );
        self.replace(engine);
        Ok(())
    }
}

impl From<RoutingEngine> for LiveRoutingEngine {
    fn from(engine: RoutingEngine) -> Self {
        Self::new(engine)
    }
}
