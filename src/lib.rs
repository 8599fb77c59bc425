#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # redrive
//!
//! Core of an asynchronous failure-retry pipeline. When a downstream consumer fails, its
//! failure notification is enriched with retry metadata and routed back to the original source,
//! to a terminal "exhausted" sink, or dropped, according to a per-source retry policy.
//!
//! ## Components
//!
//! - **Enrichment** ([`EnrichmentTransformer`]): batch of raw failure notifications to
//!   [`EnrichedRecord`]s. Pure; malformed input rejects the whole batch.
//! - **Routing** ([`RoutingEngine`]): first-match evaluation of an ordered [`RuleTable`] of
//!   [`Predicate`] trees against [`RecordMeta`]. Pure and total.
//! - **Pipeline** ([`RetryPipeline`]): drives batches through both and hands decisions to a
//!   [`Dispatcher`], emitting telemetry for every outcome.
//!
//! ## Quick Start
//!
//! ```rust
//! use redrive::{EnrichmentTransformer, RoutingConfig, RoutingDecision, RoutingEngine};
//! use serde_json::json;
//!
//! let config = RoutingConfig::builder()
//!     .source("A", 3)
//!     .exclude("KeyError")
//!     .build()
//!     .unwrap();
//! let engine = RoutingEngine::from_config(&config).unwrap();
//!
//! let batch = vec![json!({
//!     "requestPayload": {"source_topic": "A", "payload": {"retry_count": 4}},
//!     "responsePayload": {"errorType": "TimeoutError"}
//! })];
//! let records = EnrichmentTransformer::new().transform(&batch).unwrap();
//! assert_eq!(records[0].meta.retry_count, 5);
//! assert_eq!(engine.decide(&records[0].meta), RoutingDecision::Exhausted);
//! ```

pub mod config;
pub mod dispatch;
pub mod enrich;
pub mod error;
pub mod live;
pub mod notification;
pub mod pattern;
pub mod pipeline;
pub mod policy;
pub mod predicate;
pub mod prelude;
pub mod routing;
pub mod telemetry;

// Re-exports
pub use config::{RoutingConfig, RoutingConfigBuilder};
pub use dispatch::{Dispatched, Dispatcher, InMemoryDispatcher};
pub use enrich::{EnrichedRecord, EnrichmentTransformer, RecordMeta, RETRY_COUNT_FIELD};
pub use error::{
    ConfigurationError, DispatchError, MalformedNotificationError, MalformedReason, PipelineError,
};
pub use live::LiveRoutingEngine;
pub use notification::{ErrorInfo, FailureNotification, OriginalInvocationEnvelope, OriginalPayload};
pub use pattern::{parse_pattern, parse_pattern_str};
pub use pipeline::{BatchReport, PipelineStats, RetryPipeline, StatsSnapshot};
pub use policy::{RoutingRule, RuleAction, RuleTable, EXHAUSTED_RULE};
pub use predicate::{Comparison, Field, FieldValue, Literal, Matcher, NumericOp, Predicate};
pub use routing::{evaluate, first_match, RoutingDecision, RoutingEngine};
