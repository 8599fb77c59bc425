//! Convenient re-exports for common redrive types.
pub use crate::{
    config::RoutingConfig,
    dispatch::Dispatcher,
    enrich::{EnrichedRecord, EnrichmentTransformer, RecordMeta},
    error::{ConfigurationError, MalformedNotificationError, PipelineError},
    live::LiveRoutingEngine,
    pipeline::RetryPipeline,
    policy::{RoutingRule, RuleAction, RuleTable},
    predicate::{Field, NumericOp, Predicate},
    routing::{RoutingDecision, RoutingEngine},
};
