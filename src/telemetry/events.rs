use serde_json::json;
use std::fmt;

/// Events emitted while a batch moves through the pipeline.
///
/// Every routed record produces exactly one [`RoutingEvent`], so dropped (`NoMatch`) records
/// are as visible as redriven or exhausted ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Enrichment events
    Enrichment(EnrichmentEvent),
    /// Routing outcome events
    Routing(RoutingEvent),
    /// Dispatcher events
    Dispatch(DispatchEvent),
}

/// Events emitted by the enrichment stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentEvent {
    /// A batch was enriched successfully.
    BatchEnriched {
        /// Number of records produced.
        records: usize,
    },
    /// A batch was rejected because one notification was malformed.
    BatchRejected {
        /// Index of the offending notification.
        index: usize,
        /// Why it was rejected.
        reason: String,
    },
}

/// Events emitted for each routing decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingEvent {
    /// The record will be republished to its source.
    Redriven {
        /// Destination of the republish.
        destination: String,
        /// Failed attempts so far.
        retry_count: u64,
    },
    /// The record's retry budget is consumed.
    Exhausted {
        /// Originating source.
        source_topic: String,
        /// Failed attempts so far.
        retry_count: u64,
    },
    /// No rule matched; the record is dropped.
    Dropped {
        /// Originating source.
        source_topic: String,
        /// The error type that caused the drop (typically an excluded one).
        error_type: String,
        /// Failed attempts so far.
        retry_count: u64,
    },
}

/// Events emitted by the dispatch stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    /// The dispatcher failed to act on a decision.
    Failed {
        /// Index of the record in its batch.
        index: usize,
        /// Dispatcher error message.
        error: String,
    },
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineEvent::Enrichment(event) => write!(f, "Enrichment::{}", event),
            PipelineEvent::Routing(event) => write!(f, "Routing::{}", event),
            PipelineEvent::Dispatch(event) => write!(f, "Dispatch::{}", event),
        }
    }
}

impl fmt::Display for EnrichmentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrichmentEvent::BatchEnriched { records } => write!(f, "BatchEnriched({})", records),
            EnrichmentEvent::BatchRejected { index, reason } => {
                write!(f, "BatchRejected(index={}, reason={})", index, reason)
            }
        }
    }
}

impl fmt::Display for RoutingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingEvent::Redriven { destination, retry_count } => {
                write!(f, "Redriven({}, retry_count={})", destination, retry_count)
            }
            RoutingEvent::Exhausted { source_topic, retry_count } => {
                write!(f, "Exhausted({}, retry_count={})", source_topic, retry_count)
            }
            RoutingEvent::Dropped { source_topic, error_type, retry_count } => write!(
                f,
                "Dropped({}, error_type={}, retry_count={})",
                source_topic, error_type, retry_count
            ),
        }
    }
}

impl fmt::Display for DispatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchEvent::Failed { index, error } => {
                write!(f, "Failed(index={}, error={})", index, error)
            }
        }
    }
}

/// Convert a PipelineEvent into a JSON value for sinks.
pub fn event_to_json(event: &PipelineEvent) -> serde_json::Value {
    match event {
        PipelineEvent::Enrichment(e) => match e {
            EnrichmentEvent::BatchEnriched { records } => json!({
                "kind": "batch_enriched",
                "records": *records,
            }),
            EnrichmentEvent::BatchRejected { index, reason } => json!({
                "kind": "batch_rejected",
                "index": *index,
                "reason": reason,
            }),
        },
        PipelineEvent::Routing(r) => match r {
            RoutingEvent::Redriven { destination, retry_count } => json!({
                "kind": "redriven",
                "destination": destination,
                "retry_count": *retry_count,
            }),
            RoutingEvent::Exhausted { source_topic, retry_count } => json!({
                "kind": "exhausted",
                "source_topic": source_topic,
                "retry_count": *retry_count,
            }),
            RoutingEvent::Dropped { source_topic, error_type, retry_count } => json!({
                "kind": "dropped",
                "source_topic": source_topic,
                "error_type": error_type,
                "retry_count": *retry_count,
            }),
        },
        PipelineEvent::Dispatch(d) => match d {
            DispatchEvent::Failed { index, error } => json!({
                "kind": "dispatch_failed",
                "index": *index,
                "error": error,
            }),
        },
    }
}
