//! Telemetry for the retry pipeline.
//!
//! The pipeline emits a structured event for every batch and every routed record. Events flow
//! through `TelemetrySink` implementations which can log, retain, or forward them.
//!
//! # Event Types
//!
//! - **Enrichment**: `BatchEnriched`, `BatchRejected`
//! - **Routing**: `Redriven`, `Exhausted`, `Dropped`
//! - **Dispatch**: `Failed`
//!
//! # Telemetry Sinks
//!
//! The `TelemetrySink` trait defines how events are consumed. It's implemented
//! as a `tower::Service<PipelineEvent>` for composability.

pub mod events;
pub mod sinks;

pub use events::{event_to_json, DispatchEvent, EnrichmentEvent, PipelineEvent, RoutingEvent};
pub use sinks::{
    emit_best_effort, ComposedSinkError, LogSink, MemorySink, MulticastSink, NullSink,
    TelemetrySink,
};
