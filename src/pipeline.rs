//! End-to-end batch processing: enrich, route, dispatch.
//!
//! Semantics:
//! - Enrichment failure rejects the batch before anything is dispatched.
//! - One [`RoutingEngine`](crate::RoutingEngine) snapshot is used for the whole batch.
//! - Records are routed and dispatched in input order.
//! - A dispatch failure stops the batch and is returned with the record index; the caller
//!   redelivers the batch (duplicate redrives are acceptable, lost ones are not).
//! - `NoMatch` records are logged at `warn`, counted, emitted as
//!   [`RoutingEvent::Dropped`], and handed to [`Dispatcher::discard`].

use crate::dispatch::Dispatcher;
use crate::enrich::{EnrichedRecord, EnrichmentTransformer};
use crate::error::PipelineError;
use crate::live::LiveRoutingEngine;
use crate::routing::RoutingDecision;
use crate::telemetry::{
    emit_best_effort, DispatchEvent, EnrichmentEvent, NullSink, PipelineEvent, RoutingEvent,
    TelemetrySink,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Outcome of one successfully processed batch.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchReport {
    /// Enriched records paired with their decisions, in input order.
    pub outcomes: Vec<(EnrichedRecord, RoutingDecision)>,
}

impl BatchReport {
    /// Decisions in input order.
    pub fn decisions(&self) -> Vec<&RoutingDecision> {
        self.outcomes.iter().map(|(_, d)| d).collect()
    }

    /// Number of records that matched no rule.
    pub fn dropped(&self) -> usize {
        self.outcomes.iter().filter(|(_, d)| d.is_no_match()).count()
    }
}

/// Cumulative pipeline counters.
#[derive(Debug, Default)]
pub struct PipelineStats {
    enriched: AtomicU64,
    redriven: AtomicU64,
    exhausted: AtomicU64,
    dropped: AtomicU64,
    rejected_batches: AtomicU64,
    dispatch_failures: AtomicU64,
    dropped_by_error_type: Mutex<BTreeMap<String, u64>>,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Records enriched.
    pub enriched: u64,
    /// Records redriven.
    pub redriven: u64,
    /// Records sent to the exhausted sink.
    pub exhausted: u64,
    /// Records dropped after matching no rule.
    pub dropped: u64,
    /// Batches rejected as malformed.
    pub rejected_batches: u64,
    /// Dispatcher failures.
    pub dispatch_failures: u64,
    /// Dropped records per error type.
    pub dropped_by_error_type: BTreeMap<String, u64>,
}

impl PipelineStats {
    /// Copy the current counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            enriched: self.enriched.load(Ordering::Relaxed),
            redriven: self.redriven.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            rejected_batches: self.rejected_batches.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
            dropped_by_error_type: self
                .dropped_by_error_type
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone(),
        }
    }

    fn record_drop(&self, error_type: &str) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        let mut tally =
            self.dropped_by_error_type.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *tally.entry(error_type.to_string()).or_insert(0) += 1;
    }
}

/// Drives batches from the dead-letter consumer through enrichment, routing and dispatch.
pub struct RetryPipeline<D, S = NullSink> {
    enricher: EnrichmentTransformer,
    engine: LiveRoutingEngine,
    dispatcher: D,
    sink: S,
    stats: Arc<PipelineStats>,
}

impl<D> RetryPipeline<D, NullSink>
where
    D: Dispatcher,
{
    /// Create a pipeline without telemetry.
    pub fn new(engine: impl Into<LiveRoutingEngine>, dispatcher: D) -> Self {
        Self {
            enricher: EnrichmentTransformer::new(),
            engine: engine.into(),
            dispatcher,
            sink: NullSink,
            stats: Arc::new(PipelineStats::default()),
        }
    }
}

impl<D, S> RetryPipeline<D, S>
where
    D: Dispatcher,
    S: TelemetrySink,
    S::Future: Send + 'static,
{
    /// Attach a telemetry sink.
    pub fn with_sink<T>(self, sink: T) -> RetryPipeline<D, T>
    where
        T: TelemetrySink,
    {
        RetryPipeline {
            enricher: self.enricher,
            engine: self.engine,
            dispatcher: self.dispatcher,
            sink,
            stats: self.stats,
        }
    }

    /// Handle used to reload the routing policy.
    pub fn engine(&self) -> &LiveRoutingEngine {
        &self.engine
    }

    /// Shared counters.
    pub fn stats(&self) -> Arc<PipelineStats> {
        self.stats.clone()
    }

    /// Process one batch of raw notifications.
    pub async fn process_batch(&self, batch: &[Value]) -> Result<BatchReport, PipelineError> {
        let records = match self.enricher.transform(batch) {
            Ok(records) => records,
            Err(e) => {
                self.stats.rejected_batches.fetch_add(1, Ordering::Relaxed);
                self.emit(PipelineEvent::Enrichment(EnrichmentEvent::BatchRejected {
                    index: e.index,
                    reason: e.reason.to_string(),
                }))
                .await;
                return Err(e.into());
            }
        };
        self.stats.enriched.fetch_add(records.len() as u64, Ordering::Relaxed);
        self.emit(PipelineEvent::Enrichment(EnrichmentEvent::BatchEnriched {
            records: records.len(),
        }))
        .await;

        let engine = self.engine.snapshot();
        let mut outcomes = Vec::with_capacity(records.len());

        for (index, record) in records.into_iter().enumerate() {
            let (decision, rule) = engine.decide_with_rule(&record.meta);
            let meta = &record.meta;

            let (dispatched, event) = match &decision {
                RoutingDecision::Redrive { destination } => {
                    debug!(
                        target: "redrive::routing",
                        rule = rule.unwrap_or_default(),
                        destination = %destination,
                        retry_count = meta.retry_count,
                        "redriving record"
                    );
                    (
                        self.dispatcher.redrive(destination, &record.payload).await,
                        RoutingEvent::Redriven {
                            destination: destination.clone(),
                            retry_count: meta.retry_count,
                        },
                    )
                }
                RoutingDecision::Exhausted => {
                    debug!(
                        target: "redrive::routing",
                        rule = rule.unwrap_or_default(),
                        source_topic = %meta.source_topic,
                        retry_count = meta.retry_count,
                        "retry budget exhausted"
                    );
                    (
                        self.dispatcher.exhaust(&record).await,
                        RoutingEvent::Exhausted {
                            source_topic: meta.source_topic.clone(),
                            retry_count: meta.retry_count,
                        },
                    )
                }
                RoutingDecision::NoMatch => {
                    warn!(
                        target: "redrive::routing",
                        source_topic = %meta.source_topic,
                        error_type = %meta.error_type,
                        retry_count = meta.retry_count,
                        "no routing rule matched; dropping record"
                    );
                    (
                        self.dispatcher.discard(&record).await,
                        RoutingEvent::Dropped {
                            source_topic: meta.source_topic.clone(),
                            error_type: meta.error_type.clone(),
                            retry_count: meta.retry_count,
                        },
                    )
                }
            };

            if let Err(source) = dispatched {
                self.stats.dispatch_failures.fetch_add(1, Ordering::Relaxed);
                warn!(target: "redrive::dispatch", index, error = %source, "dispatch failed");
                self.emit(PipelineEvent::Dispatch(DispatchEvent::Failed {
                    index,
                    error: source.to_string(),
                }))
                .await;
                return Err(PipelineError::Dispatch { index, source });
            }

            match &decision {
                RoutingDecision::Redrive { .. } => {
                    self.stats.redriven.fetch_add(1, Ordering::Relaxed);
                }
                RoutingDecision::Exhausted => {
                    self.stats.exhausted.fetch_add(1, Ordering::Relaxed);
                }
                RoutingDecision::NoMatch => self.stats.record_drop(&record.meta.error_type),
            }
            self.emit(PipelineEvent::Routing(event)).await;
            outcomes.push((record, decision));
        }

        Ok(BatchReport { outcomes })
    }

    async fn emit(&self, event: PipelineEvent) {
        emit_best_effort(self.sink.clone(), event).await;
    }
}
