mod common;

use async_trait::async_trait;
use common::test_helpers::{create_queue_record, two_topic_config, TOPIC_ONE, TOPIC_TWO};
use redrive::telemetry::{MemorySink, PipelineEvent, RoutingEvent};
use redrive::{
    DispatchError, Dispatched, Dispatcher, EnrichedRecord, InMemoryDispatcher, LiveRoutingEngine,
    OriginalPayload, RetryPipeline, RoutingDecision,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn live() -> LiveRoutingEngine {
    LiveRoutingEngine::from_config(&two_topic_config()).unwrap()
}

#[tokio::test]
async fn redriven_payload_carries_counter_into_next_cycle() {
    init_tracing();
    let dispatcher = InMemoryDispatcher::new();
    let pipeline = RetryPipeline::new(live(), dispatcher.clone());

    let mut message = json!({"order": "o-1"});
    let mut decisions = Vec::new();
    for _ in 0..4 {
        let report = pipeline
            .process_batch(&[create_queue_record(TOPIC_ONE, message.clone(), "TimeoutError")])
            .await
            .unwrap();
        let (record, decision) = report.outcomes.into_iter().next().unwrap();
        decisions.push(decision.clone());
        if !decision.is_redrive() {
            break;
        }
        // simulate the consumer failing again on the redriven payload
        message = Value::Object(record.payload);
    }

    assert_eq!(
        decisions,
        vec![
            RoutingDecision::Redrive { destination: TOPIC_ONE.into() },
            RoutingDecision::Redrive { destination: TOPIC_ONE.into() },
            RoutingDecision::Exhausted,
        ]
    );
    let redriven = dispatcher.redriven_to(TOPIC_ONE).await;
    assert_eq!(redriven.len(), 2);
    assert_eq!(redriven[0]["retry_count"], 1);
    assert_eq!(redriven[1]["retry_count"], 2);

    let exhausted = dispatcher.exhausted().await;
    assert_eq!(exhausted.len(), 1);
    assert_eq!(exhausted[0].meta.retry_count, 3);
    assert_eq!(exhausted[0].payload["order"], "o-1");
}

#[tokio::test]
async fn dropped_records_are_observable() {
    init_tracing();
    let dispatcher = InMemoryDispatcher::new();
    let sink = MemorySink::new();
    let pipeline = RetryPipeline::new(live(), dispatcher.clone()).with_sink(sink.clone());

    let batch: Vec<Value> = (0..3)
        .map(|i| create_queue_record(TOPIC_TWO, json!({"i": i}), "KeyError"))
        .collect();
    let report = pipeline.process_batch(&batch).await.unwrap();

    assert_eq!(report.dropped(), 3);
    let stats = pipeline.stats().snapshot();
    assert_eq!(stats.dropped, 3);
    assert_eq!(stats.dropped_by_error_type.get("KeyError"), Some(&3));

    let dropped_events = sink
        .events()
        .into_iter()
        .filter(|e| matches!(e, PipelineEvent::Routing(RoutingEvent::Dropped { .. })))
        .count();
    assert_eq!(dropped_events, 3);

    let discarded = dispatcher
        .sent()
        .await
        .into_iter()
        .filter(|d| matches!(d, Dispatched::Discarded(_)))
        .count();
    assert_eq!(discarded, 3);
}

struct FailingAt {
    calls: AtomicUsize,
    fail_on: usize,
    inner: InMemoryDispatcher,
}

#[async_trait]
impl Dispatcher for FailingAt {
    async fn redrive(&self, destination: &str, payload: &OriginalPayload) -> Result<(), DispatchError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == self.fail_on {
            return Err(DispatchError::Redrive {
                destination: destination.to_string(),
                reason: "throttled".into(),
            });
        }
        self.inner.redrive(destination, payload).await
    }

    async fn exhaust(&self, record: &EnrichedRecord) -> Result<(), DispatchError> {
        self.inner.exhaust(record).await
    }
}

#[tokio::test]
async fn dispatch_failure_stops_batch_and_reports_index() {
    init_tracing();
    let inner = InMemoryDispatcher::new();
    let dispatcher = FailingAt { calls: AtomicUsize::new(0), fail_on: 1, inner: inner.clone() };
    let sink = MemorySink::new();
    let pipeline = RetryPipeline::new(live(), dispatcher).with_sink(sink.clone());

    let batch: Vec<Value> = (0..3)
        .map(|i| create_queue_record(TOPIC_ONE, json!({"i": i}), "TimeoutError"))
        .collect();
    let err = pipeline.process_batch(&batch).await.unwrap_err();

    assert!(err.is_dispatch());
    assert_eq!(err.index(), 1);
    assert_eq!(inner.sent().await.len(), 1);
    let stats = pipeline.stats().snapshot();
    assert_eq!(stats.dispatch_failures, 1);
    assert_eq!(stats.redriven, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn independent_batches_run_concurrently() {
    let dispatcher = InMemoryDispatcher::new();
    let pipeline = Arc::new(RetryPipeline::new(live(), dispatcher.clone()));

    let mut handles = Vec::new();
    for worker in 0..8 {
        let pipeline = pipeline.clone();
        handles.push(tokio::spawn(async move {
            let batch: Vec<Value> = (0..10)
                .map(|i| create_queue_record(TOPIC_TWO, json!({"worker": worker, "i": i}), "TimeoutError"))
                .collect();
            pipeline.process_batch(&batch).await
        }));
    }
    for handle in handles {
        let report = handle.await.unwrap().unwrap();
        assert!(report.decisions().iter().all(|d| d.is_redrive()));
    }

    assert_eq!(dispatcher.redriven_to(TOPIC_TWO).await.len(), 80);
    assert_eq!(pipeline.stats().snapshot().redriven, 80);
}
