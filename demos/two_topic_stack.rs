//! Two source topics with retry budgets 3 and 5; `KeyError` failures are never retried.
//!
//! Simulates a consumer that keeps failing and feeds each redriven payload back through the
//! pipeline until it is exhausted or dropped.

use redrive::telemetry::LogSink;
use redrive::{InMemoryDispatcher, LiveRoutingEngine, RetryPipeline, RoutingConfig};
use serde_json::{json, Value};

const TOPIC_ONE: &str = "arn:aws:sns:us-east-1:123456789012:sourceTopicOne";
const TOPIC_TWO: &str = "arn:aws:sns:us-east-1:123456789012:sourceTopicTwo";

fn dead_letter(topic: &str, message: &Value, error_type: &str) -> Value {
    let notification = json!({
        "requestPayload": {"Records": [{"Sns": {"TopicArn": topic, "Message": message.to_string()}}]},
        "responsePayload": {"errorType": error_type, "errorMessage": "consumer failed"}
    });
    json!({"body": notification.to_string()})
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();
    println!("=== redrive: two-topic stack ===\n");

    let config = RoutingConfig::from_json_str(
        &json!({
            "max_retry_counts": {TOPIC_ONE: 3, TOPIC_TWO: 5},
            "excluded_error_types": ["KeyError"]
        })
        .to_string(),
    )?;
    let dispatcher = InMemoryDispatcher::new();
    let pipeline = RetryPipeline::new(LiveRoutingEngine::from_config(&config)?, dispatcher.clone())
        .with_sink(LogSink);

    let scenarios = [
        (TOPIC_ONE, json!({"order": "o-1"}), "TimeoutError"),
        (TOPIC_TWO, json!({"order": "o-2"}), "TimeoutError"),
        (TOPIC_ONE, json!({"order": "o-3"}), "KeyError"),
    ];

    for (topic, first_message, error_type) in scenarios {
        println!("--- {} failing with {} ---", first_message["order"], error_type);
        let mut message = first_message;
        loop {
            let report = pipeline.process_batch(&[dead_letter(topic, &message, error_type)]).await?;
            let Some((record, decision)) = report.outcomes.into_iter().next() else { break };
            println!("attempt {} -> {}", record.meta.retry_count, decision);
            if !decision.is_redrive() {
                break;
            }
            message = Value::Object(record.payload);
        }
    }

    let stats = pipeline.stats().snapshot();
    println!(
        "\nredriven={} exhausted={} dropped={} (by error type: {:?})",
        stats.redriven, stats.exhausted, stats.dropped, stats.dropped_by_error_type
    );
    println!("exhausted sink holds {} record(s)", dispatcher.exhausted().await.len());
    Ok(())
}
