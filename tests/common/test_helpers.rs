use redrive::RoutingConfig;
use serde_json::{json, Value};

pub const TOPIC_ONE: &str = "arn:aws:sns:us-east-1:123456789012:sourceTopicOne";
pub const TOPIC_TWO: &str = "arn:aws:sns:us-east-1:123456789012:sourceTopicTwo";

/// Two sources with budgets 3 and 5; `KeyError` is never retried.
pub fn two_topic_config() -> RoutingConfig {
    RoutingConfig::builder()
        .source(TOPIC_ONE, 3)
        .source(TOPIC_TWO, 5)
        .exclude("KeyError")
        .build()
        .expect("valid config")
}

/// Direct-shape notification.
pub fn create_notification(source: &str, payload: Value, error_type: Option<&str>) -> Value {
    let response = match error_type {
        Some(t) => json!({"errorType": t, "errorMessage": "simulated failure"}),
        None => json!({"errorMessage": "simulated failure"}),
    };
    json!({
        "requestPayload": {"source_topic": source, "payload": payload},
        "responsePayload": response
    })
}

/// Dead-letter queue record wrapping an SNS-delivered invocation, as the queue consumer sees it.
pub fn create_queue_record(topic_arn: &str, message: Value, error_type: &str) -> Value {
    let notification = json!({
        "requestContext": {"condition": "RetriesExhausted", "approximateInvokeCount": 1},
        "requestPayload": {"Records": [{
            "EventSource": "aws:sns",
            "Sns": {"TopicArn": topic_arn, "Message": message.to_string()}
        }]},
        "responsePayload": {"errorType": error_type, "errorMessage": "simulated failure"}
    });
    json!({"messageId": "0b6f3c4e", "body": notification.to_string()})
}
