//! Failure notifications as delivered by the dead-letter consumer.
//!
//! A notification carries the request that failed (`requestPayload`) and the error the
//! consumer returned (`responsePayload`). Two request shapes are understood:
//!
//! - direct: `{"source_topic": "...", "payload": {...}}` (`sourceTopic` is accepted too)
//! - SNS-delivered: `{"Records": [{"Sns": {"TopicArn": "...", "Message": "<json>"}}]}`
//!
//! Batch elements may also arrive wrapped in a queue record whose `body` holds the
//! notification as JSON text.

use crate::error::MalformedReason;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Arbitrary user payload of the original message.
pub type OriginalPayload = Map<String, Value>;

/// Diagnostic error information returned by the failing consumer.
pub type ErrorInfo = Map<String, Value>;

/// Raw failure notification: the original invocation plus the error it produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureNotification {
    /// The invocation request that failed.
    pub request_payload: Value,
    /// The error returned by the failing consumer.
    pub response_payload: Value,
}

/// Source identifier and user payload extracted from `requestPayload`.
#[derive(Clone, Debug, PartialEq)]
pub struct OriginalInvocationEnvelope {
    /// Where the original message was published.
    pub source_topic: String,
    /// The original user payload.
    pub payload: OriginalPayload,
}

impl FailureNotification {
    /// Build a notification from a batch element, unwrapping a queue record `body` if present.
    pub fn from_value(value: &Value) -> Result<Self, MalformedReason> {
        let obj = value.as_object().ok_or(MalformedReason::NotAnObject { what: "notification" })?;

        if let Some(body) = obj.get("body") {
            let decoded = decode_embedded(body, "queue body")?;
            return Self::from_value(&decoded);
        }

        let request_payload =
            obj.get("requestPayload").ok_or(MalformedReason::MissingField("requestPayload"))?;
        let response_payload =
            obj.get("responsePayload").ok_or(MalformedReason::MissingField("responsePayload"))?;

        Ok(Self {
            request_payload: request_payload.clone(),
            response_payload: response_payload.clone(),
        })
    }

    /// Extract the originating source and user payload.
    pub fn envelope(&self) -> Result<OriginalInvocationEnvelope, MalformedReason> {
        let request = self
            .request_payload
            .as_object()
            .ok_or(MalformedReason::NotAnObject { what: "requestPayload" })?;

        if let Some(records) = request.get("Records") {
            return sns_envelope(records);
        }

        let source_topic = request
            .get("source_topic")
            .or_else(|| request.get("sourceTopic"))
            .ok_or(MalformedReason::MissingField("source_topic"))?;
        let source_topic = non_empty_str(source_topic, "source_topic")?;

        let payload = match request.get("payload") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::String(text)) => into_object(decode_text(text, "payload")?, "payload")?,
            Some(_) => return Err(MalformedReason::NotAnObject { what: "payload" }),
            None => return Err(MalformedReason::MissingField("payload")),
        };

        Ok(OriginalInvocationEnvelope { source_topic, payload })
    }

    /// Borrow the error information object.
    pub fn error_info(&self) -> Result<&ErrorInfo, MalformedReason> {
        self.response_payload
            .as_object()
            .ok_or(MalformedReason::NotAnObject { what: "responsePayload" })
    }
}

fn sns_envelope(records: &Value) -> Result<OriginalInvocationEnvelope, MalformedReason> {
    let first = records
        .as_array()
        .and_then(|r| r.first())
        .ok_or(MalformedReason::MissingField("Records[0]"))?;
    let sns = first.get("Sns").ok_or(MalformedReason::MissingField("Records[0].Sns"))?;

    let topic = sns.get("TopicArn").ok_or(MalformedReason::MissingField("Records[0].Sns.TopicArn"))?;
    let source_topic = non_empty_str(topic, "Records[0].Sns.TopicArn")?;

    let message = sns.get("Message").ok_or(MalformedReason::MissingField("Records[0].Sns.Message"))?;
    let payload = into_object(decode_embedded(message, "SNS message")?, "SNS message")?;

    Ok(OriginalInvocationEnvelope { source_topic, payload })
}

fn non_empty_str(value: &Value, field: &'static str) -> Result<String, MalformedReason> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Ok(s.clone()),
        Value::String(_) => Err(MalformedReason::MissingField(field)),
        _ => Err(MalformedReason::InvalidField { field, expected: "a string" }),
    }
}

/// JSON text is decoded; an already-structured value is used as is.
fn decode_embedded(value: &Value, what: &'static str) -> Result<Value, MalformedReason> {
    match value {
        Value::String(text) => decode_text(text, what),
        other => Ok(other.clone()),
    }
}

fn decode_text(text: &str, what: &'static str) -> Result<Value, MalformedReason> {
    serde_json::from_str(text)
        .map_err(|e| MalformedReason::InvalidJson { what, detail: e.to_string() })
}

fn into_object(value: Value, what: &'static str) -> Result<Map<String, Value>, MalformedReason> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(MalformedReason::NotAnObject { what }),
    }
}
