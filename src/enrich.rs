//! Enrichment: derive retry metadata from raw failure notifications.
//!
//! Semantics:
//! - One [`EnrichedRecord`] per input notification, in input order.
//! - `retry_count` is `previous + 1`, or `1` when the payload has none. The new value is written
//!   back into the payload so the next attempt inherits it, and mirrored into
//!   [`RecordMeta::retry_count`].
//! - `error_type` is `responsePayload.errorType`, or `""` when absent.
//! - Any malformed notification rejects the whole batch with its index; no element is skipped
//!   or partially enriched.
//!
//! Example
//! ```rust
//! use redrive::EnrichmentTransformer;
//! use serde_json::json;
//!
//! let batch = vec![json!({
//!     "requestPayload": {"source_topic": "A", "payload": {"x": 1}},
//!     "responsePayload": {"errorType": "TimeoutError"}
//! })];
//! let records = EnrichmentTransformer::new().transform(&batch).unwrap();
//! assert_eq!(records[0].meta.retry_count, 1);
//! assert_eq!(records[0].meta.error_type, "TimeoutError");
//! ```

use crate::error::{MalformedNotificationError, MalformedReason};
use crate::notification::{ErrorInfo, FailureNotification, OriginalPayload};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

/// Payload key carrying the retry counter.
pub const RETRY_COUNT_FIELD: &str = "retry_count";

/// Routing metadata derived from a failure notification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Where the original message came from.
    pub source_topic: String,
    /// `errorType` of the failure, or empty.
    pub error_type: String,
    /// Number of failed attempts so far, starting at 1.
    pub retry_count: u64,
    /// The full error information, carried for inspection.
    pub response_payload: ErrorInfo,
}

/// A failure notification after enrichment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    /// Original payload with `retry_count` updated; replayed verbatim on redrive.
    pub payload: OriginalPayload,
    /// Routing metadata.
    pub meta: RecordMeta,
}

/// Stateless batch transformer from raw notifications to [`EnrichedRecord`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnrichmentTransformer;

impl EnrichmentTransformer {
    /// Create a transformer.
    pub fn new() -> Self {
        Self
    }

    /// Enrich a batch of raw JSON notifications (or queue records wrapping them).
    pub fn transform(&self, batch: &[Value]) -> Result<Vec<EnrichedRecord>, MalformedNotificationError> {
        batch
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                FailureNotification::from_value(raw)
                    .and_then(|n| enrich_one(&n))
                    .map_err(|reason| reject(index, reason))
            })
            .collect()
    }

    /// Enrich a batch of already-typed notifications.
    pub fn transform_notifications(
        &self,
        batch: &[FailureNotification],
    ) -> Result<Vec<EnrichedRecord>, MalformedNotificationError> {
        batch
            .iter()
            .enumerate()
            .map(|(index, n)| enrich_one(n).map_err(|reason| reject(index, reason)))
            .collect()
    }
}

fn reject(index: usize, reason: MalformedReason) -> MalformedNotificationError {
    error!(target: "redrive::enrich", index, reason = %reason, "rejecting failure batch");
    MalformedNotificationError::new(index, reason)
}

fn enrich_one(notification: &FailureNotification) -> Result<EnrichedRecord, MalformedReason> {
    let envelope = notification.envelope()?;
    let error_info = notification.error_info()?.clone();
    let mut payload = envelope.payload;

    let retry_count = next_retry_count(payload.get(RETRY_COUNT_FIELD))?;
    payload.insert(RETRY_COUNT_FIELD.to_string(), Value::from(retry_count));

    let error_type = error_type_of(&error_info);

    debug!(
        target: "redrive::enrich",
        source_topic = %envelope.source_topic,
        error_type = %error_type,
        retry_count,
        "enriched failure record"
    );

    Ok(EnrichedRecord {
        payload,
        meta: RecordMeta {
            source_topic: envelope.source_topic,
            error_type,
            retry_count,
            response_payload: error_info,
        },
    })
}

fn next_retry_count(previous: Option<&Value>) -> Result<u64, MalformedReason> {
    match previous {
        None => Ok(1),
        Some(value) => value
            .as_u64()
            .and_then(|n| n.checked_add(1))
            .ok_or_else(|| MalformedReason::InvalidRetryCount(value.to_string())),
    }
}

fn error_type_of(info: &ErrorInfo) -> String {
    match info.get("errorType") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
