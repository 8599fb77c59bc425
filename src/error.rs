//! Error types for the retry pipeline.
//!
//! Three failure families exist:
//! - [`MalformedNotificationError`]: a structural defect in one notification of a batch. The
//!   whole batch is rejected so a failure record is never lost to partial enrichment.
//! - [`ConfigurationError`]: an invalid policy. Raised while loading or building, never while
//!   evaluating.
//! - [`DispatchError`]: the external dispatcher could not act on a decision.
//!
//! A record that matches no rule is *not* an error; see [`crate::RoutingDecision::NoMatch`].

/// Why a single notification could not be enriched.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MalformedReason {
    /// The notification (or a nested payload) is not a JSON object.
    #[error("{what} is not a JSON object")]
    NotAnObject {
        /// Which part of the notification was expected to be an object.
        what: &'static str,
    },
    /// A required field is absent or empty.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    /// A field is present but has the wrong type.
    #[error("field `{field}` must be {expected}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Human-readable expectation.
        expected: &'static str,
    },
    /// Embedded JSON text (queue body or SNS message) failed to decode.
    #[error("embedded {what} is not valid JSON: {detail}")]
    InvalidJson {
        /// Which embedded document failed to decode.
        what: &'static str,
        /// Decoder message.
        detail: String,
    },
    /// `retry_count` is present but not a non-negative integer that can be incremented.
    #[error("retry_count must be a non-negative integer below u64::MAX (got {0})")]
    InvalidRetryCount(String),
}

/// A notification in a batch was structurally invalid; the whole batch is rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed failure notification at index {index}: {reason}")]
pub struct MalformedNotificationError {
    /// Position of the offending notification in the batch.
    pub index: usize,
    /// What was wrong with it.
    pub reason: MalformedReason,
}

impl MalformedNotificationError {
    pub(crate) fn new(index: usize, reason: MalformedReason) -> Self {
        Self { index, reason }
    }
}

/// Invalid routing policy, surfaced at load time.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// No source has a max-retry threshold.
    #[error("routing config defines no sources")]
    NoSources,
    /// A threshold of zero can never redrive and is rejected.
    #[error("max_retry_count for source `{source_id}` must be > 0")]
    InvalidMaxRetryCount {
        /// Source with the bad threshold.
        source_id: String,
    },
    /// Source identifiers and excluded error types must be non-blank.
    #[error("{what} must not be blank")]
    BlankIdentifier {
        /// Which kind of identifier was blank.
        what: &'static str,
    },
    /// A rule references a source with no configured threshold.
    #[error("rule `{rule}` references source `{source_id}` with no configured max_retry_count")]
    UnknownSource {
        /// Offending rule name.
        rule: String,
        /// Source lacking a threshold.
        source_id: String,
    },
    /// Two rules share a name.
    #[error("duplicate rule name `{0}`")]
    DuplicateRule(String),
    /// A JSON pattern could not be interpreted.
    #[error("invalid pattern at `{path}`: {msg}")]
    InvalidPattern {
        /// Location inside the pattern document.
        path: String,
        /// What was wrong.
        msg: String,
    },
    /// The configuration document did not parse.
    #[error("failed to parse routing config: {0}")]
    Parse(String),
    /// The configuration file could not be read.
    #[error("failed to read routing config `{path}`: {msg}")]
    Io {
        /// File path.
        path: String,
        /// OS error message.
        msg: String,
    },
}

/// The external dispatcher failed to act on a decision.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DispatchError {
    /// Republishing to the source destination failed.
    #[error("redrive to `{destination}` failed: {reason}")]
    Redrive {
        /// Target destination.
        destination: String,
        /// Transport message.
        reason: String,
    },
    /// Enqueueing to the exhausted sink failed.
    #[error("exhausted sink enqueue failed: {0}")]
    Exhausted(String),
    /// The dispatcher is not available at all.
    #[error("dispatcher unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by [`crate::RetryPipeline::process_batch`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum PipelineError {
    /// The batch failed enrichment; nothing was dispatched.
    #[error(transparent)]
    Malformed(#[from] MalformedNotificationError),
    /// Dispatch of the record at `index` failed; later records were not dispatched.
    #[error("dispatch failed for record {index}: {source}")]
    Dispatch {
        /// Position of the record in the batch.
        index: usize,
        /// Underlying dispatcher error.
        #[source]
        source: DispatchError,
    },
}

impl PipelineError {
    /// Batch index this error refers to.
    pub fn index(&self) -> usize {
        match self {
            Self::Malformed(e) => e.index,
            Self::Dispatch { index, .. } => *index,
        }
    }

    /// Check if the batch was rejected during enrichment.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }

    /// Check if the batch failed while dispatching.
    pub fn is_dispatch(&self) -> bool {
        matches!(self, Self::Dispatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn malformed_display_names_index_and_reason() {
        let err = MalformedNotificationError::new(4, MalformedReason::MissingField("requestPayload"));
        let msg = err.to_string();
        assert!(msg.contains("index 4"));
        assert!(msg.contains("requestPayload"));
    }

    #[test]
    fn unknown_source_display() {
        let err = ConfigurationError::UnknownSource {
            rule: "redrive:orders".into(),
            source_id: "orders".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("redrive:orders"));
        assert!(msg.contains("no configured max_retry_count"));
    }

    #[test]
    fn pipeline_error_from_malformed() {
        let err: PipelineError =
            MalformedNotificationError::new(2, MalformedReason::MissingField("responsePayload"))
                .into();
        assert!(err.is_malformed());
        assert!(!err.is_dispatch());
        assert_eq!(err.index(), 2);
    }

    #[test]
    fn dispatch_error_is_source() {
        let err = PipelineError::Dispatch {
            index: 1,
            source: DispatchError::Unavailable("bus down".into()),
        };
        assert!(err.is_dispatch());
        assert_eq!(err.index(), 1);
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("dispatcher unavailable: bus down"));
    }
}
