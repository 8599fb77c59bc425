//! Routing decisions.
//!
//! Rules are evaluated in the caller's order and the first match wins. Evaluation is total and
//! side-effect free: it never fails, never performs I/O, and returns the same decision for the
//! same metadata and rules.
//!
//! Example
//! ```rust
//! use redrive::{RecordMeta, RoutingConfig, RoutingDecision, RoutingEngine};
//!
//! let config = RoutingConfig::builder().source("A", 3).exclude("KeyError").build().unwrap();
//! let engine = RoutingEngine::from_config(&config).unwrap();
//! let meta = RecordMeta {
//!     source_topic: "A".into(),
//!     error_type: "TimeoutError".into(),
//!     retry_count: 1,
//!     response_payload: Default::default(),
//! };
//! assert_eq!(engine.decide(&meta), RoutingDecision::Redrive { destination: "A".into() });
//! ```

use crate::config::RoutingConfig;
use crate::enrich::RecordMeta;
use crate::error::ConfigurationError;
use crate::policy::{RoutingRule, RuleAction, RuleTable};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of routing one record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RoutingDecision {
    /// Republish the payload to `destination` for another attempt.
    Redrive {
        /// Target of the republish.
        destination: String,
    },
    /// Retry budget consumed; send the record to the exhausted sink.
    Exhausted,
    /// No rule fired; the record is dropped and must be logged.
    NoMatch,
}

impl RoutingDecision {
    /// Check if this is a redrive.
    pub fn is_redrive(&self) -> bool {
        matches!(self, Self::Redrive { .. })
    }

    /// Check if this is an exhaustion.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted)
    }

    /// Check if no rule matched.
    pub fn is_no_match(&self) -> bool {
        matches!(self, Self::NoMatch)
    }

    /// Redrive destination, if any.
    pub fn destination(&self) -> Option<&str> {
        match self {
            Self::Redrive { destination } => Some(destination),
            _ => None,
        }
    }
}

impl fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Redrive { destination } => write!(f, "Redrive({})", destination),
            Self::Exhausted => write!(f, "Exhausted"),
            Self::NoMatch => write!(f, "NoMatch"),
        }
    }
}

impl From<&RuleAction> for RoutingDecision {
    fn from(action: &RuleAction) -> Self {
        match action {
            RuleAction::RedriveTo(dest) => Self::Redrive { destination: dest.clone() },
            RuleAction::SendToExhausted => Self::Exhausted,
        }
    }
}

/// First rule in `rules` whose predicate matches `meta`.
pub fn first_match<'r>(meta: &RecordMeta, rules: &'r [RoutingRule]) -> Option<&'r RoutingRule> {
    rules.iter().find(|rule| rule.predicate.matches(meta))
}

/// Evaluate `rules` in order against `meta`.
pub fn evaluate(meta: &RecordMeta, rules: &[RoutingRule]) -> RoutingDecision {
    first_match(meta, rules).map_or(RoutingDecision::NoMatch, |rule| (&rule.action).into())
}

/// Immutable routing engine over a validated [`RuleTable`].
#[derive(Clone, Debug, PartialEq)]
pub struct RoutingEngine {
    table: RuleTable,
}

impl RoutingEngine {
    /// Wrap a validated table.
    pub fn new(table: RuleTable) -> Self {
        Self { table }
    }

    /// Build the standard policy for `config`.
    pub fn from_config(config: &RoutingConfig) -> Result<Self, ConfigurationError> {
        RuleTable::from_config(config).map(Self::new)
    }

    /// Decide what to do with a record.
    pub fn decide(&self, meta: &RecordMeta) -> RoutingDecision {
        evaluate(meta, self.table.rules())
    }

    /// Decide and report the name of the rule that fired.
    pub fn decide_with_rule(&self, meta: &RecordMeta) -> (RoutingDecision, Option<&str>) {
        match first_match(meta, self.table.rules()) {
            Some(rule) => ((&rule.action).into(), Some(rule.name.as_str())),
            None => (RoutingDecision::NoMatch, None),
        }
    }

    /// The rule table.
    pub fn rules(&self) -> &RuleTable {
        &self.table
    }
}
