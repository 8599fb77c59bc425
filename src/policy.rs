//! Routing rules and rule tables.
//!
//! The standard policy generated by [`RuleTable::from_config`] is, in priority order:
//! 1. per source: redrive to the source when `retry_count < max` and `error_type` is not
//!    excluded;
//! 2. one catch-all: send to the exhausted sink when, for the record's own source,
//!    `retry_count >= max` and `error_type` is not excluded (an `$or` over per-source groups).
//!
//! Excluded error types match neither rule and fall through to `NoMatch`.

use crate::config::RoutingConfig;
use crate::error::ConfigurationError;
use crate::pattern::parse_pattern;
use crate::predicate::{Field, NumericOp, Predicate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Name of the generated exhausted rule.
pub const EXHAUSTED_RULE: &str = "exhausted";

/// What to do when a rule fires.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "destination", rename_all = "snake_case")]
pub enum RuleAction {
    /// Republish the payload to the named destination.
    RedriveTo(String),
    /// Enqueue the full record to the exhausted sink.
    SendToExhausted,
}

/// A predicate paired with the action it triggers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutingRule {
    /// Unique rule name, used in logs.
    pub name: String,
    /// Condition over the record metadata.
    pub predicate: Predicate,
    /// Action on match.
    pub action: RuleAction,
}

impl RoutingRule {
    /// Create a rule.
    pub fn new(name: impl Into<String>, predicate: Predicate, action: RuleAction) -> Self {
        Self { name: name.into(), predicate, action }
    }

    /// Create a rule from a provider-native JSON pattern.
    pub fn from_pattern(
        name: impl Into<String>,
        pattern: &Value,
        action: RuleAction,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self::new(name, parse_pattern(pattern)?, action))
    }
}

/// An ordered, validated list of rules. First match wins.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RuleTable {
    rules: Vec<RoutingRule>,
}

impl RuleTable {
    /// Generate the standard redrive/exhausted policy for `config`.
    pub fn from_config(config: &RoutingConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;

        let mut rules = Vec::with_capacity(config.max_retry_counts.len() + 1);
        let mut exhausted_groups = Vec::with_capacity(config.max_retry_counts.len());

        for (source, max) in &config.max_retry_counts {
            rules.push(RoutingRule::new(
                format!("redrive:{source}"),
                source_group(config, source, NumericOp::Lt, *max),
                RuleAction::RedriveTo(source.clone()),
            ));
            exhausted_groups.push(source_group(config, source, NumericOp::Ge, *max));
        }

        rules.push(RoutingRule::new(
            EXHAUSTED_RULE,
            Predicate::Any(exhausted_groups),
            RuleAction::SendToExhausted,
        ));

        Ok(Self { rules })
    }

    /// Validate caller-supplied rules against `config`.
    ///
    /// Every source selected via `source_topic` equality and every redrive destination must
    /// have a threshold in `config`; rule names must be unique.
    pub fn with_rules(rules: Vec<RoutingRule>, config: &RoutingConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;

        let mut names = HashSet::with_capacity(rules.len());
        for rule in &rules {
            if !names.insert(rule.name.as_str()) {
                return Err(ConfigurationError::DuplicateRule(rule.name.clone()));
            }
            let destination = match &rule.action {
                RuleAction::RedriveTo(dest) => Some(dest.as_str()),
                RuleAction::SendToExhausted => None,
            };
            for source in rule.predicate.referenced_sources().into_iter().chain(destination) {
                if config.max_for(source).is_none() {
                    return Err(ConfigurationError::UnknownSource {
                        rule: rule.name.clone(),
                        source_id: source.to_string(),
                    });
                }
            }
        }

        Ok(Self { rules })
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[RoutingRule] {
        &self.rules
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if the table has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn source_group(config: &RoutingConfig, source: &str, op: NumericOp, max: u64) -> Predicate {
    Predicate::all(vec![
        Predicate::one_of(Field::SourceTopic, [source]),
        Predicate::numeric(Field::RetryCount, op, max as f64),
        Predicate::anything_but(Field::ErrorType, config.excluded_error_types.iter().map(String::as_str)),
    ])
}
