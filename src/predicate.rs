//! Predicate tree evaluated against [`RecordMeta`].
//!
//! Semantics:
//! - [`Matcher::OneOf`]: the field equals one of the literals. Strings only match strings and
//!   numbers only match numbers.
//! - [`Matcher::Numeric`]: the field is read as a number (strings are parsed) and every
//!   comparison must hold. A non-numeric field never matches.
//! - [`Matcher::AnythingBut`]: the field is not one of the literals.
//! - [`Predicate::All`] is a conjunction (sibling fields of one pattern group),
//!   [`Predicate::Any`] a disjunction (`$or`). `All([])` is true, `Any([])` is false.
//!
//! Evaluation is pure and total: every [`Field`] is defined on every `RecordMeta`.

use crate::enrich::RecordMeta;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A `RecordMeta` field addressable from a predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// `meta.source_topic`
    SourceTopic,
    /// `meta.error_type`
    ErrorType,
    /// `meta.retry_count`
    RetryCount,
}

impl Field {
    /// Field name as it appears in patterns.
    pub fn name(self) -> &'static str {
        match self {
            Field::SourceTopic => "source_topic",
            Field::ErrorType => "error_type",
            Field::RetryCount => "retry_count",
        }
    }

    /// Look a field up by its pattern name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "source_topic" => Some(Field::SourceTopic),
            "error_type" => Some(Field::ErrorType),
            "retry_count" => Some(Field::RetryCount),
            _ => None,
        }
    }

    /// Read this field from `meta`.
    pub fn value_of(self, meta: &RecordMeta) -> FieldValue<'_> {
        match self {
            Field::SourceTopic => FieldValue::Str(&meta.source_topic),
            Field::ErrorType => FieldValue::Str(&meta.error_type),
            Field::RetryCount => FieldValue::Int(meta.retry_count),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A borrowed field value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldValue<'a> {
    /// Textual field.
    Str(&'a str),
    /// Integer field.
    Int(u64),
}

impl FieldValue<'_> {
    fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Int(n) => Some(*n as f64),
            FieldValue::Str(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }
}

/// Literal operand of an equality or exclusion matcher.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    /// String literal.
    Str(String),
    /// Numeric literal.
    Num(f64),
}

impl Literal {
    /// Identity comparison against a field value.
    pub fn matches(&self, value: FieldValue<'_>) -> bool {
        match (self, value) {
            (Literal::Str(lit), FieldValue::Str(v)) => lit == v,
            (Literal::Num(lit), FieldValue::Int(v)) => *lit == v as f64,
            _ => false,
        }
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::Str(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::Str(s)
    }
}

impl From<u64> for Literal {
    fn from(n: u64) -> Self {
        Literal::Num(n as f64)
    }
}

impl From<f64> for Literal {
    fn from(n: f64) -> Self {
        Literal::Num(n)
    }
}

/// Numeric comparison operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumericOp {
    /// `<`
    #[serde(rename = "<")]
    Lt,
    /// `<=`
    #[serde(rename = "<=")]
    Le,
    /// `>`
    #[serde(rename = ">")]
    Gt,
    /// `>=`
    #[serde(rename = ">=")]
    Ge,
    /// `==` (also written `=` in patterns)
    #[serde(rename = "==", alias = "=")]
    Eq,
}

impl NumericOp {
    /// Parse the textual operator used in patterns.
    pub fn parse(op: &str) -> Option<Self> {
        match op {
            "<" => Some(NumericOp::Lt),
            "<=" => Some(NumericOp::Le),
            ">" => Some(NumericOp::Gt),
            ">=" => Some(NumericOp::Ge),
            "==" | "=" => Some(NumericOp::Eq),
            _ => None,
        }
    }

    /// Textual form.
    pub fn as_str(self) -> &'static str {
        match self {
            NumericOp::Lt => "<",
            NumericOp::Le => "<=",
            NumericOp::Gt => ">",
            NumericOp::Ge => ">=",
            NumericOp::Eq => "==",
        }
    }

    fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            NumericOp::Lt => lhs < rhs,
            NumericOp::Le => lhs <= rhs,
            NumericOp::Gt => lhs > rhs,
            NumericOp::Ge => lhs >= rhs,
            NumericOp::Eq => lhs == rhs,
        }
    }
}

/// `field <op> threshold`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Operator.
    pub op: NumericOp,
    /// Right-hand side.
    pub threshold: f64,
}

impl Comparison {
    /// Create a comparison.
    pub fn new(op: NumericOp, threshold: f64) -> Self {
        Self { op, threshold }
    }
}

/// Condition on a single field value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "operands", rename_all = "snake_case")]
pub enum Matcher {
    /// Value equals one of the literals.
    OneOf(Vec<Literal>),
    /// Value, read as a number, satisfies every comparison.
    Numeric(Vec<Comparison>),
    /// Value is none of the literals.
    AnythingBut(Vec<Literal>),
}

impl Matcher {
    /// Evaluate against a field value.
    pub fn matches(&self, value: FieldValue<'_>) -> bool {
        match self {
            Matcher::OneOf(set) => set.iter().any(|lit| lit.matches(value)),
            Matcher::Numeric(comparisons) => match value.as_number() {
                Some(n) => comparisons.iter().all(|c| c.op.holds(n, c.threshold)),
                None => false,
            },
            Matcher::AnythingBut(set) => !set.iter().any(|lit| lit.matches(value)),
        }
    }
}

/// Boolean tree of field conditions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// A single field condition.
    Field {
        /// Field to read.
        field: Field,
        /// Condition on its value.
        matcher: Matcher,
    },
    /// Every child matches.
    All(Vec<Predicate>),
    /// At least one child matches.
    Any(Vec<Predicate>),
}

impl Predicate {
    /// `field` equals one of `literals`.
    pub fn one_of<I, L>(field: Field, literals: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Literal>,
    {
        Predicate::Field { field, matcher: Matcher::OneOf(literals.into_iter().map(Into::into).collect()) }
    }

    /// `field <op> threshold`.
    pub fn numeric(field: Field, op: NumericOp, threshold: f64) -> Self {
        Predicate::Field { field, matcher: Matcher::Numeric(vec![Comparison::new(op, threshold)]) }
    }

    /// `field` is none of `literals`.
    pub fn anything_but<I, L>(field: Field, literals: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Literal>,
    {
        Predicate::Field {
            field,
            matcher: Matcher::AnythingBut(literals.into_iter().map(Into::into).collect()),
        }
    }

    /// Conjunction.
    pub fn all(children: Vec<Predicate>) -> Self {
        Predicate::All(children)
    }

    /// Disjunction.
    pub fn any(children: Vec<Predicate>) -> Self {
        Predicate::Any(children)
    }

    /// Evaluate against a record's metadata.
    pub fn matches(&self, meta: &RecordMeta) -> bool {
        match self {
            Predicate::Field { field, matcher } => matcher.matches(field.value_of(meta)),
            Predicate::All(children) => children.iter().all(|p| p.matches(meta)),
            Predicate::Any(children) => children.iter().any(|p| p.matches(meta)),
        }
    }

    /// Source identifiers this predicate selects through `source_topic` equality.
    pub fn referenced_sources(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_sources(&mut out);
        out
    }

    fn collect_sources<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::Field { field: Field::SourceTopic, matcher: Matcher::OneOf(set) } => {
                out.extend(set.iter().filter_map(|lit| match lit {
                    Literal::Str(s) => Some(s.as_str()),
                    Literal::Num(_) => None,
                }));
            }
            Predicate::Field { .. } => {}
            Predicate::All(children) | Predicate::Any(children) => {
                children.iter().for_each(|c| c.collect_sources(out));
            }
        }
    }
}
