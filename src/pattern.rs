//! Provider-native JSON pattern notation.
//!
//! Parses the pattern objects event buses use for rule matching into a [`Predicate`]. The
//! object addresses `meta` fields directly:
//!
//! ```json
//! {
//!   "source_topic": ["arn:topic-one"],
//!   "retry_count": [{"numeric": ["<", 3]}],
//!   "error_type": [{"anything-but": ["KeyError"]}]
//! }
//! ```
//!
//! - Each field maps to an array of alternatives; plain strings/numbers form one equality set.
//! - `{"numeric": [op, n, op, n, ...]}` holds when every comparison holds.
//! - `{"anything-but": [..]}` (or a single scalar) excludes the listed values.
//! - `"$or": [group, group, ...]` matches when one whole group matches.
//! - Sibling keys are ANDed.
//!
//! A document wrapped as `{"detail": {"meta": {...}}}` or `{"meta": {...}}` is unwrapped.

use crate::error::ConfigurationError;
use crate::predicate::{Comparison, Field, Literal, Matcher, NumericOp, Predicate};
use serde_json::{Map, Value};

/// Parse a pattern document into a predicate.
pub fn parse_pattern(pattern: &Value) -> Result<Predicate, ConfigurationError> {
    let mut path = String::from("$");
    let mut group = pattern;
    for wrapper in ["detail", "meta"] {
        if let Some(inner) = group.as_object().and_then(|o| single_key(o, wrapper)) {
            path.push('.');
            path.push_str(wrapper);
            group = inner;
        }
    }
    parse_group(group, &path)
}

/// Parse a pattern from JSON text.
pub fn parse_pattern_str(text: &str) -> Result<Predicate, ConfigurationError> {
    let value: Value = serde_json::from_str(text).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
    parse_pattern(&value)
}

fn single_key<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    if obj.len() == 1 {
        obj.get(key)
    } else {
        None
    }
}

fn invalid(path: &str, msg: impl Into<String>) -> ConfigurationError {
    ConfigurationError::InvalidPattern { path: path.to_string(), msg: msg.into() }
}

fn parse_group(value: &Value, path: &str) -> Result<Predicate, ConfigurationError> {
    let obj = value.as_object().ok_or_else(|| invalid(path, "pattern group must be an object"))?;
    if obj.is_empty() {
        return Err(invalid(path, "pattern group must not be empty"));
    }

    let mut conjuncts = Vec::with_capacity(obj.len());
    for (key, rule) in obj {
        let here = format!("{path}.{key}");
        if key == "$or" {
            conjuncts.push(parse_or(rule, &here)?);
            continue;
        }
        let field = Field::from_name(key).ok_or_else(|| invalid(&here, "unknown field"))?;
        conjuncts.push(parse_field(field, rule, &here)?);
    }

    Ok(if conjuncts.len() == 1 { conjuncts.remove(0) } else { Predicate::All(conjuncts) })
}

fn parse_or(value: &Value, path: &str) -> Result<Predicate, ConfigurationError> {
    let branches = value.as_array().ok_or_else(|| invalid(path, "$or must be an array"))?;
    if branches.len() < 2 {
        return Err(invalid(path, "$or needs at least two groups"));
    }
    branches
        .iter()
        .enumerate()
        .map(|(i, b)| parse_group(b, &format!("{path}[{i}]")))
        .collect::<Result<Vec<_>, _>>()
        .map(Predicate::Any)
}

fn parse_field(field: Field, value: &Value, path: &str) -> Result<Predicate, ConfigurationError> {
    let entries = value.as_array().ok_or_else(|| invalid(path, "field rule must be an array"))?;
    if entries.is_empty() {
        return Err(invalid(path, "field rule must not be empty"));
    }

    let mut literals = Vec::new();
    let mut alternatives = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        let here = format!("{path}[{i}]");
        match entry {
            Value::Object(op) => alternatives.push(parse_operator(op, &here)?),
            other => literals.push(literal(other, &here)?),
        }
    }
    if !literals.is_empty() {
        alternatives.insert(0, Matcher::OneOf(literals));
    }

    let mut predicates: Vec<Predicate> =
        alternatives.into_iter().map(|matcher| Predicate::Field { field, matcher }).collect();
    Ok(if predicates.len() == 1 { predicates.remove(0) } else { Predicate::Any(predicates) })
}

fn parse_operator(op: &Map<String, Value>, path: &str) -> Result<Matcher, ConfigurationError> {
    let (name, operand) = match op.iter().next() {
        Some(pair) if op.len() == 1 => pair,
        _ => return Err(invalid(path, "operator object must have exactly one key")),
    };
    let here = format!("{path}.{name}");
    match name.as_str() {
        "numeric" => parse_numeric(operand, &here),
        "anything-but" => {
            let set = match operand {
                Value::Array(items) => items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| literal(v, &format!("{here}[{i}]")))
                    .collect::<Result<Vec<_>, _>>()?,
                scalar => vec![literal(scalar, &here)?],
            };
            Ok(Matcher::AnythingBut(set))
        }
        other => Err(invalid(path, format!("unsupported operator `{other}`"))),
    }
}

fn parse_numeric(value: &Value, path: &str) -> Result<Matcher, ConfigurationError> {
    let items = value.as_array().ok_or_else(|| invalid(path, "numeric operand must be an array"))?;
    if items.is_empty() || items.len() % 2 != 0 {
        return Err(invalid(path, "numeric operand must be [op, number, ...] pairs"));
    }
    let comparisons = items
        .chunks(2)
        .map(|pair| {
            let op = pair[0]
                .as_str()
                .and_then(NumericOp::parse)
                .ok_or_else(|| invalid(path, format!("unknown numeric operator {}", pair[0])))?;
            let threshold = pair[1]
                .as_f64()
                .ok_or_else(|| invalid(path, format!("numeric threshold {} is not a number", pair[1])))?;
            Ok(Comparison::new(op, threshold))
        })
        .collect::<Result<Vec<_>, ConfigurationError>>()?;
    Ok(Matcher::Numeric(comparisons))
}

fn literal(value: &Value, path: &str) -> Result<Literal, ConfigurationError> {
    match value {
        Value::String(s) => Ok(Literal::Str(s.clone())),
        Value::Number(n) => n
            .as_f64()
            .map(Literal::Num)
            .ok_or_else(|| invalid(path, "number out of range")),
        _ => Err(invalid(path, "literal must be a string or number")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_redrive_pattern() {
        let p = parse_pattern(&json!({
            "source_topic": ["A"],
            "retry_count": [{"numeric": ["<", 3]}],
            "error_type": [{"anything-but": ["KeyError"]}]
        }))
        .unwrap();
        let Predicate::All(children) = p else { panic!("expected conjunction") };
        assert_eq!(children.len(), 3);
        assert!(children.contains(&Predicate::one_of(Field::SourceTopic, ["A"])));
        assert!(children.contains(&Predicate::numeric(Field::RetryCount, NumericOp::Lt, 3.0)));
        assert!(children.contains(&Predicate::anything_but(Field::ErrorType, ["KeyError"])));
    }

    #[test]
    fn unwraps_detail_meta() {
        let p = parse_pattern(&json!({"detail": {"meta": {"source_topic": ["A"]}}})).unwrap();
        assert_eq!(p, Predicate::one_of(Field::SourceTopic, ["A"]));
    }

    #[test]
    fn mixed_entries_are_alternatives() {
        let p = parse_pattern(&json!({"retry_count": [1, {"numeric": [">", 10]}]})).unwrap();
        assert_eq!(
            p,
            Predicate::Any(vec![
                Predicate::one_of(Field::RetryCount, [1u64]),
                Predicate::numeric(Field::RetryCount, NumericOp::Gt, 10.0),
            ])
        );
    }

    #[test]
    fn numeric_range() {
        let p = parse_pattern(&json!({"retry_count": [{"numeric": [">", 0, "<=", 5]}]})).unwrap();
        assert_eq!(
            p,
            Predicate::Field {
                field: Field::RetryCount,
                matcher: Matcher::Numeric(vec![
                    Comparison::new(NumericOp::Gt, 0.0),
                    Comparison::new(NumericOp::Le, 5.0),
                ]),
            }
        );
    }

    #[test]
    fn anything_but_scalar() {
        let p = parse_pattern(&json!({"error_type": [{"anything-but": "KeyError"}]})).unwrap();
        assert_eq!(p, Predicate::anything_but(Field::ErrorType, ["KeyError"]));
    }

    #[test]
    fn or_groups() {
        let p = parse_pattern(&json!({
            "$or": [
                {"source_topic": ["A"]},
                {"source_topic": ["B"]}
            ]
        }))
        .unwrap();
        assert_eq!(
            p,
            Predicate::Any(vec![
                Predicate::one_of(Field::SourceTopic, ["A"]),
                Predicate::one_of(Field::SourceTopic, ["B"]),
            ])
        );
    }

    #[test]
    fn rejects_unknown_field() {
        let err = parse_pattern(&json!({"payload": ["x"]})).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidPattern { ref path, .. } if path == "$.payload"));
    }

    #[test]
    fn rejects_bad_numeric() {
        assert!(parse_pattern(&json!({"retry_count": [{"numeric": ["<"]}]})).is_err());
        assert!(parse_pattern(&json!({"retry_count": [{"numeric": ["~", 3]}]})).is_err());
        assert!(parse_pattern(&json!({"retry_count": [{"numeric": ["<", "3"]}]})).is_err());
    }

    #[test]
    fn rejects_unsupported_operator() {
        let err = parse_pattern(&json!({"error_type": [{"prefix": "Key"}]})).unwrap_err();
        assert!(err.to_string().contains("unsupported operator"));
    }

    #[test]
    fn rejects_single_branch_or() {
        assert!(parse_pattern(&json!({"$or": [{"source_topic": ["A"]}]})).is_err());
    }

    #[test]
    fn parses_text() {
        let p = parse_pattern_str(r#"{"error_type": ["KeyError"]}"#).unwrap();
        assert_eq!(p, Predicate::one_of(Field::ErrorType, ["KeyError"]));
        assert!(matches!(parse_pattern_str("{"), Err(ConfigurationError::Parse(_))));
    }
}
