mod common;

use common::test_helpers::{two_topic_config, TOPIC_ONE, TOPIC_TWO};
use redrive::{
    evaluate, EnrichmentTransformer, RecordMeta, RoutingConfig, RoutingDecision, RoutingEngine,
    RoutingRule, RuleAction, RuleTable,
};
use serde_json::{json, Map};

fn meta(source: &str, error_type: &str, retry_count: u64) -> RecordMeta {
    RecordMeta {
        source_topic: source.into(),
        error_type: error_type.into(),
        retry_count,
        response_payload: Map::new(),
    }
}

const ERROR_TYPES: [&str; 4] = ["", "TimeoutError", "ValueError", "RuntimeError"];

#[test]
fn excluded_error_types_never_route() {
    let engine = RoutingEngine::from_config(&two_topic_config()).unwrap();
    for source in [TOPIC_ONE, TOPIC_TWO] {
        for n in 1..=20 {
            assert_eq!(engine.decide(&meta(source, "KeyError", n)), RoutingDecision::NoMatch);
        }
    }
}

#[test]
fn below_budget_redrives_to_source() {
    let engine = RoutingEngine::from_config(&two_topic_config()).unwrap();
    for (source, max) in [(TOPIC_ONE, 3), (TOPIC_TWO, 5)] {
        for n in 1..max {
            for error_type in ERROR_TYPES {
                assert_eq!(
                    engine.decide(&meta(source, error_type, n)),
                    RoutingDecision::Redrive { destination: source.to_string() },
                    "{source} {error_type} {n}"
                );
            }
        }
    }
}

#[test]
fn at_or_over_budget_is_exhausted() {
    let engine = RoutingEngine::from_config(&two_topic_config()).unwrap();
    for (source, max) in [(TOPIC_ONE, 3), (TOPIC_TWO, 5)] {
        for n in max..max + 10 {
            for error_type in ERROR_TYPES {
                assert_eq!(engine.decide(&meta(source, error_type, n)), RoutingDecision::Exhausted);
            }
        }
    }
}

#[test]
fn decisions_are_repeatable() {
    let engine = RoutingEngine::from_config(&two_topic_config()).unwrap();
    for n in 1..8 {
        let m = meta(TOPIC_TWO, "TimeoutError", n);
        let first = engine.decide(&m);
        for _ in 0..10 {
            assert_eq!(engine.decide(&m), first);
        }
    }
}

#[test]
fn policy_versions_side_by_side() {
    let strict = RoutingEngine::from_config(&RoutingConfig::builder().source("A", 1).build().unwrap()).unwrap();
    let lenient = RoutingEngine::from_config(&RoutingConfig::builder().source("A", 10).build().unwrap()).unwrap();
    let m = meta("A", "TimeoutError", 2);
    assert_eq!(strict.decide(&m), RoutingDecision::Exhausted);
    assert!(lenient.decide(&m).is_redrive());
}

#[test]
fn scenario_first_failure_redrives() {
    let config = RoutingConfig::builder().source("A", 3).exclude("KeyError").build().unwrap();
    let engine = RoutingEngine::from_config(&config).unwrap();
    let records = EnrichmentTransformer::new()
        .transform(&[json!({
            "requestPayload": {"source_topic": "A", "payload": {"x": 1}},
            "responsePayload": {"errorType": "TimeoutError"}
        })])
        .unwrap();
    assert_eq!(engine.decide(&records[0].meta), RoutingDecision::Redrive { destination: "A".into() });
}

#[test]
fn scenario_over_budget_exhausts() {
    let config = RoutingConfig::builder().source("A", 3).exclude("KeyError").build().unwrap();
    let engine = RoutingEngine::from_config(&config).unwrap();
    let records = EnrichmentTransformer::new()
        .transform(&[json!({
            "requestPayload": {"source_topic": "A", "payload": {"x": 1, "retry_count": 4}},
            "responsePayload": {"errorType": "TimeoutError"}
        })])
        .unwrap();
    assert_eq!(records[0].meta.retry_count, 5);
    assert_eq!(engine.decide(&records[0].meta), RoutingDecision::Exhausted);
}

#[test]
fn scenario_excluded_error_dropped() {
    let config = RoutingConfig::builder().source("A", 3).exclude("KeyError").build().unwrap();
    let engine = RoutingEngine::from_config(&config).unwrap();
    for prior in [None, Some(0), Some(2), Some(40)] {
        let mut payload = json!({"x": 1});
        if let Some(k) = prior {
            payload["retry_count"] = json!(k);
        }
        let records = EnrichmentTransformer::new()
            .transform(&[json!({
                "requestPayload": {"source_topic": "A", "payload": payload},
                "responsePayload": {"errorType": "KeyError"}
            })])
            .unwrap();
        assert_eq!(engine.decide(&records[0].meta), RoutingDecision::NoMatch);
    }
}

/// Rules written in the event-bus pattern notation agree with the generated table.
#[test]
fn provider_patterns_match_generated_policy() {
    let config = two_topic_config();
    let rules = vec![
        RoutingRule::from_pattern(
            "redrive:one",
            &json!({"detail": {"meta": {
                "source_topic": [TOPIC_ONE],
                "retry_count": [{"numeric": ["<", 3]}],
                "error_type": [{"anything-but": ["KeyError"]}]
            }}}),
            RuleAction::RedriveTo(TOPIC_ONE.into()),
        )
        .unwrap(),
        RoutingRule::from_pattern(
            "redrive:two",
            &json!({"detail": {"meta": {
                "source_topic": [TOPIC_TWO],
                "retry_count": [{"numeric": ["<", 5]}],
                "error_type": [{"anything-but": ["KeyError"]}]
            }}}),
            RuleAction::RedriveTo(TOPIC_TWO.into()),
        )
        .unwrap(),
        RoutingRule::from_pattern(
            "exhausted",
            &json!({"detail": {"meta": {"$or": [
                {
                    "source_topic": [TOPIC_ONE],
                    "retry_count": [{"numeric": [">=", 3]}],
                    "error_type": [{"anything-but": ["KeyError"]}]
                },
                {
                    "source_topic": [TOPIC_TWO],
                    "retry_count": [{"numeric": [">=", 5]}],
                    "error_type": [{"anything-but": ["KeyError"]}]
                }
            ]}}}),
            RuleAction::SendToExhausted,
        )
        .unwrap(),
    ];
    let from_patterns = RuleTable::with_rules(rules, &config).unwrap();
    let generated = RuleTable::from_config(&config).unwrap();

    for source in [TOPIC_ONE, TOPIC_TWO, "arn:unknown"] {
        for error_type in ["", "TimeoutError", "KeyError"] {
            for n in 1..10 {
                let m = meta(source, error_type, n);
                assert_eq!(
                    evaluate(&m, from_patterns.rules()),
                    evaluate(&m, generated.rules()),
                    "{source} {error_type} {n}"
                );
            }
        }
    }
}

#[test]
fn config_loaded_from_file() {
    let dir = std::env::temp_dir().join(format!("redrive-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("routing.json");
    std::fs::write(
        &path,
        json!({"max_retry_counts": {"A": 2}, "excluded_error_types": ["KeyError"]}).to_string(),
    )
    .unwrap();

    let config = RoutingConfig::from_path(&path).unwrap();
    let engine = RoutingEngine::from_config(&config).unwrap();
    assert!(engine.decide(&meta("A", "", 1)).is_redrive());
    assert!(engine.decide(&meta("A", "", 2)).is_exhausted());
    std::fs::remove_dir_all(&dir).ok();
}
