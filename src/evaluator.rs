//! Rule Evaluator (C10): given an event's eligible-combination bitmap
//! from the base-condition evaluator (C8), confirms each candidate
//! combination's full predicate set (including any dynamic predicates
//! the base-condition sets never cover) and resolves the matched rules,
//! applying the priority/code ordering and optional truncation from
//! [`crate::config::EvaluationConfig`].

use std::sync::Arc;

use crate::bitmap::CombinationBitmap;
use crate::cache::Cache;
use crate::config::EvaluationConfig;
use crate::eligibility::resolve_eligibility;
use crate::event::Event;
use crate::model::EngineModel;
use crate::pool::{BitmapGuard, CounterGuard, TouchedGuard};
use crate::rule::RuleIdentity;
use crate::trace::EventTrace;
use crate::value::Operator;

/// One matched rule, ready for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRule {
    pub code: String,
    pub priority: i32,
    pub description: Option<String>,
}

impl From<&RuleIdentity> for MatchedRule {
    fn from(identity: &RuleIdentity) -> Self {
        Self {
            code: identity.code.clone(),
            priority: identity.priority,
            description: identity.description.clone(),
        }
    }
}

/// The full outcome of evaluating one event against the current model.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub event_id: String,
    pub matched_rules: Vec<MatchedRule>,
    pub combinations_matched: u32,
    pub predicates_evaluated: u32,
    pub truncated: bool,
    pub nanos: u64,
}

/// Increments one combination's counter, recording it in `touched` the
/// first time it's bumped so match detection doesn't visit it twice.
fn bump(counters: &mut Vec<u32>, touched: &mut Vec<u32>, combo_id: u32) {
    if counters[combo_id as usize] == 0 {
        touched.push(combo_id);
    }
    counters[combo_id as usize] += 1;
}

/// Evaluates `event` against `model`, using `cache` for base-condition
/// resolution. This is the engine's single public hot-path entry point.
pub async fn evaluate_event(model: &EngineModel, cache: &Arc<dyn Cache>, config: &EvaluationConfig, event: &Event) -> MatchResult {
    let start = std::time::Instant::now();
    let mut trace = EventTrace::new(config.trace_level);

    let eligibility = resolve_eligibility(model, cache, event).await;
    let eligible = &eligibility.eligible_combinations;
    trace.record_combinations_considered(eligible.cardinality() as u32);

    let mut counters = CounterGuard::acquire(model.num_combinations() as usize);
    let mut touched = TouchedGuard::acquire();
    let mut scratch = BitmapGuard::acquire();
    let mut predicates_evaluated = eligibility.predicates_evaluated;

    // Ordered by ascending weight (cheapest/most-selective first); static
    // predicates are re-evaluated here too rather than skipped, so the
    // counter reaching `required[c]` reflects every predicate the
    // combination declares, not just its dynamic ones.
    for &pid in &model.sorted_predicates {
        let predicate = &model.predicates[pid as usize];
        let field_name = model.field_dict.decode(predicate.field_id).unwrap_or_default();
        let field_value = event.get(field_name);
        if field_value.is_none() && !matches!(predicate.op, Operator::IsNull | Operator::IsNotNull) {
            continue;
        }

        let result = predicate.evaluate(field_value);
        predicates_evaluated += 1;
        trace.record_predicate(pid, field_name, result);
        if !result {
            continue;
        }

        let posting = &model.predicate_to_combinations[pid as usize];
        if posting.cardinality() < u64::from(config.intersection_cardinality_threshold) {
            for combo_id in posting.iterate() {
                if eligible.contains(combo_id) {
                    bump(&mut counters, &mut touched, combo_id);
                }
            }
        } else {
            CombinationBitmap::and(posting, eligible, &mut scratch);
            for combo_id in scratch.iterate() {
                bump(&mut counters, &mut touched, combo_id);
            }
        }
    }

    let mut matched_rules: Vec<MatchedRule> = Vec::new();
    for &combo_id in touched.iter() {
        if counters[combo_id as usize] == model.combination_required_count[combo_id as usize] {
            for identity in &model.combination_rule_codes[combo_id as usize] {
                trace.record_matched_rule(&identity.code, identity.priority);
                matched_rules.push(MatchedRule::from(identity));
            }
        }
    }

    matched_rules.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.code.cmp(&b.code)));
    matched_rules.dedup_by(|a, b| a.code == b.code);

    let combinations_matched = touched.iter().filter(|&&c| counters[c as usize] == model.combination_required_count[c as usize]).count() as u32;

    let truncated = match config.truncate_matches {
        Some(limit) if matched_rules.len() > limit => {
            matched_rules.truncate(limit);
            true
        }
        _ => false,
    };

    trace.emit(&event.id);

    MatchResult {
        event_id: event.id.clone(),
        matched_rules,
        combinations_matched,
        predicates_evaluated,
        truncated,
        nanos: start.elapsed().as_nanos() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::build_cache;
    use crate::config::CacheConfig;
    use crate::event::encode_event;
    use crate::model::compile_model;

    #[tokio::test]
    async fn test_simple_equality_matches_scenario_s1() {
        let json = r#"[{"rule_code":"R1","conditions":[{"field":"status","operator":"EQUAL_TO","value":"ACTIVE"}]}]"#;
        let (model, _) = compile_model(json).unwrap();
        let cache = build_cache(&CacheConfig::default());
        let event = encode_event("e1", r#"{"status":"active"}"#).unwrap();

        let result = evaluate_event(&model, &cache, &EvaluationConfig::default(), &event).await;
        assert_eq!(result.matched_rules.len(), 1);
        assert_eq!(result.matched_rules[0].code, "R1");
    }

    #[tokio::test]
    async fn test_regex_dynamic_predicate_matches_scenario_s4() {
        let json = r#"[{"rule_code":"R1","conditions":[{"field":"email","operator":"REGEX","value":".*@company\\.com"}]}]"#;
        let (model, _) = compile_model(json).unwrap();
        let cache = build_cache(&CacheConfig::default());
        let event = encode_event("e1", r#"{"email":"u@company.com"}"#).unwrap();

        let result = evaluate_event(&model, &cache, &EvaluationConfig::default(), &event).await;
        assert_eq!(result.matched_rules.len(), 1);
    }

    #[tokio::test]
    async fn test_matches_ordered_by_priority_descending_then_code_ascending() {
        let json = r#"[
            {"rule_code":"B","priority":1,"conditions":[{"field":"status","operator":"EQUAL_TO","value":"ACTIVE"}]},
            {"rule_code":"A","priority":5,"conditions":[{"field":"status","operator":"EQUAL_TO","value":"ACTIVE"}]},
            {"rule_code":"C","priority":5,"conditions":[{"field":"tier","operator":"EQUAL_TO","value":"GOLD"}]}
        ]"#;
        let (model, _) = compile_model(json).unwrap();
        let cache = build_cache(&CacheConfig::default());
        let event = encode_event("e1", r#"{"status":"active","tier":"gold"}"#).unwrap();

        let result = evaluate_event(&model, &cache, &EvaluationConfig::default(), &event).await;
        let codes: Vec<&str> = result.matched_rules.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["A", "C", "B"]);
    }

    #[tokio::test]
    async fn test_truncation_respects_configured_limit() {
        let json = r#"[
            {"rule_code":"A","priority":1,"conditions":[{"field":"status","operator":"EQUAL_TO","value":"ACTIVE"}]},
            {"rule_code":"B","priority":2,"conditions":[{"field":"status","operator":"EQUAL_TO","value":"ACTIVE"}]}
        ]"#;
        let (model, _) = compile_model(json).unwrap();
        let cache = build_cache(&CacheConfig::default());
        let event = encode_event("e1", r#"{"status":"active"}"#).unwrap();
        let config = EvaluationConfig {
            truncate_matches: Some(1),
            ..EvaluationConfig::default()
        };

        let result = evaluate_event(&model, &cache, &config, &event).await;
        assert_eq!(result.matched_rules.len(), 1);
        assert!(result.truncated);
        assert_eq!(result.matched_rules[0].code, "B");
    }

    #[tokio::test]
    async fn test_no_match_yields_empty_rules() {
        let json = r#"[{"rule_code":"R1","conditions":[{"field":"status","operator":"EQUAL_TO","value":"ACTIVE"}]}]"#;
        let (model, _) = compile_model(json).unwrap();
        let cache = build_cache(&CacheConfig::default());
        let event = encode_event("e1", r#"{"status":"inactive"}"#).unwrap();

        let result = evaluate_event(&model, &cache, &EvaluationConfig::default(), &event).await;
        assert!(result.matched_rules.is_empty());
        assert!(!result.truncated);
    }
}
