//! Base-Condition Evaluator (C8): selects the base-condition sets
//! *applicable* to an event (every field they reference is present),
//! evaluates their static predicates behind a single combined cache
//! fingerprint, and resolves the bitmap of combinations whose static
//! prefix is satisfied. Dynamic predicates are never part of a
//! base-condition set and are left for the rule evaluator (C10) to check
//! directly; combinations with no static predicates at all bypass this
//! module entirely via `model.always_eligible`.

use std::sync::Arc;
use std::time::Instant;

use crate::base_condition::BaseConditionSet;
use crate::bitmap::CombinationBitmap;
use crate::cache::{BuildFuture, Cache};
use crate::event::Event;
use crate::hashing::fingerprint128;
use crate::model::EngineModel;

/// The outcome of resolving one event's eligible combinations across all
/// applicable base-condition sets.
#[derive(Debug, Clone)]
pub struct EligibilityResult {
    pub eligible_combinations: CombinationBitmap,
    pub predicates_evaluated: u32,
    pub from_cache: bool,
    pub nanos: u64,
}

/// A base set is applicable to an event iff every field it references is
/// present — a set referencing a field the event never sends isn't
/// "failing", it's simply irrelevant to this event's shape.
fn is_applicable(model: &EngineModel, base_set: &BaseConditionSet, event: &Event) -> bool {
    base_set
        .fields
        .iter()
        .all(|&field_id| model.field_dict.decode(field_id).is_some_and(|name| event.get(name).is_some()))
}

/// Resolves the eligible-combination bitmap for `event` against `model`,
/// using `cache` to short-circuit the whole applicable set behind one
/// fingerprint when an identical prior event was already resolved.
pub async fn resolve_eligibility(model: &EngineModel, cache: &Arc<dyn Cache>, event: &Event) -> EligibilityResult {
    let start = Instant::now();

    let mut applicable: Vec<&BaseConditionSet> = model.base_sets.iter().filter(|set| is_applicable(model, set, event)).collect();
    applicable.sort_by(|a, b| a.avg_selectivity.partial_cmp(&b.avg_selectivity).unwrap_or(std::cmp::Ordering::Equal));

    if applicable.is_empty() {
        let mut eligible = CombinationBitmap::full_range(model.num_combinations());
        eligible.or_into(&model.always_eligible);
        return EligibilityResult {
            eligible_combinations: eligible,
            predicates_evaluated: 0,
            from_cache: false,
            nanos: start.elapsed().as_nanos() as u64,
        };
    }

    let fingerprint = combined_fingerprint(model, &applicable, event);
    let was_cached = cache.get(fingerprint).await.is_some();

    let predicates_evaluated: u32 = applicable.iter().map(|set| set.static_predicate_ids.len() as u32).sum();

    let owned_sets: Vec<BaseConditionSet> = applicable.iter().map(|&set| set.clone()).collect();
    let predicates_by_set: Vec<Vec<(String, crate::predicate::Predicate)>> = owned_sets
        .iter()
        .map(|set| {
            set.static_predicate_ids
                .iter()
                .filter_map(|&pid| {
                    let predicate = model.predicates[pid as usize].clone();
                    model.field_dict.decode(predicate.field_id).map(|name| (name.to_string(), predicate))
                })
                .collect()
        })
        .collect();
    let event_snapshot = event.clone();

    let build: Box<dyn FnOnce() -> BuildFuture + Send> = Box::new(move || -> BuildFuture {
        Box::pin(async move {
            let mut resolved = CombinationBitmap::new();
            for (set, predicates) in owned_sets.iter().zip(predicates_by_set.iter()) {
                let all_satisfied = predicates
                    .iter()
                    .all(|(field_name, predicate)| predicate.evaluate(event_snapshot.get(field_name)));
                if all_satisfied {
                    resolved.or_into(&set.affected_combinations);
                }
            }
            Ok(resolved)
        })
    });

    let mut eligible = cache.get_with(fingerprint, build).await.unwrap_or_else(|_| CombinationBitmap::new());
    eligible.or_into(&model.always_eligible);

    EligibilityResult {
        eligible_combinations: eligible,
        predicates_evaluated,
        from_cache: was_cached,
        nanos: start.elapsed().as_nanos() as u64,
    }
}

/// A single fingerprint spanning every applicable base set: their set ids
/// and hashes (so the key changes if the applicable set changes) plus the
/// event's raw value for every field any of them references (so two
/// events agreeing on those fields hit the same cache entry).
fn combined_fingerprint(model: &EngineModel, applicable: &[&BaseConditionSet], event: &Event) -> u128 {
    let mut bytes = Vec::new();

    let mut set_ids: Vec<u32> = applicable.iter().map(|set| set.set_id).collect();
    set_ids.sort_unstable();
    for set_id in &set_ids {
        bytes.extend_from_slice(&set_id.to_le_bytes());
    }

    let mut fields: Vec<u32> = applicable.iter().flat_map(|set| set.fields.iter().copied()).collect();
    fields.sort_unstable();
    fields.dedup();

    for field_id in fields {
        bytes.extend_from_slice(&field_id.to_le_bytes());
        match model.field_dict.decode(field_id).and_then(|name| event.get(name)) {
            Some(v) => bytes.extend_from_slice(&v.canonical_bytes()),
            None => bytes.push(0xff),
        }
    }

    fingerprint128(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::build_cache;
    use crate::config::CacheConfig;
    use crate::event::encode_event;
    use crate::model::compile_model;

    #[tokio::test]
    async fn test_eligible_combinations_resolved_for_matching_event() {
        let json = r#"[{"rule_code":"R1","conditions":[{"field":"status","operator":"EQUAL_TO","value":"ACTIVE"}]}]"#;
        let (model, _) = compile_model(json).unwrap();
        let cache = build_cache(&CacheConfig::default());
        let event = encode_event("e1", r#"{"status":"active"}"#).unwrap();

        let result = resolve_eligibility(&model, &cache, &event).await;
        assert_eq!(result.eligible_combinations.cardinality(), 1);
    }

    #[tokio::test]
    async fn test_non_matching_event_yields_no_eligible_combinations() {
        let json = r#"[{"rule_code":"R1","conditions":[{"field":"status","operator":"EQUAL_TO","value":"ACTIVE"}]}]"#;
        let (model, _) = compile_model(json).unwrap();
        let cache = build_cache(&CacheConfig::default());
        let event = encode_event("e1", r#"{"status":"inactive"}"#).unwrap();

        let result = resolve_eligibility(&model, &cache, &event).await;
        assert_eq!(result.eligible_combinations.cardinality(), 0);
    }

    #[tokio::test]
    async fn test_all_dynamic_combination_is_eligible_without_a_base_set() {
        let json = r#"[{"rule_code":"R1","conditions":[{"field":"email","operator":"REGEX","value":".*@x\\.com"}]}]"#;
        let (model, _) = compile_model(json).unwrap();
        assert!(model.base_sets.is_empty());
        let cache = build_cache(&CacheConfig::default());
        let event = encode_event("e1", r#"{"email":"u@x.com"}"#).unwrap();

        let result = resolve_eligibility(&model, &cache, &event).await;
        assert_eq!(result.eligible_combinations.cardinality(), 1);
    }

    #[tokio::test]
    async fn test_event_missing_every_referenced_field_yields_full_range() {
        let json = r#"[{"rule_code":"R1","conditions":[{"field":"status","operator":"EQUAL_TO","value":"ACTIVE"}]}]"#;
        let (model, _) = compile_model(json).unwrap();
        let cache = build_cache(&CacheConfig::default());
        let event = encode_event("e1", r#"{"unrelated":"x"}"#).unwrap();

        let result = resolve_eligibility(&model, &cache, &event).await;
        assert!(!result.from_cache);
        assert_eq!(result.eligible_combinations.cardinality(), model.num_combinations() as u64);
    }

    #[tokio::test]
    async fn test_identical_second_event_hits_cache() {
        let json = r#"[{"rule_code":"R1","conditions":[{"field":"status","operator":"EQUAL_TO","value":"ACTIVE"}]}]"#;
        let (model, _) = compile_model(json).unwrap();
        let cache = build_cache(&CacheConfig::default());
        let event = encode_event("e1", r#"{"status":"active"}"#).unwrap();

        let first = resolve_eligibility(&model, &cache, &event).await;
        assert!(!first.from_cache);
        let second = resolve_eligibility(&model, &cache, &event).await;
        assert!(second.from_cache);
    }
}
