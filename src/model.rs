//! Engine Model (C6): the immutable compiled artifact assembled from a
//! validated rule source. Owned exclusively by the Model Manager (C11)
//! once built; evaluators hold shared read-only access.

use std::collections::HashMap;
use std::time::Instant;

use crate::base_condition::{extract_base_conditions, BaseConditionSet};
use crate::bitmap::CombinationBitmap;
use crate::combination::expand_rule;
use crate::dictionary::Dictionary;
use crate::error::CompileError;
use crate::factorizer::factorize;
use crate::predicate::Predicate;
use crate::rule::{parse_rule_source, Condition, RuleIdentity};
use crate::selectivity::SelectivityProfiler;
use crate::value::Value;

/// Build-time statistics recorded by the compiler, per §4.5.
#[derive(Debug, Clone, Default)]
pub struct ModelStats {
    pub logical_rules: usize,
    pub total_expanded_combinations: usize,
    pub unique_combinations: usize,
    pub deduplication_rate: f64,
    pub num_predicates: usize,
    pub avg_selectivity: f32,
    pub compile_nanos: u64,
}

/// The immutable compiled artifact. All vectors are frozen on return from
/// [`compile_model`]; nothing mutates afterward.
#[derive(Debug)]
pub struct EngineModel {
    pub field_dict: Dictionary,
    pub value_dict: Dictionary,
    pub predicates: Vec<Predicate>,
    pub combination_predicates: Vec<Vec<u32>>,
    pub combination_required_count: Vec<u32>,
    pub combination_rule_codes: Vec<Vec<RuleIdentity>>,
    pub field_to_predicates: HashMap<u32, Vec<u32>>,
    pub predicate_to_combinations: Vec<CombinationBitmap>,
    pub sorted_predicates: Vec<u32>,
    pub base_sets: Vec<BaseConditionSet>,
    /// Combinations with zero static predicates: no base-condition set
    /// covers them, so they're eligible for every event unconditionally
    /// and left entirely to the rule evaluator (C10) to confirm.
    pub always_eligible: CombinationBitmap,
    pub stats: ModelStats,
}

impl EngineModel {
    pub fn num_combinations(&self) -> u32 {
        self.combination_predicates.len() as u32
    }
}

/// Compiles a JSON rule source into an [`EngineModel`]. Any validation
/// error across any rule is fatal to this compile attempt — the caller
/// (C11) retains the previous model and surfaces the aggregated errors.
pub fn compile_model(rule_source_json: &str) -> Result<(EngineModel, Vec<crate::error::ValidationWarning>), Vec<CompileError>> {
    let start = Instant::now();

    let (valid_rules, mut errors) = match parse_rule_source(rule_source_json) {
        Ok(parsed) => parsed,
        Err(e) => return Err(vec![e]),
    };

    if !errors.is_empty() {
        return Err(std::mem::take(&mut errors));
    }

    let logical_rules_count = valid_rules.len();
    let factored = factorize(valid_rules);

    let mut field_dict = Dictionary::new();
    let mut value_dict = Dictionary::new();
    let mut predicate_registry: HashMap<Vec<u8>, u32> = HashMap::new();
    let mut predicates: Vec<Predicate> = Vec::new();
    let mut profiler = SelectivityProfiler::new();

    let mut combination_index: HashMap<Vec<u32>, u32> = HashMap::new();
    let mut combination_predicates: Vec<Vec<u32>> = Vec::new();
    let mut combination_rule_codes: Vec<Vec<RuleIdentity>> = Vec::new();

    let mut total_expanded = 0usize;

    for rule in &factored {
        for combo_conditions in expand_rule(rule) {
            total_expanded += 1;
            let mut predicate_ids: Vec<u32> = combo_conditions
                .iter()
                .map(|condition| {
                    intern_predicate(
                        condition,
                        &mut field_dict,
                        &mut value_dict,
                        &mut predicate_registry,
                        &mut predicates,
                        &mut profiler,
                    )
                })
                .collect();
            predicate_ids.sort_unstable();
            predicate_ids.dedup();

            match combination_index.get(&predicate_ids) {
                Some(&existing_id) => {
                    combination_rule_codes[existing_id as usize].extend(rule.identities.iter().cloned());
                }
                None => {
                    let new_id = combination_predicates.len() as u32;
                    combination_index.insert(predicate_ids.clone(), new_id);
                    combination_predicates.push(predicate_ids);
                    combination_rule_codes.push(rule.identities.clone());
                }
            }
        }
    }

    profiler.profile(&mut predicates);
    let sorted_predicates = SelectivityProfiler::sorted_by_weight(&predicates);

    field_dict.freeze();
    value_dict.freeze();

    let combination_required_count: Vec<u32> = combination_predicates.iter().map(|p| p.len() as u32).collect();

    let mut field_to_predicates: HashMap<u32, Vec<u32>> = HashMap::new();
    for (pid, predicate) in predicates.iter().enumerate() {
        field_to_predicates.entry(predicate.field_id).or_default().push(pid as u32);
    }

    let mut predicate_to_combinations: Vec<CombinationBitmap> = vec![CombinationBitmap::new(); predicates.len()];
    for (combo_id, predicate_ids) in combination_predicates.iter().enumerate() {
        for &pid in predicate_ids {
            predicate_to_combinations[pid as usize].add(combo_id as u32);
        }
    }

    let base_sets = extract_base_conditions(&combination_predicates, &predicates);

    let mut always_eligible = CombinationBitmap::new();
    for (combo_id, predicate_ids) in combination_predicates.iter().enumerate() {
        let has_static = predicate_ids.iter().any(|&pid| predicates[pid as usize].is_static());
        if !has_static {
            always_eligible.add(combo_id as u32);
        }
    }

    let unique_combinations = combination_predicates.len();
    let deduplication_rate = if total_expanded > 0 {
        1.0 - (unique_combinations as f64 / total_expanded as f64)
    } else {
        0.0
    };
    let avg_selectivity = if predicates.is_empty() {
        0.0
    } else {
        predicates.iter().map(|p| p.selectivity).sum::<f32>() / predicates.len() as f32
    };

    let stats = ModelStats {
        logical_rules: logical_rules_count,
        total_expanded_combinations: total_expanded,
        unique_combinations,
        deduplication_rate,
        num_predicates: predicates.len(),
        avg_selectivity,
        compile_nanos: start.elapsed().as_nanos() as u64,
    };

    tracing::info!(
        logical_rules = stats.logical_rules,
        unique_combinations = stats.unique_combinations,
        num_predicates = stats.num_predicates,
        dedup_rate = stats.deduplication_rate,
        compile_nanos = stats.compile_nanos,
        "compiled engine model"
    );

    let model = EngineModel {
        field_dict,
        value_dict,
        predicates,
        combination_predicates,
        combination_required_count,
        combination_rule_codes,
        field_to_predicates,
        predicate_to_combinations,
        sorted_predicates,
        base_sets,
        always_eligible,
        stats,
    };

    Ok((model, Vec::new()))
}

fn intern_predicate(
    condition: &Condition,
    field_dict: &mut Dictionary,
    value_dict: &mut Dictionary,
    registry: &mut HashMap<Vec<u8>, u32>,
    predicates: &mut Vec<Predicate>,
    profiler: &mut SelectivityProfiler,
) -> u32 {
    let field_id = field_dict.encode(&condition.field);
    if let Value::String(s) = &condition.value {
        value_dict.encode(s);
    }

    let predicate = Predicate::new(field_id, condition.op, condition.value.clone());
    let key = predicate.canonical_bytes();

    if let Some(&existing) = registry.get(&key) {
        return existing;
    }

    let value_bytes = predicate.value.canonical_bytes();
    if predicate.is_static() {
        profiler.observe(field_id, predicate.op, value_bytes);
    }

    let new_id = predicates.len() as u32;
    registry.insert(key, new_id);
    predicates.push(predicate);
    new_id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_equality_compiles_to_one_combination() {
        let json = r#"[{"rule_code":"R1","conditions":[{"field":"status","operator":"EQUAL_TO","value":"ACTIVE"}]}]"#;
        let (model, _warnings) = compile_model(json).unwrap();
        assert_eq!(model.stats.unique_combinations, 1);
        assert_eq!(model.stats.logical_rules, 1);
    }

    #[test]
    fn test_is_any_of_expansion_and_dedup_matches_scenario_s2() {
        let json = r#"[
            {"rule_code":"R1","conditions":[
                {"field":"status","operator":"EQUAL_TO","value":"ACTIVE"},
                {"field":"country","operator":"IS_ANY_OF","value":["US","CA"]}
            ]},
            {"rule_code":"R2","conditions":[
                {"field":"status","operator":"EQUAL_TO","value":"ACTIVE"},
                {"field":"country","operator":"IS_ANY_OF","value":["US","UK"]}
            ]}
        ]"#;
        let (model, _warnings) = compile_model(json).unwrap();
        assert_eq!(model.stats.unique_combinations, 3);
    }

    #[test]
    fn test_compile_error_is_fatal_and_aggregated() {
        let json = r#"[
            {"rule_code":"R1","conditions":[]},
            {"rule_code":"R2","conditions":[{"field":"x","operator":"BOGUS","value":1}]}
        ]"#;
        let errors = compile_model(json).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_predicate_registry_deduplicates_identical_predicates() {
        let json = r#"[
            {"rule_code":"R1","conditions":[{"field":"status","operator":"EQUAL_TO","value":"ACTIVE"}]},
            {"rule_code":"R2","conditions":[{"field":"status","operator":"EQUAL_TO","value":"ACTIVE"}]}
        ]"#;
        let (model, _) = compile_model(json).unwrap();
        assert_eq!(model.stats.num_predicates, 1);
        assert_eq!(model.stats.unique_combinations, 1);
        assert_eq!(model.combination_rule_codes[0].len(), 2);
    }

    #[test]
    fn test_combination_with_only_dynamic_predicates_is_always_eligible() {
        let json = r#"[{"rule_code":"R1","conditions":[{"field":"email","operator":"REGEX","value":".*@x\\.com"}]}]"#;
        let (model, _) = compile_model(json).unwrap();
        assert_eq!(model.stats.unique_combinations, 1);
        assert_eq!(model.always_eligible.cardinality(), 1);
        assert!(model.base_sets.is_empty());
    }

    #[test]
    fn test_deduplication_is_total_no_two_combinations_share_canonical_vector() {
        let json = r#"[
            {"rule_code":"R1","conditions":[{"field":"a","operator":"IS_ANY_OF","value":[1,2,3]}]},
            {"rule_code":"R2","conditions":[{"field":"a","operator":"IS_ANY_OF","value":[2,3,4]}]}
        ]"#;
        let (model, _) = compile_model(json).unwrap();
        let mut seen = std::collections::HashSet::new();
        for combo in &model.combination_predicates {
            assert!(seen.insert(combo.clone()), "duplicate canonical combination vector");
        }
    }
}
