//! Base-Condition Extractor (C7): groups physical combinations by the
//! canonical hash of their static (cacheable) predicate subset, producing
//! base-condition sets each owning a bitmap of combinations.

use std::collections::HashMap;

use crate::bitmap::CombinationBitmap;
use crate::hashing::{alternate_hash, canonical_hash};
use crate::predicate::Predicate;

/// A group of combinations that share the exact same static predicate
/// subset. §3 invariant: a combination belongs to exactly one base set.
#[derive(Debug, Clone)]
pub struct BaseConditionSet {
    pub set_id: u32,
    pub static_predicate_ids: Vec<u32>,
    pub hash: u64,
    pub affected_combinations: CombinationBitmap,
    pub avg_selectivity: f32,
    /// Distinct field ids referenced by `static_predicate_ids`, used by
    /// the evaluator (C8) to test applicability against an event.
    pub fields: Vec<u32>,
}

struct GroupAccum {
    static_predicate_ids: Vec<u32>,
    combinations: CombinationBitmap,
    selectivity_sum: f32,
    selectivity_count: u32,
}

/// Extracts base-condition sets from the combination registry.
/// `combination_predicates[c]` is combination `c`'s sorted predicate-id
/// vector; combinations with zero static predicates are not given a base
/// set (the evaluator treats them as eligible for all events).
pub fn extract_base_conditions(
    combination_predicates: &[Vec<u32>],
    predicates: &[Predicate],
) -> Vec<BaseConditionSet> {
    let mut groups: HashMap<Vec<u32>, GroupAccum> = HashMap::new();

    for (combo_id, predicate_ids) in combination_predicates.iter().enumerate() {
        let mut static_ids: Vec<u32> = predicate_ids
            .iter()
            .copied()
            .filter(|&pid| predicates[pid as usize].is_static())
            .collect();
        static_ids.sort_unstable();
        if static_ids.is_empty() {
            continue;
        }

        let accum = groups.entry(static_ids.clone()).or_insert_with(|| GroupAccum {
            static_predicate_ids: static_ids.clone(),
            combinations: CombinationBitmap::new(),
            selectivity_sum: 0.0,
            selectivity_count: 0,
        });
        accum.combinations.add(combo_id as u32);
        for &pid in &static_ids {
            accum.selectivity_sum += predicates[pid as usize].selectivity;
            accum.selectivity_count += 1;
        }
    }

    let mut used_hashes: HashMap<u64, Vec<u32>> = HashMap::new();
    let mut sets = Vec::with_capacity(groups.len());

    for (set_id, (_, accum)) in groups.into_iter().enumerate() {
        let canonical_bytes = encode_static_ids(&accum.static_predicate_ids, predicates);
        let mut hash = canonical_hash(&canonical_bytes);

        if let Some(existing) = used_hashes.get(&hash) {
            if existing != &accum.static_predicate_ids {
                tracing::warn!(
                    hash,
                    "base-condition hash collision detected; falling back to alternate hash"
                );
                hash = alternate_hash(&canonical_bytes);
            }
        }
        used_hashes.insert(hash, accum.static_predicate_ids.clone());

        let avg_selectivity = if accum.selectivity_count > 0 {
            accum.selectivity_sum / accum.selectivity_count as f32
        } else {
            0.5
        };

        let mut fields: Vec<u32> = accum
            .static_predicate_ids
            .iter()
            .map(|&pid| predicates[pid as usize].field_id)
            .collect();
        fields.sort_unstable();
        fields.dedup();

        sets.push(BaseConditionSet {
            set_id: set_id as u32,
            static_predicate_ids: accum.static_predicate_ids,
            hash,
            affected_combinations: accum.combinations,
            avg_selectivity,
            fields,
        });
    }

    tracing::info!(
        base_condition_sets = sets.len(),
        "extracted base-condition sets"
    );

    sets
}

fn encode_static_ids(static_ids: &[u32], predicates: &[Predicate]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for &pid in static_ids {
        bytes.extend_from_slice(&predicates[pid as usize].canonical_bytes());
    }
    bytes
}
