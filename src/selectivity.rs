//! Selectivity Profiler (C5): assigns each predicate a selectivity and a
//! relative cost, producing the weight used to order predicate
//! evaluation (cheaper, more selective predicates first).

use std::collections::{HashMap, HashSet};

use crate::predicate::Predicate;
use crate::value::Operator;

fn op_factor(op: Operator) -> f32 {
    match op {
        Operator::EqualTo | Operator::NotEqualTo => 1.0,
        Operator::IsAnyOf | Operator::IsNoneOf => 1.3,
        Operator::GreaterThan | Operator::GreaterThanOrEqual | Operator::LessThan | Operator::LessThanOrEqual => 2.0,
        Operator::Between => 1.5,
        Operator::Contains => 1.2,
        Operator::Regex => 1.1,
        Operator::StartsWith | Operator::EndsWith => 1.2,
        Operator::IsNull | Operator::IsNotNull => 1.0,
    }
}

fn op_cost(op: Operator) -> f32 {
    match op {
        Operator::EqualTo | Operator::NotEqualTo => 1.0,
        Operator::Contains | Operator::StartsWith | Operator::EndsWith => 3.0,
        Operator::Regex => 10.0,
        Operator::IsNull | Operator::IsNotNull => 1.0,
        Operator::IsAnyOf | Operator::IsNoneOf => 1.5,
        _ => 1.5,
    }
}

/// Tracks distinct static values observed per field while combinations
/// are being assembled, then assigns selectivity/weight to every
/// predicate in the registry once all combinations are known.
#[derive(Debug, Default)]
pub struct SelectivityProfiler {
    distinct_values_by_field: HashMap<u32, HashSet<Vec<u8>>>,
}

impl SelectivityProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one static predicate's value as an observation toward its
    /// field's distinct-value count.
    pub fn observe(&mut self, field_id: u32, op: Operator, value_bytes: Vec<u8>) {
        if op.is_static() {
            self.distinct_values_by_field.entry(field_id).or_default().insert(value_bytes);
        }
    }

    fn base_selectivity(&self, field_id: u32) -> f32 {
        let distinct = self
            .distinct_values_by_field
            .get(&field_id)
            .map(HashSet::len)
            .unwrap_or(1);
        1.0 / (distinct.max(2) as f32)
    }

    /// Assigns `selectivity` and `weight` on every predicate in place.
    pub fn profile(&self, predicates: &mut [Predicate]) {
        for predicate in predicates.iter_mut() {
            let base = self.base_selectivity(predicate.field_id);
            let selectivity = (base * op_factor(predicate.op)).clamp(0.01, 0.99);
            let cost = op_cost(predicate.op);
            predicate.selectivity = selectivity;
            predicate.weight = (1.0 - selectivity) * cost;
        }
    }

    /// Returns predicate ids sorted ascending by weight (cheap, selective
    /// predicates first), per §4.9's evaluation order.
    pub fn sorted_by_weight(predicates: &[Predicate]) -> Vec<u32> {
        let mut ids: Vec<u32> = (0..predicates.len() as u32).collect();
        ids.sort_by(|&a, &b| {
            predicates[a as usize]
                .weight
                .partial_cmp(&predicates[b as usize].weight)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ids
    }
}
