//! Combination Expander (C4): expands each logical rule into the Cartesian
//! product of its `IS_ANY_OF` clauses. Canonicalization and deduplication
//! of the resulting physical combinations happen in the model builder
//! (C6), which owns the global predicate registry.

use crate::rule::{Condition, LogicalRule};
use crate::value::{Operator, Value};

/// Expands one logical rule into its physical combinations: each is a
/// list of conditions with every `IS_ANY_OF` reduced to a single
/// `EQUAL_TO`. A rule with no `IS_ANY_OF` clauses expands to exactly one
/// combination (itself).
pub fn expand_rule(rule: &LogicalRule) -> Vec<Vec<Condition>> {
    let fixed: Vec<Condition> = rule
        .conditions
        .iter()
        .filter(|c| c.op != Operator::IsAnyOf)
        .cloned()
        .collect();

    let disjunctions: Vec<&Condition> = rule
        .conditions
        .iter()
        .filter(|c| c.op == Operator::IsAnyOf)
        .collect();

    if disjunctions.is_empty() {
        return vec![fixed];
    }

    let value_lists: Vec<Vec<Condition>> = disjunctions
        .iter()
        .map(|c| disjunction_branches(c))
        .collect();

    cartesian_product(&value_lists)
        .into_iter()
        .map(|mut branch_choice| {
            let mut combination = fixed.clone();
            combination.append(&mut branch_choice);
            combination
        })
        .collect()
}

/// Turns one `IS_ANY_OF(field, V)` condition into its per-value
/// `EQUAL_TO` branches. A single-value disjunction reduces to one
/// `EQUAL_TO` with no expansion, per §4.3.
fn disjunction_branches(condition: &Condition) -> Vec<Condition> {
    match &condition.value {
        Value::IntList(items) => items
            .iter()
            .map(|v| Condition {
                field: condition.field.clone(),
                op: Operator::EqualTo,
                value: Value::Int(*v),
            })
            .collect(),
        Value::StringList(items) => items
            .iter()
            .map(|v| Condition {
                field: condition.field.clone(),
                op: Operator::EqualTo,
                value: Value::String(v.clone()),
            })
            .collect(),
        other => vec![Condition {
            field: condition.field.clone(),
            op: Operator::EqualTo,
            value: other.clone(),
        }],
    }
}

fn cartesian_product(lists: &[Vec<Condition>]) -> Vec<Vec<Condition>> {
    let mut result: Vec<Vec<Condition>> = vec![Vec::new()];
    for list in lists {
        let mut next = Vec::with_capacity(result.len() * list.len().max(1));
        for prefix in &result {
            for item in list {
                let mut combination = prefix.clone();
                combination.push(item.clone());
                next.push(combination);
            }
        }
        result = next;
    }
    result
}
