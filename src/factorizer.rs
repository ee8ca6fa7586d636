//! Factorizer (C3): merges rules that share every non-`IS_ANY_OF`
//! condition and a single disjunctive field with an identical value set,
//! rewriting them to share one disjunction before combination expansion.
//! Semantics-preserving by construction: a merged group only collapses
//! when its rules are otherwise indistinguishable.

use std::collections::HashMap;

use crate::value::{Operator, Value};
use crate::rule::{Condition, LogicalRule};

/// A hashable, order-independent canonical key for a rule's non-disjunctive
/// (fixed) conditions.
fn fixed_key(rule: &LogicalRule) -> Vec<u8> {
    let mut fixed: Vec<&Condition> = rule
        .conditions
        .iter()
        .filter(|c| c.op != Operator::IsAnyOf)
        .collect();
    fixed.sort_by(|a, b| (a.field.as_str(), a.op.tag()).cmp(&(b.field.as_str(), b.op.tag())));
    let mut key = Vec::new();
    for c in fixed {
        key.extend_from_slice(c.field.as_bytes());
        key.push(0);
        key.push(c.op.tag());
        key.extend_from_slice(&c.value.canonical_bytes());
        key.push(0xff);
    }
    key
}

/// Returns the single `IS_ANY_OF` condition in `rule`, if exactly one
/// exists; `None` if zero or more than one (factorization only targets
/// the single-disjunctive-field case described in the spec).
fn sole_disjunction(rule: &LogicalRule) -> Option<&Condition> {
    let mut found = None;
    for c in &rule.conditions {
        if c.op == Operator::IsAnyOf {
            if found.is_some() {
                return None;
            }
            found = Some(c);
        }
    }
    found
}

/// A value-set identity that sorts whole elements, not raw bytes — sorting
/// concatenated bytes directly would let two different multisets of
/// multi-byte elements (e.g. `["AB"]` vs `["BA"]`) collapse to the same key.
fn value_set_key(value: &Value) -> Vec<u8> {
    let mut elements: Vec<Vec<u8>> = match value {
        Value::IntList(items) => items.iter().map(|i| i.to_le_bytes().to_vec()).collect(),
        Value::StringList(items) => items
            .iter()
            .map(|s| {
                let mut b = s.as_bytes().to_vec();
                b.push(0);
                b
            })
            .collect(),
        other => vec![other.canonical_bytes()],
    };
    elements.sort_unstable();

    let mut key = Vec::new();
    for element in elements {
        key.extend_from_slice(&(element.len() as u32).to_le_bytes());
        key.extend_from_slice(&element);
    }
    key
}

/// Runs the factorization pass. Groups that don't qualify are passed
/// through unchanged (as single-rule groups).
pub fn factorize(rules: Vec<LogicalRule>) -> Vec<LogicalRule> {
    let mut groups: HashMap<Vec<u8>, Vec<LogicalRule>> = HashMap::new();
    for rule in rules {
        groups.entry(fixed_key(&rule)).or_default().push(rule);
    }

    let mut output = Vec::with_capacity(groups.len());
    for (_, group) in groups {
        if group.len() < 2 {
            output.extend(group);
            continue;
        }
        match try_merge_group(&group) {
            Some(merged) => output.push(merged),
            None => output.extend(group),
        }
    }
    output
}

/// Attempts to merge a group of rules sharing fixed conditions into one,
/// iff every rule carries exactly one `IS_ANY_OF` clause on the same
/// field with an identical value set.
fn try_merge_group(group: &[LogicalRule]) -> Option<LogicalRule> {
    let first_disjunction = sole_disjunction(&group[0])?;
    let field = first_disjunction.field.clone();
    let value_key = value_set_key(&first_disjunction.value);

    for rule in &group[1..] {
        let disjunction = sole_disjunction(rule)?;
        if disjunction.field != field {
            return None;
        }
        if value_set_key(&disjunction.value) != value_key {
            return None;
        }
    }

    let mut identities = Vec::new();
    for rule in group {
        identities.extend(rule.identities.iter().cloned());
    }

    Some(LogicalRule {
        identities,
        conditions: group[0].conditions.clone(),
    })
}
