//! Predicate Model (C2): a typed atomic condition `(field_id, operator,
//! value)` plus its precompiled form (regex, sorted sets, bounds) and its
//! selectivity-profiler-assigned weight.

use regex::Regex;

use crate::value::{Operator, Value};

/// The precompiled representation of a predicate's value, built once at
/// compile time so the hot path never re-parses or re-compiles anything.
#[derive(Debug, Clone)]
pub enum PreCompiled {
    None,
    Regex(Regex),
    SortedIntSet(Vec<i64>),
    SortedStringSet(Vec<String>),
    Bounds(f64, f64),
}

/// A single compiled predicate. Two predicates are logically equal iff
/// `(field_id, op, value)` are equal under [`Value`]'s canonical byte
/// encoding — `weight` and `selectivity` are profiler output, not identity.
#[derive(Debug, Clone)]
pub struct Predicate {
    pub field_id: u32,
    pub op: Operator,
    pub value: Value,
    pub precompiled: PreCompiled,
    pub weight: f32,
    pub selectivity: f32,
}

impl Predicate {
    pub fn new(field_id: u32, op: Operator, value: Value) -> Self {
        let precompiled = Self::precompile(op, &value);
        Self {
            field_id,
            op,
            value,
            precompiled,
            weight: 0.0,
            selectivity: 0.5,
        }
    }

    fn precompile(op: Operator, value: &Value) -> PreCompiled {
        match op {
            // Anchored so the engine itself resolves alternation as a full
            // match; post-hoc span-checking an unanchored `find()` gets the
            // wrong answer under leftmost-first alternation (e.g. `a|ab`
            // against `ab` would match `a` first and fail a span check even
            // though `ab` also matches).
            Operator::Regex => match value.as_str() {
                Some(pattern) => Regex::new(&format!("\\A(?:{pattern})\\z"))
                    .map(PreCompiled::Regex)
                    .unwrap_or(PreCompiled::None),
                None => PreCompiled::None,
            },
            Operator::Between => match value {
                Value::FloatRange(lo, hi) => PreCompiled::Bounds(*lo, *hi),
                _ => PreCompiled::None,
            },
            Operator::IsAnyOf | Operator::IsNoneOf => match value {
                Value::IntList(items) => {
                    let mut sorted = items.clone();
                    sorted.sort_unstable();
                    PreCompiled::SortedIntSet(sorted)
                }
                Value::StringList(items) => {
                    let mut sorted = items.clone();
                    sorted.sort_unstable();
                    PreCompiled::SortedStringSet(sorted)
                }
                _ => PreCompiled::None,
            },
            _ => PreCompiled::None,
        }
    }

    /// The canonical identity bytes for this predicate: `(field_id,
    /// op_ordinal, type-specific value hash)`. Used by the base-condition
    /// extractor's (C7) canonical hash and by combination deduplication.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16);
        out.extend_from_slice(&self.field_id.to_le_bytes());
        out.push(self.op.tag());
        out.extend_from_slice(&self.value.canonical_bytes());
        out
    }

    pub fn is_static(&self) -> bool {
        self.op.is_static()
    }

    pub fn is_dynamic(&self) -> bool {
        self.op.is_dynamic()
    }

    /// Evaluates this predicate against an event's raw value for its
    /// field. `event_value: None` means the field was absent from the
    /// event. Follows the bit-exact operator semantics of the spec's
    /// external interfaces section. Never panics: a regex panic is caught
    /// by the caller (C10), not here, since `Regex::is_match` does not
    /// panic in practice but user patterns may exhaust resources; callers
    /// evaluating in an untrusted context should wrap this call.
    pub fn evaluate(&self, event_value: Option<&Value>) -> bool {
        match self.op {
            Operator::IsNull => event_value.is_none(),
            Operator::IsNotNull => event_value.is_some(),
            _ => match event_value {
                None => match self.op {
                    Operator::IsNoneOf => true,
                    Operator::IsAnyOf => false,
                    _ => false,
                },
                Some(v) => self.evaluate_present(v),
            },
        }
    }

    fn evaluate_present(&self, event_value: &Value) -> bool {
        match self.op {
            Operator::EqualTo => values_equal(&self.value, event_value),
            Operator::NotEqualTo => !values_equal(&self.value, event_value),
            Operator::IsAnyOf => self.set_membership(event_value),
            Operator::IsNoneOf => !self.set_membership(event_value),
            Operator::GreaterThan => numeric_cmp(event_value, &self.value, |a, b| a > b),
            Operator::GreaterThanOrEqual => numeric_cmp(event_value, &self.value, |a, b| a >= b),
            Operator::LessThan => numeric_cmp(event_value, &self.value, |a, b| a < b),
            Operator::LessThanOrEqual => numeric_cmp(event_value, &self.value, |a, b| a <= b),
            Operator::Between => match (&self.precompiled, event_value.as_f64()) {
                (PreCompiled::Bounds(lo, hi), Some(x)) => x >= *lo && x <= *hi,
                _ => false,
            },
            Operator::Contains => match (self.value.as_str(), event_value.as_str()) {
                (Some(pattern), Some(subject)) => subject.contains(pattern),
                _ => false,
            },
            Operator::StartsWith => match (self.value.as_str(), event_value.as_str()) {
                (Some(pattern), Some(subject)) => subject.starts_with(pattern),
                _ => false,
            },
            Operator::EndsWith => match (self.value.as_str(), event_value.as_str()) {
                (Some(pattern), Some(subject)) => subject.ends_with(pattern),
                _ => false,
            },
            Operator::Regex => match (&self.precompiled, event_value.as_str()) {
                (PreCompiled::Regex(re), Some(subject)) => re.is_match(subject),
                _ => false,
            },
            Operator::IsNull | Operator::IsNotNull => unreachable!("handled in evaluate()"),
        }
    }

    fn set_membership(&self, event_value: &Value) -> bool {
        match &self.precompiled {
            PreCompiled::SortedIntSet(set) => {
                if let Some(x) = event_value.as_f64() {
                    set.binary_search_by(|candidate| {
                        (*candidate as f64).partial_cmp(&x).unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .is_ok()
                } else {
                    false
                }
            }
            PreCompiled::SortedStringSet(set) => match event_value.as_str() {
                Some(s) => {
                    let upper = s.to_uppercase();
                    set.binary_search_by(|candidate| candidate.as_str().cmp(upper.as_str())).is_ok()
                }
                None => false,
            },
            _ => false,
        }
    }
}

/// `EQUAL_TO`/`NOT_EQUAL_TO` compare strings case-insensitively: `rule.rs`
/// uppercases predicate string values at parse time, but the event side
/// keeps original case (case-sensitive operators like `REGEX` need it), so
/// this folds case here instead.
fn values_equal(predicate_value: &Value, event_value: &Value) -> bool {
    match (predicate_value, event_value) {
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::String(a), Value::String(b)) => a.eq_ignore_ascii_case(b),
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
            _ => a == b,
        },
    }
}

fn numeric_cmp(event_value: &Value, predicate_value: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    match (event_value.as_f64(), predicate_value.as_f64()) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}
