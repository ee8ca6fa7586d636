//! The `Operator` and `Value` sum types shared by the predicate model,
//! event encoder, and evaluator.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A condition operator, as named in a rule source. `#[repr(u8)]` with
/// explicit discriminants keeps the ordinal stable across process restarts
/// (the fingerprint and canonical predicate hash depend on it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Operator {
    EqualTo = 0x01,
    NotEqualTo = 0x02,
    IsAnyOf = 0x03,
    IsNoneOf = 0x04,
    GreaterThan = 0x05,
    GreaterThanOrEqual = 0x06,
    LessThan = 0x07,
    LessThanOrEqual = 0x08,
    Between = 0x09,
    Contains = 0x0a,
    StartsWith = 0x0b,
    EndsWith = 0x0c,
    Regex = 0x0d,
    IsNull = 0x0e,
    IsNotNull = 0x0f,
}

impl Operator {
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Static operators are eligible for the base-condition cache (C7/C8);
    /// dynamic operators (string matching, regex) are evaluated per event.
    pub const fn is_static(self) -> bool {
        !matches!(
            self,
            Operator::Contains | Operator::StartsWith | Operator::EndsWith | Operator::Regex
        )
    }

    pub const fn is_dynamic(self) -> bool {
        !self.is_static()
    }

    pub const fn is_numeric_comparison(self) -> bool {
        matches!(
            self,
            Operator::GreaterThan
                | Operator::GreaterThanOrEqual
                | Operator::LessThan
                | Operator::LessThanOrEqual
                | Operator::Between
        )
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "EQUAL_TO" => Operator::EqualTo,
            "NOT_EQUAL_TO" => Operator::NotEqualTo,
            "IS_ANY_OF" => Operator::IsAnyOf,
            "IS_NONE_OF" => Operator::IsNoneOf,
            "GREATER_THAN" => Operator::GreaterThan,
            "GREATER_THAN_OR_EQUAL" => Operator::GreaterThanOrEqual,
            "LESS_THAN" => Operator::LessThan,
            "LESS_THAN_OR_EQUAL" => Operator::LessThanOrEqual,
            "BETWEEN" => Operator::Between,
            "CONTAINS" => Operator::Contains,
            "STARTS_WITH" => Operator::StartsWith,
            "ENDS_WITH" => Operator::EndsWith,
            "REGEX" => Operator::Regex,
            "IS_NULL" => Operator::IsNull,
            "IS_NOT_NULL" => Operator::IsNotNull,
            _ => return None,
        })
    }

    pub const fn name(self) -> &'static str {
        match self {
            Operator::EqualTo => "EQUAL_TO",
            Operator::NotEqualTo => "NOT_EQUAL_TO",
            Operator::IsAnyOf => "IS_ANY_OF",
            Operator::IsNoneOf => "IS_NONE_OF",
            Operator::GreaterThan => "GREATER_THAN",
            Operator::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
            Operator::LessThan => "LESS_THAN",
            Operator::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
            Operator::Between => "BETWEEN",
            Operator::Contains => "CONTAINS",
            Operator::StartsWith => "STARTS_WITH",
            Operator::EndsWith => "ENDS_WITH",
            Operator::Regex => "REGEX",
            Operator::IsNull => "IS_NULL",
            Operator::IsNotNull => "IS_NOT_NULL",
        }
    }
}

/// A compiled predicate value. Dictionary-encoded where that's meaningful
/// (strings), raw otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    IntId(u32),
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    IntList(Vec<i64>),
    StringList(Vec<String>),
    FloatRange(f64, f64),
}

impl Value {
    /// Coerces to `f64` for numeric comparison operators. Non-numeric
    /// values coerce to `None`, which the caller treats as "predicate is
    /// false" rather than an error.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::IntId(id) => Some(*id as f64),
            Value::String(s) => s.parse::<f64>().ok(),
            Value::Bool(_) | Value::IntList(_) | Value::StringList(_) | Value::FloatRange(_, _) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// A stable, type-tagged byte encoding used by the canonical predicate
    /// hash (C7) and the event fingerprint (C8). Must be identical across
    /// processes for the same logical value.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Value::IntId(id) => {
                out.push(0);
                out.extend_from_slice(&id.to_le_bytes());
            }
            Value::Int(i) => {
                out.push(1);
                out.extend_from_slice(&i.to_le_bytes());
            }
            Value::Float(f) => {
                out.push(2);
                out.extend_from_slice(&f.to_bits().to_le_bytes());
            }
            Value::Bool(b) => {
                out.push(3);
                out.push(u8::from(*b));
            }
            Value::String(s) => {
                out.push(4);
                out.extend_from_slice(s.as_bytes());
            }
            Value::IntList(items) => {
                out.push(5);
                for i in items {
                    out.extend_from_slice(&i.to_le_bytes());
                }
            }
            Value::StringList(items) => {
                out.push(7);
                for s in items {
                    out.extend_from_slice(s.as_bytes());
                    out.push(0);
                }
            }
            Value::FloatRange(lo, hi) => {
                out.push(6);
                out.extend_from_slice(&lo.to_bits().to_le_bytes());
                out.extend_from_slice(&hi.to_bits().to_le_bytes());
            }
        }
        out
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_bytes() == other.canonical_bytes()
    }
}
impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.canonical_bytes().cmp(&other.canonical_bytes()))
    }
}
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical_bytes().cmp(&other.canonical_bytes())
    }
}
