//! Rule source deserialization and validation: the JSON wire format from
//! §6, turned into validated [`LogicalRule`] records ready for the
//! factorizer (C3).

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::dictionary::normalize_field;
use crate::error::CompileError;
use crate::value::{Operator, Value};

/// One condition as it appears in the JSON rule source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionSource {
    pub field: String,
    pub operator: String,
    pub value: JsonValue,
}

/// One logical rule as it appears in the JSON rule source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSource {
    pub rule_code: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub conditions: Vec<ConditionSource>,
}

fn default_enabled() -> bool {
    true
}

/// A single validated condition: field name (already normalized) plus
/// operator and typed value, ready for predicate construction.
#[derive(Debug, Clone)]
pub struct Condition {
    pub field: String,
    pub op: Operator,
    pub value: Value,
}

/// The identifying metadata of one original rule definition: its code,
/// priority, and description. Carried through factorization and
/// combination expansion so `combination_rule_codes` (C6) can name every
/// original rule that maps to a physical combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleIdentity {
    pub code: String,
    pub priority: i32,
    pub description: Option<String>,
}

/// A validated logical rule, ready for the factorizer (C3). `identities`
/// holds one entry for an ordinary rule; the factorizer may merge several
/// rules that are logically identical except for one disjunctive field
/// into a single `LogicalRule` carrying all of their identities.
#[derive(Debug, Clone)]
pub struct LogicalRule {
    pub identities: Vec<RuleIdentity>,
    pub conditions: Vec<Condition>,
}

impl LogicalRule {
    pub fn primary_code(&self) -> &str {
        &self.identities[0].code
    }
}

/// Parses and validates a JSON rule source (an array of [`RuleSource`]
/// objects) into [`LogicalRule`]s. Disabled rules are skipped per §4.3.
/// Returns one [`CompileError`] per failing rule, aggregated.
pub fn parse_rule_source(json: &str) -> Result<(Vec<LogicalRule>, Vec<CompileError>), CompileError> {
    let sources: Vec<RuleSource> =
        serde_json::from_str(json).map_err(|e| CompileError::Parse(e.to_string()))?;

    let mut rules = Vec::new();
    let mut errors = Vec::new();
    let mut seen_codes = std::collections::HashSet::new();

    for source in sources {
        if !source.enabled {
            continue;
        }
        if !seen_codes.insert(source.rule_code.clone()) {
            errors.push(CompileError::DuplicateRuleCode {
                rule_code: source.rule_code.clone(),
            });
            continue;
        }
        match validate_rule(&source) {
            Ok(rule) => rules.push(rule),
            Err(err) => errors.push(err),
        }
    }

    Ok((rules, errors))
}

fn validate_rule(source: &RuleSource) -> Result<LogicalRule, CompileError> {
    if source.conditions.is_empty() {
        return Err(CompileError::EmptyConditions {
            rule_code: source.rule_code.clone(),
        });
    }

    let mut conditions = Vec::with_capacity(source.conditions.len());
    for raw in &source.conditions {
        conditions.push(validate_condition(&source.rule_code, raw)?);
    }

    Ok(LogicalRule {
        identities: vec![RuleIdentity {
            code: source.rule_code.clone(),
            priority: source.priority,
            description: source.description.clone(),
        }],
        conditions,
    })
}

fn validate_condition(rule_code: &str, raw: &ConditionSource) -> Result<Condition, CompileError> {
    let field = normalize_field(&raw.field);
    let op = Operator::from_name(&raw.operator).ok_or_else(|| CompileError::UnknownOperator {
        rule_code: rule_code.to_string(),
        operator: raw.operator.clone(),
    })?;

    let value = match op {
        Operator::IsAnyOf | Operator::IsNoneOf => {
            let items = raw.value.as_array().ok_or_else(|| CompileError::EmptyDisjunctionValues {
                rule_code: rule_code.to_string(),
                field: field.clone(),
            })?;
            if items.is_empty() {
                return Err(CompileError::EmptyDisjunctionValues {
                    rule_code: rule_code.to_string(),
                    field: field.clone(),
                });
            }
            json_array_to_value(items)
        }
        Operator::Between => {
            let items = raw
                .value
                .as_array()
                .filter(|a| a.len() == 2)
                .ok_or_else(|| CompileError::InvalidRange {
                    rule_code: rule_code.to_string(),
                    field: field.clone(),
                })?;
            let lo = items[0].as_f64().ok_or_else(|| CompileError::InvalidRange {
                rule_code: rule_code.to_string(),
                field: field.clone(),
            })?;
            let hi = items[1].as_f64().ok_or_else(|| CompileError::InvalidRange {
                rule_code: rule_code.to_string(),
                field: field.clone(),
            })?;
            Value::FloatRange(lo, hi)
        }
        Operator::Contains | Operator::StartsWith | Operator::EndsWith | Operator::Regex => {
            let s = raw.value.as_str().ok_or_else(|| CompileError::NonStringValue {
                rule_code: rule_code.to_string(),
                field: field.clone(),
                operator: op.name().to_string(),
            })?;
            if op == Operator::Regex {
                regex::Regex::new(&format!("\\A(?:{s})\\z")).map_err(|e| CompileError::InvalidRegex {
                    rule_code: rule_code.to_string(),
                    field: field.clone(),
                    message: e.to_string(),
                })?;
            }
            Value::String(s.to_string())
        }
        Operator::IsNull | Operator::IsNotNull => Value::Bool(true),
        _ => json_scalar_to_value(&raw.value),
    };

    Ok(Condition { field, op, value })
}

fn json_scalar_to_value(json: &JsonValue) -> Value {
    match json {
        JsonValue::String(s) => Value::String(s.to_uppercase()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        JsonValue::Bool(b) => Value::Bool(*b),
        _ => Value::String(json.to_string()),
    }
}

fn json_array_to_value(items: &[JsonValue]) -> Value {
    if items.iter().all(|v| v.is_number()) {
        Value::IntList(items.iter().filter_map(|v| v.as_i64()).collect())
    } else {
        Value::StringList(
            items
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_uppercase()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_equality_rule() {
        let json = r#"[{"rule_code":"R1","conditions":[{"field":"status","operator":"EQUAL_TO","value":"ACTIVE"}]}]"#;
        let (rules, errors) = parse_rule_source(json).unwrap();
        assert!(errors.is_empty());
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].primary_code(), "R1");
        assert_eq!(rules[0].conditions[0].field, "STATUS");
    }

    #[test]
    fn test_disabled_rule_is_skipped() {
        let json = r#"[{"rule_code":"R1","enabled":false,"conditions":[{"field":"x","operator":"EQUAL_TO","value":1}]}]"#;
        let (rules, errors) = parse_rule_source(json).unwrap();
        assert!(rules.is_empty());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_empty_conditions_rejected() {
        let json = r#"[{"rule_code":"R1","conditions":[]}]"#;
        let (rules, errors) = parse_rule_source(json).unwrap();
        assert!(rules.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], CompileError::EmptyConditions { .. }));
    }

    #[test]
    fn test_empty_is_any_of_rejected() {
        let json = r#"[{"rule_code":"R1","conditions":[{"field":"x","operator":"IS_ANY_OF","value":[]}]}]"#;
        let (rules, errors) = parse_rule_source(json).unwrap();
        assert!(rules.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], CompileError::EmptyDisjunctionValues { .. }));
    }

    #[test]
    fn test_invalid_between_range_rejected() {
        let json = r#"[{"rule_code":"R1","conditions":[{"field":"age","operator":"BETWEEN","value":[18]}]}]"#;
        let (rules, errors) = parse_rule_source(json).unwrap();
        assert!(rules.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], CompileError::InvalidRange { .. }));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let json = r#"[{"rule_code":"R1","conditions":[{"field":"email","operator":"REGEX","value":"(unclosed"}]}]"#;
        let (rules, errors) = parse_rule_source(json).unwrap();
        assert!(rules.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], CompileError::InvalidRegex { .. }));
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let json = r#"[{"rule_code":"R1","conditions":[{"field":"x","operator":"FUZZY_MATCH","value":1}]}]"#;
        let (rules, errors) = parse_rule_source(json).unwrap();
        assert!(rules.is_empty());
        assert!(matches!(errors[0], CompileError::UnknownOperator { .. }));
    }

    #[test]
    fn test_duplicate_rule_code_rejected() {
        let json = r#"[
            {"rule_code":"R1","conditions":[{"field":"x","operator":"EQUAL_TO","value":1}]},
            {"rule_code":"R1","conditions":[{"field":"y","operator":"EQUAL_TO","value":2}]}
        ]"#;
        let (rules, errors) = parse_rule_source(json).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], CompileError::DuplicateRuleCode { .. }));
    }
}
