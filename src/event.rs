//! Event Encoder (C13): flattens an arbitrary JSON event into a flat
//! `FIELD_NAME -> Value` map with dotted, upper-snake keys, matching the
//! same normalization the rule compiler applies to condition fields.
//! String values keep their original case — case-insensitive operators
//! (`EQUAL_TO`, `IS_ANY_OF`, `IS_NONE_OF`) fold case at comparison time in
//! `predicate.rs` rather than here, since a field's case sensitivity
//! depends on which operator checks it.

use std::collections::HashMap;

use serde_json::Value as JsonValue;

use crate::dictionary::normalize_field;
use crate::value::Value;

/// A flattened, normalized event ready for predicate evaluation.
#[derive(Debug, Clone, Default)]
pub struct Event {
    pub id: String,
    fields: HashMap<String, Value>,
}

impl Event {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Parses and flattens a raw JSON event object. Nested objects are
/// flattened with `.` joining parent and child keys before normalization
/// (so `{"user": {"id": 7}}` becomes field `USER.ID`); arrays of scalars
/// become `IntList`/`StringList` values, arrays of objects are skipped (no
/// defined flattening for heterogeneous nested arrays).
pub fn encode_event(id: impl Into<String>, raw: &str) -> Result<Event, serde_json::Error> {
    let parsed: JsonValue = serde_json::from_str(raw)?;
    let mut fields = HashMap::new();
    flatten_into(&parsed, "", &mut fields);
    Ok(Event { id: id.into(), fields })
}

fn flatten_into(value: &JsonValue, prefix: &str, out: &mut HashMap<String, Value>) {
    match value {
        JsonValue::Object(map) => {
            for (key, nested) in map {
                let joined = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(nested, &joined, out);
            }
        }
        JsonValue::Array(items) => {
            if let Some(v) = array_to_value(items) {
                out.insert(normalize_field(prefix), v);
            }
        }
        JsonValue::String(s) => {
            out.insert(normalize_field(prefix), Value::String(s.clone()));
        }
        JsonValue::Number(n) => {
            let v = n.as_i64().map(Value::Int).unwrap_or_else(|| Value::Float(n.as_f64().unwrap_or(0.0)));
            out.insert(normalize_field(prefix), v);
        }
        JsonValue::Bool(b) => {
            out.insert(normalize_field(prefix), Value::Bool(*b));
        }
        JsonValue::Null => {}
    }
}

fn array_to_value(items: &[JsonValue]) -> Option<Value> {
    if items.is_empty() {
        return Some(Value::IntList(Vec::new()));
    }
    if items.iter().all(JsonValue::is_number) {
        Some(Value::IntList(items.iter().filter_map(JsonValue::as_i64).collect()))
    } else if items.iter().all(JsonValue::is_string) {
        Some(Value::StringList(
            items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        ))
    } else {
        None
    }
}
