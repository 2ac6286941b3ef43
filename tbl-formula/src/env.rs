//! Field values available to an evaluation

use crate::token::Part;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tbl_core::{FormulaError, Value};

/// Mapping from field id to the field's current value.
///
/// Composite fields are objects with `selection`, `extra` and `nodeId`
/// entries; reading such a field without a part yields its selection.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object of field values
    pub fn from_json(json: &JsonValue) -> Result<Self, FormulaError> {
        match json {
            JsonValue::Object(map) => Ok(map.iter().map(|(k, v)| (k.clone(), Value::from_json(v))).collect()),
            JsonValue::Null => Ok(Self::new()),
            other => Err(FormulaError::type_error("Object", json_type(other))),
        }
    }

    pub fn with(mut self, field_id: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field_id, value);
        self
    }

    pub fn insert(&mut self, field_id: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(field_id.into(), value.into());
    }

    pub fn get(&self, field_id: &str) -> Option<&Value> {
        self.values.get(field_id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of a field or one of its parts; missing fields yield the empty sentinel
    pub fn resolve(&self, field_id: &str, part: Option<Part>) -> Value {
        let Some(value) = self.values.get(field_id) else {
            return Value::Null;
        };
        match (value, part) {
            (Value::Object(map), Some(part)) => map.get(part.key()).cloned().unwrap_or(Value::Null),
            (Value::Object(map), None) => match map.get(Part::Selection.key()) {
                Some(selection) => selection.clone(),
                None => value.clone(),
            },
            (_, None | Some(Part::Selection)) => value.clone(),
            (_, Some(_)) => Value::Null,
        }
    }
}

impl FromIterator<(String, Value)> for Environment {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self { values: iter.into_iter().collect() }
    }
}

impl Extend<(String, Value)> for Environment {
    fn extend<I: IntoIterator<Item = (String, Value)>>(&mut self, iter: I) {
        self.values.extend(iter);
    }
}

fn json_type(json: &JsonValue) -> &'static str {
    match json {
        JsonValue::Null => "Null",
        JsonValue::Bool(_) => "Bool",
        JsonValue::Number(_) => "Number",
        JsonValue::String(_) => "Text",
        JsonValue::Array(_) => "List",
        JsonValue::Object(_) => "Object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_field_is_null() {
        assert!(Environment::new().resolve("nope", None).is_null());
    }

    #[test]
    fn test_composite_parts() {
        let env = Environment::from_json(&json!({
            "color": {"selection": "red", "extra": "dark", "nodeId": "n-12"}
        })).unwrap();
        assert_eq!(env.resolve("color", None).as_text(), Some("red"));
        assert_eq!(env.resolve("color", Some(Part::Extra)).as_text(), Some("dark"));
        assert_eq!(env.resolve("color", Some(Part::NodeId)).as_text(), Some("n-12"));
    }

    #[test]
    fn test_scalar_parts() {
        let env = Environment::new().with("x", 4);
        assert_eq!(env.resolve("x", Some(Part::Selection)).to_string(), "4");
        assert!(env.resolve("x", Some(Part::Extra)).is_null());
    }

    #[test]
    fn test_non_object_json_rejected() {
        assert!(Environment::from_json(&json!([1, 2])).is_err());
        assert!(Environment::from_json(&json!(null)).unwrap().is_empty());
    }
}
