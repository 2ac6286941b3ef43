//! Runtime values of the formula engine
//!
//! Values can be numbers, text, booleans, dates, lists (multi-select
//! fields), objects (composite fields), the empty sentinel `Null`, or
//! errors. Errors propagate through computations.

use crate::{Number, FormulaError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::collections::HashMap;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Runtime value
#[derive(Debug, Clone, Default)]
pub enum Value {
    Number(Number),
    Text(String),
    Bool(bool),
    DateTime(NaiveDateTime),
    Object(HashMap<String, Value>),
    List(Vec<Value>),
    /// Empty sentinel: a missing field, an ignored branch, a broken reference
    #[default]
    Null,
    Error(FormulaError),
}

impl Value {
    // ========== Safe Accessors (never panic) ==========

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null, blank text, empty list or empty object
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.trim().is_empty(),
            Value::List(l) => l.is_empty(),
            Value::Object(o) => o.is_empty(),
            _ => false,
        }
    }

    /// Type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "Number",
            Value::Text(_) => "Text",
            Value::Bool(_) => "Bool",
            Value::DateTime(_) => "DateTime",
            Value::Object(_) => "Object",
            Value::List(_) => "List",
            Value::Null => "Null",
            Value::Error(_) => "Error",
        }
    }

    // ========== Member Access ==========

    /// Get field from object, element from list by numeric key.
    /// Missing keys yield the empty sentinel.
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Object(map) => map.get(key).cloned().unwrap_or(Value::Null),
            Value::List(_) => match Number::parse_numeric(key) {
                Some(n) => self.index(&n),
                None => Value::Error(FormulaError::type_error("list position", "Text")),
            },
            Value::Error(e) => Value::Error(e.clone()),
            _ => Value::Error(FormulaError::type_error("Object", self.type_name())),
        }
    }

    /// Zero-based list element; out of range yields the empty sentinel
    pub fn index(&self, position: &Number) -> Value {
        match self {
            Value::List(items) => match position.to_i64() {
                Some(i) if i >= 0 => items.get(i as usize).cloned().unwrap_or(Value::Null),
                Some(_) => Value::Null,
                None => Value::Error(FormulaError::type_error("integer position", "Number")),
            },
            Value::Object(_) => self.get(&position.to_string()),
            Value::Error(e) => Value::Error(e.clone()),
            _ => Value::Error(FormulaError::type_error("List", self.type_name())),
        }
    }

    // ========== Type Coercion ==========

    /// Numeric view used by arithmetic.
    ///
    /// The empty sentinel and blank text count as 0, booleans as 1/0,
    /// numeric and percent text is parsed. Anything else is a coercion error.
    pub fn coerce_number(&self) -> Result<Number, FormulaError> {
        match self {
            Value::Number(n) => Ok(n.clone()),
            Value::Null => Ok(Number::from_i64(0)),
            Value::Bool(b) => Ok(Number::from_i64(if *b { 1 } else { 0 })),
            Value::Text(s) if s.trim().is_empty() => Ok(Number::from_i64(0)),
            Value::Text(s) => Number::parse_numeric(s)
                .ok_or_else(|| FormulaError::type_coercion(s, "number")),
            Value::Error(e) => Err(e.clone()),
            other => Err(FormulaError::type_error("Number", other.type_name())),
        }
    }

    /// Number or numeric text, without the lenient defaults of `coerce_number`
    pub fn numeric(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(n.clone()),
            Value::Text(s) => Number::parse_numeric(s),
            _ => None,
        }
    }

    /// Truthiness used by logical operators and conditions
    pub fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => !n.is_zero(),
            Value::Text(s) => {
                let t = s.trim();
                !(t.is_empty() || t.eq_ignore_ascii_case("false") || t == "0")
            }
            Value::DateTime(_) => true,
            Value::List(l) => !l.is_empty(),
            Value::Object(o) => !o.is_empty(),
            Value::Null | Value::Error(_) => false,
        }
    }

    /// Convert to datetime (dates, ISO text)
    pub fn coerce_datetime(&self) -> Result<NaiveDateTime, FormulaError> {
        match self {
            Value::DateTime(dt) => Ok(*dt),
            Value::Text(s) => parse_datetime(s)
                .ok_or_else(|| FormulaError::invalid_date(s.clone())),
            Value::Error(e) => Err(e.clone()),
            other => Err(FormulaError::type_error("DateTime", other.type_name())),
        }
    }

    // ========== Comparison ==========

    /// `=` semantics: numeric when both sides are numeric, otherwise by text
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a == b,
            _ => match (self, other) {
                (Value::DateTime(a), Value::DateTime(b)) => a == b,
                _ => self.to_string() == other.to_string(),
            },
        }
    }

    /// `===` semantics: same type and same value
    pub fn strictly_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.strictly_equals(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| v.strictly_equals(w)))
            }
            _ => false,
        }
    }

    /// Ordering for `<`/`>`: numeric (empty counts as 0), dates, then text
    pub fn compare(&self, other: &Value) -> Ordering {
        let as_ordinal = |v: &Value| match v {
            Value::Null => Some(Number::from_i64(0)),
            Value::Bool(b) => Some(Number::from_i64(if *b { 1 } else { 0 })),
            _ => v.numeric(),
        };
        match (self, other) {
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            _ => match (as_ordinal(self), as_ordinal(other)) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => self.to_string().cmp(&other.to_string()),
            },
        }
    }

    // ========== JSON Conversion ==========

    /// Build a value from loosely-typed JSON input. Text is kept verbatim,
    /// numeric coercion happens at use sites.
    pub fn from_json(json: &JsonValue) -> Value {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Number(Number::from_i64(i)),
                None => Value::Number(Number::from_f64(n.as_f64().unwrap_or(0.0))),
            },
            JsonValue::String(s) => Value::Text(s.clone()),
            JsonValue::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            JsonValue::Object(map) => Value::Object(
                map.iter().map(|(k, v)| (k.clone(), Value::from_json(v))).collect()
            ),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

/// Parse ISO dates: `2024-03-01`, `2024-03-01T08:30:00`, `2024-03-01 08:30:00`
/// or RFC 3339 with an offset (converted to UTC).
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, DATE_FORMAT) {
        return Some(d.and_time(NaiveTime::MIN));
    }
    for fmt in [DATETIME_FORMAT, "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc())
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::DateTime(dt) => {
                if dt.time() == NaiveTime::MIN {
                    write!(f, "{}", dt.format(DATE_FORMAT))
                } else {
                    write!(f, "{}", dt.format(DATETIME_FORMAT))
                }
            }
            Value::Object(obj) => {
                let mut keys: Vec<&String> = obj.keys().collect();
                keys.sort();
                let parts: Vec<String> = keys.iter()
                    .map(|k| format!("{}: {}", k, obj[*k]))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::List(items) => {
                let contents: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", contents.join(", "))
            }
            Value::Null => Ok(()),
            Value::Error(e) => write!(f, "#ERROR: {}", e.code),
        }
    }
}

/// Values leave the engine as plain JSON.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Number(n) => n.serialize(serializer),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::DateTime(_) => serializer.serialize_str(&self.to_string()),
            Value::Object(map) => serializer.collect_map(map),
            Value::List(items) => serializer.collect_seq(items),
            Value::Null => serializer.serialize_unit(),
            Value::Error(e) => e.serialize(serializer),
        }
    }
}

// From implementations for convenience
impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Number::from_i64(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<FormulaError> for Value {
    fn from(e: FormulaError) -> Self {
        Value::Error(e)
    }
}
