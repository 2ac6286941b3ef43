//! Helper functions for argument extraction
//!
//! Field values arrive loosely typed (numbers typed as text, multi-selects
//! as lists, missing fields as `Null`), so extraction is lenient where a
//! form would be and strict where guessing would hide a mistake.

use tbl_core::{Number, Value, FormulaError};
use chrono::NaiveDateTime;

/// Extract a number, coercing numeric text and treating the empty sentinel as 0
pub fn require_number(value: &Value, func: &str, arg: &str) -> Result<Number, FormulaError> {
    match value {
        Value::Error(e) => Err(e.clone()),
        Value::Text(_) | Value::Null | Value::Bool(_) | Value::Number(_) => value
            .coerce_number()
            .map_err(|_| FormulaError::arg_type(func, arg, "Number", value.type_name())),
        other => Err(FormulaError::arg_type(func, arg, "Number", other.type_name())),
    }
}

/// Extract integer from Value
pub fn extract_int(value: &Value, func: &str, arg: &str) -> Result<i64, FormulaError> {
    let n = require_number(value, func, arg)?;
    n.to_i64().ok_or_else(|| {
        FormulaError::domain_error(format!("{}(): {} must be a valid integer", func, arg))
    })
}

/// Extract optional integer with default
pub fn extract_int_or(args: &[Value], index: usize, default: i64, func: &str, arg: &str) -> Result<i64, FormulaError> {
    match args.get(index) {
        Some(Value::Null) | None => Ok(default),
        Some(v) => extract_int(v, func, arg),
    }
}

/// Text form of any scalar; the empty sentinel reads as ""
pub fn text_of(value: &Value, func: &str, arg: &str) -> Result<String, FormulaError> {
    match value {
        Value::Error(e) => Err(e.clone()),
        Value::Object(_) => Err(FormulaError::arg_type(func, arg, "Text", "Object")),
        other => Ok(other.to_string()),
    }
}

/// Extract a date from a date value or ISO text
pub fn require_datetime(value: &Value, func: &str, arg: &str) -> Result<NaiveDateTime, FormulaError> {
    match value {
        Value::Error(e) => Err(e.clone()),
        Value::DateTime(dt) => Ok(*dt),
        Value::Text(_) => value.coerce_datetime(),
        other => Err(FormulaError::arg_type(func, arg, "Date", other.type_name())),
    }
}

/// Flatten list arguments one level: `SUM([1, 2], 3)` sees 1, 2, 3
pub fn flatten(args: &[Value]) -> Result<Vec<Value>, FormulaError> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Value::Error(e) => return Err(e.clone()),
            Value::List(items) => {
                for item in items {
                    if let Value::Error(e) = item {
                        return Err(e.clone());
                    }
                    out.push(item.clone());
                }
            }
            other => out.push(other.clone()),
        }
    }
    Ok(out)
}

/// Numbers from flattened arguments, skipping empty entries
pub fn flatten_numbers(args: &[Value], func: &str) -> Result<Vec<Number>, FormulaError> {
    flatten(args)?
        .iter()
        .filter(|v| !v.is_empty())
        .map(|v| require_number(v, func, "values"))
        .collect()
}

/// Normalize index to handle negative values (counted from the end)
pub fn normalize_index(idx: i64, len: usize) -> usize {
    if idx < 0 {
        let positive = idx.unsigned_abs() as usize;
        len.saturating_sub(positive)
    } else {
        (idx as usize).min(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_number_coerces_text() {
        let n = require_number(&Value::from("12.5"), "f", "x").unwrap();
        assert_eq!(n.to_string(), "12.5");
        assert_eq!(require_number(&Value::Null, "f", "x").unwrap().to_i64(), Some(0));
    }

    #[test]
    fn test_require_number_rejects_words() {
        let err = require_number(&Value::from("abc"), "ROUND", "valeur").unwrap_err();
        assert_eq!(err.code, tbl_core::codes::ARG_TYPE);
    }

    #[test]
    fn test_extract_int_or_default() {
        assert_eq!(extract_int_or(&[], 1, 7, "f", "x").unwrap(), 7);
        assert_eq!(extract_int_or(&[Value::from(1), Value::from(3)], 1, 7, "f", "x").unwrap(), 3);
        assert!(extract_int_or(&[Value::from(1), Value::from("2.5")], 1, 7, "f", "x").is_err());
    }

    #[test]
    fn test_flatten_numbers() {
        let args = vec![
            Value::List(vec![Value::from(1), Value::from("2"), Value::Null]),
            Value::from(3),
        ];
        let nums = flatten_numbers(&args, "SUM").unwrap();
        assert_eq!(nums.len(), 3);
    }

    #[test]
    fn test_normalize_index() {
        assert_eq!(normalize_index(2, 10), 2);
        assert_eq!(normalize_index(15, 10), 10);
        assert_eq!(normalize_index(-1, 10), 9);
        assert_eq!(normalize_index(-15, 10), 0);
    }
}
