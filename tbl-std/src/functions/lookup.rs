//! Lookup and aggregation over lists: LOOKUP, INDEX, FILTER, COUNT, IN, DISTINCT
//!
//! Lists come from multi-value fields. Positions are zero-based, matching
//! the `[]` operator.

use tbl_plugin::prelude::*;
use crate::helpers::{extract_int, flatten, normalize_index, text_of};

pub struct Lookup;
pub struct Index;
pub struct Filter;
pub struct Count;
pub struct In;
pub struct Distinct;

static LOOKUP_ARGS: [ArgMeta; 2] = [
    ArgMeta::required("table", "Object|List", "Object keyed by code, or list of [key, value] pairs / {key, value} objects"),
    ArgMeta::required("clé", "Any", "Key to look up"),
];
static LOOKUP_EXAMPLES: [&str; 1] = ["LOOKUP({grille}, {niveau}) → rate for the selected level"];
static LOOKUP_RELATED: [&str; 2] = ["INDEX", "IN"];

static INDEX_ARGS: [ArgMeta; 2] = [
    ArgMeta::required("liste", "List", "Source list"),
    ArgMeta::required("position", "Number", "Zero-based position (negative counts from the end)"),
];
static INDEX_EXAMPLES: [&str; 1] = ["INDEX({options}, 0) → first option"];
static INDEX_RELATED: [&str; 1] = ["LOOKUP"];

static FILTER_ARGS: [ArgMeta; 2] = [
    ArgMeta::required("liste", "List", "Source list"),
    ArgMeta::required("condition", "Any", "List of booleans (mask) or value to keep"),
];
static FILTER_EXAMPLES: [&str; 2] = ["FILTER({tags}, \"urgent\")", "FILTER({montants}, {retenus})"];
static FILTER_RELATED: [&str; 2] = ["DISTINCT", "COUNT"];

static LIST_ARGS: [ArgMeta; 1] = [ArgMeta::required("liste", "List", "Values or lists")];
static COUNT_EXAMPLES: [&str; 1] = ["COUNT({tags}) → number of selected tags"];
static COUNT_RELATED: [&str; 2] = ["LENGTH", "SUM"];

static IN_ARGS: [ArgMeta; 2] = [
    ArgMeta::required("valeur", "Any", "Value to search for"),
    ArgMeta::required("liste", "List", "Candidates (lists are flattened)"),
];
static IN_EXAMPLES: [&str; 1] = ["IN({pays}, \"FR\", \"BE\") → true for France or Belgium"];
static IN_RELATED: [&str; 1] = ["LOOKUP"];

static DISTINCT_EXAMPLES: [&str; 1] = ["DISTINCT(1, 2, 2, \"2\") → [1, 2]"];
static DISTINCT_RELATED: [&str; 1] = ["COUNT"];

impl FunctionPlugin for Lookup {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "LOOKUP",
            description: "Find the value stored under a key in a reference table",
            usage: "LOOKUP(table, clé)",
            args: &LOOKUP_ARGS,
            returns: "Any",
            examples: &LOOKUP_EXAMPLES,
            category: "lookup",
            source: None,
            related: &LOOKUP_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        if args.len() != 2 {
            return Value::Error(FormulaError::arg_count("LOOKUP", 2, args.len()));
        }
        let key = &args[1];
        if let Value::Error(e) = key {
            return Value::Error(e.clone());
        }
        match &args[0] {
            Value::Error(e) => Value::Error(e.clone()),
            Value::Null => Value::Null,
            Value::Object(_) => match text_of(key, "LOOKUP", "clé") {
                Ok(k) => args[0].get(&k),
                Err(e) => Value::Error(e),
            },
            Value::List(rows) => {
                for row in rows {
                    let (k, v) = match row {
                        Value::List(pair) if pair.len() >= 2 => (pair[0].clone(), pair[1].clone()),
                        Value::Object(map) => match (map.get("key"), map.get("value")) {
                            (Some(k), Some(v)) => (k.clone(), v.clone()),
                            _ => continue,
                        },
                        _ => continue,
                    };
                    if k.loosely_equals(key) {
                        return v;
                    }
                }
                Value::Null
            }
            other => Value::Error(FormulaError::arg_type("LOOKUP", "table", "Object or List", other.type_name())),
        }
    }
}

impl FunctionPlugin for Index {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "INDEX",
            description: "Element at a position in a list",
            usage: "INDEX(liste, position)",
            args: &INDEX_ARGS,
            returns: "Any",
            examples: &INDEX_EXAMPLES,
            category: "lookup",
            source: None,
            related: &INDEX_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        if args.len() != 2 {
            return Value::Error(FormulaError::arg_count("INDEX", 2, args.len()));
        }
        let position = match extract_int(&args[1], "INDEX", "position") {
            Ok(p) => p,
            Err(e) => return Value::Error(e),
        };
        match &args[0] {
            Value::List(items) => {
                let i = if position < 0 { normalize_index(position, items.len()) } else { position as usize };
                items.get(i).cloned().unwrap_or(Value::Null)
            }
            Value::Null => Value::Null,
            Value::Error(e) => Value::Error(e.clone()),
            other => Value::Error(FormulaError::arg_type("INDEX", "liste", "List", other.type_name())),
        }
    }
}

impl FunctionPlugin for Filter {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "FILTER",
            description: "Keep the list items selected by a mask, or equal to a value",
            usage: "FILTER(liste, condition)",
            args: &FILTER_ARGS,
            returns: "List",
            examples: &FILTER_EXAMPLES,
            category: "lookup",
            source: None,
            related: &FILTER_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        if args.len() != 2 {
            return Value::Error(FormulaError::arg_count("FILTER", 2, args.len()));
        }
        let items = match &args[0] {
            Value::List(items) => items,
            Value::Null => return Value::List(vec![]),
            Value::Error(e) => return Value::Error(e.clone()),
            other => return Value::Error(FormulaError::arg_type("FILTER", "liste", "List", other.type_name())),
        };
        match &args[1] {
            Value::Error(e) => Value::Error(e.clone()),
            Value::List(mask) => {
                if mask.len() != items.len() {
                    return Value::Error(FormulaError::domain_error(format!(
                        "FILTER(): mask has {} entries for {} items", mask.len(), items.len()
                    )));
                }
                Value::List(items.iter()
                    .zip(mask)
                    .filter(|(_, keep)| keep.truthy())
                    .map(|(item, _)| item.clone())
                    .collect())
            }
            wanted => Value::List(items.iter()
                .filter(|item| item.loosely_equals(wanted))
                .cloned()
                .collect()),
        }
    }
}

impl FunctionPlugin for Count {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "COUNT",
            description: "Number of non-empty items, lists are flattened",
            usage: "COUNT(liste)",
            args: &LIST_ARGS,
            returns: "Number",
            examples: &COUNT_EXAMPLES,
            category: "lookup",
            source: None,
            related: &COUNT_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        match flatten(args) {
            Ok(items) => Value::Number(Number::from_i64(
                items.iter().filter(|v| !v.is_empty()).count() as i64
            )),
            Err(e) => Value::Error(e),
        }
    }
}

impl FunctionPlugin for In {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "IN",
            description: "True when the value equals one of the candidates",
            usage: "IN(valeur, liste)",
            args: &IN_ARGS,
            returns: "Bool",
            examples: &IN_EXAMPLES,
            category: "lookup",
            source: None,
            related: &IN_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        if args.len() < 2 {
            return Value::Error(FormulaError::arg_count("IN", 2, args.len()));
        }
        let needle = &args[0];
        if let Value::Error(e) = needle {
            return Value::Error(e.clone());
        }
        match flatten(&args[1..]) {
            Ok(candidates) => Value::Bool(candidates.iter().any(|c| c.loosely_equals(needle))),
            Err(e) => Value::Error(e),
        }
    }
}

impl FunctionPlugin for Distinct {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "DISTINCT",
            description: "Unique values in first-seen order",
            usage: "DISTINCT(liste)",
            args: &LIST_ARGS,
            returns: "List",
            examples: &DISTINCT_EXAMPLES,
            category: "lookup",
            source: None,
            related: &DISTINCT_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        let items = match flatten(args) {
            Ok(items) => items,
            Err(e) => return Value::Error(e),
        };
        let mut unique: Vec<Value> = Vec::new();
        for item in items {
            if !unique.iter().any(|u| u.loosely_equals(&item)) {
                unique.push(item);
            }
        }
        Value::List(unique)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval_ctx() -> EvalContext {
        EvalContext::new(std::sync::Arc::new(PluginRegistry::new()))
    }

    fn list(items: &[i64]) -> Value {
        Value::List(items.iter().map(|i| Value::from(*i)).collect())
    }

    #[test]
    fn test_lookup_object_and_pairs() {
        let table = Value::from_json(&json!({"gold": 0.2, "silver": 0.1}));
        let result = Lookup.call(&[table, Value::from("gold")], &eval_ctx());
        assert_eq!(result.to_string(), "0.2");

        let pairs = Value::from_json(&json!([[1, "one"], [2, "two"]]));
        assert_eq!(Lookup.call(&[pairs.clone(), Value::from("2")], &eval_ctx()).to_string(), "two");
        assert!(Lookup.call(&[pairs, Value::from(3)], &eval_ctx()).is_null());

        let rows = Value::from_json(&json!([{"key": "a", "value": 10}]));
        assert_eq!(Lookup.call(&[rows, Value::from("a")], &eval_ctx()).to_string(), "10");
    }

    #[test]
    fn test_index() {
        let l = list(&[10, 20, 30]);
        assert_eq!(Index.call(&[l.clone(), Value::from(0)], &eval_ctx()).to_string(), "10");
        assert_eq!(Index.call(&[l.clone(), Value::from(-1)], &eval_ctx()).to_string(), "30");
        assert!(Index.call(&[l, Value::from(9)], &eval_ctx()).is_null());
    }

    #[test]
    fn test_filter_by_value_and_mask() {
        let l = list(&[1, 2, 1]);
        let result = Filter.call(&[l.clone(), Value::from(1)], &eval_ctx());
        assert_eq!(result.to_string(), "[1, 1]");
        let mask = Value::List(vec![Value::from(true), Value::from(false), Value::from(true)]);
        assert_eq!(Filter.call(&[l.clone(), mask], &eval_ctx()).to_string(), "[1, 1]");
        let short = Value::List(vec![Value::from(true)]);
        assert!(Filter.call(&[l, short], &eval_ctx()).is_error());
    }

    #[test]
    fn test_count_skips_empty() {
        let args = vec![Value::List(vec![Value::from("a"), Value::Null, Value::from("")]), Value::from(3)];
        assert_eq!(Count.call(&args, &eval_ctx()).to_string(), "2");
    }

    #[test]
    fn test_in() {
        let args = vec![Value::from("FR"), Value::from("BE"), Value::from("FR")];
        assert_eq!(In.call(&args, &eval_ctx()).as_bool(), Some(true));
        let args = vec![Value::from(4), list(&[1, 2, 3])];
        assert_eq!(In.call(&args, &eval_ctx()).as_bool(), Some(false));
    }

    #[test]
    fn test_distinct() {
        let args = vec![Value::from(1), Value::from(2), Value::from(2), Value::from("2")];
        assert_eq!(Distinct.call(&args, &eval_ctx()).to_string(), "[1, 2]");
    }
}
