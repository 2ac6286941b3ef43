//! Normalizing adapter: stored JSON to typed formulas
//!
//! Stored formulas come from several editor generations. The adapter
//! accepts all of them, fills in missing ids, infers literal types and
//! drops tokens it cannot make sense of. It never rejects a formula;
//! only an absent or null input yields `None`.

use crate::call::parse_call;
use crate::token::*;
use rand::Rng;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Adapt a stored formula. Adapting an adapted formula's stored form
/// yields an equivalent formula.
pub fn adapt(stored: Option<&JsonValue>) -> Option<Formula> {
    let stored = match stored {
        None | Some(JsonValue::Null) => return None,
        Some(s) => s,
    };

    let formula = match stored {
        JsonValue::Object(obj) => {
            let id = id_of(obj.get("id")).unwrap_or_else(|| synthetic_id("formula", 0));
            let sequence = match obj.get("sequence") {
                Some(JsonValue::Array(items)) => adapt_sequence(items, "sequence"),
                None | Some(JsonValue::Null) => Vec::new(),
                Some(other) => {
                    warn!(formula_id = %id, found = %other, "sequence is not a list, using an empty one");
                    Vec::new()
                }
            };
            Formula {
                id,
                name: text(obj, "name"),
                field_id: text(obj, "fieldId"),
                target_property: text(obj, "targetProperty"),
                sequence,
            }
        }
        JsonValue::Array(items) => Formula::new(synthetic_id("formula", 0), adapt_sequence(items, "sequence")),
        other => {
            warn!(found = %other, "stored formula is neither an object nor a list");
            Formula::new(synthetic_id("formula", 0), Vec::new())
        }
    };

    debug!(formula_id = %formula.id, tokens = formula.sequence.len(), "adapted formula");
    Some(formula)
}

/// Adapt a stored token list; unusable entries are dropped
pub fn adapt_sequence(items: &[JsonValue], path: &str) -> Vec<Token> {
    items.iter()
        .enumerate()
        .filter_map(|(i, item)| adapt_token(item, path, i))
        .collect()
}

fn adapt_token(item: &JsonValue, path: &str, index: usize) -> Option<Token> {
    let here = format!("{}[{}]", path, index);
    let Some(obj) = item.as_object() else {
        warn!(path = %here, "dropping token that is not an object");
        return None;
    };

    let id = id_of(obj.get("id")).unwrap_or_else(|| synthetic_id(path, index));
    let kind = obj.get("type").and_then(JsonValue::as_str).unwrap_or("");

    let token = match kind {
        "field" => Token::Field(FieldToken {
            field_id: field_ref(obj, "fieldId", &here),
            part: part_of(obj.get("part")),
            label: text(obj, "label"),
            id,
        }),
        "adv_part" => Token::AdvPart(AdvPartToken {
            field_id: field_ref(obj, "fieldId", &here),
            part: part_of(obj.get("part")).unwrap_or_default(),
            label: text(obj, "label"),
            id,
        }),
        "value" => {
            let value = obj.get("value").cloned().unwrap_or(JsonValue::Null);
            let value_type = obj.get("valueType")
                .and_then(JsonValue::as_str)
                .and_then(ValueType::parse)
                .unwrap_or_else(|| ValueType::infer(&value));
            Token::Value(ValueToken { id, value, value_type: Some(value_type) })
        }
        "operator" => {
            let symbol = text(obj, "value").unwrap_or_default();
            if crate::ops::Operator::parse(&symbol).is_none() {
                warn!(path = %here, symbol = %symbol, "unknown operator kept as written");
            }
            Token::Operator(OperatorToken { id, value: symbol })
        }
        "function" => {
            let value = text(obj, "value").unwrap_or_default();
            let call = match parse_call(&value) {
                Ok(call) => Some(call),
                Err(e) => {
                    warn!(path = %here, error = %e, "function call text does not parse");
                    None
                }
            };
            Token::Function(FunctionToken { id, value, call })
        }
        "formula_ref" => Token::FormulaRef(FormulaRefToken {
            ref_formula_id: id_of(obj.get("refFormulaId"))
                .or_else(|| id_of(obj.get("value")))
                .unwrap_or_default(),
            label: text(obj, "label"),
            id,
        }),
        "cond" => Token::Cond(CondToken {
            cond_expr: nested(obj.get("condExpr"), &format!("{}.condExpr", here)),
            then: nested(obj.get("then"), &format!("{}.then", here)),
            otherwise: nested(obj.get("else"), &format!("{}.else", here)),
            else_behavior: match obj.get("elseBehavior").and_then(JsonValue::as_str) {
                Some("ignore") => ElseBehavior::Ignore,
                _ => ElseBehavior::Zero,
            },
            condition: obj.get("condition").and_then(JsonValue::as_object).map(legacy_condition),
            id,
        }),
        "switch" => {
            let cases = match obj.get("cases") {
                Some(JsonValue::Array(cases)) => cases.iter()
                    .enumerate()
                    .filter_map(|(ci, case)| {
                        let case = case.as_object()?;
                        let seq = case.get("seq").or_else(|| case.get("sequence"));
                        Some(SwitchCase {
                            value: case.get("value").cloned().unwrap_or(JsonValue::Null),
                            seq: nested(seq, &format!("{}.cases[{}].seq", here, ci)),
                        })
                    })
                    .collect(),
                _ => Vec::new(),
            };
            Token::Switch(SwitchToken {
                switch_field_id: text(obj, "switchFieldId").or_else(|| text(obj, "fieldId")).unwrap_or_default(),
                switch_part: part_of(obj.get("switchPart").or_else(|| obj.get("part"))),
                cases,
                default_seq: nested(obj.get("defaultSeq"), &format!("{}.defaultSeq", here)),
                id,
            })
        }
        other => {
            warn!(path = %here, token_type = %other, "dropping token of unknown type");
            return None;
        }
    };
    Some(token)
}

fn nested(value: Option<&JsonValue>, path: &str) -> Vec<Token> {
    match value {
        Some(JsonValue::Array(items)) => adapt_sequence(items, path),
        _ => Vec::new(),
    }
}

fn legacy_condition(obj: &Map<String, JsonValue>) -> LegacyCondition {
    LegacyCondition {
        field_id: text(obj, "fieldId").unwrap_or_default(),
        part: part_of(obj.get("part")),
        operator: text(obj, "operator").unwrap_or_else(|| "=".to_string()),
        value: obj.get("value").cloned().unwrap_or(JsonValue::Null),
    }
}

fn field_ref(obj: &Map<String, JsonValue>, key: &str, here: &str) -> String {
    match text(obj, key).or_else(|| text(obj, "value")) {
        Some(id) => id,
        None => {
            warn!(path = %here, "field token without fieldId resolves to an empty value");
            String::new()
        }
    }
}

fn text(obj: &Map<String, JsonValue>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn id_of(value: Option<&JsonValue>) -> Option<String> {
    match value? {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn part_of(value: Option<&JsonValue>) -> Option<Part> {
    value.and_then(JsonValue::as_str).and_then(Part::parse)
}

/// `auto-sequence-2-then-0-k3x9qa`: token path, position and a random suffix
fn synthetic_id(path: &str, index: usize) -> String {
    let mut slug = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');

    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("auto-{}-{}-{}", slug, index, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_absent_input() {
        assert!(adapt(None).is_none());
        assert!(adapt(Some(&JsonValue::Null)).is_none());
    }

    #[test]
    fn test_fills_ids_and_types() {
        let f = adapt(Some(&json!({
            "id": "f1",
            "sequence": [
                {"type": "field", "fieldId": "price"},
                {"type": "operator", "id": "o", "value": "*"},
                {"type": "value", "id": "v", "value": "15%"}
            ]
        }))).unwrap();
        assert_eq!(f.sequence.len(), 3);
        assert!(f.sequence[0].id().starts_with("auto-sequence-0-"));
        match &f.sequence[2] {
            Token::Value(v) => assert_eq!(v.value_type, Some(ValueType::Percentage)),
            other => panic!("expected value, got {:?}", other),
        }
    }

    #[test]
    fn test_drops_unusable_tokens() {
        let f = adapt(Some(&json!({"id": "f", "sequence": [42, {"type": "sparkle"}, {"type": "value", "value": 1}]}))).unwrap();
        assert_eq!(f.sequence.len(), 1);
    }

    #[test]
    fn test_legacy_shapes() {
        let f = adapt(Some(&json!({
            "id": 7,
            "sequence": [
                {"type": "field", "id": "a", "value": "qty"},
                {"type": "formula_ref", "id": "b", "value": "other"},
                {"type": "switch", "id": "c", "fieldId": "mode",
                 "cases": [{"value": "x", "sequence": [{"type": "value", "id": "d", "value": 1}]}]}
            ]
        }))).unwrap();
        assert_eq!(f.id, "7");
        match &f.sequence[0] {
            Token::Field(t) => assert_eq!(t.field_id, "qty"),
            other => panic!("expected field, got {:?}", other),
        }
        match &f.sequence[1] {
            Token::FormulaRef(t) => assert_eq!(t.ref_formula_id, "other"),
            other => panic!("expected formula_ref, got {:?}", other),
        }
        match &f.sequence[2] {
            Token::Switch(t) => {
                assert_eq!(t.switch_field_id, "mode");
                assert_eq!(t.cases[0].seq.len(), 1);
            }
            other => panic!("expected switch, got {:?}", other),
        }
    }

    #[test]
    fn test_function_call_is_parsed() {
        let f = adapt(Some(&json!({"id": "f", "sequence": [{"type": "function", "id": "a", "value": "ROUND(valeur, 2)"}]}))).unwrap();
        match &f.sequence[0] {
            Token::Function(t) => assert_eq!(t.call.as_ref().map(|c| c.name.as_str()), Some("ROUND")),
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_adapt_is_idempotent() {
        let stored = json!({
            "id": "f1",
            "name": "Total",
            "sequence": [
                {"type": "field", "fieldId": "x"},
                {"type": "operator", "value": "+"},
                {"type": "cond", "condExpr": [{"type": "field", "fieldId": "x"}],
                 "then": [{"type": "value", "value": "10%"}], "elseBehavior": "ignore"},
                {"type": "function", "value": "ROUND(valeur, 1)"}
            ]
        });
        let once = adapt(Some(&stored)).unwrap();
        let twice = adapt(Some(&once.to_stored())).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_bare_sequence() {
        let f = adapt(Some(&json!([{"type": "value", "id": "a", "value": 1}]))).unwrap();
        assert!(f.id.starts_with("auto-formula-0-"));
        assert_eq!(f.sequence.len(), 1);
    }
}
