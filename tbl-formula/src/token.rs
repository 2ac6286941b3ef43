//! Token model
//!
//! A formula is a flat, ordered list of tokens. Cond and Switch tokens own
//! nested sequences. The serialized form (the "stored" form) uses the
//! camelCase keys the table editor writes.

use crate::call::CallExpr;
use crate::ops::Operator;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tbl_core::{Number, Value};

/// Which part of a composite field value to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    #[default]
    Selection,
    Extra,
    NodeId,
}

impl Part {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "selection" => Some(Part::Selection),
            "extra" => Some(Part::Extra),
            "nodeId" | "node_id" | "nodeid" => Some(Part::NodeId),
            _ => None,
        }
    }

    /// Key of this part inside a composite field value
    pub fn key(&self) -> &'static str {
        match self {
            Part::Selection => "selection",
            Part::Extra => "extra",
            Part::NodeId => "nodeId",
        }
    }
}

/// Declared type of a literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Number,
    String,
    Boolean,
    Percentage,
}

impl ValueType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "number" => Some(ValueType::Number),
            "string" | "text" => Some(ValueType::String),
            "boolean" | "bool" => Some(ValueType::Boolean),
            "percentage" | "percent" => Some(ValueType::Percentage),
            _ => None,
        }
    }

    /// Type a literal would have if nobody declared one
    pub fn infer(value: &JsonValue) -> Self {
        match value {
            JsonValue::Number(_) => ValueType::Number,
            JsonValue::Bool(_) => ValueType::Boolean,
            JsonValue::String(s) if Number::is_percent_literal(s) => ValueType::Percentage,
            JsonValue::String(s) if Number::parse_numeric(s).is_some() => ValueType::Number,
            _ => ValueType::String,
        }
    }
}

/// What an empty chosen Cond arm produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElseBehavior {
    #[default]
    Zero,
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldToken {
    pub id: String,
    pub field_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part: Option<Part>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueToken {
    pub id: String,
    #[serde(default)]
    pub value: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
}

impl ValueToken {
    /// Effective type: the declared one, else inferred from the literal
    pub fn kind(&self) -> ValueType {
        self.value_type.unwrap_or_else(|| ValueType::infer(&self.value))
    }

    /// Runtime value of the literal. Percent literals always become N/100.
    pub fn literal(&self) -> Value {
        let kind = self.kind();
        match &self.value {
            JsonValue::Null => Value::Null,
            JsonValue::String(s) if Number::is_percent_literal(s) => {
                Number::parse_numeric(s).map(Value::Number).unwrap_or_else(|| Value::Text(s.clone()))
            }
            JsonValue::String(s) => match kind {
                ValueType::String => Value::Text(s.clone()),
                ValueType::Boolean => Value::Bool(s.trim().eq_ignore_ascii_case("true")),
                ValueType::Number => Number::parse_numeric(s)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::Text(s.clone())),
                ValueType::Percentage => match Number::parse_numeric(s) {
                    Some(n) => Value::Number(n.checked_div(&Number::from_i64(100)).unwrap_or(n)),
                    None => Value::Text(s.clone()),
                },
            },
            JsonValue::Number(_) if kind == ValueType::Percentage => match Value::from_json(&self.value) {
                Value::Number(n) => Value::Number(n.checked_div(&Number::from_i64(100)).unwrap_or(n)),
                other => other,
            },
            other => Value::from_json(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorToken {
    pub id: String,
    /// Operator symbol as written, e.g. `+` or `>=`
    pub value: String,
}

impl OperatorToken {
    pub fn operator(&self) -> Option<Operator> {
        Operator::parse(&self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionToken {
    pub id: String,
    /// Call text, e.g. `ROUND(valeur, 2)`
    pub value: String,
    /// Parsed call, filled by the adapter
    #[serde(skip)]
    pub call: Option<CallExpr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaRefToken {
    pub id: String,
    pub ref_formula_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvPartToken {
    pub id: String,
    pub field_id: String,
    #[serde(default)]
    pub part: Part,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Single comparison used by Cond tokens written before condExpr existed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyCondition {
    pub field_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part: Option<Part>,
    pub operator: String,
    #[serde(default)]
    pub value: JsonValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CondToken {
    pub id: String,
    #[serde(default)]
    pub cond_expr: Vec<Token>,
    #[serde(default)]
    pub then: Vec<Token>,
    #[serde(rename = "else", default)]
    pub otherwise: Vec<Token>,
    #[serde(default)]
    pub else_behavior: ElseBehavior,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<LegacyCondition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    pub value: JsonValue,
    #[serde(default)]
    pub seq: Vec<Token>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchToken {
    pub id: String,
    pub switch_field_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switch_part: Option<Part>,
    #[serde(default)]
    pub cases: Vec<SwitchCase>,
    #[serde(default)]
    pub default_seq: Vec<Token>,
}

/// One element of a formula sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Token {
    Field(FieldToken),
    Value(ValueToken),
    Operator(OperatorToken),
    Function(FunctionToken),
    FormulaRef(FormulaRefToken),
    AdvPart(AdvPartToken),
    Cond(CondToken),
    Switch(SwitchToken),
}

impl Token {
    pub fn id(&self) -> &str {
        match self {
            Token::Field(t) => &t.id,
            Token::Value(t) => &t.id,
            Token::Operator(t) => &t.id,
            Token::Function(t) => &t.id,
            Token::FormulaRef(t) => &t.id,
            Token::AdvPart(t) => &t.id,
            Token::Cond(t) => &t.id,
            Token::Switch(t) => &t.id,
        }
    }

    /// Stored `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            Token::Field(_) => "field",
            Token::Value(_) => "value",
            Token::Operator(_) => "operator",
            Token::Function(_) => "function",
            Token::FormulaRef(_) => "formula_ref",
            Token::AdvPart(_) => "adv_part",
            Token::Cond(_) => "cond",
            Token::Switch(_) => "switch",
        }
    }

    pub fn is_operator(&self) -> bool {
        matches!(self, Token::Operator(_))
    }

    // ========== Constructors ==========

    pub fn field(id: impl Into<String>, field_id: impl Into<String>) -> Self {
        Token::Field(FieldToken { id: id.into(), field_id: field_id.into(), part: None, label: None })
    }

    pub fn adv_part(id: impl Into<String>, field_id: impl Into<String>, part: Part) -> Self {
        Token::AdvPart(AdvPartToken { id: id.into(), field_id: field_id.into(), part, label: None })
    }

    /// Literal with its type inferred from the JSON value
    pub fn value(id: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        let value = value.into();
        let value_type = Some(ValueType::infer(&value));
        Token::Value(ValueToken { id: id.into(), value, value_type })
    }

    /// Literal that stays text even when it looks numeric
    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Token::Value(ValueToken {
            id: id.into(),
            value: JsonValue::String(text.into()),
            value_type: Some(ValueType::String),
        })
    }

    pub fn operator(id: impl Into<String>, symbol: impl Into<String>) -> Self {
        Token::Operator(OperatorToken { id: id.into(), value: symbol.into() })
    }

    pub fn function(id: impl Into<String>, text: impl Into<String>) -> Self {
        let value = text.into();
        let call = crate::call::parse_call(&value).ok();
        Token::Function(FunctionToken { id: id.into(), value, call })
    }

    pub fn formula_ref(id: impl Into<String>, ref_formula_id: impl Into<String>) -> Self {
        Token::FormulaRef(FormulaRefToken { id: id.into(), ref_formula_id: ref_formula_id.into(), label: None })
    }
}

/// A named, stored formula
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Formula {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_property: Option<String>,
    #[serde(default)]
    pub sequence: Vec<Token>,
}

impl Formula {
    pub fn new(id: impl Into<String>, sequence: Vec<Token>) -> Self {
        Self { id: id.into(), name: None, field_id: None, target_property: None, sequence }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_property = Some(target.into());
        self
    }

    /// Key under which a set evaluation reports this formula's result
    pub fn output_key(&self) -> &str {
        self.target_property.as_deref().unwrap_or(&self.id)
    }

    /// Serialize back to the stored JSON shape
    pub fn to_stored(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }

    /// Ids of the formulas this one references, nested sequences included
    pub fn references(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_refs(&self.sequence, &mut out);
        out
    }
}

fn collect_refs(tokens: &[Token], out: &mut Vec<String>) {
    for token in tokens {
        match token {
            Token::FormulaRef(r) => {
                if !r.ref_formula_id.is_empty() && !out.contains(&r.ref_formula_id) {
                    out.push(r.ref_formula_id.clone());
                }
            }
            Token::Cond(c) => {
                collect_refs(&c.cond_expr, out);
                collect_refs(&c.then, out);
                collect_refs(&c.otherwise, out);
            }
            Token::Switch(s) => {
                for case in &s.cases {
                    collect_refs(&case.seq, out);
                }
                collect_refs(&s.default_seq, out);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_percent_literal_is_fraction() {
        let t = ValueToken { id: "v".into(), value: json!("15%"), value_type: Some(ValueType::String) };
        assert_eq!(t.literal().to_string(), "0.15");
    }

    #[test]
    fn test_percentage_type_divides() {
        let t = ValueToken { id: "v".into(), value: json!(20), value_type: Some(ValueType::Percentage) };
        assert_eq!(t.literal().to_string(), "0.2");
    }

    #[test]
    fn test_string_literal_stays_text() {
        let t = ValueToken { id: "v".into(), value: json!("42"), value_type: Some(ValueType::String) };
        assert_eq!(t.literal().as_text(), Some("42"));
        let inferred = ValueToken { id: "v".into(), value: json!("42"), value_type: None };
        assert!(inferred.literal().as_number().is_some());
    }

    #[test]
    fn test_token_serializes_with_type_tag() {
        let t = Token::field("t1", "price");
        assert_eq!(serde_json::to_value(&t).unwrap(), json!({"type": "field", "id": "t1", "fieldId": "price"}));
    }

    #[test]
    fn test_cond_else_key() {
        let t: Token = serde_json::from_value(json!({
            "type": "cond", "id": "c", "then": [], "else": [{"type": "value", "id": "v", "value": 1}],
            "elseBehavior": "ignore"
        })).unwrap();
        match t {
            Token::Cond(c) => {
                assert_eq!(c.otherwise.len(), 1);
                assert_eq!(c.else_behavior, ElseBehavior::Ignore);
            }
            other => panic!("expected cond, got {:?}", other),
        }
    }

    #[test]
    fn test_references_walk_nested_sequences() {
        let cond = Token::Cond(CondToken {
            id: "c".into(),
            cond_expr: vec![],
            then: vec![Token::formula_ref("r1", "a")],
            otherwise: vec![Token::formula_ref("r2", "b"), Token::formula_ref("r3", "a")],
            else_behavior: ElseBehavior::Zero,
            condition: None,
        });
        let f = Formula::new("f", vec![Token::formula_ref("r0", "c"), cond]);
        assert_eq!(f.references(), vec!["c", "a", "b"]);
    }
}
