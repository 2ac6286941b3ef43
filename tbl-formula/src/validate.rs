//! Structural validation of stored formulas
//!
//! Validation is lenient: only a missing formula id, a non-list sequence
//! or a formula made of a single operator are rejected. Everything else
//! the adapter can repair is reported as a warning with its location.

use crate::call::parse_call;
use crate::ops::Operator;
use crate::token::Token;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Formula must be a JSON object")]
    NotAnObject,

    #[error("Formula has no id")]
    MissingId,

    #[error("Formula sequence must be a list")]
    SequenceNotList,

    #[error("A formula cannot consist of a single operator")]
    LoneOperator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    NotAnObject,
    MissingId,
    DuplicateId,
    UnknownType,
    UnknownOperator,
    ConsecutiveOperands,
    ConsecutiveOperators,
    LeadingOperator,
    TrailingOperator,
    MissingReference,
    InvalidCall,
    InvalidNested,
    NoFields,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuralWarning {
    pub kind: WarningKind,
    /// Location such as `sequence[2].then[0]`
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub warnings: Vec<StructuralWarning>,
    /// Tokens per type tag, nested sequences included
    pub counts: BTreeMap<String, usize>,
}

impl Diagnostics {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.counts.get(kind).copied().unwrap_or(0)
    }

    pub fn has(&self, kind: WarningKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }
}

/// Validation outcome in the shape returned to callers of the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub message: String,
    pub details: Diagnostics,
}

/// Validate a stored formula
pub fn validate(stored: &JsonValue) -> Result<Diagnostics, ValidationError> {
    let obj = stored.as_object().ok_or(ValidationError::NotAnObject)?;

    let has_id = match obj.get("id") {
        Some(JsonValue::String(s)) => !s.trim().is_empty(),
        Some(JsonValue::Number(_)) => true,
        _ => false,
    };
    if !has_id {
        return Err(ValidationError::MissingId);
    }

    let sequence = match obj.get("sequence") {
        None | Some(JsonValue::Null) => &[][..],
        Some(JsonValue::Array(items)) => items.as_slice(),
        Some(_) => return Err(ValidationError::SequenceNotList),
    };

    if let [only] = sequence {
        if only.get("type").and_then(JsonValue::as_str) == Some("operator") {
            return Err(ValidationError::LoneOperator);
        }
    }

    Ok(check_sequence(sequence))
}

/// Validate and fold the outcome into a report
pub fn validate_report(stored: &JsonValue) -> ValidationReport {
    match validate(stored) {
        Ok(details) => {
            let message = match details.warnings.len() {
                0 => "Formula is valid".to_string(),
                1 => "Formula is valid with 1 warning".to_string(),
                n => format!("Formula is valid with {} warnings", n),
            };
            ValidationReport { valid: true, message, details }
        }
        Err(e) => ValidationReport { valid: false, message: e.to_string(), details: Diagnostics::default() },
    }
}

/// Structural checks on an adapted sequence
pub fn validate_sequence(tokens: &[Token]) -> Diagnostics {
    match serde_json::to_value(tokens) {
        Ok(JsonValue::Array(items)) => check_sequence(&items),
        _ => Diagnostics::default(),
    }
}

fn check_sequence(sequence: &[JsonValue]) -> Diagnostics {
    let mut checker = Checker::default();
    checker.walk(sequence, "sequence");
    let fields = checker.diagnostics.count("field") + checker.diagnostics.count("adv_part");
    if fields == 0 && !sequence.is_empty() {
        checker.warn(WarningKind::NoFields, "sequence", "Formula does not reference any field");
    }
    checker.diagnostics
}

#[derive(Default)]
struct Checker {
    diagnostics: Diagnostics,
    ids: HashSet<String>,
}

enum Role {
    Operand,
    /// Function with placeholders, taking the operand before it
    Binding,
    Binary(String),
    Prefix,
    Skip,
}

impl Checker {
    fn warn(&mut self, kind: WarningKind, path: &str, message: impl Into<String>) {
        self.diagnostics.warnings.push(StructuralWarning { kind, path: path.to_string(), message: message.into() });
    }

    fn walk(&mut self, sequence: &[JsonValue], path: &str) {
        let mut expect_operand = true;
        let mut last_binary: Option<String> = None;

        for (i, item) in sequence.iter().enumerate() {
            let here = format!("{}[{}]", path, i);
            let Some(obj) = item.as_object() else {
                self.warn(WarningKind::NotAnObject, &here, "Token is not an object");
                continue;
            };
            self.check_id(obj, &here);

            match self.check_token(obj, &here) {
                Role::Operand => {
                    if !expect_operand {
                        self.warn(WarningKind::ConsecutiveOperands, &here, "Two operands without an operator between them");
                    }
                    expect_operand = false;
                    last_binary = None;
                }
                Role::Binding => {
                    expect_operand = false;
                    last_binary = None;
                }
                Role::Binary(symbol) => {
                    if expect_operand {
                        if i == 0 {
                            if symbol != "-" {
                                self.warn(WarningKind::LeadingOperator, &here, format!("Sequence starts with operator '{}'", symbol));
                            }
                        } else {
                            self.warn(WarningKind::ConsecutiveOperators, &here, format!("Operator '{}' follows another operator", symbol));
                        }
                    }
                    expect_operand = true;
                    last_binary = Some(symbol);
                }
                Role::Prefix => {
                    if !expect_operand {
                        self.warn(WarningKind::ConsecutiveOperands, &here, "Prefix '!' follows an operand");
                    }
                    expect_operand = true;
                }
                Role::Skip => {}
            }
        }

        if let Some(symbol) = last_binary {
            let here = format!("{}[{}]", path, sequence.len().saturating_sub(1));
            self.warn(WarningKind::TrailingOperator, &here, format!("Sequence ends with operator '{}'", symbol));
        }
    }

    fn check_id(&mut self, obj: &Map<String, JsonValue>, here: &str) {
        match obj.get("id") {
            Some(JsonValue::String(s)) if !s.trim().is_empty() => {
                if !self.ids.insert(s.clone()) {
                    self.warn(WarningKind::DuplicateId, here, format!("Token id '{}' is used more than once", s));
                }
            }
            Some(JsonValue::Number(n)) => {
                if !self.ids.insert(n.to_string()) {
                    self.warn(WarningKind::DuplicateId, here, format!("Token id '{}' is used more than once", n));
                }
            }
            _ => self.warn(WarningKind::MissingId, here, "Token has no id"),
        }
    }

    fn check_token(&mut self, obj: &Map<String, JsonValue>, here: &str) -> Role {
        let kind = obj.get("type").and_then(JsonValue::as_str).unwrap_or("");
        let text = |key: &str| obj.get(key).and_then(JsonValue::as_str).filter(|s| !s.trim().is_empty());

        match kind {
            "field" | "adv_part" => {
                if text("fieldId").or_else(|| text("value")).is_none() {
                    self.warn(WarningKind::MissingReference, here, "Field token has no fieldId");
                }
            }
            "formula_ref" => {
                let has_ref = text("refFormulaId").or_else(|| text("value")).is_some()
                    || obj.get("refFormulaId").is_some_and(JsonValue::is_number);
                if !has_ref {
                    self.warn(WarningKind::MissingReference, here, "Formula reference has no refFormulaId");
                }
            }
            "function" => match text("value").map(parse_call) {
                Some(Ok(call)) => {
                    if call.placeholder_count() > 0 || call.has_variadic() {
                        *self.diagnostics.counts.entry(kind.to_string()).or_insert(0) += 1;
                        return Role::Binding;
                    }
                }
                Some(Err(e)) => self.warn(WarningKind::InvalidCall, here, e.message),
                None => self.warn(WarningKind::InvalidCall, here, "Function token has no call text"),
            },
            "cond" => {
                for key in ["condExpr", "then", "else"] {
                    self.nested(obj.get(key), &format!("{}.{}", here, key));
                }
            }
            "switch" => {
                if text("switchFieldId").or_else(|| text("fieldId")).is_none() {
                    self.warn(WarningKind::MissingReference, here, "Switch token has no switchFieldId");
                }
                match obj.get("cases") {
                    None | Some(JsonValue::Null) => {}
                    Some(JsonValue::Array(cases)) => {
                        for (ci, case) in cases.iter().enumerate() {
                            let seq = case.get("seq").or_else(|| case.get("sequence"));
                            self.nested(seq, &format!("{}.cases[{}].seq", here, ci));
                        }
                    }
                    Some(_) => self.warn(WarningKind::InvalidNested, &format!("{}.cases", here), "Switch cases must be a list"),
                }
                self.nested(obj.get("defaultSeq"), &format!("{}.defaultSeq", here));
            }
            "value" => {}
            "operator" => {
                let symbol = text("value").unwrap_or("").trim().to_string();
                *self.diagnostics.counts.entry(kind.to_string()).or_insert(0) += 1;
                return match Operator::parse(&symbol) {
                    Some(op) if op.is_prefix() => Role::Prefix,
                    Some(_) => Role::Binary(symbol),
                    None => {
                        self.warn(WarningKind::UnknownOperator, here, format!("Unknown operator '{}'", symbol));
                        Role::Binary(symbol)
                    }
                };
            }
            other => {
                self.warn(WarningKind::UnknownType, here, format!("Unknown token type '{}'", other));
                return Role::Skip;
            }
        }
        *self.diagnostics.counts.entry(kind.to_string()).or_insert(0) += 1;
        Role::Operand
    }

    fn nested(&mut self, value: Option<&JsonValue>, path: &str) {
        match value {
            None | Some(JsonValue::Null) => {}
            Some(JsonValue::Array(items)) => self.walk(items, path),
            Some(_) => self.warn(WarningKind::InvalidNested, path, "Nested sequence must be a list"),
        }
    }
}
