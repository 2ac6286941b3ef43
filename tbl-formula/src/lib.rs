//! TBL Formula - sequence formulas for table fields
//!
//! A formula is an ordered list of tokens (fields, literals, operators,
//! function calls, references to other formulas, conditionals). This
//! crate validates stored formulas, normalizes them into typed tokens and
//! evaluates them against field values with a step-by-step trace.

mod adapt;
mod call;
mod config;
mod env;
mod eval;
mod fields;
mod harness;
mod lookup;
mod ops;
mod set;
mod token;
mod validate;

pub use adapt::{adapt, adapt_sequence};
pub use call::{parse_call, CallArg, CallExpr};
pub use config::{ConfigError, EngineConfig, DEFAULT_MAX_DEPTH};
pub use env::Environment;
pub use eval::{EvaluationResult, Evaluator};
pub use fields::{collect_fields, FieldGrouping, MAX_REFERENCE_DEPTH};
pub use harness::{run_test_cases, TestCase, TestCaseResult, TestReport};
pub use lookup::{FormulaArena, FormulaLookup, NoFormulas};
pub use ops::Operator;
pub use set::{evaluate_set, SetEvaluation};
pub use token::*;
pub use validate::{
    validate, validate_report, validate_sequence, Diagnostics, StructuralWarning, ValidationError,
    ValidationReport, WarningKind,
};

use serde_json::Value as JsonValue;
use std::sync::Arc;
use tbl_core::{FormulaError, Severity, Value};
use tbl_plugin::PluginRegistry;

/// Main formula engine
pub struct FormulaEngine {
    evaluator: Evaluator,
}

impl FormulaEngine {
    pub fn new(registry: PluginRegistry) -> Self {
        Self { evaluator: Evaluator::new(Arc::new(registry)) }
    }

    pub fn with_standard_library() -> Self {
        Self::new(tbl_std::standard_registry())
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.evaluator = self.evaluator.with_config(config);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        self.evaluator.config()
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn validate(&self, stored: &JsonValue) -> ValidationReport {
        validate_report(stored)
    }

    pub fn adapt(&self, stored: Option<&JsonValue>) -> Option<Formula> {
        adapt(stored)
    }

    pub fn evaluate(&self, formula: &Formula, env: &Environment, lookup: &dyn FormulaLookup) -> EvaluationResult {
        self.evaluator.evaluate(formula, env, lookup)
    }

    /// Adapt a stored formula and evaluate it against JSON field values
    pub fn evaluate_stored(&self, stored: &JsonValue, values: &JsonValue, lookup: &dyn FormulaLookup) -> EvaluationResult {
        let Some(formula) = adapt(Some(stored)) else {
            let id = stored.get("id").and_then(JsonValue::as_str).unwrap_or("");
            let error = FormulaError::missing_formula(id).with_severity(Severity::Error);
            return EvaluationResult::failure(error, Vec::new(), Vec::new());
        };
        match Environment::from_json(values) {
            Ok(env) => self.evaluate(&formula, &env, lookup),
            Err(e) => EvaluationResult::failure(e.in_formula(&formula.id), Vec::new(), Vec::new()),
        }
    }

    pub fn evaluate_set(&self, formulas: &[Formula], env: &Environment, lookup: &dyn FormulaLookup) -> SetEvaluation {
        evaluate_set(&self.evaluator, formulas, env, lookup)
    }

    pub fn referenced_fields(&self, formula: &Formula, lookup: &dyn FormulaLookup) -> FieldGrouping {
        collect_fields(formula, lookup)
    }

    pub fn run_tests(&self, formula: &Formula, cases: &[TestCase], lookup: &dyn FormulaLookup) -> TestReport {
        run_test_cases(&self.evaluator, formula, cases, lookup)
    }

    pub fn help(&self, name: Option<&str>) -> Value {
        self.evaluator.registry().help(name)
    }

    pub fn list_functions(&self, category: Option<&str>) -> Value {
        self.evaluator.registry().list_functions(category)
    }
}

impl Default for FormulaEngine {
    fn default() -> Self {
        Self::with_standard_library()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tbl_core::codes;

    fn engine() -> FormulaEngine {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        FormulaEngine::with_standard_library()
    }

    #[test]
    fn test_stored_formula_end_to_end() {
        let stored = json!({
            "id": "prix_ttc",
            "sequence": [
                {"type": "field", "id": "t1", "fieldId": "prix_ht"},
                {"type": "operator", "id": "t2", "value": "*"},
                {"type": "value", "id": "t3", "value": "1.2"},
                {"type": "function", "id": "t4", "value": "ROUND(valeur, 2)"}
            ]
        });
        let r = engine().evaluate_stored(&stored, &json!({"prix_ht": "99.99"}), &NoFormulas);
        assert!(r.success, "{:?}", r.error);
        assert_eq!(r.value().to_string(), "119.99");
    }

    #[test]
    fn test_result_serializes() {
        let stored = json!({"id": "f", "sequence": [
            {"type": "value", "id": "a", "value": 5},
            {"type": "operator", "id": "b", "value": "+"},
            {"type": "value", "id": "c", "value": 3}
        ]});
        let r = engine().evaluate_stored(&stored, &json!({}), &NoFormulas);
        let out = serde_json::to_value(&r).unwrap();
        assert_eq!(out["success"], json!(true));
        assert_eq!(out["result"], json!(8));
        assert_eq!(out["error"], JsonValue::Null);
        assert_eq!(out["trace"][3]["operation"], json!("5 + 3"));
    }

    #[test]
    fn test_invalid_values_fail() {
        let stored = json!({"id": "f", "sequence": [{"type": "value", "id": "a", "value": 1}]});
        let r = engine().evaluate_stored(&stored, &json!([1]), &NoFormulas);
        assert!(!r.success);
        assert_eq!(r.error_code(), Some(codes::TYPE_COERCION));
    }

    #[test]
    fn test_absent_formula_is_missing() {
        let r = engine().evaluate_stored(&JsonValue::Null, &json!({}), &NoFormulas);
        assert!(!r.success);
        assert_eq!(r.error_code(), Some(codes::MISSING_FORMULA));
        assert_eq!(r.error_detail.as_ref().map(|e| e.severity), Some(Severity::Error));
    }

    #[test]
    fn test_stored_lookup_and_validation() {
        let arena = FormulaArena::from_stored([
            json!({"id": "base", "sequence": [{"type": "field", "id": "a", "fieldId": "x"}]}),
        ].iter());
        let stored = json!({"id": "top", "sequence": [
            {"type": "formula_ref", "id": "r", "refFormulaId": "base"},
            {"type": "operator", "id": "o", "value": "+"},
            {"type": "value", "id": "v", "value": 1}
        ]});
        let eng = engine();
        let report = eng.validate(&stored);
        assert!(report.valid);
        assert!(report.details.has(WarningKind::NoFields));
        let r = eng.evaluate_stored(&stored, &json!({"x": 41}), &arena);
        assert_eq!(r.value().to_string(), "42");
    }

    #[test]
    fn test_help_and_listing() {
        let eng = engine();
        let round = eng.help(Some("round"));
        assert_eq!(round.get("name").as_text(), Some("ROUND"));
        assert!(!eng.list_functions(Some("text")).is_empty());
    }

    #[test]
    fn test_config_applies() {
        let eng = engine().with_config(EngineConfig::default().with_max_depth(1));
        assert_eq!(eng.config().max_depth, 1);
        let arena = FormulaArena::new()
            .with(Formula::new("a", vec![Token::formula_ref("r", "b")]))
            .with(Formula::new("b", vec![Token::value("v", 1)]));
        let a = arena.get("a").cloned().unwrap();
        let r = eng.evaluate(&a, &Environment::new(), &arena);
        assert_eq!(r.value().to_string(), "1");
        let deeper = FormulaArena::new()
            .with(Formula::new("a", vec![Token::formula_ref("r", "b")]))
            .with(Formula::new("b", vec![Token::formula_ref("r", "c")]))
            .with(Formula::new("c", vec![Token::value("v", 1)]));
        let r = eng.evaluate(&a, &Environment::new(), &deeper);
        assert_eq!(r.warnings[0].code, codes::DEPTH_LIMIT);
    }
}
