//! Running a formula against example inputs with expected results

use crate::env::Environment;
use crate::eval::Evaluator;
use crate::lookup::FormulaLookup;
use crate::token::Formula;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tbl_core::Value;
use tbl_plugin::TraceStep;
use tracing::info;

/// Numeric results closer than this count as equal
const TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    #[serde(default)]
    pub name: Option<String>,
    /// Field values, as a JSON object
    #[serde(default)]
    pub values: JsonValue,
    #[serde(alias = "expected")]
    pub expected_result: JsonValue,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    pub name: String,
    pub passed: bool,
    pub expected_result: JsonValue,
    pub actual_result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub trace: Vec<TraceStep>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub success: bool,
    pub passed: usize,
    pub total_tests: usize,
    pub results: Vec<TestCaseResult>,
}

pub fn run_test_cases(
    evaluator: &Evaluator,
    formula: &Formula,
    cases: &[TestCase],
    lookup: &dyn FormulaLookup,
) -> TestReport {
    let mut results = Vec::with_capacity(cases.len());

    for (i, case) in cases.iter().enumerate() {
        let name = case.name.clone().unwrap_or_else(|| format!("Test {}", i + 1));
        let expected = Value::from_json(&case.expected_result);

        let outcome = match Environment::from_json(&case.values) {
            Ok(env) => evaluator.evaluate(formula, &env, lookup),
            Err(e) => {
                results.push(TestCaseResult {
                    name,
                    passed: false,
                    expected_result: case.expected_result.clone(),
                    actual_result: None,
                    error: Some(format!("values: {}", e.message)),
                    trace: Vec::new(),
                });
                continue;
            }
        };

        let passed = outcome.success && outcome.result.as_ref().is_some_and(|actual| matches(actual, &expected));
        info!(formula_id = %formula.id, case = %name, passed, "test case");
        results.push(TestCaseResult {
            name,
            passed,
            expected_result: case.expected_result.clone(),
            actual_result: outcome.result,
            error: outcome.error,
            trace: outcome.trace,
        });
    }

    let passed = results.iter().filter(|r| r.passed).count();
    TestReport { success: passed == results.len(), passed, total_tests: results.len(), results }
}

fn matches(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.to_f64(), b.to_f64()) {
            (Some(x), Some(y)) => (x - y).abs() <= TOLERANCE,
            _ => a == b,
        },
        (Value::Null, Value::Null) => true,
        _ => actual.strictly_equals(expected),
    }
}
