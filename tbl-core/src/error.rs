//! Structured formula errors
//!
//! Errors never crash the engine. They are values that propagate through
//! computations and carry a machine-readable code, a message for the
//! operator and, where possible, a hint on how to fix the formula.

use crate::NumberError;
use serde::{Deserialize, Serialize};

/// Standard error codes (machine-readable)
pub mod codes {
    pub const STRUCTURAL_WARNING: &str = "STRUCTURAL_WARNING";
    pub const MISSING_FORMULA: &str = "MISSING_FORMULA";
    pub const MISSING_FIELD: &str = "MISSING_FIELD";
    pub const TYPE_COERCION: &str = "TYPE_COERCION";
    pub const CYCLE: &str = "CYCLE";
    pub const DEPTH_LIMIT: &str = "DEPTH_LIMIT";
    pub const PARSE_ERROR: &str = "PARSE_ERROR";
    pub const DIV_ZERO: &str = "DIV_ZERO";
    pub const UNDEFINED_FUNC: &str = "UNDEFINED_FUNC";
    pub const UNSUPPORTED_OPERATOR: &str = "UNSUPPORTED_OPERATOR";
    pub const MISSING_OPERATOR: &str = "MISSING_OPERATOR";
    pub const EMPTY_FORMULA: &str = "EMPTY_FORMULA";
    pub const ARG_COUNT: &str = "ARG_COUNT";
    pub const ARG_TYPE: &str = "ARG_TYPE";
    pub const DOMAIN_ERROR: &str = "DOMAIN_ERROR";
    pub const INVALID_DATE: &str = "INVALID_DATE";
    pub const INTERNAL: &str = "INTERNAL";
}

/// Severity level of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Evaluation continued with a degraded value
    Warning,
    /// Evaluation of the formula failed
    Error,
    /// Engine bug or unusable input
    Fatal,
}

/// Where an error occurred
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Location inside nested sequences, e.g. `sequence[2].then[0]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Propagation notes
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub notes: Vec<String>,
}

/// Structured error carried through evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaError {
    /// Machine-readable error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ErrorContext>,

    pub severity: Severity,
}

impl FormulaError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            suggestion: None,
            context: None,
            severity: Severity::Error,
        }
    }

    /// Builder: add suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Builder: set formula context (keeps the innermost formula)
    pub fn in_formula(mut self, formula: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(ErrorContext::default);
        if ctx.formula.is_none() {
            ctx.formula = Some(formula.into());
        }
        self
    }

    /// Builder: set token context (keeps the innermost token)
    pub fn at_token(mut self, token: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(ErrorContext::default);
        if ctx.token.is_none() {
            ctx.token = Some(token.into());
        }
        self
    }

    /// Builder: set path context (keeps the innermost path)
    pub fn at_path(mut self, path: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(ErrorContext::default);
        if ctx.path.is_none() {
            ctx.path = Some(path.into());
        }
        self
    }

    /// Builder: add propagation note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(ErrorContext::default);
        ctx.notes.push(note.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }

    // ========== Common Error Constructors ==========

    pub fn structural(details: impl Into<String>) -> Self {
        Self::new(codes::STRUCTURAL_WARNING, details)
            .with_severity(Severity::Warning)
    }

    pub fn missing_formula(id: &str) -> Self {
        Self::new(codes::MISSING_FORMULA, format!("Referenced formula not found: {}", id))
            .with_suggestion("Check that the referenced formula still exists")
            .with_severity(Severity::Warning)
    }

    pub fn missing_field(id: &str) -> Self {
        Self::new(codes::MISSING_FIELD, format!("Field has no value: {}", id))
            .with_severity(Severity::Warning)
    }

    pub fn type_coercion(value: &str, target: &str) -> Self {
        Self::new(codes::TYPE_COERCION, format!("Cannot use '{}' as {}", value, target))
            .with_suggestion(format!("Provide a {} value or use a text function", target))
    }

    pub fn cycle(chain: &[String]) -> Self {
        Self::new(codes::CYCLE, format!("Circular formula reference: {}", chain.join(" → ")))
            .with_suggestion("Remove the formula reference that points back to an earlier formula")
            .with_severity(Severity::Warning)
    }

    pub fn depth_limit(max_depth: usize) -> Self {
        Self::new(codes::DEPTH_LIMIT, format!("Formula references nested deeper than {}", max_depth))
            .with_severity(Severity::Warning)
    }

    pub fn parse_error(details: impl Into<String>) -> Self {
        Self::new(codes::PARSE_ERROR, format!("Parse error: {}", details.into()))
            .with_suggestion("Check the function call syntax")
    }

    pub fn div_zero() -> Self {
        Self::new(codes::DIV_ZERO, "Division by zero")
            .with_suggestion("Ensure divisor is not zero")
    }

    pub fn undefined_func(name: &str) -> Self {
        Self::new(codes::UNDEFINED_FUNC, format!("Unknown function: {}", name))
            .with_suggestion("Use help() to list available functions")
    }

    pub fn unsupported_operator(symbol: &str) -> Self {
        Self::new(codes::UNSUPPORTED_OPERATOR, format!("Unsupported operator: {}", symbol))
    }

    pub fn missing_operator() -> Self {
        Self::new(codes::MISSING_OPERATOR, "Missing operator between values")
            .with_suggestion("Insert an operator between consecutive values")
    }

    pub fn empty_formula() -> Self {
        Self::new(codes::EMPTY_FORMULA, "Empty or invalid formula")
    }

    pub fn type_error(expected: &str, got: &str) -> Self {
        Self::new(codes::TYPE_COERCION, format!("Expected {}, got {}", expected, got))
            .with_suggestion(format!("Convert value to {} or check formula", expected))
    }

    pub fn arg_count(func: &str, expected: usize, got: usize) -> Self {
        Self::new(codes::ARG_COUNT,
            format!("{}() expects {} arguments, got {}", func, expected, got))
            .with_suggestion(format!("Use help('{}') for usage", func))
    }

    pub fn arg_type(func: &str, arg: &str, expected: &str, got: &str) -> Self {
        Self::new(codes::ARG_TYPE,
            format!("{}() argument '{}': expected {}, got {}", func, arg, expected, got))
    }

    pub fn domain_error(details: impl Into<String>) -> Self {
        Self::new(codes::DOMAIN_ERROR, format!("Domain error: {}", details.into()))
    }

    pub fn invalid_date(details: impl Into<String>) -> Self {
        Self::new(codes::INVALID_DATE, format!("Invalid date: {}", details.into()))
            .with_suggestion("Use ISO 8601 format (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)")
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL, format!("Internal error: {}", details.into()))
            .with_suggestion("This is a bug, please report it")
            .with_severity(Severity::Fatal)
    }
}

impl std::fmt::Display for FormulaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " (suggestion: {})", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for FormulaError {}

impl From<NumberError> for FormulaError {
    fn from(err: NumberError) -> Self {
        match err {
            NumberError::ParseError(s) => Self::type_coercion(&s, "number"),
            NumberError::DivisionByZero => Self::div_zero(),
            NumberError::DomainError(s) => Self::domain_error(s),
        }
    }
}
