//! Type checks: IS_EMPTY, IS_NULL, IS_NUMBER, IS_TEXT, IS_BOOLEAN, IS_DATE

use tbl_plugin::prelude::*;
use tbl_core::parse_datetime;

/// Type predicate plugin; one struct per function keeps the registry uniform
pub struct TypeCheck {
    name: &'static str,
    description: &'static str,
    usage: &'static str,
    examples: &'static [&'static str],
    test: fn(&Value) -> bool,
}

static CHECK_ARGS: [ArgMeta; 1] = [ArgMeta::required("valeur", "Any", "Value to inspect")];
static CHECK_RELATED: [&str; 6] = ["IS_EMPTY", "IS_NULL", "IS_NUMBER", "IS_TEXT", "IS_BOOLEAN", "IS_DATE"];

impl FunctionPlugin for TypeCheck {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: self.name,
            description: self.description,
            usage: self.usage,
            args: &CHECK_ARGS,
            returns: "Bool",
            examples: self.examples,
            category: "type",
            source: None,
            related: &CHECK_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        if args.len() != 1 {
            return Value::Error(FormulaError::arg_count(self.name, 1, args.len()));
        }
        match &args[0] {
            Value::Error(e) => Value::Error(e.clone()),
            v => Value::Bool((self.test)(v)),
        }
    }
}

pub const IS_EMPTY: TypeCheck = TypeCheck {
    name: "IS_EMPTY",
    description: "True for a missing value, blank text or an empty list",
    usage: "IS_EMPTY(champ)",
    examples: &["IS_EMPTY({commentaire})", "IS_EMPTY(\"  \") → true"],
    test: Value::is_empty,
};

pub const IS_NULL: TypeCheck = TypeCheck {
    name: "IS_NULL",
    description: "True when the value is missing",
    usage: "IS_NULL(valeur)",
    examples: &["IS_NULL(NULL()) → true", "IS_NULL(\"\") → false"],
    test: Value::is_null,
};

pub const IS_NUMBER: TypeCheck = TypeCheck {
    name: "IS_NUMBER",
    description: "True for numbers and numeric text",
    usage: "IS_NUMBER(valeur)",
    examples: &["IS_NUMBER(\"12.5\") → true", "IS_NUMBER(\"abc\") → false"],
    test: |v| v.numeric().is_some(),
};

pub const IS_TEXT: TypeCheck = TypeCheck {
    name: "IS_TEXT",
    description: "True for text values",
    usage: "IS_TEXT(valeur)",
    examples: &["IS_TEXT(\"abc\") → true", "IS_TEXT(3) → false"],
    test: |v| matches!(v, Value::Text(_)),
};

pub const IS_BOOLEAN: TypeCheck = TypeCheck {
    name: "IS_BOOLEAN",
    description: "True for booleans",
    usage: "IS_BOOLEAN(valeur)",
    examples: &["IS_BOOLEAN(TRUE()) → true"],
    test: |v| matches!(v, Value::Bool(_)),
};

pub const IS_DATE: TypeCheck = TypeCheck {
    name: "IS_DATE",
    description: "True for dates and ISO date text",
    usage: "IS_DATE(valeur)",
    examples: &["IS_DATE(\"2024-03-01\") → true", "IS_DATE(\"soon\") → false"],
    test: |v| match v {
        Value::DateTime(_) => true,
        Value::Text(s) => parse_datetime(s).is_some(),
        _ => false,
    },
};

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_ctx() -> EvalContext {
        EvalContext::new(std::sync::Arc::new(PluginRegistry::new()))
    }

    fn check(f: &TypeCheck, v: Value) -> bool {
        f.call(&[v], &eval_ctx()).as_bool().unwrap()
    }

    #[test]
    fn test_is_empty() {
        assert!(check(&IS_EMPTY, Value::Null));
        assert!(check(&IS_EMPTY, Value::from("  ")));
        assert!(check(&IS_EMPTY, Value::List(vec![])));
        assert!(!check(&IS_EMPTY, Value::from(0)));
    }

    #[test]
    fn test_is_null() {
        assert!(check(&IS_NULL, Value::Null));
        assert!(!check(&IS_NULL, Value::from("")));
    }

    #[test]
    fn test_is_number_and_text() {
        assert!(check(&IS_NUMBER, Value::from(3)));
        assert!(check(&IS_NUMBER, Value::from("12.5")));
        assert!(!check(&IS_NUMBER, Value::from("abc")));
        assert!(check(&IS_TEXT, Value::from("abc")));
        assert!(!check(&IS_TEXT, Value::from(3)));
    }

    #[test]
    fn test_is_boolean_and_date() {
        assert!(check(&IS_BOOLEAN, Value::from(false)));
        assert!(check(&IS_DATE, Value::from("2024-03-01")));
        assert!(!check(&IS_DATE, Value::from("soon")));
    }

    #[test]
    fn test_errors_propagate() {
        let err = Value::Error(FormulaError::div_zero());
        assert!(IS_NULL.call(&[err], &eval_ctx()).is_error());
    }
}
