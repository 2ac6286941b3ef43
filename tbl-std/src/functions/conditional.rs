//! Conditional functions: IF, SWITCH, CASE, IFS
//!
//! Arguments are evaluated before the call, so these pick among values
//! rather than short-circuiting. Branching over whole sub-sequences is the
//! job of the `cond` and `switch` tokens.

use tbl_plugin::prelude::*;

pub struct If;
pub struct Switch;
pub struct Case;
pub struct Ifs;

static IF_ARGS: [ArgMeta; 3] = [
    ArgMeta::required("condition", "Bool", "Condition to test"),
    ArgMeta::required("alors", "Any", "Value when the condition is true"),
    ArgMeta::optional("sinon", "Any", "Value when the condition is false", "empty"),
];
static IF_EXAMPLES: [&str; 2] = ["IF(TRUE(), 1, 2) → 1", "IF({age} >= 18, \"adult\", \"minor\")"];
static IF_RELATED: [&str; 2] = ["IFS", "CASE"];

static SWITCH_ARGS: [ArgMeta; 4] = [
    ArgMeta::required("valeur", "Any", "Value to match"),
    ArgMeta::required("cas1", "Any", "First case"),
    ArgMeta::required("résultat1", "Any", "Result for the first case"),
    ArgMeta::optional("défaut", "Any", "Result when no case matches", "empty"),
];
static SWITCH_EXAMPLES: [&str; 1] = ["SWITCH(\"b\", \"a\", 1, \"b\", 2, 0) → 2"];
static SWITCH_RELATED: [&str; 2] = ["CASE", "IF"];

static CASE_ARGS: [ArgMeta; 3] = [
    ArgMeta::required("condition1", "Bool", "First condition"),
    ArgMeta::required("valeur1", "Any", "Value for the first condition"),
    ArgMeta::optional("défaut", "Any", "Value when no condition holds", "empty"),
];
static CASE_EXAMPLES: [&str; 1] = ["CASE(FALSE(), 1, TRUE(), 2, 3) → 2"];
static CASE_RELATED: [&str; 2] = ["IFS", "SWITCH"];

static IFS_EXAMPLES: [&str; 1] = ["IFS(FALSE(), \"a\", \"fallback\") → \"fallback\""];
static IFS_RELATED: [&str; 2] = ["IF", "CASE"];

impl FunctionPlugin for If {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "IF",
            description: "Return one value if the condition is true, another otherwise",
            usage: "IF(condition, alors, sinon)",
            args: &IF_ARGS,
            returns: "Any",
            examples: &IF_EXAMPLES,
            category: "conditional",
            source: None,
            related: &IF_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        if args.len() < 2 || args.len() > 3 {
            return Value::Error(FormulaError::arg_count("IF", 3, args.len()));
        }
        match &args[0] {
            Value::Error(e) => Value::Error(e.clone()),
            cond if cond.truthy() => args[1].clone(),
            _ => args.get(2).cloned().unwrap_or(Value::Null),
        }
    }
}

impl FunctionPlugin for Switch {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "SWITCH",
            description: "Compare a value against cases and return the matching result",
            usage: "SWITCH(valeur, cas1, résultat1, ...)",
            args: &SWITCH_ARGS,
            returns: "Any",
            examples: &SWITCH_EXAMPLES,
            category: "conditional",
            source: None,
            related: &SWITCH_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        if args.len() < 3 {
            return Value::Error(FormulaError::arg_count("SWITCH", 3, args.len()));
        }
        let subject = &args[0];
        if let Value::Error(e) = subject {
            return Value::Error(e.clone());
        }
        let rest = &args[1..];
        for pair in rest.chunks(2) {
            match pair {
                [case, result] if subject.loosely_equals(case) => return result.clone(),
                [default] => return default.clone(),
                _ => {}
            }
        }
        Value::Null
    }
}

/// First value whose condition holds; a trailing odd argument is the default
fn first_true(name: &str, args: &[Value]) -> Value {
    if args.len() < 2 {
        return Value::Error(FormulaError::arg_count(name, 2, args.len()));
    }
    for pair in args.chunks(2) {
        match pair {
            [Value::Error(e), _] => return Value::Error(e.clone()),
            [cond, value] if cond.truthy() => return value.clone(),
            [default] => return default.clone(),
            _ => {}
        }
    }
    Value::Null
}

impl FunctionPlugin for Case {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "CASE",
            description: "Return the value paired with the first true condition",
            usage: "CASE(condition1, valeur1, condition2, valeur2, ..., défaut)",
            args: &CASE_ARGS,
            returns: "Any",
            examples: &CASE_EXAMPLES,
            category: "conditional",
            source: None,
            related: &CASE_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        first_true("CASE", args)
    }
}

impl FunctionPlugin for Ifs {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "IFS",
            description: "Test conditions in order and return the value of the first true one",
            usage: "IFS(condition1, valeur1, condition2, valeur2, ..., défaut)",
            args: &CASE_ARGS,
            returns: "Any",
            examples: &IFS_EXAMPLES,
            category: "conditional",
            source: None,
            related: &IFS_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        first_true("IFS", args)
    }
}
