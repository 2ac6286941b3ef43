//! Constant functions: TRUE, FALSE, NULL, BLANK, PI, E

use tbl_plugin::prelude::*;

/// Zero-argument function producing a fixed value
pub struct Constant {
    name: &'static str,
    description: &'static str,
    usage: &'static str,
    returns: &'static str,
    examples: &'static [&'static str],
    value: fn(&EvalContext) -> Value,
}

static CONSTANT_RELATED: [&str; 6] = ["TRUE", "FALSE", "NULL", "BLANK", "PI", "E"];

impl FunctionPlugin for Constant {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: self.name,
            description: self.description,
            usage: self.usage,
            args: &[],
            returns: self.returns,
            examples: self.examples,
            category: "constant",
            source: None,
            related: &CONSTANT_RELATED,
        }
    }

    fn call(&self, args: &[Value], ctx: &EvalContext) -> Value {
        if !args.is_empty() {
            return Value::Error(FormulaError::arg_count(self.name, 0, args.len()));
        }
        (self.value)(ctx)
    }
}

pub const TRUE: Constant = Constant {
    name: "TRUE",
    description: "Boolean true",
    usage: "TRUE()",
    returns: "Bool",
    examples: &["TRUE() → true"],
    value: |_| Value::Bool(true),
};

pub const FALSE: Constant = Constant {
    name: "FALSE",
    description: "Boolean false",
    usage: "FALSE()",
    returns: "Bool",
    examples: &["FALSE() → false"],
    value: |_| Value::Bool(false),
};

pub const NULL: Constant = Constant {
    name: "NULL",
    description: "The empty value (same as a missing field)",
    usage: "NULL()",
    returns: "Null",
    examples: &["IS_NULL(NULL()) → true"],
    value: |_| Value::Null,
};

pub const BLANK: Constant = Constant {
    name: "BLANK",
    description: "Empty text",
    usage: "BLANK()",
    returns: "Text",
    examples: &["CONCAT(BLANK(), \"x\") → \"x\""],
    value: |_| Value::Text(String::new()),
};

pub const PI: Constant = Constant {
    name: "PI",
    description: "π at the context precision",
    usage: "PI()",
    returns: "Number",
    examples: &["PI() → 3.14159..."],
    value: |ctx| Value::Number(Number::pi(ctx.precision)),
};

pub const E: Constant = Constant {
    name: "E",
    description: "Euler's number at the context precision",
    usage: "E()",
    returns: "Number",
    examples: &["E() → 2.71828..."],
    value: |ctx| Value::Number(Number::e(ctx.precision)),
};
