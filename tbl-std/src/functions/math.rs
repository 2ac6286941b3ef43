//! Math functions: rounding, extremes, sums, powers

use tbl_plugin::prelude::*;
use crate::helpers::{require_number, extract_int_or, flatten_numbers};

pub struct Round;
pub struct Min;
pub struct Max;
pub struct Sum;
pub struct Average;
pub struct Abs;
pub struct Ceiling;
pub struct Floor;
pub struct Power;
pub struct Sqrt;
pub struct Mod;

static ROUND_ARGS: [ArgMeta; 2] = [
    ArgMeta::required("valeur", "Number", "Value to round"),
    ArgMeta::optional("décimales", "Number", "Decimal places (negative rounds to tens, hundreds)", "0"),
];
static ROUND_EXAMPLES: [&str; 3] = ["ROUND(2.345, 2) → 2.35", "ROUND(2.5) → 3", "ROUND(1234, -2) → 1200"];
static ROUND_RELATED: [&str; 2] = ["FLOOR", "CEILING"];

static VALUES_ARGS: [ArgMeta; 1] = [ArgMeta::required("valeurs", "Number...", "Numbers or lists of numbers")];

static MIN_EXAMPLES: [&str; 2] = ["MIN(3, 1, 2) → 1", "MIN({tarifs}) → smallest selected"];
static MIN_RELATED: [&str; 1] = ["MAX"];

static MAX_EXAMPLES: [&str; 1] = ["MAX(3, 1, 2) → 3"];
static MAX_RELATED: [&str; 1] = ["MIN"];

static SUM_EXAMPLES: [&str; 2] = ["SUM(1, 2, 3) → 6", "SUM({lignes}) → total of a multi-value field"];
static SUM_RELATED: [&str; 2] = ["AVERAGE", "COUNT"];

static AVERAGE_EXAMPLES: [&str; 1] = ["AVERAGE(2, 4) → 3"];
static AVERAGE_RELATED: [&str; 1] = ["SUM"];

static ABS_ARGS: [ArgMeta; 1] = [ArgMeta::required("valeur", "Number", "Value")];
static ABS_EXAMPLES: [&str; 1] = ["ABS(-5) → 5"];

static STEP_ARGS: [ArgMeta; 2] = [
    ArgMeta::required("valeur", "Number", "Value to round"),
    ArgMeta::optional("précision", "Number", "Multiple to round to", "1"),
];
static CEILING_EXAMPLES: [&str; 2] = ["CEILING(4.2) → 5", "CEILING(7, 5) → 10"];
static FLOOR_EXAMPLES: [&str; 2] = ["FLOOR(4.8) → 4", "FLOOR(7, 5) → 5"];
static STEP_RELATED: [&str; 3] = ["ROUND", "FLOOR", "CEILING"];

static POWER_ARGS: [ArgMeta; 2] = [
    ArgMeta::required("base", "Number", "Base"),
    ArgMeta::required("exposant", "Number", "Exponent (may be fractional)"),
];
static POWER_EXAMPLES: [&str; 2] = ["POWER(2, 10) → 1024", "POWER(9, 0.5) → 3"];
static POWER_RELATED: [&str; 1] = ["SQRT"];

static SQRT_ARGS: [ArgMeta; 1] = [ArgMeta::required("valeur", "Number", "Value (must be non-negative)")];
static SQRT_EXAMPLES: [&str; 1] = ["SQRT(16) → 4"];
static SQRT_RELATED: [&str; 1] = ["POWER"];

static MOD_ARGS: [ArgMeta; 2] = [
    ArgMeta::required("dividende", "Number", "Dividend"),
    ArgMeta::required("diviseur", "Number", "Divisor (non-zero)"),
];
static MOD_EXAMPLES: [&str; 1] = ["MOD(7, 3) → 1"];
static MOD_RELATED: [&str; 1] = ["ROUND"];

impl FunctionPlugin for Round {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "ROUND",
            description: "Round a number to the given decimal places (half away from zero)",
            usage: "ROUND(valeur, décimales)",
            args: &ROUND_ARGS,
            returns: "Number",
            examples: &ROUND_EXAMPLES,
            category: "math",
            source: None,
            related: &ROUND_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        if args.is_empty() || args.len() > 2 {
            return Value::Error(FormulaError::arg_count("ROUND", 2, args.len()));
        }
        let n = match require_number(&args[0], "ROUND", "valeur") {
            Ok(n) => n,
            Err(e) => return Value::Error(e),
        };
        match extract_int_or(args, 1, 0, "ROUND", "décimales") {
            Ok(places) => Value::Number(n.round(places.clamp(-30, 30) as i32)),
            Err(e) => Value::Error(e),
        }
    }
}

fn extreme(name: &str, args: &[Value], pick_max: bool) -> Value {
    let nums = match flatten_numbers(args, name) {
        Ok(nums) => nums,
        Err(e) => return Value::Error(e),
    };
    let best = if pick_max { nums.into_iter().max() } else { nums.into_iter().min() };
    match best {
        Some(n) => Value::Number(n),
        None => Value::Error(FormulaError::arg_count(name, 1, 0)),
    }
}

impl FunctionPlugin for Min {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "MIN",
            description: "Smallest of the arguments",
            usage: "MIN(valeur1, valeur2, ...)",
            args: &VALUES_ARGS,
            returns: "Number",
            examples: &MIN_EXAMPLES,
            category: "math",
            source: None,
            related: &MIN_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        extreme("MIN", args, false)
    }
}

impl FunctionPlugin for Max {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "MAX",
            description: "Largest of the arguments",
            usage: "MAX(valeur1, valeur2, ...)",
            args: &VALUES_ARGS,
            returns: "Number",
            examples: &MAX_EXAMPLES,
            category: "math",
            source: None,
            related: &MAX_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        extreme("MAX", args, true)
    }
}

impl FunctionPlugin for Sum {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "SUM",
            description: "Sum of numbers, lists are flattened",
            usage: "SUM(liste)",
            args: &VALUES_ARGS,
            returns: "Number",
            examples: &SUM_EXAMPLES,
            category: "math",
            source: None,
            related: &SUM_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        match flatten_numbers(args, "SUM") {
            Ok(nums) => Value::Number(
                nums.iter().fold(Number::from_i64(0), |acc, n| acc.add(n))
            ),
            Err(e) => Value::Error(e),
        }
    }
}

impl FunctionPlugin for Average {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "AVERAGE",
            description: "Arithmetic mean of numbers, lists are flattened",
            usage: "AVERAGE(liste)",
            args: &VALUES_ARGS,
            returns: "Number",
            examples: &AVERAGE_EXAMPLES,
            category: "math",
            source: None,
            related: &AVERAGE_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        let nums = match flatten_numbers(args, "AVERAGE") {
            Ok(nums) => nums,
            Err(e) => return Value::Error(e),
        };
        if nums.is_empty() {
            return Value::Error(FormulaError::domain_error("AVERAGE() of an empty list"));
        }
        let total = nums.iter().fold(Number::from_i64(0), |acc, n| acc.add(n));
        match total.checked_div(&Number::from_i64(nums.len() as i64)) {
            Ok(mean) => Value::Number(mean),
            Err(e) => Value::Error(e.into()),
        }
    }
}

impl FunctionPlugin for Abs {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "ABS",
            description: "Absolute value",
            usage: "ABS(valeur)",
            args: &ABS_ARGS,
            returns: "Number",
            examples: &ABS_EXAMPLES,
            category: "math",
            source: None,
            related: &[],
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        if args.len() != 1 {
            return Value::Error(FormulaError::arg_count("ABS", 1, args.len()));
        }
        match require_number(&args[0], "ABS", "valeur") {
            Ok(n) => Value::Number(n.abs()),
            Err(e) => Value::Error(e),
        }
    }
}

/// Shared body of FLOOR and CEILING
fn round_to_step(name: &str, args: &[Value], up: bool) -> Value {
    if args.is_empty() || args.len() > 2 {
        return Value::Error(FormulaError::arg_count(name, 2, args.len()));
    }
    let n = match require_number(&args[0], name, "valeur") {
        Ok(n) => n,
        Err(e) => return Value::Error(e),
    };
    let step = match args.get(1) {
        None | Some(Value::Null) => Number::from_i64(1),
        Some(v) => match require_number(v, name, "précision") {
            Ok(step) => step,
            Err(e) => return Value::Error(e),
        },
    };
    let result = if up { n.ceil_to(&step) } else { n.floor_to(&step) };
    match result {
        Ok(r) => Value::Number(r),
        Err(e) => Value::Error(e.into()),
    }
}

impl FunctionPlugin for Ceiling {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "CEILING",
            description: "Round up to the next integer or multiple",
            usage: "CEILING(valeur, précision)",
            args: &STEP_ARGS,
            returns: "Number",
            examples: &CEILING_EXAMPLES,
            category: "math",
            source: None,
            related: &STEP_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        round_to_step("CEILING", args, true)
    }
}

impl FunctionPlugin for Floor {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "FLOOR",
            description: "Round down to the previous integer or multiple",
            usage: "FLOOR(valeur, précision)",
            args: &STEP_ARGS,
            returns: "Number",
            examples: &FLOOR_EXAMPLES,
            category: "math",
            source: None,
            related: &STEP_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        round_to_step("FLOOR", args, false)
    }
}

impl FunctionPlugin for Power {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "POWER",
            description: "Raise a number to a power",
            usage: "POWER(base, exposant)",
            args: &POWER_ARGS,
            returns: "Number",
            examples: &POWER_EXAMPLES,
            category: "math",
            source: None,
            related: &POWER_RELATED,
        }
    }

    fn call(&self, args: &[Value], ctx: &EvalContext) -> Value {
        if args.len() != 2 {
            return Value::Error(FormulaError::arg_count("POWER", 2, args.len()));
        }
        let base = match require_number(&args[0], "POWER", "base") {
            Ok(n) => n,
            Err(e) => return Value::Error(e),
        };
        let exp = match require_number(&args[1], "POWER", "exposant") {
            Ok(n) => n,
            Err(e) => return Value::Error(e),
        };
        match base.pow_real(&exp, ctx.precision) {
            Ok(r) => Value::Number(r),
            Err(e) => Value::Error(e.into()),
        }
    }
}

impl FunctionPlugin for Sqrt {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "SQRT",
            description: "Square root with arbitrary precision",
            usage: "SQRT(valeur)",
            args: &SQRT_ARGS,
            returns: "Number",
            examples: &SQRT_EXAMPLES,
            category: "math",
            source: None,
            related: &SQRT_RELATED,
        }
    }

    fn call(&self, args: &[Value], ctx: &EvalContext) -> Value {
        if args.len() != 1 {
            return Value::Error(FormulaError::arg_count("SQRT", 1, args.len()));
        }
        match require_number(&args[0], "SQRT", "valeur") {
            Ok(n) => match n.sqrt(ctx.precision) {
                Ok(result) => Value::Number(result),
                Err(e) => Value::Error(e.into()),
            },
            Err(e) => Value::Error(e),
        }
    }
}

impl FunctionPlugin for Mod {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "MOD",
            description: "Remainder of a division, with the sign of the dividend",
            usage: "MOD(dividende, diviseur)",
            args: &MOD_ARGS,
            returns: "Number",
            examples: &MOD_EXAMPLES,
            category: "math",
            source: None,
            related: &MOD_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        if args.len() != 2 {
            return Value::Error(FormulaError::arg_count("MOD", 2, args.len()));
        }
        let a = match require_number(&args[0], "MOD", "dividende") {
            Ok(n) => n,
            Err(e) => return Value::Error(e),
        };
        let b = match require_number(&args[1], "MOD", "diviseur") {
            Ok(n) => n,
            Err(e) => return Value::Error(e),
        };
        match a.checked_rem(&b) {
            Ok(r) => Value::Number(r),
            Err(e) => Value::Error(e.into()),
        }
    }
}
