//! Operators and their semantics over runtime values

use std::cmp::Ordering;
use tbl_core::{FormulaError, Number, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    StrictEq,
    StrictNe,
    And,
    Or,
    Not,
    Dot,
    Index,
    OptionalDot,
    Coalesce,
    Ternary,
    Spread,
}

impl Operator {
    pub fn parse(symbol: &str) -> Option<Self> {
        let op = match symbol.trim() {
            "+" => Operator::Add,
            "-" => Operator::Sub,
            "*" | "×" => Operator::Mul,
            "/" | "÷" => Operator::Div,
            "%" => Operator::Rem,
            "**" | "^" => Operator::Pow,
            "=" | "==" => Operator::Eq,
            "!=" | "<>" => Operator::Ne,
            ">" => Operator::Gt,
            "<" => Operator::Lt,
            ">=" => Operator::Ge,
            "<=" => Operator::Le,
            "===" => Operator::StrictEq,
            "!==" => Operator::StrictNe,
            "&&" => Operator::And,
            "||" => Operator::Or,
            "!" => Operator::Not,
            "." => Operator::Dot,
            "[]" => Operator::Index,
            "?." => Operator::OptionalDot,
            "??" => Operator::Coalesce,
            "?:" => Operator::Ternary,
            "..." => Operator::Spread,
            _ => return None,
        };
        Some(op)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Rem => "%",
            Operator::Pow => "**",
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::StrictEq => "===",
            Operator::StrictNe => "!==",
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Not => "!",
            Operator::Dot => ".",
            Operator::Index => "[]",
            Operator::OptionalDot => "?.",
            Operator::Coalesce => "??",
            Operator::Ternary => "?:",
            Operator::Spread => "...",
        }
    }

    /// Applies to the next operand only
    pub fn is_prefix(&self) -> bool {
        matches!(self, Operator::Not)
    }

    /// Recognized but never evaluated
    pub fn is_supported(&self) -> bool {
        !matches!(self, Operator::Ternary | Operator::Spread)
    }
}

/// Apply a binary operator. Arithmetic is numeric only; text that does not
/// read as a number is a coercion error.
pub fn apply_binary(op: Operator, left: &Value, right: &Value, precision: u32) -> Result<Value, FormulaError> {
    if let Value::Error(e) = left {
        return Err(e.clone());
    }
    if let Value::Error(e) = right {
        return Err(e.clone());
    }

    match op {
        Operator::Add => arithmetic(left, right, |a, b| Ok(a.add(b))),
        Operator::Sub => arithmetic(left, right, |a, b| Ok(a.sub(b))),
        Operator::Mul => arithmetic(left, right, |a, b| Ok(a.mul(b))),
        Operator::Div => arithmetic(left, right, |a, b| a.checked_div(b).map_err(FormulaError::from)),
        Operator::Rem => arithmetic(left, right, |a, b| a.checked_rem(b).map_err(FormulaError::from)),
        Operator::Pow => arithmetic(left, right, |a, b| a.pow_real(b, precision).map_err(FormulaError::from)),

        Operator::Eq => Ok(Value::Bool(left.loosely_equals(right))),
        Operator::Ne => Ok(Value::Bool(!left.loosely_equals(right))),
        Operator::StrictEq => Ok(Value::Bool(left.strictly_equals(right))),
        Operator::StrictNe => Ok(Value::Bool(!left.strictly_equals(right))),
        Operator::Gt => Ok(Value::Bool(left.compare(right) == Ordering::Greater)),
        Operator::Lt => Ok(Value::Bool(left.compare(right) == Ordering::Less)),
        Operator::Ge => Ok(Value::Bool(left.compare(right) != Ordering::Less)),
        Operator::Le => Ok(Value::Bool(left.compare(right) != Ordering::Greater)),

        Operator::And => Ok(Value::Bool(left.truthy() && right.truthy())),
        Operator::Or => Ok(Value::Bool(left.truthy() || right.truthy())),
        Operator::Coalesce => Ok(if left.is_empty() { right.clone() } else { left.clone() }),

        Operator::Dot => member(left, right),
        Operator::OptionalDot => {
            if left.is_null() {
                Ok(Value::Null)
            } else {
                member(left, right)
            }
        }
        Operator::Index => match right {
            Value::Number(n) => into_result(left.index(n)),
            other => member(left, other),
        },

        Operator::Not | Operator::Ternary | Operator::Spread => {
            Err(FormulaError::unsupported_operator(op.symbol()))
        }
    }
}

/// Prefix `!`
pub fn apply_not(value: &Value) -> Value {
    match value {
        Value::Error(e) => Value::Error(e.clone()),
        v => Value::Bool(!v.truthy()),
    }
}

/// Leading `-`
pub fn negate(value: &Value) -> Result<Value, FormulaError> {
    if let Value::Error(e) = value {
        return Err(e.clone());
    }
    Ok(Value::Number(value.coerce_number()?.neg()))
}

fn arithmetic(
    left: &Value,
    right: &Value,
    f: impl Fn(&Number, &Number) -> Result<Number, FormulaError>,
) -> Result<Value, FormulaError> {
    let a = left.coerce_number()?;
    let b = right.coerce_number()?;
    f(&a, &b).map(Value::Number)
}

fn member(left: &Value, key: &Value) -> Result<Value, FormulaError> {
    into_result(left.get(&key.to_string()))
}

fn into_result(value: Value) -> Result<Value, FormulaError> {
    match value {
        Value::Error(e) => Err(e),
        v => Ok(v),
    }
}
