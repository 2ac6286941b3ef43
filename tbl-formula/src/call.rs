//! Function call text
//!
//! Function tokens carry their call as text, e.g. `ROUND(valeur, 2)`.
//! Arguments are literals, `{fieldId}` references, nested calls, or bare
//! names. A bare name is a placeholder bound to a value that precedes the
//! function token in its sequence; `...` or a name ending in `...` takes
//! every remaining value.

use serde::Serialize;
use tbl_core::{FormulaError, Number};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallExpr {
    pub name: String,
    pub args: Vec<CallArg>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CallArg {
    Number(Number),
    Text(String),
    Bool(bool),
    Null,
    /// `{fieldId}`
    Field(String),
    Call(CallExpr),
    Placeholder(String),
    Variadic(String),
}

impl CallExpr {
    /// Placeholders anywhere in the call tree, nested calls included
    pub fn placeholder_count(&self) -> usize {
        self.args.iter().map(|a| match a {
            CallArg::Placeholder(_) => 1,
            CallArg::Call(inner) => inner.placeholder_count(),
            _ => 0,
        }).sum()
    }

    pub fn has_variadic(&self) -> bool {
        self.args.iter().any(|a| match a {
            CallArg::Variadic(_) => true,
            CallArg::Call(inner) => inner.has_variadic(),
            _ => false,
        })
    }

    /// Field ids referenced with `{...}` anywhere in the call tree
    pub fn field_refs(&self) -> Vec<String> {
        let mut out = Vec::new();
        for arg in &self.args {
            match arg {
                CallArg::Field(id) => out.push(id.clone()),
                CallArg::Call(inner) => out.extend(inner.field_refs()),
                _ => {}
            }
        }
        out
    }
}

/// Parse call text. A bare name without parentheses is a call with no arguments.
pub fn parse_call(text: &str) -> Result<CallExpr, FormulaError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(FormulaError::parse_error("Empty function call"));
    }

    let Some(open) = text.find('(') else {
        check_name(text)?;
        return Ok(CallExpr { name: text.to_string(), args: Vec::new() });
    };

    let name = text[..open].trim();
    check_name(name)?;
    let Some(inner) = text[open + 1..].strip_suffix(')') else {
        return Err(FormulaError::parse_error(format!("Missing closing parenthesis in '{}'", text)));
    };

    let args = split_args(inner)?
        .into_iter()
        .map(parse_arg)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CallExpr { name: name.to_string(), args })
}

fn check_name(name: &str) -> Result<(), FormulaError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => chars.all(|c| c.is_alphanumeric() || c == '_'),
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(FormulaError::parse_error(format!("Invalid function name '{}'", name)))
    }
}

/// Split at top-level commas, respecting quotes, parentheses, brackets and braces
fn split_args(input: &str) -> Result<Vec<&str>, FormulaError> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut args = Vec::new();
    let mut depth = 0i32;
    let mut in_double_quote = false;
    let mut in_single_quote = false;
    let mut current_start = 0;

    for (byte_pos, c) in input.char_indices() {
        match c {
            '"' if !in_single_quote => in_double_quote = !in_double_quote,
            '\'' if !in_double_quote => in_single_quote = !in_single_quote,
            '(' | '[' | '{' if !in_double_quote && !in_single_quote => depth += 1,
            ')' | ']' | '}' if !in_double_quote && !in_single_quote => {
                depth -= 1;
                if depth < 0 {
                    return Err(FormulaError::parse_error(format!("Unbalanced '{}' in arguments", c)));
                }
            }
            ',' if depth == 0 && !in_double_quote && !in_single_quote => {
                args.push(&input[current_start..byte_pos]);
                current_start = byte_pos + c.len_utf8();
            }
            _ => {}
        }
    }

    if depth != 0 || in_double_quote || in_single_quote {
        return Err(FormulaError::parse_error("Unterminated argument list"));
    }
    args.push(&input[current_start..]);
    Ok(args)
}

fn parse_arg(raw: &str) -> Result<CallArg, FormulaError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(FormulaError::parse_error("Empty argument"));
    }

    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return Ok(CallArg::Text(s[1..s.len() - 1].to_string()));
        }
    }

    if let Some(id) = s.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
        let id = id.trim();
        if id.is_empty() {
            return Err(FormulaError::parse_error("Empty field reference {}"));
        }
        return Ok(CallArg::Field(id.to_string()));
    }

    if s == "..." {
        return Ok(CallArg::Variadic(s.to_string()));
    }
    if let Some(name) = s.strip_suffix("...") {
        return Ok(CallArg::Variadic(name.trim().to_string()));
    }

    match s.to_lowercase().as_str() {
        "true" => return Ok(CallArg::Bool(true)),
        "false" => return Ok(CallArg::Bool(false)),
        "null" => return Ok(CallArg::Null),
        _ => {}
    }

    if let Some(n) = Number::parse_numeric(s) {
        return Ok(CallArg::Number(n));
    }

    if s.contains('(') {
        return parse_call(s).map(CallArg::Call);
    }

    if s.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Ok(CallArg::Placeholder(s.to_string()));
    }

    Err(FormulaError::parse_error(format!("Cannot read argument '{}'", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_and_literals() {
        let call = parse_call("ROUND(valeur, 2)").unwrap();
        assert_eq!(call.name, "ROUND");
        assert_eq!(call.args[0], CallArg::Placeholder("valeur".into()));
        assert_eq!(call.args[1], CallArg::Number(Number::from_i64(2)));
        assert_eq!(call.placeholder_count(), 1);
        assert!(!call.has_variadic());
    }

    #[test]
    fn test_variadic() {
        let call = parse_call("MIN(valeur1, valeur2, ...)").unwrap();
        assert_eq!(call.placeholder_count(), 2);
        assert!(call.has_variadic());
        assert!(parse_call("SUM(valeurs...)").unwrap().has_variadic());
    }

    #[test]
    fn test_quoted_commas_and_nested_calls() {
        let call = parse_call("CONCAT(\"a, b\", UPPER({nom}), 'x')").unwrap();
        assert_eq!(call.args.len(), 3);
        assert_eq!(call.args[0], CallArg::Text("a, b".into()));
        match &call.args[1] {
            CallArg::Call(inner) => {
                assert_eq!(inner.name, "UPPER");
                assert_eq!(inner.args, vec![CallArg::Field("nom".into())]);
            }
            other => panic!("expected nested call, got {:?}", other),
        }
        assert_eq!(call.field_refs(), vec!["nom"]);
    }

    #[test]
    fn test_bare_name_and_empty_args() {
        assert_eq!(parse_call("NOW").unwrap().args.len(), 0);
        assert_eq!(parse_call("TODAY()").unwrap().args.len(), 0);
    }

    #[test]
    fn test_malformed_calls() {
        assert!(parse_call("ROUND(valeur, 2").is_err());
        assert!(parse_call("ROUND(a,,b)").is_err());
        assert!(parse_call("1ROUND(a)").is_err());
        assert!(parse_call("").is_err());
    }
}
