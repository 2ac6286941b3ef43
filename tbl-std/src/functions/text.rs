//! Text functions: length, case, trimming, slicing, replacement

use tbl_plugin::prelude::*;
use crate::helpers::{text_of, extract_int, extract_int_or, flatten, normalize_index};

pub struct Length;
pub struct Concat;
pub struct Upper;
pub struct Lower;
pub struct Trim;
pub struct Substring;
pub struct Replace;

static TEXT_ARGS: [ArgMeta; 1] = [ArgMeta::required("texte", "Text", "Text to process")];

static LENGTH_EXAMPLES: [&str; 2] = ["LENGTH(\"café\") → 4", "LENGTH({tags}) → number of selected tags"];
static LENGTH_RELATED: [&str; 2] = ["SUBSTRING", "COUNT"];

static CONCAT_ARGS: [ArgMeta; 1] = [ArgMeta::required("valeurs", "Any...", "Values to join")];
static CONCAT_EXAMPLES: [&str; 1] = ["CONCAT(\"Mr \", {nom}) → \"Mr Dupont\""];
static CONCAT_RELATED: [&str; 1] = ["REPLACE"];

static UPPER_EXAMPLES: [&str; 1] = ["UPPER(\"café\") → \"CAFÉ\""];
static LOWER_EXAMPLES: [&str; 1] = ["LOWER(\"CAFÉ\") → \"café\""];
static CASE_RELATED: [&str; 2] = ["UPPER", "LOWER"];

static TRIM_EXAMPLES: [&str; 1] = ["TRIM(\"  a b  \") → \"a b\""];

static SUBSTRING_ARGS: [ArgMeta; 3] = [
    ArgMeta::required("texte", "Text", "Source text"),
    ArgMeta::required("début", "Number", "Zero-based start (negative counts from the end)"),
    ArgMeta::optional("longueur", "Number", "Number of characters", "rest of text"),
];
static SUBSTRING_EXAMPLES: [&str; 2] = ["SUBSTRING(\"Bonjour\", 0, 3) → \"Bon\"", "SUBSTRING(\"Bonjour\", -4) → \"jour\""];
static SUBSTRING_RELATED: [&str; 1] = ["LENGTH"];

static REPLACE_ARGS: [ArgMeta; 3] = [
    ArgMeta::required("texte", "Text", "Source text"),
    ArgMeta::required("ancien", "Text", "Text to find"),
    ArgMeta::required("nouveau", "Text", "Replacement"),
];
static REPLACE_EXAMPLES: [&str; 1] = ["REPLACE(\"a-b-c\", \"-\", \"/\") → \"a/b/c\""];
static REPLACE_RELATED: [&str; 1] = ["CONCAT"];

/// One-argument text transform with null propagation
fn map_text(name: &str, args: &[Value], f: impl Fn(&str) -> String) -> Value {
    if args.len() != 1 {
        return Value::Error(FormulaError::arg_count(name, 1, args.len()));
    }
    if args[0].is_null() {
        return Value::Null;
    }
    match text_of(&args[0], name, "texte") {
        Ok(s) => Value::Text(f(&s)),
        Err(e) => Value::Error(e),
    }
}

impl FunctionPlugin for Length {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "LENGTH",
            description: "Number of characters in a text, or of items in a list",
            usage: "LENGTH(texte)",
            args: &TEXT_ARGS,
            returns: "Number",
            examples: &LENGTH_EXAMPLES,
            category: "text",
            source: None,
            related: &LENGTH_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        if args.len() != 1 {
            return Value::Error(FormulaError::arg_count("LENGTH", 1, args.len()));
        }
        match &args[0] {
            Value::List(items) => Value::Number(Number::from_i64(items.len() as i64)),
            other => match text_of(other, "LENGTH", "texte") {
                Ok(s) => Value::Number(Number::from_i64(s.chars().count() as i64)),
                Err(e) => Value::Error(e),
            },
        }
    }
}

impl FunctionPlugin for Concat {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "CONCAT",
            description: "Join values into one text",
            usage: "CONCAT(valeurs...)",
            args: &CONCAT_ARGS,
            returns: "Text",
            examples: &CONCAT_EXAMPLES,
            category: "text",
            source: None,
            related: &CONCAT_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        let items = match flatten(args) {
            Ok(items) => items,
            Err(e) => return Value::Error(e),
        };
        let mut out = String::new();
        for item in &items {
            match text_of(item, "CONCAT", "valeurs") {
                Ok(s) => out.push_str(&s),
                Err(e) => return Value::Error(e),
            }
        }
        Value::Text(out)
    }
}

impl FunctionPlugin for Upper {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "UPPER",
            description: "Convert text to uppercase",
            usage: "UPPER(texte)",
            args: &TEXT_ARGS,
            returns: "Text",
            examples: &UPPER_EXAMPLES,
            category: "text",
            source: None,
            related: &CASE_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        map_text("UPPER", args, |s| s.to_uppercase())
    }
}

impl FunctionPlugin for Lower {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "LOWER",
            description: "Convert text to lowercase",
            usage: "LOWER(texte)",
            args: &TEXT_ARGS,
            returns: "Text",
            examples: &LOWER_EXAMPLES,
            category: "text",
            source: None,
            related: &CASE_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        map_text("LOWER", args, |s| s.to_lowercase())
    }
}

impl FunctionPlugin for Trim {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "TRIM",
            description: "Remove leading and trailing whitespace",
            usage: "TRIM(texte)",
            args: &TEXT_ARGS,
            returns: "Text",
            examples: &TRIM_EXAMPLES,
            category: "text",
            source: None,
            related: &[],
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        map_text("TRIM", args, |s| s.trim().to_string())
    }
}

impl FunctionPlugin for Substring {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "SUBSTRING",
            description: "Extract part of a text by character position",
            usage: "SUBSTRING(texte, début, longueur)",
            args: &SUBSTRING_ARGS,
            returns: "Text",
            examples: &SUBSTRING_EXAMPLES,
            category: "text",
            source: None,
            related: &SUBSTRING_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        if args.len() < 2 || args.len() > 3 {
            return Value::Error(FormulaError::arg_count("SUBSTRING", 3, args.len()));
        }
        let text = match text_of(&args[0], "SUBSTRING", "texte") {
            Ok(s) => s,
            Err(e) => return Value::Error(e),
        };
        let chars: Vec<char> = text.chars().collect();
        let start = match extract_int(&args[1], "SUBSTRING", "début") {
            Ok(i) => normalize_index(i, chars.len()),
            Err(e) => return Value::Error(e),
        };
        let remaining = (chars.len() - start) as i64;
        let len = match extract_int_or(args, 2, remaining, "SUBSTRING", "longueur") {
            Ok(l) if l < 0 => {
                return Value::Error(FormulaError::domain_error("SUBSTRING(): longueur must be >= 0"))
            }
            Ok(l) => l.min(remaining) as usize,
            Err(e) => return Value::Error(e),
        };
        Value::Text(chars[start..start + len].iter().collect())
    }
}

impl FunctionPlugin for Replace {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "REPLACE",
            description: "Replace every occurrence of a text by another",
            usage: "REPLACE(texte, ancien, nouveau)",
            args: &REPLACE_ARGS,
            returns: "Text",
            examples: &REPLACE_EXAMPLES,
            category: "text",
            source: None,
            related: &REPLACE_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        if args.len() != 3 {
            return Value::Error(FormulaError::arg_count("REPLACE", 3, args.len()));
        }
        let parts: Result<Vec<String>, FormulaError> = args.iter()
            .zip(["texte", "ancien", "nouveau"])
            .map(|(v, name)| text_of(v, "REPLACE", name))
            .collect();
        match parts {
            Ok(p) if p[1].is_empty() => Value::Text(p[0].clone()),
            Ok(p) => Value::Text(p[0].replace(&p[1], &p[2])),
            Err(e) => Value::Error(e),
        }
    }
}
