//! TBL Standard Library
//!
//! The built-in functions offered by the formula palette, grouped in the
//! same families: conditional, math, text, date, type checks, lookup and
//! constants. Every function follows the never-panic rule and returns
//! `Value::Error` on bad input.

pub mod functions;
mod helpers;

use tbl_plugin::PluginRegistry;

/// Load standard library into registry
pub fn load_standard_library(registry: PluginRegistry) -> PluginRegistry {
    registry
        // Conditional
        .with_function(functions::If)
        .with_function(functions::Switch)
        .with_function(functions::Case)
        .with_function(functions::Ifs)
        // Math
        .with_function(functions::Round)
        .with_function(functions::Min)
        .with_function(functions::Max)
        .with_function(functions::Sum)
        .with_function(functions::Average)
        .with_function(functions::Abs)
        .with_function(functions::Ceiling)
        .with_function(functions::Floor)
        .with_function(functions::Power)
        .with_function(functions::Sqrt)
        .with_function(functions::Mod)
        // Text
        .with_function(functions::Length)
        .with_function(functions::Concat)
        .with_function(functions::Upper)
        .with_function(functions::Lower)
        .with_function(functions::Trim)
        .with_function(functions::Substring)
        .with_function(functions::Replace)
        // Date
        .with_function(functions::Now)
        .with_function(functions::Today)
        .with_function(functions::DateDiff)
        .with_function(functions::FormatDate)
        .with_function(functions::AddDays)
        .with_function(functions::AddMonths)
        .with_function(functions::Year)
        .with_function(functions::Month)
        .with_function(functions::Day)
        // Type checks
        .with_function(functions::IS_EMPTY)
        .with_function(functions::IS_NULL)
        .with_function(functions::IS_NUMBER)
        .with_function(functions::IS_TEXT)
        .with_function(functions::IS_BOOLEAN)
        .with_function(functions::IS_DATE)
        // Lookup and aggregation
        .with_function(functions::Lookup)
        .with_function(functions::Index)
        .with_function(functions::Filter)
        .with_function(functions::Count)
        .with_function(functions::In)
        .with_function(functions::Distinct)
        // Constants
        .with_function(functions::TRUE)
        .with_function(functions::FALSE)
        .with_function(functions::NULL)
        .with_function(functions::BLANK)
        .with_function(functions::PI)
        .with_function(functions::E)
}

/// Create registry with standard library
pub fn standard_registry() -> PluginRegistry {
    load_standard_library(PluginRegistry::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tbl_core::Value;
    use tbl_plugin::EvalContext;

    const PALETTE: [&str; 48] = [
        "IF", "SWITCH", "CASE", "IFS",
        "ROUND", "MIN", "MAX", "SUM", "AVERAGE", "ABS", "CEILING", "FLOOR", "POWER", "SQRT", "MOD",
        "LENGTH", "CONCAT", "UPPER", "LOWER", "TRIM", "SUBSTRING", "REPLACE",
        "NOW", "TODAY", "DATE_DIFF", "FORMAT_DATE", "ADD_DAYS", "ADD_MONTHS", "YEAR", "MONTH", "DAY",
        "IS_EMPTY", "IS_NULL", "IS_NUMBER", "IS_TEXT", "IS_BOOLEAN", "IS_DATE",
        "LOOKUP", "INDEX", "FILTER", "COUNT", "IN", "DISTINCT",
        "TRUE", "FALSE", "NULL", "BLANK", "PI",
    ];

    #[test]
    fn test_every_palette_function_is_registered() {
        let registry = standard_registry();
        for name in PALETTE {
            assert!(registry.contains(name), "missing {}", name);
        }
        assert!(registry.contains("e"));
        assert_eq!(registry.len(), PALETTE.len() + 1);
    }

    #[test]
    fn test_usage_matches_palette_template() {
        let registry = standard_registry();
        let round = registry.get_function("round").unwrap().meta();
        assert_eq!(round.usage, "ROUND(valeur, décimales)");
        assert_eq!(round.required_args(), 1);
    }

    #[test]
    fn test_call_through_registry() {
        let registry = Arc::new(standard_registry());
        let ctx = EvalContext::new(registry.clone());
        let result = ctx.call_function("Sum", &[Value::from(2), Value::from(3)]);
        assert_eq!(result.to_string(), "5");
    }

    #[test]
    fn test_list_by_category() {
        let registry = standard_registry();
        let math = registry.list_functions(Some("math"));
        assert_eq!(math.as_list().map(|l| l.len()), Some(11));
    }
}
