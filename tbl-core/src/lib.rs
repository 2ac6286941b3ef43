//! TBL Core - Fundamental types
//!
//! This crate provides the core types used throughout the formula engine:
//! - `Number`: Arbitrary precision decimal numbers
//! - `Value`: Runtime values (numbers, text, dates, lists, the empty sentinel, errors)
//! - `FormulaError`: Structured, coded errors

mod number;
mod value;
mod error;

pub use number::{Number, NumberError, DEFAULT_PRECISION};
pub use value::{Value, parse_datetime};
pub use error::{FormulaError, ErrorContext, Severity, codes};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{Number, Value, FormulaError, Severity};
    pub use crate::error::codes;
}

#[cfg(test)]
mod tests {
    use super::*;

    mod number_tests {
        use super::*;

        #[test]
        fn test_from_i64() {
            let n = Number::from_i64(42);
            assert_eq!(n.to_i64(), Some(42));
        }

        #[test]
        fn test_from_str_integer() {
            let n = Number::from_str("123").unwrap();
            assert_eq!(n.to_i64(), Some(123));
        }

        #[test]
        fn test_from_str_leading_plus() {
            let n = Number::from_str("+7").unwrap();
            assert_eq!(n.to_i64(), Some(7));
        }

        #[test]
        fn test_from_str_decimal() {
            let n = Number::from_str("3.14").unwrap();
            assert!(!n.is_integer());
            assert_eq!(n.to_string(), "3.14");
        }

        #[test]
        fn test_from_str_scientific() {
            let n = Number::from_str("1.5e2").unwrap();
            assert_eq!(n.to_i64(), Some(150));
        }

        #[test]
        fn test_from_str_rejects_text() {
            assert!(Number::from_str("abc").is_err());
            assert!(Number::from_str("").is_err());
        }

        #[test]
        fn test_parse_percent() {
            let n = Number::parse_numeric("15%").unwrap();
            assert_eq!(n.to_string(), "0.15");
            assert!(Number::is_percent_literal("15 %"));
            assert!(!Number::is_percent_literal("15"));
            assert!(Number::parse_numeric("   ").is_none());
            assert!(Number::parse_numeric("12abc").is_none());
        }

        #[test]
        fn test_arithmetic() {
            let a = Number::from_i64(5);
            let b = Number::from_i64(3);
            assert_eq!(a.add(&b).to_i64(), Some(8));
            assert_eq!(a.sub(&b).to_i64(), Some(2));
            assert_eq!(a.mul(&b).to_i64(), Some(15));
            assert_eq!(a.neg().to_i64(), Some(-5));
        }

        #[test]
        fn test_decimal_addition_is_exact() {
            let a = Number::from_str("0.1").unwrap();
            let b = Number::from_str("0.2").unwrap();
            assert_eq!(a.add(&b).to_string(), "0.3");
        }

        #[test]
        fn test_checked_div() {
            let a = Number::from_i64(10);
            let b = Number::from_i64(4);
            assert_eq!(a.checked_div(&b).unwrap().to_string(), "2.5");
        }

        #[test]
        fn test_div_by_zero() {
            let a = Number::from_i64(10);
            let zero = Number::from_i64(0);
            assert!(matches!(a.checked_div(&zero), Err(NumberError::DivisionByZero)));
        }

        #[test]
        fn test_rem_keeps_dividend_sign() {
            let r = Number::from_i64(-7).checked_rem(&Number::from_i64(3)).unwrap();
            assert_eq!(r.to_i64(), Some(-1));
            let r = Number::from_i64(7).checked_rem(&Number::from_i64(3)).unwrap();
            assert_eq!(r.to_i64(), Some(1));
        }

        #[test]
        fn test_pow() {
            assert_eq!(Number::from_i64(2).pow(10).to_i64(), Some(1024));
            assert_eq!(Number::from_i64(2).pow(-2).to_string(), "0.25");
        }

        #[test]
        fn test_pow_real_fractional() {
            let r = Number::from_i64(2).pow_real(&Number::from_str("0.5").unwrap(), 50).unwrap();
            let f = r.to_f64().unwrap();
            assert!((f - std::f64::consts::SQRT_2).abs() < 1e-10);
        }

        #[test]
        fn test_pow_real_negative_base() {
            let r = Number::from_i64(-8).pow_real(&Number::from_str("0.5").unwrap(), 50);
            assert!(matches!(r, Err(NumberError::DomainError(_))));
        }

        #[test]
        fn test_sqrt() {
            let n = Number::from_i64(16);
            assert_eq!(n.sqrt(50).unwrap().to_i64(), Some(4));
            assert!(Number::from_i64(-1).sqrt(50).is_err());
        }

        #[test]
        fn test_pi() {
            let pi = Number::pi(50);
            assert!((pi.to_f64().unwrap() - std::f64::consts::PI).abs() < 1e-12);
        }

        #[test]
        fn test_e() {
            let e = Number::e(50);
            assert!((e.to_f64().unwrap() - std::f64::consts::E).abs() < 1e-12);
        }

        #[test]
        fn test_round() {
            let n = Number::from_str("2.345").unwrap();
            assert_eq!(n.round(2).to_string(), "2.35");
            assert_eq!(Number::from_str("-2.5").unwrap().round(0).to_i64(), Some(-3));
            assert_eq!(Number::from_i64(1234).round(-2).to_i64(), Some(1200));
        }

        #[test]
        fn test_floor_ceil_to_multiple() {
            let seven = Number::from_i64(7);
            let five = Number::from_i64(5);
            assert_eq!(seven.floor_to(&five).unwrap().to_i64(), Some(5));
            assert_eq!(seven.ceil_to(&five).unwrap().to_i64(), Some(10));
        }

        #[test]
        fn test_abs() {
            assert_eq!(Number::from_i64(-42).abs().to_i64(), Some(42));
        }

        #[test]
        fn test_serialize_as_json_number() {
            let json = serde_json::to_value(Number::from_i64(8)).unwrap();
            assert_eq!(json, serde_json::json!(8));
            let json = serde_json::to_value(Number::parse_numeric("15%").unwrap()).unwrap();
            assert_eq!(json, serde_json::json!(0.15));
        }

        #[test]
        fn test_deserialize_from_number_or_text() {
            let n: Number = serde_json::from_value(serde_json::json!(12)).unwrap();
            assert_eq!(n.to_i64(), Some(12));
            let n: Number = serde_json::from_value(serde_json::json!("50%")).unwrap();
            assert_eq!(n.to_string(), "0.5");
        }
    }

    mod value_tests {
        use super::*;
        use chrono::NaiveDate;
        use pretty_assertions::assert_eq;
        use serde_json::json;

        #[test]
        fn test_type_name() {
            assert_eq!(Value::from(1).type_name(), "Number");
            assert_eq!(Value::from("x").type_name(), "Text");
            assert_eq!(Value::Null.type_name(), "Null");
        }

        #[test]
        fn test_sentinel_coerces_to_zero() {
            assert_eq!(Value::Null.coerce_number().unwrap().to_i64(), Some(0));
            assert_eq!(Value::from("").coerce_number().unwrap().to_i64(), Some(0));
            assert_eq!(Value::Null.to_string(), "");
            assert!(!Value::Null.truthy());
        }

        #[test]
        fn test_numeric_text_coerces() {
            assert_eq!(Value::from("42").coerce_number().unwrap().to_i64(), Some(42));
            assert_eq!(Value::from("15%").coerce_number().unwrap().to_string(), "0.15");
            assert_eq!(Value::from(true).coerce_number().unwrap().to_i64(), Some(1));
        }

        #[test]
        fn test_non_numeric_text_fails_coercion() {
            let err = Value::from("abc").coerce_number().unwrap_err();
            assert_eq!(err.code, codes::TYPE_COERCION);
        }

        #[test]
        fn test_truthy() {
            assert!(Value::from(1).truthy());
            assert!(!Value::from(0).truthy());
            assert!(Value::from("yes").truthy());
            assert!(!Value::from("false").truthy());
            assert!(!Value::List(vec![]).truthy());
        }

        #[test]
        fn test_loose_and_strict_equality() {
            assert!(Value::from("5").loosely_equals(&Value::from(5)));
            assert!(!Value::from("5").strictly_equals(&Value::from(5)));
            assert!(Value::from("abc").loosely_equals(&Value::from("abc")));
            assert!(!Value::from("abc").loosely_equals(&Value::from("ABC")));
            assert!(Value::Null.strictly_equals(&Value::Null));
        }

        #[test]
        fn test_compare() {
            use std::cmp::Ordering;
            assert_eq!(Value::from(20).compare(&Value::from(10)), Ordering::Greater);
            assert_eq!(Value::Null.compare(&Value::from(10)), Ordering::Less);
            assert_eq!(Value::from("10").compare(&Value::from(9)), Ordering::Greater);
            assert_eq!(Value::from("b").compare(&Value::from("a")), Ordering::Greater);
        }

        #[test]
        fn test_get_and_index() {
            let obj = Value::from_json(&json!({"selection": "gold", "extra": 3}));
            assert_eq!(obj.get("selection").to_string(), "gold");
            assert!(obj.get("missing").is_null());
            let list = Value::from_json(&json!(["a", "b"]));
            assert_eq!(list.index(&Number::from_i64(1)).to_string(), "b");
            assert!(list.index(&Number::from_i64(5)).is_null());
            assert!(Value::from(3).get("x").is_error());
        }

        #[test]
        fn test_json_round_trip() {
            let input = json!({"a": 1, "b": [true, "x", null], "c": 0.25});
            let value = Value::from_json(&input);
            assert_eq!(value.to_json(), input);
        }

        #[test]
        fn test_datetime_parse_and_display() {
            let v = Value::from("2024-03-01").coerce_datetime().unwrap();
            assert_eq!(v, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap());
            assert_eq!(Value::DateTime(v).to_string(), "2024-03-01");
            let v = parse_datetime("2024-03-01T08:30:00").unwrap();
            assert_eq!(Value::DateTime(v).to_string(), "2024-03-01T08:30:00");
            assert!(Value::from("not a date").coerce_datetime().is_err());
        }
    }

    mod error_tests {
        use super::*;

        #[test]
        fn test_error_construction() {
            let err = FormulaError::div_zero();
            assert_eq!(err.code, codes::DIV_ZERO);
            assert_eq!(err.severity, Severity::Error);
        }

        #[test]
        fn test_error_context_keeps_innermost() {
            let err = FormulaError::type_coercion("abc", "number")
                .at_token("t2")
                .at_token("t9")
                .in_formula("inner")
                .in_formula("outer");
            let ctx = err.context.unwrap();
            assert_eq!(ctx.token.as_deref(), Some("t2"));
            assert_eq!(ctx.formula.as_deref(), Some("inner"));
        }

        #[test]
        fn test_cycle_is_warning() {
            let err = FormulaError::cycle(&["a".to_string(), "b".to_string(), "a".to_string()]);
            assert!(err.is_warning());
            assert!(err.message.contains("a → b → a"));
        }

        #[test]
        fn test_error_display() {
            let err = FormulaError::div_zero();
            let s = format!("{}", err);
            assert!(s.contains("DIV_ZERO"));
            assert!(s.contains("Division by zero"));
        }

        #[test]
        fn test_from_number_error() {
            let err: FormulaError = NumberError::DivisionByZero.into();
            assert_eq!(err.code, codes::DIV_ZERO);
        }
    }
}
