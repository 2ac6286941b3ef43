//! Date functions built on chrono
//!
//! Dates are naive (no time zone): the surrounding forms store calendar
//! dates and local times. NOW() and TODAY() read the clock captured in the
//! evaluation context, so every call in one evaluation agrees.

use tbl_plugin::prelude::*;
use crate::helpers::{require_datetime, extract_int, text_of};
use chrono::{Datelike, Days, Months, NaiveDateTime, NaiveTime};
use chrono::format::{Item, StrftimeItems};
use std::fmt::Write;

pub struct Now;
pub struct Today;
pub struct DateDiff;
pub struct FormatDate;
pub struct AddDays;
pub struct AddMonths;
pub struct Year;
pub struct Month;
pub struct Day;

static DATE_ARGS: [ArgMeta; 1] = [ArgMeta::required("date", "Date", "Date value or ISO text")];

static NOW_EXAMPLES: [&str; 1] = ["NOW() → 2024-03-01T08:30:00"];
static TODAY_EXAMPLES: [&str; 1] = ["TODAY() → 2024-03-01"];
static CLOCK_RELATED: [&str; 2] = ["NOW", "TODAY"];

static DATE_DIFF_ARGS: [ArgMeta; 3] = [
    ArgMeta::required("date1", "Date", "Later date"),
    ArgMeta::required("date2", "Date", "Earlier date"),
    ArgMeta::optional("unité", "Text", "days, weeks, hours, minutes or seconds", "days"),
];
static DATE_DIFF_EXAMPLES: [&str; 2] = [
    "DATE_DIFF(\"2024-03-10\", \"2024-03-01\") → 9",
    "DATE_DIFF({fin}, {début}, \"hours\")",
];
static DATE_DIFF_RELATED: [&str; 1] = ["ADD_DAYS"];

static FORMAT_DATE_ARGS: [ArgMeta; 2] = [
    ArgMeta::required("date", "Date", "Date to format"),
    ArgMeta::optional("format", "Text", "Pattern with YYYY, MM, DD, HH, mm, ss or strftime", "YYYY-MM-DD"),
];
static FORMAT_DATE_EXAMPLES: [&str; 2] = [
    "FORMAT_DATE(\"2024-03-01\", \"DD/MM/YYYY\") → \"01/03/2024\"",
    "FORMAT_DATE(NOW(), \"%A %d %B\")",
];

static ADD_DAYS_ARGS: [ArgMeta; 2] = [
    ArgMeta::required("date", "Date", "Start date"),
    ArgMeta::required("jours", "Number", "Days to add (negative subtracts)"),
];
static ADD_MONTHS_ARGS: [ArgMeta; 2] = [
    ArgMeta::required("date", "Date", "Start date"),
    ArgMeta::required("mois", "Number", "Months to add (negative subtracts)"),
];
static ADD_DAYS_EXAMPLES: [&str; 1] = ["ADD_DAYS(\"2024-02-28\", 2) → 2024-03-01"];
static ADD_MONTHS_EXAMPLES: [&str; 1] = ["ADD_MONTHS(\"2024-01-31\", 1) → 2024-02-29"];
static SHIFT_RELATED: [&str; 2] = ["ADD_DAYS", "ADD_MONTHS"];

static PART_EXAMPLES: [&str; 3] = ["YEAR(\"2024-03-01\") → 2024", "MONTH(\"2024-03-01\") → 3", "DAY(\"2024-03-01\") → 1"];
static PART_RELATED: [&str; 3] = ["YEAR", "MONTH", "DAY"];

fn no_args(name: &str, args: &[Value]) -> Result<(), FormulaError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(FormulaError::arg_count(name, 0, args.len()))
    }
}

impl FunctionPlugin for Now {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "NOW",
            description: "Current date and time",
            usage: "NOW()",
            args: &[],
            returns: "Date",
            examples: &NOW_EXAMPLES,
            category: "date",
            source: None,
            related: &CLOCK_RELATED,
        }
    }

    fn call(&self, args: &[Value], ctx: &EvalContext) -> Value {
        match no_args("NOW", args) {
            Ok(()) => Value::DateTime(ctx.now),
            Err(e) => Value::Error(e),
        }
    }
}

impl FunctionPlugin for Today {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "TODAY",
            description: "Current date without the time of day",
            usage: "TODAY()",
            args: &[],
            returns: "Date",
            examples: &TODAY_EXAMPLES,
            category: "date",
            source: None,
            related: &CLOCK_RELATED,
        }
    }

    fn call(&self, args: &[Value], ctx: &EvalContext) -> Value {
        match no_args("TODAY", args) {
            Ok(()) => Value::DateTime(ctx.now.date().and_time(NaiveTime::MIN)),
            Err(e) => Value::Error(e),
        }
    }
}

impl FunctionPlugin for DateDiff {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "DATE_DIFF",
            description: "Difference date1 - date2, in whole days by default",
            usage: "DATE_DIFF(date1, date2)",
            args: &DATE_DIFF_ARGS,
            returns: "Number",
            examples: &DATE_DIFF_EXAMPLES,
            category: "date",
            source: None,
            related: &DATE_DIFF_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        if args.len() < 2 || args.len() > 3 {
            return Value::Error(FormulaError::arg_count("DATE_DIFF", 3, args.len()));
        }
        let (d1, d2) = match (
            require_datetime(&args[0], "DATE_DIFF", "date1"),
            require_datetime(&args[1], "DATE_DIFF", "date2"),
        ) {
            (Ok(a), Ok(b)) => (a, b),
            (Err(e), _) | (_, Err(e)) => return Value::Error(e),
        };
        let unit = match args.get(2) {
            None | Some(Value::Null) => "days".to_string(),
            Some(v) => match text_of(v, "DATE_DIFF", "unité") {
                Ok(s) => s.trim().to_lowercase(),
                Err(e) => return Value::Error(e),
            },
        };
        let delta = d1 - d2;
        let amount = match unit.as_str() {
            "days" | "day" | "jours" | "jour" => delta.num_days(),
            "weeks" | "week" | "semaines" | "semaine" => delta.num_weeks(),
            "hours" | "hour" | "heures" | "heure" => delta.num_hours(),
            "minutes" | "minute" => delta.num_minutes(),
            "seconds" | "second" | "secondes" | "seconde" => delta.num_seconds(),
            other => {
                return Value::Error(FormulaError::arg_type("DATE_DIFF", "unité", "days|weeks|hours|minutes|seconds", other))
            }
        };
        Value::Number(Number::from_i64(amount))
    }
}

/// Translate `DD/MM/YYYY` style patterns to strftime; `%` patterns pass through
fn to_strftime(pattern: &str) -> String {
    if pattern.contains('%') {
        return pattern.to_string();
    }
    const TOKENS: [(&str, &str); 7] = [
        ("YYYY", "%Y"), ("YY", "%y"), ("MM", "%m"), ("DD", "%d"),
        ("HH", "%H"), ("mm", "%M"), ("ss", "%S"),
    ];
    let mut out = String::new();
    let mut rest = pattern;
    'outer: while !rest.is_empty() {
        for (token, spec) in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(spec);
                rest = tail;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

fn format_date(dt: &NaiveDateTime, pattern: &str) -> Result<String, FormulaError> {
    let spec = to_strftime(pattern);
    if StrftimeItems::new(&spec).any(|item| matches!(item, Item::Error)) {
        return Err(FormulaError::arg_type("FORMAT_DATE", "format", "date pattern", pattern));
    }
    let mut out = String::new();
    write!(out, "{}", dt.format(&spec))
        .map_err(|_| FormulaError::arg_type("FORMAT_DATE", "format", "date pattern", pattern))?;
    Ok(out)
}

impl FunctionPlugin for FormatDate {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "FORMAT_DATE",
            description: "Format a date with a pattern",
            usage: "FORMAT_DATE(date, format)",
            args: &FORMAT_DATE_ARGS,
            returns: "Text",
            examples: &FORMAT_DATE_EXAMPLES,
            category: "date",
            source: None,
            related: &[],
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        if args.is_empty() || args.len() > 2 {
            return Value::Error(FormulaError::arg_count("FORMAT_DATE", 2, args.len()));
        }
        if args[0].is_null() {
            return Value::Null;
        }
        let dt = match require_datetime(&args[0], "FORMAT_DATE", "date") {
            Ok(dt) => dt,
            Err(e) => return Value::Error(e),
        };
        let pattern = match args.get(1) {
            None | Some(Value::Null) => "YYYY-MM-DD".to_string(),
            Some(v) => match text_of(v, "FORMAT_DATE", "format") {
                Ok(s) => s,
                Err(e) => return Value::Error(e),
            },
        };
        match format_date(&dt, &pattern) {
            Ok(s) => Value::Text(s),
            Err(e) => Value::Error(e),
        }
    }
}

/// Shared argument handling for ADD_DAYS and ADD_MONTHS
fn shift(name: &str, amount_arg: &str, args: &[Value]) -> Result<(NaiveDateTime, i64), FormulaError> {
    if args.len() != 2 {
        return Err(FormulaError::arg_count(name, 2, args.len()));
    }
    let dt = require_datetime(&args[0], name, "date")?;
    let amount = extract_int(&args[1], name, amount_arg)?;
    Ok((dt, amount))
}

impl FunctionPlugin for AddDays {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "ADD_DAYS",
            description: "Add a number of days to a date",
            usage: "ADD_DAYS(date, jours)",
            args: &ADD_DAYS_ARGS,
            returns: "Date",
            examples: &ADD_DAYS_EXAMPLES,
            category: "date",
            source: None,
            related: &SHIFT_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        let (dt, days) = match shift("ADD_DAYS", "jours", args) {
            Ok(v) => v,
            Err(e) => return Value::Error(e),
        };
        let date = if days >= 0 {
            dt.date().checked_add_days(Days::new(days.unsigned_abs()))
        } else {
            dt.date().checked_sub_days(Days::new(days.unsigned_abs()))
        };
        match date {
            Some(d) => Value::DateTime(d.and_time(dt.time())),
            None => Value::Error(FormulaError::invalid_date("ADD_DAYS() result out of range")),
        }
    }
}

impl FunctionPlugin for AddMonths {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "ADD_MONTHS",
            description: "Add a number of months to a date, clamping to the month's last day",
            usage: "ADD_MONTHS(date, mois)",
            args: &ADD_MONTHS_ARGS,
            returns: "Date",
            examples: &ADD_MONTHS_EXAMPLES,
            category: "date",
            source: None,
            related: &SHIFT_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        let (dt, months) = match shift("ADD_MONTHS", "mois", args) {
            Ok(v) => v,
            Err(e) => return Value::Error(e),
        };
        let count = match u32::try_from(months.unsigned_abs()) {
            Ok(c) => Months::new(c),
            Err(_) => return Value::Error(FormulaError::invalid_date("ADD_MONTHS() month count too large")),
        };
        let date = if months >= 0 {
            dt.date().checked_add_months(count)
        } else {
            dt.date().checked_sub_months(count)
        };
        match date {
            Some(d) => Value::DateTime(d.and_time(dt.time())),
            None => Value::Error(FormulaError::invalid_date("ADD_MONTHS() result out of range")),
        }
    }
}

/// Shared body of YEAR, MONTH and DAY
fn date_part(name: &str, args: &[Value], part: impl Fn(&NaiveDateTime) -> i64) -> Value {
    if args.len() != 1 {
        return Value::Error(FormulaError::arg_count(name, 1, args.len()));
    }
    if args[0].is_null() {
        return Value::Null;
    }
    match require_datetime(&args[0], name, "date") {
        Ok(dt) => Value::Number(Number::from_i64(part(&dt))),
        Err(e) => Value::Error(e),
    }
}

impl FunctionPlugin for Year {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "YEAR",
            description: "Year of a date",
            usage: "YEAR(date)",
            args: &DATE_ARGS,
            returns: "Number",
            examples: &PART_EXAMPLES,
            category: "date",
            source: None,
            related: &PART_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        date_part("YEAR", args, |dt| dt.year() as i64)
    }
}

impl FunctionPlugin for Month {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "MONTH",
            description: "Month of a date (1-12)",
            usage: "MONTH(date)",
            args: &DATE_ARGS,
            returns: "Number",
            examples: &PART_EXAMPLES,
            category: "date",
            source: None,
            related: &PART_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        date_part("MONTH", args, |dt| dt.month() as i64)
    }
}

impl FunctionPlugin for Day {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta {
            name: "DAY",
            description: "Day of the month of a date (1-31)",
            usage: "DAY(date)",
            args: &DATE_ARGS,
            returns: "Number",
            examples: &PART_EXAMPLES,
            category: "date",
            source: None,
            related: &PART_RELATED,
        }
    }

    fn call(&self, args: &[Value], _ctx: &EvalContext) -> Value {
        date_part("DAY", args, |dt| dt.day() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(8, 30, 0).unwrap()
    }

    fn eval_ctx() -> EvalContext {
        EvalContext::new(std::sync::Arc::new(PluginRegistry::new())).with_now(fixed_now())
    }

    #[test]
    fn test_now_and_today_use_context_clock() {
        assert_eq!(Now.call(&[], &eval_ctx()).to_string(), "2024-03-01T08:30:00");
        assert_eq!(Today.call(&[], &eval_ctx()).to_string(), "2024-03-01");
        assert!(Now.call(&[Value::from(1)], &eval_ctx()).is_error());
    }

    #[test]
    fn test_date_diff() {
        let args = vec![Value::from("2024-03-10"), Value::from("2024-03-01")];
        assert_eq!(DateDiff.call(&args, &eval_ctx()).to_string(), "9");
        let args = vec![Value::from("2024-03-01"), Value::from("2024-03-10")];
        assert_eq!(DateDiff.call(&args, &eval_ctx()).to_string(), "-9");
        let args = vec![Value::from("2024-03-02"), Value::from("2024-03-01"), Value::from("hours")];
        assert_eq!(DateDiff.call(&args, &eval_ctx()).to_string(), "24");
        let args = vec![Value::from("2024-03-02"), Value::from("2024-03-01"), Value::from("eons")];
        assert!(DateDiff.call(&args, &eval_ctx()).is_error());
    }

    #[test]
    fn test_format_date() {
        let args = vec![Value::from("2024-03-01"), Value::from("DD/MM/YYYY")];
        assert_eq!(FormatDate.call(&args, &eval_ctx()).as_text(), Some("01/03/2024"));
        let args = vec![Value::DateTime(fixed_now()), Value::from("HH:mm")];
        assert_eq!(FormatDate.call(&args, &eval_ctx()).as_text(), Some("08:30"));
        let args = vec![Value::from("2024-03-01"), Value::from("%Y")];
        assert_eq!(FormatDate.call(&args, &eval_ctx()).as_text(), Some("2024"));
    }

    #[test]
    fn test_format_date_rejects_bad_strftime() {
        let args = vec![Value::from("2024-03-01"), Value::from("%Q")];
        assert!(FormatDate.call(&args, &eval_ctx()).is_error());
    }

    #[test]
    fn test_add_days_and_months() {
        let args = vec![Value::from("2024-02-28"), Value::from(2)];
        assert_eq!(AddDays.call(&args, &eval_ctx()).to_string(), "2024-03-01");
        let args = vec![Value::from("2024-03-01"), Value::from(-1)];
        assert_eq!(AddDays.call(&args, &eval_ctx()).to_string(), "2024-02-29");
        let args = vec![Value::from("2024-01-31"), Value::from(1)];
        assert_eq!(AddMonths.call(&args, &eval_ctx()).to_string(), "2024-02-29");
    }

    #[test]
    fn test_date_parts() {
        let d = vec![Value::from("2024-03-07")];
        assert_eq!(Year.call(&d, &eval_ctx()).to_string(), "2024");
        assert_eq!(Month.call(&d, &eval_ctx()).to_string(), "3");
        assert_eq!(Day.call(&d, &eval_ctx()).to_string(), "7");
        assert!(Year.call(&[Value::from("soon")], &eval_ctx()).is_error());
    }
}
