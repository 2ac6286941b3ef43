//! Sequence evaluator
//!
//! Tokens are evaluated strictly left to right with no operator
//! precedence: each binary operator combines the value built so far with
//! the next operand. Function tokens take the values that immediately
//! precede them as placeholder arguments.
//!
//! Failures inside nested scopes (Cond arms, Switch cases, referenced
//! formulas) degrade to the empty value and are reported as warnings.
//! Failures in the top-level sequence fail the evaluation.

use crate::call::{parse_call, CallArg, CallExpr};
use crate::config::EngineConfig;
use crate::env::Environment;
use crate::lookup::FormulaLookup;
use crate::ops::{self, Operator};
use crate::token::*;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tbl_core::{codes, FormulaError, Number, Severity, Value};
use tbl_plugin::{EvalContext, PluginRegistry, TraceStep};
use tracing::{debug, trace, warn};

/// Outcome of evaluating one formula
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    pub success: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<FormulaError>,
    pub trace: Vec<TraceStep>,
    /// Recovered faults: cycles, missing formulas, degraded nested scopes
    pub warnings: Vec<FormulaError>,
}

impl EvaluationResult {
    pub(crate) fn failure(error: FormulaError, trace: Vec<TraceStep>, warnings: Vec<FormulaError>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.message.clone()),
            error_detail: Some(error),
            trace,
            warnings,
        }
    }

    /// Result value, the empty sentinel on failure
    pub fn value(&self) -> Value {
        self.result.clone().unwrap_or(Value::Null)
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error_detail.as_ref().map(|e| e.code.as_str())
    }

    /// True when a trace entry mentions `needle`
    pub fn traced(&self, needle: &str) -> bool {
        self.trace.iter().any(|s| s.operation.contains(needle))
    }
}

pub struct Evaluator {
    registry: Arc<PluginRegistry>,
    config: EngineConfig,
}

impl Evaluator {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self { registry, config: EngineConfig::default() }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn evaluate(&self, formula: &Formula, env: &Environment, lookup: &dyn FormulaLookup) -> EvaluationResult {
        self.evaluate_seeded(formula, env, lookup, HashMap::new())
    }

    /// Evaluate a bare sequence as an anonymous formula
    pub fn evaluate_sequence(&self, sequence: &[Token], env: &Environment, lookup: &dyn FormulaLookup) -> EvaluationResult {
        let formula = Formula::new("", sequence.to_vec());
        self.evaluate(&formula, env, lookup)
    }

    /// Evaluate with FormulaRef results already known for some ids
    pub(crate) fn evaluate_seeded(
        &self,
        formula: &Formula,
        env: &Environment,
        lookup: &dyn FormulaLookup,
        known: HashMap<String, Value>,
    ) -> EvaluationResult {
        debug!(formula_id = %formula.id, tokens = formula.sequence.len(), "evaluating formula");

        let structure = crate::validate::validate_sequence(&formula.sequence);
        for w in &structure.warnings {
            if self.config.strict_alternation {
                warn!(formula_id = %formula.id, path = %w.path, "{}", w.message);
            } else {
                debug!(formula_id = %formula.id, path = %w.path, "{}", w.message);
            }
        }

        let now = self.config.now.unwrap_or_else(|| chrono::Local::now().naive_local());
        let ctx = EvalContext::new(self.registry.clone())
            .with_precision(self.config.precision)
            .with_now(now);
        let mut run = Run {
            env,
            lookup,
            ctx,
            max_depth: self.config.max_depth,
            warnings: Vec::new(),
            cache: known,
        };

        let chain = vec![formula.id.clone()];
        let outcome = run.sequence(&formula.sequence, &chain, "sequence")
            .and_then(|v| v.ok_or_else(FormulaError::empty_formula));

        match outcome {
            Ok(value) => {
                debug!(formula_id = %formula.id, result = %value, steps = run.ctx.steps(), "formula evaluated");
                EvaluationResult {
                    success: true,
                    result: Some(value),
                    error: None,
                    error_detail: None,
                    trace: run.ctx.take_trace(),
                    warnings: run.warnings,
                }
            }
            Err(e) => {
                let e = e.in_formula(&formula.id);
                debug!(formula_id = %formula.id, error = %e, "formula failed");
                run.ctx.record_trace(format!("error: {}", e.message), Value::Error(e.clone()));
                EvaluationResult::failure(e, run.ctx.take_trace(), run.warnings)
            }
        }
    }
}

/// Preceding values taken by a function token, in sequence order.
/// `spread` of them go to the variadic slot; the rest fill placeholders.
struct Binding {
    values: VecDeque<Value>,
    spread: usize,
}

/// State of one evaluation
struct Run<'a> {
    env: &'a Environment,
    lookup: &'a dyn FormulaLookup,
    ctx: EvalContext,
    max_depth: usize,
    warnings: Vec<FormulaError>,
    /// FormulaRef results computed during this run
    cache: HashMap<String, Value>,
}

impl Run<'_> {
    /// Evaluate a sequence. `None` means it held no operand at all.
    fn sequence(&mut self, tokens: &[Token], chain: &[String], path: &str) -> Result<Option<Value>, FormulaError> {
        let mut stack: Vec<Value> = Vec::new();
        let mut pending: Option<Operator> = None;
        let mut negate_next = false;
        let mut invert_next = false;

        for (i, token) in tokens.iter().enumerate() {
            let here = format!("{}[{}]", path, i);

            if let Token::Operator(op_token) = token {
                let op = op_token.operator().ok_or_else(|| {
                    FormulaError::unsupported_operator(&op_token.value).at_token(&op_token.id).at_path(&here)
                })?;
                if !op.is_supported() {
                    return Err(FormulaError::unsupported_operator(op.symbol()).at_token(&op_token.id).at_path(&here));
                }
                if op.is_prefix() {
                    invert_next = !invert_next;
                    self.ctx.record_trace("operator !", Value::Null);
                    continue;
                }
                if stack.is_empty() && pending.is_none() {
                    if op == Operator::Sub {
                        negate_next = !negate_next;
                        self.ctx.record_trace("operator - (negation)", Value::Null);
                    } else {
                        self.ctx.record_trace(format!("operator {} ignored: no left operand", op.symbol()), Value::Null);
                    }
                    continue;
                }
                let left = stack.last().cloned().unwrap_or_default();
                match pending.replace(op) {
                    Some(previous) => self.ctx.record_trace(
                        format!("operator {} replaces {}", op.symbol(), previous.symbol()),
                        left,
                    ),
                    None => self.ctx.record_trace(format!("operator {}", op.symbol()), left),
                };
                continue;
            }

            let value = match token {
                Token::Function(f) => self.function(f, &mut stack, pending.is_none(), chain, &here)?,
                other => self.operand(other, chain, &here)?,
            };
            let value = if negate_next {
                negate_next = false;
                ops::negate(&value).map_err(|e| e.at_token(token.id()).at_path(&here))?
            } else {
                value
            };
            let value = if invert_next {
                invert_next = false;
                ops::apply_not(&value)
            } else {
                value
            };

            match pending.take() {
                Some(op) => {
                    let left = stack.pop().unwrap_or_default();
                    let combined = ops::apply_binary(op, &left, &value, self.ctx.precision)
                        .map_err(|e| e.at_token(token.id()).at_path(&here))?;
                    self.ctx.record_trace(format!("{} {} {}", describe(&left), op.symbol(), describe(&value)), combined.clone());
                    stack.push(combined);
                }
                None => stack.push(value),
            }
        }

        if let Some(op) = pending {
            self.ctx.record_trace(format!("trailing operator {} ignored", op.symbol()), Value::Null);
        }

        match stack.len() {
            0 => Ok(None),
            1 => Ok(stack.pop()),
            n => Err(FormulaError::missing_operator()
                .at_path(path)
                .with_note(format!("{} values left without an operator between them", n))),
        }
    }

    fn operand(&mut self, token: &Token, chain: &[String], path: &str) -> Result<Value, FormulaError> {
        trace!(token_id = %token.id(), kind = token.kind(), depth = chain.len(), "operand");
        match token {
            Token::Field(f) => {
                let value = self.env.resolve(&f.field_id, f.part);
                let label = match f.part {
                    Some(part) => format!("field {}.{}", f.field_id, part.key()),
                    None => format!("field {}", f.field_id),
                };
                self.ctx.record_trace(label, value.clone());
                Ok(value)
            }
            Token::AdvPart(a) => {
                let value = self.env.resolve(&a.field_id, Some(a.part));
                self.ctx.record_trace(format!("adv_part {}.{}", a.field_id, a.part.key()), value.clone());
                Ok(value)
            }
            Token::Value(v) => {
                let value = v.literal();
                self.ctx.record_trace(format!("value {}", v.value), value.clone());
                Ok(value)
            }
            Token::FormulaRef(r) => Ok(self.formula_ref(r, chain, path)),
            Token::Cond(c) => Ok(self.cond(c, chain, path)),
            Token::Switch(s) => Ok(self.switch(s, chain, path)),
            Token::Operator(_) | Token::Function(_) => {
                Err(FormulaError::internal("operator or function reached operand evaluation").at_path(path))
            }
        }
    }

    fn function(
        &mut self,
        token: &FunctionToken,
        stack: &mut Vec<Value>,
        can_bind: bool,
        chain: &[String],
        path: &str,
    ) -> Result<Value, FormulaError> {
        let located = |e: FormulaError| e.at_token(&token.id).at_path(path);
        let call = match &token.call {
            Some(call) => call.clone(),
            None => parse_call(&token.value).map_err(located)?,
        };

        let slots = call.placeholder_count();
        let available = if can_bind { stack.len() } else { 0 };
        let take = if call.has_variadic() { available } else { slots.min(available) };
        let required = self.required_slots(&call);
        if take < required {
            let explicit = call.args.iter().filter(|a| !matches!(a, CallArg::Placeholder(_) | CallArg::Variadic(_))).count();
            return Err(located(
                FormulaError::arg_count(&call.name.to_uppercase(), required + explicit, take + explicit)
                    .with_note(format!("{} preceding value(s) available for placeholders", available)),
            ));
        }

        let mut binding = Binding {
            values: stack.split_off(stack.len() - take).into(),
            spread: take.saturating_sub(slots),
        };
        let result = self.call(&call, &mut binding, chain.len()).map_err(located)?;
        self.ctx.record_trace(format!("function {} ({} bound)", call.name.to_uppercase(), take), result.clone());
        Ok(result)
    }

    /// Placeholders that must be filled: those among the declared required
    /// arguments of each call, nested calls included
    fn required_slots(&self, call: &CallExpr) -> usize {
        let Some(function) = self.ctx.registry.get_function(&call.name) else {
            return 0;
        };
        call.args.iter().take(function.meta().required_args()).map(|a| match a {
            CallArg::Placeholder(_) => 1,
            CallArg::Call(inner) => self.required_slots(inner),
            _ => 0,
        }).sum()
    }

    fn call(&mut self, call: &CallExpr, binding: &mut Binding, depth: usize) -> Result<Value, FormulaError> {
        let mut args: Vec<Option<Value>> = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            match arg {
                CallArg::Number(n) => args.push(Some(Value::Number(n.clone()))),
                CallArg::Text(s) => args.push(Some(Value::Text(s.clone()))),
                CallArg::Bool(b) => args.push(Some(Value::Bool(*b))),
                CallArg::Null => args.push(Some(Value::Null)),
                CallArg::Field(id) => args.push(Some(self.env.resolve(id, None))),
                CallArg::Call(inner) => args.push(Some(self.call(inner, binding, depth)?)),
                CallArg::Placeholder(_) => args.push(binding.values.pop_front()),
                CallArg::Variadic(_) => {
                    let n = std::mem::take(&mut binding.spread).min(binding.values.len());
                    args.extend(binding.values.drain(..n).map(Some));
                }
            }
        }
        // Unfilled optional slots at the end are left out so defaults apply
        while matches!(args.last(), Some(None)) {
            args.pop();
        }
        let args: Vec<Value> = args.into_iter().map(Option::unwrap_or_default).collect();
        trace!(function = %call.name, args = args.len(), depth, "calling function");
        match self.ctx.call_function(&call.name, &args) {
            Value::Error(e) => Err(e),
            v => Ok(v),
        }
    }

    fn formula_ref(&mut self, token: &FormulaRefToken, chain: &[String], path: &str) -> Value {
        let id = token.ref_formula_id.as_str();
        if id.is_empty() {
            return self.recover(FormulaError::missing_formula(""), &token.id, path, "formula_ref without id");
        }

        if chain.iter().any(|c| c == id) {
            let mut cycle = chain.to_vec();
            cycle.push(id.to_string());
            let label = format!("formula_ref {}: cycle {}", id, cycle.join(" → "));
            return self.recover(FormulaError::cycle(&cycle), &token.id, path, &label);
        }

        if chain.len() > self.max_depth {
            let label = format!("formula_ref {}: depth limit {}", id, self.max_depth);
            return self.recover(FormulaError::depth_limit(self.max_depth), &token.id, path, &label);
        }

        if let Some(value) = self.cache.get(id) {
            let value = value.clone();
            self.ctx.record_trace(format!("formula_ref {} (cached)", id), value.clone());
            return value;
        }

        let Some(target) = self.lookup.lookup(id) else {
            let label = format!("formula_ref {}: not found", id);
            return self.recover(FormulaError::missing_formula(id), &token.id, path, &label);
        };

        let mut next = chain.to_vec();
        next.push(id.to_string());
        let recovered_before = self.warnings.len();
        match self.sequence(&target.sequence, &next, id) {
            Ok(value) => {
                let value = value.unwrap_or_default();
                // A result cut short by the chain it was reached through is not reusable
                let chain_dependent = self.warnings[recovered_before..]
                    .iter()
                    .any(|w| w.code == codes::CYCLE || w.code == codes::DEPTH_LIMIT);
                if !chain_dependent {
                    self.cache.insert(id.to_string(), value.clone());
                }
                self.ctx.record_trace(format!("formula_ref {}", id), value.clone());
                value
            }
            Err(e) => {
                let label = format!("formula_ref {} failed: {}", id, e.message);
                self.recover(e.in_formula(id), &token.id, path, &label)
            }
        }
    }

    fn cond(&mut self, token: &CondToken, chain: &[String], path: &str) -> Value {
        let truth = if !token.cond_expr.is_empty() {
            let expr = skip_if_wrapper(&token.cond_expr);
            match self.sequence(expr, chain, &format!("{}.condExpr", path)) {
                Ok(value) => value.is_some_and(|v| v.truthy()),
                Err(e) => {
                    let label = format!("cond condition failed: {}", e.message);
                    self.recover(e, &token.id, path, &label);
                    false
                }
            }
        } else if let Some(condition) = &token.condition {
            self.legacy_condition(condition, &token.id, path)
        } else {
            false
        };

        let (arm, name) = if truth { (&token.then, "then") } else { (&token.otherwise, "else") };
        let value = if arm.is_empty() {
            match token.else_behavior {
                ElseBehavior::Ignore => Value::Null,
                ElseBehavior::Zero => Value::Number(Number::from_i64(0)),
            }
        } else {
            let arm_path = format!("{}.{}", path, name);
            match self.sequence(arm, chain, &arm_path) {
                Ok(v) => v.unwrap_or_default(),
                Err(e) => {
                    let label = format!("cond {} failed: {}", name, e.message);
                    self.recover(e, &token.id, &arm_path, &label)
                }
            }
        };
        self.ctx.record_trace(format!("cond {} → {}", truth, name), value.clone());
        value
    }

    fn legacy_condition(&mut self, condition: &LegacyCondition, token_id: &str, path: &str) -> bool {
        let left = self.env.resolve(&condition.field_id, condition.part);
        let right = Value::from_json(&condition.value);
        let op = condition.operator.trim();
        if op == "in" {
            return match &right {
                Value::List(items) => items.iter().any(|item| item.to_string() == left.to_string()),
                _ => false,
            };
        }
        match Operator::parse(op) {
            Some(o @ (Operator::Eq | Operator::Ne | Operator::Gt | Operator::Lt | Operator::Ge | Operator::Le)) => {
                ops::apply_binary(o, &left, &right, self.ctx.precision).is_ok_and(|v| v.truthy())
            }
            _ => {
                let label = format!("cond operator '{}' not usable in a condition", op);
                self.recover(FormulaError::unsupported_operator(op), token_id, path, &label);
                false
            }
        }
    }

    fn switch(&mut self, token: &SwitchToken, chain: &[String], path: &str) -> Value {
        let selector = self.env.resolve(&token.switch_field_id, token.switch_part).to_string();
        let chosen = token.cases.iter().position(|case| case_key(&case.value) == selector);

        let (seq, label, seq_path) = match chosen {
            Some(i) => (&token.cases[i].seq, format!("case {}", i), format!("{}.cases[{}].seq", path, i)),
            None => (&token.default_seq, "default".to_string(), format!("{}.defaultSeq", path)),
        };

        let value = if seq.is_empty() {
            Value::Null
        } else {
            match self.sequence(seq, chain, &seq_path) {
                Ok(v) => v.unwrap_or_default(),
                Err(e) => {
                    let note = format!("switch {} failed: {}", label, e.message);
                    self.recover(e, &token.id, &seq_path, &note)
                }
            }
        };
        self.ctx.record_trace(
            format!("switch {}={} → {}", token.switch_field_id, selector, label),
            value.clone(),
        );
        value
    }

    /// Record a recovered fault and yield the empty value
    fn recover(&mut self, error: FormulaError, token_id: &str, path: &str, label: &str) -> Value {
        let error = error.at_token(token_id).at_path(path).with_severity(Severity::Warning);
        warn!(token_id = %token_id, path = %path, code = %error.code, "{}", label);
        self.ctx.record_trace(label.to_string(), Value::Null);
        self.warnings.push(error);
        Value::Null
    }
}

/// A condition written as `IF(` followed by the condition tokens
fn skip_if_wrapper(tokens: &[Token]) -> &[Token] {
    match tokens.first() {
        Some(Token::Function(f)) if f.value.trim_start().to_uppercase().starts_with("IF(") => &tokens[1..],
        _ => tokens,
    }
}

fn case_key(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => Value::from_json(other).to_string(),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Text(s) => format!("\"{}\"", s),
        Value::Null => "∅".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::{FormulaArena, NoFormulas};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tbl_core::codes;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn evaluator() -> Evaluator {
        init_tracing();
        Evaluator::new(Arc::new(tbl_std::standard_registry()))
    }

    fn op(id: &str, symbol: &str) -> Token {
        Token::operator(id, symbol)
    }

    fn eval(tokens: Vec<Token>, env: &Environment) -> EvaluationResult {
        evaluator().evaluate(&Formula::new("f", tokens), env, &NoFormulas)
    }

    #[test]
    fn test_addition() {
        let r = eval(vec![Token::value("a", 5), op("b", "+"), Token::value("c", 3)], &Environment::new());
        assert!(r.success);
        assert_eq!(r.value().to_string(), "8");
    }

    #[test]
    fn test_left_to_right_without_precedence() {
        let tokens = vec![Token::value("a", 2), op("b", "+"), Token::value("c", 3), op("d", "*"), Token::value("e", 4)];
        assert_eq!(eval(tokens, &Environment::new()).value().to_string(), "20");
    }

    #[test]
    fn test_percent_value() {
        let r = eval(vec![Token::text("a", "15%")], &Environment::new());
        assert_eq!(r.value().to_string(), "0.15");
    }

    #[test]
    fn test_missing_field_counts_as_zero() {
        let r = eval(vec![Token::field("a", "ghost"), op("b", "+"), Token::value("c", 1)], &Environment::new());
        assert!(r.success);
        assert_eq!(r.value().to_string(), "1");
    }

    #[test]
    fn test_text_arithmetic_fails() {
        let r = eval(vec![Token::text("a", "abc"), op("b", "+"), Token::value("c", 5)], &Environment::new());
        assert!(!r.success);
        assert_eq!(r.error_code(), Some(codes::TYPE_COERCION));
        assert!(r.error.is_some());
        assert!(r.result.is_none());
    }

    #[test]
    fn test_empty_formula_fails() {
        let r = eval(vec![], &Environment::new());
        assert!(!r.success);
        assert_eq!(r.error_code(), Some(codes::EMPTY_FORMULA));
        let only_ops = eval(vec![op("a", "+")], &Environment::new());
        assert_eq!(only_ops.error_code(), Some(codes::EMPTY_FORMULA));
    }

    #[test]
    fn test_adjacent_operands_fail() {
        let r = eval(vec![Token::value("a", 1), Token::value("b", 2)], &Environment::new());
        assert_eq!(r.error_code(), Some(codes::MISSING_OPERATOR));
    }

    #[test]
    fn test_operator_edge_cases() {
        let env = Environment::new();
        let unary = eval(vec![op("a", "-"), Token::value("b", 4), op("c", "+"), Token::value("d", 10)], &env);
        assert_eq!(unary.value().to_string(), "6");

        let last_wins = eval(vec![Token::value("a", 5), op("b", "+"), op("c", "*"), Token::value("d", 3)], &env);
        assert_eq!(last_wins.value().to_string(), "15");
        assert!(last_wins.traced("replaces"));

        let trailing = eval(vec![Token::value("a", 5), op("b", "+")], &env);
        assert!(trailing.success);
        assert_eq!(trailing.value().to_string(), "5");

        let not = eval(vec![op("a", "!"), Token::value("b", 0)], &env);
        assert_eq!(not.value().as_bool(), Some(true));

        let ternary = eval(vec![Token::value("a", 1), op("b", "?:"), Token::value("c", 2)], &env);
        assert_eq!(ternary.error_code(), Some(codes::UNSUPPORTED_OPERATOR));
    }

    #[test]
    fn test_function_binds_preceding_value() {
        let env = Environment::new().with("price", Value::Number(Number::from_ratio(1234, 100)));
        let r = eval(vec![Token::field("a", "price"), Token::function("b", "ROUND(valeur, 1)")], &env);
        assert!(r.success, "{:?}", r.error);
        assert_eq!(r.value().to_string(), "12.3");
    }

    #[test]
    fn test_function_after_operator_binds_nothing() {
        let env = Environment::new();
        let r = eval(vec![Token::value("a", 2), op("b", "*"), Token::function("c", "ROUND(valeur, 0)")], &env);
        assert!(!r.success);
        assert_eq!(r.error_code(), Some(codes::ARG_COUNT));

        let explicit = eval(vec![Token::value("a", 2), op("b", "*"), Token::function("c", "ABS(-3)")], &env);
        assert_eq!(explicit.value().to_string(), "6");
    }

    #[test]
    fn test_variadic_takes_all_preceding_values() {
        let r = eval(
            vec![Token::value("a", 4), Token::value("b", 9), Token::value("c", 2), Token::function("d", "MAX(valeurs...)")],
            &Environment::new(),
        );
        assert!(r.success, "{:?}", r.error);
        assert_eq!(r.value().to_string(), "9");
    }

    #[test]
    fn test_optional_placeholders_may_stay_unfilled() {
        let r = eval(vec![Token::value("a", 3.14159), Token::function("b", "ROUND(valeur, décimales)")], &Environment::new());
        assert!(r.success, "{:?}", r.error);
        assert_eq!(r.value().to_string(), "3");
        assert!(r.traced("function ROUND (1 bound)"));

        let both = eval(
            vec![Token::value("a", 3.14159), Token::value("b", 2), Token::function("c", "ROUND(valeur, décimales)")],
            &Environment::new(),
        );
        assert_eq!(both.value().to_string(), "3.14");
    }

    #[test]
    fn test_variadic_leaves_values_for_later_slots() {
        let template = "CASE(condition1, valeur1, condition2, valeur2, ..., défaut)";
        let pair = eval(vec![Token::value("a", 1), Token::value("b", 2), Token::function("c", template)], &Environment::new());
        assert!(pair.success, "{:?}", pair.error);
        assert_eq!(pair.value().to_string(), "2");

        let values = [0, 5, 0, 8, 0, 6, 3];
        let mut tokens: Vec<Token> = values.iter().enumerate().map(|(i, v)| Token::value(format!("v{}", i), *v)).collect();
        tokens.push(Token::function("c", template));
        let spread = eval(tokens, &Environment::new());
        assert!(spread.success, "{:?}", spread.error);
        assert_eq!(spread.value().to_string(), "3");
        assert!(spread.traced("function CASE (7 bound)"));
    }

    #[test]
    fn test_required_placeholder_without_value_fails() {
        let r = eval(vec![Token::function("a", "CASE(condition1, valeur1, ..., défaut)")], &Environment::new());
        assert_eq!(r.error_code(), Some(codes::ARG_COUNT));
    }

    #[test]
    fn test_field_arguments_and_nested_calls() {
        let env = Environment::new().with("nom", "dupont");
        let r = eval(vec![Token::function("a", "CONCAT(\"M. \", UPPER({nom}))")], &env);
        assert_eq!(r.value().as_text(), Some("M. DUPONT"));
    }

    #[test]
    fn test_unknown_function_fails() {
        let r = eval(vec![Token::function("a", "FROBNICATE(1)")], &Environment::new());
        assert_eq!(r.error_code(), Some(codes::UNDEFINED_FUNC));
    }

    fn cond_x_gt_10() -> Token {
        Token::Cond(CondToken {
            id: "c".into(),
            cond_expr: vec![Token::field("c1", "x"), op("c2", ">"), Token::value("c3", 10)],
            then: vec![Token::text("t1", "big")],
            otherwise: vec![Token::text("e1", "small")],
            else_behavior: ElseBehavior::Zero,
            condition: None,
        })
    }

    #[test]
    fn test_cond_branches() {
        let big = eval(vec![cond_x_gt_10()], &Environment::new().with("x", 20));
        assert_eq!(big.value().as_text(), Some("big"));
        let small = eval(vec![cond_x_gt_10()], &Environment::new().with("x", 5));
        assert_eq!(small.value().as_text(), Some("small"));
        assert!(small.traced("cond false → else"));
    }

    #[test]
    fn test_cond_skips_if_wrapper_and_empty_arms() {
        let mut cond = Token::Cond(CondToken {
            id: "c".into(),
            cond_expr: vec![Token::function("w", "IF("), Token::field("c1", "flag")],
            then: vec![Token::value("t", 1)],
            otherwise: vec![],
            else_behavior: ElseBehavior::Zero,
            condition: None,
        });
        let zero = eval(vec![cond.clone()], &Environment::new().with("flag", false));
        assert_eq!(zero.value().to_string(), "0");

        if let Token::Cond(c) = &mut cond {
            c.else_behavior = ElseBehavior::Ignore;
        }
        let ignored = eval(vec![cond.clone()], &Environment::new().with("flag", false));
        assert!(ignored.success);
        assert!(ignored.value().is_null());

        let taken = eval(vec![cond], &Environment::new().with("flag", true));
        assert_eq!(taken.value().to_string(), "1");
    }

    #[test]
    fn test_cond_legacy_condition() {
        let cond = Token::Cond(CondToken {
            id: "c".into(),
            cond_expr: vec![],
            then: vec![Token::value("t", 1)],
            otherwise: vec![Token::value("e", 2)],
            else_behavior: ElseBehavior::Zero,
            condition: Some(LegacyCondition {
                field_id: "size".into(),
                part: None,
                operator: "in".into(),
                value: json!(["S", "M"]),
            }),
        });
        assert_eq!(eval(vec![cond.clone()], &Environment::new().with("size", "M")).value().to_string(), "1");
        assert_eq!(eval(vec![cond], &Environment::new().with("size", "XL")).value().to_string(), "2");
    }

    #[test]
    fn test_failed_arm_degrades() {
        let cond = Token::Cond(CondToken {
            id: "c".into(),
            cond_expr: vec![Token::value("c1", true)],
            then: vec![Token::value("t1", 1), op("t2", "/"), Token::value("t3", 0)],
            otherwise: vec![],
            else_behavior: ElseBehavior::Zero,
            condition: None,
        });
        let r = eval(vec![cond, op("o", "+"), Token::value("v", 5)], &Environment::new());
        assert!(r.success);
        assert_eq!(r.value().to_string(), "5");
        assert_eq!(r.warnings.len(), 1);
        assert_eq!(r.warnings[0].code, codes::DIV_ZERO);
        assert_eq!(r.warnings[0].context.as_ref().and_then(|c| c.path.as_deref()), Some("sequence[0].then[2]"));
    }

    #[test]
    fn test_switch() {
        let switch = Token::Switch(SwitchToken {
            id: "s".into(),
            switch_field_id: "mode".into(),
            switch_part: None,
            cases: vec![
                SwitchCase { value: json!("a"), seq: vec![Token::value("a1", 1)] },
                SwitchCase { value: json!(2), seq: vec![Token::value("b1", 20)] },
            ],
            default_seq: vec![Token::value("d1", 99)],
        });
        let env = |v: Value| Environment::new().with("mode", v);
        assert_eq!(eval(vec![switch.clone()], &env(Value::from("a"))).value().to_string(), "1");
        assert_eq!(eval(vec![switch.clone()], &env(Value::from("2"))).value().to_string(), "20");
        assert_eq!(eval(vec![switch.clone()], &env(Value::from("z"))).value().to_string(), "99");

        if let Token::Switch(mut s) = switch {
            s.default_seq.clear();
            let none = eval(vec![Token::Switch(s)], &env(Value::from("z")));
            assert!(none.success);
            assert!(none.value().is_null());
        }
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let f1 = Formula::new("f1", vec![Token::formula_ref("r", "f1")]);
        let arena = FormulaArena::new().with(f1.clone());
        let r = evaluator().evaluate(&f1, &Environment::new(), &arena);
        assert!(r.success);
        assert!(r.value().is_null());
        assert!(r.traced("cycle"));
        assert_eq!(r.warnings[0].code, codes::CYCLE);
    }

    #[test]
    fn test_formula_ref_chain_and_missing() {
        let arena = FormulaArena::new()
            .with(Formula::new("base", vec![Token::field("a", "x"), op("b", "*"), Token::value("c", 2)]))
            .with(Formula::new("top", vec![Token::formula_ref("r", "base"), op("o", "+"), Token::formula_ref("m", "nope")]));
        let top = arena.get("top").cloned().unwrap();
        let r = evaluator().evaluate(&top, &Environment::new().with("x", 21), &arena);
        assert!(r.success);
        assert_eq!(r.value().to_string(), "42");
        assert_eq!(r.warnings.len(), 1);
        assert_eq!(r.warnings[0].code, codes::MISSING_FORMULA);
    }

    #[test]
    fn test_repeated_reference_is_cached() {
        let arena = FormulaArena::new().with(Formula::new("one", vec![Token::value("v", 1)]));
        let f = Formula::new("f", vec![Token::formula_ref("a", "one"), op("b", "+"), Token::formula_ref("c", "one")]);
        let r = evaluator().evaluate(&f, &Environment::new(), &arena);
        assert_eq!(r.value().to_string(), "2");
        assert!(r.traced("formula_ref one (cached)"));
    }

    #[test]
    fn test_depth_limit() {
        let arena: FormulaArena = (0..5)
            .map(|i| Formula::new(format!("f{}", i), vec![Token::formula_ref("r", format!("f{}", i + 1))]))
            .chain(std::iter::once(Formula::new("f5", vec![Token::value("v", 7)])))
            .collect();
        let root = arena.get("f0").cloned().unwrap();
        let deep = evaluator().evaluate(&root, &Environment::new(), &arena);
        assert_eq!(deep.value().to_string(), "7");

        let shallow = evaluator()
            .with_config(EngineConfig::default().with_max_depth(3))
            .evaluate(&root, &Environment::new(), &arena);
        assert!(shallow.success);
        assert!(shallow.value().is_null());
        assert_eq!(shallow.warnings[0].code, codes::DEPTH_LIMIT);
    }

    #[test]
    fn test_depth_limited_result_is_not_reused() {
        let arena = FormulaArena::new()
            .with(Formula::new("A", vec![Token::formula_ref("r", "B")]))
            .with(Formula::new("B", vec![Token::formula_ref("r", "C")]))
            .with(Formula::new("C", vec![Token::formula_ref("r", "D")]))
            .with(Formula::new("D", vec![Token::value("v", 7)]));
        let root = Formula::new("R", vec![Token::formula_ref("a", "A"), op("o", "+"), Token::formula_ref("c", "C")]);
        let r = evaluator()
            .with_config(EngineConfig::default().with_max_depth(3))
            .evaluate(&root, &Environment::new(), &arena);
        assert!(r.success, "{:?}", r.error);
        assert_eq!(r.value().to_string(), "7");
        assert!(r.traced("formula_ref D: depth limit 3"));
        assert!(!r.traced("formula_ref C (cached)"));
        assert_eq!(r.warnings.len(), 1);
    }

    #[test]
    fn test_trace_numbering() {
        let r = eval(vec![Token::value("a", 5), op("b", "+"), Token::value("c", 3)], &Environment::new());
        let steps: Vec<usize> = r.trace.iter().map(|s| s.step).collect();
        assert_eq!(steps, vec![1, 2, 3, 4]);
        assert_eq!(r.trace[3].operation, "5 + 3");
    }

    #[test]
    fn test_composite_parts() {
        let env = Environment::from_json(&json!({"color": {"selection": "rouge", "extra": 3}})).unwrap();
        let r = eval(vec![Token::adv_part("a", "color", Part::Extra), op("b", "*"), Token::value("c", 2)], &env);
        assert_eq!(r.value().to_string(), "6");
    }

    #[test]
    fn test_fixed_clock() {
        let now = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let r = evaluator()
            .with_config(EngineConfig::default().with_now(now))
            .evaluate(&Formula::new("f", vec![Token::function("a", "YEAR(TODAY())")]), &Environment::new(), &NoFormulas);
        assert_eq!(r.value().to_string(), "2024");
    }
}
