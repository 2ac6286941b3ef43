//! Evaluation Context

use tbl_core::{Value, DEFAULT_PRECISION};
use crate::PluginRegistry;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::sync::Arc;

/// Evaluation context passed to plugins
pub struct EvalContext {
    pub precision: u32,
    pub registry: Arc<PluginRegistry>,
    /// Clock reading for NOW()/TODAY(), fixed for the whole evaluation
    pub now: NaiveDateTime,
    pub tracing: bool,
    pub trace: Vec<TraceStep>,
    steps: usize,
}

/// Single step in evaluation trace
#[derive(Debug, Clone, Serialize)]
pub struct TraceStep {
    pub step: usize,
    pub operation: String,
    pub value: Value,
}

impl EvalContext {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self {
            precision: DEFAULT_PRECISION as u32,
            registry,
            now: chrono::Local::now().naive_local(),
            tracing: true,
            trace: Vec::new(),
            steps: 0,
        }
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.tracing = enabled;
        self
    }

    /// Call a registered function with this context
    pub fn call_function(&self, name: &str, args: &[Value]) -> Value {
        self.registry.call_function(name, args, self)
    }

    /// Append a trace entry. Step numbers keep counting when tracing is off
    /// so that enabling it never renumbers a run.
    pub fn record_trace(&mut self, operation: impl Into<String>, value: Value) -> usize {
        self.steps += 1;
        if self.tracing {
            self.trace.push(TraceStep { step: self.steps, operation: operation.into(), value });
        }
        self.steps
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Hand the recorded trace to the caller, leaving the context empty
    pub fn take_trace(&mut self) -> Vec<TraceStep> {
        std::mem::take(&mut self.trace)
    }
}
