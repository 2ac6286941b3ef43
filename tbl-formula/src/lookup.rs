//! Resolving FormulaRef ids to formulas

use crate::adapt::adapt;
use crate::token::Formula;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Source of formulas referenced by `formula_ref` tokens
pub trait FormulaLookup {
    fn lookup(&self, id: &str) -> Option<Formula>;
}

/// No formulas at all; every reference is missing
pub struct NoFormulas;

impl FormulaLookup for NoFormulas {
    fn lookup(&self, _id: &str) -> Option<Formula> {
        None
    }
}

impl<F> FormulaLookup for F
where
    F: Fn(&str) -> Option<Formula>,
{
    fn lookup(&self, id: &str) -> Option<Formula> {
        self(id)
    }
}

/// In-memory formula store keyed by id
#[derive(Debug, Clone, Default)]
pub struct FormulaArena {
    formulas: HashMap<String, Formula>,
}

impl FormulaArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapt and store every stored formula; absent entries are skipped
    pub fn from_stored<'a>(stored: impl IntoIterator<Item = &'a JsonValue>) -> Self {
        let mut arena = Self::new();
        for json in stored {
            if let Some(formula) = adapt(Some(json)) {
                arena.insert(formula);
            }
        }
        arena
    }

    pub fn with(mut self, formula: Formula) -> Self {
        self.insert(formula);
        self
    }

    pub fn insert(&mut self, formula: Formula) -> Option<Formula> {
        self.formulas.insert(formula.id.clone(), formula)
    }

    pub fn get(&self, id: &str) -> Option<&Formula> {
        self.formulas.get(id)
    }

    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Formula> {
        self.formulas.values()
    }
}

impl FormulaLookup for FormulaArena {
    fn lookup(&self, id: &str) -> Option<Formula> {
        self.formulas.get(id).cloned()
    }
}

impl FromIterator<Formula> for FormulaArena {
    fn from_iter<I: IntoIterator<Item = Formula>>(iter: I) -> Self {
        Self { formulas: iter.into_iter().map(|f| (f.id.clone(), f)).collect() }
    }
}

/// Looks in `first`, then in `fallback`
pub(crate) struct Chained<'a> {
    pub first: &'a dyn FormulaLookup,
    pub fallback: &'a dyn FormulaLookup,
}

impl FormulaLookup for Chained<'_> {
    fn lookup(&self, id: &str) -> Option<Formula> {
        self.first.lookup(id).or_else(|| self.fallback.lookup(id))
    }
}
