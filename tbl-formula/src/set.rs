//! Evaluating a set of formulas that reference each other
//!
//! Formulas are evaluated in dependency order so that each referenced
//! formula is computed once and reused. Formulas caught in a reference
//! cycle are evaluated last; the evaluator reports their cycles.

use crate::env::Environment;
use crate::eval::{EvaluationResult, Evaluator};
use crate::lookup::{Chained, FormulaArena, FormulaLookup};
use crate::token::Formula;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use tbl_core::Value;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize)]
pub struct SetEvaluation {
    /// Formula ids in the order they were evaluated
    pub order: Vec<String>,
    /// Results keyed by target property, or by formula id when there is none
    pub results: BTreeMap<String, Value>,
    /// Full outcome per formula id
    pub evaluations: BTreeMap<String, EvaluationResult>,
    /// Ids left over by the dependency sort because of reference cycles
    pub cyclic: Vec<String>,
}

impl SetEvaluation {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.results.get(key)
    }

    pub fn failed(&self) -> impl Iterator<Item = (&String, &EvaluationResult)> {
        self.evaluations.iter().filter(|(_, r)| !r.success)
    }
}

pub fn evaluate_set(
    evaluator: &Evaluator,
    formulas: &[Formula],
    env: &Environment,
    outer: &dyn FormulaLookup,
) -> SetEvaluation {
    let arena: FormulaArena = formulas.iter().cloned().collect();
    if arena.len() < formulas.len() {
        warn!(given = formulas.len(), distinct = arena.len(), "duplicate formula ids in set, later ones win");
    }

    let mut dependencies: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for formula in arena.iter() {
        let deps = formula.references()
            .into_iter()
            .filter(|id| arena.get(id).is_some())
            .collect();
        dependencies.insert(formula.id.clone(), deps);
    }

    let (sorted, cyclic) = topological_sort(&dependencies);
    debug!(formulas = sorted.len(), cyclic = cyclic.len(), "evaluation order computed");

    let lookup = Chained { first: &arena, fallback: outer };
    let mut known: HashMap<String, Value> = HashMap::new();
    let mut outcome = SetEvaluation {
        order: Vec::new(),
        results: BTreeMap::new(),
        evaluations: BTreeMap::new(),
        cyclic: cyclic.clone(),
    };

    for id in sorted.iter().chain(cyclic.iter()) {
        let Some(formula) = arena.get(id) else { continue };
        let result = evaluator.evaluate_seeded(formula, env, &lookup, known.clone());
        if result.success {
            known.insert(id.clone(), result.value());
        }
        outcome.results.insert(formula.output_key().to_string(), result.value());
        outcome.order.push(id.clone());
        outcome.evaluations.insert(id.clone(), result);
    }
    outcome
}

/// Kahn's algorithm. Returns the sorted ids and, separately, the ids
/// that never reached in-degree zero.
fn topological_sort(dependencies: &BTreeMap<String, Vec<String>>) -> (Vec<String>, Vec<String>) {
    let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
    let mut reverse_deps: HashMap<&str, Vec<&str>> = HashMap::new();

    for name in dependencies.keys() {
        in_degree.entry(name.as_str()).or_insert(0);
    }
    for (name, deps) in dependencies {
        for dep in deps {
            *in_degree.entry(name.as_str()).or_insert(0) += 1;
            reverse_deps.entry(dep.as_str()).or_default().push(name.as_str());
        }
    }

    let mut queue: VecDeque<&str> = in_degree.iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(name, _)| *name)
        .collect();

    let mut result = Vec::new();
    while let Some(node) = queue.pop_front() {
        result.push(node.to_string());
        if let Some(dependents) = reverse_deps.get(node) {
            for dependent in dependents {
                if let Some(deg) = in_degree.get_mut(dependent) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(*dependent);
                    }
                }
            }
        }
    }

    let cyclic = in_degree.into_iter()
        .filter(|(_, deg)| *deg > 0)
        .map(|(name, _)| name.to_string())
        .collect();
    (result, cyclic)
}
