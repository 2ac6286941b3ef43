//! Which fields a formula reads, grouped by where they are read

use crate::lookup::FormulaLookup;
use crate::token::{Formula, Token};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Referenced formulas are followed this many levels deep
pub const MAX_REFERENCE_DEPTH: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldGrouping {
    pub all: BTreeSet<String>,
    /// Read directly by the formula's arithmetic
    pub main: BTreeSet<String>,
    /// Read by Cond conditions and Switch selectors
    pub condition: BTreeSet<String>,
    /// Read in Cond `then` arms and Switch cases
    pub then: BTreeSet<String>,
    /// Read in Cond `else` arms and Switch defaults
    #[serde(rename = "else")]
    pub otherwise: BTreeSet<String>,
    /// Labels found on field tokens, by field id
    pub labels: BTreeMap<String, String>,
}

#[derive(Clone, Copy)]
enum Bucket {
    Main,
    Condition,
    Then,
    Else,
}

impl FieldGrouping {
    fn add(&mut self, bucket: Bucket, field_id: &str, label: Option<&str>) {
        if field_id.is_empty() {
            return;
        }
        self.all.insert(field_id.to_string());
        let set = match bucket {
            Bucket::Main => &mut self.main,
            Bucket::Condition => &mut self.condition,
            Bucket::Then => &mut self.then,
            Bucket::Else => &mut self.otherwise,
        };
        set.insert(field_id.to_string());
        if let Some(label) = label {
            self.labels.entry(field_id.to_string()).or_insert_with(|| label.to_string());
        }
    }
}

/// Collect the fields read by `formula`, following FormulaRef tokens
pub fn collect_fields(formula: &Formula, lookup: &dyn FormulaLookup) -> FieldGrouping {
    let mut walker = Walker { lookup, grouping: FieldGrouping::default(), visited: HashSet::new() };
    walker.visited.insert(formula.id.clone());
    walker.walk(&formula.sequence, Bucket::Main, 0);
    walker.grouping
}

struct Walker<'a> {
    lookup: &'a dyn FormulaLookup,
    grouping: FieldGrouping,
    visited: HashSet<String>,
}

impl Walker<'_> {
    fn walk(&mut self, tokens: &[Token], bucket: Bucket, depth: usize) {
        for token in tokens {
            match token {
                Token::Field(f) => self.grouping.add(bucket, &f.field_id, f.label.as_deref()),
                Token::AdvPart(a) => self.grouping.add(bucket, &a.field_id, a.label.as_deref()),
                Token::Function(f) => {
                    let call = f.call.clone().or_else(|| crate::call::parse_call(&f.value).ok());
                    for id in call.map(|c| c.field_refs()).unwrap_or_default() {
                        self.grouping.add(bucket, &id, None);
                    }
                }
                Token::Cond(c) => {
                    self.walk(&c.cond_expr, Bucket::Condition, depth);
                    if let Some(condition) = &c.condition {
                        self.grouping.add(Bucket::Condition, &condition.field_id, None);
                    }
                    self.walk(&c.then, Bucket::Then, depth);
                    self.walk(&c.otherwise, Bucket::Else, depth);
                }
                Token::Switch(s) => {
                    self.grouping.add(Bucket::Condition, &s.switch_field_id, None);
                    for case in &s.cases {
                        self.walk(&case.seq, Bucket::Then, depth);
                    }
                    self.walk(&s.default_seq, Bucket::Else, depth);
                }
                Token::FormulaRef(r) => {
                    if depth >= MAX_REFERENCE_DEPTH || !self.visited.insert(r.ref_formula_id.clone()) {
                        continue;
                    }
                    if let Some(target) = self.lookup.lookup(&r.ref_formula_id) {
                        self.walk(&target.sequence, bucket, depth + 1);
                    }
                }
                Token::Value(_) | Token::Operator(_) => {}
            }
        }
    }
}
