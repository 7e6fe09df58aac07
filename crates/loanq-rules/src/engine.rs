// crates/loanq-rules/src/engine.rs
// ============================================================================
// Module: LoanQ Rules Engine
// Description: Registry of compiled decision tables plus batch/single
// evaluation against a context map.
// Purpose: Hold compiled rules write-once at startup, read-only thereafter,
// and evaluate them under `first` hit policy.
// Dependencies: loanq-core, rayon
// ============================================================================

//! ## Overview
//! The Rules Engine is a registry keyed by rule id (`question:<id>`, see
//! [`loanq_core::QuestionId::rule_id`]). Compilation is fail-hard (the
//! Configuration Registry aborts startup on any compile error before a
//! single table is installed); evaluation is fail-soft in the sense that a
//! missing rule id or absent context field never panics, it just evaluates
//! to `false`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::RwLock;

use loanq_core::FieldValue;
use rayon::prelude::*;

use crate::compiler::DecisionTable;

// ============================================================================
// SECTION: Rules Engine
// ============================================================================

/// A context map: normalized field name to value, consulted during
/// evaluation. Missing fields are treated as `FieldValue::Null`.
pub type Context = BTreeMap<String, FieldValue>;

/// Registry of compiled decision tables, keyed by rule id.
///
/// # Invariants
/// - Installed via [`RulesEngine::compile`] only during startup; the
///   Configuration Registry is the sole writer. Once traffic is admitted the
///   map is read-only, so `evaluate`/`evaluate_batch` are freely re-entrant.
pub struct RulesEngine {
    tables: RwLock<HashMap<String, DecisionTable>>,
}

impl RulesEngine {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Installs a compiled table under `rule_id`. A duplicate id replaces
    /// the previous table.
    pub fn compile(&self, rule_id: impl Into<String>, table: DecisionTable) {
        let mut tables = self.tables.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        tables.insert(rule_id.into(), table);
    }

    /// The number of compiled rules currently registered.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        let tables = self.tables.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        tables.len()
    }

    /// Evaluates a rule against a context under `first` hit policy: the
    /// first row whose every condition holds wins and its `result` is
    /// returned. A rule id with no installed table, or a table with no
    /// matching row, evaluates to `false`.
    #[must_use]
    pub fn evaluate(&self, rule_id: &str, context: &Context) -> bool {
        let tables = self.tables.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(table) = tables.get(rule_id) else {
            return false;
        };
        evaluate_table(table, context)
    }

    /// Evaluates a batch of (rule id, context) jobs in parallel. The output
    /// order matches the input order.
    #[must_use]
    pub fn evaluate_batch(&self, jobs: &[(String, Context)]) -> Vec<bool> {
        let tables = self.tables.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        jobs.par_iter()
            .map(|(rule_id, context)| {
                tables
                    .get(rule_id.as_str())
                    .is_some_and(|table| evaluate_table(table, context))
            })
            .collect()
    }
}

impl Default for RulesEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluates a single decision table against a context under `first` hit
/// policy.
fn evaluate_table(table: &DecisionTable, context: &Context) -> bool {
    for row in &table.rules {
        let matches = row.conditions.iter().all(|(field, condition)| {
            let actual = context.get(field);
            loanq_core::evaluate_comparator(condition.operator, &condition.value, actual)
        });
        if matches {
            return row.result;
        }
    }
    false
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]
mod tests {
    use super::*;
    use crate::compiler::compile;

    fn context(pairs: &[(&str, FieldValue)]) -> Context {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    #[test]
    fn evaluate_matches_true_and_false_scenarios() {
        let engine = RulesEngine::new();
        let table = compile("Loan Type is Conventional").expect("compiles");
        engine.compile("question:Q1", table);

        let matching = context(&[("loan_type", FieldValue::from("CONVENTIONAL"))]);
        assert!(engine.evaluate("question:Q1", &matching));

        let non_matching = context(&[("loan_type", FieldValue::from("FHA"))]);
        assert!(!engine.evaluate("question:Q1", &non_matching));
    }

    #[test]
    fn evaluate_unknown_rule_id_is_false() {
        let engine = RulesEngine::new();
        assert!(!engine.evaluate("question:does-not-exist", &Context::new()));
    }

    #[test]
    fn evaluate_empty_table_is_false() {
        let engine = RulesEngine::new();
        engine.compile("question:Q2", compile("").expect("compiles"));
        assert!(!engine.evaluate("question:Q2", &Context::new()));
    }

    #[test]
    fn duplicate_compile_replaces_table() {
        let engine = RulesEngine::new();
        engine.compile("question:Q3", compile("Loan Type is FHA").expect("compiles"));
        engine.compile("question:Q3", compile("Loan Type is VA").expect("compiles"));
        let ctx = context(&[("loan_type", FieldValue::from("VA"))]);
        assert!(engine.evaluate("question:Q3", &ctx));
    }

    #[test]
    fn evaluate_batch_preserves_input_order() {
        let engine = RulesEngine::new();
        engine.compile("question:A", compile("Field is Yes").expect("compiles"));
        engine.compile("question:B", compile("Field is No").expect("compiles"));

        let jobs = vec![
            ("question:A".to_string(), context(&[("field", FieldValue::from("YES"))])),
            ("question:B".to_string(), context(&[("field", FieldValue::from("YES"))])),
            ("question:A".to_string(), context(&[("field", FieldValue::from("NO"))])),
        ];
        let results = engine.evaluate_batch(&jobs);
        assert_eq!(results, vec![true, false, false]);
    }

    #[test]
    fn rule_count_reflects_installed_tables() {
        let engine = RulesEngine::new();
        assert_eq!(engine.rule_count(), 0);
        engine.compile("question:Q1", compile("Field is Yes").expect("compiles"));
        assert_eq!(engine.rule_count(), 1);
    }
}
