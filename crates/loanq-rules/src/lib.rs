// crates/loanq-rules/src/lib.rs
// ============================================================================
// Module: LoanQ Rules Library
// Description: Criteria Compiler and Rules Engine.
// Purpose: Translate a human-readable criteria string into a normalized
// decision table, and evaluate compiled decision tables against a context.
// Dependencies: loanq-core, serde, serde_json, thiserror, rayon
// ============================================================================

//! ## Overview
//! `loanq-rules` is the two leaf components of the question-evaluation
//! pipeline: the stateless Criteria Compiler (`compiler`) and the
//! write-once-at-startup, read-many-at-runtime Rules Engine (`engine`).

#![deny(missing_docs)]

pub mod compiler;
pub mod engine;

pub use compiler::CompileError;
pub use compiler::Condition;
pub use compiler::DecisionTable;
pub use compiler::HitPolicy;
pub use compiler::RuleRow;
pub use compiler::compile;
pub use engine::RulesEngine;
