// crates/loanq-config/src/lib.rs
// ============================================================================
// Module: LoanQ Configuration Registry Library
// Description: Startup loading of the sections/questions YAML tree, criteria
// compilation, and rules-engine installation.
// Purpose: Be the single fatal-on-any-error entry point between a config
// root on disk and a fully wired Rules Engine plus in-memory indexes.
// Dependencies: loanq-core, loanq-rules, serde, serde_yaml, thiserror
// ============================================================================

//! ## Overview
//! `loanq-config` scans `<root>/sections/*.yaml` and `<root>/questions/**/*.yaml`,
//! deserializes each document, compiles every question's criteria string, and
//! installs the resulting decision table into a [`loanq_rules::RulesEngine`]
//! under `question:<id>`. Partial success is structurally impossible:
//! [`registry::ConfigRegistry::load`] returns `Self` only once every
//! document has loaded, compiled, and installed cleanly.

#![deny(missing_docs)]

pub mod registry;

pub use registry::ConfigRegistry;
pub use registry::RegistryError;
