// crates/loanq-store/src/lib.rs
// ============================================================================
// Module: LoanQ Store Library
// Description: Reference `SystemOfRecord` adapter backed by SQLite.
// Purpose: Stand in for the out-of-scope relational driver in tests and
// local runs.
// Dependencies: loanq-core, rusqlite, serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! `loanq-store` is a reference, SQLite-backed implementation of
//! [`loanq_core::SystemOfRecord`]. Production deployments of this system
//! point the State Loader at a real relational client instead; this crate
//! exists so tests and local runs have a fully working collaborator rather
//! than a mock.

#![deny(missing_docs)]

pub mod store;

pub use store::SqliteStoreConfig;
pub use store::SqliteSystemOfRecord;
pub use store::SqliteSyncMode;
pub use store::fixtures;
