// crates/loanq-core/src/error.rs
// ============================================================================
// Module: LoanQ Engine Errors
// Description: The error taxonomy that crosses the Evaluator/Answer Handler
// boundary to callers.
// Purpose: Give every collaborator and the RPC surface one shared, typed
// error shape; every other failure mode is recoverable and is logged and
// counted rather than propagated.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Only three kinds of failure ever reach a caller: the requested proposal or
//! question was not found, the request itself was malformed, or something
//! unrecoverable happened internally. Compile/configuration errors are fatal
//! at startup and never reach this type; transient-dependency, durability,
//! rule-evaluation, and budget-exceeded failures are all recoverable and are
//! handled (logged, counted, degraded) before they would otherwise surface
//! here.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Engine Error
// ============================================================================

/// The error taxonomy surfaced to RPC callers.
///
/// # Invariants
/// - Variants are stable for programmatic handling (mapped 1:1 onto HTTP
///   status codes at the service boundary).
#[derive(Debug, Error)]
pub enum EngineError {
    /// The requested proposal, question, or entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The request was malformed: an empty pid, an unknown form-field label,
    /// or a mapping-key mismatch for a multi-field answer.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// An unrecoverable internal failure, e.g. the system of record is
    /// unreachable on a cache miss.
    #[error("internal error: {0}")]
    Internal(String),
}
