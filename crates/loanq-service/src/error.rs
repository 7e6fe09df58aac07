// crates/loanq-service/src/error.rs
// ============================================================================
// Module: Service Errors
// Description: Maps the pipeline's error taxonomy onto HTTP status codes.
// Purpose: Give every handler a single error type that renders a consistent
// JSON error body.
// Dependencies: axum, loanq-eval, loanq-core
// ============================================================================

//! ## Overview
//! The error-handling table names three caller-visible kinds —
//! `NotFound`, `InvalidArgument`, and everything else as an internal error —
//! and says recoverable failures (transient dependency, durability warning,
//! rule-evaluation failure, budget-exceeded) never propagate past the
//! Evaluator/Answer Handler boundary. By the time an error reaches this
//! module, it is one of those three caller-visible kinds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use loanq_eval::AnswerError;
use loanq_eval::LoaderError;
use loanq_eval::StateCacheError;
use serde::Serialize;

// ============================================================================
// SECTION: Service Error
// ============================================================================

/// The three caller-visible error kinds from the error-handling table.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Maps to HTTP 400. Empty pid, malformed answer mapping, or unknown
    /// form-field label.
    #[error("{0}")]
    InvalidArgument(String),
    /// Maps to HTTP 404. Unknown proposal pid or question id.
    #[error("{0}")]
    NotFound(String),
    /// Maps to HTTP 500. The system of record was unreachable on a cache
    /// miss, or a remote-cache write failed (§7 "Fatal dependency").
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// Short, stable label for telemetry, distinct from the human-readable
    /// `message` carried in the response body.
    pub fn metric_kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal",
        }
    }
}

/// Wire shape of an error response body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    /// One of `invalid_argument`, `not_found`, `internal`.
    kind: &'static str,
    /// Human-readable detail, safe to log and to return to the caller.
    message: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            Self::InvalidArgument(message) => (StatusCode::BAD_REQUEST, "invalid_argument", message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", message),
        };
        (status, Json(ErrorBody { kind, message })).into_response()
    }
}

impl From<LoaderError> for ServiceError {
    fn from(err: LoaderError) -> Self {
        match err {
            LoaderError::ProposalNotFound(pid) => Self::NotFound(format!("proposal not found: {pid}")),
            LoaderError::Upstream(source) => Self::Internal(source.to_string()),
        }
    }
}

impl From<StateCacheError> for ServiceError {
    fn from(err: StateCacheError) -> Self {
        match err {
            StateCacheError::Loader(source) => source.into(),
            StateCacheError::Cache(source) => Self::Internal(source.to_string()),
        }
    }
}

impl From<AnswerError> for ServiceError {
    fn from(err: AnswerError) -> Self {
        match err {
            AnswerError::QuestionNotFound(id) => Self::NotFound(format!("question not found: {id}")),
            AnswerError::InvalidArgument(detail) => Self::InvalidArgument(detail),
            AnswerError::Cache(source) => source.into(),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only panic-based assertions are permitted.")]
mod tests {
    use loanq_core::ProposalPid;

    use super::*;

    #[test]
    fn proposal_not_found_maps_to_404() {
        let err: ServiceError = LoaderError::ProposalNotFound(ProposalPid::new("p1")).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_argument_maps_to_400() {
        let err = ServiceError::InvalidArgument("empty pid".to_string());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn answer_question_not_found_maps_to_404() {
        let err: ServiceError = AnswerError::QuestionNotFound(loanq_core::QuestionId::new("q1")).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
