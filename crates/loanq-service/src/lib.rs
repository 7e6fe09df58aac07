// crates/loanq-service/src/lib.rs
// ============================================================================
// Crate: loanq-service
// Description: The QuestionService RPC surface: warmup/readiness wiring
// around the evaluation pipeline, exposed as a thin axum JSON API.
// Purpose: Host the five §6 operations (`GetQuestions`, `SubmitAnswer`,
// `GetLoanState`, `HealthCheck`, `ReadinessCheck`) behind a process that can
// be warmed up once and then served indefinitely.
// Dependencies: axum, loanq-core, loanq-rules, loanq-config, loanq-eval
// ============================================================================

//! ## Overview
//! This crate does not implement the wire RPC server or proto marshalling —
//! those are explicitly out of scope (§ Non-goals). What it does own is the
//! process lifecycle around the pipeline built in `loanq-eval`: construct the
//! collaborators, [`WarmupState::warmup`] the pipeline once, and serve the
//! resulting [`AppState`] behind [`routes::router`].

#![deny(missing_docs)]

/// Request/response wire shapes.
mod dto;
/// `ServiceError` and its HTTP-status mapping.
mod error;
/// The axum router and its handlers.
mod routes;
/// `WarmupState`/`AppState` construction.
mod state;

pub use dto::GetQuestionsRequest;
pub use dto::HealthResponse;
pub use dto::ReadinessResponse;
pub use dto::SubmitAnswerRequest;
pub use error::ServiceError;
pub use routes::router;
pub use state::AppState;
pub use state::ServiceConfig;
pub use state::WarmupError;
pub use state::WarmupState;
