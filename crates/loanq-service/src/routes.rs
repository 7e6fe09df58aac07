// crates/loanq-service/src/routes.rs
// ============================================================================
// Module: QuestionService Router
// Description: A thin axum router exposing the five §6 RPC-surface
// operations as JSON endpoints.
// Purpose: Wire AppState into HTTP handlers; leave wire marshalling minimal
// since the spec explicitly scopes the proto RPC server out.
// Dependencies: axum, loanq-core, loanq-eval
// ============================================================================

//! ## Overview
//! `router` builds the full `Router<AppState>`: `POST /questions/get`,
//! `POST /questions/answer`, `GET /loan-state/{pid}`, `GET /healthz`, and
//! `GET /readyz`. Each handler records a [`loanq_core::MetricEvent`] through
//! [`AppState::telemetry`] on both the success and error paths, mirroring
//! `decision-gate-mcp::telemetry::McpMetrics` usage at its own request
//! boundary.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::routing::get;
use axum::routing::post;
use loanq_core::MetricEvent;
use loanq_core::Operation;
use loanq_core::ProposalPid;
use loanq_core::Telemetry;

use crate::dto::GetQuestionsRequest;
use crate::dto::HealthResponse;
use crate::dto::ReadinessResponse;
use crate::dto::SubmitAnswerRequest;
use crate::error::ServiceError;
use crate::state::AppState;

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the full `QuestionService` router over `state`.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/questions/get", post(get_questions))
        .route("/questions/answer", post(submit_answer))
        .route("/loan-state/{pid}", get(get_loan_state))
        .route("/healthz", get(health_check))
        .route("/readyz", get(readiness_check))
        .with_state(state)
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `POST /questions/get`: returns the ordered question queue for a proposal.
///
/// # Errors
///
/// Returns [`ServiceError::InvalidArgument`] for an empty pid,
/// [`ServiceError::NotFound`] for an unknown pid, and
/// [`ServiceError::Internal`] if the system of record is unreachable.
async fn get_questions(
    State(state): State<AppState>,
    Json(request): Json<GetQuestionsRequest>,
) -> Result<Json<loanq_eval::QuestionQueueResponse>, ServiceError> {
    let outcome = get_questions_inner(&state, &request).await;
    record(&state, Operation::GetQuestions, &outcome);
    outcome.map(Json)
}

/// Validation and pipeline work shared by the handler and its telemetry.
async fn get_questions_inner(
    state: &AppState,
    request: &GetQuestionsRequest,
) -> Result<loanq_eval::QuestionQueueResponse, ServiceError> {
    if request.proposal_pid.is_empty() {
        return Err(ServiceError::InvalidArgument("proposal_pid must not be empty".to_string()));
    }
    let loan_state = state.cache().get(&request.proposal_pid).await?;
    let items = state.evaluator().evaluate(&loan_state);
    Ok(state.queue_builder().build(items, &loan_state))
}

/// `POST /questions/answer`: applies an answer and returns the recomputed
/// queue.
///
/// # Errors
///
/// Returns [`ServiceError::NotFound`] for an unknown question,
/// [`ServiceError::InvalidArgument`] for a malformed answer mapping, and
/// [`ServiceError::Internal`] on an underlying cache failure.
async fn submit_answer(
    State(state): State<AppState>,
    Json(request): Json<SubmitAnswerRequest>,
) -> Result<Json<loanq_eval::QuestionQueueResponse>, ServiceError> {
    let outcome = submit_answer_inner(&state, request).await;
    record(&state, Operation::SubmitAnswer, &outcome);
    outcome.map(Json)
}

/// Validation and pipeline work shared by the handler and its telemetry.
async fn submit_answer_inner(
    state: &AppState,
    request: SubmitAnswerRequest,
) -> Result<loanq_eval::QuestionQueueResponse, ServiceError> {
    if request.proposal_pid.is_empty() {
        return Err(ServiceError::InvalidArgument("proposal_pid must not be empty".to_string()));
    }
    let response = state
        .answers()
        .submit(
            &request.proposal_pid,
            &request.question_id,
            request.entity_pid,
            request.answer,
            request.raw_input,
            request.confidence,
        )
        .await?;
    Ok(response)
}

/// `GET /loan-state/{pid}`: returns a JSON snapshot of fields/entities for
/// debugging.
///
/// # Errors
///
/// Returns [`ServiceError::InvalidArgument`] for an empty pid,
/// [`ServiceError::NotFound`] for an unknown pid, and
/// [`ServiceError::Internal`] if the system of record is unreachable.
async fn get_loan_state(
    State(state): State<AppState>,
    Path(pid): Path<String>,
) -> Result<Json<loanq_core::LoanState>, ServiceError> {
    let outcome = get_loan_state_inner(&state, &pid).await;
    record(&state, Operation::GetLoanState, &outcome);
    outcome.map(Json)
}

/// Validation and pipeline work shared by the handler and its telemetry.
async fn get_loan_state_inner(state: &AppState, pid: &str) -> Result<loanq_core::LoanState, ServiceError> {
    if pid.is_empty() {
        return Err(ServiceError::InvalidArgument("pid must not be empty".to_string()));
    }
    Ok(state.cache().get(&ProposalPid::new(pid)).await?)
}

/// `GET /healthz`: process liveness.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    state.telemetry().record_request(MetricEvent::ok(Operation::HealthCheck));
    Json(HealthResponse { alive: true })
}

/// `GET /readyz`: alive **and** warmup complete **and** rule count > 0.
async fn readiness_check(State(state): State<AppState>) -> Json<ReadinessResponse> {
    let ready = state.is_ready();
    let event =
        if ready { MetricEvent::ok(Operation::ReadinessCheck) } else { MetricEvent::error(Operation::ReadinessCheck, "not_ready") };
    state.telemetry().record_request(event);
    Json(ReadinessResponse { ready })
}

// ============================================================================
// SECTION: Telemetry Helper
// ============================================================================

/// Records a request-counter event for `operation`, labeling the error kind
/// from [`ServiceError::metric_kind`] when `outcome` failed.
fn record<T>(state: &AppState, operation: Operation, outcome: &Result<T, ServiceError>) {
    let event = match outcome {
        Ok(_) => MetricEvent::ok(operation),
        Err(err) => MetricEvent::error(operation, err.metric_kind()),
    };
    state.telemetry().record_request(event);
}

// ============================================================================
// SECTION: Tests
// ============================================================================
