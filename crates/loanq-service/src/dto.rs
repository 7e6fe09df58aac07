// crates/loanq-service/src/dto.rs
// ============================================================================
// Module: Request/Response DTOs
// Description: Plain serde structs for the five RPC-surface operations.
// Purpose: Keep the wire shape decoupled from the internal pipeline types,
// while staying a thin pass-through (the spec explicitly scopes proto
// marshalling out, so this is deliberately minimal).
// Dependencies: serde, loanq-core, loanq-eval
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use loanq_core::EntityPid;
use loanq_core::ProposalPid;
use loanq_core::QuestionId;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: GetQuestions
// ============================================================================

/// `POST /questions/get` request body.
#[derive(Debug, Deserialize)]
pub struct GetQuestionsRequest {
    /// Proposal to build the queue for.
    pub proposal_pid: ProposalPid,
}

// ============================================================================
// SECTION: SubmitAnswer
// ============================================================================

/// `POST /questions/answer` request body.
#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    /// Proposal the answer belongs to.
    pub proposal_pid: ProposalPid,
    /// Question being answered.
    pub question_id: QuestionId,
    /// Entity the answer applies to, when the question is entity-scoped.
    #[serde(default)]
    pub entity_pid: Option<EntityPid>,
    /// Answer payload, carried opaquely as JSON (§6 "answer is carried as a
    /// UTF-8-encoded JSON document").
    pub answer: serde_json::Value,
    /// Raw conversational input, when captured.
    #[serde(default)]
    pub raw_input: Option<String>,
    /// Extraction confidence, when captured.
    #[serde(default)]
    pub confidence: Option<f64>,
}

// ============================================================================
// SECTION: Health / Readiness
// ============================================================================

/// `GET /healthz` response body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `true`: reaching the handler proves process liveness.
    pub alive: bool,
}

/// `GET /readyz` response body.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    /// Alive **and** warmup complete **and** rule count > 0 (§6).
    pub ready: bool,
}
