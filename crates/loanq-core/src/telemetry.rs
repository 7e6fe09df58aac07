// crates/loanq-core/src/telemetry.rs
// ============================================================================
// Module: LoanQ Telemetry
// Description: Observability hooks shared by the evaluation pipeline and the
// RPC surface.
// Purpose: Provide metric events and counters without a hard dependency on
// any particular metrics backend.
// Dependencies: none (std only)
// ============================================================================

//! ## Overview
//! `loanq-eval` and `loanq-service` both need to record request outcomes,
//! latencies, and ad hoc counters (`evaluate_budget_exceeded`, write-back
//! publish failures, rule-evaluation failures) without depending on each
//! other, so the trait lives here. It is intentionally dependency-light so
//! downstream deployments can plug in Prometheus or OpenTelemetry without
//! redesign.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// The RPC surface operation a metric event describes.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `GetQuestions`.
    GetQuestions,
    /// `SubmitAnswer`.
    SubmitAnswer,
    /// `GetLoanState`.
    GetLoanState,
    /// `HealthCheck`.
    HealthCheck,
    /// `ReadinessCheck`.
    ReadinessCheck,
}

impl Operation {
    /// Returns a stable label for the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GetQuestions => "get_questions",
            Self::SubmitAnswer => "submit_answer",
            Self::GetLoanState => "get_loan_state",
            Self::HealthCheck => "health_check",
            Self::ReadinessCheck => "readiness_check",
        }
    }
}

/// Request outcome classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Successful request.
    Ok,
    /// Failed request.
    Error,
}

impl Outcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}

/// Request metric event payload.
///
/// # Invariants
/// - `error_kind` is `None` exactly when `outcome` is [`Outcome::Ok`].
#[derive(Debug, Clone)]
pub struct MetricEvent {
    /// The operation this event describes.
    pub operation: Operation,
    /// Request outcome.
    pub outcome: Outcome,
    /// Normalized error kind label, set only on [`Outcome::Error`].
    pub error_kind: Option<&'static str>,
}

impl MetricEvent {
    /// Builds a successful event for `operation`.
    #[must_use]
    pub const fn ok(operation: Operation) -> Self {
        Self { operation, outcome: Outcome::Ok, error_kind: None }
    }

    /// Builds a failed event for `operation` labeled with `error_kind`.
    #[must_use]
    pub const fn error(operation: Operation, error_kind: &'static str) -> Self {
        Self { operation, outcome: Outcome::Error, error_kind: Some(error_kind) }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for request counters, latencies, and ad hoc named counters
/// (`evaluate_budget_exceeded`, write-back publish failures, rule-evaluation
/// failures).
pub trait Telemetry: Send + Sync {
    /// Records a request counter event.
    fn record_request(&self, event: MetricEvent);

    /// Records a latency observation for the request.
    fn record_latency(&self, event: MetricEvent, latency: Duration);

    /// Increments a named counter by `value`.
    fn record_counter(&self, name: &'static str, value: u64);
}

/// No-op telemetry sink.
///
/// # Invariants
/// - Metrics are intentionally discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn record_request(&self, _event: MetricEvent) {}

    fn record_latency(&self, _event: MetricEvent, _latency: Duration) {}

    fn record_counter(&self, _name: &'static str, _value: u64) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only panic-based assertions are permitted.")]
mod tests {
    use super::*;

    #[test]
    fn noop_telemetry_accepts_all_events_without_panicking() {
        let telemetry = NoopTelemetry;
        telemetry.record_request(MetricEvent::ok(Operation::GetQuestions));
        telemetry.record_latency(MetricEvent::error(Operation::SubmitAnswer, "not_found"), Duration::from_millis(5));
        telemetry.record_counter("evaluate_budget_exceeded", 1);
    }

    #[test]
    fn metric_event_error_carries_the_error_kind() {
        let event = MetricEvent::error(Operation::GetLoanState, "unavailable");
        assert_eq!(event.outcome, Outcome::Error);
        assert_eq!(event.error_kind, Some("unavailable"));
    }
}
