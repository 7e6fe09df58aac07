// crates/loanq-eval/src/answer.rs
// ============================================================================
// Module: Answer Handler
// Description: Resolves an answer submission into a field-level update,
// applies it to the State Cache, enqueues a durable write, and returns the
// recomputed queue.
// Purpose: Own the hot-path "record an answer" flow end to end.
// Dependencies: loanq-core, loanq-config, tokio
// ============================================================================

//! ## Overview
//! [`AnswerHandler::submit`] is the five-step flow: resolve the question,
//! derive access-field updates from the answer payload, apply them through
//! [`crate::cache::StateCache::update`] (the hot-path source-of-truth write),
//! enqueue a durable write record and swallow a publish failure (logging a
//! counter instead of failing the response), and re-run the evaluator and
//! queue builder against the freshly updated state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use loanq_config::ConfigRegistry;
use loanq_core::Clock;
use loanq_core::EntityPid;
use loanq_core::FieldValue;
use loanq_core::ProposalPid;
use loanq_core::QuestionId;
use loanq_core::Telemetry;
use loanq_core::WriteBackQueue;
use loanq_core::WriteBackRecord;
use thiserror::Error;

use crate::cache::StateCache;
use crate::cache::StateCacheError;
use crate::evaluator::QuestionEvaluator;
use crate::queue::QueueBuilder;
use crate::queue::QuestionQueueResponse;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Answer Handler errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum AnswerError {
    /// The question id does not exist in the registry.
    #[error("question not found: {0}")]
    QuestionNotFound(QuestionId),
    /// The answer payload does not match the question's form-field shape.
    #[error("invalid answer: {0}")]
    InvalidArgument(String),
    /// The State Cache update failed.
    #[error("state cache error: {0}")]
    Cache(#[from] StateCacheError),
}

// ============================================================================
// SECTION: Answer Handler
// ============================================================================

/// Applies an answer submission and returns the recomputed queue.
pub struct AnswerHandler {
    registry: Arc<ConfigRegistry>,
    cache: Arc<StateCache>,
    evaluator: Arc<QuestionEvaluator>,
    queue_builder: Arc<QueueBuilder>,
    write_queue: Arc<dyn WriteBackQueue>,
    clock: Arc<dyn Clock>,
    telemetry: Arc<dyn Telemetry>,
    enqueue_timeout: Duration,
}

impl AnswerHandler {
    /// Builds an answer handler wiring the registry, state cache, evaluator,
    /// and queue builder together with the write-back queue.
    #[must_use]
    pub fn new(
        registry: Arc<ConfigRegistry>,
        cache: Arc<StateCache>,
        evaluator: Arc<QuestionEvaluator>,
        queue_builder: Arc<QueueBuilder>,
        write_queue: Arc<dyn WriteBackQueue>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn Telemetry>,
        enqueue_timeout: Duration,
    ) -> Self {
        Self { registry, cache, evaluator, queue_builder, write_queue, clock, telemetry, enqueue_timeout }
    }

    /// Resolves `question_id`, applies `answer` as one or more field
    /// updates, updates the State Cache, enqueues a durable write (swallowed
    /// on failure), and returns the recomputed [`QuestionQueueResponse`].
    ///
    /// # Errors
    ///
    /// Returns [`AnswerError::QuestionNotFound`] if `question_id` is
    /// unknown, [`AnswerError::InvalidArgument`] if `answer` does not match
    /// the question's form-field shape, or [`AnswerError::Cache`] if the
    /// state update fails.
    pub async fn submit(
        &self,
        pid: &ProposalPid,
        question_id: &QuestionId,
        entity_pid: Option<EntityPid>,
        answer: serde_json::Value,
        raw_input: Option<String>,
        confidence: Option<f64>,
    ) -> Result<QuestionQueueResponse, AnswerError> {
        let question =
            self.registry.question(question_id).ok_or_else(|| AnswerError::QuestionNotFound(question_id.clone()))?;

        let delta = derive_field_updates(question, &answer)?;

        let state = self.cache.update(pid, delta.clone(), question_id.clone()).await?;

        let record = WriteBackRecord {
            proposal_pid: pid.clone(),
            question_id: question_id.clone(),
            entity_pid,
            field_updates: delta,
            timestamp: self.clock.now(),
            raw_input,
            confidence,
        };
        if self.write_queue.enqueue(record, self.enqueue_timeout).await.is_err() {
            self.telemetry.record_counter("write_back_enqueue_failed", 1);
        }

        let items = self.evaluator.evaluate(&state);
        Ok(self.queue_builder.build(items, &state))
    }
}

fn derive_field_updates(
    question: &loanq_core::Question,
    answer: &serde_json::Value,
) -> Result<BTreeMap<String, FieldValue>, AnswerError> {
    match question.form_fields.as_slice() {
        [] => Err(AnswerError::InvalidArgument(format!("question {} has no form fields", question.id))),
        [single] => {
            let value = json_to_field_value(answer)?;
            Ok(BTreeMap::from([(single.access_field.clone(), value)]))
        }
        fields => {
            let serde_json::Value::Object(map) = answer else {
                return Err(AnswerError::InvalidArgument(
                    "multi-field question requires an object answer keyed by form-field label".to_string(),
                ));
            };
            let mut delta = BTreeMap::new();
            for (label, value) in map {
                let field = fields
                    .iter()
                    .find(|field| &field.label == label)
                    .ok_or_else(|| AnswerError::InvalidArgument(format!("unknown form-field label: {label}")))?;
                delta.insert(field.access_field.clone(), json_to_field_value(value)?);
            }
            Ok(delta)
        }
    }
}

fn json_to_field_value(value: &serde_json::Value) -> Result<FieldValue, AnswerError> {
    match value {
        serde_json::Value::Null => Ok(FieldValue::Null),
        serde_json::Value::Bool(boolean) => Ok(FieldValue::Bool(*boolean)),
        serde_json::Value::Number(number) => Ok(FieldValue::Number(number.clone())),
        serde_json::Value::String(text) => Ok(FieldValue::Text(text.clone())),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
            Err(AnswerError::InvalidArgument("answer value must be a scalar".to_string()))
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
