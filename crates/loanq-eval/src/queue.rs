// crates/loanq-eval/src/queue.rs
// ============================================================================
// Module: Queue Builder
// Description: Turns the evaluator's unordered QueueItems into the ordered,
// client-facing QuestionQueueResponse.
// Purpose: Own the global sort, per-section progress, canAskTogether
// grouping, and nextRecommended selection.
// Dependencies: loanq-core, loanq-config
// ============================================================================

//! ## Overview
//! [`QueueBuilder`] is constructed once over an immutable [`ConfigRegistry`]
//! (it precomputes each section's total question count at construction,
//! since that never changes once startup completes) and is called once per
//! request with the evaluator's output and the current [`LoanState`]. A
//! section's `total` counts distinct registered questions, not
//! per-entity instances: [`LoanState::answered`] is itself entity-agnostic
//! (a flat set of question ids), so per-entity instance counting would make
//! `answered` incommensurable with `total`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use loanq_config::ConfigRegistry;
use loanq_core::LoanState;
use loanq_core::QuestionId;
use loanq_core::QueueItem;
use loanq_core::SectionId;
use loanq_core::SectionProgress;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Response DTOs
// ============================================================================

/// A run of consecutive queue items that may be asked together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanAskTogetherGroup {
    /// The grouped question ids, in queue order.
    pub question_ids: Vec<QuestionId>,
}

/// The full `GetQuestions`/`SubmitAnswer` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionQueueResponse {
    /// The ordered, not-yet-answered queue.
    pub queue: Vec<QueueItem>,
    /// Per-section progress, in section `sequence` order.
    pub sections: Vec<SectionProgress>,
    /// Groups of consecutive items that may be asked together.
    pub can_ask_together: Vec<CanAskTogetherGroup>,
    /// The id of the first queue item, or the empty string if the queue is
    /// empty.
    pub next_recommended: String,
    /// Carried from `LoanState.version` for client-side cache coherence.
    pub state_version: i64,
}

// ============================================================================
// SECTION: Queue Builder
// ============================================================================

/// Builds [`QuestionQueueResponse`]s over an immutable [`ConfigRegistry`].
pub struct QueueBuilder {
    registry: Arc<ConfigRegistry>,
    questions_by_section: HashMap<SectionId, Vec<QuestionId>>,
}

impl QueueBuilder {
    /// Precomputes each section's registered question ids from `registry`.
    #[must_use]
    pub fn new(registry: Arc<ConfigRegistry>) -> Self {
        let mut questions_by_section: HashMap<SectionId, Vec<QuestionId>> = HashMap::new();
        for level in loanq_core::EntityLevel::ORDER {
            for question in registry.questions_for_level(level) {
                questions_by_section.entry(question.section.clone()).or_default().push(question.id.clone());
            }
        }
        Self { registry, questions_by_section }
    }

    /// Sorts `items` by `(section.sequence, ordinal, entityPid)`, computes
    /// per-section progress, groups `canAskTogether` runs, and selects
    /// `nextRecommended`.
    #[must_use]
    pub fn build(&self, mut items: Vec<QueueItem>, loan_state: &LoanState) -> QuestionQueueResponse {
        let sequence_of: HashMap<&SectionId, u32> =
            self.registry.sections_sorted().iter().map(|section| (&section.id, section.sequence)).collect();

        items.sort_by(|a, b| {
            let key_a = (sequence_of.get(&a.section).copied().unwrap_or(u32::MAX), a.ordinal, a.entity_pid.clone());
            let key_b = (sequence_of.get(&b.section).copied().unwrap_or(u32::MAX), b.ordinal, b.entity_pid.clone());
            key_a.cmp(&key_b)
        });

        let sections = self
            .registry
            .sections_sorted()
            .iter()
            .map(|section| {
                let ids = self.questions_by_section.get(&section.id).map_or([].as_slice(), Vec::as_slice);
                let total = u32::try_from(ids.len()).unwrap_or(u32::MAX);
                let answered =
                    u32::try_from(ids.iter().filter(|id| loan_state.answered.contains(id)).count()).unwrap_or(u32::MAX);
                SectionProgress::new(section.id.clone(), total, answered)
            })
            .collect();

        let can_ask_together = group_can_ask_together(&items);
        let next_recommended = items.first().map(|item| item.question_id.as_str().to_string()).unwrap_or_default();

        QuestionQueueResponse {
            queue: items,
            sections,
            can_ask_together,
            next_recommended,
            state_version: loan_state.version,
        }
    }
}

fn group_can_ask_together(items: &[QueueItem]) -> Vec<CanAskTogetherGroup> {
    let mut groups = Vec::new();
    let mut current: Vec<&QueueItem> = Vec::new();

    for item in items {
        let extends = current.last().is_some_and(|prev| {
            prev.section == item.section
                && prev.entity_level == item.entity_level
                && prev.flexibility == item.flexibility
                && item.can_combine_with.contains(&prev.question_id)
        });

        if extends {
            current.push(item);
        } else {
            flush_group(&mut groups, &current);
            current = vec![item];
        }
    }
    flush_group(&mut groups, &current);
    groups
}

fn flush_group(groups: &mut Vec<CanAskTogetherGroup>, current: &[&QueueItem]) {
    if current.len() >= 2 {
        groups.push(CanAskTogetherGroup { question_ids: current.iter().map(|item| item.question_id.clone()).collect() });
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
