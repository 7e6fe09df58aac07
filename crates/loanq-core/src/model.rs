// crates/loanq-core/src/model.rs
// ============================================================================
// Module: LoanQ Data Model
// Description: Section, Question, FormField, EntityRef, LoanState, QueueItem,
// and SectionProgress — the shared data model described in the data model
// section of the specification.
// Purpose: Give every other crate one agreed-upon shape for the proposal
// working set and the per-response queue it produces.
// Dependencies: serde, crate::identifiers, crate::fields, crate::time
// ============================================================================

//! ## Overview
//! `Section` and `Question` are loaded once at startup by the Configuration
//! Registry and are immutable thereafter. `LoanState` is the per-proposal
//! working set materialized by the State Loader and mutated in place by the
//! Answer Handler through the State Cache. `QueueItem` and `SectionProgress`
//! are built fresh for each response and never persisted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::fields::FieldValue;
use crate::identifiers::EntityLevel;
use crate::identifiers::EntityPid;
use crate::identifiers::ProposalPid;
use crate::identifiers::QuestionId;
use crate::identifiers::SectionId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Section
// ============================================================================

/// A logical grouping of questions, loaded once at startup and immutable.
///
/// # Invariants
/// - `sequence` is a total order across all sections; ties are forbidden
///   (enforced by the Configuration Registry at load time).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Section identifier.
    pub id: SectionId,
    /// Human-readable section name.
    pub name: String,
    /// Total order across all sections.
    pub sequence: u32,
    /// Optional descriptive text.
    #[serde(default)]
    pub description: Option<String>,
}

// ============================================================================
// SECTION: Flexibility
// ============================================================================

/// How strictly the conversational layer must match an answer to a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flexibility {
    /// The answer must match one of a fixed set of values exactly.
    Exact,
    /// The answer is matched against expected phrasing conversationally.
    Conversational,
    /// The answer is inferred from surrounding conversation, not asked directly.
    Inferred,
    /// The question may be skipped without blocking progress.
    Optional,
}

// ============================================================================
// SECTION: FormField
// ============================================================================

/// Mapping from a question's answer to a system-of-record column.
///
/// # Invariants
/// - `order` is unique within the owning question's `form_fields`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    /// Position among the owning question's form fields.
    pub order: u32,
    /// Label used to key a multi-field answer mapping.
    pub label: String,
    /// System-of-record column the answer value is written to.
    #[serde(rename = "access_field")]
    pub access_field: String,
    /// Whether this field is prepopulated from existing state.
    #[serde(default)]
    pub prepopulate: bool,
}

// ============================================================================
// SECTION: Question
// ============================================================================

/// A single conversational prompt bound to a compiled rule.
///
/// # Invariants
/// - Belongs to exactly one [`Section`]; `ordinal` is unique within it.
/// - Has a compiled rule registered under `id.rule_id()`; startup fails if
///   the criteria fails to compile.
/// - `always_applicable` is true exactly when the source criteria string was
///   empty, letting the evaluator short-circuit around the Rules Engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Question identifier.
    pub id: QuestionId,
    /// Owning section.
    pub section: SectionId,
    /// Position within the owning section.
    pub ordinal: u32,
    /// Entity scope this question applies to.
    pub level: EntityLevel,
    /// Template text with `{{field}}` placeholders.
    pub instructions: String,
    /// Conversational input kind (free-form; opaque to the engine).
    #[serde(rename = "type")]
    pub input_kind: String,
    /// Answer-to-column mappings, ordered.
    #[serde(default, rename = "form_fields")]
    pub form_fields: Vec<FormField>,
    /// Raw criteria string as authored (kept for the `explain` debug command).
    pub criteria: String,
    /// How strictly an answer must match.
    pub flexibility: Flexibility,
    /// Fixed answer choices, when applicable.
    #[serde(default)]
    pub options: Option<Vec<String>>,
    /// Other question ids this question may be grouped with when adjacent in
    /// the queue (`canAskTogether`).
    #[serde(default)]
    pub can_combine_with: Vec<QuestionId>,
    /// True when the criteria string was empty at load time.
    #[serde(default)]
    pub always_applicable: bool,
}

// ============================================================================
// SECTION: EntityRef
// ============================================================================

/// An instance of a borrower, job, asset, liability, or owned property,
/// materialized from the loader per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRef {
    /// Entity identifier.
    pub pid: EntityPid,
    /// Human-readable display name.
    pub display_name: String,
    /// Flattened field map for this entity.
    pub fields: BTreeMap<String, FieldValue>,
}

// ============================================================================
// SECTION: Entity Collections
// ============================================================================

/// The five typed entity lists that make up a proposal's entity graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityCollections {
    /// Borrowers on the deal.
    #[serde(default)]
    pub borrowers: Vec<EntityRef>,
    /// Jobs held by borrowers.
    #[serde(default)]
    pub jobs: Vec<EntityRef>,
    /// Assets held by borrowers.
    #[serde(default)]
    pub assets: Vec<EntityRef>,
    /// Liabilities held by borrowers.
    #[serde(default)]
    pub liabilities: Vec<EntityRef>,
    /// Real-estate-owned properties.
    #[serde(default)]
    pub real_estate_owned: Vec<EntityRef>,
}

impl EntityCollections {
    /// Returns the entity list for a non-singleton entity level.
    ///
    /// Returns `None` for `Proposal`/`Property`, which are singleton
    /// contexts with no materialized entity list.
    #[must_use]
    pub fn for_level(&self, level: EntityLevel) -> Option<&[EntityRef]> {
        match level {
            EntityLevel::Borrower => Some(&self.borrowers),
            EntityLevel::Job => Some(&self.jobs),
            EntityLevel::Asset => Some(&self.assets),
            EntityLevel::Liability => Some(&self.liabilities),
            EntityLevel::RealEstateOwned => Some(&self.real_estate_owned),
            EntityLevel::Proposal | EntityLevel::Property => None,
        }
    }
}

// ============================================================================
// SECTION: LoanState
// ============================================================================

/// The full per-proposal working set.
///
/// # Invariants
/// - `answered` is a subset of the set of known question ids.
/// - `version` strictly increases on each mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanState {
    /// Proposal identifier.
    pub proposal_pid: ProposalPid,
    /// Monotonic version token; bumped on every mutation.
    pub version: i64,
    /// Wall time the state was first materialized.
    pub loaded_at: Timestamp,
    /// Proposal and property fields, flattened, property columns prefixed
    /// `property_`.
    pub fields: BTreeMap<String, FieldValue>,
    /// The five typed entity lists.
    pub entities: EntityCollections,
    /// Question ids already answered for this proposal.
    pub answered: BTreeSet<QuestionId>,
}

// ============================================================================
// SECTION: QueueItem
// ============================================================================

/// A question instantiated against a specific entity (or the null slot for
/// singleton levels), built per response and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// The question this item instantiates.
    pub question_id: QuestionId,
    /// The owning section, carried for the Queue Builder's sort/progress pass.
    pub section: SectionId,
    /// Position within the owning section.
    pub ordinal: u32,
    /// Entity scope.
    pub entity_level: EntityLevel,
    /// Entity this item was instantiated against, `None` for singleton levels.
    pub entity_pid: Option<EntityPid>,
    /// Display name of the instantiating entity, when present.
    pub entity_display_name: Option<String>,
    /// Instructions with merge-field placeholders resolved.
    pub rendered_text: String,
    /// Conversational input kind, copied from the question.
    pub input_kind: String,
    /// Fixed answer choices, when applicable.
    pub options: Option<Vec<String>>,
    /// Primary system-of-record column (first form field, if any).
    pub access_field: String,
    /// How strictly an answer must match.
    pub flexibility: Flexibility,
    /// Other question ids this item may be grouped with.
    pub can_combine_with: Vec<QuestionId>,
}

// ============================================================================
// SECTION: SectionProgress
// ============================================================================

/// Lifecycle status of a section's progress within a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    /// No questions in this section have been answered.
    Pending,
    /// Some but not all questions in this section have been answered.
    InProgress,
    /// Every question in this section has been answered.
    Complete,
}

/// Per-section counters built fresh for each response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionProgress {
    /// The section these counters describe.
    pub section_id: SectionId,
    /// Total questions belonging to this section, across all entities.
    pub total: u32,
    /// Answered questions belonging to this section.
    pub answered: u32,
    /// Derived lifecycle status.
    pub status: SectionStatus,
}

impl SectionProgress {
    /// Builds section progress from raw counters, deriving `status`.
    #[must_use]
    pub fn new(section_id: SectionId, total: u32, answered: u32) -> Self {
        let status = if answered == 0 {
            SectionStatus::Pending
        } else if answered >= total {
            SectionStatus::Complete
        } else {
            SectionStatus::InProgress
        };
        Self {
            section_id,
            total,
            answered,
            status,
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]
mod tests {
    use super::*;

    #[test]
    fn section_progress_pending_when_nothing_answered() {
        let progress = SectionProgress::new(SectionId::new("s1"), 5, 0);
        assert_eq!(progress.status, SectionStatus::Pending);
    }

    #[test]
    fn section_progress_complete_when_fully_answered() {
        let progress = SectionProgress::new(SectionId::new("s1"), 5, 5);
        assert_eq!(progress.status, SectionStatus::Complete);
    }

    #[test]
    fn section_progress_in_progress_otherwise() {
        let progress = SectionProgress::new(SectionId::new("s1"), 5, 2);
        assert_eq!(progress.status, SectionStatus::InProgress);
    }

    #[test]
    fn entity_collections_singleton_levels_return_none() {
        let entities = EntityCollections::default();
        assert!(entities.for_level(EntityLevel::Proposal).is_none());
        assert!(entities.for_level(EntityLevel::Property).is_none());
        assert_eq!(entities.for_level(EntityLevel::Borrower), Some([].as_slice()));
    }
}
