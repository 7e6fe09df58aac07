// crates/loanq-core/src/identifiers.rs
// ============================================================================
// Module: LoanQ Identifiers
// Description: Canonical opaque identifiers for proposals, questions, sections,
// and entities, plus the entity-level enumeration.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers in this crate are opaque wrappers over `String`; they carry no
//! normalization of their own (field-name/value normalization is a Criteria
//! Compiler concern, not an identifier concern). `EntityLevel` is the one
//! closed enumeration other modules switch on.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Identifier of an in-progress loan application.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalPid(String);

impl ProposalPid {
    /// Creates a new proposal identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the identifier is the empty string.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ProposalPid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ProposalPid {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProposalPid {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Identifier of a compiled, registered question.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(String);

impl QuestionId {
    /// Creates a new question identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the rules-engine registration key for this question, of the
    /// form `question:<id>`.
    #[must_use]
    pub fn rule_id(&self) -> String {
        format!("question:{}", self.0)
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for QuestionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for QuestionId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Identifier of a logical section grouping questions.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(String);

impl SectionId {
    /// Creates a new section identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for SectionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SectionId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Identifier of an entity instance (borrower, job, asset, liability, or
/// owned property) materialized from the loader.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityPid(String);

impl EntityPid {
    /// Creates a new entity identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityPid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for EntityPid {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EntityPid {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Entity Level
// ============================================================================

/// The scope a question applies to.
///
/// # Invariants
/// - `Proposal` and `Property` are singleton contexts: the applicable entity
///   set is a single null-entity slot rather than a materialized list.
/// - Iteration order over all levels (for the evaluator's fixed traversal) is
///   the declaration order below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityLevel {
    /// The loan proposal itself; singleton context.
    Proposal,
    /// A borrower on the deal.
    Borrower,
    /// A borrower's job.
    Job,
    /// A borrower's asset.
    Asset,
    /// A borrower's liability.
    Liability,
    /// The subject property; singleton context.
    Property,
    /// A real-estate-owned property.
    RealEstateOwned,
}

impl EntityLevel {
    /// The fixed traversal order the Question Evaluator iterates in.
    pub const ORDER: [EntityLevel; 7] = [
        EntityLevel::Proposal,
        EntityLevel::Borrower,
        EntityLevel::Job,
        EntityLevel::Asset,
        EntityLevel::Liability,
        EntityLevel::Property,
        EntityLevel::RealEstateOwned,
    ];

    /// Returns true if this level is a singleton context (a single null-entity
    /// slot rather than a materialized entity list).
    #[must_use]
    pub const fn is_singleton(self) -> bool {
        matches!(self, EntityLevel::Proposal | EntityLevel::Property)
    }
}

impl fmt::Display for EntityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityLevel::Proposal => "PROPOSAL",
            EntityLevel::Borrower => "BORROWER",
            EntityLevel::Job => "JOB",
            EntityLevel::Asset => "ASSET",
            EntityLevel::Liability => "LIABILITY",
            EntityLevel::Property => "PROPERTY",
            EntityLevel::RealEstateOwned => "REAL_ESTATE_OWNED",
        };
        f.write_str(label)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
