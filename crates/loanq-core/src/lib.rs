// crates/loanq-core/src/lib.rs
// ============================================================================
// Module: LoanQ Core Library
// Description: Shared data model, identifiers, comparator evaluation, and
// narrow interface traits for the question-evaluation engine.
// Purpose: Provide the backend-agnostic contract surface every other LoanQ
// crate builds on.
// Dependencies: serde, serde_json, thiserror, bigdecimal, time
// ============================================================================

//! ## Overview
//! `loanq-core` holds everything the question-evaluation pipeline agrees on:
//! identifiers, the proposal data model, the comparator semantics shared by
//! the criteria compiler and rules engine, and the narrow traits through
//! which the engine talks to its out-of-scope collaborators (the system of
//! record, the remote cache, the write-back queue). Nothing in this crate
//! performs I/O.

#![deny(missing_docs)]

pub mod error;
pub mod fields;
pub mod identifiers;
pub mod interfaces;
pub mod model;
pub mod telemetry;
pub mod time;

pub use error::EngineError;
pub use fields::Comparator;
pub use fields::FieldValue;
pub use fields::evaluate_comparator;
pub use fields::normalize_field_name;
pub use identifiers::EntityLevel;
pub use identifiers::EntityPid;
pub use identifiers::ProposalPid;
pub use identifiers::QuestionId;
pub use identifiers::SectionId;
pub use interfaces::CacheError;
pub use interfaces::CacheMeta;
pub use interfaces::CacheWrite;
pub use interfaces::ProposalRecord;
pub use interfaces::QueueError;
pub use interfaces::RemoteCache;
pub use interfaces::StoreError;
pub use interfaces::SystemOfRecord;
pub use interfaces::WriteBackQueue;
pub use interfaces::WriteBackRecord;
pub use model::EntityCollections;
pub use model::EntityRef;
pub use model::Flexibility;
pub use model::FormField;
pub use model::LoanState;
pub use model::Question;
pub use model::QueueItem;
pub use model::Section;
pub use model::SectionProgress;
pub use model::SectionStatus;
pub use telemetry::MetricEvent;
pub use telemetry::NoopTelemetry;
pub use telemetry::Operation;
pub use telemetry::Outcome;
pub use telemetry::Telemetry;
pub use time::Clock;
pub use time::SystemClock;
pub use time::Timestamp;
