// crates/loanq-core/src/interfaces.rs
// ============================================================================
// Module: LoanQ Narrow Interfaces
// Description: Backend-agnostic traits for the system of record, the remote
// cache, and the write-back queue — the three out-of-scope external
// collaborators the engine is consumed through.
// Purpose: Keep the core decoupled from any concrete relational driver,
// key/value client, or message-queue client.
// Dependencies: async-trait, serde, crate::model, crate::fields, crate::time
// ============================================================================

//! ## Overview
//! The wire RPC server, the relational client driver, the key/value client,
//! and the message-queue client are all explicitly out of scope; this module
//! is the narrow interface layer the rest of the engine is written against.
//! Production deployments supply real implementations; `loanq-store` and
//! `loanq-broker` supply reference implementations for tests and local runs.
//! Implementations must be deterministic given their backing data and must
//! respect the per-call timeout they are handed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::fields::FieldValue;
use crate::identifiers::EntityPid;
use crate::identifiers::ProposalPid;
use crate::identifiers::QuestionId;
use crate::model::EntityCollections;
use crate::time::Timestamp;

// ============================================================================
// SECTION: System of Record
// ============================================================================

/// A proposal row as read from the system of record, prior to normalization
/// into a `LoanState`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalRecord {
    /// Proposal identifier.
    pub pid: ProposalPid,
    /// Identifier of the owning deal, used to resolve borrowers/property.
    pub deal_pid: String,
    /// Raw proposal fields, not yet lower-camel normalized.
    pub fields: BTreeMap<String, FieldValue>,
}

/// System-of-record errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested row does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The per-call timeout elapsed before a result was available.
    #[error("system of record timed out")]
    Timeout,
    /// The backing store is unreachable or returned a transport-level error.
    #[error("system of record unavailable: {0}")]
    Unavailable(String),
}

/// The relational system of record, consumed through this narrow interface
/// by the State Loader.
#[async_trait]
pub trait SystemOfRecord: Send + Sync {
    /// Fetches a proposal by pid.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the proposal does not exist.
    async fn fetch_proposal(
        &self,
        pid: &ProposalPid,
        timeout: Duration,
    ) -> Result<ProposalRecord, StoreError>;

    /// Fetches the borrowers for a deal.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on timeout or backend unavailability. An empty
    /// result set is not an error.
    async fn fetch_borrowers(
        &self,
        deal_pid: &str,
        timeout: Duration,
    ) -> Result<Vec<crate::model::EntityRef>, StoreError>;

    /// Fetches jobs held by the given borrower pids.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on timeout or backend unavailability. An empty
    /// result set is not an error.
    async fn fetch_jobs(
        &self,
        borrower_pids: &[EntityPid],
        timeout: Duration,
    ) -> Result<Vec<crate::model::EntityRef>, StoreError>;

    /// Fetches assets held by the given borrower pids.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on timeout or backend unavailability. An empty
    /// result set is not an error.
    async fn fetch_assets(
        &self,
        borrower_pids: &[EntityPid],
        timeout: Duration,
    ) -> Result<Vec<crate::model::EntityRef>, StoreError>;

    /// Fetches liabilities held by the given borrower pids.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on timeout or backend unavailability. An empty
    /// result set is not an error.
    async fn fetch_liabilities(
        &self,
        borrower_pids: &[EntityPid],
        timeout: Duration,
    ) -> Result<Vec<crate::model::EntityRef>, StoreError>;

    /// Fetches real-estate-owned properties held by the given borrower pids.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on timeout or backend unavailability. An empty
    /// result set is not an error.
    async fn fetch_real_estate_owned(
        &self,
        borrower_pids: &[EntityPid],
        timeout: Duration,
    ) -> Result<Vec<crate::model::EntityRef>, StoreError>;

    /// Fetches the subject property row for a deal, raw field names (not yet
    /// `property_`-prefixed).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on timeout or backend unavailability.
    async fn fetch_property(
        &self,
        deal_pid: &str,
        timeout: Duration,
    ) -> Result<BTreeMap<String, FieldValue>, StoreError>;

    /// Fetches the distinct set of already-answered question ids for a deal.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on timeout or backend unavailability. An empty
    /// result set is not an error.
    async fn fetch_answered_question_ids(
        &self,
        deal_pid: &str,
        timeout: Duration,
    ) -> Result<BTreeSet<QuestionId>, StoreError>;
}

// ============================================================================
// SECTION: Remote Cache
// ============================================================================

/// The `loan:<pid>:meta` payload: everything about a `LoanState` that is not
/// itself a field map, entity graph, or answered set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMeta {
    /// Monotonic version token.
    pub version: i64,
    /// Wall time the state was first materialized.
    pub loaded_at: Timestamp,
}

/// The four split-key values written together as one atomic pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheWrite {
    /// `loan:<pid>:fields`.
    pub fields: BTreeMap<String, FieldValue>,
    /// `loan:<pid>:entities`.
    pub entities: EntityCollections,
    /// `loan:<pid>:answered`.
    pub answered: BTreeSet<QuestionId>,
    /// `loan:<pid>:meta`.
    pub meta: CacheMeta,
}

/// Remote-cache errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The per-call timeout elapsed before a result was available.
    #[error("remote cache timed out")]
    Timeout,
    /// The backing cache is unreachable.
    #[error("remote cache unavailable: {0}")]
    Unavailable(String),
    /// A stored value failed to decode under the binary codec.
    #[error("remote cache codec error: {0}")]
    Codec(String),
}

/// The remote key/value cache, consumed through this narrow interface by the
/// State Cache.
///
/// Implementations transport `fields`/`entities`/`meta` under a compact
/// binary (msgpack-family) codec and `answered` as the store's native set
/// type (see `loanq-broker::InMemoryRemoteCache` for the reference shape).
#[async_trait]
pub trait RemoteCache: Send + Sync {
    /// Reads `loan:<pid>:fields`. `None` means absent (cache miss).
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on timeout, unavailability, or codec failure.
    async fn get_fields(
        &self,
        pid: &ProposalPid,
        timeout: Duration,
    ) -> Result<Option<BTreeMap<String, FieldValue>>, CacheError>;

    /// Reads `loan:<pid>:entities`. `None` means absent (cache miss).
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on timeout, unavailability, or codec failure.
    async fn get_entities(
        &self,
        pid: &ProposalPid,
        timeout: Duration,
    ) -> Result<Option<EntityCollections>, CacheError>;

    /// Reads `loan:<pid>:answered`. `None` means absent; an empty set is a
    /// legitimate, present value and is distinct from absence.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on timeout or unavailability.
    async fn get_answered(
        &self,
        pid: &ProposalPid,
        timeout: Duration,
    ) -> Result<Option<BTreeSet<QuestionId>>, CacheError>;

    /// Reads `loan:<pid>:meta`. `None` means absent (cache miss).
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on timeout, unavailability, or codec failure.
    async fn get_meta(
        &self,
        pid: &ProposalPid,
        timeout: Duration,
    ) -> Result<Option<CacheMeta>, CacheError>;

    /// Atomically writes all four split keys with the given TTL: `fields`,
    /// `entities`, and `meta` are set; `answered` is deleted first and only
    /// set again if non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on timeout or unavailability. On error, no
    /// partial write is observable by readers.
    async fn write_pipeline(
        &self,
        pid: &ProposalPid,
        write: CacheWrite,
        ttl: Duration,
        timeout: Duration,
    ) -> Result<(), CacheError>;

    /// Deletes all four split keys for a proposal.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on timeout or unavailability.
    async fn delete(&self, pid: &ProposalPid, timeout: Duration) -> Result<(), CacheError>;
}

// ============================================================================
// SECTION: Write-Back Queue
// ============================================================================

/// A durable write record enqueued when an answer is submitted; the consumer
/// (outside scope) is responsible for persisting it to the system of record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteBackRecord {
    /// Proposal the answer belongs to.
    pub proposal_pid: ProposalPid,
    /// Question that was answered.
    pub question_id: QuestionId,
    /// Entity the answer applies to, when the question is entity-scoped.
    pub entity_pid: Option<EntityPid>,
    /// Access-field-to-value updates derived from the answer.
    pub field_updates: BTreeMap<String, FieldValue>,
    /// Submission time.
    pub timestamp: Timestamp,
    /// Raw conversational input, when captured.
    pub raw_input: Option<String>,
    /// Extraction confidence, when captured.
    pub confidence: Option<f64>,
}

/// Write-back queue errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The per-call timeout elapsed before publish was acknowledged.
    #[error("write-back queue timed out")]
    Timeout,
    /// The backing queue is unreachable.
    #[error("write-back queue unavailable: {0}")]
    Unavailable(String),
}

/// The message-queue client, consumed through this narrow interface by the
/// Answer Handler. Enqueue failures are a durability warning, not a hot-path
/// failure: callers log and count them but do not fail the response.
#[async_trait]
pub trait WriteBackQueue: Send + Sync {
    /// Enqueues a durable write record.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] on timeout or unavailability.
    async fn enqueue(&self, record: WriteBackRecord, timeout: Duration) -> Result<(), QueueError>;
}
