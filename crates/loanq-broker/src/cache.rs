// crates/loanq-broker/src/cache.rs
// ============================================================================
// Module: In-Memory Remote Cache
// Description: Reference `RemoteCache` backed by a process-local map.
// Purpose: Stand in for the out-of-scope key/value client.
// Dependencies: loanq-core, async-trait, rmp-serde
// ============================================================================

//! ## Overview
//! [`InMemoryRemoteCache`] stores one row per proposal behind a single
//! `Mutex`, rather than four independently-locked keys. This is a
//! simplification the reference adapter is free to make: the four-split-key
//! shape in the specification describes the wire schema a real key/value
//! store exposes, not a constraint on how an in-process stand-in must be
//! laid out, and collapsing to one row trivially gives the atomicity
//! `write_pipeline` promises (`fields`/`entities`/`meta`/`answered` are
//! replaced together under one lock acquisition, so no reader ever observes
//! a mix of old and new values). `fields`/`entities`/`meta` are still
//! round-tripped through the binary codec on every read/write so this
//! adapter exercises the same (de)serialization path a real `msgpack`-family
//! client would.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use loanq_core::CacheError;
use loanq_core::CacheMeta;
use loanq_core::CacheWrite;
use loanq_core::EntityCollections;
use loanq_core::FieldValue;
use loanq_core::ProposalPid;
use loanq_core::QuestionId;
use loanq_core::RemoteCache;

// ============================================================================
// SECTION: Stored Entry
// ============================================================================

struct StoredEntry {
    fields: Vec<u8>,
    entities: Vec<u8>,
    answered: BTreeSet<QuestionId>,
    meta: Vec<u8>,
    expires_at: Instant,
}

/// Reference [`RemoteCache`] backed by a process-local map, standing in for
/// the out-of-scope key/value client.
///
/// # Invariants
/// - A proposal's four logical keys are written and read as one row, so
///   `write_pipeline` is atomic by construction.
/// - Expired rows are treated as absent on read; they are lazily dropped on
///   the next write or explicit `delete`, not by a background sweep.
pub struct InMemoryRemoteCache {
    rows: Mutex<HashMap<String, StoredEntry>>,
}

impl InMemoryRemoteCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self { rows: Mutex::new(HashMap::new()) }
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredEntry>> {
        self.rows.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn live_entry<'a>(rows: &'a HashMap<String, StoredEntry>, key: &str) -> Option<&'a StoredEntry> {
        rows.get(key).filter(|entry| entry.expires_at > Instant::now())
    }
}

impl Default for InMemoryRemoteCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteCache for InMemoryRemoteCache {
    async fn get_fields(
        &self,
        pid: &ProposalPid,
        _timeout: Duration,
    ) -> Result<Option<BTreeMap<String, FieldValue>>, CacheError> {
        let rows = self.locked();
        Self::live_entry(&rows, pid.as_str())
            .map(|entry| decode(&entry.fields))
            .transpose()
    }

    async fn get_entities(
        &self,
        pid: &ProposalPid,
        _timeout: Duration,
    ) -> Result<Option<EntityCollections>, CacheError> {
        let rows = self.locked();
        Self::live_entry(&rows, pid.as_str())
            .map(|entry| decode(&entry.entities))
            .transpose()
    }

    async fn get_answered(
        &self,
        pid: &ProposalPid,
        _timeout: Duration,
    ) -> Result<Option<BTreeSet<QuestionId>>, CacheError> {
        let rows = self.locked();
        Ok(Self::live_entry(&rows, pid.as_str()).map(|entry| entry.answered.clone()))
    }

    async fn get_meta(&self, pid: &ProposalPid, _timeout: Duration) -> Result<Option<CacheMeta>, CacheError> {
        let rows = self.locked();
        Self::live_entry(&rows, pid.as_str())
            .map(|entry| decode(&entry.meta))
            .transpose()
    }

    async fn write_pipeline(
        &self,
        pid: &ProposalPid,
        write: CacheWrite,
        ttl: Duration,
        _timeout: Duration,
    ) -> Result<(), CacheError> {
        let entry = StoredEntry {
            fields: encode(&write.fields)?,
            entities: encode(&write.entities)?,
            answered: write.answered,
            meta: encode(&write.meta)?,
            expires_at: Instant::now() + ttl,
        };
        self.locked().insert(pid.as_str().to_string(), entry);
        Ok(())
    }

    async fn delete(&self, pid: &ProposalPid, _timeout: Duration) -> Result<(), CacheError> {
        self.locked().remove(pid.as_str());
        Ok(())
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, CacheError> {
    rmp_serde::to_vec(value).map_err(|err| CacheError::Codec(err.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, CacheError> {
    rmp_serde::from_slice(bytes).map_err(|err| CacheError::Codec(err.to_string()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
