// crates/loanq-eval/src/cache.rs
// ============================================================================
// Module: State Cache Orchestration
// Description: Read-through/write-through orchestration over RemoteCache and
// StateLoader.
// Purpose: Give the rest of the pipeline one `get/update/invalidate/
// is_cached` surface, hiding the read-through-on-miss and write-through
// policy from callers.
// Dependencies: loanq-core, tokio
// ============================================================================

//! ## Overview
//! [`StateCache`] owns no in-process map of `LoanState` values; every call
//! round-trips through the injected [`RemoteCache`]. `get` reads the four
//! split keys concurrently; if `fields`, `entities`, or `meta` is absent (or
//! a read fails), the entry is treated as incomplete, a full reload runs
//! through [`StateLoader`], and the result is written back best-effort
//! (a refill failure is logged and counted, never surfaced — the loader's
//! result is already authoritative). `update` and `invalidate` are the
//! *writes*: they propagate remote-cache failures, since there is no
//! fallback for them the way there is for a read miss.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use loanq_core::CacheError;
use loanq_core::CacheMeta;
use loanq_core::CacheWrite;
use loanq_core::Clock;
use loanq_core::FieldValue;
use loanq_core::LoanState;
use loanq_core::ProposalPid;
use loanq_core::QuestionId;
use loanq_core::RemoteCache;
use loanq_core::Telemetry;
use thiserror::Error;

use crate::loader::LoaderError;
use crate::loader::StateLoader;

/// Default TTL applied to all four split keys, per the remote store key
/// schema.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// State Cache orchestration errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum StateCacheError {
    /// The underlying full reload failed.
    #[error("state loader error: {0}")]
    Loader(#[from] LoaderError),
    /// A remote-cache write failed (no fallback exists for writes).
    #[error("remote cache error: {0}")]
    Cache(#[from] CacheError),
}

// ============================================================================
// SECTION: State Cache
// ============================================================================

/// Read-through/write-through orchestration over [`RemoteCache`] and
/// [`StateLoader`].
pub struct StateCache {
    remote: Arc<dyn RemoteCache>,
    loader: StateLoader,
    clock: Arc<dyn Clock>,
    telemetry: Arc<dyn Telemetry>,
    ttl: Duration,
    call_timeout: Duration,
}

impl StateCache {
    /// Builds a state cache over `remote`, falling through to `loader` on a
    /// miss. Every remote-cache call is given `call_timeout`; writes set a
    /// TTL of `ttl`.
    #[must_use]
    pub fn new(
        remote: Arc<dyn RemoteCache>,
        loader: StateLoader,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn Telemetry>,
        ttl: Duration,
        call_timeout: Duration,
    ) -> Self {
        Self { remote, loader, clock, telemetry, ttl, call_timeout }
    }

    /// Reads the `LoanState` for `pid`, reloading from the system of record
    /// on a cache miss or an incomplete entry.
    ///
    /// # Errors
    ///
    /// Returns [`StateCacheError::Loader`] if the proposal is unknown or the
    /// fallback reload fails. A remote-cache read failure never propagates
    /// here; it is treated as a miss.
    pub async fn get(&self, pid: &ProposalPid) -> Result<LoanState, StateCacheError> {
        let (fields, entities, meta, answered) = tokio::join!(
            self.remote.get_fields(pid, self.call_timeout),
            self.remote.get_entities(pid, self.call_timeout),
            self.remote.get_meta(pid, self.call_timeout),
            self.remote.get_answered(pid, self.call_timeout),
        );

        if let (Ok(Some(fields)), Ok(Some(entities)), Ok(Some(meta))) = (&fields, &entities, &meta) {
            let answered = answered.ok().flatten().unwrap_or_default();
            return Ok(LoanState {
                proposal_pid: pid.clone(),
                version: meta.version,
                loaded_at: meta.loaded_at,
                fields: fields.clone(),
                entities: entities.clone(),
                answered,
            });
        }

        self.telemetry.record_counter("state_cache_miss", 1);
        let state = self.loader.load(pid).await?;
        self.refill(pid, &state).await;
        Ok(state)
    }

    /// Merges `field_delta` into the cached fields, adds
    /// `answered_question_id` to the answered set, bumps `version`, and
    /// rewrites the four split keys.
    ///
    /// # Errors
    ///
    /// Returns [`StateCacheError`] if the current state cannot be resolved
    /// or the rewrite fails.
    pub async fn update(
        &self,
        pid: &ProposalPid,
        field_delta: BTreeMap<String, FieldValue>,
        answered_question_id: QuestionId,
    ) -> Result<LoanState, StateCacheError> {
        let mut state = self.get(pid).await?;
        state.fields.extend(field_delta);
        state.answered.insert(answered_question_id);
        state.version = self.clock.now().unix_millis().max(state.version + 1);

        let write = CacheWrite {
            fields: state.fields.clone(),
            entities: state.entities.clone(),
            answered: state.answered.clone(),
            meta: CacheMeta { version: state.version, loaded_at: state.loaded_at },
        };
        self.remote.write_pipeline(pid, write, self.ttl, self.call_timeout).await?;
        Ok(state)
    }

    /// Deletes all four split keys for `pid`.
    ///
    /// # Errors
    ///
    /// Returns [`StateCacheError::Cache`] if the delete fails.
    pub async fn invalidate(&self, pid: &ProposalPid) -> Result<(), StateCacheError> {
        self.remote.delete(pid, self.call_timeout).await?;
        Ok(())
    }

    /// Returns true if `loan:<pid>:fields` is present (the cache-presence
    /// witness). A read failure is treated as "not cached", not propagated.
    #[must_use]
    pub async fn is_cached(&self, pid: &ProposalPid) -> bool {
        matches!(self.remote.get_fields(pid, self.call_timeout).await, Ok(Some(_)))
    }

    async fn refill(&self, pid: &ProposalPid, state: &LoanState) {
        let write = CacheWrite {
            fields: state.fields.clone(),
            entities: state.entities.clone(),
            answered: state.answered.clone(),
            meta: CacheMeta { version: state.version, loaded_at: state.loaded_at },
        };
        if self.remote.write_pipeline(pid, write, self.ttl, self.call_timeout).await.is_err() {
            self.telemetry.record_counter("state_cache_refill_failed", 1);
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only panic-based assertions are permitted.")]
mod tests {
    use std::collections::BTreeSet;

    use async_trait::async_trait;
    use loanq_broker::InMemoryRemoteCache;
    use loanq_core::EntityPid;
    use loanq_core::EntityRef;
    use loanq_core::NoopTelemetry;
    use loanq_core::ProposalRecord;
    use loanq_core::StoreError;
    use loanq_core::SystemClock;
    use loanq_core::SystemOfRecord;

    use super::*;

    struct CountingStore {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl SystemOfRecord for CountingStore {
        async fn fetch_proposal(&self, pid: &ProposalPid, _timeout: Duration) -> Result<ProposalRecord, StoreError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(ProposalRecord { pid: pid.clone(), deal_pid: "D1".to_string(), fields: BTreeMap::new() })
        }

        async fn fetch_borrowers(&self, _deal_pid: &str, _timeout: Duration) -> Result<Vec<EntityRef>, StoreError> {
            Ok(Vec::new())
        }

        async fn fetch_jobs(&self, _borrower_pids: &[EntityPid], _timeout: Duration) -> Result<Vec<EntityRef>, StoreError> {
            Ok(Vec::new())
        }

        async fn fetch_assets(&self, _borrower_pids: &[EntityPid], _timeout: Duration) -> Result<Vec<EntityRef>, StoreError> {
            Ok(Vec::new())
        }

        async fn fetch_liabilities(
            &self,
            _borrower_pids: &[EntityPid],
            _timeout: Duration,
        ) -> Result<Vec<EntityRef>, StoreError> {
            Ok(Vec::new())
        }

        async fn fetch_real_estate_owned(
            &self,
            _borrower_pids: &[EntityPid],
            _timeout: Duration,
        ) -> Result<Vec<EntityRef>, StoreError> {
            Ok(Vec::new())
        }

        async fn fetch_property(&self, _deal_pid: &str, _timeout: Duration) -> Result<BTreeMap<String, FieldValue>, StoreError> {
            Ok(BTreeMap::new())
        }

        async fn fetch_answered_question_ids(
            &self,
            _deal_pid: &str,
            _timeout: Duration,
        ) -> Result<BTreeSet<QuestionId>, StoreError> {
            Ok(BTreeSet::new())
        }
    }

    fn cache_with_counter() -> (StateCache, Arc<CountingStore>) {
        let store = Arc::new(CountingStore { calls: std::sync::atomic::AtomicUsize::new(0) });
        let loader = StateLoader::new(store.clone(), Arc::new(SystemClock), Duration::from_millis(50));
        let cache = StateCache::new(
            Arc::new(InMemoryRemoteCache::new()),
            loader,
            Arc::new(SystemClock),
            Arc::new(NoopTelemetry),
            Duration::from_secs(3600),
            Duration::from_millis(50),
        );
        (cache, store)
    }

    #[tokio::test]
    async fn back_to_back_get_invokes_the_loader_at_most_once() {
        let (cache, store) = cache_with_counter();
        let pid = ProposalPid::from("P1");
        cache.get(&pid).await.expect("loads");
        cache.get(&pid).await.expect("hits cache");
        assert_eq!(store.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_the_next_get_to_reload() {
        let (cache, store) = cache_with_counter();
        let pid = ProposalPid::from("P1");
        cache.get(&pid).await.expect("loads");
        cache.invalidate(&pid).await.expect("invalidates");
        cache.get(&pid).await.expect("reloads");
        assert_eq!(store.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn is_cached_reflects_presence() {
        let (cache, _store) = cache_with_counter();
        let pid = ProposalPid::from("P1");
        assert!(!cache.is_cached(&pid).await);
        cache.get(&pid).await.expect("loads");
        assert!(cache.is_cached(&pid).await);
    }

    #[tokio::test]
    async fn invalidate_then_is_cached_is_false() {
        let (cache, _store) = cache_with_counter();
        let pid = ProposalPid::from("P1");
        cache.get(&pid).await.expect("loads");
        cache.invalidate(&pid).await.expect("invalidates");
        assert!(!cache.is_cached(&pid).await);
    }

    #[tokio::test]
    async fn update_merges_fields_and_marks_answered_and_bumps_version() {
        let (cache, _store) = cache_with_counter();
        let pid = ProposalPid::from("P1");
        let before = cache.get(&pid).await.expect("loads");

        let mut delta = BTreeMap::new();
        delta.insert("citizenship_type".to_string(), FieldValue::from("US_CITIZEN"));
        let after = cache.update(&pid, delta, QuestionId::from("Q1")).await.expect("updates");

        assert_eq!(after.fields.get("citizenship_type"), Some(&FieldValue::from("US_CITIZEN")));
        assert!(after.answered.contains(&QuestionId::from("Q1")));
        assert!(after.version > before.version);
    }

    #[tokio::test]
    async fn update_is_visible_to_the_next_get() {
        let (cache, store) = cache_with_counter();
        let pid = ProposalPid::from("P1");
        cache.get(&pid).await.expect("loads");

        let mut delta = BTreeMap::new();
        delta.insert("loan_purpose".to_string(), FieldValue::from("PURCHASE"));
        cache.update(&pid, delta, QuestionId::from("Q2")).await.expect("updates");

        let reread = cache.get(&pid).await.expect("still cached");
        assert_eq!(reread.fields.get("loan_purpose"), Some(&FieldValue::from("PURCHASE")));
        assert_eq!(store.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
