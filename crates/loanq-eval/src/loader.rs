// crates/loanq-eval/src/loader.rs
// ============================================================================
// Module: State Loader
// Description: Resolves a proposal pid into a materialized LoanState by
// reading the system of record.
// Purpose: Own the four-step fetch and the column-name/display-name
// normalization that makes the resulting LoanState joinable against
// compiled criteria.
// Dependencies: loanq-core, tokio
// ============================================================================

//! ## Overview
//! [`StateLoader::load`] is the only place raw system-of-record rows become
//! a [`LoanState`]: it fetches the proposal, the deal's borrowers, the four
//! child entity collections and the subject property concurrently, and the
//! deal's already-answered question ids, then normalizes every field map so
//! later joins against compiled criteria (which key on
//! [`loanq_core::normalize_field_name`]-normalized names) succeed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use loanq_core::Clock;
use loanq_core::EntityCollections;
use loanq_core::EntityPid;
use loanq_core::EntityRef;
use loanq_core::FieldValue;
use loanq_core::LoanState;
use loanq_core::ProposalPid;
use loanq_core::StoreError;
use loanq_core::SystemOfRecord;
use loanq_core::normalize_field_name;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// State Loader errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The requested proposal does not exist.
    #[error("proposal not found: {0}")]
    ProposalNotFound(ProposalPid),
    /// A system-of-record call failed (timeout or unavailability).
    #[error("system of record error: {0}")]
    Upstream(#[from] StoreError),
}

// ============================================================================
// SECTION: State Loader
// ============================================================================

/// Resolves `proposalPid -> LoanState` by reading the system of record.
///
/// # Invariants
/// - Never mutates the system of record; every call it makes is a read.
pub struct StateLoader {
    store: Arc<dyn SystemOfRecord>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl StateLoader {
    /// Builds a loader against `store`, timing every call out after
    /// `timeout` and stamping the materialized state with `clock`.
    #[must_use]
    pub fn new(store: Arc<dyn SystemOfRecord>, clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self { store, clock, timeout }
    }

    /// Resolves `pid` into a fresh [`LoanState`].
    ///
    /// 1. Fetches the proposal; `LoaderError::ProposalNotFound` if absent.
    /// 2. Fetches the deal's borrowers.
    /// 3. Fetches the four child entity collections and the subject
    ///    property concurrently.
    /// 4. Fetches the deal's already-answered question ids.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError`] if the proposal is unknown or any underlying
    /// system-of-record call fails.
    pub async fn load(&self, pid: &ProposalPid) -> Result<LoanState, LoaderError> {
        let proposal = self.store.fetch_proposal(pid, self.timeout).await.map_err(|err| match err {
            StoreError::NotFound(detail) => LoaderError::ProposalNotFound(ProposalPid::new(detail)),
            other => LoaderError::Upstream(other),
        })?;

        let borrowers = self.store.fetch_borrowers(&proposal.deal_pid, self.timeout).await?;
        let borrower_pids: Vec<EntityPid> = borrowers.iter().map(|borrower| borrower.pid.clone()).collect();

        let (jobs, assets, liabilities, real_estate_owned, property, answered) = tokio::try_join!(
            self.store.fetch_jobs(&borrower_pids, self.timeout),
            self.store.fetch_assets(&borrower_pids, self.timeout),
            self.store.fetch_liabilities(&borrower_pids, self.timeout),
            self.store.fetch_real_estate_owned(&borrower_pids, self.timeout),
            self.store.fetch_property(&proposal.deal_pid, self.timeout),
            self.store.fetch_answered_question_ids(&proposal.deal_pid, self.timeout),
        )?;

        let now = self.clock.now();
        let mut fields = normalize_map(proposal.fields);
        fields.extend(normalize_property_map(property));

        Ok(LoanState {
            proposal_pid: pid.clone(),
            version: now.unix_millis(),
            loaded_at: now,
            fields,
            entities: EntityCollections {
                borrowers: normalize_entities(borrowers),
                jobs: normalize_entities(jobs),
                assets: normalize_entities(assets),
                liabilities: normalize_entities(liabilities),
                real_estate_owned: normalize_entities(real_estate_owned),
            },
            answered,
        })
    }
}

fn normalize_map(raw: BTreeMap<String, FieldValue>) -> BTreeMap<String, FieldValue> {
    raw.into_iter().map(|(name, value)| (normalize_field_name(&name), value)).collect()
}

fn normalize_property_map(raw: BTreeMap<String, FieldValue>) -> BTreeMap<String, FieldValue> {
    raw.into_iter().map(|(name, value)| (format!("property_{}", normalize_field_name(&name)), value)).collect()
}

fn normalize_entities(entities: Vec<EntityRef>) -> Vec<EntityRef> {
    entities
        .into_iter()
        .map(|entity| EntityRef { pid: entity.pid, display_name: entity.display_name, fields: normalize_map(entity.fields) })
        .collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only panic-based assertions are permitted.")]
mod tests {
    use async_trait::async_trait;
    use loanq_core::ProposalRecord;
    use loanq_core::QuestionId;
    use loanq_core::SystemClock;
    use loanq_core::Timestamp;

    use super::*;

    struct StubStore {
        fail_proposal: bool,
    }

    #[async_trait]
    impl SystemOfRecord for StubStore {
        async fn fetch_proposal(&self, pid: &ProposalPid, _timeout: Duration) -> Result<ProposalRecord, StoreError> {
            if self.fail_proposal {
                return Err(StoreError::NotFound(format!("proposal {pid} not found")));
            }
            let mut fields = BTreeMap::new();
            fields.insert("Loan Type".to_string(), FieldValue::from("CONVENTIONAL"));
            Ok(ProposalRecord { pid: pid.clone(), deal_pid: "D1".to_string(), fields })
        }

        async fn fetch_borrowers(&self, _deal_pid: &str, _timeout: Duration) -> Result<Vec<EntityRef>, StoreError> {
            let mut fields = BTreeMap::new();
            fields.insert("Citizenship Type".to_string(), FieldValue::from("US_CITIZEN"));
            Ok(vec![EntityRef { pid: EntityPid::from("B1"), display_name: "Ada Lovelace".to_string(), fields }])
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
            let mut fields = BTreeMap::new();
            fields.insert("APR Rate".to_string(), FieldValue::from_i64(6));
            Ok(fields)
        }

        async fn fetch_answered_question_ids(
            &self,
            _deal_pid: &str,
            _timeout: Duration,
        ) -> Result<BTreeSet<QuestionId>, StoreError> {
            Ok(BTreeSet::from([QuestionId::from("Q1")]))
        }
    }

    fn loader(fail_proposal: bool) -> StateLoader {
        StateLoader::new(Arc::new(StubStore { fail_proposal }), Arc::new(SystemClock), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn load_normalizes_proposal_and_property_field_names() {
        let state = loader(false).load(&ProposalPid::from("P1")).await.expect("loads");
        assert_eq!(state.fields.get("loan_type"), Some(&FieldValue::from("CONVENTIONAL")));
        assert_eq!(state.fields.get("property_apr_rate"), Some(&FieldValue::from_i64(6)));
    }

    #[tokio::test]
    async fn load_normalizes_entity_field_names() {
        let state = loader(false).load(&ProposalPid::from("P1")).await.expect("loads");
        let borrower = &state.entities.borrowers[0];
        assert_eq!(borrower.fields.get("citizenship_type"), Some(&FieldValue::from("US_CITIZEN")));
    }

    #[tokio::test]
    async fn load_carries_the_answered_set_through() {
        let state = loader(false).load(&ProposalPid::from("P1")).await.expect("loads");
        assert!(state.answered.contains(&QuestionId::from("Q1")));
    }

    #[tokio::test]
    async fn load_maps_not_found_to_proposal_not_found() {
        let err = loader(true).load(&ProposalPid::from("missing")).await.expect_err("not found");
        assert!(matches!(err, LoaderError::ProposalNotFound(_)));
    }

    #[tokio::test]
    async fn loaded_at_and_version_agree() {
        let state = loader(false).load(&ProposalPid::from("P1")).await.expect("loads");
        assert_eq!(state.version, state.loaded_at.unix_millis());
        let _ = Timestamp::from_unix_millis(state.version);
    }
}
