// crates/loanq-service/src/state.rs
// ============================================================================
// Module: Warmup & Application State
// Description: Builds the fully wired evaluation pipeline once at process
// start and exposes the resulting handles to the router.
// Purpose: Keep "construct the pipeline" and "serve requests" strictly
// separate, the way decision-gate-mcp separates `from_config` from `serve`.
// Dependencies: loanq-core, loanq-config, loanq-rules, loanq-eval
// ============================================================================

//! ## Overview
//! [`WarmupState`] holds everything needed to build the pipeline but has not
//! yet paid the cost of loading the configuration tree. [`WarmupState::warmup`]
//! consumes `self` and returns an [`AppState`]; taking `self` by value makes
//! re-warming a given builder a type error, and the module-level
//! [`WARMUP_GUARD`] additionally asserts at runtime that at most one
//! [`AppState`] is ever materialized per process, mirroring the singleton
//! discipline `decision-gate-mcp::McpServer` applies to its own
//! construction/serve split.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use loanq_config::ConfigRegistry;
use loanq_config::RegistryError;
use loanq_core::Clock;
use loanq_core::RemoteCache;
use loanq_core::SystemOfRecord;
use loanq_core::Telemetry;
use loanq_core::WriteBackQueue;
use loanq_eval::AnswerHandler;
use loanq_eval::EvaluatorConfig;
use loanq_eval::QuestionEvaluator;
use loanq_eval::QueueBuilder;
use loanq_eval::StateCache;
use loanq_eval::StateLoader;
use loanq_rules::RulesEngine;

/// Process-wide guard asserting [`WarmupState::warmup`] runs at most once.
static WARMUP_GUARD: OnceLock<()> = OnceLock::new();

/// Process-level settings read from the environment surface (§6): transport
/// port, cache TTL, per-call timeouts, and the evaluator's latency budget.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Path to the `<root>/sections`, `<root>/questions` configuration tree.
    pub config_root: PathBuf,
    /// TTL applied to the four split remote-cache keys.
    pub cache_ttl: Duration,
    /// Per-call timeout for system-of-record and remote-cache calls.
    pub call_timeout: Duration,
    /// Per-call timeout for write-back queue enqueue calls.
    pub enqueue_timeout: Duration,
    /// Wall-clock budget the Question Evaluator has per `evaluate` call.
    pub evaluate_budget: Duration,
}

/// Everything needed to build the pipeline, prior to loading the
/// configuration tree.
pub struct WarmupState {
    /// Process-level settings.
    config: ServiceConfig,
    /// Upstream system of record.
    store: Arc<dyn SystemOfRecord>,
    /// Shared remote cache.
    remote: Arc<dyn RemoteCache>,
    /// Durable write-back queue for answer submissions.
    write_queue: Arc<dyn WriteBackQueue>,
    /// Wall-clock source.
    clock: Arc<dyn Clock>,
    /// Telemetry sink.
    telemetry: Arc<dyn Telemetry>,
}

/// Startup errors surfaced while building the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum WarmupError {
    /// The configuration tree failed to load or compile.
    #[error("configuration registry failed to load: {0}")]
    Registry(#[from] RegistryError),
    /// `warmup` was invoked more than once in this process.
    #[error("warmup already ran in this process")]
    AlreadyWarmed,
}

impl WarmupState {
    /// Builds a warmup builder over the given collaborators.
    #[must_use]
    pub fn new(
        config: ServiceConfig,
        store: Arc<dyn SystemOfRecord>,
        remote: Arc<dyn RemoteCache>,
        write_queue: Arc<dyn WriteBackQueue>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self { config, store, remote, write_queue, clock, telemetry }
    }

    /// Loads the configuration tree, installs compiled rules, and wires the
    /// full pipeline into an [`AppState`].
    ///
    /// # Errors
    ///
    /// Returns [`WarmupError::Registry`] if the configuration tree fails to
    /// load or compile (§7 "Configuration error: fatal at startup"), or
    /// [`WarmupError::AlreadyWarmed`] if this process already completed a
    /// warmup. The latter should be unreachable in practice: `warmup` takes
    /// `self` by value, so a caller would need to hold two distinct
    /// `WarmupState`s to trigger it.
    pub fn warmup(self) -> Result<AppState, WarmupError> {
        if WARMUP_GUARD.set(()).is_err() {
            return Err(WarmupError::AlreadyWarmed);
        }
        Ok(self.assemble()?)
    }

    /// Does the actual wiring, independent of the process-global guard.
    fn assemble(self) -> Result<AppState, RegistryError> {
        let rules = Arc::new(RulesEngine::new());
        let registry = Arc::new(ConfigRegistry::load(&self.config.config_root, &rules)?);

        let loader = StateLoader::new(Arc::clone(&self.store), Arc::clone(&self.clock), self.config.call_timeout);
        let cache = Arc::new(StateCache::new(
            Arc::clone(&self.remote),
            loader,
            Arc::clone(&self.clock),
            Arc::clone(&self.telemetry),
            self.config.cache_ttl,
            self.config.call_timeout,
        ));
        let evaluator = Arc::new(QuestionEvaluator::new(
            Arc::clone(&registry),
            Arc::clone(&rules),
            Arc::clone(&self.telemetry),
            EvaluatorConfig { budget: self.config.evaluate_budget },
        ));
        let queue_builder = Arc::new(QueueBuilder::new(Arc::clone(&registry)));
        let answers = Arc::new(AnswerHandler::new(
            Arc::clone(&registry),
            Arc::clone(&cache),
            Arc::clone(&evaluator),
            Arc::clone(&queue_builder),
            Arc::clone(&self.write_queue),
            Arc::clone(&self.clock),
            Arc::clone(&self.telemetry),
            self.config.enqueue_timeout,
        ));

        Ok(AppState {
            registry,
            rules,
            cache,
            evaluator,
            queue_builder,
            answers,
            telemetry: self.telemetry,
        })
    }

    /// Assembles an [`AppState`] without the process-global warmup guard.
    ///
    /// Exposed only to other modules' test code within this crate: handler
    /// tests in `routes` each need their own independently-warmed state, and
    /// routing them all through the single-warmup-per-process guard would
    /// make all but the first test fail.
    #[cfg(test)]
    #[allow(clippy::expect_used, reason = "Test-only panic-based assertions are permitted.")]
    pub(crate) fn assemble_for_tests(self) -> AppState {
        self.assemble().expect("test fixture configuration always loads")
    }
}

/// The fully wired pipeline, shared by every axum handler via
/// [`axum::extract::State`].
#[derive(Clone)]
pub struct AppState {
    /// The loaded configuration registry.
    registry: Arc<ConfigRegistry>,
    /// The rules engine installed by `registry`'s load.
    rules: Arc<RulesEngine>,
    /// The state cache used by `GetQuestions`/`GetLoanState`.
    cache: Arc<StateCache>,
    /// The question evaluator used by `GetQuestions`.
    evaluator: Arc<QuestionEvaluator>,
    /// The queue builder used by `GetQuestions`.
    queue_builder: Arc<QueueBuilder>,
    /// The answer handler used by `SubmitAnswer`.
    answers: Arc<AnswerHandler>,
    /// The telemetry sink.
    telemetry: Arc<dyn Telemetry>,
}

impl AppState {
    /// The loaded configuration registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ConfigRegistry> {
        &self.registry
    }

    /// The State Cache, used by the `GetQuestions`/`GetLoanState` handlers.
    #[must_use]
    pub fn cache(&self) -> &Arc<StateCache> {
        &self.cache
    }

    /// The Question Evaluator, used by the `GetQuestions` handler.
    #[must_use]
    pub fn evaluator(&self) -> &Arc<QuestionEvaluator> {
        &self.evaluator
    }

    /// The Queue Builder, used by the `GetQuestions` handler.
    #[must_use]
    pub fn queue_builder(&self) -> &Arc<QueueBuilder> {
        &self.queue_builder
    }

    /// The Answer Handler, used by the `SubmitAnswer` handler.
    #[must_use]
    pub fn answers(&self) -> &Arc<AnswerHandler> {
        &self.answers
    }

    /// The telemetry sink, used to record request/latency events.
    #[must_use]
    pub fn telemetry(&self) -> &Arc<dyn Telemetry> {
        &self.telemetry
    }

    /// Readiness per §6: alive (trivially true once an `AppState` exists)
    /// **and** warmup complete (likewise trivial — `AppState` only exists
    /// after a successful `warmup`) **and** rule count > 0.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.rules.rule_count() > 0
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only panic-based assertions are permitted.")]
mod tests {
    use std::collections::BTreeMap;
    use std::collections::BTreeSet;
    use std::fs;

    use async_trait::async_trait;
    use loanq_broker::ChannelWriteBackQueue;
    use loanq_broker::InMemoryRemoteCache;
    use loanq_core::EntityPid;
    use loanq_core::EntityRef;
    use loanq_core::FieldValue;
    use loanq_core::NoopTelemetry;
    use loanq_core::ProposalPid;
    use loanq_core::ProposalRecord;
    use loanq_core::QuestionId;
    use loanq_core::StoreError;
    use loanq_core::SystemClock;
    use tempfile::TempDir;

    use super::*;

    struct EmptyStore;

    #[async_trait]
    impl SystemOfRecord for EmptyStore {
        async fn fetch_proposal(&self, pid: &ProposalPid, _timeout: Duration) -> Result<ProposalRecord, StoreError> {
            Ok(ProposalRecord { pid: pid.clone(), deal_pid: "deal-1".to_string(), fields: BTreeMap::new() })
        }

        async fn fetch_borrowers(&self, _deal_pid: &str, _timeout: Duration) -> Result<Vec<EntityRef>, StoreError> {
            Ok(Vec::new())
        }

        async fn fetch_jobs(&self, _pids: &[EntityPid], _timeout: Duration) -> Result<Vec<EntityRef>, StoreError> {
            Ok(Vec::new())
        }

        async fn fetch_assets(&self, _pids: &[EntityPid], _timeout: Duration) -> Result<Vec<EntityRef>, StoreError> {
            Ok(Vec::new())
        }

        async fn fetch_liabilities(&self, _pids: &[EntityPid], _timeout: Duration) -> Result<Vec<EntityRef>, StoreError> {
            Ok(Vec::new())
        }

        async fn fetch_real_estate_owned(
            &self,
            _pids: &[EntityPid],
            _timeout: Duration,
        ) -> Result<Vec<EntityRef>, StoreError> {
            Ok(Vec::new())
        }

        async fn fetch_property(
            &self,
            _deal_pid: &str,
            _timeout: Duration,
        ) -> Result<BTreeMap<String, FieldValue>, StoreError> {
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

    fn write_config(dir: &TempDir) {
        fs::create_dir_all(dir.path().join("sections")).expect("mkdir sections");
        fs::create_dir_all(dir.path().join("questions")).expect("mkdir questions");
        fs::write(
            dir.path().join("sections/s1.yaml"),
            "id: s1\nname: Section One\nsequence: 1\n",
        )
        .expect("write section");
        fs::write(
            dir.path().join("questions/q1.yaml"),
            "id: q1\nname: Q1\nsection: s1\nordinal: 1\nlevel: proposal\ninstructions: hi\ntype: text\ncriteria: \"\"\nflexibility: exact\n",
        )
        .expect("write question");
    }

    fn warmup_state(dir: &TempDir) -> WarmupState {
        WarmupState::new(
            ServiceConfig {
                config_root: dir.path().to_path_buf(),
                cache_ttl: Duration::from_secs(60),
                call_timeout: Duration::from_millis(50),
                enqueue_timeout: Duration::from_millis(50),
                evaluate_budget: Duration::from_millis(50),
            },
            Arc::new(EmptyStore),
            Arc::new(InMemoryRemoteCache::new()),
            Arc::new(ChannelWriteBackQueue::new(tokio::sync::mpsc::channel(8).0)),
            Arc::new(SystemClock),
            Arc::new(NoopTelemetry),
        )
    }

    #[test]
    fn warmup_produces_a_ready_app_state_when_rules_are_installed() {
        let dir = TempDir::new().expect("tempdir");
        write_config(&dir);
        let state = warmup_state(&dir).warmup().expect("warmup succeeds");
        assert!(state.is_ready());
        assert_eq!(state.registry().question_count(), 1);
    }
}
