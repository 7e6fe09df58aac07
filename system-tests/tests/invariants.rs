// system-tests/tests/invariants.rs
// ============================================================================
// The seven universally-quantified invariants from the testable-properties
// section, each checked against several representative inputs rather than
// a single example.
// ============================================================================

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only panic-based assertions are permitted.")]

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use loanq_broker::InMemoryRemoteCache;
use loanq_config::ConfigRegistry;
use loanq_core::CacheMeta;
use loanq_core::CacheWrite;
use loanq_core::EntityCollections;
use loanq_core::FieldValue;
use loanq_core::LoanState;
use loanq_core::ProposalPid;
use loanq_core::QuestionId;
use loanq_core::RemoteCache;
use loanq_core::SystemClock;
use loanq_core::normalize_field_name;
use loanq_eval::AnswerHandler;
use loanq_eval::EvaluatorConfig;
use loanq_eval::QuestionEvaluator;
use loanq_eval::QueueBuilder;
use loanq_eval::StateCache;
use loanq_eval::StateLoader;
use loanq_rules::RulesEngine;
use loanq_rules::compile;
use loanq_store::SqliteStoreConfig;
use loanq_store::SqliteSystemOfRecord;
use loanq_store::fixtures;
use tempfile::TempDir;

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().expect("has parent")).expect("mkdir");
    fs::write(path, content).expect("write");
}

// ----------------------------------------------------------------------------
// INVARIANT: for all loaded questions q, the Rules Engine contains
// `question:<q.id>`.
// ----------------------------------------------------------------------------

#[test]
fn every_loaded_question_is_installed_in_the_rules_engine() {
    let config_dir = TempDir::new().expect("config tempdir");
    write(config_dir.path(), "sections/s.yaml", "id: s\nname: Section\nsequence: 1\n");
    for (index, criteria) in ["", "Loan Type is FHA", "Loan Type is Conventional"].iter().enumerate() {
        write(
            config_dir.path(),
            &format!("questions/q{index}.yaml"),
            &format!(
                "id: Q{index}\nsection: s\nordinal: {index}\nlevel: PROPOSAL\ninstructions: \"Q{index}\"\ntype: text\ncriteria: \"{criteria}\"\nflexibility: exact\n"
            ),
        );
    }

    let rules = RulesEngine::new();
    let registry = ConfigRegistry::load(config_dir.path(), &rules).expect("config loads");

    assert_eq!(rules.rule_count(), registry.question_count());
    for index in 0..3 {
        let id = QuestionId::from(format!("Q{index}"));
        assert!(registry.question(&id).is_some());
    }
}

// ----------------------------------------------------------------------------
// INVARIANT: for all proposals p and all response R built from p's
// LoanState s: every queueItem.questionId in R is not in s.answered.
// ----------------------------------------------------------------------------

#[tokio::test]
async fn queue_items_never_include_an_answered_question() {
    let config_dir = TempDir::new().expect("config tempdir");
    write(config_dir.path(), "sections/s.yaml", "id: s\nname: Section\nsequence: 1\n");
    for index in 0..5 {
        write(
            config_dir.path(),
            &format!("questions/q{index}.yaml"),
            &format!(
                "id: Q{index}\nsection: s\nordinal: {index}\nlevel: PROPOSAL\ninstructions: \"Q{index}\"\ntype: text\ncriteria: \"\"\nflexibility: exact\n"
            ),
        );
    }

    let store_dir = TempDir::new().expect("store tempdir");
    let store = SqliteSystemOfRecord::open(SqliteStoreConfig::new(store_dir.path().join("loanq.sqlite3"))).expect("opens store");
    fixtures::seed_proposal(&store, "P1", "D1", &BTreeMap::new()).expect("seeds proposal");
    fixtures::seed_property(&store, "D1", &BTreeMap::new()).expect("seeds property");
    // Answer an arbitrary, non-exhaustive subset; the rest should still surface.
    fixtures::seed_answered(&store, "D1", "Q0").expect("seeds answered");
    fixtures::seed_answered(&store, "D1", "Q3").expect("seeds answered");

    let rules = Arc::new(RulesEngine::new());
    let registry = Arc::new(ConfigRegistry::load(config_dir.path(), &rules).expect("config loads"));
    let loader = StateLoader::new(Arc::new(store), Arc::new(SystemClock), Duration::from_millis(200));
    let cache = StateCache::new(
        Arc::new(InMemoryRemoteCache::new()),
        loader,
        Arc::new(SystemClock),
        Arc::new(loanq_core::NoopTelemetry),
        Duration::from_secs(3600),
        Duration::from_millis(200),
    );
    let evaluator = QuestionEvaluator::new(registry.clone(), rules, Arc::new(loanq_core::NoopTelemetry), EvaluatorConfig::default());
    let queue_builder = QueueBuilder::new(registry);

    let state = cache.get(&ProposalPid::from("P1")).await.expect("loads");
    let items = evaluator.evaluate(&state);
    let response = queue_builder.build(items, &state);

    for item in &response.queue {
        assert!(!state.answered.contains(&item.question_id));
    }
}

// ----------------------------------------------------------------------------
// INVARIANT: for all sections S in R: S.answered <= S.total and S.status is
// consistent with them.
// ----------------------------------------------------------------------------

#[test]
fn section_progress_is_always_internally_consistent() {
    let config_dir = TempDir::new().expect("config tempdir");
    write(config_dir.path(), "sections/a.yaml", "id: a\nname: A\nsequence: 1\n");
    write(config_dir.path(), "sections/b.yaml", "id: b\nname: B\nsequence: 2\n");
    for (index, section) in [("a", 0), ("a", 1), ("a", 2), ("b", 3)] {
        write(
            config_dir.path(),
            &format!("questions/q{}.yaml", section.1),
            &format!(
                "id: Q{}\nsection: {}\nordinal: {}\nlevel: PROPOSAL\ninstructions: \"Q\"\ntype: text\ncriteria: \"\"\nflexibility: exact\n",
                section.1, index, section.1,
            ),
        );
    }

    let rules = RulesEngine::new();
    let registry = Arc::new(ConfigRegistry::load(config_dir.path(), &rules).expect("config loads"));
    let queue_builder = QueueBuilder::new(registry);

    for answered_ids in [vec![], vec!["Q0"], vec!["Q0", "Q1"], vec!["Q0", "Q1", "Q2", "Q3"]] {
        let state = LoanState {
            proposal_pid: ProposalPid::from("P1"),
            version: 1,
            loaded_at: SystemClock.now(),
            fields: BTreeMap::new(),
            entities: EntityCollections::default(),
            answered: answered_ids.iter().map(|id| QuestionId::from(*id)).collect(),
        };
        let response = queue_builder.build(Vec::new(), &state);
        for section in &response.sections {
            assert!(section.answered <= section.total);
            let expected_status = if section.answered == 0 {
                loanq_core::SectionStatus::Pending
            } else if section.answered >= section.total {
                loanq_core::SectionStatus::Complete
            } else {
                loanq_core::SectionStatus::InProgress
            };
            assert_eq!(section.status, expected_status);
        }
    }
}

// ----------------------------------------------------------------------------
// INVARIANT: for all answers submitted successfully for (p, q): immediately
// after, getLoanState(p).answered.contains(q) is true and version strictly
// increased.
// ----------------------------------------------------------------------------

#[tokio::test]
async fn submitting_an_answer_always_marks_it_answered_and_bumps_version() {
    let config_dir = TempDir::new().expect("config tempdir");
    write(config_dir.path(), "sections/s.yaml", "id: s\nname: Section\nsequence: 1\n");
    for (index, access_field) in ["citizenship_type", "loan_purpose", "visa_type"].iter().enumerate() {
        write(
            config_dir.path(),
            &format!("questions/q{index}.yaml"),
            &format!(
                "id: Q{index}\nsection: s\nordinal: {index}\nlevel: PROPOSAL\ninstructions: \"Q{index}\"\ntype: text\nform_fields:\n  - order: 1\n    label: L\n    access_field: {access_field}\ncriteria: \"\"\nflexibility: exact\n"
            ),
        );
    }

    let store_dir = TempDir::new().expect("store tempdir");
    let store = SqliteSystemOfRecord::open(SqliteStoreConfig::new(store_dir.path().join("loanq.sqlite3"))).expect("opens store");
    fixtures::seed_proposal(&store, "P1", "D1", &BTreeMap::new()).expect("seeds proposal");
    fixtures::seed_property(&store, "D1", &BTreeMap::new()).expect("seeds property");

    let rules = Arc::new(RulesEngine::new());
    let registry = Arc::new(ConfigRegistry::load(config_dir.path(), &rules).expect("config loads"));
    let remote = Arc::new(InMemoryRemoteCache::new());
    let loader = StateLoader::new(Arc::new(store), Arc::new(SystemClock), Duration::from_millis(200));
    let cache = Arc::new(StateCache::new(
        remote,
        loader,
        Arc::new(SystemClock),
        Arc::new(loanq_core::NoopTelemetry),
        Duration::from_secs(3600),
        Duration::from_millis(200),
    ));
    let evaluator =
        Arc::new(QuestionEvaluator::new(registry.clone(), rules, Arc::new(loanq_core::NoopTelemetry), EvaluatorConfig::default()));
    let queue_builder = Arc::new(QueueBuilder::new(registry.clone()));
    let (sender, _receiver) = tokio::sync::mpsc::channel(8);
    let write_queue = Arc::new(loanq_broker::ChannelWriteBackQueue::new(sender));
    let answers = AnswerHandler::new(
        registry,
        cache.clone(),
        evaluator,
        queue_builder,
        write_queue,
        Arc::new(SystemClock),
        Arc::new(loanq_core::NoopTelemetry),
        Duration::from_millis(200),
    );

    let pid = ProposalPid::from("P1");
    let mut previous_version = cache.get(&pid).await.expect("loads").version;

    for (index, answer) in ["US_CITIZEN", "PURCHASE", "H1B"].iter().enumerate() {
        let question_id = QuestionId::from(format!("Q{index}"));
        answers.submit(&pid, &question_id, None, serde_json::json!(answer), None, None).await.expect("submits");

        let after = cache.get(&pid).await.expect("reloads");
        assert!(after.answered.contains(&question_id));
        assert!(after.version > previous_version);
        previous_version = after.version;
    }
}

// ----------------------------------------------------------------------------
// INVARIANT: for all criteria strings c: compile(c) is deterministic and
// idempotent.
// ----------------------------------------------------------------------------

#[test]
fn compile_is_deterministic_across_repeated_calls() {
    let criteria_strings = [
        "Citizenship Type is US Citizen",
        "Loan Type is Conventional",
        "Credit Score >= 620",
        "Matches all of the following rules:\n  Loan Purpose is Purchase\n  Loan Type is Conventional",
        "Matches any of the following rules:\n  Loan Purpose is Purchase\n  Loan Purpose is Refinance",
        "",
    ];

    for criteria in criteria_strings {
        let first = compile(criteria).expect("compiles");
        let second = compile(criteria).expect("compiles");
        assert_eq!(first, second);
    }
}

// ----------------------------------------------------------------------------
// INVARIANT: for all field names f: normalize(normalize(f)) == normalize(f).
// ----------------------------------------------------------------------------

#[test]
fn field_name_normalization_is_idempotent() {
    let names = ["Citizenship Type", "US-Citizen", "loan_type", "Already Normal Field", "  Leading Space"];
    for name in names {
        let once = normalize_field_name(name);
        let twice = normalize_field_name(&once);
        assert_eq!(once, twice);
    }
}

// ----------------------------------------------------------------------------
// INVARIANT: for all LoanStates s: cache-round-trip decode(encode(s)) == s
// (with Set <-> Sequence at the boundary).
// ----------------------------------------------------------------------------

#[tokio::test]
async fn loan_state_round_trips_through_the_remote_cache_codec() {
    let cache = InMemoryRemoteCache::new();
    let pid = ProposalPid::from("P1");

    let mut fields = BTreeMap::new();
    fields.insert("loan_type".to_string(), FieldValue::from("CONVENTIONAL"));
    fields.insert("credit_score".to_string(), FieldValue::from_i64(720));
    let answered: BTreeSet<QuestionId> = BTreeSet::from([QuestionId::from("Q1"), QuestionId::from("Q2")]);

    let write = CacheWrite {
        fields: fields.clone(),
        entities: EntityCollections::default(),
        answered: answered.clone(),
        meta: CacheMeta { version: 7, loaded_at: SystemClock.now() },
    };
    cache.write_pipeline(&pid, write, Duration::from_secs(3600), Duration::from_millis(200)).await.expect("writes");

    let round_tripped_fields = cache.get_fields(&pid, Duration::from_millis(200)).await.expect("reads").expect("present");
    let round_tripped_answered = cache.get_answered(&pid, Duration::from_millis(200)).await.expect("reads").expect("present");
    let round_tripped_meta = cache.get_meta(&pid, Duration::from_millis(200)).await.expect("reads").expect("present");
    let round_tripped_entities = cache.get_entities(&pid, Duration::from_millis(200)).await.expect("reads").expect("present");

    assert_eq!(round_tripped_fields, fields);
    assert_eq!(round_tripped_answered, answered);
    assert_eq!(round_tripped_meta.version, 7);
    assert_eq!(round_tripped_entities, EntityCollections::default());
}

// Empty answered set is a Set<->Sequence boundary edge case worth its own
// check: an empty sequence must decode back to a present, empty set, not a
// missing key.
#[tokio::test]
async fn an_empty_answered_set_round_trips_as_empty_not_absent() {
    let cache = InMemoryRemoteCache::new();
    let pid = ProposalPid::from("P1");

    let write = CacheWrite {
        fields: BTreeMap::new(),
        entities: EntityCollections::default(),
        answered: BTreeSet::new(),
        meta: CacheMeta { version: 1, loaded_at: SystemClock.now() },
    };
    cache.write_pipeline(&pid, write, Duration::from_secs(3600), Duration::from_millis(200)).await.expect("writes");

    let round_tripped = cache.get_answered(&pid, Duration::from_millis(200)).await.expect("reads");
    assert_eq!(round_tripped, Some(BTreeSet::new()));
}
