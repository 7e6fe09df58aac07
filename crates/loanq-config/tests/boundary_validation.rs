// crates/loanq-config/tests/boundary_validation.rs
// ============================================================================
// Duplicate id/sequence invariant enforcement for ConfigRegistry::load.
// ============================================================================

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only panic-based assertions are permitted.")]

use std::fs;
use std::path::Path;

use loanq_config::ConfigRegistry;
use loanq_config::RegistryError;
use loanq_rules::RulesEngine;
use tempfile::TempDir;

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().expect("has parent")).expect("mkdir");
    fs::write(path, content).expect("write");
}

#[test]
fn two_sections_with_the_same_sequence_are_rejected() {
    let dir = TempDir::new().expect("tempdir");
    write(dir.path(), "sections/income.yaml", "id: income\nname: Income\nsequence: 1\n");
    write(dir.path(), "sections/assets.yaml", "id: assets\nname: Assets\nsequence: 1\n");
    fs::create_dir_all(dir.path().join("questions")).expect("mkdir");

    let engine = RulesEngine::new();
    let err = ConfigRegistry::load(dir.path(), &engine).expect_err("duplicate sequence aborts");
    match err {
        RegistryError::DuplicateSectionSequence { sequence, .. } => assert_eq!(sequence, 1),
        other => panic!("expected DuplicateSectionSequence, got {other:?}"),
    }
}

#[test]
fn two_questions_with_the_same_id_are_rejected_even_across_files() {
    let dir = TempDir::new().expect("tempdir");
    write(dir.path(), "sections/income.yaml", "id: income\nname: Income\nsequence: 1\n");
    write(
        dir.path(),
        "questions/a/q1.yaml",
        "id: Q1\nsection: income\nordinal: 1\nlevel: BORROWER\ninstructions: hi\ntype: text\ncriteria: \"\"\nflexibility: exact\n",
    );
    write(
        dir.path(),
        "questions/b/q1_again.yaml",
        "id: Q1\nsection: income\nordinal: 2\nlevel: BORROWER\ninstructions: hi\ntype: text\ncriteria: \"\"\nflexibility: exact\n",
    );

    let engine = RulesEngine::new();
    let err = ConfigRegistry::load(dir.path(), &engine).expect_err("duplicate id aborts");
    assert!(matches!(err, RegistryError::DuplicateQuestionId { .. }));
    assert_eq!(engine.rule_count(), 0, "a failed load must leave no rule installed in the engine");
}

#[test]
fn ordinal_is_not_required_to_be_unique_across_sections() {
    let dir = TempDir::new().expect("tempdir");
    write(dir.path(), "sections/income.yaml", "id: income\nname: Income\nsequence: 1\n");
    write(dir.path(), "sections/assets.yaml", "id: assets\nname: Assets\nsequence: 2\n");
    write(
        dir.path(),
        "questions/q1.yaml",
        "id: Q1\nsection: income\nordinal: 1\nlevel: BORROWER\ninstructions: hi\ntype: text\ncriteria: \"\"\nflexibility: exact\n",
    );
    write(
        dir.path(),
        "questions/q2.yaml",
        "id: Q2\nsection: assets\nordinal: 1\nlevel: BORROWER\ninstructions: hi\ntype: text\ncriteria: \"\"\nflexibility: exact\n",
    );

    let engine = RulesEngine::new();
    let registry = ConfigRegistry::load(dir.path(), &engine).expect("same ordinal in different sections is fine");
    assert_eq!(registry.question_count(), 2);
}
