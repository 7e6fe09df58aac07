// crates/loanq-config/tests/schema_validation.rs
// ============================================================================
// Missing/invalid required field error paths for ConfigRegistry::load.
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
fn section_missing_sequence_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    write(dir.path(), "sections/income.yaml", "id: income\nname: Income\n");
    fs::create_dir_all(dir.path().join("questions")).expect("mkdir");

    let engine = RulesEngine::new();
    let err = ConfigRegistry::load(dir.path(), &engine).expect_err("missing sequence aborts");
    assert!(matches!(err, RegistryError::MissingField { .. }));
}

#[test]
fn question_missing_flexibility_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    write(dir.path(), "sections/income.yaml", "id: income\nname: Income\nsequence: 1\n");
    write(
        dir.path(),
        "questions/q1.yaml",
        "id: Q1\nsection: income\nordinal: 1\nlevel: BORROWER\ninstructions: hi\ntype: text\ncriteria: \"\"\n",
    );

    let engine = RulesEngine::new();
    let err = ConfigRegistry::load(dir.path(), &engine).expect_err("missing flexibility aborts");
    assert!(matches!(err, RegistryError::MissingField { .. }));
}

#[test]
fn question_with_unknown_entity_level_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    write(dir.path(), "sections/income.yaml", "id: income\nname: Income\nsequence: 1\n");
    write(
        dir.path(),
        "questions/q1.yaml",
        "id: Q1\nsection: income\nordinal: 1\nlevel: SPOUSE\ninstructions: hi\ntype: text\ncriteria: \"\"\nflexibility: exact\n",
    );

    let engine = RulesEngine::new();
    let err = ConfigRegistry::load(dir.path(), &engine).expect_err("unknown level aborts");
    assert!(matches!(err, RegistryError::MissingField { .. }));
}

#[test]
fn question_referencing_unknown_section_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    write(dir.path(), "sections/income.yaml", "id: income\nname: Income\nsequence: 1\n");
    write(
        dir.path(),
        "questions/q1.yaml",
        "id: Q1\nsection: assets\nordinal: 1\nlevel: BORROWER\ninstructions: hi\ntype: text\ncriteria: \"\"\nflexibility: exact\n",
    );

    let engine = RulesEngine::new();
    let err = ConfigRegistry::load(dir.path(), &engine).expect_err("unknown section reference aborts");
    assert!(matches!(err, RegistryError::MissingField { .. }));
    assert_eq!(engine.rule_count(), 0);
}
