// crates/loanq-config/src/registry.rs
// ============================================================================
// Module: Configuration Registry
// Description: Loads the sections/questions YAML tree, compiles criteria,
// installs compiled rules, and builds the byId/byLevel/sectionsSorted
// indexes.
// Purpose: Single fatal-on-any-error startup entry point.
// Dependencies: loanq-core, loanq-rules, serde_yaml, thiserror
// ============================================================================

//! ## Overview
//! [`ConfigRegistry::load`] scans `<root>/sections/*.yaml` and
//! `<root>/questions/**/*.yaml`, deserializes each document into the data
//! model in [`loanq_core::model`], compiles every question's criteria string
//! via [`loanq_rules::compile`], and installs the result into the supplied
//! [`loanq_rules::RulesEngine`] under `question:<id>`. Any failure aborts
//! before a single table is installed; the registry is never left partially
//! built.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use loanq_core::EntityLevel;
use loanq_core::Question;
use loanq_core::QuestionId;
use loanq_core::Section;
use loanq_core::SectionId;
use loanq_rules::RulesEngine;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Fatal startup errors raised while loading the configuration tree.
///
/// # Invariants
/// - Every variant carries the offending file path so the process log names
///   exactly which document is at fault.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A YAML document could not be read or parsed.
    #[error("{path}: {source}")]
    Io {
        /// Offending file path.
        path: PathBuf,
        /// Underlying I/O or deserialization error.
        source: String,
    },
    /// A required field was missing or structurally invalid.
    #[error("{path}: missing or invalid field: {detail}")]
    MissingField {
        /// Offending file path.
        path: PathBuf,
        /// Description of the missing/invalid field.
        detail: String,
    },
    /// A question's criteria string failed to compile.
    #[error("{path}: criteria compile error: {source}")]
    CompileFailed {
        /// Offending file path.
        path: PathBuf,
        /// Underlying compile error.
        source: loanq_rules::CompileError,
    },
    /// Two questions were loaded with the same id.
    #[error("{path}: duplicate question id {id}")]
    DuplicateQuestionId {
        /// File the duplicate was discovered in.
        path: PathBuf,
        /// The duplicated id.
        id: QuestionId,
    },
    /// Two sections were loaded with the same `sequence`.
    #[error("{path}: duplicate section sequence {sequence} (already used by {first})")]
    DuplicateSectionSequence {
        /// File the duplicate was discovered in.
        path: PathBuf,
        /// The duplicated sequence number.
        sequence: u32,
        /// The section id that first claimed this sequence.
        first: SectionId,
    },
}

// ============================================================================
// SECTION: Configuration Registry
// ============================================================================

/// Immutable, fully loaded configuration tree, indexed for O(1) lookup.
///
/// # Invariants
/// - Constructed only by [`ConfigRegistry::load`], which returns `Self` only
///   on full success; there is no partially-loaded state.
/// - `by_level` lists are pre-sorted by `(section.sequence, ordinal)`.
pub struct ConfigRegistry {
    by_id: HashMap<QuestionId, Question>,
    by_level: HashMap<EntityLevel, Vec<Question>>,
    sections_sorted: Vec<Section>,
}

impl ConfigRegistry {
    /// Loads `<root>/sections/*.yaml` and `<root>/questions/**/*.yaml`,
    /// compiles every question's criteria into `engine`, and builds the
    /// registry's indexes.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on the first unreadable file, malformed
    /// YAML, missing required field, criteria compile failure, or duplicate
    /// id/sequence. Startup is all-or-nothing: no table is left installed in
    /// `engine` from a load that ultimately fails.
    ///
    /// # Panics
    ///
    /// None encountered in practice; a question instructions field with no
    /// placeholders simply compiles to a fixed string.
    pub fn load(root: &Path, engine: &RulesEngine) -> Result<Self, RegistryError> {
        let mut dated_sections = load_sections(&root.join("sections"))?;
        dated_sections.sort_by_key(|(_, section)| section.sequence);
        check_unique_sequences(&dated_sections)?;
        let sections_sorted: Vec<Section> = dated_sections.into_iter().map(|(_, section)| section).collect();

        let section_ids: std::collections::HashSet<&SectionId> =
            sections_sorted.iter().map(|section| &section.id).collect();

        let questions = load_questions(&root.join("questions"))?;
        let mut by_id = HashMap::with_capacity(questions.len());
        let mut compiled_tables = Vec::with_capacity(questions.len());
        for (path, mut question) in questions {
            if !section_ids.contains(&question.section) {
                return Err(RegistryError::MissingField {
                    path,
                    detail: format!("question {} references unknown section {}", question.id, question.section),
                });
            }

            let table = loanq_rules::compile(&question.criteria)
                .map_err(|source| RegistryError::CompileFailed { path: path.clone(), source })?;
            if by_id.contains_key(&question.id) {
                return Err(RegistryError::DuplicateQuestionId { path, id: question.id });
            }
            question.always_applicable = question.criteria.trim().is_empty();
            compiled_tables.push((question.id.rule_id(), table));
            by_id.insert(question.id.clone(), question);
        }

        // Every question in the directory has validated by this point, so it
        // is now safe to install into the shared engine: a load that fails
        // partway through never left a single table behind.
        for (rule_id, table) in compiled_tables {
            engine.compile(rule_id, table);
        }

        let mut by_level: HashMap<EntityLevel, Vec<Question>> = HashMap::new();
        for question in by_id.values() {
            by_level.entry(question.level).or_default().push(question.clone());
        }
        let sequence_of: HashMap<&SectionId, u32> =
            sections_sorted.iter().map(|section| (&section.id, section.sequence)).collect();
        for bucket in by_level.values_mut() {
            bucket.sort_by_key(|question| {
                (sequence_of.get(&question.section).copied().unwrap_or(u32::MAX), question.ordinal)
            });
        }

        Ok(Self { by_id, by_level, sections_sorted })
    }

    /// Looks up a question by id.
    #[must_use]
    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.by_id.get(id)
    }

    /// Questions at the given entity level, pre-sorted by
    /// `(section.sequence, ordinal)`.
    #[must_use]
    pub fn questions_for_level(&self, level: EntityLevel) -> &[Question] {
        self.by_level.get(&level).map_or(&[], Vec::as_slice)
    }

    /// All sections, sorted by `sequence`.
    #[must_use]
    pub fn sections_sorted(&self) -> &[Section] {
        &self.sections_sorted
    }

    /// Total number of loaded questions.
    #[must_use]
    pub fn question_count(&self) -> usize {
        self.by_id.len()
    }
}

fn check_unique_sequences(dated_sections: &[(PathBuf, Section)]) -> Result<(), RegistryError> {
    let mut seen: HashMap<u32, SectionId> = HashMap::new();
    for (path, section) in dated_sections {
        if let Some(first) = seen.get(&section.sequence) {
            return Err(RegistryError::DuplicateSectionSequence {
                path: path.clone(),
                sequence: section.sequence,
                first: first.clone(),
            });
        }
        seen.insert(section.sequence, section.id.clone());
    }
    Ok(())
}

// ============================================================================
// SECTION: YAML Tree Walking
// ============================================================================

fn load_sections(dir: &Path) -> Result<Vec<(PathBuf, Section)>, RegistryError> {
    let mut sections = Vec::new();
    for path in yaml_files_in(dir)? {
        let section = deserialize_yaml::<Section>(&path)?;
        sections.push((path, section));
    }
    Ok(sections)
}

fn load_questions(dir: &Path) -> Result<Vec<(PathBuf, Question)>, RegistryError> {
    let mut paths = Vec::new();
    collect_yaml_files_recursive(dir, &mut paths)?;
    paths.sort();

    let mut questions = Vec::with_capacity(paths.len());
    for path in paths {
        let question = deserialize_yaml::<Question>(&path)?;
        questions.push((path, question));
    }
    Ok(questions)
}

/// Non-recursive listing of `*.yaml` files in `dir`, sorted for determinism.
fn yaml_files_in(dir: &Path) -> Result<Vec<PathBuf>, RegistryError> {
    let mut paths = Vec::new();
    let entries = fs::read_dir(dir).map_err(|source| RegistryError::Io {
        path: dir.to_path_buf(),
        source: source.to_string(),
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| RegistryError::Io {
            path: dir.to_path_buf(),
            source: source.to_string(),
        })?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "yaml" || ext == "yml") {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Recursively appends every `*.yaml`/`*.yml` file under `dir` to `out`,
/// descending into subdirectories in filesystem order.
fn collect_yaml_files_recursive(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), RegistryError> {
    let entries = fs::read_dir(dir).map_err(|source| RegistryError::Io {
        path: dir.to_path_buf(),
        source: source.to_string(),
    })?;
    let mut children = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| RegistryError::Io {
            path: dir.to_path_buf(),
            source: source.to_string(),
        })?;
        children.push(entry.path());
    }
    children.sort();

    for path in children {
        if path.is_dir() {
            collect_yaml_files_recursive(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "yaml" || ext == "yml") {
            out.push(path);
        }
    }
    Ok(())
}

fn deserialize_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, RegistryError> {
    let text = fs::read_to_string(path).map_err(|source| RegistryError::Io {
        path: path.to_path_buf(),
        source: source.to_string(),
    })?;
    serde_yaml::from_str(&text).map_err(|source| RegistryError::MissingField {
        path: path.to_path_buf(),
        detail: source.to_string(),
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
