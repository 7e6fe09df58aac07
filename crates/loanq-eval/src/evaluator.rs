// crates/loanq-eval/src/evaluator.rs
// ============================================================================
// Module: Question Evaluator
// Description: Turns a LoanState into the unordered list of applicable
// QueueItems under a configurable latency budget.
// Purpose: Own the per-level traversal, per-(question,slot) job construction,
// and merge-field interpolation the rest of the pipeline builds on.
// Dependencies: loanq-core, loanq-config, loanq-rules
// ============================================================================

//! ## Overview
//! [`QuestionEvaluator::evaluate`] walks [`EntityLevel::ORDER`], checking a
//! monotonic deadline between levels (and, once a level's instantiated job
//! count crosses [`FANOUT_CHECK_INTERVAL`], inside the per-level expansion
//! loop too). Each level's not-yet-answered questions are instantiated
//! against every applicable entity slot, batched through
//! [`loanq_rules::RulesEngine::evaluate_batch`], and a question that matches
//! (or is flagged `always_applicable`) becomes a [`QueueItem`] with its
//! `{{placeholder}}` tokens resolved against the slot entity's fields first,
//! then the loan's fields. A deadline hit stops the traversal early, returns
//! whatever was already built, and increments `evaluate_budget_exceeded`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use loanq_config::ConfigRegistry;
use loanq_core::EntityLevel;
use loanq_core::EntityRef;
use loanq_core::FieldValue;
use loanq_core::LoanState;
use loanq_core::Question;
use loanq_core::QueueItem;
use loanq_core::Telemetry;
use loanq_core::normalize_field_name;
use loanq_rules::RulesEngine;
use loanq_rules::engine::Context;

/// Number of (question, slot) jobs accumulated within a single level before
/// the inner expansion loop re-checks the deadline, per the budget policy's
/// "configurable fan-out threshold".
const FANOUT_CHECK_INTERVAL: usize = 64;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Tunables for [`QuestionEvaluator`].
#[derive(Debug, Clone, Copy)]
pub struct EvaluatorConfig {
    /// Local soft deadline, independent of any transport deadline.
    pub budget: Duration,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self { budget: Duration::from_millis(8) }
    }
}

// ============================================================================
// SECTION: Question Evaluator
// ============================================================================

/// Produces the unordered list of applicable [`QueueItem`]s for a
/// [`LoanState`], under [`EvaluatorConfig::budget`].
pub struct QuestionEvaluator {
    registry: Arc<ConfigRegistry>,
    rules: Arc<RulesEngine>,
    telemetry: Arc<dyn Telemetry>,
    config: EvaluatorConfig,
}

impl QuestionEvaluator {
    /// Builds an evaluator over `registry`/`rules`, recording
    /// `evaluate_budget_exceeded` against `telemetry`.
    #[must_use]
    pub fn new(
        registry: Arc<ConfigRegistry>,
        rules: Arc<RulesEngine>,
        telemetry: Arc<dyn Telemetry>,
        config: EvaluatorConfig,
    ) -> Self {
        Self { registry, rules, telemetry, config }
    }

    /// Evaluates every not-yet-answered question across all seven entity
    /// levels against `loan_state`, returning the unordered queue.
    #[must_use]
    pub fn evaluate(&self, loan_state: &LoanState) -> Vec<QueueItem> {
        let start = Instant::now();
        let mut items = Vec::new();
        let mut budget_exceeded = false;

        for level in EntityLevel::ORDER {
            if start.elapsed() > self.config.budget {
                budget_exceeded = true;
                break;
            }

            let questions = self.registry.questions_for_level(level);
            let slots = slots_for(level, loan_state);

            let mut jobs: Vec<(String, Context)> = Vec::new();
            let mut job_questions: Vec<&Question> = Vec::new();
            let mut job_slots: Vec<Option<&EntityRef>> = Vec::new();

            'fanout: for question in questions {
                if loan_state.answered.contains(&question.id) {
                    continue;
                }
                for slot in &slots {
                    if !jobs.is_empty()
                        && jobs.len() % FANOUT_CHECK_INTERVAL == 0
                        && start.elapsed() > self.config.budget
                    {
                        budget_exceeded = true;
                        break 'fanout;
                    }
                    jobs.push((question.id.rule_id(), merge_context(&loan_state.fields, *slot)));
                    job_questions.push(question);
                    job_slots.push(*slot);
                }
            }

            let results = if jobs.is_empty() { Vec::new() } else { self.rules.evaluate_batch(&jobs) };
            for ((question, slot), matched) in job_questions.into_iter().zip(job_slots).zip(results) {
                if matched || question.always_applicable {
                    items.push(build_queue_item(question, slot, &loan_state.fields));
                }
            }

            if budget_exceeded {
                break;
            }
        }

        if budget_exceeded {
            self.telemetry.record_counter("evaluate_budget_exceeded", 1);
        }
        items
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn slots_for<'a>(level: EntityLevel, loan_state: &'a LoanState) -> Vec<Option<&'a EntityRef>> {
    if level.is_singleton() {
        vec![None]
    } else {
        loan_state.entities.for_level(level).unwrap_or(&[]).iter().map(Some).collect()
    }
}

fn merge_context(loan_fields: &BTreeMap<String, FieldValue>, slot: Option<&EntityRef>) -> Context {
    let mut context = loan_fields.clone();
    if let Some(entity) = slot {
        context.extend(entity.fields.clone());
    }
    context
}

fn build_queue_item(question: &Question, slot: Option<&EntityRef>, loan_fields: &BTreeMap<String, FieldValue>) -> QueueItem {
    let access_field = question.form_fields.first().map(|field| field.access_field.clone()).unwrap_or_default();
    QueueItem {
        question_id: question.id.clone(),
        section: question.section.clone(),
        ordinal: question.ordinal,
        entity_level: question.level,
        entity_pid: slot.map(|entity| entity.pid.clone()),
        entity_display_name: slot.map(|entity| entity.display_name.clone()),
        rendered_text: interpolate(&question.instructions, slot, loan_fields),
        input_kind: question.input_kind.clone(),
        options: question.options.clone(),
        access_field,
        flexibility: question.flexibility,
        can_combine_with: question.can_combine_with.clone(),
    }
}

/// Resolves `{{placeholder}}` tokens in `template`: the placeholder is
/// normalized like a field name, the slot entity's fields are checked
/// first, then the loan's fields; an unresolved or null placeholder is left
/// literal.
fn interpolate(template: &str, slot: Option<&EntityRef>, loan_fields: &BTreeMap<String, FieldValue>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut i = 0;
    while i < template.len() {
        if template[i..].starts_with("{{") {
            if let Some(end) = template[i + 2..].find("}}") {
                let raw_name = &template[i + 2..i + 2 + end];
                let normalized = normalize_field_name(raw_name);
                let resolved = slot
                    .and_then(|entity| entity.fields.get(&normalized))
                    .or_else(|| loan_fields.get(&normalized))
                    .filter(|value| !value.is_null())
                    .map(field_value_display);
                let token_end = i + 2 + end + 2;
                match resolved {
                    Some(text) => out.push_str(&text),
                    None => out.push_str(&template[i..token_end]),
                }
                i = token_end;
                continue;
            }
        }
        let ch = template[i..].chars().next().unwrap_or('\u{0}');
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

fn field_value_display(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(text) => text.clone(),
        FieldValue::Number(number) => number.to_string(),
        FieldValue::Bool(boolean) => boolean.to_string(),
        FieldValue::Null => String::new(),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only panic-based assertions are permitted.")]
mod tests {
    use std::collections::BTreeSet;
    use std::fs;
    use std::path::Path;

    use loanq_core::EntityCollections;
    use loanq_core::EntityPid;
    use loanq_core::NoopTelemetry;
    use loanq_core::ProposalPid;
    use loanq_core::QuestionId;
    use loanq_core::SystemClock;
    use tempfile::TempDir;

    use super::*;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().expect("has parent")).expect("mkdir");
        fs::write(path, content).expect("write");
    }

    fn base_state() -> LoanState {
        LoanState {
            proposal_pid: ProposalPid::from("P1"),
            version: 1,
            loaded_at: SystemClock.now(),
            fields: BTreeMap::new(),
            entities: EntityCollections::default(),
            answered: BTreeSet::new(),
        }
    }

    fn evaluator(dir: &Path, budget: Duration) -> QuestionEvaluator {
        let rules = Arc::new(RulesEngine::new());
        let registry = Arc::new(ConfigRegistry::load(dir, &rules).expect("loads"));
        QuestionEvaluator::new(registry, rules, Arc::new(NoopTelemetry), EvaluatorConfig { budget })
    }

    #[test]
    fn always_applicable_question_is_emitted_without_a_matching_context() {
        let dir = TempDir::new().expect("tempdir");
        write(dir.path(), "sections/s.yaml", "id: s\nname: Section\nsequence: 1\n");
        write(
            dir.path(),
            "questions/q1.yaml",
            "id: Q1\nsection: s\nordinal: 1\nlevel: PROPOSAL\ninstructions: \"Hello\"\ntype: text\ncriteria: \"\"\nflexibility: exact\n",
        );

        let evaluator = evaluator(dir.path(), Duration::from_secs(1));
        let items = evaluator.evaluate(&base_state());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].question_id, QuestionId::from("Q1"));
    }

    #[test]
    fn answered_questions_are_skipped() {
        let dir = TempDir::new().expect("tempdir");
        write(dir.path(), "sections/s.yaml", "id: s\nname: Section\nsequence: 1\n");
        write(
            dir.path(),
            "questions/q1.yaml",
            "id: Q100\nsection: s\nordinal: 1\nlevel: PROPOSAL\ninstructions: \"Hello\"\ntype: text\ncriteria: \"\"\nflexibility: exact\n",
        );

        let evaluator = evaluator(dir.path(), Duration::from_secs(1));
        let mut state = base_state();
        state.answered.insert(QuestionId::from("Q100"));
        let items = evaluator.evaluate(&state);
        assert!(items.iter().all(|item| item.question_id != QuestionId::from("Q100")));
    }

    #[test]
    fn matching_criteria_produces_an_item_and_non_matching_does_not() {
        let dir = TempDir::new().expect("tempdir");
        write(dir.path(), "sections/s.yaml", "id: s\nname: Section\nsequence: 1\n");
        write(
            dir.path(),
            "questions/q1.yaml",
            "id: Q1\nsection: s\nordinal: 1\nlevel: PROPOSAL\ninstructions: \"Hello\"\ntype: text\ncriteria: \"Loan Type is Conventional\"\nflexibility: exact\n",
        );

        let evaluator = evaluator(dir.path(), Duration::from_secs(1));

        let mut matching = base_state();
        matching.fields.insert("loan_type".to_string(), FieldValue::from("CONVENTIONAL"));
        assert_eq!(evaluator.evaluate(&matching).len(), 1);

        let mut non_matching = base_state();
        non_matching.fields.insert("loan_type".to_string(), FieldValue::from("FHA"));
        assert!(evaluator.evaluate(&non_matching).is_empty());
    }

    #[test]
    fn one_item_is_produced_per_entity_instance() {
        let dir = TempDir::new().expect("tempdir");
        write(dir.path(), "sections/s.yaml", "id: s\nname: Section\nsequence: 1\n");
        write(
            dir.path(),
            "questions/q1.yaml",
            "id: Q1\nsection: s\nordinal: 1\nlevel: BORROWER\ninstructions: \"Hello\"\ntype: text\ncriteria: \"\"\nflexibility: exact\n",
        );

        let evaluator = evaluator(dir.path(), Duration::from_secs(1));
        let mut state = base_state();
        state.entities.borrowers = vec![
            EntityRef { pid: EntityPid::from("B1"), display_name: "Ada".to_string(), fields: BTreeMap::new() },
            EntityRef { pid: EntityPid::from("B2"), display_name: "Bea".to_string(), fields: BTreeMap::new() },
        ];

        let items = evaluator.evaluate(&state);
        assert_eq!(items.len(), 2);
        let pids: BTreeSet<_> = items.iter().filter_map(|item| item.entity_pid.clone()).collect();
        assert_eq!(pids, BTreeSet::from([EntityPid::from("B1"), EntityPid::from("B2")]));
    }

    #[test]
    fn merge_field_interpolation_prefers_entity_fields_over_loan_fields() {
        let dir = TempDir::new().expect("tempdir");
        write(dir.path(), "sections/s.yaml", "id: s\nname: Section\nsequence: 1\n");
        write(
            dir.path(),
            "questions/q1.yaml",
            "id: Q1\nsection: s\nordinal: 1\nlevel: JOB\ninstructions: \"How many hours at {{employer_name}}?\"\ntype: text\ncriteria: \"\"\nflexibility: exact\n",
        );

        let evaluator = evaluator(dir.path(), Duration::from_secs(1));
        let mut state = base_state();
        state.fields.insert("employer_name".to_string(), FieldValue::from("Loan-Level Employer"));
        let mut fields = BTreeMap::new();
        fields.insert("employer_name".to_string(), FieldValue::from("Acme Corp"));
        state.entities.jobs = vec![EntityRef { pid: EntityPid::from("J1"), display_name: "Job".to_string(), fields }];

        let items = evaluator.evaluate(&state);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].rendered_text, "How many hours at Acme Corp?");
    }

    #[test]
    fn unresolved_placeholder_is_left_literal() {
        let dir = TempDir::new().expect("tempdir");
        write(dir.path(), "sections/s.yaml", "id: s\nname: Section\nsequence: 1\n");
        write(
            dir.path(),
            "questions/q1.yaml",
            "id: Q1\nsection: s\nordinal: 1\nlevel: PROPOSAL\ninstructions: \"Value: {{missing_field}}\"\ntype: text\ncriteria: \"\"\nflexibility: exact\n",
        );

        let evaluator = evaluator(dir.path(), Duration::from_secs(1));
        let items = evaluator.evaluate(&base_state());
        assert_eq!(items[0].rendered_text, "Value: {{missing_field}}");
    }

    #[test]
    fn zero_budget_returns_a_well_formed_but_empty_queue_and_counts() {
        let dir = TempDir::new().expect("tempdir");
        write(dir.path(), "sections/s.yaml", "id: s\nname: Section\nsequence: 1\n");
        write(
            dir.path(),
            "questions/q1.yaml",
            "id: Q1\nsection: s\nordinal: 1\nlevel: PROPOSAL\ninstructions: \"Hello\"\ntype: text\ncriteria: \"\"\nflexibility: exact\n",
        );

        let evaluator = evaluator(dir.path(), Duration::from_nanos(0));
        let items = evaluator.evaluate(&base_state());
        assert!(items.is_empty());
    }
}
