// crates/loanq-rules/src/compiler.rs
// ============================================================================
// Module: LoanQ Criteria Compiler
// Description: Translates a human-readable criteria string into a normalized
// decision table.
// Purpose: Stateless startup-time compilation step feeding the Rules Engine.
// Dependencies: loanq-core, serde, thiserror
// ============================================================================

//! ## Overview
//! The criteria grammar is line-oriented: a bare comparison line, or a
//! `Matches all of the following rules:` / `Matches any of the following
//! rules:` header followed by indented comparison lines. Unparseable input
//! is hard-rejected — the grammar has no nested boolean groups, list
//! operators, or date arithmetic, and a malformed line never silently
//! becomes a best-effort truthy check.
//!
//! Field-name and value normalization here must agree exactly with the
//! normalization applied at load-context construction time (`loanq-eval`'s
//! evaluator), or conditions never join against the runtime context.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use loanq_core::Comparator;
use loanq_core::FieldValue;
use loanq_core::normalize_field_name;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Number;
use thiserror::Error;

// ============================================================================
// SECTION: Grammar Constants
// ============================================================================

/// Header line introducing an AND group.
const HEADER_ALL: &str = "Matches all of the following rules:";
/// Header line introducing an OR group.
const HEADER_ANY: &str = "Matches any of the following rules:";

// ============================================================================
// SECTION: Decision Table
// ============================================================================

/// The hit policy governing how a decision table's rows are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitPolicy {
    /// Walk rows in order; the first fully-matching row wins.
    First,
}

/// A single recognized condition: a comparator applied to a normalized
/// expected value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// The comparison operator.
    pub operator: Comparator,
    /// The normalized expected value.
    pub value: FieldValue,
}

/// One row of a decision table: every condition must hold for the row to
/// match, in which case `result` is the table's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleRow {
    /// Field name (normalized) to condition.
    pub conditions: BTreeMap<String, Condition>,
    /// The output when every condition in this row holds.
    pub result: bool,
}

/// A normalized decision table: the output of compiling one criteria string.
///
/// # Invariants
/// - An empty `rules` list evaluates to `false` under `first` hit policy;
///   callers that want "always applicable" track that separately (see
///   `Question::always_applicable`), they do not rely on engine truthiness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTable {
    /// The hit policy (always `First` for this grammar).
    pub hit_policy: HitPolicy,
    /// Ordered rule rows.
    pub rules: Vec<RuleRow>,
}

impl DecisionTable {
    /// The table compiled from an empty or whitespace-only criteria string.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            hit_policy: HitPolicy::First,
            rules: Vec::new(),
        }
    }
}

// ============================================================================
// SECTION: Compile Error
// ============================================================================

/// Criteria compilation errors, one variant per failure class.
///
/// # Invariants
/// - Every variant carries the 1-based source line number; the Configuration
///   Registry adds the source file path when propagating this as a fatal
///   startup failure.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A `Matches all/any of the following rules:` header had no indented
    /// lines beneath it.
    #[error("line {line}: header '{header}' has no indented rule lines")]
    EmptyHeader {
        /// 1-based line number of the header.
        line: usize,
        /// The header text.
        header: String,
    },
    /// A comparison line matched no recognized shape.
    #[error("line {line}: malformed comparison: '{text}'")]
    MalformedComparison {
        /// 1-based line number.
        line: usize,
        /// The offending line text.
        text: String,
    },
    /// An ordering comparator (`>=`/`<=`/`>`/`<`) had a non-numeric
    /// right-hand side.
    #[error("line {line}: non-numeric right-hand side: '{text}'")]
    NonNumericRhs {
        /// 1-based line number.
        line: usize,
        /// The offending right-hand-side text.
        text: String,
    },
    /// A line matched no recognized grammar construct at all.
    #[error("line {line}: unrecognized line: '{text}'")]
    UnrecognizedLine {
        /// 1-based line number.
        line: usize,
        /// The offending line text.
        text: String,
    },
}

// ============================================================================
// SECTION: Lexer
// ============================================================================

/// A single non-blank source line, classified by indentation.
#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    /// 1-based line number in the original source.
    number: usize,
    /// True if the line had leading whitespace before trimming.
    indented: bool,
    /// Trimmed line text.
    text: &'a str,
}

/// Splits criteria source into non-blank, indentation-classified lines.
fn lex(source: &str) -> Vec<Line<'_>> {
    source
        .lines()
        .enumerate()
        .filter_map(|(index, raw)| {
            let text = raw.trim();
            if text.is_empty() {
                return None;
            }
            let indented = raw.starts_with(' ') || raw.starts_with('\t');
            Some(Line {
                number: index + 1,
                indented,
                text,
            })
        })
        .collect()
}

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Compiles a criteria string into a normalized decision table.
///
/// # Errors
///
/// Returns [`CompileError`] if any line fails to match a recognized grammar
/// construct, an ordering comparator has a non-numeric right-hand side, or a
/// header has no indented body.
pub fn compile(source: &str) -> Result<DecisionTable, CompileError> {
    let lines = lex(source);
    if lines.is_empty() {
        return Ok(DecisionTable::empty());
    }

    let header = lines[0];
    if header.text == HEADER_ALL {
        let body = &lines[1..];
        if body.is_empty() || !body.iter().all(|line| line.indented) {
            return Err(CompileError::EmptyHeader {
                line: header.number,
                header: header.text.to_string(),
            });
        }
        let mut conditions = BTreeMap::new();
        for line in body {
            let (field, condition) = parse_condition_line(line)?;
            conditions.insert(field, condition);
        }
        return Ok(DecisionTable {
            hit_policy: HitPolicy::First,
            rules: vec![RuleRow {
                conditions,
                result: true,
            }],
        });
    }

    if header.text == HEADER_ANY {
        let body = &lines[1..];
        if body.is_empty() || !body.iter().all(|line| line.indented) {
            return Err(CompileError::EmptyHeader {
                line: header.number,
                header: header.text.to_string(),
            });
        }
        let mut rules = Vec::with_capacity(body.len());
        for line in body {
            let (field, condition) = parse_condition_line(line)?;
            let mut conditions = BTreeMap::new();
            conditions.insert(field, condition);
            rules.push(RuleRow {
                conditions,
                result: true,
            });
        }
        return Ok(DecisionTable {
            hit_policy: HitPolicy::First,
            rules,
        });
    }

    if lines.len() == 1 {
        let (field, condition) = parse_condition_line(&header)?;
        let mut conditions = BTreeMap::new();
        conditions.insert(field, condition);
        return Ok(DecisionTable {
            hit_policy: HitPolicy::First,
            rules: vec![RuleRow {
                conditions,
                result: true,
            }],
        });
    }

    Err(CompileError::UnrecognizedLine {
        line: header.number,
        text: header.text.to_string(),
    })
}

/// Parses a single comparison line into a (normalized field, condition) pair.
fn parse_condition_line(line: &Line<'_>) -> Result<(String, Condition), CompileError> {
    let text = line.text;

    if let Some(field) = text.strip_suffix(" is not set") {
        return Ok((
            normalize_field_name(field),
            Condition {
                operator: Comparator::Eq,
                value: FieldValue::Null,
            },
        ));
    }

    if let Some(idx) = text.find(" is not ") {
        let field = &text[..idx];
        let value_text = &text[idx + " is not ".len()..];
        return Ok((
            normalize_field_name(field),
            Condition {
                operator: Comparator::NotEq,
                value: normalize_value(value_text),
            },
        ));
    }

    if let Some(idx) = text.find(" is ") {
        let field = &text[..idx];
        let value_text = &text[idx + " is ".len()..];
        return Ok((
            normalize_field_name(field),
            Condition {
                operator: Comparator::Eq,
                value: normalize_value(value_text),
            },
        ));
    }

    for (operator_text, comparator) in [
        (">=", Comparator::Gte),
        ("<=", Comparator::Lte),
        (">", Comparator::Gt),
        ("<", Comparator::Lt),
    ] {
        if let Some(idx) = text.find(operator_text) {
            let field = text[..idx].trim();
            let value_text = text[idx + operator_text.len()..].trim();
            let Some(value) = parse_numeric_literal(value_text) else {
                return Err(CompileError::NonNumericRhs {
                    line: line.number,
                    text: value_text.to_string(),
                });
            };
            return Ok((
                normalize_field_name(field),
                Condition {
                    operator: comparator,
                    value,
                },
            ));
        }
    }

    Err(CompileError::UnrecognizedLine {
        line: line.number,
        text: text.to_string(),
    })
}

// ============================================================================
// SECTION: Value Normalization
// ============================================================================

/// Normalizes a comparison right-hand side into a `FieldValue`: boolean
/// literal, numeric literal, or uppercase text.
fn normalize_value(raw: &str) -> FieldValue {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        return FieldValue::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return FieldValue::Bool(false);
    }
    if let Some(value) = parse_numeric_literal(trimmed) {
        return value;
    }
    FieldValue::Text(normalize_value_text(trimmed))
}

/// Uppercases a value and maps whitespace/`-` to `_`, e.g. `US Citizen` ->
/// `US_CITIZEN`.
fn normalize_value_text(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other if other.is_whitespace() => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}

/// Parses a string matching `^-?\d+(\.\d+)?$` into a numeric `FieldValue`.
fn parse_numeric_literal(raw: &str) -> Option<FieldValue> {
    if !is_numeric_literal(raw) {
        return None;
    }
    if let Ok(integer) = raw.parse::<i64>() {
        return Some(FieldValue::Number(Number::from(integer)));
    }
    raw.parse::<f64>().ok().and_then(Number::from_f64).map(FieldValue::Number)
}

/// Returns true if `raw` matches `^-?\d+(\.\d+)?$`.
fn is_numeric_literal(raw: &str) -> bool {
    let unsigned = raw.strip_prefix('-').unwrap_or(raw);
    let mut parts = unsigned.splitn(2, '.');
    let Some(integer_part) = parts.next() else {
        return false;
    };
    if integer_part.is_empty() || !integer_part.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    match parts.next() {
        None => true,
        Some(fraction) => !fraction.is_empty() && fraction.bytes().all(|b| b.is_ascii_digit()),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_compiles_to_empty_table() {
        let table = compile("   \n\n").expect("compiles");
        assert!(table.rules.is_empty());
    }

    #[test]
    fn compile_is_scenario() {
        let table = compile("Citizenship Type is US Citizen").expect("compiles");
        assert_eq!(table.rules.len(), 1);
        let row = &table.rules[0];
        let condition = row.conditions.get("citizenship_type").expect("field present");
        assert_eq!(condition.operator, Comparator::Eq);
        assert_eq!(condition.value, FieldValue::Text("US_CITIZEN".to_string()));
    }

    #[test]
    fn compile_and_scenario() {
        let source = "Matches all of the following rules:\n  Citizenship Type is Non-Permanent Resident\n  Visa Type is H-1B";
        let table = compile(source).expect("compiles");
        assert_eq!(table.rules.len(), 1);
        let row = &table.rules[0];
        assert_eq!(row.conditions.len(), 2);
        assert!(row.conditions.contains_key("citizenship_type"));
        assert!(row.conditions.contains_key("visa_type"));
    }

    #[test]
    fn compile_or_scenario() {
        let source = "Matches any of the following rules:\n  Loan Purpose is Purchase\n  Loan Purpose is Refinance";
        let table = compile(source).expect("compiles");
        assert_eq!(table.rules.len(), 2);
        for row in &table.rules {
            assert_eq!(row.conditions.len(), 1);
            assert!(row.conditions.contains_key("loan_purpose"));
        }
    }

    #[test]
    fn is_not_set_compiles_to_null_equality() {
        let table = compile("Middle Name is not set").expect("compiles");
        let row = &table.rules[0];
        let condition = row.conditions.get("middle_name").expect("field present");
        assert_eq!(condition.operator, Comparator::Eq);
        assert_eq!(condition.value, FieldValue::Null);
    }

    #[test]
    fn is_not_compiles_to_not_equal() {
        let table = compile("Loan Type is not FHA").expect("compiles");
        let row = &table.rules[0];
        let condition = row.conditions.get("loan_type").expect("field present");
        assert_eq!(condition.operator, Comparator::NotEq);
    }

    #[test]
    fn numeric_comparator_compiles() {
        let table = compile("Credit Score >= 620").expect("compiles");
        let row = &table.rules[0];
        let condition = row.conditions.get("credit_score").expect("field present");
        assert_eq!(condition.operator, Comparator::Gte);
        assert_eq!(condition.value, FieldValue::from_i64(620));
    }

    #[test]
    fn non_numeric_rhs_on_ordering_comparator_is_a_compile_error() {
        let err = compile("Credit Score >= excellent").expect_err("must reject");
        assert!(matches!(err, CompileError::NonNumericRhs { .. }));
    }

    #[test]
    fn unrecognized_line_is_hard_rejected() {
        let err = compile("Loan Purpose sort of matches Purchase").expect_err("must reject");
        assert!(matches!(err, CompileError::UnrecognizedLine { .. }));
    }

    #[test]
    fn header_with_no_indented_body_is_a_compile_error() {
        let err = compile("Matches all of the following rules:").expect_err("must reject");
        assert!(matches!(err, CompileError::EmptyHeader { .. }));
    }

    #[test]
    fn compile_is_deterministic_and_idempotent() {
        let source = "Credit Score >= 620";
        let first = compile(source).expect("compiles");
        let second = compile(source).expect("compiles");
        assert_eq!(first, second);
    }

    proptest::proptest! {
        #[test]
        fn normalize_field_name_idempotent(raw in "[A-Za-z0-9 _-]{0,24}") {
            let once = normalize_field_name(&raw);
            let twice = normalize_field_name(&once);
            proptest::prop_assert_eq!(once, twice);
        }
    }
}
