// crates/loanq-core/src/fields.rs
// ============================================================================
// Module: LoanQ Field Values and Comparators
// Description: The heterogeneous field-value sum type and decimal-aware
// comparator evaluation shared by the Criteria Compiler and Rules Engine.
// Purpose: Keep loan/entity field values as an explicit tagged variant rather
// than a dynamic container, with codecs only at the process boundary.
// Dependencies: bigdecimal, serde, serde_json
// ============================================================================

//! ## Overview
//! Loan fields and answer values are heterogeneous: string, number, boolean,
//! or null. `FieldValue` is the tagged variant carried through the core;
//! JSON/msgpack codecs convert at the boundary (answer payloads, the remote
//! cache). Numeric comparison is decimal-aware via `bigdecimal` so dollar
//! amounts and rates never suffer float drift.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Number;

// ============================================================================
// SECTION: Field Value
// ============================================================================

/// A loan or entity field value.
///
/// # Invariants
/// - Serializes losslessly to/from JSON at process boundaries (answer
///   payloads, `GetLoanState` snapshots); the msgpack cache codec transports
///   the same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Absence of a value; also the treatment of a field missing from context.
    Null,
    /// A boolean value.
    Bool(bool),
    /// A numeric value, compared decimal-aware rather than as a float.
    Number(Number),
    /// A normalized or free-form text value.
    Text(String),
}

impl FieldValue {
    /// Returns this value as a string slice, if it is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Returns true if this value is `Null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Builds a numeric field value from an `i64`.
    #[must_use]
    pub fn from_i64(value: i64) -> Self {
        FieldValue::Number(Number::from(value))
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

// ============================================================================
// SECTION: Field Name Normalization
// ============================================================================

/// Normalizes a field or placeholder name: lowercase, whitespace and `-`
/// mapped to `_`.
///
/// Applied identically at criteria-compile time and at load-context
/// construction time so joins between the two always agree.
///
/// # Invariants
/// - Idempotent: `normalize_field_name(normalize_field_name(f)) ==
///   normalize_field_name(f)` for all `f`.
#[must_use]
pub fn normalize_field_name(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other if other.is_whitespace() => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

// ============================================================================
// SECTION: Comparator
// ============================================================================

/// A comparison operator recognized by the criteria grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    /// `<field> is <value>` / `<field> is not set`.
    #[serde(rename = "==")]
    Eq,
    /// `<field> is not <value>`.
    #[serde(rename = "!=")]
    NotEq,
    /// `<field> >= <number>`.
    #[serde(rename = ">=")]
    Gte,
    /// `<field> <= <number>`.
    #[serde(rename = "<=")]
    Lte,
    /// `<field> > <number>`.
    #[serde(rename = ">")]
    Gt,
    /// `<field> < <number>`.
    #[serde(rename = "<")]
    Lt,
}

/// Evaluates a comparator against an expected value and the context's actual
/// value for the field.
///
/// A missing field (`actual == None`) is treated as `FieldValue::Null`, so
/// `is not set` (`Eq` against `Null`) matches it. Ordering comparators
/// (`Gte`/`Lte`/`Gt`/`Lt`) only ever appear with a numeric `expected` value
/// (the Compiler rejects non-numeric right-hand sides at compile time); a
/// non-numeric `actual` simply fails to match rather than raising an error.
#[must_use]
pub fn evaluate_comparator(
    comparator: Comparator,
    expected: &FieldValue,
    actual: Option<&FieldValue>,
) -> bool {
    let actual = actual.unwrap_or(&FieldValue::Null);
    match comparator {
        Comparator::Eq => values_equal(actual, expected),
        Comparator::NotEq => !values_equal(actual, expected),
        Comparator::Gte | Comparator::Lte | Comparator::Gt | Comparator::Lt => {
            evaluate_ordering(comparator, actual, expected)
        }
    }
}

/// Structural equality with decimal-aware numeric comparison.
fn values_equal(left: &FieldValue, right: &FieldValue) -> bool {
    match (left, right) {
        (FieldValue::Number(left), FieldValue::Number(right)) => {
            decimal_eq(left, right).unwrap_or(false)
        }
        _ => left == right,
    }
}

/// Evaluates an ordering comparator; only meaningful between two numbers.
fn evaluate_ordering(comparator: Comparator, actual: &FieldValue, expected: &FieldValue) -> bool {
    let (FieldValue::Number(actual), FieldValue::Number(expected)) = (actual, expected) else {
        return false;
    };
    let Some(ordering) = decimal_cmp(actual, expected) else {
        return false;
    };
    match comparator {
        Comparator::Gte => ordering.is_ge(),
        Comparator::Lte => ordering.is_le(),
        Comparator::Gt => ordering.is_gt(),
        Comparator::Lt => ordering.is_lt(),
        Comparator::Eq | Comparator::NotEq => false,
    }
}

/// Compares two JSON numbers for decimal equality.
fn decimal_eq(left: &Number, right: &Number) -> Option<bool> {
    Some(decimal_cmp(left, right)? == Ordering::Equal)
}

/// Orders two JSON numbers using decimal-aware comparison.
fn decimal_cmp(left: &Number, right: &Number) -> Option<Ordering> {
    let left = decimal_from_number(left)?;
    let right = decimal_from_number(right)?;
    Some(left.cmp(&right))
}

/// Parses a JSON number into `BigDecimal` via its stable string form.
fn decimal_from_number(number: &Number) -> Option<BigDecimal> {
    BigDecimal::from_str(&number.to_string()).ok()
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
    fn normalize_field_name_lowercases_and_joins() {
        assert_eq!(normalize_field_name("Citizenship Type"), "citizenship_type");
        assert_eq!(normalize_field_name("US-Citizen"), "us_citizen");
    }

    #[test]
    fn normalize_field_name_is_idempotent() {
        let once = normalize_field_name("Loan Purpose");
        let twice = normalize_field_name(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn eq_matches_missing_field_against_null() {
        let matched = evaluate_comparator(Comparator::Eq, &FieldValue::Null, None);
        assert!(matched);
    }

    #[test]
    fn eq_matches_text_value() {
        let expected = FieldValue::from("US_CITIZEN");
        let actual = FieldValue::from("US_CITIZEN");
        assert!(evaluate_comparator(Comparator::Eq, &expected, Some(&actual)));
    }

    #[test]
    fn not_eq_rejects_matching_value() {
        let expected = FieldValue::from("US_CITIZEN");
        let actual = FieldValue::from("US_CITIZEN");
        assert!(!evaluate_comparator(Comparator::NotEq, &expected, Some(&actual)));
    }

    #[test]
    fn numeric_equality_ignores_representation_drift() {
        let expected = FieldValue::Number(Number::from_f64(1.10).expect("finite"));
        let actual = FieldValue::Number(serde_json::from_str::<Number>("1.1").expect("valid"));
        assert!(evaluate_comparator(Comparator::Eq, &expected, Some(&actual)));
    }

    #[test]
    fn gte_holds_for_equal_and_greater_values() {
        let expected = FieldValue::from_i64(700);
        let exactly = FieldValue::from_i64(700);
        let higher = FieldValue::from_i64(720);
        let lower = FieldValue::from_i64(650);
        assert!(evaluate_comparator(Comparator::Gte, &expected, Some(&exactly)));
        assert!(evaluate_comparator(Comparator::Gte, &expected, Some(&higher)));
        assert!(!evaluate_comparator(Comparator::Gte, &expected, Some(&lower)));
    }

    #[test]
    fn ordering_against_non_numeric_actual_is_false_not_panic() {
        let expected = FieldValue::from_i64(700);
        let actual = FieldValue::from("not_a_number");
        assert!(!evaluate_comparator(Comparator::Gt, &expected, Some(&actual)));
    }
}
