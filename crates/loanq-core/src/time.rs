// crates/loanq-core/src/time.rs
// ============================================================================
// Module: LoanQ Time Model
// Description: Canonical timestamp representation and the injected clock
// boundary that keeps the rest of the core deterministic.
// Purpose: Core logic never reads the wall clock directly; it always goes
// through an injected `Clock`, so tests can supply frozen time.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! `LoanState.loadedAt` and `LoanState.version` are both derived from time,
//! but neither the State Loader nor the State Cache reads
//! `SystemTime::now()` directly: both take a `&dyn Clock`. `SystemClock` is
//! the production implementation; tests supply a fixed-value stub.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// A point in wall-clock time, carried as both a monotonic-for-comparison
/// unix-millis value and a rendered ISO-8601 string.
///
/// # Invariants
/// - `unix_millis` is the value compared for ordering (`version`, staleness
///   detection); `as_rfc3339` is derived from it and is never out of sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp {
    unix_millis: i64,
}

impl Timestamp {
    /// Creates a timestamp from raw unix milliseconds.
    #[must_use]
    pub const fn from_unix_millis(unix_millis: i64) -> Self {
        Self { unix_millis }
    }

    /// Returns the raw unix-milliseconds value.
    #[must_use]
    pub const fn unix_millis(self) -> i64 {
        self.unix_millis
    }

    /// Renders this timestamp as an ISO-8601 (RFC3339) string, the wire form
    /// used when `loadedAt` crosses the cache codec boundary.
    ///
    /// Falls back to the raw millisecond value rendered as a string on the
    /// (unreachable in practice) case of an out-of-range timestamp, rather
    /// than panicking.
    #[must_use]
    pub fn to_rfc3339(self) -> String {
        let seconds = self.unix_millis.div_euclid(1000);
        let nanos = self.unix_millis.rem_euclid(1000) * 1_000_000;
        OffsetDateTime::from_unix_timestamp(seconds)
            .ok()
            .map(|dt| dt + std::time::Duration::from_nanos(u64::try_from(nanos).unwrap_or(0)))
            .and_then(|dt| dt.format(&Rfc3339).ok())
            .unwrap_or_else(|| self.unix_millis.to_string())
    }

    /// Parses an ISO-8601 (RFC3339) string into a timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is not a valid RFC3339 string.
    pub fn parse_rfc3339(value: &str) -> Result<Self, time::error::Parse> {
        let parsed = OffsetDateTime::parse(value, &Rfc3339)?;
        let unix_millis = parsed.unix_timestamp() * 1000 + i64::from(parsed.millisecond());
        Ok(Self::from_unix_millis(unix_millis))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Source of the current time, injected everywhere the core needs "now"
/// rather than read from the environment directly.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

/// Production `Clock` backed by `SystemTime::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Timestamp::from_unix_millis(millis)
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
    fn rfc3339_round_trip() {
        let original = Timestamp::from_unix_millis(1_700_000_000_000);
        let rendered = original.to_rfc3339();
        let parsed = Timestamp::parse_rfc3339(&rendered).expect("valid rfc3339");
        assert_eq!(parsed, original);
    }

    #[test]
    fn system_clock_increases() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second.unix_millis() >= first.unix_millis());
    }

    #[test]
    fn timestamp_ordering_is_by_unix_millis() {
        let earlier = Timestamp::from_unix_millis(100);
        let later = Timestamp::from_unix_millis(200);
        assert!(earlier < later);
    }
}
