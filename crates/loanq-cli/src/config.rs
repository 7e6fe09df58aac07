// crates/loanq-cli/src/config.rs
// ============================================================================
// Module: Serve Configuration
// Description: TOML-backed settings for the `serve` subcommand.
// Purpose: Load the environment surface (§6) the service needs to warm up
// and bind: transport port, config root, cache TTL, per-call timeouts, and
// the evaluator's latency budget.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! Mirrors `decision-gate-config::DecisionGateConfig::load`'s shape: read the
//! file, parse it as TOML, and return a typed config with field defaults
//! filled in by `#[serde(default)]`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Settings for the `serve` subcommand, read from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServeConfig {
    /// TCP port the `QuestionService` router binds to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path to the `<root>/sections`, `<root>/questions` configuration tree.
    pub config_root: PathBuf,
    /// Path to the reference `SQLite` system-of-record database.
    pub store_path: PathBuf,
    /// TTL, in seconds, applied to the four split remote-cache keys.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Per-call timeout, in milliseconds, for system-of-record and
    /// remote-cache calls.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Per-call timeout, in milliseconds, for write-back queue enqueue
    /// calls.
    #[serde(default = "default_enqueue_timeout_ms")]
    pub enqueue_timeout_ms: u64,
    /// Wall-clock budget, in milliseconds, the Question Evaluator has per
    /// `evaluate` call.
    #[serde(default = "default_evaluate_budget_ms")]
    pub evaluate_budget_ms: u64,
    /// Capacity of the in-process write-back queue channel.
    #[serde(default = "default_write_queue_capacity")]
    pub write_queue_capacity: usize,
}

const fn default_port() -> u16 {
    8080
}

const fn default_cache_ttl_secs() -> u64 {
    60
}

const fn default_call_timeout_ms() -> u64 {
    200
}

const fn default_enqueue_timeout_ms() -> u64 {
    50
}

const fn default_evaluate_budget_ms() -> u64 {
    50
}

const fn default_write_queue_capacity() -> usize {
    256
}

impl ServeConfig {
    /// `cache_ttl_secs` as a [`Duration`].
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// `call_timeout_ms` as a [`Duration`].
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// `enqueue_timeout_ms` as a [`Duration`].
    #[must_use]
    pub const fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }

    /// `evaluate_budget_ms` as a [`Duration`].
    #[must_use]
    pub const fn evaluate_budget(&self) -> Duration {
        Duration::from_millis(self.evaluate_budget_ms)
    }
}

/// Errors surfaced while loading a [`ServeConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// The config file was not valid TOML for this shape.
    #[error("config parse error: {0}")]
    Parse(String),
}

/// Loads a [`ServeConfig`] from the TOML file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if `path` cannot be read, or
/// [`ConfigError::Parse`] if its contents are not valid TOML for
/// [`ServeConfig`]'s shape.
pub fn load(path: &Path) -> Result<ServeConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|err| ConfigError::Io(err.to_string()))?;
    toml::from_str(&content).map_err(|err| ConfigError::Parse(err.to_string()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only panic-based assertions are permitted.")]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn load_fills_in_defaults_for_omitted_fields() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("loanq.toml");
        fs::write(&path, "config_root = \"/tmp/config\"\nstore_path = \"/tmp/loanq.sqlite3\"\n").expect("write config");
        let config = load(&path).expect("config loads");
        assert_eq!(config.port, 8080);
        assert_eq!(config.cache_ttl_secs, 60);
    }

    #[test]
    fn load_honors_explicit_overrides() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("loanq.toml");
        fs::write(
            &path,
            "port = 9000\nconfig_root = \"/tmp/config\"\nstore_path = \"/tmp/loanq.sqlite3\"\ncache_ttl_secs = 30\n",
        )
        .expect("write config");
        let config = load(&path).expect("config loads");
        assert_eq!(config.port, 9000);
        assert_eq!(config.cache_ttl_secs, 30);
    }

    #[test]
    fn load_rejects_a_missing_file() {
        let dir = TempDir::new().expect("tempdir");
        let err = load(&dir.path().join("missing.toml")).expect_err("missing file rejected");
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
