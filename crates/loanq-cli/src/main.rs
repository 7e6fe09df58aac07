// crates/loanq-cli/src/main.rs
// ============================================================================
// Module: LoanQ CLI Entry Point
// Description: Command dispatcher for serving the QuestionService and for
// offline criteria debugging.
// Purpose: Provide a `serve` subcommand that warms up and runs the pipeline
// behind `loanq-service`'s router, and an `explain` subcommand that compiles
// a criteria string and renders the resulting decision table without a
// running server.
// Dependencies: clap, loanq-service, loanq-rules, loanq-store, loanq-broker,
// loanq-core, serde_json, thiserror, tokio, toml.
// ============================================================================

//! ## Overview
//! `serve` reads a TOML config (§6 "Environment surface": port, config root,
//! cache TTL, per-call timeouts, evaluator budget), wires the reference
//! `loanq-store`/`loanq-broker` adapters, performs warmup, and blocks serving
//! the `loanq-service` router. `explain` is an offline debug command:
//! compiling a criteria string against §8 scenario 1-3 without a server.
//! Every line this binary writes goes through an explicit `Write`-taking
//! helper rather than `println!`, since the workspace lints deny
//! `clippy::print_stdout`/`clippy::print_stderr`.

#![deny(missing_docs)]

// ============================================================================
// SECTION: Modules
// ============================================================================

/// TOML-backed settings for the `serve` subcommand.
mod config;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use clap::Subcommand;
use loanq_broker::ChannelWriteBackQueue;
use loanq_broker::InMemoryRemoteCache;
use loanq_core::NoopTelemetry;
use loanq_core::SystemClock;
use loanq_rules::DecisionTable;
use loanq_service::ServiceConfig;
use loanq_service::WarmupState;
use loanq_store::SqliteStoreConfig;
use loanq_store::SqliteSystemOfRecord;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "loanq")]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Warm up the pipeline and serve the `QuestionService` router.
    Serve(ServeArgs),
    /// Compile a criteria string and print the resulting decision table.
    Explain(ExplainArgs),
}

/// Arguments for the `serve` command.
#[derive(clap::Args, Debug)]
struct ServeArgs {
    /// Path to the TOML configuration file.
    #[arg(long, value_name = "PATH")]
    config: PathBuf,
}

/// Arguments for the `explain` command.
#[derive(clap::Args, Debug)]
struct ExplainArgs {
    /// Criteria string to compile.
    criteria: String,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing error messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from `message`.
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    match Cli::parse().command {
        Commands::Serve(args) => command_serve(args).await,
        Commands::Explain(args) => command_explain(&args),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command: warm up the pipeline and block serving it.
async fn command_serve(args: ServeArgs) -> CliResult<ExitCode> {
    let settings = config::load(&args.config).map_err(|err| CliError::new(err.to_string()))?;

    let store = SqliteSystemOfRecord::open(SqliteStoreConfig::new(&settings.store_path))
        .map_err(|err| CliError::new(format!("system of record unavailable: {err}")))?;
    let remote = InMemoryRemoteCache::new();
    let (sender, mut receiver) = tokio::sync::mpsc::channel(settings.write_queue_capacity);
    let write_queue = ChannelWriteBackQueue::new(sender);
    let telemetry = Arc::new(NoopTelemetry);

    let drain_telemetry = Arc::clone(&telemetry);
    tokio::spawn(async move {
        while receiver.recv().await.is_some() {
            drain_telemetry.record_counter("write_back_delivered", 1);
        }
    });

    let warmup = WarmupState::new(
        ServiceConfig {
            config_root: settings.config_root.clone(),
            cache_ttl: settings.cache_ttl(),
            call_timeout: settings.call_timeout(),
            enqueue_timeout: settings.enqueue_timeout(),
            evaluate_budget: settings.evaluate_budget(),
        },
        Arc::new(store),
        Arc::new(remote),
        Arc::new(write_queue),
        Arc::new(SystemClock),
        telemetry,
    );
    let state = warmup.warmup().map_err(|err| CliError::new(format!("warmup failed: {err}")))?;
    let router = loanq_service::router(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", settings.port))
        .await
        .map_err(|err| CliError::new(format!("bind failed: {err}")))?;
    axum::serve(listener, router).await.map_err(|err| CliError::new(format!("serve failed: {err}")))?;

    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Explain Command
// ============================================================================

/// Executes the `explain` command: compile and render a criteria string.
fn command_explain(args: &ExplainArgs) -> CliResult<ExitCode> {
    let table = loanq_rules::compile(&args.criteria).map_err(|err| CliError::new(format!("compile failed: {err}")))?;
    let mut stdout = std::io::stdout();
    render_decision_table(&table, &mut stdout)?;
    Ok(ExitCode::SUCCESS)
}

/// Renders `table` as pretty JSON to `writer`.
fn render_decision_table<W: Write>(table: &DecisionTable, writer: &mut W) -> CliResult<()> {
    let json = serde_json::to_string_pretty(table).map_err(|err| CliError::new(format!("serialize failed: {err}")))?;
    writeln!(writer, "{json}").map_err(|err| CliError::new(format!("write failed: {err}")))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let mut stderr = std::io::stderr();
    let _ = writeln!(&mut stderr, "{message}");
    ExitCode::FAILURE
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only panic-based assertions are permitted.")]
mod tests {
    use super::*;

    #[test]
    fn render_decision_table_writes_pretty_json() {
        let table = loanq_rules::compile("Credit Score >= 620").expect("criteria compiles");
        let mut buffer = Vec::new();
        render_decision_table(&table, &mut buffer).expect("renders");
        let rendered = String::from_utf8(buffer).expect("utf8 output");
        let parsed: serde_json::Value = serde_json::from_str(&rendered).expect("valid json");
        assert!(parsed.is_object());
    }

    #[test]
    fn command_explain_rejects_an_uncompilable_criteria_string() {
        let args = ExplainArgs { criteria: "Loan Purpose sort of matches Purchase".to_string() };
        let err = command_explain(&args).expect_err("uncompilable criteria rejected");
        assert!(err.message.contains("compile failed"));
    }

    #[test]
    fn command_explain_accepts_a_trivial_criteria_string() {
        let args = ExplainArgs { criteria: "Credit Score >= 620".to_string() };
        assert!(command_explain(&args).is_ok());
    }
}
