// crates/loanq-store/src/store.rs
// ============================================================================
// Module: SQLite System of Record
// Description: Reference `SystemOfRecord` backed by SQLite WAL, read through
// a small pool of short-lived reader connections.
// Purpose: Stand in for the out-of-scope relational driver.
// Dependencies: loanq-core, rusqlite, serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! Every [`loanq_core::SystemOfRecord`] method here is a read. The engine
//! never writes to the system of record directly — answers flow through the
//! write-back queue instead (see `loanq-broker`) — so this adapter carries
//! no writer thread, unlike a durable run-state store that must serialize
//! concurrent saves. What *is* reused from that shape is WAL mode, a fixed
//! busy-timeout pragma, and short-lived reader connections rather than one
//! shared handle: reads are issued on a blocking thread via
//! [`tokio::task::spawn_blocking`] against a freshly opened connection, and
//! the per-call timeout wraps that blocking call with
//! [`tokio::time::timeout`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use loanq_core::EntityPid;
use loanq_core::EntityRef;
use loanq_core::FieldValue;
use loanq_core::ProposalRecord;
use loanq_core::QuestionId;
use loanq_core::StoreError;
use loanq_core::SystemOfRecord;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use rusqlite::params_from_iter;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Default busy timeout applied to every connection.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// `SQLite` synchronous-pragma setting.
///
/// # Invariants
/// - Values map 1:1 to `SQLite`'s `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest, default for a reference adapter).
    #[default]
    Full,
    /// Normal synchronous mode (faster, acceptable for local/dev use).
    Normal,
}

impl SqliteSyncMode {
    const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for [`SqliteSystemOfRecord`].
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy-timeout pragma, in milliseconds.
    pub busy_timeout_ms: u64,
    /// Synchronous pragma.
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Builds a config for `path` with WAL-appropriate defaults.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS, sync_mode: SqliteSyncMode::Full }
    }
}

// ============================================================================
// SECTION: System of Record
// ============================================================================

/// Reference [`SystemOfRecord`] backed by a `SQLite` database in WAL mode.
///
/// # Invariants
/// - Holds no persistent connection; every call opens a short-lived reader
///   connection configured with the same pragmas, so the struct itself is
///   cheaply `Clone`-free shared state (just a config).
pub struct SqliteSystemOfRecord {
    config: SqliteStoreConfig,
}

impl SqliteSystemOfRecord {
    /// Opens (creating if absent) the database at `config.path`, applies the
    /// schema, and returns a ready adapter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the database cannot be opened
    /// or the schema cannot be created.
    pub fn open(config: SqliteStoreConfig) -> Result<Self, StoreError> {
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self { config })
    }

    fn connection(&self) -> Result<Connection, StoreError> {
        open_connection(&self.config)
    }
}

/// Runs `work` (which opens its own short-lived connection from `config`) on
/// a blocking thread, racing it against `timeout`.
async fn with_timeout<T, F>(config: SqliteStoreConfig, timeout: Duration, work: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
{
    let run = move || {
        let connection = open_connection(&config)?;
        work(&connection)
    };
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(run)).await {
        Ok(Ok(result)) => result,
        Ok(Err(_join_error)) => Err(StoreError::Unavailable("reader task panicked".to_string())),
        Err(_elapsed) => Err(StoreError::Timeout),
    }
}

#[async_trait]
impl SystemOfRecord for SqliteSystemOfRecord {
    async fn fetch_proposal(&self, pid: &loanq_core::ProposalPid, timeout: Duration) -> Result<ProposalRecord, StoreError> {
        let pid = pid.clone();
        with_timeout(self.config.clone(), timeout, move |connection| load_proposal(connection, &pid)).await
    }

    async fn fetch_borrowers(&self, deal_pid: &str, timeout: Duration) -> Result<Vec<EntityRef>, StoreError> {
        let deal_pid = deal_pid.to_string();
        with_timeout(self.config.clone(), timeout, move |connection| {
            load_entities_for_deal(connection, "borrower", &deal_pid)
        })
        .await
    }

    async fn fetch_jobs(&self, borrower_pids: &[EntityPid], timeout: Duration) -> Result<Vec<EntityRef>, StoreError> {
        let owners = owner_strings(borrower_pids);
        with_timeout(self.config.clone(), timeout, move |connection| {
            load_entities_for_owners(connection, "job", &owners)
        })
        .await
    }

    async fn fetch_assets(&self, borrower_pids: &[EntityPid], timeout: Duration) -> Result<Vec<EntityRef>, StoreError> {
        let owners = owner_strings(borrower_pids);
        with_timeout(self.config.clone(), timeout, move |connection| {
            load_entities_for_owners(connection, "asset", &owners)
        })
        .await
    }

    async fn fetch_liabilities(
        &self,
        borrower_pids: &[EntityPid],
        timeout: Duration,
    ) -> Result<Vec<EntityRef>, StoreError> {
        let owners = owner_strings(borrower_pids);
        with_timeout(self.config.clone(), timeout, move |connection| {
            load_entities_for_owners(connection, "liability", &owners)
        })
        .await
    }

    async fn fetch_real_estate_owned(
        &self,
        borrower_pids: &[EntityPid],
        timeout: Duration,
    ) -> Result<Vec<EntityRef>, StoreError> {
        let owners = owner_strings(borrower_pids);
        with_timeout(self.config.clone(), timeout, move |connection| {
            load_entities_for_owners(connection, "real_estate_owned", &owners)
        })
        .await
    }

    async fn fetch_property(&self, deal_pid: &str, timeout: Duration) -> Result<BTreeMap<String, FieldValue>, StoreError> {
        let deal_pid = deal_pid.to_string();
        with_timeout(self.config.clone(), timeout, move |connection| load_property(connection, &deal_pid)).await
    }

    async fn fetch_answered_question_ids(
        &self,
        deal_pid: &str,
        timeout: Duration,
    ) -> Result<BTreeSet<QuestionId>, StoreError> {
        let deal_pid = deal_pid.to_string();
        with_timeout(self.config.clone(), timeout, move |connection| load_answered(connection, &deal_pid)).await
    }
}

fn owner_strings(borrower_pids: &[EntityPid]) -> Vec<String> {
    borrower_pids.iter().map(|pid| pid.as_str().to_string()).collect()
}

// ============================================================================
// SECTION: Blocking Query Bodies
// ============================================================================

fn load_proposal(connection: &Connection, pid: &loanq_core::ProposalPid) -> Result<ProposalRecord, StoreError> {
    connection
        .query_row(
            "SELECT deal_pid, fields_json FROM proposals WHERE pid = ?1",
            params![pid.as_str()],
            |row| {
                let deal_pid: String = row.get(0)?;
                let fields_json: String = row.get(1)?;
                Ok((deal_pid, fields_json))
            },
        )
        .optional()
        .map_err(db_err)?
        .map(|(deal_pid, fields_json)| {
            Ok(ProposalRecord { pid: pid.clone(), deal_pid, fields: decode_fields(&fields_json)? })
        })
        .unwrap_or_else(|| Err(StoreError::NotFound(format!("proposal {pid} not found"))))
}

fn load_property(connection: &Connection, deal_pid: &str) -> Result<BTreeMap<String, FieldValue>, StoreError> {
    let fields_json: Option<String> = connection
        .query_row("SELECT fields_json FROM properties WHERE deal_pid = ?1", params![deal_pid], |row| row.get(0))
        .optional()
        .map_err(db_err)?;
    match fields_json {
        Some(json) => decode_fields(&json),
        None => Ok(BTreeMap::new()),
    }
}

fn load_answered(connection: &Connection, deal_pid: &str) -> Result<BTreeSet<QuestionId>, StoreError> {
    let mut statement = connection
        .prepare("SELECT question_id FROM answered_questions WHERE deal_pid = ?1")
        .map_err(db_err)?;
    let rows = statement
        .query_map(params![deal_pid], |row| row.get::<_, String>(0))
        .map_err(db_err)?;
    let mut answered = BTreeSet::new();
    for row in rows {
        answered.insert(QuestionId::from(row.map_err(db_err)?));
    }
    Ok(answered)
}

fn load_entities_for_deal(connection: &Connection, kind: &str, deal_pid: &str) -> Result<Vec<EntityRef>, StoreError> {
    let mut statement = connection
        .prepare("SELECT pid, display_name, fields_json FROM entities WHERE kind = ?1 AND deal_pid = ?2")
        .map_err(db_err)?;
    let rows = statement
        .query_map(params![kind, deal_pid], entity_row)
        .map_err(db_err)?;
    collect_entities(rows)
}

fn load_entities_for_owners(connection: &Connection, kind: &str, owner_pids: &[String]) -> Result<Vec<EntityRef>, StoreError> {
    if owner_pids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = std::iter::repeat_n("?", owner_pids.len()).collect::<Vec<_>>().join(", ");
    let sql = format!(
        "SELECT pid, display_name, fields_json FROM entities WHERE kind = ? AND owner_pid IN ({placeholders})"
    );
    let mut statement = connection.prepare(&sql).map_err(db_err)?;
    let mut bound: Vec<String> = Vec::with_capacity(owner_pids.len() + 1);
    bound.push(kind.to_string());
    bound.extend(owner_pids.iter().cloned());
    let rows = statement
        .query_map(params_from_iter(bound.iter()), entity_row)
        .map_err(db_err)?;
    collect_entities(rows)
}

type EntityRow = (String, String, String);

fn entity_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntityRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn collect_entities(rows: impl Iterator<Item = rusqlite::Result<EntityRow>>) -> Result<Vec<EntityRef>, StoreError> {
    let mut entities = Vec::new();
    for row in rows {
        let (pid, display_name, fields_json) = row.map_err(db_err)?;
        entities.push(EntityRef { pid: EntityPid::from(pid), display_name, fields: decode_fields(&fields_json)? });
    }
    Ok(entities)
}

fn decode_fields(json: &str) -> Result<BTreeMap<String, FieldValue>, StoreError> {
    serde_json::from_str(json).map_err(|err| StoreError::Unavailable(format!("corrupt fields payload: {err}")))
}

fn db_err(err: rusqlite::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

// ============================================================================
// SECTION: Connection Setup
// ============================================================================

fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, StoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db_err)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

fn apply_pragmas(connection: &Connection, config: &SqliteStoreConfig) -> Result<(), StoreError> {
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_err)?;
    connection.execute_batch("PRAGMA journal_mode = wal;").map_err(db_err)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(db_err)?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(db_err)?;
    Ok(())
}

fn initialize_schema(connection: &mut Connection) -> Result<(), StoreError> {
    let tx = connection.transaction().map_err(db_err)?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS proposals (
             pid TEXT PRIMARY KEY,
             deal_pid TEXT NOT NULL,
             fields_json TEXT NOT NULL
         );
         CREATE TABLE IF NOT EXISTS properties (
             deal_pid TEXT PRIMARY KEY,
             fields_json TEXT NOT NULL
         );
         CREATE TABLE IF NOT EXISTS entities (
             pid TEXT PRIMARY KEY,
             kind TEXT NOT NULL,
             deal_pid TEXT,
             owner_pid TEXT,
             display_name TEXT NOT NULL,
             fields_json TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS entities_by_deal ON entities (kind, deal_pid);
         CREATE INDEX IF NOT EXISTS entities_by_owner ON entities (kind, owner_pid);
         CREATE TABLE IF NOT EXISTS answered_questions (
             deal_pid TEXT NOT NULL,
             question_id TEXT NOT NULL,
             PRIMARY KEY (deal_pid, question_id)
         );",
    )
    .map_err(db_err)?;
    tx.commit().map_err(db_err)
}

/// Inserts rows directly, bypassing the [`SystemOfRecord`] read surface.
///
/// Exists for tests and local fixture loading, since production population
/// of the system of record happens outside this engine entirely.
pub mod fixtures {
    use loanq_core::EntityLevel;

    use super::*;

    /// A single entity row to seed, matching the `entities` table shape.
    pub struct SeedEntity {
        /// Row identifier.
        pub pid: String,
        /// Entity level, used to derive the stored `kind`.
        pub level: EntityLevel,
        /// Deal pid, set for borrower rows.
        pub deal_pid: Option<String>,
        /// Owning borrower pid, set for job/asset/liability/REO rows.
        pub owner_pid: Option<String>,
        /// Display name.
        pub display_name: String,
        /// Field map, JSON-encoded at insert time.
        pub fields: BTreeMap<String, FieldValue>,
    }

    /// Seeds a proposal row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any underlying `SQLite` failure.
    pub fn seed_proposal(
        store: &SqliteSystemOfRecord,
        pid: &str,
        deal_pid: &str,
        fields: &BTreeMap<String, FieldValue>,
    ) -> Result<(), StoreError> {
        let connection = store.connection()?;
        connection
            .execute(
                "INSERT INTO proposals (pid, deal_pid, fields_json) VALUES (?1, ?2, ?3)",
                params![pid, deal_pid, serde_json::to_string(fields).unwrap_or_default()],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Seeds a property row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any underlying `SQLite` failure.
    pub fn seed_property(
        store: &SqliteSystemOfRecord,
        deal_pid: &str,
        fields: &BTreeMap<String, FieldValue>,
    ) -> Result<(), StoreError> {
        let connection = store.connection()?;
        connection
            .execute(
                "INSERT INTO properties (deal_pid, fields_json) VALUES (?1, ?2)",
                params![deal_pid, serde_json::to_string(fields).unwrap_or_default()],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Seeds an entity row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any underlying `SQLite` failure.
    pub fn seed_entity(store: &SqliteSystemOfRecord, entity: &SeedEntity) -> Result<(), StoreError> {
        let connection = store.connection()?;
        let kind = match entity.level {
            EntityLevel::Borrower => "borrower",
            EntityLevel::Job => "job",
            EntityLevel::Asset => "asset",
            EntityLevel::Liability => "liability",
            EntityLevel::RealEstateOwned => "real_estate_owned",
            EntityLevel::Proposal | EntityLevel::Property => {
                return Err(StoreError::Unavailable("entities table holds no singleton-level rows".to_string()));
            }
        };
        connection
            .execute(
                "INSERT INTO entities (pid, kind, deal_pid, owner_pid, display_name, fields_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entity.pid,
                    kind,
                    entity.deal_pid,
                    entity.owner_pid,
                    entity.display_name,
                    serde_json::to_string(&entity.fields).unwrap_or_default()
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Seeds an answered-question row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any underlying `SQLite` failure.
    pub fn seed_answered(store: &SqliteSystemOfRecord, deal_pid: &str, question_id: &str) -> Result<(), StoreError> {
        let connection = store.connection()?;
        connection
            .execute(
                "INSERT INTO answered_questions (deal_pid, question_id) VALUES (?1, ?2)",
                params![deal_pid, question_id],
            )
            .map_err(db_err)?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
