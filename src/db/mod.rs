pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// How long a connection waits for another writer before failing with `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Open (or create) the segmentator database at the given path with the schema
/// initialized.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let conn = connect(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    // WAL lets readers proceed while a writer holds the lock; the mode is
    // persistent, so later connections inherit it
    conn.pragma_update(None, "journal_mode", "WAL")?;

    schema::init_schema(&conn).context("failed to initialize schema")?;

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open one more connection to an already initialized database.
///
/// Only per-connection settings are applied; the schema is left alone.
pub fn connect(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

/// Open an in-memory database with the schema initialized.
pub fn open_memory_database() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    schema::init_schema(&conn).context("failed to initialize schema")?;
    Ok(conn)
}

/// Snapshot of database health, used by the `doctor` command.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub schema_version: u32,
    pub integrity_ok: bool,
    pub integrity_details: String,
    pub segment_count: u64,
    pub active_segment_count: u64,
    pub user_count: u64,
    pub relation_count: u64,
    pub active_relation_count: u64,
}

/// Run `PRAGMA integrity_check` and collect row counts.
pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let integrity_details: String =
        conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
    let count = |sql: &str| -> Result<u64> {
        let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(n as u64)
    };

    Ok(HealthReport {
        schema_version: schema::get_schema_version(conn)?,
        integrity_ok: integrity_details == "ok",
        integrity_details,
        segment_count: count("SELECT COUNT(*) FROM segments")?,
        active_segment_count: count("SELECT COUNT(*) FROM segments WHERE is_active = 1")?,
        user_count: count("SELECT COUNT(*) FROM users")?,
        relation_count: count("SELECT COUNT(*) FROM user_segment_relation")?,
        active_relation_count: count(
            "SELECT COUNT(*) FROM user_segment_relation WHERE is_active = 1",
        )?,
    })
}
