//! SQL DDL for all segmentator tables.
//!
//! Defines `segments`, `users`, `user_segment_relation` (the permanent membership
//! log) and `schema_meta`. All DDL uses `IF NOT EXISTS` for idempotent
//! initialization. The version row in `schema_meta` is informational; it is
//! reported by `doctor`.

use rusqlite::Connection;

/// Version written to `schema_meta` by [`init_schema`].
pub const SCHEMA_VERSION: u32 = 1;

/// All schema DDL statements for the core tables.
const SCHEMA_SQL: &str = r#"
-- Segment catalog. Rows are soft-deleted via is_active, never removed.
CREATE TABLE IF NOT EXISTS segments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    slug TEXT NOT NULL UNIQUE CHECK(length(slug) > 0),
    is_active INTEGER NOT NULL DEFAULT 1 CHECK(is_active IN (0, 1))
);

CREATE INDEX IF NOT EXISTS idx_segments_active ON segments(is_active);

-- Collaborating user store
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    is_active INTEGER NOT NULL DEFAULT 1 CHECK(is_active IN (0, 1))
);

CREATE INDEX IF NOT EXISTS idx_users_active ON users(is_active);

-- Membership log: one row per membership interval
CREATE TABLE IF NOT EXISTS user_segment_relation (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    segment_id INTEGER NOT NULL REFERENCES segments(id),
    is_active INTEGER NOT NULL DEFAULT 1 CHECK(is_active IN (0, 1)),
    date_assigned TEXT NOT NULL,
    date_unassigned TEXT,
    CHECK(date_unassigned IS NULL OR date_unassigned >= date_assigned)
);

CREATE INDEX IF NOT EXISTS idx_relation_user ON user_segment_relation(user_id);
CREATE INDEX IF NOT EXISTS idx_relation_segment ON user_segment_relation(segment_id);
CREATE INDEX IF NOT EXISTS idx_relation_pair_active ON user_segment_relation(user_id, segment_id, is_active);

-- At most one open membership interval per pair
CREATE UNIQUE INDEX IF NOT EXISTS idx_relation_one_active
    ON user_segment_relation(user_id, segment_id) WHERE is_active = 1;

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Read the schema version recorded in `schema_meta`.
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().unwrap_or(0))
        },
    )
}
