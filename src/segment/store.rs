//! SQLite-backed implementation of the segment capability traits.
//!
//! [`SqliteStore`] owns the connection and the clock. Every mutating call goes
//! through [`SqliteStore::write`], which opens an immediate transaction, commits
//! on success and rolls back on any failure, including caller cancellation.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::sync::Arc;

use super::clock::{Clock, SystemClock};
use super::context::Context;
use super::types::{format_timestamp, parse_timestamp};
use crate::error::{Result, SegmentError};

pub struct SqliteStore {
    conn: Connection,
    clock: Arc<dyn Clock>,
}

impl SqliteStore {
    /// Wrap an already initialized connection (see [`crate::db::open_database`]).
    pub fn new(conn: Connection) -> Self {
        Self::with_clock(conn, Arc::new(SystemClock))
    }

    pub fn with_clock(conn: Connection, clock: Arc<dyn Clock>) -> Self {
        Self { conn, clock }
    }

    /// Read access to the underlying connection, for diagnostics and tests.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Run `f` inside one immediate transaction.
    ///
    /// The context is checked before the transaction opens and again before commit.
    /// On error the transaction is rolled back explicitly; if that fails too, the
    /// returned error carries both causes.
    pub(crate) fn write<T>(
        &mut self,
        ctx: &Context,
        f: impl FnOnce(&Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        ctx.check()?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        match f(&tx).and_then(|value| ctx.check().map(|()| value)) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => match tx.rollback() {
                Ok(()) => Err(err),
                Err(rollback) => {
                    tracing::error!(error = %err, rollback = %rollback, "transaction rollback failed");
                    Err(SegmentError::Rollback {
                        source: Box::new(err),
                        rollback,
                    })
                }
            },
        }
    }

    /// Run read-only queries against the connection after a context check.
    pub(crate) fn read<T>(
        &self,
        ctx: &Context,
        f: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        ctx.check()?;
        f(&self.conn)
    }
}

/// Reject slugs that are empty or would corrupt a `;`-delimited report line.
pub fn validate_slug(slug: &str) -> Result<()> {
    if slug.trim().is_empty() {
        return Err(SegmentError::invalid("empty segment slug"));
    }
    if slug.contains(';') || slug.chars().any(char::is_control) {
        return Err(SegmentError::invalid(format!(
            "segment slug must not contain ';' or control characters: {slug:?}"
        )));
    }
    Ok(())
}

/// Resolve slugs of **active** segments to their ids, in input order.
///
/// Fails with `NotFound` on the first unknown or soft-deleted slug.
pub(crate) fn resolve_active_ids(conn: &Connection, slugs: &[String]) -> Result<Vec<i64>> {
    let mut stmt =
        conn.prepare_cached("SELECT id FROM segments WHERE slug = ?1 AND is_active = 1")?;
    let mut ids = Vec::with_capacity(slugs.len());
    for slug in slugs {
        validate_slug(slug)?;
        let id: Option<i64> = stmt.query_row(params![slug], |row| row.get(0)).optional()?;
        match id {
            Some(id) => ids.push(id),
            None => return Err(SegmentError::not_found(format!("segment: {slug}"))),
        }
    }
    Ok(ids)
}

pub(crate) fn to_sql_time(at: DateTime<Utc>) -> String {
    format_timestamp(at)
}

/// Read a stored timestamp column, surfacing bad text as a conversion error.
pub(crate) fn time_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    parse_timestamp(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn optional_time_column(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        parse_timestamp(&t).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> SqliteStore {
        SqliteStore::new(crate::db::open_memory_database().unwrap())
    }

    #[test]
    fn validate_slug_rules() {
        assert!(validate_slug("beta").is_ok());
        assert!(validate_slug("new-checkout_v2").is_ok());
        assert!(validate_slug("").unwrap_err().is_invalid_argument());
        assert!(validate_slug("   ").unwrap_err().is_invalid_argument());
        assert!(validate_slug("a;b").unwrap_err().is_invalid_argument());
        assert!(validate_slug("a\nb").unwrap_err().is_invalid_argument());
    }

    #[test]
    fn write_commits_on_success() {
        let mut store = test_store();
        store
            .write(&Context::background(), |tx| {
                tx.execute("INSERT INTO users (id) VALUES (1)", [])?;
                Ok(())
            })
            .unwrap();

        let count: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn write_rolls_back_on_error() {
        let mut store = test_store();
        let result: Result<()> = store.write(&Context::background(), |tx| {
            tx.execute("INSERT INTO users (id) VALUES (1)", [])?;
            Err(SegmentError::invalid("boom"))
        });
        assert!(result.unwrap_err().is_invalid_argument());

        let count: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn write_rolls_back_when_cancelled_mid_call() {
        let mut store = test_store();
        let ctx = Context::background();
        let result = store.write(&ctx, |tx| {
            tx.execute("INSERT INTO users (id) VALUES (1)", [])?;
            ctx.cancel();
            Ok(())
        });
        assert!(matches!(result, Err(SegmentError::Cancelled)));

        let count: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn failed_rollback_reports_both_errors() {
        let mut store = test_store();
        // ending the transaction early makes the explicit rollback fail
        let result: Result<()> = store.write(&Context::background(), |tx| {
            tx.execute("INSERT INTO users (id) VALUES (1)", [])?;
            tx.execute_batch("ROLLBACK")?;
            Err(SegmentError::invalid("boom"))
        });

        match result {
            Err(SegmentError::Rollback { source, rollback }) => {
                assert!(source.is_invalid_argument());
                assert!(rollback.to_string().contains("no transaction is active"));
            }
            other => panic!("expected rollback error, got {other:?}"),
        }

        let count: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
        assert!(store.connection().is_autocommit());
    }

    #[test]
    fn resolve_skips_inactive_segments() {
        let store = test_store();
        store
            .connection()
            .execute_batch(
                "INSERT INTO segments (slug, is_active) VALUES ('live', 1);
                 INSERT INTO segments (slug, is_active) VALUES ('gone', 0);",
            )
            .unwrap();

        let ids = resolve_active_ids(store.connection(), &["live".to_string()]).unwrap();
        assert_eq!(ids.len(), 1);

        let err = resolve_active_ids(store.connection(), &["gone".to_string()]).unwrap_err();
        assert!(err.is_not_found());
    }
}
