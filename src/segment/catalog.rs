//! Segment catalog: upsert, soft delete with cascade, lookup.
//!
//! Segments are never physically removed. Deleting one flips `is_active` and
//! closes every relation row that references it in the same transaction, so a
//! later insert of the same slug reactivates the original row with its history.

use rusqlite::{params, Connection, OptionalExtension};

use super::context::Context;
use super::store::{to_sql_time, validate_slug, SqliteStore};
use super::types::Segment;
use crate::error::{Result, SegmentError};

pub trait Catalog {
    /// Create `slug`, or reactivate it if it was soft-deleted. No-op when already active.
    fn insert_segment(&mut self, ctx: &Context, slug: &str) -> Result<()>;

    /// Soft-delete `slug` and close all of its relation rows atomically.
    fn delete_segment(&mut self, ctx: &Context, slug: &str) -> Result<()>;

    /// Look up a segment by slug, active or not.
    fn get_segment(&self, ctx: &Context, slug: &str) -> Result<Option<Segment>>;

    fn list_segments(&self, ctx: &Context, include_inactive: bool) -> Result<Vec<Segment>>;
}

impl Catalog for SqliteStore {
    fn insert_segment(&mut self, ctx: &Context, slug: &str) -> Result<()> {
        validate_slug(slug)?;

        let changed = self.write(ctx, |tx| {
            let changed = tx.execute(
                "INSERT INTO segments (slug, is_active) VALUES (?1, 1) \
                 ON CONFLICT(slug) DO UPDATE SET is_active = 1 WHERE is_active = 0",
                params![slug],
            )?;
            Ok(changed)
        })?;

        if changed == 0 {
            tracing::debug!(slug, "segment already active");
        } else {
            tracing::info!(slug, "segment inserted");
        }
        Ok(())
    }

    fn delete_segment(&mut self, ctx: &Context, slug: &str) -> Result<()> {
        validate_slug(slug)?;
        let now = to_sql_time(self.now());

        let closed = self.write(ctx, |tx| {
            let segment = find_segment(tx, slug)?
                .ok_or_else(|| SegmentError::not_found(format!("segment: {slug}")))?;

            tx.execute(
                "UPDATE segments SET is_active = 0 WHERE id = ?1",
                params![segment.id],
            )?;

            let closed = tx.execute(
                "UPDATE user_segment_relation \
                 SET is_active = 0, date_unassigned = max(date_assigned, ?1) \
                 WHERE segment_id = ?2 AND is_active = 1",
                params![now, segment.id],
            )?;
            Ok(closed)
        })?;

        if closed == 0 {
            tracing::warn!(slug, "deleted segment had no active relations");
        }
        tracing::info!(slug, closed, "segment deleted");
        Ok(())
    }

    fn get_segment(&self, ctx: &Context, slug: &str) -> Result<Option<Segment>> {
        self.read(ctx, |conn| find_segment(conn, slug))
    }

    fn list_segments(&self, ctx: &Context, include_inactive: bool) -> Result<Vec<Segment>> {
        self.read(ctx, |conn| {
            let sql = if include_inactive {
                "SELECT id, slug, is_active FROM segments ORDER BY slug"
            } else {
                "SELECT id, slug, is_active FROM segments WHERE is_active = 1 ORDER BY slug"
            };
            let mut stmt = conn.prepare(sql)?;
            let segments = stmt
                .query_map([], segment_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(segments)
        })
    }
}

fn find_segment(conn: &Connection, slug: &str) -> Result<Option<Segment>> {
    let segment = conn
        .query_row(
            "SELECT id, slug, is_active FROM segments WHERE slug = ?1",
            params![slug],
            segment_from_row,
        )
        .optional()?;
    Ok(segment)
}

fn segment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Segment> {
    Ok(Segment {
        id: row.get(0)?,
        slug: row.get(1)?,
        is_active: row.get(2)?,
    })
}
