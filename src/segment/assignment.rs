//! User ↔ segment membership: assign, unassign, and membership queries.
//!
//! Every assignment appends a fresh row to `user_segment_relation`; unassigning
//! closes the single active row of a pair. Both run as one transaction per call
//! covering every `(user, segment)` pair, and pairs that are already in the
//! requested state are skipped rather than aborting the batch.

use rusqlite::{params, Connection, Transaction};

use super::context::Context;
use super::store::{resolve_active_ids, to_sql_time, validate_slug, SqliteStore};
use super::types::{AssignOutcome, UnassignOutcome, UpdateOutcome, UserSegments};
use crate::error::{Result, SegmentError};

pub trait AssignmentStore {
    /// Give every user in `user_ids` every segment in `slugs`.
    fn assign_segments(
        &mut self,
        ctx: &Context,
        user_ids: &[i64],
        slugs: &[String],
    ) -> Result<AssignOutcome>;

    /// Close the active relation of every `(user, segment)` pair that has one.
    fn unassign_segments(
        &mut self,
        ctx: &Context,
        user_ids: &[i64],
        slugs: &[String],
    ) -> Result<UnassignOutcome>;

    /// Assign `assign` and unassign `unassign` for one user in a single transaction.
    ///
    /// Assignments are applied first, so a slug named in both lists ends up closed.
    fn update_user_segments(
        &mut self,
        ctx: &Context,
        user_id: i64,
        assign: &[String],
        unassign: &[String],
    ) -> Result<UpdateOutcome>;

    /// Active segments of `user_id`, reading through the active segment set.
    fn get_user_segments(&self, ctx: &Context, user_id: i64) -> Result<UserSegments>;

    /// Number of users the user store marks active.
    fn active_users_amount(&self, ctx: &Context) -> Result<u64>;
}

impl AssignmentStore for SqliteStore {
    fn assign_segments(
        &mut self,
        ctx: &Context,
        user_ids: &[i64],
        slugs: &[String],
    ) -> Result<AssignOutcome> {
        for slug in slugs {
            validate_slug(slug)?;
        }
        if slugs.is_empty() || user_ids.is_empty() {
            return Ok(AssignOutcome::default());
        }
        let now = to_sql_time(self.now());

        let outcome = self.write(ctx, |tx| {
            let segment_ids = resolve_active_ids(tx, slugs)?;
            ensure_users_exist(tx, user_ids)?;
            assign_pairs(tx, ctx, user_ids, &segment_ids, &now)
        })?;

        tracing::info!(
            users = user_ids.len(),
            segments = slugs.len(),
            assigned = outcome.assigned,
            skipped = outcome.skipped,
            "segments assigned"
        );
        Ok(outcome)
    }

    fn unassign_segments(
        &mut self,
        ctx: &Context,
        user_ids: &[i64],
        slugs: &[String],
    ) -> Result<UnassignOutcome> {
        for slug in slugs {
            validate_slug(slug)?;
        }
        if slugs.is_empty() || user_ids.is_empty() {
            return Ok(UnassignOutcome::default());
        }
        let now = to_sql_time(self.now());

        let outcome = self.write(ctx, |tx| {
            let segment_ids = resolve_active_ids(tx, slugs)?;
            close_pairs(tx, ctx, user_ids, &segment_ids, &now)
        })?;

        tracing::info!(
            users = user_ids.len(),
            segments = slugs.len(),
            unassigned = outcome.unassigned,
            "segments unassigned"
        );
        Ok(outcome)
    }

    fn update_user_segments(
        &mut self,
        ctx: &Context,
        user_id: i64,
        assign: &[String],
        unassign: &[String],
    ) -> Result<UpdateOutcome> {
        for slug in assign.iter().chain(unassign) {
            validate_slug(slug)?;
        }
        let now = to_sql_time(self.now());
        let users = [user_id];

        let outcome = self.write(ctx, |tx| {
            let assign_ids = resolve_active_ids(tx, assign)?;
            let unassign_ids = resolve_active_ids(tx, unassign)?;
            if !assign_ids.is_empty() {
                ensure_users_exist(tx, &users)?;
            }
            Ok(UpdateOutcome {
                assigned: assign_pairs(tx, ctx, &users, &assign_ids, &now)?,
                unassigned: close_pairs(tx, ctx, &users, &unassign_ids, &now)?,
            })
        })?;

        tracing::info!(
            user_id,
            assigned = outcome.assigned.assigned,
            skipped = outcome.assigned.skipped,
            unassigned = outcome.unassigned.unassigned,
            "user segments updated"
        );
        Ok(outcome)
    }

    fn get_user_segments(&self, ctx: &Context, user_id: i64) -> Result<UserSegments> {
        self.read(ctx, |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT s.slug FROM segments s \
                 JOIN user_segment_relation r ON r.segment_id = s.id \
                 WHERE r.user_id = ?1 AND r.is_active = 1 AND s.is_active = 1 \
                 ORDER BY s.slug",
            )?;
            let segments = stmt
                .query_map(params![user_id], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(UserSegments { user_id, segments })
        })
    }

    fn active_users_amount(&self, ctx: &Context) -> Result<u64> {
        self.read(ctx, |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE is_active = 1",
                [],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }
}

/// Open a relation for every pair without an active one.
fn assign_pairs(
    tx: &Transaction<'_>,
    ctx: &Context,
    user_ids: &[i64],
    segment_ids: &[i64],
    now: &str,
) -> Result<AssignOutcome> {
    let mut has_active = tx.prepare_cached(
        "SELECT 1 FROM user_segment_relation \
         WHERE user_id = ?1 AND segment_id = ?2 AND is_active = 1",
    )?;
    let mut insert = tx.prepare_cached(
        "INSERT INTO user_segment_relation (user_id, segment_id, is_active, date_assigned) \
         VALUES (?1, ?2, 1, ?3)",
    )?;

    let mut outcome = AssignOutcome::default();
    for &user_id in user_ids {
        for &segment_id in segment_ids {
            ctx.check()?;
            if has_active.exists(params![user_id, segment_id])? {
                tracing::debug!(user_id, segment_id, "pair already assigned, skipping");
                outcome.skipped += 1;
                continue;
            }
            insert.execute(params![user_id, segment_id, now])?;
            outcome.assigned += 1;
        }
    }
    Ok(outcome)
}

/// Close the active relation of every pair that has one.
fn close_pairs(
    tx: &Transaction<'_>,
    ctx: &Context,
    user_ids: &[i64],
    segment_ids: &[i64],
    now: &str,
) -> Result<UnassignOutcome> {
    // max() keeps date_unassigned >= date_assigned if the clock stepped back
    let mut close = tx.prepare_cached(
        "UPDATE user_segment_relation \
         SET is_active = 0, date_unassigned = max(date_assigned, ?3) \
         WHERE user_id = ?1 AND segment_id = ?2 AND is_active = 1",
    )?;

    let mut outcome = UnassignOutcome::default();
    for &user_id in user_ids {
        for &segment_id in segment_ids {
            ctx.check()?;
            outcome.unassigned += close.execute(params![user_id, segment_id, now])?;
        }
    }
    Ok(outcome)
}

fn ensure_users_exist(conn: &Connection, user_ids: &[i64]) -> Result<()> {
    let mut stmt = conn.prepare_cached("SELECT 1 FROM users WHERE id = ?1")?;
    for &user_id in user_ids {
        if !stmt.exists(params![user_id])? {
            return Err(SegmentError::not_found(format!("user: {user_id}")));
        }
    }
    Ok(())
}
