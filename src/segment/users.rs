//! Minimal user store living next to the relation log.
//!
//! Users are owned elsewhere; this table only mirrors their ids and active flag so
//! that sampling and foreign keys have something to point at.

use rusqlite::params;

use super::context::Context;
use super::store::SqliteStore;
use crate::error::Result;

impl SqliteStore {
    /// Insert a user or update its active flag.
    pub fn register_user(&mut self, ctx: &Context, user_id: i64, is_active: bool) -> Result<()> {
        self.write(ctx, |tx| {
            tx.execute(
                "INSERT INTO users (id, is_active) VALUES (?1, ?2) \
                 ON CONFLICT(id) DO UPDATE SET is_active = excluded.is_active",
                params![user_id, is_active],
            )?;
            Ok(())
        })?;
        tracing::debug!(user_id, is_active, "user registered");
        Ok(())
    }
}
