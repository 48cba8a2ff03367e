//! Uniform random selection of users that lack a segment.
//!
//! The eligible id set is fetched in one query and sampled in-process with a
//! partial Fisher–Yates shuffle, so no storage-specific random ordering is needed.

use rand::seq::SliceRandom;
use rand::Rng;
use rusqlite::params;

use super::context::Context;
use super::store::{resolve_active_ids, validate_slug, SqliteStore};
use crate::error::Result;

pub trait Sampler {
    /// Up to `n` active users with no active relation to `slug`, chosen uniformly
    /// without replacement. Returns fewer when the eligible set is smaller.
    fn random_users_without_segment(&self, ctx: &Context, n: usize, slug: &str)
        -> Result<Vec<i64>>;
}

impl Sampler for SqliteStore {
    fn random_users_without_segment(
        &self,
        ctx: &Context,
        n: usize,
        slug: &str,
    ) -> Result<Vec<i64>> {
        validate_slug(slug)?;

        let candidates = self.read(ctx, |conn| {
            let segment_id = resolve_active_ids(conn, &[slug.to_string()])?[0];
            let mut stmt = conn.prepare_cached(
                "SELECT u.id FROM users u \
                 WHERE u.is_active = 1 AND NOT EXISTS ( \
                     SELECT 1 FROM user_segment_relation r \
                     WHERE r.user_id = u.id AND r.segment_id = ?1 AND r.is_active = 1 \
                 ) \
                 ORDER BY u.id",
            )?;
            let ids = stmt
                .query_map(params![segment_id], |row| row.get(0))?
                .collect::<Result<Vec<i64>, _>>()?;
            Ok(ids)
        })?;

        let eligible = candidates.len();
        let sample = sample_without_replacement(candidates, n, &mut rand::thread_rng());
        tracing::debug!(slug, eligible, requested = n, sampled = sample.len(), "sampled users");
        Ok(sample)
    }
}

/// Pick `n` distinct elements of `candidates` uniformly at random.
pub fn sample_without_replacement<R: Rng + ?Sized>(
    mut candidates: Vec<i64>,
    n: usize,
    rng: &mut R,
) -> Vec<i64> {
    let amount = n.min(candidates.len());
    let (chosen, _) = candidates.partial_shuffle(rng, amount);
    chosen.to_vec()
}
