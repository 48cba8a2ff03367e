//! Percentage rollout of a segment to randomly chosen active users.

use super::assignment::AssignmentStore;
use super::context::Context;
use super::sampler::Sampler;
use super::store::validate_slug;
use super::types::AutoAssignOutcome;
use crate::error::{Result, SegmentError};

/// Number of users to sample for `fraction` percent of `active_users`, rounded up.
pub fn sample_size(active_users: u64, fraction: u32) -> usize {
    let fraction = u64::from(fraction);
    ((active_users * fraction).div_ceil(100)) as usize
}

pub fn validate_fraction(fraction: u32) -> Result<()> {
    if !(1..=100).contains(&fraction) {
        return Err(SegmentError::invalid(format!(
            "fraction must be between 1 and 100, got {fraction}"
        )));
    }
    Ok(())
}

/// Assign `slug` to `ceil(active * fraction / 100)` users that do not hold it yet.
///
/// Each call samples independently from the users currently lacking the segment; it
/// does not top up toward a target share. The assignment itself is one transaction.
pub fn auto_assign<S>(
    store: &mut S,
    ctx: &Context,
    fraction: u32,
    slug: &str,
) -> Result<AutoAssignOutcome>
where
    S: AssignmentStore + Sampler + ?Sized,
{
    validate_fraction(fraction)?;
    validate_slug(slug)?;

    let active = store.active_users_amount(ctx)?;
    let size = sample_size(active, fraction);
    let users = store.random_users_without_segment(ctx, size, slug)?;

    store.assign_segments(ctx, &users, &[slug.to_string()])?;

    tracing::info!(slug, fraction, active, sample_size = size, assigned = users.len(), "auto-assign complete");
    Ok(AutoAssignOutcome {
        sample_size: size,
        assigned_users: users,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_size_rounds_up() {
        assert_eq!(sample_size(10, 50), 5);
        assert_eq!(sample_size(10, 1), 1);
        assert_eq!(sample_size(3, 50), 2);
        assert_eq!(sample_size(7, 100), 7);
        assert_eq!(sample_size(0, 100), 0);
    }

    #[test]
    fn fraction_bounds() {
        assert!(validate_fraction(0).unwrap_err().is_invalid_argument());
        assert!(validate_fraction(101).unwrap_err().is_invalid_argument());
        assert!(validate_fraction(1).is_ok());
        assert!(validate_fraction(100).is_ok());
    }
}
