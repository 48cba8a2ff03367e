//! CLI `history` command — export a user's membership history report.

use anyhow::{Context as _, Result};
use serde::Serialize;

use segmentator::segment::Context;
use segmentator::service::SegmentService;

#[derive(Debug, Serialize)]
struct HistoryOutput {
    user_id: i64,
    csv_url: String,
    path: String,
}

/// Reconstruct the history of `user_id` for `start..=end` months and print the
/// report locator as JSON.
pub async fn history(
    service: &SegmentService,
    ctx: &Context,
    user_id: i64,
    start: &str,
    end: &str,
) -> Result<()> {
    let location = service
        .user_history_report(ctx, user_id, start, end)
        .await
        .with_context(|| format!("failed to build history report for user {user_id}"))?;

    super::print_json(&HistoryOutput {
        user_id,
        csv_url: location.url,
        path: location.path.display().to_string(),
    })?;

    eprintln!("Report written to {}", location.path.display());
    Ok(())
}
