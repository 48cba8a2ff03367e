//! Membership history reconstruction.
//!
//! Relation rows are never deleted, so a user's history is rebuilt straight from
//! their `date_assigned` / `date_unassigned` timestamps. Each row yields at most
//! one `assigned` and one `unassigned` [`Event`], filtered to a half-open month
//! window and ordered by time.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use rusqlite::params;

use super::context::Context;
use super::store::{optional_time_column, time_column, SqliteStore};
use super::types::{DateWindow, Event, Operation, RelationRecord};
use crate::error::{Result, SegmentError};

pub trait HistoryReader {
    /// Every relation row of `user_id`, active or closed, including rows whose
    /// segment was later soft-deleted. Ordered by row creation.
    fn relation_history(&self, ctx: &Context, user_id: i64) -> Result<Vec<RelationRecord>>;
}

impl HistoryReader for SqliteStore {
    fn relation_history(&self, ctx: &Context, user_id: i64) -> Result<Vec<RelationRecord>> {
        self.read(ctx, |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT r.user_id, s.slug, r.is_active, r.date_assigned, r.date_unassigned \
                 FROM user_segment_relation r \
                 JOIN segments s ON r.segment_id = s.id \
                 WHERE r.user_id = ?1 \
                 ORDER BY r.id",
            )?;
            let records = stmt
                .query_map(params![user_id], |row| {
                    Ok(RelationRecord {
                        user_id: row.get(0)?,
                        segment_slug: row.get(1)?,
                        is_active: row.get(2)?,
                        date_assigned: time_column(row, 3)?,
                        date_unassigned: optional_time_column(row, 4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
    }
}

/// Parse `YYYY-M` / `YYYY-MM` bounds into `[start of start month, start of the
/// month after end)`.
pub fn parse_date_window(start: &str, end: &str) -> Result<DateWindow> {
    let first = parse_month(start)?;
    let last = parse_month(end)?;
    if last < first {
        return Err(SegmentError::invalid(format!(
            "date window ends before it starts: {start} .. {end}"
        )));
    }

    let (year, month) = if last.month() == 12 {
        (last.year() + 1, 1)
    } else {
        (last.year(), last.month() + 1)
    };
    let after_last = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| SegmentError::invalid(format!("date out of range: {end}")))?;

    Ok(DateWindow {
        start: month_start(first),
        end: month_start(after_last),
    })
}

fn parse_month(text: &str) -> Result<NaiveDate> {
    let malformed =
        || SegmentError::invalid(format!("malformed date {text:?}, expected yyyy-mm or yyyy-m"));

    let (year, month) = text.split_once('-').ok_or_else(malformed)?;
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if year.len() != 4 || !digits(year) || !(1..=2).contains(&month.len()) || !digits(month) {
        return Err(malformed());
    }

    let year: i32 = year.parse().map_err(|_| malformed())?;
    let month: u32 = month.parse().map_err(|_| malformed())?;
    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(malformed)
}

fn month_start(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// Turn relation rows into window-filtered events, ordered by timestamp.
///
/// An assignment and unassignment with equal timestamps keep that order.
pub fn reconstruct_events(records: &[RelationRecord], window: &DateWindow) -> Vec<Event> {
    let mut events = Vec::new();
    for record in records {
        if window.contains(record.date_assigned) {
            events.push(Event {
                user_id: record.user_id,
                segment_slug: record.segment_slug.clone(),
                operation: Operation::Assigned,
                timestamp: record.date_assigned,
            });
        }
        if let Some(unassigned) = record.date_unassigned.filter(|t| window.contains(*t)) {
            events.push(Event {
                user_id: record.user_id,
                segment_slug: record.segment_slug.clone(),
                operation: Operation::Unassigned,
                timestamp: unassigned,
            });
        }
    }
    // stable: equal timestamps keep row order
    events.sort_by_key(|e| e.timestamp);
    events
}

/// Membership events of `user_id` inside `window`.
pub fn get_user_history<R>(
    reader: &R,
    ctx: &Context,
    user_id: i64,
    window: &DateWindow,
) -> Result<Vec<Event>>
where
    R: HistoryReader + ?Sized,
{
    let records = reader.relation_history(ctx, user_id)?;
    let events = reconstruct_events(&records, window);
    tracing::debug!(user_id, rows = records.len(), events = events.len(), "history reconstructed");
    Ok(events)
}
