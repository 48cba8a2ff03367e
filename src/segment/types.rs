//! Core segment type definitions.
//!
//! Defines [`Segment`] (a catalog row), [`RelationRecord`] (one membership
//! interval from the relation log), [`Event`] and [`Operation`] (reconstructed
//! history facts), [`DateWindow`], and the outcome structs returned by mutations.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A segment as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub id: i64,
    /// Unique, non-empty name of the cohort (e.g. `"beta"`).
    pub slug: String,
    /// `false` once the segment has been soft-deleted.
    pub is_active: bool,
}

/// The active segments of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSegments {
    pub user_id: i64,
    pub segments: Vec<String>,
}

/// One row of the membership log joined to its segment slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationRecord {
    pub user_id: i64,
    pub segment_slug: String,
    pub is_active: bool,
    pub date_assigned: DateTime<Utc>,
    /// Set once the interval was closed by an unassign or a segment delete.
    pub date_unassigned: Option<DateTime<Utc>>,
}

/// Kind of membership change recorded in a history [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Assigned,
    Unassigned,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::Unassigned => "unassigned",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "assigned" => Ok(Self::Assigned),
            "unassigned" => Ok(Self::Unassigned),
            _ => Err(format!("unknown operation: {s}")),
        }
    }
}

/// A reconstructed `(user, segment, operation, timestamp)` fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub user_id: i64,
    pub segment_slug: String,
    pub operation: Operation,
    pub timestamp: DateTime<Utc>,
}

/// Half-open `[start, end)` time range at month granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// Result of an assign call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssignOutcome {
    /// Pairs that received a new active relation row.
    pub assigned: usize,
    /// Pairs that already had an active relation and were left untouched.
    pub skipped: usize,
}

/// Result of an unassign call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnassignOutcome {
    /// Active relation rows that were closed.
    pub unassigned: usize,
}

/// Result of a combined assign/unassign call for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateOutcome {
    pub assigned: AssignOutcome,
    pub unassigned: UnassignOutcome,
}

/// Result of a percentage rollout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutoAssignOutcome {
    pub sample_size: usize,
    pub assigned_users: Vec<i64>,
}

/// Where an exported history report can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportLocation {
    pub path: std::path::PathBuf,
    pub url: String,
}

/// Fixed-width RFC 3339 form used for storage and reports.
///
/// Microsecond precision with a `Z` suffix, so text order matches time order.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp previously written by [`format_timestamp`].
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(text).map(|t| t.with_timezone(&Utc))
}
