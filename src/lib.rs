//! User segmentation engine — named cohorts, transactional membership, percentage
//! rollouts, and membership history reports.
//!
//! Operators define **segments** (e.g. `"beta"`, `"new-checkout"`) and maintain a
//! many-to-many membership relation between users and segments. Every membership
//! interval is a permanent row in the relation log, so history can be rebuilt for
//! any month range and exported as a `;`-delimited report.
//!
//! | Component | Role |
//! |-----------|------|
//! | **Catalog** | Create, soft-delete and reactivate segments |
//! | **Assignment store** | Atomic assign / unassign, membership queries |
//! | **Sampler** | Uniform random pick of users lacking a segment |
//! | **Auto-assign** | `ceil(active * fraction / 100)` rollouts |
//! | **History** | Event reconstruction over a half-open month window |
//! | **Report** | `user_id;segment_slug;operation;timestamp` files |
//!
//! # Architecture
//!
//! - **Storage**: SQLite via `rusqlite`; one immediate transaction per mutating call
//! - **Capabilities**: [`segment::Catalog`], [`segment::AssignmentStore`],
//!   [`segment::Sampler`], [`segment::HistoryReader`], implemented by
//!   [`segment::SqliteStore`]
//! - **Async**: [`service::SegmentService`] runs calls on the blocking pool
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`db`] — SQLite database initialization, schema, and health checks
//! - [`error`] — Typed engine failures
//! - [`segment`] — Core engine: catalog, assignment, sampling, history, reports
//! - [`service`] — Async façade with per-call cancellation contexts

pub mod config;
pub mod db;
pub mod error;
pub mod segment;
pub mod service;
