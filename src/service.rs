//! Async façade over the segment engine.
//!
//! [`SegmentService`] keeps only the database path. Each call runs on
//! `tokio::task::spawn_blocking` with its own connection, so the service holds no
//! lock of its own: writers are serialized by SQLite (`BEGIN IMMEDIATE` plus the
//! busy timeout) and readers proceed alongside them under WAL. Checks that need no
//! storage (slug shape, fraction range, date text) run before a task is spawned.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::SegmentatorConfig;
use crate::db;
use crate::error::{Result, SegmentError};
use crate::segment::auto_assign::{self, validate_fraction};
use crate::segment::history::{get_user_history, parse_date_window};
use crate::segment::store::validate_slug;
use crate::segment::types::{
    AssignOutcome, AutoAssignOutcome, Event, ReportLocation, Segment, UnassignOutcome,
    UpdateOutcome, UserSegments,
};
use crate::segment::{
    AssignmentStore, Catalog, Clock, Context, ReportExporter, SqliteStore, SystemClock,
};

#[derive(Clone)]
pub struct SegmentService {
    db_path: Arc<PathBuf>,
    clock: Arc<dyn Clock>,
    exporter: Arc<ReportExporter>,
}

impl SegmentService {
    /// Initialize the database at `db_path` and serve calls against it.
    pub fn new(db_path: impl Into<PathBuf>, exporter: ReportExporter) -> anyhow::Result<Self> {
        Self::with_clock(db_path, exporter, Arc::new(SystemClock))
    }

    pub fn with_clock(
        db_path: impl Into<PathBuf>,
        exporter: ReportExporter,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let db_path = db_path.into();
        // schema setup happens once; per-call connections only apply pragmas
        drop(db::open_database(&db_path)?);
        tracing::info!(db = %db_path.display(), "database ready");

        Ok(Self {
            db_path: Arc::new(db_path),
            clock,
            exporter: Arc::new(exporter),
        })
    }

    /// Open the configured database and report directory.
    pub fn open(config: &SegmentatorConfig) -> anyhow::Result<Self> {
        let exporter = ReportExporter::from_config(&config.report);
        tracing::info!(reports = %exporter.storage_dir().display(), "report exporter ready");
        Self::new(config.resolved_db_path(), exporter)
    }

    /// Run `f` on the blocking pool against a fresh connection.
    async fn run<T, F>(&self, ctx: &Context, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteStore, &Context) -> Result<T> + Send + 'static,
    {
        ctx.check()?;
        let db_path = Arc::clone(&self.db_path);
        let clock = Arc::clone(&self.clock);
        let ctx = ctx.clone();

        tokio::task::spawn_blocking(move || {
            let conn = db::connect(&db_path)?;
            let mut store = SqliteStore::with_clock(conn, clock);
            f(&mut store, &ctx)
        })
        .await
        .map_err(|e| SegmentError::Task(e.to_string()))?
    }

    pub async fn insert_segment(&self, ctx: &Context, slug: &str) -> Result<()> {
        validate_slug(slug)?;
        let slug = slug.to_string();
        self.run(ctx, move |store, ctx| store.insert_segment(ctx, &slug))
            .await
    }

    pub async fn delete_segment(&self, ctx: &Context, slug: &str) -> Result<()> {
        validate_slug(slug)?;
        let slug = slug.to_string();
        self.run(ctx, move |store, ctx| store.delete_segment(ctx, &slug))
            .await
    }

    pub async fn get_segment(&self, ctx: &Context, slug: &str) -> Result<Option<Segment>> {
        let slug = slug.to_string();
        self.run(ctx, move |store, ctx| store.get_segment(ctx, &slug))
            .await
    }

    pub async fn list_segments(&self, ctx: &Context, include_inactive: bool) -> Result<Vec<Segment>> {
        self.run(ctx, move |store, ctx| store.list_segments(ctx, include_inactive))
            .await
    }

    pub async fn register_user(&self, ctx: &Context, user_id: i64, is_active: bool) -> Result<()> {
        self.run(ctx, move |store, ctx| store.register_user(ctx, user_id, is_active))
            .await
    }

    pub async fn assign_segments(
        &self,
        ctx: &Context,
        user_ids: Vec<i64>,
        slugs: Vec<String>,
    ) -> Result<AssignOutcome> {
        for slug in &slugs {
            validate_slug(slug)?;
        }
        self.run(ctx, move |store, ctx| store.assign_segments(ctx, &user_ids, &slugs))
            .await
    }

    pub async fn unassign_segments(
        &self,
        ctx: &Context,
        user_ids: Vec<i64>,
        slugs: Vec<String>,
    ) -> Result<UnassignOutcome> {
        for slug in &slugs {
            validate_slug(slug)?;
        }
        self.run(ctx, move |store, ctx| store.unassign_segments(ctx, &user_ids, &slugs))
            .await
    }

    /// Assign and unassign segments for one user as a single transaction.
    pub async fn update_user_segments(
        &self,
        ctx: &Context,
        user_id: i64,
        assign: Vec<String>,
        unassign: Vec<String>,
    ) -> Result<UpdateOutcome> {
        for slug in assign.iter().chain(&unassign) {
            validate_slug(slug)?;
        }
        self.run(ctx, move |store, ctx| {
            store.update_user_segments(ctx, user_id, &assign, &unassign)
        })
        .await
    }

    pub async fn get_user_segments(&self, ctx: &Context, user_id: i64) -> Result<UserSegments> {
        self.run(ctx, move |store, ctx| store.get_user_segments(ctx, user_id))
            .await
    }

    pub async fn auto_assign(
        &self,
        ctx: &Context,
        fraction: u32,
        slug: &str,
    ) -> Result<AutoAssignOutcome> {
        validate_fraction(fraction)?;
        validate_slug(slug)?;
        let slug = slug.to_string();
        self.run(ctx, move |store, ctx| {
            auto_assign::auto_assign(store, ctx, fraction, &slug)
        })
        .await
    }

    /// Reconstructed events of `user_id` between two `yyyy-mm` month bounds.
    pub async fn user_history(
        &self,
        ctx: &Context,
        user_id: i64,
        start: &str,
        end: &str,
    ) -> Result<Vec<Event>> {
        let window = parse_date_window(start, end)?;
        self.run(ctx, move |store, ctx| {
            get_user_history(&*store, ctx, user_id, &window)
        })
        .await
    }

    /// Reconstruct a user's history and export it, returning the report locator.
    pub async fn user_history_report(
        &self,
        ctx: &Context,
        user_id: i64,
        start: &str,
        end: &str,
    ) -> Result<ReportLocation> {
        let events = self.user_history(ctx, user_id, start, end).await?;
        ctx.check()?;

        let exporter = Arc::clone(&self.exporter);
        tokio::task::spawn_blocking(move || exporter.export(&events))
            .await
            .map_err(|e| SegmentError::Task(e.to_string()))?
    }
}
