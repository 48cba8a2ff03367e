mod helpers;

use helpers::slugs;
use segmentator::db;
use segmentator::segment::{Context, ReportExporter};
use segmentator::service::SegmentService;
use std::time::Duration;

/// Service over a fresh database file, with reports written next to it.
fn service(dir: &std::path::Path) -> SegmentService {
    let exporter = ReportExporter::new(dir, "report_", ".csv", "http://localhost:8000/reports");
    SegmentService::new(dir.join("segments.db"), exporter).unwrap()
}

#[tokio::test]
async fn service_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());
    let ctx = Context::background();

    service.insert_segment(&ctx, "beta").await.unwrap();
    for id in 1..=3 {
        service.register_user(&ctx, id, true).await.unwrap();
    }

    let outcome = service
        .assign_segments(&ctx, vec![1, 2, 3], slugs(&["beta"]))
        .await
        .unwrap();
    assert_eq!(outcome.assigned, 3);

    let segments = service.get_user_segments(&ctx, 2).await.unwrap();
    assert_eq!(segments.segments, vec!["beta"]);

    service
        .unassign_segments(&ctx, vec![2], slugs(&["beta"]))
        .await
        .unwrap();
    assert!(service.get_user_segments(&ctx, 2).await.unwrap().segments.is_empty());

    let listed = service.list_segments(&ctx, false).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].slug, "beta");
}

#[tokio::test]
async fn concurrent_assigns_keep_one_active_row() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());
    let ctx = Context::background();
    service.insert_segment(&ctx, "beta").await.unwrap();
    service.register_user(&ctx, 1, true).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        let ctx = ctx.clone();
        handles.push(tokio::spawn(async move {
            service
                .assign_segments(&ctx, vec![1], slugs(&["beta"]))
                .await
                .unwrap()
        }));
    }
    let mut assigned = 0;
    for handle in handles {
        assigned += handle.await.unwrap().assigned;
    }
    assert_eq!(assigned, 1);
}

#[tokio::test]
async fn history_report_is_written_and_linked() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());
    let ctx = Context::background();
    service.insert_segment(&ctx, "beta").await.unwrap();
    service.register_user(&ctx, 42, true).await.unwrap();
    service
        .assign_segments(&ctx, vec![42], slugs(&["beta"]))
        .await
        .unwrap();

    let now = chrono::Utc::now().format("%Y-%m").to_string();
    let events = service.user_history(&ctx, 42, &now, &now).await.unwrap();
    assert_eq!(events.len(), 1);

    let location = service
        .user_history_report(&ctx, 42, &now, &now)
        .await
        .unwrap();
    assert!(location.path.starts_with(dir.path()));
    let file_name = location.path.file_name().unwrap().to_str().unwrap();
    assert_eq!(location.url, format!("http://localhost:8000/reports/{file_name}"));

    let text = std::fs::read_to_string(&location.path).unwrap();
    assert_eq!(text.lines().count(), 1);
    assert!(text.starts_with("42;beta;assigned;"));
}

#[tokio::test]
async fn argument_errors_are_reported_before_storage() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());
    let ctx = Context::background();

    assert!(service.insert_segment(&ctx, "").await.unwrap_err().is_invalid_argument());
    assert!(service.auto_assign(&ctx, 0, "beta").await.unwrap_err().is_invalid_argument());
    assert!(service
        .user_history(&ctx, 1, "2024-05", "2024-01")
        .await
        .unwrap_err()
        .is_invalid_argument());
    assert!(service.delete_segment(&ctx, "missing").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn cancelled_context_stops_calls() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());
    let ctx = Context::background();
    service.insert_segment(&ctx, "beta").await.unwrap();

    let cancelled = Context::background();
    cancelled.cancel();
    let err = service.delete_segment(&cancelled, "beta").await.unwrap_err();
    assert!(err.is_cancelled());

    let segment = service.get_segment(&ctx, "beta").await.unwrap().unwrap();
    assert!(segment.is_active);
}

#[tokio::test]
async fn reads_proceed_while_a_write_transaction_is_open() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());
    let ctx = Context::background();
    service.insert_segment(&ctx, "beta").await.unwrap();
    service.register_user(&ctx, 1, true).await.unwrap();
    service
        .assign_segments(&ctx, vec![1], slugs(&["beta"]))
        .await
        .unwrap();

    // another writer holds the database write lock
    let writer = db::connect(&dir.path().join("segments.db")).unwrap();
    writer
        .execute_batch("BEGIN IMMEDIATE; INSERT INTO users (id, is_active) VALUES (2, 1);")
        .unwrap();

    let segments = tokio::time::timeout(Duration::from_secs(2), service.get_user_segments(&ctx, 1))
        .await
        .expect("read blocked behind the open write transaction")
        .unwrap();
    assert_eq!(segments.segments, vec!["beta"]);

    let listed = tokio::time::timeout(Duration::from_secs(2), service.list_segments(&ctx, true))
        .await
        .expect("read blocked behind the open write transaction")
        .unwrap();
    assert_eq!(listed.len(), 1);

    writer.execute_batch("ROLLBACK").unwrap();
}

#[tokio::test]
async fn update_user_segments_swaps_membership() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());
    let ctx = Context::background();
    service.insert_segment(&ctx, "beta").await.unwrap();
    service.insert_segment(&ctx, "gamma").await.unwrap();
    service.register_user(&ctx, 7, true).await.unwrap();
    service
        .assign_segments(&ctx, vec![7], slugs(&["beta"]))
        .await
        .unwrap();

    let outcome = service
        .update_user_segments(&ctx, 7, slugs(&["gamma"]), slugs(&["beta"]))
        .await
        .unwrap();
    assert_eq!(outcome.assigned.assigned, 1);
    assert_eq!(outcome.unassigned.unassigned, 1);
    assert_eq!(
        service.get_user_segments(&ctx, 7).await.unwrap().segments,
        vec!["gamma"]
    );

    assert!(service
        .update_user_segments(&ctx, 7, slugs(&["a;b"]), vec![])
        .await
        .unwrap_err()
        .is_invalid_argument());
}
