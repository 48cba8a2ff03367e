#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use segmentator::db;
use segmentator::segment::{Catalog, Context, ManualClock, SqliteStore};
use std::sync::Arc;

/// Open a fresh in-memory store whose clock starts at `start`.
pub fn test_store_at(start: DateTime<Utc>) -> (SqliteStore, Arc<ManualClock>) {
    let conn = db::open_memory_database().unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let store = SqliteStore::with_clock(conn, clock.clone());
    (store, clock)
}

/// Open a fresh in-memory store on the wall clock.
pub fn test_store() -> SqliteStore {
    SqliteStore::new(db::open_memory_database().unwrap())
}

/// Register users `1..=count` as active.
pub fn seed_users(store: &mut SqliteStore, count: i64) {
    let ctx = Context::background();
    for id in 1..=count {
        store.register_user(&ctx, id, true).unwrap();
    }
}

pub fn create_segments(store: &mut SqliteStore, names: &[&str]) {
    let ctx = Context::background();
    for name in names {
        store.insert_segment(&ctx, name).unwrap();
    }
}

pub fn slugs(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

/// Active relation rows for one (user, segment) pair.
pub fn active_rows(store: &SqliteStore, user_id: i64, slug: &str) -> i64 {
    store
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM user_segment_relation r JOIN segments s ON s.id = r.segment_id \
             WHERE r.user_id = ?1 AND s.slug = ?2 AND r.is_active = 1",
            rusqlite::params![user_id, slug],
            |row| row.get(0),
        )
        .unwrap()
}
