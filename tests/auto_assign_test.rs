mod helpers;

use helpers::{create_segments, seed_users, test_store};
use segmentator::segment::auto_assign::auto_assign;
use segmentator::segment::{AssignmentStore, Context};
use std::collections::HashSet;

#[test]
fn full_rollout_reaches_every_active_user() {
    let mut store = test_store();
    let ctx = Context::background();
    seed_users(&mut store, 7);
    store.register_user(&ctx, 8, false).unwrap();
    create_segments(&mut store, &["beta"]);

    let outcome = auto_assign(&mut store, &ctx, 100, "beta").unwrap();
    assert_eq!(outcome.sample_size, 7);

    for user in 1..=7 {
        assert_eq!(store.get_user_segments(&ctx, user).unwrap().segments, vec!["beta"]);
    }
    assert!(store.get_user_segments(&ctx, 8).unwrap().segments.is_empty());
}

#[test]
fn half_of_ten_users_get_exactly_five() {
    let mut store = test_store();
    let ctx = Context::background();
    seed_users(&mut store, 10);
    create_segments(&mut store, &["gamma"]);

    let outcome = auto_assign(&mut store, &ctx, 50, "gamma").unwrap();
    let distinct: HashSet<i64> = outcome.assigned_users.iter().copied().collect();
    assert_eq!(distinct.len(), 5);

    let holders = (1..=10)
        .filter(|&u| {
            store
                .get_user_segments(&ctx, u)
                .unwrap()
                .segments
                .contains(&"gamma".to_string())
        })
        .count();
    assert_eq!(holders, 5);
}

#[test]
fn repeated_rollout_samples_only_users_without_segment() {
    let mut store = test_store();
    let ctx = Context::background();
    seed_users(&mut store, 10);
    create_segments(&mut store, &["gamma"]);

    let first = auto_assign(&mut store, &ctx, 50, "gamma").unwrap();
    let second = auto_assign(&mut store, &ctx, 50, "gamma").unwrap();

    let first: HashSet<i64> = first.assigned_users.into_iter().collect();
    let second: HashSet<i64> = second.assigned_users.into_iter().collect();
    assert!(first.is_disjoint(&second));
    assert_eq!(first.len() + second.len(), 10);
}

#[test]
fn out_of_range_fraction_changes_nothing() {
    let mut store = test_store();
    let ctx = Context::background();
    seed_users(&mut store, 4);
    create_segments(&mut store, &["beta"]);

    for fraction in [0, 101] {
        let err = auto_assign(&mut store, &ctx, fraction, "beta").unwrap_err();
        assert!(err.is_invalid_argument());
    }

    let rows: i64 = store
        .connection()
        .query_row("SELECT COUNT(*) FROM user_segment_relation", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 0);
}

#[test]
fn rollout_of_unknown_segment_is_not_found() {
    let mut store = test_store();
    seed_users(&mut store, 2);
    let err = auto_assign(&mut store, &Context::background(), 50, "missing").unwrap_err();
    assert!(err.is_not_found());
}
