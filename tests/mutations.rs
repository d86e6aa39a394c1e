//! Mutation scenarios: the block-array invariants under insert, remove,
//! resize, and mixed workloads.

use std::fs;

use jinn::parsing::parse_json;
use jinn::types::deep_eq;
use jinn::{Database, JsonValue, OpenOptions, Query, ResizeOptions};
use tempfile::{tempdir, TempDir};

const HEADER_SIZE: u64 = 22;

fn open_db(max_cache_size: u64) -> (Database, TempDir) {
    let dir = tempdir().unwrap();
    let db = Database::open(
        Some(dir.path().join("mut.db")),
        OpenOptions {
            max_cache_size,
            ..OpenOptions::default()
        },
    )
    .unwrap();
    db.load().unwrap();
    (db, dir)
}

/// The §-invariant every mutation must restore: file length matches the
/// counters exactly.
fn assert_file_matches_counters(db: &Database) {
    let len = fs::metadata(db.path()).unwrap().len();
    assert_eq!(len, HEADER_SIZE + db.block_count() * db.block_size());
}

fn seed(db: &Database, count: usize) {
    for i in 0..count {
        db.insert(
            parse_json(&format!(
                r#"{{"_id":"{:02}","n":{},"color":"{}"}}"#,
                i,
                i,
                ["red", "green", "blue", "red"][i % 4]
            ))
            .unwrap(),
        )
        .unwrap();
    }
}

#[test]
fn inserts_keep_the_file_dense() {
    let (db, _dir) = open_db(128 * 1024 * 1024);
    seed(&db, 10);

    assert_eq!(db.block_count(), 10);
    assert_eq!(db.record_count(), 10);
    assert_file_matches_counters(&db);
}

#[test]
fn remove_and_compact() {
    let (db, _dir) = open_db(128 * 1024 * 1024);
    seed(&db, 8);

    let removed = db
        .remove(&Query::parse(r#"{"color":"red"}"#).unwrap(), &Default::default())
        .unwrap();

    assert_eq!(removed, 4);
    assert_eq!(db.block_count(), 4);
    assert_file_matches_counters(&db);
    assert!(db
        .find(&Query::parse(r#"{"color":"red"}"#).unwrap(), &Default::default())
        .unwrap()
        .is_empty());

    // The survivors are all still reachable.
    assert_eq!(db.find_all().unwrap().len(), 4);
}

#[test]
fn oversize_insert_grows_the_block_size() {
    let (db, _dir) = open_db(128 * 1024 * 1024);
    seed(&db, 3);
    let old_size = db.block_size();

    let long = "x".repeat(old_size as usize * 2);
    db.insert(parse_json(&format!(r#"{{"_id":"big","data":"{}"}}"#, long)).unwrap())
        .unwrap();

    let new_size = db.block_size();
    assert!(new_size > old_size);
    assert!(new_size.is_power_of_two());
    assert_file_matches_counters(&db);

    // Prior records survive the rewrite unchanged.
    for i in 0..3 {
        let q = Query::parse(&format!(r#"{{"_id":"{:02}"}}"#, i)).unwrap();
        let found = db.find(&q, &Default::default()).unwrap();
        assert_eq!(found[0].get("n").and_then(JsonValue::as_f64), Some(i as f64));
    }
    let q = Query::parse(r#"{"_id":"big"}"#).unwrap();
    let found = db.find(&q, &Default::default()).unwrap();
    assert_eq!(
        found[0].get("data").and_then(JsonValue::as_str).map(str::len),
        Some(long.len())
    );
}

#[test]
fn first_insert_sizes_a_cold_store() {
    let (db, _dir) = open_db(128 * 1024 * 1024);

    let long = "y".repeat(500);
    db.insert(parse_json(&format!(r#"{{"_id":"solo","data":"{}"}}"#, long)).unwrap())
        .unwrap();

    assert!(db.block_size().is_power_of_two());
    assert!(db.block_size() >= 500);
    assert_eq!(db.block_count(), 1);
    assert_file_matches_counters(&db);
}

#[test]
fn resize_is_idempotent() {
    let (db, _dir) = open_db(128 * 1024 * 1024);
    seed(&db, 5);
    let size = db.block_size();
    let len_before = fs::metadata(db.path()).unwrap().len();

    db.resize(size, &ResizeOptions::default()).unwrap();

    assert_eq!(db.block_size(), size);
    assert_eq!(fs::metadata(db.path()).unwrap().len(), len_before);
}

#[test]
fn explicit_resize_round_trips_records() {
    let (db, _dir) = open_db(300);
    seed(&db, 8);
    let before = db.find_all().unwrap();

    db.resize(db.block_size() * 4, &ResizeOptions::default()).unwrap();
    assert_file_matches_counters(&db);
    db.resize(db.block_size() / 4, &ResizeOptions::default()).unwrap();
    assert_file_matches_counters(&db);

    let after = db.find_all().unwrap();
    assert_eq!(before.len(), after.len());
    for record in &before {
        let q = Query::parse(&format!(r#"{{"_id":"{}"}}"#, record.id().unwrap())).unwrap();
        let found = db.find(&q, &Default::default()).unwrap();
        assert!(deep_eq(&found[0], record));
    }
}

#[test]
fn mixed_workload_survives_reload() {
    let (db, _dir) = open_db(400);
    seed(&db, 12);

    db.remove(&Query::parse(r#"{"color":"green"}"#).unwrap(), &Default::default())
        .unwrap();
    db.insert(parse_json(r#"{"_id":"late","n":99,"color":"mauve"}"#).unwrap())
        .unwrap();
    db.update(
        &Query::parse(r#"{"color":"blue"}"#).unwrap(),
        &jinn::Update::parse(r#"{"$set":{"seen":true}}"#).unwrap(),
        &Default::default(),
    )
    .unwrap();
    assert_file_matches_counters(&db);

    let before = db.find_all().unwrap();
    db.close().unwrap();
    db.load().unwrap();
    let after = db.find_all().unwrap();

    assert_eq!(before.len(), after.len());
    for record in &before {
        let q = Query::parse(&format!(r#"{{"_id":"{}"}}"#, record.id().unwrap())).unwrap();
        let found = db.find(&q, &Default::default()).unwrap();
        assert_eq!(found.len(), 1);
        assert!(deep_eq(&found[0], record));
    }
}

#[test]
fn repeated_partial_removals_stay_consistent() {
    let (db, _dir) = open_db(500);
    seed(&db, 20);

    // Peel records off in an order that keeps punching holes into both
    // the cached prefix and the on-disk suffix.
    for i in [3, 11, 0, 7, 15, 4, 19, 1, 9, 12] {
        let removed = db
            .remove(
                &Query::parse(&format!(r#"{{"_id":"{:02}"}}"#, i)).unwrap(),
                &Default::default(),
            )
            .unwrap();
        assert_eq!(removed, 1);
        assert_file_matches_counters(&db);
        assert_eq!(db.record_count() as u64, db.block_count());
    }

    assert_eq!(db.block_count(), 10);
    let mut left: Vec<String> = db
        .find_all()
        .unwrap()
        .iter()
        .map(|r| r.id().unwrap().to_string())
        .collect();
    left.sort();
    let expected: Vec<String> = [2, 5, 6, 8, 10, 13, 14, 16, 17, 18]
        .iter()
        .map(|i| format!("{:02}", i))
        .collect();
    assert_eq!(left, expected);
}

#[test]
fn live_records_resolve_dead_ones_do_not() {
    let (db, _dir) = open_db(128 * 1024 * 1024);
    seed(&db, 4);

    let q = Query::parse(r#"{"_id":"02"}"#).unwrap();
    assert_eq!(db.find(&q, &Default::default()).unwrap().len(), 1);

    db.remove(&q, &Default::default()).unwrap();
    assert!(db.find(&q, &Default::default()).unwrap().is_empty());

    // Reinsertion makes it live again, at a fresh block.
    db.insert(parse_json(r#"{"_id":"02","n":2,"color":"blue"}"#).unwrap())
        .unwrap();
    assert_eq!(db.find(&q, &Default::default()).unwrap().len(), 1);
    assert_file_matches_counters(&db);
}
