// tests/verify_tests.rs
//! Comparison reports between two sessions

use cipher_session::{compare, compare_contents};
use serde_json::Value;

mod common;
mod support;
use support::{Fixture, NEW_KEY, ORIGINAL_KEY};

#[test]
fn identical_stores_compare_equal() {
    common::setup();
    let fx = Fixture::new();
    let a = fx.seeded("a.db", ORIGINAL_KEY, 12);
    let b = fx.seeded("b.db", NEW_KEY, 12);

    let mut a = support::open_at(&a, ORIGINAL_KEY);
    let mut b = support::open_at(&b, NEW_KEY);

    let report = compare_contents(&mut a, &mut b).unwrap();
    assert!(report.equal);
    assert!(report.divergences.is_empty());
    let users = report.table("users").unwrap();
    assert_eq!(users.rows_a, 12);
    assert_eq!(users.rows_b, Some(12));
    assert!(users.digest_a.is_some());
    assert!(users.is_equal());
    assert_eq!(report.summary(), "1 table(s) match");
}

#[test]
fn row_count_difference_is_reported() {
    let fx = Fixture::new();
    let a = fx.seeded("a.db", "", 5);
    let b = fx.seeded("b.db", "", 4);

    let mut a = support::open_at(&a, "");
    let mut b = support::open_at(&b, "");

    let report = compare(&mut a, &mut b).unwrap();
    assert!(!report.equal);
    assert_eq!(report.divergences.len(), 1);
    assert!(report.divergences[0].contains("5 vs 4"));
}

#[test]
fn missing_table_is_reported() {
    let fx = Fixture::new();
    let a = fx.seeded("a.db", "", 1);
    let mut a = support::open_at(&a, "");
    a.execute_batch("CREATE TABLE extra (x)").unwrap();

    let b = fx.seeded("b.db", "", 1);
    let mut b = support::open_at(&b, "");

    let report = compare(&mut a, &mut b).unwrap();
    assert!(!report.equal);
    assert_eq!(report.table("extra").unwrap().rows_b, None);
    assert!(report.summary().contains("extra"));
}

#[test]
fn tables_only_in_second_store_do_not_break_equality() {
    let fx = Fixture::new();
    let a = fx.seeded("a.db", "", 3);
    let b = fx.seeded("b.db", "", 3);

    let mut a = support::open_at(&a, "");
    let mut b = support::open_at(&b, "");
    b.execute_batch("CREATE TABLE audit (entry TEXT)").unwrap();

    let report = compare(&mut a, &mut b).unwrap();
    assert!(report.equal);
    assert_eq!(report.only_in_b, vec!["audit".to_string()]);
}

#[test]
fn same_counts_different_values_only_caught_by_contents() {
    let fx = Fixture::new();
    let a = fx.seeded("a.db", ORIGINAL_KEY, 6);
    let b = fx.seeded("b.db", ORIGINAL_KEY, 6);

    let mut a = support::open_at(&a, ORIGINAL_KEY);
    let mut b = support::open_at(&b, ORIGINAL_KEY);
    b.execute("UPDATE users SET age = ?1 WHERE id = ?2", [99, 3])
        .unwrap();

    assert!(compare(&mut a, &mut b).unwrap().equal);

    let report = compare_contents(&mut a, &mut b).unwrap();
    assert!(!report.equal);
    assert!(report.summary().contains("contents differ"));
}

#[test]
fn row_order_does_not_matter() {
    let fx = Fixture::new();
    let mut a = fx.open("a.db", "");
    let mut b = fx.open("b.db", "");
    for s in [&mut a, &mut b] {
        s.execute_batch("CREATE TABLE kv (k TEXT, v BLOB)").unwrap();
    }
    for (k, v) in [("x", vec![1u8]), ("y", vec![2u8])] {
        a.execute("INSERT INTO kv VALUES (?1, ?2)", rusqlite::params![k, v])
            .unwrap();
    }
    for (k, v) in [("y", vec![2u8]), ("x", vec![1u8])] {
        b.execute("INSERT INTO kv VALUES (?1, ?2)", rusqlite::params![k, v])
            .unwrap();
    }

    assert!(compare_contents(&mut a, &mut b).unwrap().equal);
}

#[test]
fn report_serializes_to_json() {
    let fx = Fixture::new();
    let a = fx.seeded("a.db", "", 2);
    let b = fx.seeded("b.db", "", 2);
    let mut a = support::open_at(&a, "");
    let mut b = support::open_at(&b, "");

    let json = compare(&mut a, &mut b).unwrap().to_json().unwrap();
    let parsed: Value = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed["equal"], true);
    assert_eq!(parsed["tables"][0]["name"], "users");
    assert_eq!(parsed["tables"][0]["rows_a"], 2);
    assert!(parsed["compared_at"].is_string());
}

#[test]
fn compare_under_wrong_key_fails() {
    let fx = Fixture::new();
    let a = fx.seeded("a.db", ORIGINAL_KEY, 1);
    let b = fx.seeded("b.db", ORIGINAL_KEY, 1);

    let mut a = support::open_at(&a, ORIGINAL_KEY);
    let mut b = support::open_at(&b, NEW_KEY);

    assert!(compare(&mut a, &mut b).unwrap_err().is_key_or_corruption());
}
