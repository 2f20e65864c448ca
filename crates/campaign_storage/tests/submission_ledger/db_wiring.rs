#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use campaign_kernel_contracts::submission::{
    ContentHash, ListQuery, ReceiptRef, SubmissionId, SubmissionInput, UniqueField,
    UniquenessPolicy,
};
use campaign_storage::repo::SubmissionLedgerRepo;
use campaign_storage::store::{IntakeStore, StorageError};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn t(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn hash(seed: char) -> ContentHash {
    ContentHash::new(seed.to_string().repeat(64)).unwrap()
}

fn receipt(seed: char) -> ReceiptRef {
    let content_hash = hash(seed);
    ReceiptRef {
        public_ref: format!("/uploads/{}-0000000000000000.png", content_hash.short_prefix(16)),
        content_hash,
    }
}

fn input(name: &str, email: &str, mobile: &str) -> SubmissionInput {
    SubmissionInput::v1(
        name.to_string(),
        email.to_string(),
        mobile.to_string(),
        "784-1990-1234567-1".to_string(),
        "Dubai".to_string(),
    )
    .unwrap()
}

fn both_unique() -> UniquenessPolicy {
    UniquenessPolicy {
        email: true,
        mobile: true,
    }
}

#[test]
fn at_ledger_db_01_ids_are_sequential_and_never_reused() {
    let mut s = IntakeStore::new_in_memory();
    let a = s
        .insert_submission_row(input("A", "a@x.com", "0501111111"), "Dubai".into(), receipt('a'), t(0), both_unique())
        .unwrap();
    let b = s
        .insert_submission_row(input("B", "b@x.com", "0502222222"), "Dubai".into(), receipt('b'), t(1), both_unique())
        .unwrap();
    assert_eq!(a.id, SubmissionId(1));
    assert_eq!(b.id, SubmissionId(2));

    s.delete_submission_row(b.id).unwrap();
    let c = s
        .insert_submission_row(input("C", "c@x.com", "0503333333"), "Dubai".into(), receipt('c'), t(2), both_unique())
        .unwrap();
    assert_eq!(c.id, SubmissionId(3));
}

#[test]
fn at_ledger_db_02_unique_email_is_case_insensitive() {
    let mut s = IntakeStore::new_in_memory();
    s.insert_submission_row(input("A", "Sam@X.com", "0501111111"), "Dubai".into(), receipt('a'), t(0), both_unique())
        .unwrap();
    let err = s
        .insert_submission_row(input("B", "sam@x.com", "0509999999"), "Dubai".into(), receipt('b'), t(1), both_unique())
        .unwrap_err();
    assert_eq!(
        err,
        StorageError::UniqueViolation {
            field: UniqueField::Email
        }
    );
    assert_eq!(s.submission_count(), 1);
}

#[test]
fn at_ledger_db_03_unique_mobile_ignores_separators() {
    let mut s = IntakeStore::new_in_memory();
    s.insert_submission_row(input("A", "a@x.com", "+971 50 111 1111"), "Dubai".into(), receipt('a'), t(0), both_unique())
        .unwrap();
    let err = s
        .insert_submission_row(input("B", "b@x.com", "+971-50-1111111"), "Dubai".into(), receipt('b'), t(1), both_unique())
        .unwrap_err();
    assert_eq!(
        err,
        StorageError::UniqueViolation {
            field: UniqueField::Mobile
        }
    );
}

#[test]
fn at_ledger_db_04_disabled_uniqueness_admits_repeats() {
    let mut s = IntakeStore::new_in_memory();
    let off = UniquenessPolicy::default();
    s.insert_submission_row(input("A", "a@x.com", "0501111111"), "Dubai".into(), receipt('a'), t(0), off)
        .unwrap();
    s.insert_submission_row(input("A", "a@x.com", "0501111111"), "Dubai".into(), receipt('a'), t(1), off)
        .unwrap();
    assert_eq!(s.submission_count(), 2);
    assert_eq!(s.submission_ids_by_receipt_hash(&hash('a')).len(), 2);
}

#[test]
fn at_ledger_db_05_deleting_frees_unique_keys() {
    let mut s = IntakeStore::new_in_memory();
    let a = s
        .insert_submission_row(input("A", "a@x.com", "0501111111"), "Dubai".into(), receipt('a'), t(0), both_unique())
        .unwrap();
    s.delete_submission_row(a.id).unwrap();
    assert!(s
        .insert_submission_row(input("A", "a@x.com", "0501111111"), "Dubai".into(), receipt('a'), t(1), both_unique())
        .is_ok());
}

#[test]
fn at_ledger_db_06_submitted_at_is_monotonic_in_id_order() {
    let mut s = IntakeStore::new_in_memory();
    let a = s
        .insert_submission_row(input("A", "a@x.com", "0501111111"), "Dubai".into(), receipt('a'), t(10), both_unique())
        .unwrap();
    // Wall clock stepped back between the two inserts.
    let b = s
        .insert_submission_row(input("B", "b@x.com", "0502222222"), "Dubai".into(), receipt('b'), t(5), both_unique())
        .unwrap();
    assert!(b.submitted_at >= a.submitted_at);
}

#[test]
fn at_ledger_db_07_list_sorts_pages_and_reports_full_total() {
    let mut s = IntakeStore::new_in_memory();
    for (i, name) in ["Carol", "alice", "Bob", "Dave"].iter().enumerate() {
        s.insert_submission_row(
            input(name, &format!("u{i}@x.com"), &format!("05000000{i:02}")),
            "Dubai".into(),
            receipt('a'),
            t(i as i64),
            both_unique(),
        )
        .unwrap();
    }

    let newest_first = s.list_submission_rows(&ListQuery::default());
    assert_eq!(newest_first.total, 4);
    let names: Vec<&str> = newest_first.items.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Dave", "Bob", "alice", "Carol"]);

    let by_name = s.list_submission_rows(&ListQuery::from_raw(Some(1), Some(2), Some("name"), Some("asc")));
    let names: Vec<&str> = by_name.items.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Carol", "Dave"]);
    assert_eq!(by_name.total, 4);

    let invalid = s.list_submission_rows(&ListQuery::from_raw(None, None, Some("nope"), Some("desc")));
    let ids: Vec<u64> = invalid.items.iter().map(|r| r.id.0).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);

    let beyond = s.list_submission_rows(&ListQuery::from_raw(Some(50), None, None, None));
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.total, 4);
}

#[test]
fn at_ledger_db_08_bulk_delete_ignores_unknown_ids() {
    let mut s = IntakeStore::new_in_memory();
    for i in 0..3 {
        s.insert_submission_row(
            input("N", &format!("u{i}@x.com"), &format!("05000000{i:02}")),
            "Dubai".into(),
            receipt('a'),
            t(i),
            both_unique(),
        )
        .unwrap();
    }
    let ids: BTreeSet<SubmissionId> = [SubmissionId(1), SubmissionId(3), SubmissionId(99)]
        .into_iter()
        .collect();
    assert_eq!(s.delete_submission_rows(&ids), 2);
    assert_eq!(s.submission_ids(), vec![SubmissionId(2)]);
    assert!(matches!(
        s.delete_submission_row(SubmissionId(99)),
        Err(StorageError::NotFound { .. })
    ));
}

#[test]
fn at_ledger_db_09_restore_preserves_ids_and_advances_counter() {
    let mut source = IntakeStore::new_in_memory();
    let a = source
        .insert_submission_row(input("A", "a@x.com", "0501111111"), "Dubai".into(), receipt('a'), t(0), both_unique())
        .unwrap();

    let mut replica = IntakeStore::new_in_memory();
    let mut restored = a.clone();
    restored.id = SubmissionId(7);
    replica.restore_submission_row(restored.clone()).unwrap();
    assert!(matches!(
        replica.restore_submission_row(restored),
        Err(StorageError::DuplicateKey { .. })
    ));

    let next = replica
        .insert_submission_row(input("B", "b@x.com", "0502222222"), "Dubai".into(), receipt('b'), t(1), both_unique())
        .unwrap();
    assert_eq!(next.id, SubmissionId(8));
    assert_eq!(replica.submission_row(SubmissionId(7)).map(|r| r.name.as_str()), Some("A"));
}

#[test]
fn at_ledger_db_10_rewind_restores_id_counter_and_clock() {
    let mut s = IntakeStore::new_in_memory();
    s.insert_submission_row(input("A", "a@x.com", "0501111111"), "Dubai".into(), receipt('a'), t(5), both_unique())
        .unwrap();

    let cursor = s.insert_cursor();
    let b = s
        .insert_submission_row(input("B", "b@x.com", "0502222222"), "Dubai".into(), receipt('b'), t(30), both_unique())
        .unwrap();
    s.rewind_insert(b.id, cursor).unwrap();
    assert_eq!(s.insert_cursor(), cursor);
    assert_eq!(s.submission_count(), 1);

    // Same id reused, the clock no longer clamps to the rolled-back row, and
    // its unique keys are free again.
    let c = s
        .insert_submission_row(input("B", "b@x.com", "0502222222"), "Dubai".into(), receipt('b'), t(10), both_unique())
        .unwrap();
    assert_eq!(c.id, b.id);
    assert_eq!(c.submitted_at, t(10));
    assert_eq!(s.submission_ids_by_receipt_hash(&hash('b')), vec![c.id]);

    assert!(matches!(
        s.rewind_insert(SubmissionId(99), cursor),
        Err(StorageError::NotFound { .. })
    ));
}
