//! Round-trip and invariant coverage for `TrackingStore` against the
//! in-memory reference implementation (§4.5, §6).

use std::sync::Arc;

use cadence_core::tracking::{SendMode, TrackingRow};
use cadence_core::{BatchId, ContactId, IntentKind, OrgId};
use cadence_store::types::{ClaimScope, Outcome};
use cadence_store::{InMemoryTrackingStore, StoreError, TrackingStore};
use chrono::{NaiveDate, Utc};

fn row(contact_id: &str, kind: IntentKind, date: NaiveDate, batch: &BatchId) -> TrackingRow {
    TrackingRow::new_pending(
        OrgId::new(1),
        ContactId::from(contact_id),
        kind,
        date,
        SendMode::Test,
        batch.clone(),
        Utc::now(),
    )
}

#[tokio::test]
async fn insert_then_get_batch_round_trips_every_row() {
    let store = InMemoryTrackingStore::new();
    let batch = BatchId::new("b-round-trip");
    let rows = vec![
        row("c-1", IntentKind::Birthday, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(), &batch),
        row("c-2", IntentKind::Aep, NaiveDate::from_ymd_opt(2024, 8, 18).unwrap(), &batch),
        row("c-3", IntentKind::PostWindow, NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(), &batch),
    ];

    let inserted_batch_id = store.insert_batch(rows).await.unwrap();
    assert_eq!(inserted_batch_id, batch);

    let summary = store.get_batch(&batch).await.unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.pending, 3);
    assert_eq!(summary.sent, 0);
    assert!(!summary.is_complete());
}

#[tokio::test]
async fn duplicate_composite_key_within_one_insert_is_rejected() {
    let store = InMemoryTrackingStore::new();
    let batch = BatchId::new("b-dup-same-call");
    let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let rows = vec![
        row("c-1", IntentKind::Birthday, date, &batch),
        row("c-1", IntentKind::Birthday, date, &batch),
    ];

    let err = store.insert_batch(rows).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateRow { .. }));

    // The whole batch failed: nothing was persisted.
    assert!(matches!(store.get_batch(&batch).await, Err(StoreError::BatchNotFound(_))));
}

#[tokio::test]
async fn duplicate_composite_key_against_an_existing_row_is_rejected() {
    let store = InMemoryTrackingStore::new();
    let batch = BatchId::new("b-dup-existing");
    let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

    store.insert_batch(vec![row("c-1", IntentKind::Birthday, date, &batch)]).await.unwrap();

    let err = store
        .insert_batch(vec![row("c-1", IntentKind::Birthday, date, &batch)])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateRow { .. }));
}

#[tokio::test]
async fn distinct_contacts_or_kinds_or_dates_do_not_collide() {
    let store = InMemoryTrackingStore::new();
    let batch = BatchId::new("b-no-collision");
    let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let rows = vec![
        row("c-1", IntentKind::Birthday, date, &batch),
        row("c-2", IntentKind::Birthday, date, &batch),
        row("c-1", IntentKind::Aep, date, &batch),
        row("c-1", IntentKind::Birthday, date.succ_opt().unwrap(), &batch),
    ];

    store.insert_batch(rows).await.unwrap();
    let summary = store.get_batch(&batch).await.unwrap();
    assert_eq!(summary.total, 4);
}

#[tokio::test]
async fn concurrent_claims_never_return_overlapping_rows() {
    let store = Arc::new(InMemoryTrackingStore::new());
    let batch = BatchId::new("b-concurrent");
    let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let rows: Vec<TrackingRow> = (0..20)
        .map(|i| row(&format!("c-{i}"), IntentKind::Birthday, date, &batch))
        .collect();
    store.insert_batch(rows).await.unwrap();

    let scope = ClaimScope { not_after: date };
    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = store.clone();
        let batch = batch.clone();
        handles.push(tokio::spawn(async move { store.claim_chunk(&batch, scope, 5).await.unwrap() }));
    }

    let mut claimed_ids = Vec::new();
    for handle in handles {
        let claimed = handle.await.unwrap();
        for claimed_row in claimed {
            claimed_ids.push(claimed_row.id.expect("claimed row must have an id"));
        }
    }

    claimed_ids.sort_unstable();
    let unique_count = {
        let mut ids = claimed_ids.clone();
        ids.dedup();
        ids.len()
    };
    assert_eq!(claimed_ids.len(), 20, "every row should have been claimed exactly once across all callers");
    assert_eq!(unique_count, claimed_ids.len(), "no row id was claimed by more than one caller");
}

#[tokio::test]
async fn finalize_then_mark_failed_as_retryable_cycles_a_row_back_to_pending() {
    let store = InMemoryTrackingStore::new();
    let batch = BatchId::new("b-retry-cycle");
    let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    store.insert_batch(vec![row("c-1", IntentKind::Birthday, date, &batch)]).await.unwrap();

    let scope = ClaimScope { not_after: date };
    let claimed = store.claim_chunk(&batch, scope, 10).await.unwrap();
    assert_eq!(claimed.len(), 1);
    let row_id = claimed[0].id.unwrap();

    store.finalize(row_id, Outcome::failed("smtp timeout")).await.unwrap();
    let summary = store.get_batch(&batch).await.unwrap();
    assert_eq!(summary.failed, 1);

    let transitioned = store.mark_failed_as_retryable(&batch, 10, cadence_store::DEFAULT_MAX_ATTEMPTS).await.unwrap();
    assert_eq!(transitioned, 1);

    let summary = store.get_batch(&batch).await.unwrap();
    assert_eq!(summary.pending, 1);
    assert_eq!(summary.failed, 0);

    let reclaimed = store.claim_chunk(&batch, scope, 10).await.unwrap();
    assert_eq!(reclaimed.len(), 1);
    assert_eq!(reclaimed[0].send_attempt_count, 1);
}
