//! An in-process [`TrackingStore`] used by integration tests and by the CLI's
//! `--dry-run` path. Never used against production traffic.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use cadence_core::intent::IntentKind;
use cadence_core::tracking::{SendStatus, TrackingRow};
use cadence_core::{BatchId, ContactId};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::StoreError;
use crate::store::TrackingStore;
use crate::types::{BatchFilter, BatchSummary, ClaimScope, DeliveryStatusUpdate, Outcome};

#[derive(Debug, Default)]
struct Inner {
    rows: HashMap<i64, TrackingRow>,
    next_id: i64,
}

/// A `Mutex`-guarded `HashMap` standing in for a real database. Every
/// operation takes the whole-store lock; this is intentionally simple and
/// not meant to model realistic contention, only the store's transition
/// semantics.
#[derive(Debug, Default)]
pub struct InMemoryTrackingStore {
    inner: Mutex<Inner>,
}

impl InMemoryTrackingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrackingStore for InMemoryTrackingStore {
    async fn insert_batch(&self, rows: Vec<TrackingRow>) -> Result<BatchId, StoreError> {
        let mut inner = self.inner.lock().expect("tracking store mutex poisoned");
        let batch_id = rows
            .first()
            .map(|r| r.batch_id.clone())
            .ok_or_else(|| StoreError::Backend("cannot insert an empty batch".into()))?;

        let mut seen: std::collections::HashSet<(BatchId, ContactId, IntentKind, chrono::NaiveDate)> = inner
            .rows
            .values()
            .map(|r| (r.batch_id.clone(), r.contact_id.clone(), r.kind, r.scheduled_date))
            .collect();

        for row in &rows {
            let key = (row.batch_id.clone(), row.contact_id.clone(), row.kind, row.scheduled_date);
            if !seen.insert(key) {
                return Err(StoreError::DuplicateRow {
                    batch_id: row.batch_id.to_string(),
                    contact_id: row.contact_id.to_string(),
                    kind: row.kind.to_string(),
                    scheduled_date: row.scheduled_date,
                });
            }
        }

        for mut row in rows {
            inner.next_id += 1;
            row.id = Some(inner.next_id);
            debug!(row_id = inner.next_id, batch_id = %row.batch_id, "inserted tracking row");
            inner.rows.insert(inner.next_id, row);
        }

        Ok(batch_id)
    }

    async fn list_batches(&self, filter: BatchFilter) -> Result<Vec<BatchSummary>, StoreError> {
        let inner = self.inner.lock().expect("tracking store mutex poisoned");
        let mut by_batch: HashMap<String, Vec<&TrackingRow>> = HashMap::new();
        for row in inner.rows.values() {
            if let Some(org_id) = filter.org_id {
                if row.org_id != org_id {
                    continue;
                }
            }
            if let Some(send_mode) = filter.send_mode {
                if row.send_mode != send_mode {
                    continue;
                }
            }
            if let Some(after) = filter.created_after {
                if row.created_at < after {
                    continue;
                }
            }
            if let Some(before) = filter.created_before {
                if row.created_at > before {
                    continue;
                }
            }
            by_batch.entry(row.batch_id.as_str().to_owned()).or_default().push(row);
        }

        let mut summaries: Vec<_> = by_batch
            .into_iter()
            .map(|(batch_id, rows)| summarize(BatchId::new(batch_id), &rows))
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    async fn get_batch(&self, batch_id: &BatchId) -> Result<BatchSummary, StoreError> {
        let inner = self.inner.lock().expect("tracking store mutex poisoned");
        let rows: Vec<_> = inner
            .rows
            .values()
            .filter(|r| &r.batch_id == batch_id)
            .collect();
        if rows.is_empty() {
            return Err(StoreError::BatchNotFound(batch_id.to_string()));
        }
        Ok(summarize(batch_id.clone(), &rows))
    }

    async fn claim_chunk(
        &self,
        batch_id: &BatchId,
        scope: ClaimScope,
        limit: usize,
    ) -> Result<Vec<TrackingRow>, StoreError> {
        let mut inner = self.inner.lock().expect("tracking store mutex poisoned");
        let mut claimed_ids = Vec::new();

        for (id, row) in inner.rows.iter() {
            if claimed_ids.len() >= limit {
                break;
            }
            if &row.batch_id == batch_id
                && row.send_status == SendStatus::Pending
                && row.scheduled_date <= scope.not_after
            {
                claimed_ids.push(*id);
            }
        }
        claimed_ids.sort_unstable();

        let now = Utc::now();
        let mut claimed = Vec::with_capacity(claimed_ids.len());
        for id in claimed_ids {
            let row = inner.rows.get_mut(&id).expect("claimed id must exist");
            row.send_status = SendStatus::Processing;
            row.updated_at = now;
            claimed.push(row.clone());
        }
        Ok(claimed)
    }

    async fn finalize(&self, row_id: i64, outcome: Outcome) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("tracking store mutex poisoned");
        let row = inner
            .rows
            .get_mut(&row_id)
            .ok_or(StoreError::RowNotFound(row_id))?;

        if row.send_status != SendStatus::Processing {
            return Err(StoreError::InvalidTransition {
                row_id,
                from: row.send_status,
                to: outcome.send_status,
            });
        }

        row.send_status = outcome.send_status;
        row.send_attempt_count += 1;
        row.last_attempt_time = Some(Utc::now());
        row.last_error = outcome.error;
        row.external_message_id = outcome.external_message_id;
        if outcome.test_email.is_some() {
            row.test_email = outcome.test_email;
        }
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_failed_as_retryable(
        &self,
        batch_id: &BatchId,
        n: usize,
        max_attempts: i32,
    ) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock().expect("tracking store mutex poisoned");
        let mut eligible_ids: Vec<i64> = inner
            .rows
            .iter()
            .filter(|(_, row)| {
                &row.batch_id == batch_id
                    && row.send_status == SendStatus::Failed
                    && row.send_attempt_count < max_attempts
            })
            .map(|(id, _)| *id)
            .collect();
        eligible_ids.sort_unstable();
        eligible_ids.truncate(n);

        let now = Utc::now();
        for id in &eligible_ids {
            let row = inner.rows.get_mut(id).expect("eligible id must exist");
            row.send_status = SendStatus::Pending;
            row.updated_at = now;
        }
        Ok(eligible_ids.len())
    }

    async fn update_delivery_status(
        &self,
        row_id: i64,
        update: DeliveryStatusUpdate,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("tracking store mutex poisoned");
        let terminal_status = update.terminal_send_status();
        let row = inner
            .rows
            .get_mut(&row_id)
            .ok_or(StoreError::RowNotFound(row_id))?;
        if let Some(status) = terminal_status {
            row.send_status = status;
        }
        row.delivery_status = Some(update.delivery_status);
        row.status_details = update.status_details;
        row.status_checked_at = Some(update.checked_at);
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn list_stale_for_status_check(
        &self,
        batch_id: &BatchId,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<TrackingRow>, StoreError> {
        let inner = self.inner.lock().expect("tracking store mutex poisoned");
        let mut rows: Vec<_> = inner
            .rows
            .values()
            .filter(|r| {
                &r.batch_id == batch_id
                    && matches!(r.send_status, SendStatus::Sent | SendStatus::Deferred)
                    && match r.status_checked_at {
                        Some(checked) => checked < stale_before,
                        None => true,
                    }
            })
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }
}

fn summarize(batch_id: BatchId, rows: &[&TrackingRow]) -> BatchSummary {
    let org_id = rows[0].org_id;
    let send_mode = rows[0].send_mode;
    let created_at = rows.iter().map(|r| r.created_at).min().unwrap_or_else(Utc::now);

    let mut summary = BatchSummary {
        batch_id,
        org_id,
        send_mode,
        total: rows.len() as i64,
        pending: 0,
        processing: 0,
        sent: 0,
        deferred: 0,
        bounced: 0,
        dropped: 0,
        failed: 0,
        skipped: 0,
        created_at,
    };

    for row in rows {
        match row.send_status {
            SendStatus::Pending => summary.pending += 1,
            SendStatus::Processing => summary.processing += 1,
            SendStatus::Failed => summary.failed += 1,
            SendStatus::Skipped => summary.skipped += 1,
            SendStatus::Deferred => summary.deferred += 1,
            SendStatus::Bounced => summary.bounced += 1,
            SendStatus::Dropped => summary.dropped += 1,
            SendStatus::Sent | SendStatus::Delivered | SendStatus::Accepted => summary.sent += 1,
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::intent::IntentKind;
    use cadence_core::tracking::SendMode;
    use cadence_core::{ContactId, OrgId};
    use chrono::NaiveDate;

    fn row(batch: &str, status: SendStatus) -> TrackingRow {
        row_for(batch, "c-1", status)
    }

    fn row_for(batch: &str, contact_id: &str, status: SendStatus) -> TrackingRow {
        let mut row = TrackingRow::new_pending(
            OrgId::new(1),
            ContactId::from(contact_id),
            IntentKind::Birthday,
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            SendMode::Production,
            BatchId::new(batch),
            Utc::now(),
        );
        row.send_status = status;
        row
    }

    #[tokio::test]
    async fn insert_then_claim_transitions_to_processing() {
        let store = InMemoryTrackingStore::new();
        let batch_id = store
            .insert_batch(vec![row("b1", SendStatus::Pending)])
            .await
            .unwrap();

        let claimed = store
            .claim_chunk(
                &batch_id,
                ClaimScope {
                    not_after: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
                },
                10,
            )
            .await
            .unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].send_status, SendStatus::Processing);
    }

    #[tokio::test]
    async fn finalize_rejects_non_processing_row() {
        let store = InMemoryTrackingStore::new();
        let batch_id = store
            .insert_batch(vec![row("b1", SendStatus::Pending)])
            .await
            .unwrap();
        let summary = store.get_batch(&batch_id).await.unwrap();
        assert_eq!(summary.pending, 1);

        let result = store.finalize(1, Outcome::sent("mid-1")).await;
        assert!(matches!(result, Err(StoreError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn failed_rows_become_retryable() {
        let store = InMemoryTrackingStore::new();
        let batch_id = store
            .insert_batch(vec![row("b1", SendStatus::Failed)])
            .await
            .unwrap();
        let retried = store.mark_failed_as_retryable(&batch_id, 10, 5).await.unwrap();
        assert_eq!(retried, 1);
        let summary = store.get_batch(&batch_id).await.unwrap();
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn mark_failed_as_retryable_respects_limit_and_attempt_cap() {
        let store = InMemoryTrackingStore::new();
        let mut exhausted = row_for("b1", "c-4", SendStatus::Failed);
        exhausted.send_attempt_count = 5;
        let batch_id = store
            .insert_batch(vec![
                row_for("b1", "c-1", SendStatus::Failed),
                row_for("b1", "c-2", SendStatus::Failed),
                row_for("b1", "c-3", SendStatus::Failed),
                exhausted,
            ])
            .await
            .unwrap();

        // Only 2 of the 3 attempt-eligible failed rows are retried (limit n=2);
        // the row at max_attempts=5 is never eligible regardless of n.
        let retried = store.mark_failed_as_retryable(&batch_id, 2, 5).await.unwrap();
        assert_eq!(retried, 2);
        let summary = store.get_batch(&batch_id).await.unwrap();
        assert_eq!(summary.pending, 2);
        assert_eq!(summary.failed, 2);
    }

    #[tokio::test]
    async fn stale_sent_rows_are_listed_for_status_check() {
        let store = InMemoryTrackingStore::new();
        let batch_id = store
            .insert_batch(vec![row_for("b1", "c-1", SendStatus::Sent), row_for("b1", "c-2", SendStatus::Pending)])
            .await
            .unwrap();

        let stale = store
            .list_stale_for_status_check(&batch_id, Utc::now())
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].send_status, SendStatus::Sent);
    }

    #[tokio::test]
    async fn delivery_status_update_moves_send_status_to_reported_terminal_outcome() {
        let store = InMemoryTrackingStore::new();
        let batch_id = store
            .insert_batch(vec![row_for("b1", "c-1", SendStatus::Sent)])
            .await
            .unwrap();

        store
            .update_delivery_status(
                1,
                DeliveryStatusUpdate {
                    delivery_status: "bounced".into(),
                    status_details: Some("mailbox full".into()),
                    checked_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        let summary = store.get_batch(&batch_id).await.unwrap();
        assert_eq!(summary.sent, 0);
        assert_eq!(summary.bounced, 1);
    }

    #[tokio::test]
    async fn delivery_status_update_with_unknown_outcome_leaves_send_status_unchanged() {
        let store = InMemoryTrackingStore::new();
        let batch_id = store
            .insert_batch(vec![row_for("b1", "c-1", SendStatus::Sent)])
            .await
            .unwrap();

        store
            .update_delivery_status(
                1,
                DeliveryStatusUpdate {
                    delivery_status: "unknown".into(),
                    status_details: None,
                    checked_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        let summary = store.get_batch(&batch_id).await.unwrap();
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.bounced, 0);
    }
}
