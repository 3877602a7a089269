use async_trait::async_trait;
use cadence_core::tracking::TrackingRow;
use cadence_core::BatchId;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::types::{BatchFilter, BatchSummary, ClaimScope, DeliveryStatusUpdate, Outcome};

/// Default `max_attempts` for `TrackingStore::mark_failed_as_retryable`
/// (§4.5): a row that has already failed this many times stays `failed`
/// rather than retrying forever.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;

/// Persists and transitions `TrackingRow`s through their delivery lifecycle
/// (§4.5). Implementations must enforce the monotone state machine: once a
/// row reaches a terminal status it may only move via the explicit
/// `failed -> pending` retry path.
#[async_trait]
pub trait TrackingStore: Send + Sync {
    /// Inserts every row of a freshly-scheduled batch. All rows must share
    /// the same `batch_id`; returns that id once persisted. Enforces the
    /// `(batch_id, contact_id, kind, scheduled_date)` uniqueness invariant
    /// (§4.5): any row colliding with another row already in the store, or
    /// with another row in the same call, fails the whole insert with
    /// [`StoreError::DuplicateRow`] and persists nothing.
    async fn insert_batch(&self, rows: Vec<TrackingRow>) -> Result<BatchId, StoreError>;

    /// Lists batch-level summaries matching `filter`, most recent first.
    async fn list_batches(&self, filter: BatchFilter) -> Result<Vec<BatchSummary>, StoreError>;

    /// Fetches the aggregate summary for one batch.
    async fn get_batch(&self, batch_id: &BatchId) -> Result<BatchSummary, StoreError>;

    /// Atomically claims up to `limit` `pending` rows from `batch_id` whose
    /// `scheduled_date` falls within `scope`, transitioning them to
    /// `processing` and returning the claimed rows. Two concurrent callers
    /// claiming from the same batch must never receive overlapping rows.
    async fn claim_chunk(
        &self,
        batch_id: &BatchId,
        scope: ClaimScope,
        limit: usize,
    ) -> Result<Vec<TrackingRow>, StoreError>;

    /// Records the outcome of attempting delivery for one row, transitioning
    /// it from `processing` to a terminal status and incrementing its
    /// attempt count.
    async fn finalize(&self, row_id: i64, outcome: Outcome) -> Result<(), StoreError>;

    /// Moves up to `n` `failed` rows of `batch_id` whose `send_attempt_count`
    /// is still below `max_attempts` back to `pending`, so a subsequent
    /// `claim_chunk` picks them up again (§4.5's `markFailedAsRetryable(batch-id,
    /// n)`). Rows that have exhausted `max_attempts` are left `failed`.
    /// Returns the number of rows transitioned.
    async fn mark_failed_as_retryable(
        &self,
        batch_id: &BatchId,
        n: usize,
        max_attempts: i32,
    ) -> Result<usize, StoreError>;

    /// Applies a delivery-status update to an already-terminal row (§10.6's
    /// `updateDeliveryStatus`). When the reported status is one of
    /// `delivered`/`deferred`/`bounced`/`dropped`
    /// ([`DeliveryStatusUpdate::terminal_send_status`]), `send_status` is
    /// moved onto it per §4.5's `sent -> {delivered | deferred | bounced |
    /// dropped}` transition; otherwise `send_status` is left unchanged.
    async fn update_delivery_status(
        &self,
        row_id: i64,
        update: DeliveryStatusUpdate,
    ) -> Result<(), StoreError>;

    /// Lists rows of `batch_id` with `send_status` in {sent, deferred} whose
    /// `status_checked_at` is absent or older than `stale_before`, the
    /// candidate set for `updateDeliveryStatus`'s polling pass (§4.6).
    async fn list_stale_for_status_check(
        &self,
        batch_id: &BatchId,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<TrackingRow>, StoreError>;
}
