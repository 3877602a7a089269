use thiserror::Error;

use cadence_core::tracking::SendStatus;

/// Errors raised by a [`crate::TrackingStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("tracking row {0} not found")]
    RowNotFound(i64),

    #[error("batch {0} not found")]
    BatchNotFound(String),

    #[error("invalid state transition for row {row_id}: {from} -> {to}")]
    InvalidTransition {
        row_id: i64,
        from: SendStatus,
        to: SendStatus,
    },

    #[error(
        "duplicate tracking row in batch {batch_id}: contact={contact_id} kind={kind} scheduled_date={scheduled_date}"
    )]
    DuplicateRow {
        batch_id: String,
        contact_id: String,
        kind: String,
        scheduled_date: chrono::NaiveDate,
    },

    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Callers may retry the surrounding operation (not the same as a
    /// `TrackingRow`'s own `send_status` retry path) when this is `true`.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}
