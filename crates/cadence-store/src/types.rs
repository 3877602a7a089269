use cadence_core::tracking::{SendMode, SendStatus};
use cadence_core::{BatchId, OrgId};
use chrono::{DateTime, NaiveDate, Utc};

/// Filter applied by `TrackingStore::list_batches` (§6).
#[derive(Debug, Clone, Default)]
pub struct BatchFilter {
    pub org_id: Option<OrgId>,
    pub send_mode: Option<SendMode>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

/// Aggregate counts for one batch, bucketed by `send_status` (§4.5's
/// `getBatch`: `{total, pending, sent, failed, deferred, bounced, dropped,
/// skipped}` plus `send_mode`). `sent` covers the unambiguous-success
/// statuses (`sent`/`delivered`/`accepted`); `deferred`/`bounced`/`dropped`
/// are reported in their own buckets rather than folded into `sent`, so an
/// operator can see a problematic delivery-status outcome independently of
/// a clean send. `send_mode` assumes every row in a batch shares one mode,
/// the same assumption already made for `org_id`.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub batch_id: BatchId,
    pub org_id: OrgId,
    pub send_mode: SendMode,
    pub total: i64,
    pub pending: i64,
    pub processing: i64,
    pub sent: i64,
    pub deferred: i64,
    pub bounced: i64,
    pub dropped: i64,
    pub failed: i64,
    pub skipped: i64,
    pub created_at: DateTime<Utc>,
}

impl BatchSummary {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.pending == 0 && self.processing == 0
    }
}

/// The result of attempting delivery of one tracking row, reported back to
/// the store by `finalize` (§4.5, §4.6).
#[derive(Debug, Clone)]
pub struct Outcome {
    pub send_status: SendStatus,
    pub external_message_id: Option<String>,
    pub error: Option<String>,
    /// The fixed test address actually used, when this row was sent in
    /// `test` mode (§4.6).
    pub test_email: Option<String>,
}

impl Outcome {
    #[must_use]
    pub fn sent(external_message_id: impl Into<String>) -> Self {
        Self {
            send_status: SendStatus::Sent,
            external_message_id: Some(external_message_id.into()),
            error: None,
            test_email: None,
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            send_status: SendStatus::Failed,
            external_message_id: None,
            error: Some(error.into()),
            test_email: None,
        }
    }

    #[must_use]
    pub fn with_test_email(mut self, test_email: impl Into<String>) -> Self {
        self.test_email = Some(test_email.into());
        self
    }

    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            send_status: SendStatus::Skipped,
            external_message_id: None,
            error: Some(reason.into()),
            test_email: None,
        }
    }
}

/// A delivery-status update applied to an already-terminal row (§4.6's
/// `updateDeliveryStatus`, a supplemented operation — see SPEC_FULL.md §10.6).
#[derive(Debug, Clone)]
pub struct DeliveryStatusUpdate {
    pub delivery_status: String,
    pub status_details: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl DeliveryStatusUpdate {
    /// The `send_status` this update should transition the row to, per
    /// §4.5's `sent -> {delivered | deferred | bounced | dropped}`
    /// status-update path. `None` when the gateway reported something that
    /// isn't one of those four terminal outcomes (e.g. `"unknown"`), in
    /// which case `send_status` is left unchanged.
    #[must_use]
    pub fn terminal_send_status(&self) -> Option<SendStatus> {
        match self.delivery_status.parse::<SendStatus>() {
            Ok(
                status @ (SendStatus::Delivered
                | SendStatus::Deferred
                | SendStatus::Bounced
                | SendStatus::Dropped),
            ) => Some(status),
            _ => None,
        }
    }
}

/// Narrows `claim_chunk` to rows due on or before a given scheduled date,
/// letting callers implement the today/next-N-days/bulk scopes of §6
/// without the store needing to know about them.
#[derive(Debug, Clone, Copy)]
pub struct ClaimScope {
    pub not_after: NaiveDate,
}
