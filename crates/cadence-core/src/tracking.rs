use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::intent::IntentKind;
use crate::types::{BatchId, ContactId, OrgId};

/// Lifecycle status of a persisted [`TrackingRow`].
///
/// Transitions are monotone except for the explicit `failed -> pending`
/// retry path (§4.5); see `cadence-store::TrackingStore` for the enforcing
/// implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    Pending,
    Processing,
    Accepted,
    Delivered,
    Sent,
    Deferred,
    Bounced,
    Dropped,
    Failed,
    Skipped,
}

impl SendStatus {
    /// A row in one of these statuses will not be claimed, finalized, or
    /// retried again except via the explicit retry operation.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Sent
                | Self::Delivered
                | Self::Bounced
                | Self::Dropped
                | Self::Skipped
                | Self::Failed
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Accepted => "accepted",
            Self::Delivered => "delivered",
            Self::Sent => "sent",
            Self::Deferred => "deferred",
            Self::Bounced => "bounced",
            Self::Dropped => "dropped",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for SendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SendStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => Self::Pending,
            "processing" => Self::Processing,
            "accepted" => Self::Accepted,
            "delivered" => Self::Delivered,
            "sent" => Self::Sent,
            "deferred" => Self::Deferred,
            "bounced" => Self::Bounced,
            "dropped" => Self::Dropped,
            "failed" => Self::Failed,
            "skipped" => Self::Skipped,
            other => return Err(format!("unknown send_status: {other}")),
        })
    }
}

/// Whether a [`TrackingRow`] sends to a fixed test address or the contact's
/// own address (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendMode {
    Test,
    Production,
}

impl SendMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Production => "production",
        }
    }
}

impl std::fmt::Display for SendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "test" => Ok(Self::Test),
            "production" => Ok(Self::Production),
            other => Err(format!("unknown send_mode: {other}")),
        }
    }
}

/// Persisted state of a scheduled intent progressing through delivery.
///
/// Maps directly onto the `email_send_tracking` table of §6. `id` is `None`
/// for a row not yet assigned one by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingRow {
    pub id: Option<i64>,
    pub org_id: OrgId,
    pub contact_id: ContactId,
    pub kind: IntentKind,
    pub scheduled_date: NaiveDate,
    pub send_status: SendStatus,
    pub send_mode: SendMode,
    pub test_email: Option<String>,
    pub send_attempt_count: i32,
    pub last_attempt_time: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub batch_id: BatchId,
    pub external_message_id: Option<String>,
    pub delivery_status: Option<String>,
    pub status_checked_at: Option<DateTime<Utc>>,
    pub status_details: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrackingRow {
    /// Builds a fresh, unsaved row for a newly-scheduled intent. `created_at`
    /// / `updated_at` are stamped by the store on insert.
    #[must_use]
    pub fn new_pending(
        org_id: OrgId,
        contact_id: ContactId,
        kind: IntentKind,
        scheduled_date: NaiveDate,
        send_mode: SendMode,
        batch_id: BatchId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            org_id,
            contact_id,
            kind,
            scheduled_date,
            send_status: SendStatus::Pending,
            send_mode,
            test_email: None,
            send_attempt_count: 0,
            last_attempt_time: None,
            last_error: None,
            batch_id,
            external_message_id: None,
            delivery_status: None,
            status_checked_at: None,
            status_details: None,
            created_at: now,
            updated_at: now,
        }
    }
}
