use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::ContactId;

/// Kind of message an [`Intent`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Birthday,
    EffectiveDate,
    Aep,
    PostWindow,
}

impl IntentKind {
    /// Sort priority used for the tie-break of §4.3 Step 5: Birthday <
    /// EffectiveDate < Aep < PostWindow.
    #[must_use]
    pub fn priority(self) -> u8 {
        match self {
            Self::Birthday => 0,
            Self::EffectiveDate => 1,
            Self::Aep => 2,
            Self::PostWindow => 3,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Birthday => "birthday",
            Self::EffectiveDate => "effective_date",
            Self::Aep => "aep",
            Self::PostWindow => "post_window",
        }
    }
}

impl std::fmt::Display for IntentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IntentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "birthday" => Self::Birthday,
            "effective_date" => Self::EffectiveDate,
            "aep" => Self::Aep,
            "post_window" => Self::PostWindow,
            other => return Err(format!("unknown intent kind: {other}")),
        })
    }
}

/// Whether an [`Intent`] survived exclusion-window filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IntentStatus {
    Scheduled,
    Skipped { reason: String },
}

/// A candidate message produced by the scheduling engine for one contact.
///
/// Transient: owned by whoever requested scheduling. Never persisted as-is —
/// a `Scheduled` intent becomes a `TrackingRow` when inserted into a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub contact_id: ContactId,
    pub kind: IntentKind,
    pub target_date: NaiveDate,
    /// The rule-free anniversary date, present only for `Birthday` and
    /// `EffectiveDate` kinds (where `target_date` is offset by a lead time).
    pub default_date: Option<NaiveDate>,
    pub status: IntentStatus,
    /// Optional tracking link, populated once a `TrackingRow` exists.
    pub tracking_link: Option<String>,
}

impl Intent {
    #[must_use]
    pub fn scheduled(
        contact_id: ContactId,
        kind: IntentKind,
        target_date: NaiveDate,
        default_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            contact_id,
            kind,
            target_date,
            default_date,
            status: IntentStatus::Scheduled,
            tracking_link: None,
        }
    }

    #[must_use]
    pub fn skipped(
        contact_id: ContactId,
        kind: IntentKind,
        target_date: NaiveDate,
        default_date: Option<NaiveDate>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            contact_id,
            kind,
            target_date,
            default_date,
            status: IntentStatus::Skipped {
                reason: reason.into(),
            },
            tracking_link: None,
        }
    }

    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        matches!(self.status, IntentStatus::Scheduled)
    }

    /// Ordering key for §4.3 Step 5: `(target_date, kind priority,
    /// contact_id)`.
    #[must_use]
    pub fn sort_key(&self) -> (NaiveDate, u8, &str) {
        (self.target_date, self.kind.priority(), self.contact_id.as_str())
    }
}
