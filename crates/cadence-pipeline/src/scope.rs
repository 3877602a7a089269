use cadence_core::intent::IntentKind;
use cadence_core::Intent;
use chrono::NaiveDate;

/// A caller-selected subset of a contact's scheduled intents to actually
/// turn into tracking rows (§4.6's scope selection), applied to `Scheduled`
/// intents before `insertBatch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// No windowing: every `Scheduled` intent in the computed window.
    All,
    Today,
    Next7Days,
    Next30Days,
    Next90Days,
    /// One message of `kind` per contact, regardless of its scheduled date.
    Bulk { kind: IntentKind },
}

impl Scope {
    /// Filters `intents` (already-Scheduled ones only; Skipped intents are
    /// always dropped) down to this scope, relative to `today`.
    #[must_use]
    pub fn filter(self, intents: Vec<Intent>, today: NaiveDate) -> Vec<Intent> {
        let scheduled = intents.into_iter().filter(Intent::is_scheduled);
        match self {
            Self::All => scheduled.collect(),
            Self::Today => scheduled.filter(|i| i.target_date == today).collect(),
            Self::Next7Days => bounded(scheduled, today, 7),
            Self::Next30Days => bounded(scheduled, today, 30),
            Self::Next90Days => bounded(scheduled, today, 90),
            Self::Bulk { kind } => scheduled.filter(|i| i.kind == kind).collect(),
        }
    }
}

fn bounded(
    scheduled: impl Iterator<Item = Intent>,
    today: NaiveDate,
    days: i64,
) -> Vec<Intent> {
    let end = today + chrono::Duration::days(days);
    scheduled
        .filter(|i| i.target_date >= today && i.target_date <= end)
        .collect()
}
