use std::sync::Arc;

use cadence_core::{Contact, Intent};
use cadence_rules::{ContactRuleEngine, RuleConfig};
use chrono::NaiveDate;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::engine::SchedulingEngine;
use crate::error::SchedulerError;

/// Bounds how many contacts are scheduled concurrently. Defaults to 16,
/// matching the concurrency budget named in §5 for the async batch
/// processor share of the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    pub max_concurrent: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_concurrent: 16 }
    }
}

/// Per-contact scheduling outcome, keyed so callers can reassemble results
/// deterministically regardless of completion order.
#[derive(Debug, Clone)]
pub struct ContactScheduleResult {
    pub contact_id: String,
    pub scheduled: Vec<Intent>,
    pub skipped: Vec<Intent>,
}

/// Runs [`SchedulingEngine::schedule`] across many contacts under a bounded
/// concurrency semaphore, then gathers results sorted by contact id so that
/// two runs over the same input always produce the same ordering
/// regardless of task scheduling (§5).
#[derive(Debug, Clone)]
pub struct AsyncBatchProcessor {
    config: BatchConfig,
}

impl AsyncBatchProcessor {
    #[must_use]
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    /// Schedules every contact, fanned out under `self.config.max_concurrent`.
    /// `cancellation` is checked before each per-contact task starts its work
    /// (§4.4): once cancelled, outstanding tasks skip their work, remaining
    /// contacts are never spawned, and the whole call returns an empty
    /// result set rather than a partial one.
    #[instrument(skip(self, contacts, rule_config, cancellation), fields(contact_count = contacts.len()))]
    pub async fn schedule_all(
        &self,
        contacts: Vec<Contact>,
        rule_config: Arc<RuleConfig>,
        window_start: NaiveDate,
        window_end: NaiveDate,
        cancellation: CancellationToken,
    ) -> Vec<Result<ContactScheduleResult, SchedulerError>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));
        let mut tasks = JoinSet::new();

        for contact in contacts {
            if cancellation.is_cancelled() {
                break;
            }
            let semaphore = Arc::clone(&semaphore);
            let rule_config = Arc::clone(&rule_config);
            let cancellation = cancellation.clone();

            tasks.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    () = cancellation.cancelled() => return Err(SchedulerError::Cancelled),
                    permit = semaphore.acquire_owned() => permit.expect("semaphore should never be closed"),
                };
                let _permit = permit;

                if cancellation.is_cancelled() {
                    return Err(SchedulerError::Cancelled);
                }

                let contact_id = contact.id.to_string();
                debug!(contact_id = %contact_id, "scheduling contact");

                let engine = ContactRuleEngine::new();
                let rules = engine.resolve(&contact, &rule_config);
                let scheduling = SchedulingEngine::new();

                scheduling
                    .schedule(&contact, &rules, window_start, window_end)
                    .map(|(scheduled, skipped)| ContactScheduleResult {
                        contact_id,
                        scheduled,
                        skipped,
                    })
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(join_err) => {
                    warn!(error = %join_err, "scheduling task panicked");
                }
            }
        }

        if cancellation.is_cancelled() {
            debug!("scheduling cancelled, discarding partial results");
            return Vec::new();
        }

        results.sort_by(|a, b| match (a, b) {
            (Ok(a), Ok(b)) => a.contact_id.cmp(&b.contact_id),
            (Ok(_), Err(_)) => std::cmp::Ordering::Less,
            (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
            (Err(a), Err(b)) => a.to_string().cmp(&b.to_string()),
        });

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{ContactId, OrgId};

    fn d(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn contact(id: &str, birth: NaiveDate) -> Contact {
        Contact {
            id: ContactId::from(id),
            org_id: OrgId::new(1),
            first_name: None,
            last_name: None,
            email: format!("{id}@example.com"),
            jurisdiction: None,
            zip_code: None,
            birth_date: Some(birth),
            effective_date: None,
        }
    }

    #[tokio::test]
    async fn schedules_all_contacts_and_sorts_by_id() {
        let contacts = vec![
            contact("c-3", d(1960, 3, 1)),
            contact("c-1", d(1960, 4, 1)),
            contact("c-2", d(1960, 5, 1)),
        ];
        let processor = AsyncBatchProcessor::new(BatchConfig { max_concurrent: 2 });
        let results = processor
            .schedule_all(
                contacts,
                Arc::new(RuleConfig::default()),
                d(2024, 1, 1),
                d(2024, 12, 31),
                CancellationToken::new(),
            )
            .await;

        assert_eq!(results.len(), 3);
        let ids: Vec<_> = results
            .iter()
            .map(|r| r.as_ref().unwrap().contact_id.clone())
            .collect();
        assert_eq!(ids, vec!["c-1", "c-2", "c-3"]);
    }

    #[tokio::test]
    async fn respects_concurrency_bound() {
        let contacts: Vec<_> = (0..20)
            .map(|i| contact(&format!("c-{i:02}"), d(1960, 1, 1)))
            .collect();
        let processor = AsyncBatchProcessor::new(BatchConfig { max_concurrent: 4 });
        let results = processor
            .schedule_all(
                contacts,
                Arc::new(RuleConfig::default()),
                d(2024, 1, 1),
                d(2024, 12, 31),
                CancellationToken::new(),
            )
            .await;
        assert_eq!(results.len(), 20);
        assert!(results.iter().all(Result::is_ok));
    }

    #[tokio::test]
    async fn cancelling_before_start_discards_all_results() {
        let contacts: Vec<_> = (0..5).map(|i| contact(&format!("c-{i:02}"), d(1960, 1, 1))).collect();
        let processor = AsyncBatchProcessor::new(BatchConfig { max_concurrent: 2 });
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        let results = processor
            .schedule_all(
                contacts,
                Arc::new(RuleConfig::default()),
                d(2024, 1, 1),
                d(2024, 12, 31),
                cancellation,
            )
            .await;
        assert!(results.is_empty());
    }
}
