use std::sync::Arc;
use std::time::Duration;

use cadence_core::tracking::{SendMode, TrackingRow};
use cadence_core::BatchId;
use cadence_store::types::{ClaimScope, DeliveryStatusUpdate, Outcome};
use cadence_store::TrackingStore;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::gateway::{ContactSource, DeliveryStatusChecker, MailGateway, TemplateRenderer};

/// Outcome tally for one `process_chunk` invocation (§4.6).
#[derive(Debug, Clone, Default)]
pub struct ProcessChunkSummary {
    pub claimed: usize,
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Coordinates claiming due rows, rendering them, sending through the
/// configured gateway, and recording outcomes back into the tracking store
/// (§4.6).
pub struct DeliveryPipeline {
    store: Arc<dyn TrackingStore>,
    gateway: Arc<dyn MailGateway>,
    renderer: Arc<dyn TemplateRenderer>,
    contacts: Arc<dyn ContactSource>,
    config: PipelineConfig,
}

impl DeliveryPipeline {
    pub fn new(
        store: Arc<dyn TrackingStore>,
        gateway: Arc<dyn MailGateway>,
        renderer: Arc<dyn TemplateRenderer>,
        contacts: Arc<dyn ContactSource>,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            store,
            gateway,
            renderer,
            contacts,
            config,
        })
    }

    /// Claims up to `limit` pending rows due on or before `scope.not_after`
    /// from `batch_id`, sends each in turn, and records the outcome.
    /// `cancellation` is checked before each row is delivered (§9): once
    /// cancelled, claimed-but-undelivered rows remain `pending` in the
    /// store and the call returns early with the rows delivered so far.
    #[instrument(skip(self, cancellation), fields(batch_id = %batch_id))]
    pub async fn process_chunk(
        &self,
        batch_id: &BatchId,
        scope: ClaimScope,
        limit: usize,
        cancellation: &CancellationToken,
    ) -> Result<ProcessChunkSummary, PipelineError> {
        let rows = self.store.claim_chunk(batch_id, scope, limit).await?;
        let mut summary = ProcessChunkSummary {
            claimed: rows.len(),
            ..ProcessChunkSummary::default()
        };

        for (i, row) in rows.iter().enumerate() {
            if cancellation.is_cancelled() {
                debug!(batch_id = %batch_id, delivered = i, "chunk processing cancelled, leaving remaining rows pending");
                break;
            }
            if i > 0 {
                tokio::time::sleep(self.config.inter_message_delay).await;
            }
            match self.deliver_one(row).await {
                DeliveryOutcome::Sent => summary.sent += 1,
                DeliveryOutcome::Skipped => summary.skipped += 1,
                DeliveryOutcome::Failed => summary.failed += 1,
            }
        }

        Ok(summary)
    }

    /// Re-claims remaining `pending` rows for a batch, picking up where a
    /// prior interrupted `process_chunk` run left off (§10.6).
    pub async fn resume(
        &self,
        batch_id: &BatchId,
        scope: ClaimScope,
        limit: usize,
        cancellation: &CancellationToken,
    ) -> Result<ProcessChunkSummary, PipelineError> {
        self.process_chunk(batch_id, scope, limit, cancellation).await
    }

    /// Moves every `failed` row of `batch_id` back to `pending`, then
    /// immediately attempts redelivery of up to `limit` of them (§4.6's
    /// `retryFailed(batch-id, size)`: `markFailedAsRetryable` followed by
    /// `processChunk`).
    pub async fn retry_failed(
        &self,
        batch_id: &BatchId,
        scope: ClaimScope,
        limit: usize,
        cancellation: &CancellationToken,
    ) -> Result<ProcessChunkSummary, PipelineError> {
        if cancellation.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        self.store
            .mark_failed_as_retryable(batch_id, limit, cadence_store::DEFAULT_MAX_ATTEMPTS)
            .await?;
        self.process_chunk(batch_id, scope, limit, cancellation).await
    }

    /// Records a delivery-status webhook/poll result against an
    /// already-sent row, moving `send_status` onto the reported terminal
    /// outcome when it is one of `delivered`/`deferred`/`bounced`/`dropped`
    /// (§10.6).
    pub async fn update_delivery_status(
        &self,
        row_id: i64,
        update: DeliveryStatusUpdate,
    ) -> Result<(), PipelineError> {
        Ok(self.store.update_delivery_status(row_id, update).await?)
    }

    /// Polls `checker` for every `sent`/`deferred` row of `batch_id` whose
    /// `status_checked_at` is older than `stale_after`, applying any
    /// reported terminal outcome (§4.6's `updateDeliveryStatus(batch-id)`).
    /// Returns the number of rows updated.
    pub async fn refresh_delivery_status(
        &self,
        batch_id: &BatchId,
        checker: &dyn DeliveryStatusChecker,
        stale_after: Duration,
    ) -> Result<usize, PipelineError> {
        let stale_before = Utc::now()
            - chrono::Duration::from_std(stale_after)
                .unwrap_or_else(|_| chrono::Duration::minutes(10));
        let rows = self.store.list_stale_for_status_check(batch_id, stale_before).await?;

        let mut updated = 0;
        for row in &rows {
            let Some(row_id) = row.id else { continue };
            match checker.check(row).await {
                Ok(Some(update)) => {
                    self.store.update_delivery_status(row_id, update).await?;
                    updated += 1;
                }
                Ok(None) => {}
                Err(e) => warn!(row_id, error = %e, "delivery status check failed"),
            }
        }
        Ok(updated)
    }

    async fn deliver_one(&self, row: &TrackingRow) -> DeliveryOutcome {
        let Some(row_id) = row.id else {
            warn!(contact_id = %row.contact_id, "claimed row has no id, skipping");
            return DeliveryOutcome::Failed;
        };

        if !self.config.sending_enabled_for(row.send_mode) {
            debug!(row_id, send_mode = %row.send_mode, "sending disabled for this mode, skipping");
            let _ = self
                .store
                .finalize(row_id, Outcome::skipped("sending disabled for this send_mode"))
                .await;
            return DeliveryOutcome::Skipped;
        }

        let outcome = self.attempt_send(row).await;
        let result = match outcome.send_status {
            cadence_core::tracking::SendStatus::Sent => DeliveryOutcome::Sent,
            cadence_core::tracking::SendStatus::Skipped => DeliveryOutcome::Skipped,
            _ => DeliveryOutcome::Failed,
        };
        if self.store.finalize(row_id, outcome).await.is_err() {
            warn!(row_id, "failed to finalize tracking row after send attempt");
            return DeliveryOutcome::Failed;
        }
        result
    }

    async fn attempt_send(&self, row: &TrackingRow) -> Outcome {
        let contact = match self.contacts.get_contact(&row.contact_id).await {
            Ok(contact) => contact,
            Err(e) => return Outcome::failed(e.to_string()),
        };

        if row.send_mode == SendMode::Production && contact.email.trim().is_empty() {
            return Outcome::skipped("missing recipient");
        }

        let mut message = match self.renderer.render(row.kind, &contact, row.scheduled_date) {
            Ok(message) => message,
            Err(e) => return Outcome::failed(e.to_string()),
        };

        let test_email = if row.send_mode == SendMode::Test {
            let addresses = &self.config.test_addresses;
            if addresses.is_empty() {
                return Outcome::failed("test mode requires at least one configured test address");
            }
            let pick = &addresses[(row.id.unwrap_or(0).unsigned_abs() as usize) % addresses.len()];
            message.to = pick.clone();
            Some(pick.clone())
        } else {
            None
        };

        let outcome_with_test_email = |outcome: Outcome| match &test_email {
            Some(addr) => outcome.with_test_email(addr.clone()),
            None => outcome,
        };

        for attempt in 0..=self.config.max_retries {
            match tokio::time::timeout(self.config.request_timeout, self.gateway.send(&message)).await {
                Ok(Ok(result)) => {
                    return outcome_with_test_email(Outcome::sent(result.message_id.unwrap_or_default()));
                }
                Ok(Err(e)) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.config.retry_strategy.delay_for(attempt);
                    warn!(contact_id = %row.contact_id, attempt, error = %e, "retryable gateway error, retrying");
                    tokio::time::sleep(delay).await;
                }
                Ok(Err(e)) => return outcome_with_test_email(Outcome::failed(e.to_string())),
                Err(_elapsed) if attempt < self.config.max_retries => {
                    let delay = self.config.retry_strategy.delay_for(attempt);
                    tokio::time::sleep(delay).await;
                }
                Err(_elapsed) => {
                    return outcome_with_test_email(Outcome::failed(format!(
                        "gateway send timed out after {:?}",
                        self.config.request_timeout
                    )));
                }
            }
        }
        unreachable!("loop always returns on its final iteration")
    }
}

enum DeliveryOutcome {
    Sent,
    Skipped,
    Failed,
}
