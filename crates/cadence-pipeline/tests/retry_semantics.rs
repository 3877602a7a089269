//! Scenario 7 (§8): a batch with one transient failure recovers via
//! `retry_failed` and reaches completion.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cadence_core::intent::IntentKind;
use cadence_core::tracking::{SendMode, TrackingRow};
use cadence_core::{BatchId, Contact, ContactId, OrgId};
use cadence_pipeline::{
    ContactSource, DeliveryPipeline, GatewaySendResult, MailGateway, PipelineConfig,
    PipelineError, RenderedMessage, TemplateRenderer,
};
use cadence_store::types::ClaimScope;
use cadence_store::{InMemoryTrackingStore, TrackingStore};
use chrono::{NaiveDate, Utc};
use tokio_util::sync::CancellationToken;

struct FixedContactSource;

#[async_trait]
impl ContactSource for FixedContactSource {
    async fn get_contact(&self, contact_id: &ContactId) -> Result<Contact, PipelineError> {
        Ok(Contact {
            id: contact_id.clone(),
            org_id: OrgId::new(1),
            first_name: Some("Jane".into()),
            last_name: Some("Doe".into()),
            email: format!("{}@example.com", contact_id.as_str()),
            jurisdiction: None,
            zip_code: None,
            birth_date: NaiveDate::from_ymd_opt(1960, 6, 1),
            effective_date: None,
        })
    }
}

struct PlainRenderer;
impl TemplateRenderer for PlainRenderer {
    fn render(&self, _kind: IntentKind, contact: &Contact, _target_date: NaiveDate) -> Result<RenderedMessage, PipelineError> {
        Ok(RenderedMessage {
            to: contact.email.clone(),
            subject: "hello".into(),
            body: Some("hi".into()),
            html_body: None,
        })
    }
}

/// Fails every send for contacts in `fail_contacts` exactly once (tracked by
/// the number of times that contact has been sent to), then succeeds.
struct FlakyGateway {
    attempts_per_contact: std::sync::Mutex<std::collections::HashMap<String, usize>>,
    fail_once_for: &'static str,
    sent_count: AtomicUsize,
}

#[async_trait]
impl MailGateway for FlakyGateway {
    async fn send(&self, message: &RenderedMessage) -> Result<GatewaySendResult, PipelineError> {
        let mut attempts = self.attempts_per_contact.lock().unwrap();
        let count = attempts.entry(message.to.clone()).or_insert(0);
        *count += 1;
        if message.to.contains(self.fail_once_for) && *count == 1 {
            return Err(PipelineError::GatewayUnavailable("smtp timeout".into()));
        }
        self.sent_count.fetch_add(1, Ordering::SeqCst);
        Ok(GatewaySendResult {
            message_id: Some(format!("mid-{}", self.sent_count.load(Ordering::SeqCst))),
            status: "sent".into(),
        })
    }
}

fn pending_row(contact_id: &str, batch: &BatchId) -> TrackingRow {
    TrackingRow::new_pending(
        OrgId::new(1),
        ContactId::from(contact_id),
        IntentKind::Birthday,
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        SendMode::Production,
        batch.clone(),
        Utc::now(),
    )
}

#[tokio::test]
async fn retry_failed_recovers_a_transient_failure_and_completes_the_batch() {
    let store = Arc::new(InMemoryTrackingStore::new());
    let batch_id = BatchId::new("b-scenario-7");
    store
        .insert_batch(vec![
            pending_row("c-1", &batch_id),
            pending_row("c-2", &batch_id),
            pending_row("c-3", &batch_id),
        ])
        .await
        .unwrap();

    let gateway = Arc::new(FlakyGateway {
        attempts_per_contact: std::sync::Mutex::new(std::collections::HashMap::new()),
        fail_once_for: "c-2",
        sent_count: AtomicUsize::new(0),
    });

    let pipeline = DeliveryPipeline::new(
        store.clone(),
        gateway,
        Arc::new(PlainRenderer),
        Arc::new(FixedContactSource),
        PipelineConfig {
            production_sending_enabled: true,
            inter_message_delay: std::time::Duration::from_millis(0),
            max_retries: 0,
            ..PipelineConfig::default()
        },
    )
    .unwrap();

    let scope = ClaimScope { not_after: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap() };
    let cancellation = CancellationToken::new();

    let first_pass = pipeline.process_chunk(&batch_id, scope, 3, &cancellation).await.unwrap();
    assert_eq!(first_pass.claimed, 3);
    assert_eq!(first_pass.sent, 2);
    assert_eq!(first_pass.failed, 1);

    let summary = store.get_batch(&batch_id).await.unwrap();
    assert_eq!(summary.sent, 2);
    assert_eq!(summary.failed, 1);
    assert!(!summary.is_complete());

    let retry_pass = pipeline.retry_failed(&batch_id, scope, 1, &cancellation).await.unwrap();
    assert_eq!(retry_pass.claimed, 1);
    assert_eq!(retry_pass.sent, 1);
    assert_eq!(retry_pass.failed, 0);

    let summary = store.get_batch(&batch_id).await.unwrap();
    assert_eq!(summary.sent, 3);
    assert_eq!(summary.failed, 0);
    assert!(summary.is_complete());
}

#[tokio::test]
async fn retry_failed_is_a_no_op_when_cancelled_up_front() {
    let store = Arc::new(InMemoryTrackingStore::new());
    let batch_id = BatchId::new("b-cancelled-retry");
    store.insert_batch(vec![pending_row("c-1", &batch_id)]).await.unwrap();

    let gateway = Arc::new(FlakyGateway {
        attempts_per_contact: std::sync::Mutex::new(std::collections::HashMap::new()),
        fail_once_for: "never",
        sent_count: AtomicUsize::new(0),
    });
    let pipeline = DeliveryPipeline::new(
        store.clone(),
        gateway,
        Arc::new(PlainRenderer),
        Arc::new(FixedContactSource),
        PipelineConfig {
            production_sending_enabled: true,
            inter_message_delay: std::time::Duration::from_millis(0),
            ..PipelineConfig::default()
        },
    )
    .unwrap();

    let scope = ClaimScope { not_after: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap() };
    let cancellation = CancellationToken::new();
    cancellation.cancel();

    let result = pipeline.retry_failed(&batch_id, scope, 1, &cancellation).await;
    assert!(matches!(result, Err(PipelineError::Cancelled)));
}
