use async_trait::async_trait;
use cadence_core::intent::IntentKind;
use cadence_core::tracking::TrackingRow;
use cadence_core::{Contact, ContactId};
use cadence_store::types::DeliveryStatusUpdate;
use chrono::NaiveDate;

use crate::error::PipelineError;

/// Resolves a [`ContactId`] back into the full [`Contact`] record needed to
/// render a message (name, email, anchor dates). The pipeline only ever
/// persists `contact_id`; the source of truth for contact records lives
/// outside this workspace, reached through this boundary trait.
#[async_trait]
pub trait ContactSource: Send + Sync {
    async fn get_contact(&self, contact_id: &ContactId) -> Result<Contact, PipelineError>;
}

/// A fully-rendered, ready-to-send message. Produced by a
/// [`TemplateRenderer`] and consumed by a [`MailGateway`].
#[derive(Debug, Clone)]
pub struct RenderedMessage {
    pub to: String,
    pub subject: String,
    pub body: Option<String>,
    pub html_body: Option<String>,
}

/// Result of a successful gateway send.
#[derive(Debug, Clone)]
pub struct GatewaySendResult {
    pub message_id: Option<String>,
    pub status: String,
}

/// Produces a [`RenderedMessage`] for one contact/intent-kind pairing.
///
/// Implementations own template selection and substitution; the pipeline
/// only needs the resulting subject/body pair.
pub trait TemplateRenderer: Send + Sync {
    fn render(
        &self,
        kind: IntentKind,
        contact: &Contact,
        target_date: NaiveDate,
    ) -> Result<RenderedMessage, PipelineError>;
}

/// Pluggable mail delivery backend (§4.6). Implementations handle the
/// actual transport (SMTP, a dry-run sink, etc.).
#[async_trait]
pub trait MailGateway: Send + Sync {
    async fn send(&self, message: &RenderedMessage) -> Result<GatewaySendResult, PipelineError>;
}

/// Polls a mail gateway for the terminal delivery outcome of an
/// already-sent row (`updateDeliveryStatus`, §4.6). Returns `None` when the
/// gateway has no new information yet.
#[async_trait]
pub trait DeliveryStatusChecker: Send + Sync {
    async fn check(&self, row: &TrackingRow) -> Result<Option<DeliveryStatusUpdate>, PipelineError>;
}
