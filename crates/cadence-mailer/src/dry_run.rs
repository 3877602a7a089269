use async_trait::async_trait;
use cadence_pipeline::{GatewaySendResult, MailGateway, PipelineError, RenderedMessage};
use tracing::info;

/// A [`MailGateway`] that logs what it would have sent and synthesizes a
/// `dry:`-prefixed message id, without contacting any transport.
///
/// Used as the default gateway when a [`cadence_pipeline::PipelineConfig`]
/// carries `dry_run: true`.
#[derive(Debug, Default)]
pub struct DryRunMailGateway;

#[async_trait]
impl MailGateway for DryRunMailGateway {
    async fn send(&self, message: &RenderedMessage) -> Result<GatewaySendResult, PipelineError> {
        info!(to = %message.to, subject = %message.subject, "dry-run: not actually sending");
        Ok(GatewaySendResult {
            message_id: Some(format!("dry:{}", uuid::Uuid::new_v4())),
            status: "dry_run".to_owned(),
        })
    }
}
