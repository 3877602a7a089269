use std::sync::Arc;

use cadence_core::BatchId;
use cadence_mailer::{DryRunMailGateway, MinijinjaTemplateRenderer, SmtpMailGateway};
use cadence_pipeline::{DeliveryPipeline, MailGateway};
use cadence_store::types::ClaimScope;
use cadence_store::TrackingStore;
use cadence_store_postgres::PostgresTrackingStore;
use chrono::Utc;
use clap::Args;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::CliConfig;
use crate::contact_source::JsonFileContactSource;
use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct RetryArgs {
    /// Batch whose failed rows should be retried.
    #[arg(long)]
    pub batch: String,
    /// Maximum number of retried rows to attempt redelivery of.
    #[arg(long)]
    pub chunk: usize,
    /// Actually call the mail gateway instead of dry-running the send.
    #[arg(long)]
    pub live: bool,
    /// Override the contacts path from the global flag.
    #[arg(long)]
    pub contacts: Option<std::path::PathBuf>,
}

#[derive(Debug, Serialize)]
struct RetryReport {
    batch_id: String,
    claimed: usize,
    sent: usize,
    skipped: usize,
    failed: usize,
}

pub async fn run(
    config: &CliConfig,
    args: &RetryArgs,
    format: &OutputFormat,
    cancellation: &CancellationToken,
) -> anyhow::Result<()> {
    let contacts_path = args.contacts.clone().unwrap_or_else(|| config.contacts_path.clone());
    let contacts = Arc::new(JsonFileContactSource::load(&contacts_path)?);

    let mut pipeline_config = config.pipeline.clone();
    if args.live {
        pipeline_config.dry_run = false;
    }
    pipeline_config.validate()?;

    let store: Arc<dyn TrackingStore> = Arc::new(PostgresTrackingStore::new(config.postgres_config()).await?);
    let gateway: Arc<dyn MailGateway> = if pipeline_config.dry_run {
        Arc::new(DryRunMailGateway)
    } else {
        Arc::new(SmtpMailGateway::new(config.smtp.clone())?)
    };
    let renderer = Arc::new(MinijinjaTemplateRenderer::default());

    let pipeline = DeliveryPipeline::new(store, gateway, renderer, contacts, pipeline_config)?;

    let batch_id = BatchId::new(args.batch.clone());
    let scope = ClaimScope {
        not_after: Utc::now().date_naive() + chrono::Duration::days(3650),
    };

    let summary = pipeline.retry_failed(&batch_id, scope, args.chunk, cancellation).await?;

    let report = RetryReport {
        batch_id: args.batch.clone(),
        claimed: summary.claimed,
        sent: summary.sent,
        skipped: summary.skipped,
        failed: summary.failed,
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => println!(
            "retried batch {}: claimed={} sent={} skipped={} failed={}",
            report.batch_id, report.claimed, report.sent, report.skipped, report.failed
        ),
    }

    Ok(())
}
