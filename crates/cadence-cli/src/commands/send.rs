use std::sync::Arc;
use std::time::Duration;

use cadence_core::BatchId;
use cadence_mailer::{DryRunMailGateway, MinijinjaTemplateRenderer, SmtpMailGateway};
use cadence_pipeline::{DeliveryPipeline, MailGateway, PipelineConfig};
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
pub struct SendArgs {
    /// Batch to process.
    #[arg(long)]
    pub batch: String,
    /// Maximum number of rows to claim and send in this invocation.
    #[arg(long)]
    pub chunk: usize,
    /// Actually call the mail gateway instead of dry-running the send.
    #[arg(long)]
    pub live: bool,
    /// Override the inter-message delay, in seconds.
    #[arg(long)]
    pub delay: Option<f64>,
    /// Only claim rows scheduled on or before this date (`YYYY-MM-DD`);
    /// defaults to ten years out, i.e. effectively unbounded.
    #[arg(long)]
    pub not_after: Option<chrono::NaiveDate>,
    /// Override the contacts path from the global flag.
    #[arg(long)]
    pub contacts: Option<std::path::PathBuf>,
}

#[derive(Debug, Serialize)]
struct SendReport {
    batch_id: String,
    claimed: usize,
    sent: usize,
    skipped: usize,
    failed: usize,
}

pub async fn run(
    config: &CliConfig,
    args: &SendArgs,
    format: &OutputFormat,
    cancellation: &CancellationToken,
) -> anyhow::Result<()> {
    let contacts_path = args.contacts.clone().unwrap_or_else(|| config.contacts_path.clone());
    let contacts = Arc::new(JsonFileContactSource::load(&contacts_path)?);

    let mut pipeline_config = config.pipeline.clone();
    if args.live {
        pipeline_config.dry_run = false;
    }
    if let Some(delay) = args.delay {
        pipeline_config.inter_message_delay = Duration::from_secs_f64(delay);
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
        not_after: args.not_after.unwrap_or_else(|| Utc::now().date_naive() + chrono::Duration::days(3650)),
    };

    let summary = pipeline.process_chunk(&batch_id, scope, args.chunk, cancellation).await?;

    let report = SendReport {
        batch_id: args.batch.clone(),
        claimed: summary.claimed,
        sent: summary.sent,
        skipped: summary.skipped,
        failed: summary.failed,
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => println!(
            "batch {}: claimed={} sent={} skipped={} failed={}",
            report.batch_id, report.claimed, report.sent, report.skipped, report.failed
        ),
    }

    Ok(())
}
