use cadence_core::BatchId;
use cadence_store::TrackingStore;
use cadence_store_postgres::PostgresTrackingStore;
use clap::Args;
use serde::Serialize;

use crate::config::CliConfig;
use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Batch to report on.
    #[arg(long)]
    pub batch: String,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    batch_id: String,
    org_id: i64,
    send_mode: String,
    total: i64,
    pending: i64,
    processing: i64,
    sent: i64,
    deferred: i64,
    bounced: i64,
    dropped: i64,
    failed: i64,
    skipped: i64,
    complete: bool,
}

pub async fn run(config: &CliConfig, args: &StatusArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let store = PostgresTrackingStore::new(config.postgres_config()).await?;
    let batch_id = BatchId::new(args.batch.clone());
    let summary = store.get_batch(&batch_id).await?;

    let report = StatusReport {
        batch_id: args.batch.clone(),
        org_id: summary.org_id.value(),
        send_mode: summary.send_mode.as_str().to_owned(),
        total: summary.total,
        pending: summary.pending,
        processing: summary.processing,
        sent: summary.sent,
        deferred: summary.deferred,
        bounced: summary.bounced,
        dropped: summary.dropped,
        failed: summary.failed,
        skipped: summary.skipped,
        complete: summary.is_complete(),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => println!(
            "batch {} (org {}, {}): total={} pending={} processing={} sent={} deferred={} bounced={} dropped={} failed={} skipped={} complete={}",
            report.batch_id,
            report.org_id,
            report.send_mode,
            report.total,
            report.pending,
            report.processing,
            report.sent,
            report.deferred,
            report.bounced,
            report.dropped,
            report.failed,
            report.skipped,
            report.complete
        ),
    }

    Ok(())
}
