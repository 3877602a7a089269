use std::path::PathBuf;
use std::sync::Arc;

use cadence_core::tracking::{SendMode, TrackingRow};
use cadence_core::{BatchId, IntentKind};
use cadence_pipeline::Scope;
use cadence_rules::RuleConfig;
use cadence_scheduler::{AsyncBatchProcessor, BatchConfig};
use cadence_store::TrackingStore;
use cadence_store_postgres::PostgresTrackingStore;
use chrono::{NaiveDate, Utc};
use clap::Args;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::CliConfig;
use crate::contact_source::JsonFileContactSource;
use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct ScheduleArgs {
    /// Organization owning the scheduled batch.
    #[arg(long)]
    pub org_id: i64,
    /// Start of the scheduling window (inclusive, `YYYY-MM-DD`).
    #[arg(long)]
    pub window_start: NaiveDate,
    /// End of the scheduling window (inclusive, `YYYY-MM-DD`).
    #[arg(long)]
    pub window_end: NaiveDate,
    /// Send mode recorded on every produced tracking row.
    #[arg(long, default_value = "test")]
    pub send_mode: String,
    /// Subset of the computed schedule to actually persist as tracking rows
    /// (§4.6's scope selection, applied before `insertBatch`). The printed
    /// schedule JSON always lists every `Scheduled`/`Skipped` intent in the
    /// window regardless of this flag.
    #[arg(long, default_value = "all")]
    pub scope: String,
    /// Intent kind for `--scope bulk`.
    #[arg(long)]
    pub bulk_kind: Option<String>,
    /// Override the rule configuration path from the global flag.
    #[arg(long)]
    pub rule_config: Option<PathBuf>,
    /// Override the contacts path from the global flag.
    #[arg(long)]
    pub contacts: Option<PathBuf>,
}

fn parse_scope(raw: &str, bulk_kind: Option<&str>) -> anyhow::Result<Scope> {
    match raw {
        "all" => Ok(Scope::All),
        "today" => Ok(Scope::Today),
        "next_7_days" => Ok(Scope::Next7Days),
        "next_30_days" => Ok(Scope::Next30Days),
        "next_90_days" => Ok(Scope::Next90Days),
        "bulk" => {
            let kind = bulk_kind.ok_or_else(|| anyhow::anyhow!("--bulk-kind is required when --scope bulk"))?;
            let kind = match kind {
                "birthday" => IntentKind::Birthday,
                "effective_date" => IntentKind::EffectiveDate,
                "aep" => IntentKind::Aep,
                "post_window" => IntentKind::PostWindow,
                other => anyhow::bail!("unknown --bulk-kind '{other}'"),
            };
            Ok(Scope::Bulk { kind })
        }
        other => anyhow::bail!("unknown --scope '{other}' (expected all|today|next_7_days|next_30_days|next_90_days|bulk)"),
    }
}

#[derive(Debug, Serialize)]
struct EmailEntry {
    #[serde(rename = "type")]
    kind: String,
    date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_date: Option<NaiveDate>,
    /// Tracking link (§6's output contract). Always absent here: a link
    /// only exists once a `TrackingRow` has been inserted, which happens
    /// after this JSON is built.
    #[serde(skip_serializing_if = "Option::is_none")]
    link: Option<String>,
}

#[derive(Debug, Serialize)]
struct SkippedEntry {
    #[serde(rename = "type")]
    kind: String,
    reason: String,
}

#[derive(Debug, Serialize)]
struct ScheduledContact {
    contact_id: String,
    emails: Vec<EmailEntry>,
    skipped: Vec<SkippedEntry>,
}

pub async fn run(
    config: &CliConfig,
    args: &ScheduleArgs,
    format: &OutputFormat,
    cancellation: &CancellationToken,
) -> anyhow::Result<()> {
    let rule_config_path = args.rule_config.clone().unwrap_or_else(|| config.rule_config_path.clone());
    let contacts_path = args.contacts.clone().unwrap_or_else(|| config.contacts_path.clone());
    let send_mode: SendMode = args
        .send_mode
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let rule_config = Arc::new(RuleConfig::load_from_path(&rule_config_path)?);
    let contacts = JsonFileContactSource::load(&contacts_path)?.all();
    let contact_count = contacts.len();
    let scope = parse_scope(&args.scope, args.bulk_kind.as_deref())?;
    let today = Utc::now().date_naive();

    let processor = AsyncBatchProcessor::new(BatchConfig::default());
    let results = processor
        .schedule_all(
            contacts,
            rule_config,
            args.window_start,
            args.window_end,
            cancellation.clone(),
        )
        .await;

    let mut output = Vec::with_capacity(results.len());
    let mut rows = Vec::new();
    let batch_id = BatchId::new(uuid::Uuid::new_v4().to_string());
    let now = Utc::now();

    for result in results {
        let result = match result {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "skipping contact that failed to schedule");
                continue;
            }
        };

        let mut emails = Vec::new();
        let mut skipped = Vec::new();

        // Scope selection is applied only to which intents become tracking
        // rows (§4.6); the printed schedule JSON always reports every
        // Scheduled/Skipped intent in the window (§6's output contract).
        let in_scope: std::collections::HashSet<(IntentKind, NaiveDate)> = scope
            .filter(result.scheduled.clone(), today)
            .into_iter()
            .map(|intent| (intent.kind, intent.target_date))
            .collect();

        for intent in &result.scheduled {
            emails.push(EmailEntry {
                kind: intent.kind.as_str().to_owned(),
                date: intent.target_date,
                default_date: intent.default_date,
                link: intent.tracking_link.clone(),
            });
            if !in_scope.contains(&(intent.kind, intent.target_date)) {
                continue;
            }
            rows.push(TrackingRow::new_pending(
                cadence_core::OrgId::new(args.org_id),
                intent.contact_id.clone(),
                intent.kind,
                intent.target_date,
                send_mode,
                batch_id.clone(),
                now,
            ));
        }
        for intent in &result.skipped {
            let reason = match &intent.status {
                cadence_core::IntentStatus::Skipped { reason } => reason.clone(),
                cadence_core::IntentStatus::Scheduled => String::new(),
            };
            skipped.push(SkippedEntry {
                kind: intent.kind.as_str().to_owned(),
                reason,
            });
        }

        output.push(ScheduledContact {
            contact_id: result.contact_id,
            emails,
            skipped,
        });
    }

    let inserted_batch_id = if rows.is_empty() {
        None
    } else {
        let store = PostgresTrackingStore::new(config.postgres_config()).await?;
        Some(store.insert_batch(rows).await?)
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
        OutputFormat::Text => {
            println!("scheduled {contact_count} contacts");
            for contact in &output {
                println!(
                    "  {}: {} scheduled, {} skipped",
                    contact.contact_id,
                    contact.emails.len(),
                    contact.skipped.len()
                );
            }
        }
    }

    match inserted_batch_id {
        Some(batch_id) => println!("batch_id: {batch_id}"),
        None => println!("no intents scheduled; no batch was created"),
    }

    Ok(())
}
