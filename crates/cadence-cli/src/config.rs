use std::path::PathBuf;

use cadence_mailer::SmtpConfig;
use cadence_pipeline::PipelineConfig;
use cadence_store_postgres::PostgresConfig;

/// Ambient configuration assembled from CLI flags and environment
/// variables, shared by every subcommand.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub database_url: String,
    pub rule_config_path: PathBuf,
    pub contacts_path: PathBuf,
    pub pipeline: PipelineConfig,
    pub smtp: SmtpConfig,
}

impl CliConfig {
    pub fn postgres_config(&self) -> PostgresConfig {
        PostgresConfig {
            url: self.database_url.clone(),
            ..PostgresConfig::default()
        }
    }

    /// Assembles configuration from environment variables, falling back to
    /// each component's own defaults for anything unset.
    ///
    /// Reads `CADENCE_DATABASE_URL`, `CADENCE_RULE_CONFIG_PATH`,
    /// `CADENCE_CONTACTS_PATH`; the pipeline and SMTP settings defer to
    /// [`PipelineConfig::from_env`] and [`SmtpConfig::from_env`].
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("CADENCE_DATABASE_URL")
                .unwrap_or_else(|_| PostgresConfig::default().url),
            rule_config_path: std::env::var("CADENCE_RULE_CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("rules.yaml")),
            contacts_path: std::env::var("CADENCE_CONTACTS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("contacts.json")),
            pipeline: PipelineConfig::from_env(),
            smtp: SmtpConfig::from_env(),
        }
    }
}
