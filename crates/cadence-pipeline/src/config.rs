use std::time::Duration;

use crate::retry::RetryStrategy;

/// Ambient control-environment settings for the delivery pipeline (§4.6,
/// §10.4): whether test- and production-mode sends are currently allowed,
/// the default dry-run posture, and gateway pacing/retry behavior.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub test_sending_enabled: bool,
    pub production_sending_enabled: bool,
    pub dry_run: bool,
    /// Delay observed between consecutive gateway sends within one chunk,
    /// to stay under the mail gateway's rate limit.
    pub inter_message_delay: Duration,
    pub gateway_api_key: Option<String>,
    pub chunk_size: usize,
    pub max_retries: u32,
    pub retry_strategy: RetryStrategy,
    pub request_timeout: Duration,
    /// Fixed recipient addresses substituted in for `test`-mode sends,
    /// selected round-robin per row (§4.6).
    pub test_addresses: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            test_sending_enabled: true,
            production_sending_enabled: false,
            dry_run: true,
            inter_message_delay: Duration::from_millis(500),
            gateway_api_key: None,
            chunk_size: 100,
            max_retries: 3,
            retry_strategy: RetryStrategy::default(),
            request_timeout: Duration::from_secs(15),
            test_addresses: vec!["test@example.com".to_owned()],
        }
    }
}

impl PipelineConfig {
    /// Builds configuration from environment variables, falling back to
    /// [`PipelineConfig::default`] for anything unset.
    ///
    /// Reads:
    /// - `CADENCE_TEST_SENDING_ENABLED` (bool, default `true`)
    /// - `CADENCE_PRODUCTION_SENDING_ENABLED` (bool, default `false`)
    /// - `CADENCE_DRY_RUN` (bool, default `true`)
    /// - `CADENCE_INTER_MESSAGE_DELAY_MS` (u64 millis, default 500)
    /// - `CADENCE_GATEWAY_API_KEY` (optional)
    /// - `CADENCE_CHUNK_SIZE` (usize, default 100)
    /// - `CADENCE_MAX_RETRIES` (u32, default 3)
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            test_sending_enabled: bool_env("CADENCE_TEST_SENDING_ENABLED", defaults.test_sending_enabled),
            production_sending_enabled: bool_env(
                "CADENCE_PRODUCTION_SENDING_ENABLED",
                defaults.production_sending_enabled,
            ),
            dry_run: bool_env("CADENCE_DRY_RUN", defaults.dry_run),
            inter_message_delay: std::env::var("CADENCE_INTER_MESSAGE_DELAY_MS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.inter_message_delay),
            gateway_api_key: std::env::var("CADENCE_GATEWAY_API_KEY").ok(),
            chunk_size: std::env::var("CADENCE_CHUNK_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.chunk_size),
            max_retries: std::env::var("CADENCE_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            retry_strategy: defaults.retry_strategy,
            request_timeout: defaults.request_timeout,
            test_addresses: std::env::var("CADENCE_TEST_ADDRESSES")
                .ok()
                .map(|s| s.split(',').map(|a| a.trim().to_owned()).collect())
                .unwrap_or(defaults.test_addresses),
        }
    }

    /// Validates that a non-dry-run configuration carries an API key.
    pub fn validate(&self) -> Result<(), crate::error::PipelineError> {
        if !self.dry_run && self.gateway_api_key.is_none() {
            return Err(crate::error::PipelineError::MissingApiKey);
        }
        Ok(())
    }

    /// Whether sends for `send_mode` are currently permitted by this
    /// control environment.
    #[must_use]
    pub fn sending_enabled_for(&self, send_mode: cadence_core::tracking::SendMode) -> bool {
        match send_mode {
            cadence_core::tracking::SendMode::Test => self.test_sending_enabled,
            cadence_core::tracking::SendMode::Production => self.production_sending_enabled,
        }
    }
}

fn bool_env(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<bool>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_dry_run_with_test_sending_only() {
        let cfg = PipelineConfig::default();
        assert!(cfg.dry_run);
        assert!(cfg.test_sending_enabled);
        assert!(!cfg.production_sending_enabled);
    }

    #[test]
    fn validate_requires_api_key_outside_dry_run() {
        let cfg = PipelineConfig {
            dry_run: false,
            gateway_api_key: None,
            ..PipelineConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = PipelineConfig {
            dry_run: false,
            gateway_api_key: Some("key".into()),
            ..PipelineConfig::default()
        };
        assert!(cfg.validate().is_ok());
    }
}
