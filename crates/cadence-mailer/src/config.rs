use serde::{Deserialize, Serialize};

/// SMTP connection settings for [`crate::smtp::SmtpMailGateway`].
#[derive(Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: bool,
    /// `From` address stamped onto every outgoing message.
    pub from_address: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("tls", &self.tls)
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            smtp_host: "localhost".to_owned(),
            smtp_port: 587,
            username: None,
            password: None,
            tls: true,
            from_address: "noreply@localhost".to_owned(),
        }
    }
}

impl SmtpConfig {
    /// Builds configuration from environment variables, falling back to
    /// [`SmtpConfig::default`] for anything unset.
    ///
    /// Reads `CADENCE_SMTP_HOST`, `CADENCE_SMTP_PORT`, `CADENCE_SMTP_USERNAME`,
    /// `CADENCE_SMTP_PASSWORD`, `CADENCE_SMTP_TLS`, `CADENCE_FROM_ADDRESS`.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            smtp_host: std::env::var("CADENCE_SMTP_HOST").unwrap_or(defaults.smtp_host),
            smtp_port: std::env::var("CADENCE_SMTP_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.smtp_port),
            username: std::env::var("CADENCE_SMTP_USERNAME").ok(),
            password: std::env::var("CADENCE_SMTP_PASSWORD").ok(),
            tls: std::env::var("CADENCE_SMTP_TLS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.tls),
            from_address: std::env::var("CADENCE_FROM_ADDRESS").unwrap_or(defaults.from_address),
        }
    }
}
