use async_trait::async_trait;
use cadence_pipeline::{GatewaySendResult, MailGateway, PipelineError, RenderedMessage};
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, error, info};

use crate::config::SmtpConfig;

/// SMTP-backed [`MailGateway`] using `lettre`.
pub struct SmtpMailGateway {
    config: SmtpConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl std::fmt::Debug for SmtpMailGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailGateway")
            .field("config", &self.config)
            .field("transport", &"<AsyncSmtpTransport>")
            .finish()
    }
}

impl SmtpMailGateway {
    pub fn new(config: SmtpConfig) -> Result<Self, PipelineError> {
        let transport = build_transport(&config)?;
        Ok(Self { config, transport })
    }

    /// Builds a gateway around a pre-constructed transport, for tests.
    pub fn with_transport(config: SmtpConfig, transport: AsyncSmtpTransport<Tokio1Executor>) -> Self {
        Self { config, transport }
    }
}

#[async_trait]
impl MailGateway for SmtpMailGateway {
    async fn send(&self, message: &RenderedMessage) -> Result<GatewaySendResult, PipelineError> {
        debug!(to = %message.to, subject = %message.subject, "building SMTP message");
        let lettre_message = build_message(&self.config.from_address, message)?;

        info!(to = %message.to, subject = %message.subject, "sending email via SMTP");
        self.transport.send(lettre_message).await.map_err(|e| {
            error!(error = %e, "SMTP send failed");
            map_smtp_error(&e)
        })?;

        Ok(GatewaySendResult {
            message_id: None,
            status: "sent".to_owned(),
        })
    }
}

fn build_message(from_address: &str, msg: &RenderedMessage) -> Result<Message, PipelineError> {
    let from_mailbox: Mailbox = from_address
        .parse()
        .map_err(|e| PipelineError::GatewayRejected(format!("invalid from address: {e}")))?;
    let to_mailbox: Mailbox = msg
        .to
        .parse()
        .map_err(|e| PipelineError::GatewayRejected(format!("invalid recipient address: {e}")))?;

    let builder = Message::builder()
        .from(from_mailbox)
        .to(to_mailbox)
        .subject(&msg.subject);

    let message = match (&msg.body, &msg.html_body) {
        (Some(text), Some(html)) => builder
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(lettre::message::header::ContentType::TEXT_PLAIN)
                            .body(text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(lettre::message::header::ContentType::TEXT_HTML)
                            .body(html.clone()),
                    ),
            )
            .map_err(|e| PipelineError::GatewayRejected(format!("failed to build email: {e}")))?,
        (Some(text), None) => builder
            .body(text.clone())
            .map_err(|e| PipelineError::GatewayRejected(format!("failed to build email: {e}")))?,
        (None, Some(html)) => builder
            .singlepart(
                SinglePart::builder()
                    .header(lettre::message::header::ContentType::TEXT_HTML)
                    .body(html.clone()),
            )
            .map_err(|e| PipelineError::GatewayRejected(format!("failed to build email: {e}")))?,
        (None, None) => builder
            .body(String::new())
            .map_err(|e| PipelineError::GatewayRejected(format!("failed to build email: {e}")))?,
    };

    Ok(message)
}

fn build_transport(config: &SmtpConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>, PipelineError> {
    let builder = if config.tls {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| PipelineError::GatewayRejected(format!("SMTP TLS relay error: {e}")))?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
    };

    let builder = builder.port(config.smtp_port);

    let builder = if let (Some(user), Some(pass)) = (&config.username, &config.password) {
        builder.credentials(Credentials::new(user.clone(), pass.clone()))
    } else {
        builder
    };

    Ok(builder.build())
}

fn map_smtp_error(error: &lettre::transport::smtp::Error) -> PipelineError {
    let message = error.to_string();
    if error.is_transient() {
        PipelineError::GatewayUnavailable(format!("transient SMTP error: {message}"))
    } else {
        PipelineError::GatewayRejected(format!("permanent SMTP error: {message}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> SmtpConfig {
        SmtpConfig {
            smtp_host: "localhost".into(),
            smtp_port: 2525,
            username: None,
            password: None,
            tls: false,
            from_address: "sender@example.com".into(),
        }
    }

    fn test_message() -> RenderedMessage {
        RenderedMessage {
            to: "recipient@example.com".into(),
            subject: "Test".into(),
            body: Some("hello".into()),
            html_body: None,
        }
    }

    #[test]
    fn build_message_plain_text() {
        assert!(build_message("sender@example.com", &test_message()).is_ok());
    }

    #[test]
    fn build_message_invalid_to() {
        let mut msg = test_message();
        msg.to = "not-valid".into();
        let err = build_message("sender@example.com", &msg).unwrap_err();
        assert!(matches!(err, PipelineError::GatewayRejected(_)));
    }

    #[tokio::test]
    async fn build_transport_no_tls() {
        assert!(build_transport(&test_config()).is_ok());
    }

    #[tokio::test]
    async fn gateway_reports_smtp_debug() {
        let gateway = SmtpMailGateway::new(test_config()).unwrap();
        let debug = format!("{gateway:?}");
        assert!(debug.contains("SmtpMailGateway"));
    }
}
