use thiserror::Error;

/// Errors raised while rendering, sending, or bookkeeping a message through
/// the delivery pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("template rendering failed for contact {contact_id}: {source}")]
    Render {
        contact_id: String,
        source: String,
    },

    #[error("mail gateway rejected the message: {0}")]
    GatewayRejected(String),

    #[error("mail gateway is unreachable: {0}")]
    GatewayUnavailable(String),

    #[error("mail gateway request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("gateway API key is required when not running in dry-run mode")]
    MissingApiKey,

    #[error("contact {0} could not be resolved")]
    ContactNotFound(String),

    #[error(transparent)]
    Store(#[from] cadence_store::error::StoreError),

    #[error("chunk processing was cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Whether the surrounding send attempt should be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::GatewayUnavailable(_) | Self::Timeout(_)
        )
    }
}
