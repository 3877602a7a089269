use thiserror::Error;

/// Errors raised while scheduling intents for a contact or batch.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("contact {0} has no usable anchor date")]
    NoAnchorDate(String),

    #[error("scheduling window is inverted: start {start} is after end {end}")]
    InvertedWindow {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("scheduling was cancelled")]
    Cancelled,
}
