use thiserror::Error;

/// Errors surfaced by `cadence-core` primitives.
///
/// Per §7 of the design, anchor-date and contact-shape problems are local
/// recovery situations (the caller turns them into a `Skipped` intent), not
/// aborts — this type exists so callers can distinguish those from the
/// handful of cases (none, currently) that are genuinely unrecoverable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A contact has neither a birth date nor an effective date.
    #[error("contact {0} has no anchor dates")]
    MissingAnchorDates(String),

    /// A contact's anchor date could not be interpreted as a calendar date.
    #[error("invalid anchor date for contact {0}: {1}")]
    InvalidAnchorDate(String, String),

    /// A jurisdiction code is not two ASCII letters.
    #[error("malformed jurisdiction code: {0}")]
    MalformedJurisdiction(String),
}
