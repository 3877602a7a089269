pub mod calendar;
pub mod contact;
pub mod error;
pub mod intent;
pub mod tracking;
pub mod types;

pub use contact::Contact;
pub use error::CoreError;
pub use intent::{Intent, IntentKind, IntentStatus};
pub use tracking::{SendMode, SendStatus, TrackingRow};
pub use types::{BatchId, ContactId, Jurisdiction, OrgId};
