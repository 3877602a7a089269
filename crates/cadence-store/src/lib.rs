pub mod error;
#[cfg(feature = "testing")]
pub mod memory;
pub mod store;
pub mod types;

pub use error::StoreError;
#[cfg(feature = "testing")]
pub use memory::InMemoryTrackingStore;
pub use store::{TrackingStore, DEFAULT_MAX_ATTEMPTS};
pub use types::{BatchFilter, BatchSummary, ClaimScope, DeliveryStatusUpdate, Outcome};
