pub mod batch;
pub mod engine;
pub mod error;

pub use batch::{AsyncBatchProcessor, BatchConfig, ContactScheduleResult};
pub use engine::SchedulingEngine;
pub use error::SchedulerError;
