pub mod config;
pub mod error;
pub mod gateway;
pub mod pipeline;
pub mod retry;
pub mod scope;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use gateway::{
    ContactSource, DeliveryStatusChecker, GatewaySendResult, MailGateway, RenderedMessage,
    TemplateRenderer,
};
pub use pipeline::{DeliveryPipeline, ProcessChunkSummary};
pub use retry::RetryStrategy;
pub use scope::Scope;
