pub mod config;
pub mod dry_run;
pub mod smtp;
pub mod template;

pub use config::SmtpConfig;
pub use dry_run::DryRunMailGateway;
pub use smtp::SmtpMailGateway;
pub use template::MinijinjaTemplateRenderer;
