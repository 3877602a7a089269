use thiserror::Error;

/// Errors encountered while loading or validating a [`crate::RuleConfig`].
#[derive(Debug, Error)]
pub enum RuleConfigError {
    #[error("failed to parse rule config as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse rule config as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to read rule config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("rule config is structurally invalid: {0}")]
    Invalid(String),
}
