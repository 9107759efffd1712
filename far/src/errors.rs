//! Error types for far

use thiserror::Error;

use crate::providers::ProviderError;

/// Main error type for far
#[derive(Error, Debug)]
pub enum FarError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("build error: {0}")]
    BuildError(String),

    #[error("push error: {0}")]
    PushError(String),

    #[error("engine error: {0}")]
    EngineError(String),

    #[error("secret error: {0}")]
    SecretError(String),

    #[error(transparent)]
    ProviderError(#[from] ProviderError),
}

impl From<anyhow::Error> for FarError {
    fn from(err: anyhow::Error) -> Self {
        FarError::ConfigError(err.to_string())
    }
}
