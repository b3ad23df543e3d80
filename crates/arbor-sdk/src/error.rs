use std::path::PathBuf;

use arbor_session::SessionError;
use arbor_translate::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("failed to read config file {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ParseConfig(#[from] toml::de::Error),

    #[error("invalid log filter: {0}")]
    Logging(String),
}

pub type SdkResult<T> = Result<T, SdkError>;
