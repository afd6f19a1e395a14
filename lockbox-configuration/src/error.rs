use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid YAML configuration: {0}")]
    Parse(String),

    #[error("Unknown client '{0}'")]
    UnknownClient(String),

    #[error("Invalid DSN for client '{client}': {reason}")]
    InvalidDsn { client: String, reason: String },

    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),
}
