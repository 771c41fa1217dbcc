//! Ingest error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parser config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid trigger pattern for parser '{parser}': {source}")]
    Pattern {
        parser: String,
        #[source]
        source: regex::Error,
    },

    #[error("parser not registered: {0}")]
    UnknownParser(String),
}

pub type Result<T> = std::result::Result<T, IngestError>;
