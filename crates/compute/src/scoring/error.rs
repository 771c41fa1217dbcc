use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("model artifact not found: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("invalid model artifact {}: {reason}", path.display())]
    InvalidArtifact { path: PathBuf, reason: String },

    #[error("{model}: expected {expected} features, got {actual}")]
    Dimension {
        model: String,
        expected: usize,
        actual: usize,
    },

    #[error("{model}: returned {actual} scores for {expected} rows")]
    ScoreCount {
        model: String,
        expected: usize,
        actual: usize,
    },

    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ScoringError>;
