use std::path::PathBuf;

use thiserror::Error;

use driftlog_compute::ScoringError;
use driftlog_ingest::{EmbeddingError, IngestError};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("input not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("scoring error: {0}")]
    Scoring(#[from] ScoringError),

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
