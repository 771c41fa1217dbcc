//! JSON model artifacts on disk.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::{Result, ScoringError};

/// Read and decode an artifact. A missing file is reported distinctly from
/// a file that exists but does not decode.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(ScoringError::MissingArtifact(path.to_path_buf()));
    }
    let bytes = std::fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| ScoringError::InvalidArtifact {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_vec_pretty(value)?)?;
    Ok(())
}

pub(crate) fn invalid(path: &Path, reason: impl Into<String>) -> ScoringError {
    ScoringError::InvalidArtifact {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}
