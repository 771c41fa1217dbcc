//! The message-embedding contract: backends turn non-empty texts into
//! fixed-width vectors, and [`MessageEmbedder`] maps a whole batch of log
//! messages onto them with one backend call.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding backend error: {0}")]
    Api(String),

    #[error("embedding width mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding count mismatch: sent {expected} messages, got {actual} vectors")]
    CountMismatch { expected: usize, actual: usize },
}

/// An embedding backend.
///
/// `embed_batch` receives only non-empty texts and must return exactly one
/// vector of width [`Embedder::dimensions`] per text, in order.
/// [`MessageEmbedder`] enforces both.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    fn dimensions(&self) -> usize;
}

/// Embeds a batch of log messages with a single backend call.
///
/// Empty messages are never sent; they get a zero vector of the backend's
/// declared dimension.
pub struct MessageEmbedder {
    embedder: Arc<dyn Embedder>,
}

impl MessageEmbedder {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    pub fn dimensions(&self) -> usize {
        self.embedder.dimensions()
    }

    /// One vector per message, in input order.
    pub async fn embed_messages(&self, messages: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let dims = self.embedder.dimensions();
        let mut out = vec![vec![0.0f32; dims]; messages.len()];

        let (indices, texts): (Vec<usize>, Vec<&str>) = messages
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.is_empty())
            .map(|(i, m)| (i, *m))
            .unzip();

        if texts.is_empty() {
            return Ok(out);
        }

        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: vectors.len(),
            });
        }

        for (idx, vector) in indices.into_iter().zip(vectors) {
            if vector.len() != dims {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: dims,
                    actual: vector.len(),
                });
            }
            out[idx] = vector;
        }

        debug!(messages = messages.len(), embedded = texts.len(), dims, "messages embedded");
        Ok(out)
    }
}
