pub mod hashing;
pub mod message;
pub mod ollama;

use std::sync::Arc;

use driftlog_core::config::EmbeddingConfig;

pub use hashing::HashingEmbedder;
pub use message::{Embedder, EmbeddingError, MessageEmbedder};
pub use ollama::OllamaEmbedder;

/// Build the configured backend. Unknown providers fall back to hashing.
pub fn from_config(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, EmbeddingError> {
    Ok(match config.provider.as_str() {
        "ollama" => Arc::new(OllamaEmbedder::from_config(config)?),
        "hashing" => Arc::new(HashingEmbedder::new(config.dimensions)),
        other => {
            tracing::warn!(provider = %other, "unknown embedding provider, using hashing");
            Arc::new(HashingEmbedder::new(config.dimensions))
        }
    })
}
