use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use driftlog_core::config::EmbeddingConfig;

use super::message::{Embedder, EmbeddingError};

/// Per-batch request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Message embeddings from an Ollama server (`POST {url}/api/embed`).
///
/// Over-long log lines are truncated server-side to the model's context
/// rather than rejected.
pub struct OllamaEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    truncate: bool,
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaEmbedder {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/embed", config.ollama_url.trim_end_matches('/')),
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request<'a>(&'a self, texts: &'a [&'a str]) -> EmbedRequest<'a> {
        EmbedRequest {
            model: &self.model,
            input: texts,
            truncate: true,
        }
    }
}

/// A body-level `error` wins over whatever vectors came with it.
fn into_vectors(response: EmbedResponse) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    match response.error {
        Some(message) => Err(EmbeddingError::Api(message)),
        None => Ok(response.embeddings),
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.request(texts))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api(format!("{} returned {status}: {body}", self.model)));
        }

        let vectors = into_vectors(response.json().await?)?;
        debug!(messages = texts.len(), vectors = vectors.len(), model = %self.model, "ollama batch embedded");
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
