//! Ingestion stages: format detection and parsing, normalization onto the
//! canonical schema, entity enrichment, and message embeddings.

pub mod embedding;
pub mod enrich;
pub mod error;
pub mod normalizer;
pub mod parser;
pub mod patterns;
pub mod preprocess;

pub use embedding::{Embedder, EmbeddingError, HashingEmbedder, MessageEmbedder, OllamaEmbedder};
pub use enrich::EntityEnricher;
pub use error::{IngestError, Result};
pub use normalizer::Normalizer;
pub use parser::{ParsedFields, ParsedRecord, Parser, ParserRegistry, RegistryConfig};
pub use preprocess::Preprocessor;
