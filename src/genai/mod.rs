//! Generative-AI collaborator: text embeddings and streaming generation.
//!
//! The chat pipeline only sees the [`EmbeddingProvider`] and
//! [`GenerationProvider`] traits; [`create_providers`] builds the configured
//! backend (currently Gemini).

pub mod gemini;

use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;

use crate::config::GenAiConfig;

/// Text fragments in arrival order. An `Err` item means the upstream failed
/// mid-stream; nothing after it is meaningful.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Turns text into a fixed-length vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Identifier of the embedding model; stored alongside every vector.
    fn model(&self) -> &str;
}

/// Produces a reply incrementally.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Start generating a reply to `prompt`. Dropping the returned stream
    /// abandons the upstream request.
    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream>;
}

/// Build the embedding and generation providers from config.
pub fn create_providers(
    config: &GenAiConfig,
) -> Result<(Arc<dyn EmbeddingProvider>, Arc<dyn GenerationProvider>)> {
    let client = Arc::new(gemini::GeminiClient::new(config)?);
    let embedding: Arc<dyn EmbeddingProvider> = client.clone();
    let generation: Arc<dyn GenerationProvider> = client;
    Ok((embedding, generation))
}
