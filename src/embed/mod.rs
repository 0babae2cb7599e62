//! Embedding generation
//!
//! This module provides an abstraction over embedding models with:
//! - A trait for different embedding backends
//! - An OpenAI-compatible HTTP backend (LM Studio, OpenAI, ...)
//! - An optional local FastEmbed backend
//! - Batch processing for efficiency

mod http_backend;

#[cfg(feature = "local-embed")]
mod fastembed_impl;

pub use http_backend::*;

#[cfg(feature = "local-embed")]
pub use fastembed_impl::*;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use crate::models::EmbeddingProfile;
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for embedding providers
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input in input order
    async fn embed_many(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_many(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("Embedding backend returned no vectors".to_string()))
    }

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Model and dimension recorded alongside stored embeddings
    fn profile(&self) -> EmbeddingProfile {
        EmbeddingProfile::new(self.model_name(), self.dimension())
    }
}

/// Create an embedder based on configuration.
///
/// Model names FastEmbed knows are embedded locally when the `local-embed`
/// feature is enabled; everything else goes to the HTTP endpoint.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    #[cfg(feature = "local-embed")]
    {
        if FastEmbedder::supports(&config.model) {
            return Ok(Arc::new(FastEmbedder::new(config)?));
        }
    }

    Ok(Arc::new(HttpEmbedder::new(config)?))
}

/// Helper to embed in batches
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: Vec<String>,
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut all_embeddings = Vec::with_capacity(texts.len());

    for chunk in texts.chunks(batch_size.max(1)) {
        let batch_texts: Vec<String> = chunk.to_vec();
        let embeddings = embedder.embed_many(batch_texts).await?;
        all_embeddings.extend(embeddings);
    }

    if all_embeddings.len() != texts.len() {
        return Err(Error::Embedding(format!(
            "Expected {} embeddings, got {}",
            texts.len(),
            all_embeddings.len()
        )));
    }

    Ok(all_embeddings)
}
