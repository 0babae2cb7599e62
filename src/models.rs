//! Embedding model registry.
//!
//! Similarity scores are only comparable between vectors produced by the same
//! model, so the knowledge base records which model and dimension wrote its
//! embeddings and refuses to mix them.

use serde::{Deserialize, Serialize};

const NOMIC_EMBED_TEXT_V1_5: &str = "nomic-embed-text-v1.5";
const TEXT_EMBEDDING_ADA_002: &str = "text-embedding-ada-002";
const TEXT_EMBEDDING_3_SMALL: &str = "text-embedding-3-small";
const TEXT_EMBEDDING_3_LARGE: &str = "text-embedding-3-large";
const BGE_SMALL_EN_V1_5: &str = "BAAI/bge-small-en-v1.5";
const BGE_BASE_EN_V1_5: &str = "BAAI/bge-base-en-v1.5";
const ALL_MINILM_L6_V2: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Lookup the expected embedding dimension for a known model.
///
/// LM Studio prefixes model ids with `text-embedding-`, so
/// `text-embedding-nomic-embed-text-v1.5` resolves like `nomic-embed-text-v1.5`.
pub fn embedding_dimension_for_model(model: &str) -> Option<usize> {
    let base = model.strip_prefix("text-embedding-").filter(|rest| {
        rest.starts_with("nomic-")
    });
    match base.unwrap_or(model) {
        NOMIC_EMBED_TEXT_V1_5 => Some(768),
        TEXT_EMBEDDING_ADA_002 | TEXT_EMBEDDING_3_SMALL => Some(1536),
        TEXT_EMBEDDING_3_LARGE => Some(3072),
        BGE_SMALL_EN_V1_5 | ALL_MINILM_L6_V2 => Some(384),
        BGE_BASE_EN_V1_5 => Some(768),
        _ => None,
    }
}

pub fn supported_embedding_models() -> Vec<&'static str> {
    vec![
        NOMIC_EMBED_TEXT_V1_5,
        TEXT_EMBEDDING_ADA_002,
        TEXT_EMBEDDING_3_SMALL,
        TEXT_EMBEDDING_3_LARGE,
        BGE_SMALL_EN_V1_5,
        BGE_BASE_EN_V1_5,
        ALL_MINILM_L6_V2,
    ]
}

/// The model and dimension that produced the stored embeddings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingProfile {
    pub model: String,
    pub dimension: usize,
}

impl EmbeddingProfile {
    pub fn new(model: impl Into<String>, dimension: usize) -> Self {
        Self {
            model: model.into(),
            dimension,
        }
    }

    /// Describe how `other` differs from this profile, if it does
    pub fn mismatch(&self, other: &EmbeddingProfile) -> Option<String> {
        if self == other {
            return None;
        }
        Some(format!(
            "knowledge base was embedded with '{}' ({} dims) but the configured embedder is '{}' ({} dims); re-ingest into a fresh store to switch models",
            self.model, self.dimension, other.model, other.dimension
        ))
    }
}
