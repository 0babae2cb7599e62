//! Knowledge base storage
//!
//! Resources hold serialized pages; chunks hold the embedded pieces of a
//! resource. Backends:
//! - SQLite (default): embeddings as little-endian `f32` blobs, cosine
//!   similarity computed in-process
//! - PostgreSQL with pgvector (feature `pgvector`)

mod schema;
mod sqlite;

#[cfg(feature = "pgvector")]
mod pgvector;

pub use sqlite::SqliteStore;

#[cfg(feature = "pgvector")]
pub use pgvector::PgVectorStore;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::EmbeddingProfile;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// A stored source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Resource {
    pub id: String,
    pub content: String,
    pub content_hash: String,
    pub created_at: String,
}

impl Resource {
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: Uuid::new_v4().to_string(),
            content_hash: content_hash(&content),
            content,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

/// blake3 digest of resource content
pub fn content_hash(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

/// A chunk and its embedding, ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedChunk {
    pub content: String,
    pub embedding: Vec<f32>,
}

/// A chunk returned by similarity search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Retrieved {
    pub content: String,
    pub similarity: f32,
}

/// Store-wide counts
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub backend: String,
    pub resource_count: usize,
    pub chunk_count: usize,
    pub embedding_profile: Option<EmbeddingProfile>,
}

const EMBEDDING_PROFILE_KEY: &str = "embedding_profile";

/// Storage collaborator of the knowledge base
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Short backend name for status output
    fn backend_name(&self) -> &'static str;

    /// Insert a resource row; the returned resource carries the new id
    async fn insert_resource(&self, content: &str) -> Result<Resource>;

    /// Insert chunk rows one at a time, returning how many were written.
    /// Rows written before a failure stay.
    async fn insert_chunks(&self, resource_id: &str, chunks: &[EmbeddedChunk]) -> Result<usize>;

    /// Chunks scoring strictly above `min_similarity`, best first, at most `limit`
    async fn select_by_similarity(
        &self,
        embedding: &[f32],
        min_similarity: f32,
        limit: usize,
    ) -> Result<Vec<Retrieved>>;

    /// Profile of the embeddings already stored, if any
    async fn embedding_profile(&self) -> Result<Option<EmbeddingProfile>>;

    async fn record_embedding_profile(&self, profile: &EmbeddingProfile) -> Result<()>;

    async fn resource_exists_with_hash(&self, content_hash: &str) -> Result<bool>;

    async fn stats(&self) -> Result<StoreStats>;
}

/// Cosine similarity of two vectors; 0.0 when either is all zeros or the
/// lengths differ
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Keep results above the floor, best first, truncated to `limit`
pub(crate) fn rank(mut results: Vec<Retrieved>, min_similarity: f32, limit: usize) -> Vec<Retrieved> {
    results.retain(|r| r.similarity > min_similarity);
    results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    results.truncate(limit);
    results
}

/// Open the configured store and make sure its schema exists
pub async fn connect_store(config: &Config, dimension: usize) -> Result<Arc<dyn KnowledgeStore>> {
    match config.storage.backend.as_str() {
        "sqlite" => {
            let store = SqliteStore::connect(&config.paths.db_file).await?;
            store.init_schema().await?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "pgvector")]
        "pgvector" => {
            let url = config.storage.url.as_deref().ok_or_else(|| {
                Error::Config("storage.url is required for the pgvector backend".to_string())
            })?;
            let store = PgVectorStore::connect(url).await?;
            store.init_schema(dimension).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "pgvector"))]
        "pgvector" => {
            let _ = dimension;
            Err(Error::Config(
                "pqkb was built without the 'pgvector' feature".to_string(),
            ))
        }
        other => Err(Error::Config(format!("Unsupported storage backend '{}'", other))),
    }
}
