//! PostgreSQL + pgvector knowledge store
//!
//! Similarity is computed by the database: `1 - (embedding <=> query)` is the
//! cosine similarity, since `<=>` is pgvector's cosine distance operator.

use super::schema::pgvector_schema;
use super::{
    EmbeddedChunk, KnowledgeStore, Resource, Retrieved, StoreStats, EMBEDDING_PROFILE_KEY,
};
use crate::error::{Error, Result};
use crate::models::EmbeddingProfile;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

/// pgvector expects vectors as text like `[1,2,3]`
fn vector_literal(embedding: &[f32]) -> String {
    format!(
        "[{}]",
        embedding
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",")
    )
}

/// Knowledge store backed by PostgreSQL with the pgvector extension
pub struct PgVectorStore {
    pool: PgPool,
}

impl PgVectorStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        debug!("Connecting to PostgreSQL");
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Create the extension, tables and indexes
    pub async fn init_schema(&self, dimension: usize) -> Result<()> {
        for statement in pgvector_schema(dimension) {
            sqlx::query(&statement).execute(&self.pool).await?;
        }
        debug!(dimension, "pgvector schema ready");
        Ok(())
    }
}

#[async_trait]
impl KnowledgeStore for PgVectorStore {
    fn backend_name(&self) -> &'static str {
        "pgvector"
    }

    async fn insert_resource(&self, content: &str) -> Result<Resource> {
        let resource = Resource::new(content);
        sqlx::query(
            "INSERT INTO resources (id, content, content_hash, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(&resource.id)
        .bind(&resource.content)
        .bind(&resource.content_hash)
        .bind(&resource.created_at)
        .execute(&self.pool)
        .await?;
        Ok(resource)
    }

    async fn insert_chunks(&self, resource_id: &str, chunks: &[EmbeddedChunk]) -> Result<usize> {
        let mut written = 0;
        for chunk in chunks {
            sqlx::query(
                "INSERT INTO chunks (id, resource_id, content, embedding) VALUES ($1, $2, $3, $4::vector)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(resource_id)
            .bind(&chunk.content)
            .bind(vector_literal(&chunk.embedding))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Storage(format!(
                    "failed to write chunk {} of resource {}: {}",
                    written + 1,
                    resource_id,
                    e
                ))
            })?;
            written += 1;
        }
        Ok(written)
    }

    async fn select_by_similarity(
        &self,
        embedding: &[f32],
        min_similarity: f32,
        limit: usize,
    ) -> Result<Vec<Retrieved>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT content, 1 - (embedding <=> $1::vector) AS similarity \
             FROM chunks \
             WHERE 1 - (embedding <=> $1::vector) > $2 \
             ORDER BY similarity DESC \
             LIMIT $3",
        )
        .bind(vector_literal(embedding))
        .bind(min_similarity as f64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let similarity: f64 = row.try_get("similarity")?;
                Ok(Retrieved {
                    content: row.try_get("content")?,
                    similarity: similarity as f32,
                })
            })
            .collect()
    }

    async fn embedding_profile(&self) -> Result<Option<EmbeddingProfile>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM kb_meta WHERE key = $1")
            .bind(EMBEDDING_PROFILE_KEY)
            .fetch_optional(&self.pool)
            .await?;
        value
            .map(|v| serde_json::from_str(&v).map_err(Error::from))
            .transpose()
    }

    async fn record_embedding_profile(&self, profile: &EmbeddingProfile) -> Result<()> {
        sqlx::query(
            "INSERT INTO kb_meta (key, value) VALUES ($1, $2) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(EMBEDDING_PROFILE_KEY)
        .bind(serde_json::to_string(profile)?)
        .execute(&self.pool)
        .await?;
        info!(
            "Recorded embedding profile {} ({} dims)",
            profile.model, profile.dimension
        );
        Ok(())
    }

    async fn resource_exists_with_hash(&self, content_hash: &str) -> Result<bool> {
        let found: Option<i32> =
            sqlx::query_scalar("SELECT 1 FROM resources WHERE content_hash = $1 LIMIT 1")
                .bind(content_hash)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let resource_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM resources")
            .fetch_one(&self.pool)
            .await?;
        let chunk_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreStats {
            backend: self.backend_name().to_string(),
            resource_count: resource_count as usize,
            chunk_count: chunk_count as usize,
            embedding_profile: self.embedding_profile().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_literal() {
        assert_eq!(vector_literal(&[1.0, -0.5, 0.25]), "[1,-0.5,0.25]");
        assert_eq!(vector_literal(&[]), "[]");
    }
}
