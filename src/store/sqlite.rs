//! SQLite knowledge store

use super::schema::SQLITE_SCHEMA_SQL;
use super::{
    cosine_similarity, rank, EmbeddedChunk, KnowledgeStore, Resource, Retrieved, StoreStats,
    EMBEDDING_PROFILE_KEY,
};
use crate::error::{Error, Result};
use crate::models::EmbeddingProfile;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

/// A stored chunk with its decoded embedding
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: String,
    pub resource_id: String,
    pub content: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, FromRow)]
struct ChunkRow {
    id: String,
    resource_id: String,
    content: String,
    embedding: Vec<u8>,
}

impl ChunkRow {
    fn into_stored(self) -> Result<StoredChunk> {
        Ok(StoredChunk {
            embedding: decode_embedding(&self.embedding)?,
            id: self.id,
            resource_id: self.resource_id,
            content: self.content,
        })
    }
}

/// Encode an embedding as little-endian `f32` bytes
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode little-endian `f32` bytes
pub fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::Storage(format!(
            "Corrupt embedding blob of {} bytes",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Knowledge store backed by a local SQLite database
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `db_path`
    pub async fn connect(db_path: &Path) -> Result<Self> {
        // Create parent directory if needed
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        debug!("Initializing knowledge base schema");
        sqlx::query(SQLITE_SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='resources'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    /// Get resource by ID
    pub async fn get_resource(&self, id: &str) -> Result<Option<Resource>> {
        let resource = sqlx::query_as::<_, Resource>("SELECT * FROM resources WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(resource)
    }

    /// Chunks of one resource
    pub async fn chunks_for_resource(&self, resource_id: &str) -> Result<Vec<StoredChunk>> {
        let rows = sqlx::query_as::<_, ChunkRow>(
            "SELECT id, resource_id, content, embedding FROM chunks WHERE resource_id = ? ORDER BY rowid",
        )
        .bind(resource_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ChunkRow::into_stored).collect()
    }

    /// Delete a resource; its chunks go with it
    pub async fn delete_resource(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM resources WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn insert_resource(&self, content: &str) -> Result<Resource> {
        let resource = Resource::new(content);
        sqlx::query(
            r#"
            INSERT INTO resources (id, content, content_hash, created_at)
            VALUES (?, ?, ?, ?)
            "#,
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
                r#"
                INSERT INTO chunks (id, resource_id, content, embedding)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(resource_id)
            .bind(&chunk.content)
            .bind(encode_embedding(&chunk.embedding))
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

        let rows: Vec<(String, Vec<u8>)> =
            sqlx::query_as("SELECT content, embedding FROM chunks")
                .fetch_all(&self.pool)
                .await?;

        let mut results = Vec::with_capacity(rows.len());
        for (content, blob) in rows {
            let stored = decode_embedding(&blob)?;
            results.push(Retrieved {
                similarity: cosine_similarity(embedding, &stored),
                content,
            });
        }

        Ok(rank(results, min_similarity, limit))
    }

    async fn embedding_profile(&self) -> Result<Option<EmbeddingProfile>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM kb_meta WHERE key = ?")
                .bind(EMBEDDING_PROFILE_KEY)
                .fetch_optional(&self.pool)
                .await?;
        value
            .map(|v| serde_json::from_str(&v).map_err(Error::from))
            .transpose()
    }

    async fn record_embedding_profile(&self, profile: &EmbeddingProfile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kb_meta (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
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
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM resources WHERE content_hash = ? LIMIT 1")
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
