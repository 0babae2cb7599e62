//! Schema definitions

/// SQL schema for the SQLite knowledge base
pub const SQLITE_SCHEMA_SQL: &str = r#"
-- Resources: serialized pages
CREATE TABLE IF NOT EXISTS resources (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Chunks: embedded pieces of a resource
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    resource_id TEXT NOT NULL REFERENCES resources(id) ON DELETE CASCADE,
    content TEXT NOT NULL CHECK (length(content) > 0),
    embedding BLOB NOT NULL
);

-- Key/value metadata (embedding profile)
CREATE TABLE IF NOT EXISTS kb_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_resources_hash ON resources(content_hash);
CREATE INDEX IF NOT EXISTS idx_chunks_resource ON chunks(resource_id);
"#;

/// Statements creating the pgvector schema for `dimension`-sized embeddings
#[cfg(feature = "pgvector")]
pub fn pgvector_schema(dimension: usize) -> Vec<String> {
    vec![
        "CREATE EXTENSION IF NOT EXISTS vector".to_string(),
        "CREATE TABLE IF NOT EXISTS resources (\
            id TEXT PRIMARY KEY, \
            content TEXT NOT NULL, \
            content_hash TEXT NOT NULL, \
            created_at TEXT NOT NULL\
        )"
        .to_string(),
        format!(
            "CREATE TABLE IF NOT EXISTS chunks (\
                id TEXT PRIMARY KEY, \
                resource_id TEXT NOT NULL REFERENCES resources(id) ON DELETE CASCADE, \
                content TEXT NOT NULL CHECK (length(content) > 0), \
                embedding vector({dimension}) NOT NULL\
            )"
        ),
        "CREATE TABLE IF NOT EXISTS kb_meta (key TEXT PRIMARY KEY, value TEXT NOT NULL)".to_string(),
        "CREATE INDEX IF NOT EXISTS idx_resources_hash ON resources(content_hash)".to_string(),
        "CREATE INDEX IF NOT EXISTS idx_chunks_embedding ON chunks USING hnsw (embedding vector_cosine_ops)"
            .to_string(),
    ]
}
