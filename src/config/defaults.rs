//! Default values for configuration

/// Default storage backend
pub fn default_storage_backend() -> String {
    "sqlite".to_string()
}

/// Environment variable overriding `embedding.url`
pub const EMBEDDING_URL_ENV: &str = "PQKB_EMBEDDING_URL";

/// Environment variable overriding `storage.url`
pub const DATABASE_URL_ENV: &str = "PQKB_DATABASE_URL";

/// Default database URL (only used by server-backed stores)
pub fn default_database_url() -> Option<String> {
    None
}

/// Default embedding backend URL (OpenAI-compatible, e.g. LM Studio)
pub fn default_embedding_url() -> String {
    "http://localhost:1234/v1/".to_string()
}

/// Default embedding model
pub fn default_embedding_model() -> String {
    "text-embedding-nomic-embed-text-v1.5".to_string()
}

/// Default embedding dimension (nomic-embed-text-v1.5)
pub fn default_embedding_dimension() -> usize {
    768
}

/// Default environment variable holding the embedding API key
pub fn default_embedding_api_key_env() -> String {
    "PQKB_EMBEDDING_API_KEY".to_string()
}

/// Default batch size for embedding
pub fn default_embedding_batch_size() -> usize {
    32
}

/// Default embedding request timeout in seconds
pub fn default_embedding_timeout() -> u64 {
    30
}

/// Default chunk delimiter
pub fn default_chunk_delimiter() -> String {
    "|".to_string()
}

/// Default number of retrieved chunks
pub fn default_query_top_k() -> usize {
    crate::knowledge::DEFAULT_TOP_K
}

/// Default similarity floor (exclusive)
pub fn default_query_min_similarity() -> f32 {
    crate::knowledge::DEFAULT_MIN_SIMILARITY
}

/// Default environment variable holding the router bearer token
pub fn default_router_token_env() -> String {
    "PQKB_ROUTER_TOKEN".to_string()
}

/// Default apollographql-client-name header value
pub fn default_router_client_name() -> String {
    "apimgmt".to_string()
}

/// Default router request timeout in seconds
pub fn default_router_timeout() -> u64 {
    30
}

/// Default graph directory (holds the manifest and router config)
pub fn default_graph_dir() -> String {
    "graph".to_string()
}

/// Default manifest file name
pub fn default_manifest_file() -> String {
    "operation-manifest.json".to_string()
}

/// Default router configuration file name
pub fn default_router_config_file() -> String {
    "router.yaml".to_string()
}

/// Default directory of operation source files
pub fn default_operations_dir() -> String {
    "operations".to_string()
}

/// Default manifest generation command
pub fn default_generate_command() -> Vec<String> {
    [
        "npx",
        "generate-persisted-query-manifest",
        "--config",
        "operation-manifest.config.ts",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Default manifest publishing tool
pub fn default_publish_tool() -> String {
    "rover".to_string()
}

/// Default number of pages ingested concurrently
pub fn default_ingest_concurrency() -> usize {
    4
}
