//! Configuration management for pqkb
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use crate::models::embedding_dimension_for_model;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Knowledge base storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Embedding model configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunk: ChunkConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub query: QueryConfig,

    /// Router (persisted query endpoint) configuration
    #[serde(default)]
    pub router: RouterConfig,

    /// Graph directory layout and offline tooling
    #[serde(default)]
    pub graph: GraphConfig,

    /// Ingestion configuration
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend kind: "sqlite" or "pgvector"
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// Connection URL for server-backed stores (pgvector)
    #[serde(default = "default_database_url", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of an OpenAI-compatible embeddings API
    #[serde(default = "default_embedding_url")]
    pub url: String,

    /// Model name/identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension (must match model)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Environment variable name for the API key (optional for local servers)
    #[serde(default = "default_embedding_api_key_env")]
    pub api_key_env: String,

    /// Batch size for embedding
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

impl EmbeddingConfig {
    /// Resolve the effective embedding dimension based on the configured model
    pub fn resolved_dimension(&self) -> usize {
        if let Some(expected) = embedding_dimension_for_model(&self.model) {
            if expected != self.dimension {
                warn!(
                    "Embedding dimension {} does not match model '{}' ({}); using {}",
                    self.dimension, self.model, expected, expected
                );
            }
            expected
        } else {
            self.dimension
        }
    }

    /// Get the embedding API key from environment
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
    }
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Delimiter that separates chunks in serialized page content
    #[serde(default = "default_chunk_delimiter")]
    pub delimiter: String,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Maximum number of chunks returned
    #[serde(default = "default_query_top_k")]
    pub top_k: usize,

    /// Results must score strictly above this cosine similarity
    #[serde(default = "default_query_min_similarity")]
    pub min_similarity: f32,
}

/// Router configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Environment variable name holding the bearer token
    #[serde(default = "default_router_token_env")]
    pub token_env: String,

    /// Value of the apollographql-client-name header
    #[serde(default = "default_router_client_name")]
    pub client_name: String,

    /// Request timeout in seconds
    #[serde(default = "default_router_timeout")]
    pub timeout_secs: u64,
}

impl RouterConfig {
    /// Get the router bearer token from environment
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.is_empty())
    }
}

/// Graph directory layout and offline tooling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Graph directory; relative paths resolve against the config file location
    #[serde(default = "default_graph_dir")]
    pub dir: String,

    /// Graph name used in page source names (`persisted-queries/<name>`)
    #[serde(default)]
    pub name: String,

    /// Operation manifest file name inside the graph directory
    #[serde(default = "default_manifest_file")]
    pub manifest_file: String,

    /// Router configuration file name inside the graph directory
    #[serde(default = "default_router_config_file")]
    pub router_config_file: String,

    /// Directory of `*.graphql` operation sources inside the graph directory
    #[serde(default = "default_operations_dir")]
    pub operations_dir: String,

    /// Command (program + args) that regenerates the manifest
    #[serde(default = "default_generate_command")]
    pub generate_command: Vec<String>,

    /// Program used to publish the manifest
    #[serde(default = "default_publish_tool")]
    pub publish_tool: String,
}

/// Ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Number of pages ingested concurrently
    #[serde(default = "default_ingest_concurrency")]
    pub concurrency: usize,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for pqkb data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            embedding: EmbeddingConfig::default(),
            chunk: ChunkConfig::default(),
            query: QueryConfig::default(),
            router: RouterConfig::default(),
            graph: GraphConfig::default(),
            ingest: IngestConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            url: default_database_url(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            api_key_env: default_embedding_api_key_env(),
            batch_size: default_embedding_batch_size(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            delimiter: default_chunk_delimiter(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: default_query_top_k(),
            min_similarity: default_query_min_similarity(),
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            token_env: default_router_token_env(),
            client_name: default_router_client_name(),
            timeout_secs: default_router_timeout(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            dir: default_graph_dir(),
            name: String::new(),
            manifest_file: default_manifest_file(),
            router_config_file: default_router_config_file(),
            operations_dir: default_operations_dir(),
            generate_command: default_generate_command(),
            publish_tool: default_publish_tool(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            concurrency: default_ingest_concurrency(),
        }
    }
}

impl Config {
    /// Get the default base directory for pqkb (~/.pqkb)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".pqkb")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("knowledge.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        // Set up paths based on config file location
        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("knowledge.db"),
            base_dir: base,
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Let `PQKB_EMBEDDING_URL` and `PQKB_DATABASE_URL` win over the file
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(url) = lookup(EMBEDDING_URL_ENV) {
            debug!("Embedding URL overridden by {}", EMBEDDING_URL_ENV);
            self.embedding.url = url;
        }
        if let Some(url) = lookup(DATABASE_URL_ENV) {
            debug!("Database URL overridden by {}", DATABASE_URL_ENV);
            self.storage.url = Some(url);
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Resolved graph directory
    pub fn graph_dir(&self) -> PathBuf {
        let dir = Path::new(&self.graph.dir);
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.paths.base_dir.join(dir)
        }
    }

    /// Path to the operation manifest
    pub fn manifest_path(&self) -> PathBuf {
        self.graph_dir().join(&self.graph.manifest_file)
    }

    /// Path to the router configuration
    pub fn router_config_path(&self) -> PathBuf {
        self.graph_dir().join(&self.graph.router_config_file)
    }

    /// Path to the operation sources directory
    pub fn operations_dir(&self) -> PathBuf {
        self.graph_dir().join(&self.graph.operations_dir)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        match self.storage.backend.as_str() {
            "sqlite" => {}
            "pgvector" => {
                if self.storage.url.is_none() {
                    return Err(Error::Config(
                        "storage.url is required for the pgvector backend".to_string(),
                    ));
                }
            }
            other => {
                return Err(Error::Config(format!(
                    "Unsupported storage backend '{}'; expected 'sqlite' or 'pgvector'",
                    other
                )));
            }
        }

        if self.chunk.delimiter.is_empty() {
            return Err(Error::Config("chunk.delimiter must not be empty".to_string()));
        }

        if self.embedding.dimension == 0 {
            return Err(Error::Config(
                "embedding.dimension must be greater than zero".to_string(),
            ));
        }

        if self.embedding.batch_size == 0 {
            return Err(Error::Config(
                "embedding.batch_size must be greater than zero".to_string(),
            ));
        }

        if !(-1.0..=1.0).contains(&self.query.min_similarity) {
            return Err(Error::Config(
                "query.min_similarity must be between -1.0 and 1.0".to_string(),
            ));
        }

        if self.ingest.concurrency == 0 {
            return Err(Error::Config(
                "ingest.concurrency must be greater than zero".to_string(),
            ));
        }

        if self.graph.generate_command.is_empty() {
            return Err(Error::Config(
                "graph.generate_command must name a program".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.storage.backend, "sqlite");
        assert_eq!(config.query.top_k, 4);
        assert_eq!(config.query.min_similarity, 0.5);
        assert_eq!(config.chunk.delimiter, "|");
        assert_eq!(config.router.client_name, "apimgmt");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_beat_saved_values() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.embedding.url = "http://saved:1234/v1/".to_string();
        config.save().unwrap();

        let mut loaded = Config::load(&config.paths.config_file).unwrap();
        loaded.apply_overrides_from(|name| match name {
            EMBEDDING_URL_ENV => Some("http://override:8080/v1/".to_string()),
            DATABASE_URL_ENV => Some("postgres://kb@localhost/kb".to_string()),
            _ => None,
        });
        assert_eq!(loaded.embedding.url, "http://override:8080/v1/");
        assert_eq!(loaded.storage.url.as_deref(), Some("postgres://kb@localhost/kb"));

        let mut untouched = Config::default();
        untouched.embedding.url = "http://saved:1234/v1/".to_string();
        untouched.apply_overrides_from(|_| Some(String::new()));
        assert_eq!(untouched.embedding.url, "http://saved:1234/v1/");
    }

    #[test]
    fn test_empty_router_token_is_absent() {
        let router = RouterConfig {
            token_env: "PQKB_TEST_EMPTY_ROUTER_TOKEN".to_string(),
            ..RouterConfig::default()
        };
        std::env::set_var(&router.token_env, "");
        assert_eq!(router.token(), None);
        std::env::set_var(&router.token_env, "secret");
        assert_eq!(router.token().as_deref(), Some("secret"));
        std::env::remove_var(&router.token_env);
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.graph.name = "flights".to_string();
        config.query.top_k = 8;

        config.save().unwrap();
        assert!(config.paths.config_file.exists());

        let loaded = Config::load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(loaded.graph.name, "flights");
        assert_eq!(loaded.query.top_k, 8);
        assert_eq!(loaded.paths.db_file, tmp.path().join("knowledge.db"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[query]\ntop_k = 2\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.query.top_k, 2);
        assert_eq!(config.query.min_similarity, 0.5);
        assert_eq!(config.graph.manifest_file, "operation-manifest.json");
        assert_eq!(config.manifest_path(), tmp.path().join("graph/operation-manifest.json"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.storage.backend = "mongo".to_string();
        assert!(config.validate().is_err());

        config.storage.backend = "pgvector".to_string();
        config.storage.url = None;
        assert!(config.validate().is_err());

        config.storage.url = Some("postgres://localhost/kb".to_string());
        assert!(config.validate().is_ok());

        config.chunk.delimiter = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_absolute_graph_dir_is_kept() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(PathBuf::from("/somewhere/else")));
        config.graph.dir = tmp.path().display().to_string();
        assert_eq!(config.graph_dir(), tmp.path());
    }

    #[test]
    fn test_resolved_dimension_matches_model() {
        let mut config = Config::default();
        config.embedding.model = "text-embedding-3-small".to_string();
        config.embedding.dimension = 768;

        assert_eq!(config.embedding.resolved_dimension(), 1536);
    }

    #[test]
    fn test_resolved_dimension_unknown_model_falls_back() {
        let mut config = Config::default();
        config.embedding.model = "custom-model".to_string();
        config.embedding.dimension = 512;

        assert_eq!(config.embedding.resolved_dimension(), 512);
    }
}
