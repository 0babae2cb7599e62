//! Custom error types for pqkb

use thiserror::Error;

/// Main error type for pqkb operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed GraphQL operation document
    #[error("GraphQL parse error: {0}")]
    Parse(String),

    /// Operation manifest or router configuration could not be loaded
    #[error("Manifest read error: {0}")]
    ManifestRead(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Variables payload handed to the executor is not valid JSON
    #[error("Invalid JSON string for variables: {0}")]
    InvalidVariables(String),

    /// Network or HTTP failure talking to the router
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("External tool failed: {0}")]
    ExternalTool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("MCP protocol error: {0}")]
    McpProtocol(String),
}

/// Result type alias for pqkb
pub type Result<T> = std::result::Result<T, Error>;

/// Convert sqlx errors
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
