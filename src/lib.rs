//! pqkb - a knowledge base for persisted GraphQL queries
//!
//! This crate provides:
//! - Static analysis of operation documents (required variables)
//! - Ingestion of an operation manifest into an embedded, searchable store
//! - Similarity retrieval and prompt rendering for conversational agents
//! - Execution of persisted queries against a GraphQL router
//! - CLI commands and an MCP server over stdio

pub mod chunk;
pub mod commands;
pub mod config;
pub mod embed;
pub mod error;
pub mod executor;
pub mod graphql;
pub mod knowledge;
pub mod manifest;
pub mod mcp;
pub mod models;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
