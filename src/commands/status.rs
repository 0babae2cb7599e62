//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::manifest::{load_manifest, load_router_listen_host};
use crate::store::{connect_store, StoreStats};
use serde::Serialize;
use tracing::{debug, info};

/// Status information
#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub storage_backend: String,
    pub db_path: String,
    pub embedding_url: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub graph_dir: String,
    /// Operations in the manifest, if it could be read
    pub manifest_operations: Option<usize>,
    pub router_listen_host: Option<String>,
    pub store_connected: bool,
    pub store_stats: Option<StoreStats>,
}

/// Get system status
pub async fn cmd_status(config: &Config) -> Result<StatusInfo> {
    info!("Getting status");

    let manifest_operations = match load_manifest(&config.manifest_path()) {
        Ok(manifest) => Some(manifest.operations.len()),
        Err(e) => {
            debug!("Manifest unavailable: {}", e);
            None
        }
    };
    let router_listen_host = load_router_listen_host(&config.router_config_path()).ok();

    let dimension = config.embedding.resolved_dimension();
    let store_stats = match connect_store(config, dimension).await {
        Ok(store) => match store.stats().await {
            Ok(stats) => Some(stats),
            Err(e) => {
                debug!("Store stats error: {:?}", e);
                None
            }
        },
        Err(e) => {
            debug!("Store connection error: {:?}", e);
            None
        }
    };

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        storage_backend: config.storage.backend.clone(),
        db_path: config.paths.db_file.display().to_string(),
        embedding_url: config.embedding.url.clone(),
        embedding_model: config.embedding.model.clone(),
        embedding_dimension: dimension,
        graph_dir: config.graph_dir().display().to_string(),
        manifest_operations,
        router_listen_host,
        store_connected: store_stats.is_some(),
        store_stats,
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 pqkb Status\n");
    println!("Configuration: {}", status.config_path);

    println!("\nGraph:");
    println!("  Directory: {}", status.graph_dir);
    match status.manifest_operations {
        Some(count) => println!("  Manifest: {} operations", count),
        None => println!("  Manifest: ✗ not found or unreadable"),
    }
    match &status.router_listen_host {
        Some(host) => println!("  Router: {}", host),
        None => println!("  Router: ✗ router config not found or unreadable"),
    }

    println!("\nEmbedding:");
    println!("  URL: {}", status.embedding_url);
    println!(
        "  Model: {} ({} dims)",
        status.embedding_model, status.embedding_dimension
    );

    println!("\nKnowledge base ({}):", status.storage_backend);
    if status.storage_backend == "sqlite" {
        println!("  Database: {}", status.db_path);
    }
    match &status.store_stats {
        Some(stats) => {
            println!("  Status: ✓ Connected");
            println!("  Resources: {}", stats.resource_count);
            println!("  Chunks: {}", stats.chunk_count);
            if let Some(profile) = &stats.embedding_profile {
                println!(
                    "  Embedded with: {} ({} dims)",
                    profile.model, profile.dimension
                );
            }
        }
        None => println!("  Status: ✗ Not connected"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_status_on_empty_layout() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));

        let status = cmd_status(&config).await.unwrap();
        assert_eq!(status.manifest_operations, None);
        assert_eq!(status.router_listen_host, None);
        assert!(status.store_connected);

        let stats = status.store_stats.unwrap();
        assert_eq!(stats.resource_count, 0);
        assert_eq!(stats.embedding_profile, None);
    }

    #[tokio::test]
    async fn test_status_reads_graph_files() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        std::fs::create_dir_all(config.graph_dir()).unwrap();
        std::fs::write(config.manifest_path(), r#"{"operations": []}"#).unwrap();
        std::fs::write(config.router_config_path(), "supergraph:\n  listen: 0.0.0.0:4100\n").unwrap();

        let status = cmd_status(&config).await.unwrap();
        assert_eq!(status.manifest_operations, Some(0));
        assert_eq!(status.router_listen_host.as_deref(), Some("0.0.0.0:4100"));
    }
}
