//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::connect_store;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub base_dir: PathBuf,
    pub force: bool,
}

/// What `init` created
#[derive(Debug, Clone, Serialize)]
pub struct InitReport {
    pub config_path: PathBuf,
    pub graph_dir: PathBuf,
    pub db_path: PathBuf,
}

/// Write a default config, create the graph directory and the knowledge store
pub async fn cmd_init(options: InitOptions) -> Result<InitReport> {
    let mut config = Config::default();
    config.init_paths(Some(options.base_dir));

    if config.paths.config_file.exists() && !options.force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config.paths.config_file.display()
        )));
    }

    config.save()?;

    let graph_dir = config.graph_dir();
    std::fs::create_dir_all(config.operations_dir())?;
    info!("Created graph directory {:?}", graph_dir);

    connect_store(&config, config.embedding.resolved_dimension()).await?;

    Ok(InitReport {
        config_path: config.paths.config_file.clone(),
        graph_dir,
        db_path: config.paths.db_file.clone(),
    })
}

pub fn print_init_report(report: &InitReport) {
    println!("✓ pqkb initialized successfully");
    println!("  Config: {}", report.config_path.display());
    println!("  Graph directory: {}", report.graph_dir.display());
    println!("\nNext steps:");
    println!("  1. Put operation-manifest.json and router.yaml in the graph directory");
    println!("  2. Start an OpenAI-compatible embedding server (see [embedding] in the config)");
    println!("  3. Ingest the manifest: pqkb ingest");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_creates_layout() {
        let tmp = TempDir::new().unwrap();
        let report = cmd_init(InitOptions {
            base_dir: tmp.path().to_path_buf(),
            force: false,
        })
        .await
        .unwrap();

        assert!(report.config_path.exists());
        assert!(report.graph_dir.join("operations").is_dir());
        assert!(report.db_path.exists());

        let loaded = Config::load(&report.config_path).unwrap();
        assert_eq!(loaded.router.client_name, "apimgmt");
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite() {
        let tmp = TempDir::new().unwrap();
        let options = InitOptions {
            base_dir: tmp.path().to_path_buf(),
            force: false,
        };
        cmd_init(options.clone()).await.unwrap();

        let err = cmd_init(options).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        cmd_init(InitOptions {
            base_dir: tmp.path().to_path_buf(),
            force: true,
        })
        .await
        .unwrap();
    }
}
