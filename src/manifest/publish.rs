//! Publishing the manifest to the graph registry with `rover`

use crate::config::Config;
use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

const GRAPH_REF_VAR: &str = "APOLLO_GRAPH_REF";
const API_KEY_VAR: &str = "APOLLO_KEY";

/// Registry credentials read from the graph directory's `.env`
#[derive(Debug, Clone)]
pub struct PublishCredentials {
    pub graph_ref: String,
    pub api_key: String,
}

/// Captured output of the publish tool
#[derive(Debug, Clone, Serialize)]
pub struct PublishOutput {
    pub graph_ref: String,
    pub stdout: String,
    pub stderr: String,
}

/// Read `APOLLO_GRAPH_REF` and `APOLLO_KEY` from an env file without
/// touching the process environment
pub fn read_credentials(env_file: &Path) -> Result<PublishCredentials> {
    let iter = dotenvy::from_path_iter(env_file).map_err(|e| {
        Error::Config(format!("cannot read {}: {}", env_file.display(), e))
    })?;

    let mut vars = HashMap::new();
    for item in iter {
        let (key, value) = item.map_err(|e| {
            Error::Config(format!("invalid {}: {}", env_file.display(), e))
        })?;
        vars.insert(key, value);
    }

    let mut take = |name: &str| {
        vars.remove(name).filter(|v| !v.is_empty()).ok_or_else(|| {
            Error::Config(format!("{} is not set in {}", name, env_file.display()))
        })
    };

    Ok(PublishCredentials {
        graph_ref: take(GRAPH_REF_VAR)?,
        api_key: take(API_KEY_VAR)?,
    })
}

/// Publish the manifest with `<tool> persisted-queries publish`
pub async fn publish(config: &Config) -> Result<PublishOutput> {
    let graph_dir = config.graph_dir();
    let credentials = read_credentials(&graph_dir.join(".env"))?;
    let tool = &config.graph.publish_tool;

    info!(
        "Publishing persisted queries for {} from {:?}",
        credentials.graph_ref, graph_dir
    );
    debug!("Running {} in {:?}", tool, graph_dir);

    let output = Command::new(tool)
        .args([
            "persisted-queries",
            "publish",
            &credentials.graph_ref,
            "--manifest",
            &config.graph.manifest_file,
        ])
        .current_dir(&graph_dir)
        .env(API_KEY_VAR, &credentials.api_key)
        .output()
        .await
        .map_err(|e| Error::ExternalTool(format!("failed to run {}: {}", tool, e)))?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if !output.status.success() {
        return Err(Error::ExternalTool(format!(
            "{} exited with {}: {}",
            tool,
            output.status,
            stderr.trim()
        )));
    }

    Ok(PublishOutput {
        graph_ref: credentials.graph_ref,
        stdout,
        stderr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_credentials() {
        let tmp = TempDir::new().unwrap();
        let env_file = tmp.path().join(".env");
        std::fs::write(
            &env_file,
            "APOLLO_KEY=service:flights:abc\nAPOLLO_GRAPH_REF=flights@current\nOTHER=1\n",
        )
        .unwrap();

        let credentials = read_credentials(&env_file).unwrap();
        assert_eq!(credentials.graph_ref, "flights@current");
        assert_eq!(credentials.api_key, "service:flights:abc");
    }

    #[test]
    fn test_missing_variable_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let env_file = tmp.path().join(".env");
        std::fs::write(&env_file, "APOLLO_GRAPH_REF=flights@current\n").unwrap();

        let err = read_credentials(&env_file).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("APOLLO_KEY")));

        let err = read_credentials(&tmp.path().join("missing.env")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_missing_tool_is_external_tool_error() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.graph.publish_tool = "pqkb-no-such-publish-tool".to_string();
        std::fs::create_dir_all(config.graph_dir()).unwrap();
        std::fs::write(
            config.graph_dir().join(".env"),
            "APOLLO_GRAPH_REF=flights@current\nAPOLLO_KEY=key\n",
        )
        .unwrap();

        let err = publish(&config).await.unwrap_err();
        assert!(matches!(err, Error::ExternalTool(_)));
    }
}
