//! Manifest maintenance commands

use crate::config::Config;
use crate::error::Result;
use crate::manifest::publish::{publish, PublishOutput};
use crate::manifest::regenerate::{merge_into_manifest, regenerate, RegenerateReport};
use tracing::info;

/// Regenerate the manifest; with `merge_only` the generator is not run
pub async fn cmd_regenerate(config: &Config, merge_only: bool) -> Result<RegenerateReport> {
    if merge_only {
        info!("Merging operation comments into {:?}", config.manifest_path());
        merge_into_manifest(config)
    } else {
        regenerate(config).await
    }
}

/// Publish the manifest to the graph registry
pub async fn cmd_publish(config: &Config) -> Result<PublishOutput> {
    publish(config).await
}

pub fn print_regenerate_report(report: &RegenerateReport) {
    println!("✓ Manifest updated: {}", report.manifest_path.display());
    println!("  Operations: {}", report.operations);
    println!("  With comments: {}", report.merge.merged.len());

    if !report.merge.unmatched.is_empty() {
        println!("\n⚠ Operation files without a manifest entry:");
        for name in &report.merge.unmatched {
            println!("  - {}", name);
        }
    }

    if !report.merge.failed.is_empty() {
        println!("\n✗ Operation files that failed to parse:");
        for failed in &report.merge.failed {
            println!("  - {}: {}", failed.file_name, failed.error);
        }
    }
}

pub fn print_publish_output(output: &PublishOutput) {
    println!("✓ Published persisted queries to {}", output.graph_ref);
    if !output.stdout.trim().is_empty() {
        println!("\n{}", output.stdout.trim_end());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_merge_only_skips_generator() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.graph.generate_command = vec!["pqkb-generator-that-does-not-exist".to_string()];

        std::fs::create_dir_all(config.operations_dir()).unwrap();
        std::fs::write(
            config.manifest_path(),
            r#"{"format": "apollo-persisted-query-manifest", "version": 1, "operations": [
                {"id": "a1", "name": "GetFlight", "type": "query", "body": "query GetFlight { flights { id } }"}
            ]}"#,
        )
        .unwrap();
        std::fs::write(
            config.operations_dir().join("GetFlight.graphql"),
            "# All flights\nquery GetFlight { flights { id } }\n",
        )
        .unwrap();

        let report = cmd_regenerate(&config, true).await.unwrap();
        assert_eq!(report.operations, 1);
        assert_eq!(report.merge.merged, vec!["GetFlight".to_string()]);

        assert!(cmd_regenerate(&config, false).await.is_err());
    }
}
