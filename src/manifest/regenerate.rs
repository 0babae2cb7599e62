//! Manifest regeneration
//!
//! Runs the external manifest generator, then copies each operation file's
//! leading `#` comment block onto the matching manifest entry so the
//! descriptions survive into the knowledge base.

use super::{load_manifest, OperationManifest};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::graphql;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// An operation source file
#[derive(Debug, Clone)]
pub struct OperationSource {
    pub file_name: String,
    pub source: String,
}

/// A source file that could not be parsed
#[derive(Debug, Clone, Serialize)]
pub struct FailedSource {
    pub file_name: String,
    pub error: String,
}

/// Outcome of merging comments into a manifest
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeReport {
    /// Operations whose body received a comment block
    pub merged: Vec<String>,
    /// Named operations with no manifest entry
    pub unmatched: Vec<String>,
    pub failed: Vec<FailedSource>,
}

/// Lines at the top of `source` whose left-trimmed text starts with `#`
pub fn leading_comments(source: &str) -> Vec<&str> {
    source
        .split('\n')
        .take_while(|line| line.trim_start().starts_with('#'))
        .collect()
}

/// Prepend each source's leading comments to the manifest operation it defines.
///
/// Sources whose first definition is not a named operation are ignored.
/// Operations are never added to the manifest.
pub fn merge_leading_comments(
    manifest: &mut OperationManifest,
    sources: &[OperationSource],
) -> MergeReport {
    let mut report = MergeReport::default();
    let mut index: HashMap<String, usize> = HashMap::new();
    for (i, operation) in manifest.operations.iter().enumerate() {
        index.insert(operation.name.clone(), i);
    }

    for source in sources {
        let name = match graphql::leading_operation_name(&source.source) {
            Ok(Some(name)) => name,
            Ok(None) => {
                debug!("{} does not start with a named operation", source.file_name);
                continue;
            }
            Err(e) => {
                warn!("Skipping {}: {}", source.file_name, e);
                report.failed.push(FailedSource {
                    file_name: source.file_name.clone(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        let Some(&position) = index.get(&name) else {
            debug!("Operation '{}' is not in the manifest", name);
            report.unmatched.push(name);
            continue;
        };

        let comments = leading_comments(&source.source);
        if comments.is_empty() {
            continue;
        }

        let block = format!("{}\n", comments.join("\n"));
        let operation = &mut manifest.operations[position];
        if operation.body.starts_with(&block) {
            debug!("Operation '{}' already carries its comments", name);
            continue;
        }
        operation.body = format!("{}{}", block, operation.body);
        report.merged.push(name);
    }

    report
}

/// Read every `*.graphql` file directly inside `dir`, sorted by file name
pub fn read_operation_sources(dir: &Path) -> Result<Vec<OperationSource>> {
    let mut sources = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|ext| ext.to_str()) != Some("graphql")
        {
            continue;
        }

        sources.push(OperationSource {
            file_name: entry.file_name().to_string_lossy().to_string(),
            source: std::fs::read_to_string(path)?,
        });
    }

    Ok(sources)
}

/// Run `command` in `dir` with inherited stdio
pub async fn run_generator(command: &[String], dir: &Path) -> Result<()> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| Error::Config("graph.generate_command is empty".to_string()))?;

    info!("Generating manifest in {:?} with {}", dir, program);
    let status = Command::new(program)
        .args(args)
        .current_dir(dir)
        .status()
        .await
        .map_err(|e| Error::ExternalTool(format!("failed to run {}: {}", program, e)))?;

    if !status.success() {
        return Err(Error::ExternalTool(format!(
            "{} exited with {}",
            program, status
        )));
    }
    Ok(())
}

/// Result of a regeneration run
#[derive(Debug, Clone, Serialize)]
pub struct RegenerateReport {
    pub manifest_path: PathBuf,
    pub operations: usize,
    #[serde(flatten)]
    pub merge: MergeReport,
}

/// Regenerate the manifest and merge comments from the operation sources
pub async fn regenerate(config: &Config) -> Result<RegenerateReport> {
    let graph_dir = config.graph_dir();
    run_generator(&config.graph.generate_command, &graph_dir).await?;
    merge_into_manifest(config)
}

/// Merge comments into the manifest on disk without running the generator
pub fn merge_into_manifest(config: &Config) -> Result<RegenerateReport> {
    let manifest_path = config.manifest_path();
    let mut manifest = load_manifest(&manifest_path)?;
    let sources = read_operation_sources(&config.operations_dir())?;

    let merge = merge_leading_comments(&mut manifest, &sources);
    std::fs::write(&manifest_path, manifest.to_pretty_json()?)?;

    info!(
        "Rewrote {:?}: {} operations, {} with comments",
        manifest_path,
        manifest.operations.len(),
        merge.merged.len()
    );

    Ok(RegenerateReport {
        manifest_path,
        operations: manifest.operations.len(),
        merge,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{Operation, OperationType};
    use serde_json::Map;
    use tempfile::TempDir;

    fn manifest() -> OperationManifest {
        OperationManifest {
            extra: Map::new(),
            operations: vec![Operation {
                id: "5b2f0a1c".to_string(),
                name: "GetFlight".to_string(),
                operation_type: OperationType::Query,
                body: "query GetFlight($id: ID!) { flight(id: $id) { id } }".to_string(),
            }],
        }
    }

    fn source(file_name: &str, source: &str) -> OperationSource {
        OperationSource {
            file_name: file_name.to_string(),
            source: source.to_string(),
        }
    }

    #[test]
    fn test_leading_comments_stop_at_first_code_line() {
        let source = "# Fetch one flight\n  # by id\nquery A { a }\n# trailing";
        assert_eq!(leading_comments(source), vec!["# Fetch one flight", "  # by id"]);
        assert!(leading_comments("query A { a }").is_empty());
    }

    #[test]
    fn test_merge_prepends_comments() {
        let mut manifest = manifest();
        let sources = vec![source(
            "GetFlight.graphql",
            "# Look up a flight by id\nquery GetFlight($id: ID!) { flight(id: $id) { id } }\n",
        )];

        let report = merge_leading_comments(&mut manifest, &sources);
        assert_eq!(report.merged, vec!["GetFlight"]);
        assert_eq!(
            manifest.operations[0].body,
            "# Look up a flight by id\nquery GetFlight($id: ID!) { flight(id: $id) { id } }"
        );
    }

    #[test]
    fn test_merge_twice_keeps_one_comment_block() {
        let mut manifest = manifest();
        let sources = vec![source(
            "GetFlight.graphql",
            "# Look up a flight by id\nquery GetFlight($id: ID!) { flight(id: $id) { id } }\n",
        )];

        merge_leading_comments(&mut manifest, &sources);
        let report = merge_leading_comments(&mut manifest, &sources);
        assert!(report.merged.is_empty());
        assert_eq!(
            manifest.operations[0].body,
            "# Look up a flight by id\nquery GetFlight($id: ID!) { flight(id: $id) { id } }"
        );
    }

    #[test]
    fn test_merge_never_adds_operations() {
        let mut manifest = manifest();
        let sources = vec![
            source("Other.graphql", "# Not published\nquery Other { flights { id } }"),
            source("Broken.graphql", "query Broken {"),
            source("Fragment.graphql", "# Shared\nfragment F on Flight { id }"),
        ];

        let report = merge_leading_comments(&mut manifest, &sources);
        assert_eq!(manifest.operations.len(), 1);
        assert!(report.merged.is_empty());
        assert_eq!(report.unmatched, vec!["Other"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].file_name, "Broken.graphql");
        assert!(!manifest.operations[0].body.starts_with('#'));
    }

    #[test]
    fn test_merge_into_manifest_rewrites_file() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        let operations_dir = config.operations_dir();
        std::fs::create_dir_all(&operations_dir).unwrap();

        let mut raw = manifest();
        raw.extra.insert("format".to_string(), "apollo-persisted-query-manifest".into());
        raw.extra.insert("version".to_string(), 1.into());
        std::fs::write(config.manifest_path(), raw.to_pretty_json().unwrap()).unwrap();

        std::fs::write(
            operations_dir.join("GetFlight.graphql"),
            "# Look up a flight\nquery GetFlight($id: ID!) { flight(id: $id) { id } }\n",
        )
        .unwrap();
        std::fs::write(operations_dir.join("notes.txt"), "# not an operation").unwrap();

        let report = merge_into_manifest(&config).unwrap();
        assert_eq!(report.operations, 1);
        assert_eq!(report.merge.merged, vec!["GetFlight"]);

        let written = std::fs::read_to_string(config.manifest_path()).unwrap();
        assert!(written.contains("\n  \"operations\": ["));
        let reloaded = load_manifest(&config.manifest_path()).unwrap();
        assert_eq!(reloaded.extra["version"], 1);
        assert!(reloaded.operations[0].body.starts_with("# Look up a flight\n"));
    }

    #[test]
    fn test_read_operation_sources_sorted() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("b.graphql"), "query B { b }").unwrap();
        std::fs::write(tmp.path().join("a.graphql"), "query A { a }").unwrap();
        std::fs::write(tmp.path().join("c.json"), "{}").unwrap();

        let sources = read_operation_sources(tmp.path()).unwrap();
        let names: Vec<_> = sources.iter().map(|s| s.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.graphql", "b.graphql"]);
    }

    #[tokio::test]
    async fn test_missing_generator_is_external_tool_error() {
        let tmp = TempDir::new().unwrap();
        let command = vec!["pqkb-no-such-generator-binary".to_string()];
        let err = run_generator(&command, tmp.path()).await.unwrap_err();
        assert!(matches!(err, Error::ExternalTool(_)));
    }
}
