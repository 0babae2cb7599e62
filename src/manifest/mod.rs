//! Persisted operation manifest handling
//!
//! This module covers:
//! - Loading the operation manifest and the router's listen address
//! - Building one knowledge base page per persisted operation
//! - Offline maintenance (regeneration and publishing)

mod page;
pub mod publish;
pub mod regenerate;

pub use page::*;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::graphql;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, info, warn};

/// Listen address assumed when the router config does not declare one
pub const DEFAULT_ROUTER_LISTEN: &str = "127.0.0.1:4000";

/// Kind of GraphQL operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Query,
    Mutation,
    Subscription,
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationType::Query => write!(f, "query"),
            OperationType::Mutation => write!(f, "mutation"),
            OperationType::Subscription => write!(f, "subscription"),
        }
    }
}

/// A published persisted operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Content hash the router knows the operation by
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub operation_type: OperationType,
    pub body: String,
}

/// The operation manifest file.
///
/// Fields other than `operations` (`format`, `version`, ...) are carried
/// through untouched so the file can be rewritten in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationManifest {
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    pub operations: Vec<Operation>,
}

impl OperationManifest {
    /// Serialize as two-space indented JSON
    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Default, Deserialize)]
struct RouterYaml {
    #[serde(default)]
    supergraph: Option<SupergraphYaml>,
}

#[derive(Debug, Default, Deserialize)]
struct SupergraphYaml {
    #[serde(default)]
    listen: Option<String>,
}

/// Load the operation manifest
pub fn load_manifest(path: &Path) -> Result<OperationManifest> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::ManifestRead(format!("cannot read {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::ManifestRead(format!("invalid manifest {}: {}", path.display(), e))
    })
}

/// Parse the router's listen address out of router YAML
pub fn parse_router_listen_host(yaml: &str) -> Result<String> {
    let router: RouterYaml = serde_yaml::from_str(yaml)
        .map_err(|e| Error::ManifestRead(format!("invalid router config: {}", e)))?;
    Ok(router
        .supergraph
        .and_then(|s| s.listen)
        .unwrap_or_else(|| DEFAULT_ROUTER_LISTEN.to_string()))
}

/// Load the router's listen address from the router configuration file
pub fn load_router_listen_host(path: &Path) -> Result<String> {
    let yaml = std::fs::read_to_string(path).map_err(|e| {
        Error::ManifestRead(format!("cannot read {}: {}", path.display(), e))
    })?;
    parse_router_listen_host(&yaml)
}

/// Everything a manifest ingestion run needs, loaded up front
#[derive(Debug, Clone)]
pub struct ManifestSources {
    pub manifest: OperationManifest,
    pub router_listen_host: String,
}

/// Load the manifest and router config named by `config`.
/// Either both load or the run fails before any page is produced.
pub fn read_sources(config: &Config) -> Result<ManifestSources> {
    let manifest_path = config.manifest_path();
    let router_path = config.router_config_path();
    debug!(
        "Reading manifest {:?} and router config {:?}",
        manifest_path, router_path
    );

    let manifest = load_manifest(&manifest_path)?;
    let router_listen_host = load_router_listen_host(&router_path)?;

    Ok(ManifestSources {
        manifest,
        router_listen_host,
    })
}

/// An operation left out of a build because its body did not parse
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedOperation {
    pub name: String,
    pub error: String,
}

/// Result of building pages from a manifest
#[derive(Debug, Clone, Default)]
pub struct ManifestBuild {
    pub pages: Vec<Page>,
    pub skipped: Vec<SkippedOperation>,
}

/// Build one page per operation, enriched with its required variables
pub fn build(operations: &[Operation], router_listen_host: &str, graph_name: &str) -> ManifestBuild {
    let mut result = ManifestBuild::default();

    for operation in operations {
        let required_variables = match graphql::analyze(&operation.body) {
            Ok(vars) => vars,
            Err(e) => {
                warn!("Skipping operation '{}': {}", operation.name, e);
                result.skipped.push(SkippedOperation {
                    name: operation.name.clone(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        let metadata = OperationMetadata {
            id: operation.id.clone(),
            required_variables,
            router_listen_host: router_listen_host.to_string(),
        };

        result.pages.push(Page::persisted_query(
            &operation.name,
            &operation.body,
            graph_name,
            metadata,
        ));
    }

    info!(
        "Built {} pages from {} operations ({} skipped)",
        result.pages.len(),
        operations.len(),
        result.skipped.len()
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) const MANIFEST_JSON: &str = r#"{
  "format": "apollo-persisted-query-manifest",
  "version": 1,
  "operations": [
    {
      "id": "5b2f0a1c",
      "name": "GetFlight",
      "type": "query",
      "body": "query GetFlight($id: ID!) { flight(id: $id) { id departureAirportCode } }"
    },
    {
      "id": "9d1e7c44",
      "name": "Flights",
      "type": "query",
      "body": "query Flights($limit: Int = 10) { flights(limit: $limit) { id } }"
    }
  ]
}"#;

    fn operation(name: &str, body: &str) -> Operation {
        Operation {
            id: format!("{}-hash", name),
            name: name.to_string(),
            operation_type: OperationType::Query,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_manifest_round_trip_keeps_extra_fields() {
        let manifest: OperationManifest = serde_json::from_str(MANIFEST_JSON).unwrap();
        assert_eq!(manifest.operations.len(), 2);
        assert_eq!(manifest.operations[0].operation_type, OperationType::Query);

        let json = manifest.to_pretty_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["format"], "apollo-persisted-query-manifest");
        assert_eq!(value["version"], 1);
    }

    #[test]
    fn test_router_listen_host() {
        let yaml = "supergraph:\n  listen: 0.0.0.0:4100\n";
        assert_eq!(parse_router_listen_host(yaml).unwrap(), "0.0.0.0:4100");

        let yaml = "supergraph:\n  introspection: true\n";
        assert_eq!(parse_router_listen_host(yaml).unwrap(), DEFAULT_ROUTER_LISTEN);

        let yaml = "headers:\n  all: {}\n";
        assert_eq!(parse_router_listen_host(yaml).unwrap(), DEFAULT_ROUTER_LISTEN);

        let err = parse_router_listen_host("supergraph: [unclosed").unwrap_err();
        assert!(matches!(err, Error::ManifestRead(_)));
    }

    #[test]
    fn test_build_pages() {
        let operations = vec![
            operation("GetFlight", "query GetFlight($id: ID!) { flight(id: $id) { id } }"),
            operation("Flights", "query Flights($limit: Int = 10) { flights(limit: $limit) { id } }"),
        ];

        let build = build(&operations, "127.0.0.1:4000", "");
        assert!(build.skipped.is_empty());
        assert_eq!(build.pages.len(), 2);

        let page = &build.pages[0];
        assert_eq!(page.url, "/persisted-queries/GetFlight/?id=GetFlight-hash");
        assert_eq!(page.source_name, "persisted-queries/");
        assert_eq!(page.format, PageFormat::Graphql);

        let metadata = page.metadata.as_ref().unwrap();
        assert_eq!(metadata.id, "GetFlight-hash");
        assert_eq!(metadata.router_listen_host, "127.0.0.1:4000");
        assert_eq!(
            metadata.required_variables.iter().collect::<Vec<_>>(),
            vec!["id"]
        );

        assert!(build.pages[1]
            .metadata
            .as_ref()
            .unwrap()
            .required_variables
            .is_empty());
    }

    #[test]
    fn test_build_skips_unparseable_operation() {
        let operations = vec![
            operation("Broken", "query Broken { flights { id }"),
            operation("AllFlights", "query AllFlights { flights { id } }"),
        ];

        let build = build(&operations, "127.0.0.1:4000", "flights");
        assert_eq!(build.pages.len(), 1);
        assert_eq!(build.skipped.len(), 1);
        assert_eq!(build.skipped[0].name, "Broken");
    }

    #[test]
    fn test_read_sources_requires_both_files() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        let graph_dir = config.graph_dir();
        std::fs::create_dir_all(&graph_dir).unwrap();
        std::fs::write(config.manifest_path(), MANIFEST_JSON).unwrap();

        let err = read_sources(&config).unwrap_err();
        assert!(matches!(err, Error::ManifestRead(_)));

        std::fs::write(config.router_config_path(), "supergraph:\n  listen: localhost:4000\n")
            .unwrap();
        let sources = read_sources(&config).unwrap();
        assert_eq!(sources.router_listen_host, "localhost:4000");
        assert_eq!(sources.manifest.operations.len(), 2);
    }

    #[test]
    fn test_missing_manifest_is_read_error() {
        let tmp = TempDir::new().unwrap();
        let err = load_manifest(&tmp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, Error::ManifestRead(_)));
    }
}
