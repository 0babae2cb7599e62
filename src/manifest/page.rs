//! Page types: the unit of knowledge base ingestion

use crate::graphql::RequiredVariables;
use serde::{Deserialize, Serialize};

/// Source namespace of persisted query pages
pub const PERSISTED_QUERIES_SOURCE: &str = "persisted-queries";

/// Content format of a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageFormat {
    Txt,
    Md,
    Mdx,
    Restructuredtext,
    Csv,
    Json,
    Yaml,
    Toml,
    Xml,
    OpenapiYaml,
    OpenapiJson,
    Graphql,
    C,
    Cpp,
    Csharp,
    Go,
    Html,
    Java,
    Javascript,
    Kotlin,
    Latex,
    ObjectiveC,
    Php,
    Python,
    Ruby,
    Rust,
    Scala,
    Shell,
    Swift,
    Typescript,
}

/// Metadata attached to a persisted query page.
///
/// The conversational layer reads `id` and `routerListenHost` straight out of
/// retrieved chunks to call the executor, so these keys are part of the
/// knowledge base contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationMetadata {
    pub id: String,
    pub required_variables: RequiredVariables,
    pub router_listen_host: String,
}

/// A document to be chunked, embedded and stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Synthetic locator, never dereferenced
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub body: String,
    pub format: PageFormat,
    pub source_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<OperationMetadata>,
}

impl Page {
    /// Page for a persisted operation
    pub fn persisted_query(
        name: &str,
        body: &str,
        graph_name: &str,
        metadata: OperationMetadata,
    ) -> Self {
        Self {
            url: format!(
                "/{}/{}/?id={}",
                PERSISTED_QUERIES_SOURCE, name, metadata.id
            ),
            title: Some(name.to_string()),
            body: body.to_string(),
            format: PageFormat::Graphql,
            source_name: format!("{}/{}", PERSISTED_QUERIES_SOURCE, graph_name),
            metadata: Some(metadata),
        }
    }

    /// Serialized form stored as resource content
    pub fn to_content(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_persisted_query_page_shape() {
        let metadata = OperationMetadata {
            id: "abc123".to_string(),
            required_variables: ["id".to_string()].into_iter().collect(),
            router_listen_host: "127.0.0.1:4000".to_string(),
        };
        let page = Page::persisted_query("GetFlight", "query GetFlight { x }", "flights", metadata);

        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(
            value,
            json!({
                "url": "/persisted-queries/GetFlight/?id=abc123",
                "title": "GetFlight",
                "body": "query GetFlight { x }",
                "format": "graphql",
                "sourceName": "persisted-queries/flights",
                "metadata": {
                    "id": "abc123",
                    "requiredVariables": ["id"],
                    "routerListenHost": "127.0.0.1:4000"
                }
            })
        );
    }

    #[test]
    fn test_format_names() {
        assert_eq!(
            serde_json::to_value(PageFormat::OpenapiYaml).unwrap(),
            json!("openapi-yaml")
        );
        assert_eq!(
            serde_json::to_value(PageFormat::ObjectiveC).unwrap(),
            json!("objective-c")
        );
    }
}
