//! MCP tool definitions and handlers

use super::types::{ToolDefinition, ToolResult};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::PersistedQueryExecutor;
use crate::knowledge::KnowledgeBase;
use crate::manifest;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

pub const ADD_GRAPHQL_RESOURCE: &str = "addGraphQLResource";
pub const GENERATE_QUERY_PROMPT: &str = "generateQueryPrompt";
pub const PERSISTED_QUERY: &str = "persistedQuery";

/// A decoded `tools/call` request
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "name", content = "arguments")]
pub enum ToolCall {
    #[serde(rename = "addGraphQLResource")]
    AddGraphQLResource {},

    #[serde(rename = "generateQueryPrompt")]
    GenerateQueryPrompt { question: String },

    #[serde(rename = "persistedQuery")]
    PersistedQuery {
        id: String,
        #[serde(rename = "routerListenHost")]
        router_listen_host: String,
        #[serde(default)]
        variables: Option<Value>,
    },
}

impl ToolCall {
    /// Decode `tools/call` params; missing arguments count as `{}`
    pub fn from_params(params: Value) -> Result<Self> {
        let mut params = params;
        if let Some(map) = params.as_object_mut() {
            let missing = map.get("arguments").map_or(true, Value::is_null);
            if missing {
                map.insert("arguments".to_string(), json!({}));
            }
        }
        serde_json::from_value(params)
            .map_err(|e| Error::McpProtocol(format!("invalid tool call: {}", e)))
    }
}

/// Variables are documented as a JSON string, but objects are accepted too
fn variables_text(variables: Option<Value>) -> Option<String> {
    match variables {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    }
}

/// Everything tool handlers need
#[derive(Clone)]
pub struct ToolContext {
    pub config: Config,
    pub knowledge: KnowledgeBase,
    pub executor: PersistedQueryExecutor,
}

/// Get all available tool definitions
pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: ADD_GRAPHQL_RESOURCE.to_string(),
            description: "Add the graph's persisted queries to your knowledge base. If the user provides the sentence \"ingest graphql\", use this tool without asking for confirmation.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
        ToolDefinition {
            name: GENERATE_QUERY_PROMPT.to_string(),
            description: "Get information from your knowledge base to answer questions.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "question": {
                        "type": "string",
                        "description": "The user's question"
                    }
                },
                "required": ["question"]
            }),
        },
        ToolDefinition {
            name: PERSISTED_QUERY.to_string(),
            description: "Fetch data for a given persisted query from the GraphQL API. Pass metadata.id as \"id\" and metadata.routerListenHost as \"routerListenHost\" from the retrieved page.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "id": {
                        "type": "string",
                        "description": "The ID of the persisted query to fetch"
                    },
                    "routerListenHost": {
                        "type": "string",
                        "description": "The host and port of the router to use when fetching the query"
                    },
                    "variables": {
                        "type": "string",
                        "description": "The variables to use when fetching the query, as a JSON string whose keys are the declared variable names without '$'"
                    }
                },
                "required": ["id", "routerListenHost"]
            }),
        },
    ]
}

/// Handle a tool call
pub async fn handle_tool_call(call: ToolCall, ctx: &ToolContext) -> ToolResult {
    let result = match call {
        ToolCall::AddGraphQLResource {} => handle_add_resource(ctx).await,
        ToolCall::GenerateQueryPrompt { question } => handle_query_prompt(&question, ctx).await,
        ToolCall::PersistedQuery {
            id,
            router_listen_host,
            variables,
        } => {
            handle_persisted_query(&id, &router_listen_host, variables_text(variables), ctx).await
        }
    };

    result.unwrap_or_else(|e| {
        error!("Tool call failed: {}", e);
        ToolResult::error(e.to_string())
    })
}

async fn handle_add_resource(ctx: &ToolContext) -> Result<ToolResult> {
    let sources = manifest::read_sources(&ctx.config)?;
    let stats = ctx
        .knowledge
        .ingest_manifest(&sources, &ctx.config.graph.name, ctx.config.ingest.concurrency)
        .await;

    info!(
        "addGraphQLResource: {} resources, {} skipped, {} failed",
        stats.resources_created,
        stats.skipped.len(),
        stats.failures.len()
    );

    if stats.resources_created == 0 && !stats.failures.is_empty() {
        return Ok(ToolResult::error(serde_json::to_string_pretty(&stats)?));
    }

    let headline = if stats.is_clean() {
        "GraphQL Resource successfully created and embedded."
    } else {
        "GraphQL Resource created and embedded with problems."
    };
    Ok(ToolResult::text(format!(
        "{}\n{}",
        headline,
        serde_json::to_string_pretty(&stats)?
    )))
}

async fn handle_query_prompt(question: &str, ctx: &ToolContext) -> Result<ToolResult> {
    let prompt = ctx
        .knowledge
        .query_prompt(
            question,
            ctx.config.query.top_k,
            ctx.config.query.min_similarity,
        )
        .await?;
    Ok(ToolResult::text(serde_json::to_string(&prompt)?))
}

async fn handle_persisted_query(
    id: &str,
    router_listen_host: &str,
    variables: Option<String>,
    ctx: &ToolContext,
) -> Result<ToolResult> {
    let response = ctx
        .executor
        .execute(id, router_listen_host, variables.as_deref())
        .await?;
    Ok(ToolResult::text(serde_json::to_string(&response)?))
}
