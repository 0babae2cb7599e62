//! MCP stdio server implementation

use super::tools::{get_tool_definitions, handle_tool_call, ToolCall, ToolContext};
use super::types::{McpError, McpMessage, McpNotification, McpRequest, McpResponse};
use crate::error::Result;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

const PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP Server implementation
pub struct McpServer {
    ctx: ToolContext,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }

    /// Run the MCP server loop over stdio
    pub async fn run(&self) -> Result<()> {
        info!("MCP server starting on stdio");
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await?;
        info!("MCP server shutting down");
        Ok(())
    }

    /// Serve newline-delimited JSON-RPC messages until `reader` is exhausted
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            debug!("Received: {}", line);

            let message: McpMessage = match serde_json::from_str(line) {
                Ok(m) => m,
                Err(e) => {
                    error!("Failed to parse message: {}", e);
                    let response =
                        McpResponse::error(None, McpError::parse_error(format!("Parse error: {}", e)));
                    Self::write_response(&mut writer, &response).await?;
                    continue;
                }
            };

            match message {
                McpMessage::Request(req) => {
                    let response = self.handle_request(req).await;
                    Self::write_response(&mut writer, &response).await?;
                }
                McpMessage::Notification(notif) => {
                    self.handle_notification(notif);
                }
                McpMessage::Response(_) => {
                    warn!("Unexpected response message received");
                }
            }
        }

        Ok(())
    }

    async fn write_response<W>(writer: &mut W, response: &McpResponse) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut response_str = serde_json::to_string(response)?;
        debug!("Sending: {}", response_str);
        response_str.push('\n');
        writer.write_all(response_str.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Handle an MCP request
    pub async fn handle_request(&self, request: McpRequest) -> McpResponse {
        let id = request.id.clone();

        if request.jsonrpc != "2.0" {
            return McpResponse::error(
                id,
                McpError::invalid_request(format!("Unsupported jsonrpc version '{}'", request.jsonrpc)),
            );
        }

        match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "ping" => McpResponse::success(id, json!({})),
            "tools/list" => McpResponse::success(id, json!({ "tools": get_tool_definitions() })),
            "tools/call" => self.handle_tools_call(id, request.params).await,
            "resources/list" => McpResponse::success(id, json!({ "resources": [] })),
            "prompts/list" => McpResponse::success(id, json!({ "prompts": [] })),
            _ => McpResponse::error(id, McpError::method_not_found(&request.method)),
        }
    }

    /// Handle notifications (fire-and-forget)
    fn handle_notification(&self, notification: McpNotification) {
        match notification.method.as_str() {
            "notifications/initialized" => info!("Client initialized"),
            "notifications/cancelled" => info!("Request cancelled"),
            _ => debug!("Unknown notification: {}", notification.method),
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> McpResponse {
        McpResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": { "listChanged": false },
                    "resources": { "subscribe": false, "listChanged": false },
                    "prompts": { "listChanged": false }
                },
                "serverInfo": {
                    "name": "pqkb",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        )
    }

    async fn handle_tools_call(&self, id: Option<Value>, params: Option<Value>) -> McpResponse {
        let Some(params) = params else {
            return McpResponse::error(id, McpError::invalid_params("Missing params"));
        };

        let call = match ToolCall::from_params(params) {
            Ok(call) => call,
            Err(e) => return McpResponse::error(id, McpError::invalid_params(e.to_string())),
        };

        debug!("Calling tool: {:?}", call);
        let result = handle_tool_call(call, &self.ctx).await;

        match serde_json::to_value(&result) {
            Ok(value) => McpResponse::success(id, value),
            Err(e) => McpResponse::error(id, McpError::invalid_params(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::embed::testing::KeywordEmbedder;
    use crate::executor::PersistedQueryExecutor;
    use crate::knowledge::KnowledgeBase;
    use crate::store::SqliteStore;
    use std::sync::Arc;
    use tempfile::TempDir;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MANIFEST: &str = r#"{
      "format": "apollo-persisted-query-manifest",
      "version": 1,
      "operations": [
        {
          "id": "5b2f0a1c",
          "name": "GetFlight",
          "type": "query",
          "body": "query GetFlight($id: ID!) { flight(id: $id) { id departureAirportCode } }"
        }
      ]
    }"#;

    async fn server(tmp: &TempDir) -> McpServer {
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        std::fs::create_dir_all(config.graph_dir()).unwrap();
        std::fs::write(config.manifest_path(), MANIFEST).unwrap();
        std::fs::write(config.router_config_path(), "supergraph:\n  listen: 127.0.0.1:4000\n")
            .unwrap();

        let store = SqliteStore::connect(&config.paths.db_file).await.unwrap();
        store.init_schema().await.unwrap();
        let knowledge = KnowledgeBase::new(
            Arc::new(KeywordEmbedder::new(vec!["flight", "seat"])),
            Arc::new(store),
        );
        let executor = PersistedQueryExecutor::new(&config.router).unwrap();

        McpServer::new(ToolContext {
            config,
            knowledge,
            executor,
        })
    }

    fn request(id: i64, method: &str, params: Value) -> McpRequest {
        McpRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(id)),
            method: method.to_string(),
            params: Some(params),
        }
    }

    fn tool_text(response: &McpResponse) -> (String, bool) {
        let result = response.result.as_ref().unwrap();
        (
            result["content"][0]["text"].as_str().unwrap().to_string(),
            result["isError"].as_bool().unwrap(),
        )
    }

    #[tokio::test]
    async fn test_serve_over_lines() {
        let tmp = TempDir::new().unwrap();
        let server = server(&tmp).await;

        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            "this is not json\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
        );
        let mut output = Vec::new();
        server.serve(input.as_bytes(), &mut output).await.unwrap();

        let responses: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["result"]["serverInfo"]["name"], "pqkb");
        assert_eq!(responses[1]["error"]["code"], -32700);
        assert_eq!(responses[2]["result"]["tools"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_ingest_then_prompt() {
        let tmp = TempDir::new().unwrap();
        let server = server(&tmp).await;

        let response = server
            .handle_request(request(1, "tools/call", json!({"name": "addGraphQLResource", "arguments": {}})))
            .await;
        let (text, is_error) = tool_text(&response);
        assert!(!is_error, "{}", text);
        assert!(text.starts_with("GraphQL Resource successfully created and embedded."));

        let response = server
            .handle_request(request(
                2,
                "tools/call",
                json!({"name": "generateQueryPrompt", "arguments": {"question": "Show flight 1"}}),
            ))
            .await;
        let (text, is_error) = tool_text(&response);
        assert!(!is_error);
        let prompt: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(prompt["role"], "user");
        let content = prompt["content"].as_str().unwrap();
        assert!(content.contains("routerListenHost"));
        assert!(content.ends_with("User query: Show flight 1"));
    }

    #[tokio::test]
    async fn test_persisted_query_tool() {
        let tmp = TempDir::new().unwrap();
        let server = server(&tmp).await;
        let router = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": {"flight": {"id": "1"}}})),
            )
            .expect(1)
            .mount(&router)
            .await;

        let response = server
            .handle_request(request(
                3,
                "tools/call",
                json!({"name": "persistedQuery", "arguments": {
                    "id": "5b2f0a1c",
                    "routerListenHost": router.address().to_string(),
                    "variables": "{\"id\":\"1\"}"
                }}),
            ))
            .await;
        let (text, is_error) = tool_text(&response);
        assert!(!is_error);
        assert_eq!(text, r#"{"data":{"flight":{"id":"1"}}}"#);

        let response = server
            .handle_request(request(
                4,
                "tools/call",
                json!({"name": "persistedQuery", "arguments": {
                    "id": "5b2f0a1c",
                    "routerListenHost": router.address().to_string(),
                    "variables": "not json"
                }}),
            ))
            .await;
        let (text, is_error) = tool_text(&response);
        assert!(is_error);
        assert!(text.contains("Invalid JSON string for variables"));
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let tmp = TempDir::new().unwrap();
        let server = server(&tmp).await;

        let response = server.handle_request(request(5, "resources/read", json!({}))).await;
        assert_eq!(response.error.unwrap().code, -32601);

        let response = server
            .handle_request(request(6, "tools/call", json!({"name": "unknownTool"})))
            .await;
        assert_eq!(response.error.unwrap().code, -32602);
    }
}
