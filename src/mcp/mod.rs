//! MCP (Model Context Protocol) server implementation
//!
//! Exposes the knowledge base and persisted query execution as tools over
//! stdio, so a conversational client can ingest, retrieve and execute.

mod server;
mod tools;
mod types;

pub use server::McpServer;
pub use tools::{get_tool_definitions, handle_tool_call, ToolCall, ToolContext};
pub use types::{McpError, McpRequest, McpResponse, ToolResult};
