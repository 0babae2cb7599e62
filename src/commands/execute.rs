//! Execute command implementation

use crate::config::Config;
use crate::error::Result;
use crate::executor::PersistedQueryExecutor;
use crate::manifest::load_router_listen_host;
use serde_json::Value;
use tracing::info;

/// Execute options
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Router listen host; read from the graph's router config when absent
    pub router_listen_host: Option<String>,
    /// Variables as a JSON string
    pub variables: Option<String>,
}

/// Run persisted operation `id` against the router
pub async fn cmd_execute(config: &Config, id: &str, options: ExecuteOptions) -> Result<Value> {
    let host = match options.router_listen_host {
        Some(host) => host,
        None => load_router_listen_host(&config.router_config_path())?,
    };
    info!("Executing persisted query {} against {}", id, host);

    let executor = PersistedQueryExecutor::new(&config.router)?;
    executor
        .execute(id, &host, options.variables.as_deref())
        .await
}
