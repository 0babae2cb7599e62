//! Persisted query execution
//!
//! Sends automatic persisted query requests to a GraphQL router: the
//! operation is named by its hash and only variables travel with it.

mod variables;

pub use variables::*;

use crate::config::RouterConfig;
use crate::error::{Error, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Header naming the calling client to the router
pub const CLIENT_NAME_HEADER: &str = "apollographql-client-name";

/// Build the request body for persisted operation `id`
pub fn request_body(id: &str, variables: Option<Value>) -> Value {
    let mut body = json!({
        "extensions": {
            "persistedQuery": {
                "version": 1,
                "sha256Hash": id,
            }
        }
    });
    if let (Some(variables), Some(map)) = (variables, body.as_object_mut()) {
        map.insert("variables".to_string(), variables);
    }
    body
}

/// Router endpoint for a listen host such as `127.0.0.1:4000`.
/// Hosts that already carry an http(s) scheme are used as given.
pub fn router_url(host: &str) -> Result<Url> {
    let raw = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    };

    let url = Url::parse(&raw)
        .map_err(|e| Error::Transport(format!("invalid router host '{}': {}", host, e)))?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(Error::Transport(format!("invalid router host '{}'", host)));
    }
    Ok(url)
}

/// Client for persisted query requests
#[derive(Clone)]
pub struct PersistedQueryExecutor {
    client: Client,
    token: Option<String>,
    client_name: String,
}

impl PersistedQueryExecutor {
    pub fn new(config: &RouterConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            token: config.token(),
            client_name: config.client_name.clone(),
        })
    }

    /// Override the bearer credential
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Execute persisted operation `id` against the router at `router_listen_host`.
    ///
    /// The router's JSON response is returned as-is, GraphQL `errors` and
    /// non-2xx statuses included.
    pub async fn execute(
        &self,
        id: &str,
        router_listen_host: &str,
        variables: Option<&str>,
    ) -> Result<Value> {
        let variables = parse_variables(variables)?;
        let body = request_body(id, variables);
        let url = router_url(router_listen_host)?;

        debug!("Fetching persisted query {} from {}", id, url);
        debug!("Request body: {}", body);

        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(CLIENT_NAME_HEADER, &self.client_name)
            .json(&body);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let value: Value = serde_json::from_slice(&bytes).map_err(|e| {
            Error::Transport(format!(
                "router returned a non-JSON body (status {}): {}",
                status, e
            ))
        })?;

        debug!("Response ({}): {}", status, value);
        Ok(value)
    }
}
