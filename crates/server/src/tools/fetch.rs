//! sw_fetch tool implementation.
//!
//! Routes one request through the engine exactly as an intercepted page
//! request would be: classify, apply the strategy, return the response.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::resolve;
use swcache_core::{CachePolicyEngine, Classification, Request, RequestMode};

use super::{HeaderParam, json_result, to_header_params};
use crate::error::ToolError;

/// Input parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL, or a path relative to the serving origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request mode: "navigate", "same-origin", "no-cors" or "cors" (default).
    #[serde(default)]
    pub mode: Option<String>,

    /// Optional Accept header.
    #[serde(default)]
    pub accept: Option<String>,

    /// Additional request headers.
    #[serde(default)]
    pub headers: Vec<HeaderParam>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    /// The resolved request URL.
    pub url: String,
    /// How the engine classified the request.
    pub classification: Classification,
    /// Strategy that produced the response.
    pub strategy: String,
    pub status: u16,
    pub headers: Vec<HeaderParam>,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
    pub body_bytes: usize,
}

/// Build the engine request from tool parameters.
pub fn build_request(engine: &CachePolicyEngine, params: &SwFetchParams) -> Result<Request, ToolError> {
    if params.url.trim().is_empty() {
        return Err(ToolError::InvalidInput("url cannot be empty".into()));
    }

    let url = resolve(engine.origin(), &params.url).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
    let mode = match params.mode.as_deref() {
        Some(mode) => mode
            .parse::<RequestMode>()
            .map_err(|e| ToolError::InvalidInput(e.to_string()))?,
        None => RequestMode::default(),
    };

    let mut request = Request::new(&params.method, url).with_mode(mode);
    if let Some(accept) = &params.accept {
        request = request.with_header("Accept", accept.as_str());
    }
    for header in &params.headers {
        request = request.with_header(header.name.as_str(), header.value.as_str());
    }
    Ok(request)
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(engine: &CachePolicyEngine, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    let request = build_request(engine, &params)?;
    let classification = engine.classify(&request);
    let response = engine.on_request(&request).await?;

    let output = SwFetchOutput {
        url: request.url.to_string(),
        classification,
        strategy: classification.strategy().to_string(),
        status: response.status,
        headers: to_header_params(&response.headers),
        body: String::from_utf8_lossy(&response.body).to_string(),
        body_bytes: response.body.len(),
    };

    json_result(&output)
}
