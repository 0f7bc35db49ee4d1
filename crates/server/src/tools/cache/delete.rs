//! cache_delete tool implementation.
//!
//! Evicts one entry from the active generation so the next request for it
//! goes back to the network.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::resolve;
use swcache_core::{CachePolicyEngine, Request};

use crate::error::ToolError;
use crate::tools::json_result;

/// Parameters for the cache_delete tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheDeleteParams {
    /// Absolute URL, or a path relative to the serving origin.
    pub url: String,
}

/// Output from the cache_delete tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheDeleteOutput {
    pub generation: String,
    pub url: String,
    /// False if nothing was stored under the URL.
    pub deleted: bool,
}

/// Implementation of the cache_delete tool.
pub async fn delete_impl(engine: &CachePolicyEngine, params: CacheDeleteParams) -> Result<CallToolResult, McpError> {
    let url = resolve(engine.origin(), &params.url).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
    let generation = engine.generation();
    let deleted = generation.delete(&Request::get(url.clone())).await?;

    let output = CacheDeleteOutput { generation: generation.name().to_string(), url: url.to_string(), deleted };
    json_result(&output)
}
