//! cache_keys tool implementation.
//!
//! Lists generations and the request URLs stored in one of them.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::{CachePolicyEngine, LifecycleState};

use crate::tools::json_result;

/// Parameters for the cache_keys tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysParams {
    /// Generation to list entries for (default: the active one).
    #[serde(default)]
    pub generation: Option<String>,
}

/// Output from the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysOutput {
    /// Name of the active generation.
    pub active: String,
    pub state: LifecycleState,
    /// All generations, oldest first.
    pub generations: Vec<String>,
    /// Generation whose entries are listed.
    pub listed: String,
    /// Stored request URLs, in insertion order.
    pub entries: Vec<String>,
}

/// Implementation of the cache_keys tool.
pub async fn keys_impl(engine: &CachePolicyEngine, params: CacheKeysParams) -> Result<CallToolResult, McpError> {
    let generations = engine.storage().generation_names().await?;
    let listed = params.generation.unwrap_or_else(|| engine.version().to_string());
    let entries = engine.storage().generation(listed.as_str()).keys().await?;

    let output = CacheKeysOutput {
        active: engine.version().to_string(),
        state: engine.state(),
        generations,
        listed,
        entries,
    };

    json_result(&output)
}
