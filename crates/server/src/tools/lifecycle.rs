//! sw_install and sw_activate tool implementations.
//!
//! Re-run the install and activate hooks on demand, e.g. after the shell
//! was deployed while the server kept running.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use swcache_core::CachePolicyEngine;

use super::json_result;

/// Implementation of the sw_install tool.
pub async fn install_impl(engine: &CachePolicyEngine) -> Result<CallToolResult, McpError> {
    let report = engine.on_install().await?;
    json_result(&report)
}

/// Implementation of the sw_activate tool.
pub async fn activate_impl(engine: &CachePolicyEngine) -> Result<CallToolResult, McpError> {
    let report = engine.on_activate().await?;
    json_result(&report)
}
