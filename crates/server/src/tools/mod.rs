//! MCP tool implementations.
//!
//! This module contains all tools exposed by the swcache server.

pub mod cache;
pub mod fetch;
pub mod lifecycle;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// A single header as exchanged with MCP clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HeaderParam {
    pub name: String,
    pub value: String,
}

pub(crate) fn to_header_params(headers: &[(String, String)]) -> Vec<HeaderParam> {
    headers
        .iter()
        .map(|(name, value)| HeaderParam { name: name.clone(), value: value.clone() })
        .collect()
}

/// Render `output` as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(|e| ToolError::SerializeFailed(e.to_string()))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
