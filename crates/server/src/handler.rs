//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the cache policy engine.
use crate::tools::cache::{CacheDeleteParams, CacheGetParams, CacheKeysParams, delete_impl, get_impl, keys_impl};
use crate::tools::fetch::{SwFetchParams, fetch_impl};
use crate::tools::lifecycle::{activate_impl, install_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use swcache_core::CachePolicyEngine;

/// The main MCP server handler for swcache.
#[derive(Clone)]
pub struct SwCacheServer {
    tool_router: ToolRouter<Self>,
    engine: CachePolicyEngine,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl SwCacheServer {
    /// Create a new server handler around a shared engine.
    pub fn new(engine: CachePolicyEngine) -> Self {
        Self { tool_router: Self::tool_router(), engine }
    }

    /// Route a request through the engine.
    ///
    /// Navigations are served network-first, same-origin assets cache-first and
    /// third-party assets stale-while-revalidate. Other requests pass through.
    #[tool(
        description = "Fetch a URL through the offline cache policy. Returns the classification, the strategy used and the response."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.engine, params.0).await
    }

    #[tool(description = "Run the install step: precache the application shell and warm third-party assets.")]
    async fn sw_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.engine).await
    }

    #[tool(description = "Run the activate step: delete every cache generation except the current one.")]
    async fn sw_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.engine).await
    }

    /// List generations and stored URLs.
    #[tool(description = "List cache generations and the URLs stored in one of them (default: the active generation).")]
    async fn cache_keys(&self, params: Parameters<CacheKeysParams>) -> Result<CallToolResult, McpError> {
        keys_impl(&self.engine, params.0).await
    }

    /// Read one cached entry without touching the network.
    #[tool(description = "Read a stored response from the active generation. Returns CACHE_MISS if absent.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.engine, params.0).await
    }

    /// Evict one entry so the next request refetches it.
    #[tool(description = "Delete a stored response from the active generation. Reports whether an entry was removed.")]
    async fn cache_delete(&self, params: Parameters<CacheDeleteParams>) -> Result<CallToolResult, McpError> {
        delete_impl(&self.engine, params.0).await
    }
}

impl ServerHandler for SwCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "swcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(format!(
                "Offline cache policy engine for {} (generation {}).",
                self.engine.origin(),
                self.engine.version()
            )),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
