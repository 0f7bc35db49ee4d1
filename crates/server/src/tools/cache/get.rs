//! cache_get tool implementation.
//!
//! Reads one entry of the active generation without touching the network.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::resolve;
use swcache_core::{CachePolicyEngine, Error, Request};

use crate::error::ToolError;
use crate::tools::{HeaderParam, json_result, to_header_params};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Absolute URL, or a path relative to the serving origin.
    pub url: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub generation: String,
    pub url: String,
    pub stored_at: String,
    pub status: u16,
    pub headers: Vec<HeaderParam>,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
    pub body_bytes: usize,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(engine: &CachePolicyEngine, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let url = resolve(engine.origin(), &params.url).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
    let generation = engine.generation();
    let entry = generation
        .entry(&Request::get(url.clone()))
        .await?
        .ok_or_else(|| Error::CacheMiss(url.to_string()))?;

    let output = CacheGetOutput {
        generation: generation.name().to_string(),
        url: entry.url,
        stored_at: entry.stored_at,
        status: entry.response.status,
        headers: to_header_params(&entry.response.headers),
        body: String::from_utf8_lossy(&entry.response.body).to_string(),
        body_bytes: entry.response.body.len(),
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{engine, parse_output};
    use swcache_core::Response;

    #[tokio::test]
    async fn test_get_impl_missing() {
        let engine = engine(&[]).await;
        let params = CacheGetParams { url: "/index.html".to_string() };

        let result = get_impl(&engine, params).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_get_impl_found() {
        let engine = engine(&[]).await;
        let url = resolve(engine.origin(), "/index.html").unwrap();
        engine
            .generation()
            .put(&Request::get(url), &Response::ok("<html>Shell</html>").with_header("Content-Type", "text/html"))
            .await
            .unwrap();

        let params = CacheGetParams { url: "/index.html".to_string() };
        let output: CacheGetOutput = parse_output(&get_impl(&engine, params).await.unwrap());

        assert_eq!(output.generation, "v1");
        assert_eq!(output.url, "https://app.example/index.html");
        assert_eq!(output.status, 200);
        assert_eq!(output.body, "<html>Shell</html>");
        assert_eq!(output.headers, vec![HeaderParam { name: "Content-Type".into(), value: "text/html".into() }]);
    }
}
