//! swcache MCP server entry point.
//!
//! Boots the cache policy engine and serves it over stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use swcache_client::{FetchClient, FetchConfig};
use swcache_core::{AppConfig, CachePolicyEngine, CacheStorage};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod startup;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(version = %config.version, origin = %config.origin, "Starting swcache server on stdio transport");

    let storage = CacheStorage::open(&config.db_path).await?;
    let client = FetchClient::new(FetchConfig::from(&config))?;
    let engine = CachePolicyEngine::new(&config, storage, Arc::new(client))?;

    let lifecycle = startup::spawn(engine.clone());

    let handler = handler::SwCacheServer::new(engine.clone());
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;
    startup::finish(lifecycle).await;
    engine.settle().await;

    Ok(())
}
