//! Install and activate on server start.
//!
//! Runs in the background so requests are served while precaching is in
//! flight. The returned handle must be awaited before the runtime shuts
//! down, or install is cut off halfway and activation never runs.

use swcache_core::CachePolicyEngine;
use tokio::task::JoinHandle;

/// Spawn install followed by activate.
pub fn spawn(engine: CachePolicyEngine) -> JoinHandle<()> {
    tokio::spawn(async move { run(&engine).await })
}

async fn run(engine: &CachePolicyEngine) {
    if let Err(e) = engine.on_install().await {
        tracing::error!(error = %e, "install failed, keeping previous generations");
        return;
    }
    if let Err(e) = engine.on_activate().await {
        tracing::error!(error = %e, "activation failed");
    }
}

/// Wait for a task from [`spawn`], logging it if it panicked or was cancelled.
pub async fn finish(handle: JoinHandle<()>) {
    if let Err(e) = handle.await {
        tracing::warn!(error = %e, "startup lifecycle did not complete");
    }
}
