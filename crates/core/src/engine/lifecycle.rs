//! Install and activation.
//!
//! Install populates the current generation from the application shell and
//! the warm list; activation deletes every other generation. Both tolerate
//! per-entry failures and report them instead of aborting.

use std::fmt;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use url::Url;

use crate::Error;
use crate::cache::{CacheStorage, Generation};
use crate::http::Request;
use crate::network::Fetch;

/// Where the engine is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install could not open its generation.
    Redundant,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Parsed => "parsed",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Activated => "activated",
            LifecycleState::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Failure {
    /// URL or generation name.
    pub target: String,
    pub reason: String,
}

/// Result of precaching one list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PrecacheOutcome {
    pub stored: Vec<String>,
    pub failed: Vec<Failure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InstallReport {
    pub generation: String,
    pub shell: PrecacheOutcome,
    pub warm: PrecacheOutcome,
    /// The new generation takes over without waiting for old clients.
    pub skip_waiting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActivationReport {
    pub active: String,
    pub deleted: Vec<String>,
    pub failed: Vec<Failure>,
    /// Existing clients are controlled immediately.
    pub claimed_clients: bool,
}

/// Open the `version` generation and precache `shell`, then `warm`.
///
/// # Errors
///
/// Fails only if the generation itself cannot be opened.
pub async fn install(
    storage: &CacheStorage, version: &str, shell: &[Url], warm: &[Url], network: Arc<dyn Fetch>,
) -> Result<InstallReport, Error> {
    let generation = storage.open_generation(version).await?;

    let shell = precache_all(&generation, shell, network.clone()).await;
    let warm = precache_all(&generation, warm, network).await;

    Ok(InstallReport { generation: version.to_string(), shell, warm, skip_waiting: true })
}

/// Fetch and store every URL concurrently; each entry succeeds or fails alone.
async fn precache_all(generation: &Generation, urls: &[Url], network: Arc<dyn Fetch>) -> PrecacheOutcome {
    let mut set = JoinSet::new();
    for (index, url) in urls.iter().enumerate() {
        let generation = generation.clone();
        let network = network.clone();
        let url = url.clone();
        set.spawn(async move {
            let result = precache_one(&generation, network.as_ref(), &url).await;
            (index, url, result)
        });
    }

    let mut results = Vec::with_capacity(urls.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => tracing::warn!(error = %e, "precache task did not complete"),
        }
    }
    results.sort_by_key(|(index, _, _)| *index);

    let mut outcome = PrecacheOutcome::default();
    for (_, url, result) in results {
        match result {
            Ok(()) => outcome.stored.push(url.to_string()),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "precache failed");
                outcome.failed.push(Failure { target: url.to_string(), reason: e.to_string() });
            }
        }
    }

    // Entries whose task vanished are reported too.
    for url in urls {
        let url = url.to_string();
        if !outcome.stored.contains(&url) && !outcome.failed.iter().any(|f| f.target == url) {
            outcome.failed.push(Failure { target: url, reason: "precache task aborted".into() });
        }
    }

    outcome
}

/// Like Cache API `add`: only 2xx responses are stored.
async fn precache_one(generation: &Generation, network: &dyn Fetch, url: &Url) -> Result<(), Error> {
    let request = Request::get(url.clone());
    let response = network.fetch(&request).await?;
    if !response.is_ok() {
        return Err(Error::HttpError(format!("status {}", response.status)));
    }
    generation.put(&request, &response).await
}

/// Delete every generation except `version`.
///
/// # Errors
///
/// Fails only if the generations cannot be listed; individual deletions
/// that fail are recorded in the report.
pub async fn activate(storage: &CacheStorage, version: &str) -> Result<ActivationReport, Error> {
    let names = storage.generation_names().await?;

    let mut deleted = Vec::new();
    let mut failed = Vec::new();
    for name in names.into_iter().filter(|name| name != version) {
        match storage.delete_generation(&name).await {
            Ok(true) => {
                tracing::info!(generation = %name, "deleted stale generation");
                deleted.push(name);
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(generation = %name, error = %e, "failed to delete stale generation");
                failed.push(Failure { target: name, reason: e.to_string() });
            }
        }
    }

    Ok(ActivationReport { active: version.to_string(), deleted, failed, claimed_clients: true })
}
