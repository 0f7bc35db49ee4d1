//! The cache policy engine.
//!
//! Hosts drive the engine through three hooks:
//!
//! - [`CachePolicyEngine::on_install`] precaches the application shell and
//!   warms third-party assets into the current generation.
//! - [`CachePolicyEngine::on_activate`] deletes every other generation.
//! - [`CachePolicyEngine::on_request`] classifies a request and serves it
//!   with the matching strategy.
//!
//! Stores triggered by request handling run as detached tasks; call
//! [`CachePolicyEngine::settle`] to wait for them.

pub mod background;
pub mod classify;
pub mod lifecycle;
mod strategy;

use std::sync::{Arc, Mutex, PoisonError};

use url::Url;

use crate::Error;
use crate::cache::{CacheStorage, Generation};
use crate::config::AppConfig;
use crate::http::{Request, Response};
use crate::network::Fetch;

pub use background::Background;
pub use classify::{Classification, classify};
pub use lifecycle::{ActivationReport, Failure, InstallReport, LifecycleState, PrecacheOutcome};

use strategy::Strategy;

/// Offline cache policy engine. Cloning shares all state.
#[derive(Clone)]
pub struct CachePolicyEngine {
    inner: Arc<Inner>,
}

struct Inner {
    version: String,
    origin: Url,
    third_party_host: String,
    app_shell: Vec<Url>,
    warm_urls: Vec<Url>,
    root_document: Request,
    storage: CacheStorage,
    network: Arc<dyn Fetch>,
    background: Background,
    state: Mutex<LifecycleState>,
    /// Held for the whole of an install or activation.
    lifecycle: tokio::sync::Mutex<()>,
}

impl CachePolicyEngine {
    /// Build an engine from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` if the origin, a shell path, a warm URL or
    /// the root document cannot be resolved, or if a shell path or the root
    /// document resolves to another origin.
    pub fn new(config: &AppConfig, storage: CacheStorage, network: Arc<dyn Fetch>) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let resolve = |path: &str| -> Result<Url, Error> {
            let url = origin
                .join(path)
                .map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))?;
            if url.origin() != origin.origin() {
                return Err(Error::InvalidUrl(format!("{path}: resolves outside {origin}")));
            }
            Ok(url)
        };

        let app_shell = config
            .app_shell
            .iter()
            .map(|path| resolve(path.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        let warm_urls = config
            .warm_urls
            .iter()
            .map(|u| Url::parse(u).map_err(|e| Error::InvalidUrl(format!("{u}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;
        let root_document = Request::get(resolve(config.root_document.as_str())?);

        Ok(Self {
            inner: Arc::new(Inner {
                version: config.version.clone(),
                origin,
                third_party_host: config.third_party_host.clone(),
                app_shell,
                warm_urls,
                root_document,
                storage,
                network,
                background: Background::new(),
                state: Mutex::new(LifecycleState::default()),
                lifecycle: tokio::sync::Mutex::new(()),
            }),
        })
    }

    pub fn version(&self) -> &str {
        &self.inner.version
    }

    pub fn origin(&self) -> &Url {
        &self.inner.origin
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.inner.storage
    }

    /// Handle to the active generation.
    pub fn generation(&self) -> Generation {
        self.inner.storage.generation(self.inner.version.as_str())
    }

    pub fn state(&self) -> LifecycleState {
        *self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: LifecycleState) {
        *self.inner.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
        tracing::debug!(%state, "lifecycle state changed");
    }

    /// Install hook: open the generation, precache the shell, warm the
    /// third-party list.
    ///
    /// # Errors
    ///
    /// Fails only if the generation cannot be opened. Per-URL failures are
    /// reported in the returned [`InstallReport`].
    ///
    /// Installs and activations never overlap; a call made while another is
    /// running waits for it to finish.
    pub async fn on_install(&self) -> Result<InstallReport, Error> {
        let _running = self.inner.lifecycle.lock().await;
        self.set_state(LifecycleState::Installing);
        let inner = &self.inner;
        let result = lifecycle::install(
            &inner.storage,
            &inner.version,
            &inner.app_shell,
            &inner.warm_urls,
            inner.network.clone(),
        )
        .await;

        match &result {
            Ok(report) => {
                tracing::info!(
                    generation = %report.generation,
                    shell_stored = report.shell.stored.len(),
                    shell_failed = report.shell.failed.len(),
                    warm_stored = report.warm.stored.len(),
                    warm_failed = report.warm.failed.len(),
                    "install complete"
                );
                self.set_state(LifecycleState::Installed);
            }
            Err(e) => {
                tracing::warn!(generation = %inner.version, error = %e, "install failed");
                self.set_state(LifecycleState::Redundant);
            }
        }
        result
    }

    /// Activate hook: delete every generation but the current one and take
    /// control of existing clients.
    ///
    /// # Errors
    ///
    /// Fails only if the generations cannot be listed.
    pub async fn on_activate(&self) -> Result<ActivationReport, Error> {
        let _running = self.inner.lifecycle.lock().await;
        self.set_state(LifecycleState::Activating);
        let report = lifecycle::activate(&self.inner.storage, &self.inner.version).await?;
        tracing::info!(
            generation = %report.active,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "activation complete"
        );
        self.set_state(LifecycleState::Activated);
        Ok(report)
    }

    pub fn classify(&self, request: &Request) -> Classification {
        classify(request, &self.inner.origin, &self.inner.third_party_host)
    }

    /// Serve `request` if the engine handles it; `None` means the request is
    /// not intercepted.
    pub async fn intercept(&self, request: &Request) -> Option<Response> {
        let classification = self.classify(request);
        tracing::debug!(
            method = %request.method,
            url = %request.url,
            strategy = classification.strategy(),
            "classified request"
        );

        let generation = self.generation();
        let strategy = Strategy {
            generation: &generation,
            network: &self.inner.network,
            background: &self.inner.background,
        };

        match classification {
            Classification::Navigation => Some(strategy.network_first(request, &self.inner.root_document).await),
            Classification::SameOriginAsset => Some(strategy.cache_first(request).await),
            Classification::ThirdPartyAsset => Some(strategy.stale_while_revalidate(request).await),
            Classification::Unhandled => None,
        }
    }

    /// Fetch hook. Unhandled requests go to the network unchanged, which is
    /// the only path that can return an error.
    pub async fn on_request(&self, request: &Request) -> Result<Response, Error> {
        match self.intercept(request).await {
            Some(response) => Ok(response),
            None => self.inner.network.fetch(request).await,
        }
    }

    /// Wait for every detached store and revalidation.
    pub async fn settle(&self) {
        self.inner.background.settle().await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::http::RequestMode;
    use crate::network::testing::ScriptedNetwork;

    const ORIGIN: &str = "https://app.example";
    const JSPDF: &str = "https://cdnjs.cloudflare.com/ajax/libs/jspdf/2.5.1/jspdf.umd.min.js";

    fn config(version: &str) -> AppConfig {
        AppConfig { version: version.into(), origin: ORIGIN.into(), ..Default::default() }
    }

    async fn engine_with(network: Arc<ScriptedNetwork>) -> CachePolicyEngine {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        CachePolicyEngine::new(&config("v1"), storage, network).unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn navigate(s: &str) -> Request {
        Request::navigate(url(s))
    }

    #[tokio::test]
    async fn test_new_resolves_config() {
        let engine = engine_with(Arc::new(ScriptedNetwork::new())).await;
        assert_eq!(engine.version(), "v1");
        assert_eq!(engine.origin().as_str(), "https://app.example/");
        assert_eq!(engine.inner.app_shell[1].as_str(), "https://app.example/index.html");
        assert_eq!(engine.inner.root_document.url.as_str(), "https://app.example/index.html");
        assert_eq!(engine.inner.warm_urls.len(), 2);
        assert_eq!(engine.state(), LifecycleState::Parsed);
    }

    #[tokio::test]
    async fn test_new_rejects_bad_origin() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let config = AppConfig { origin: "::nope".into(), ..Default::default() };
        let result = CachePolicyEngine::new(&config, storage, Arc::new(ScriptedNetwork::new()));
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_new_rejects_shell_on_other_origin() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let config = AppConfig {
            app_shell: vec!["/".into(), "//evil.example/steal.js".into()],
            ..config("v1")
        };
        let result = CachePolicyEngine::new(&config, storage, Arc::new(ScriptedNetwork::new()));
        assert!(matches!(result, Err(Error::InvalidUrl(msg)) if msg.contains("evil.example")));

        let storage = CacheStorage::open_in_memory().await.unwrap();
        let config = AppConfig { root_document: "//evil.example/".into(), ..self::config("v1") };
        let result = CachePolicyEngine::new(&config, storage, Arc::new(ScriptedNetwork::new()));
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_install_then_activate() {
        let network = Arc::new(
            ScriptedNetwork::new()
                .route("https://app.example/", Response::ok("root"))
                .route("https://app.example/index.html", Response::ok("<html>Shell</html>"))
                .route(JSPDF, Response::ok("jspdf")),
        );
        let engine = engine_with(network).await;
        engine.storage().open_generation("v0").await.unwrap();

        let installed = engine.on_install().await.unwrap();
        assert_eq!(engine.state(), LifecycleState::Installed);
        assert_eq!(installed.shell.stored.len(), 2);
        assert_eq!(installed.shell.failed.len(), 5);
        assert_eq!(installed.warm.stored, vec![JSPDF.to_string()]);

        let activated = engine.on_activate().await.unwrap();
        assert_eq!(engine.state(), LifecycleState::Activated);
        assert_eq!(activated.deleted, vec!["v0".to_string()]);
        assert_eq!(engine.storage().generation_names().await.unwrap(), vec!["v1".to_string()]);
    }

    #[tokio::test]
    async fn test_navigation_network_success_is_stored() {
        let network = Arc::new(ScriptedNetwork::new().route("https://app.example/about", Response::ok("<html>About</html>")));
        let engine = engine_with(network).await;
        let request = navigate("https://app.example/about");

        let response = engine.on_request(&request).await.unwrap();
        assert_eq!(&response.body[..], b"<html>About</html>");

        engine.settle().await;
        let stored = engine.generation().match_request(&request).await.unwrap().unwrap();
        assert_eq!(stored, response);
    }

    #[tokio::test]
    async fn test_navigation_offline_serves_cached_shell() {
        let network = Arc::new(ScriptedNetwork::new());
        network.set_offline(true);
        let engine = engine_with(network).await;
        engine
            .generation()
            .put(&Request::get(url("https://app.example/index.html")), &Response::ok("<html>Shell</html>"))
            .await
            .unwrap();

        let response = engine.on_request(&navigate("https://app.example/index.html")).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(&response.body[..], b"<html>Shell</html>");

        // Any navigation falls back to the shell entry page.
        let response = engine.on_request(&navigate("https://app.example/reports/42")).await.unwrap();
        assert_eq!(&response.body[..], b"<html>Shell</html>");
    }

    #[tokio::test]
    async fn test_navigation_offline_without_shell() {
        let network = Arc::new(ScriptedNetwork::new());
        network.set_offline(true);
        let engine = engine_with(network).await;

        let response = engine.on_request(&navigate("https://app.example/")).await.unwrap();
        assert_eq!(response.status, 503);
        assert_eq!(response.content_type(), Some("text/plain"));
        assert_eq!(&response.body[..], b"Offline");
    }

    #[tokio::test]
    async fn test_navigation_error_status_is_returned_not_fallback() {
        let network = Arc::new(
            ScriptedNetwork::new().route("https://app.example/missing", Response::new(404, Vec::new(), "not found")),
        );
        let engine = engine_with(network).await;

        let response = engine.on_request(&navigate("https://app.example/missing")).await.unwrap();
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_same_origin_cache_hit_skips_network() {
        let network = Arc::new(ScriptedNetwork::new().route("https://app.example/app.js", Response::ok("network")));
        let engine = engine_with(network.clone()).await;
        let request = Request::get(url("https://app.example/app.js"));
        let cached = Response::ok("cached").with_header("Content-Type", "text/javascript");
        engine.generation().put(&request, &cached).await.unwrap();

        let first = engine.on_request(&request).await.unwrap();
        let second = engine.on_request(&request).await.unwrap();

        assert_eq!(first, cached);
        assert_eq!(second, first);
        assert_eq!(network.call_count(), 0);
    }

    #[tokio::test]
    async fn test_same_origin_miss_fetches_and_stores() {
        let network = Arc::new(ScriptedNetwork::new().route("https://app.example/app.css", Response::ok("body{}")));
        let engine = engine_with(network.clone()).await;
        let request = Request::get(url("https://app.example/app.css"));

        let response = engine.on_request(&request).await.unwrap();
        assert_eq!(&response.body[..], b"body{}");
        engine.settle().await;

        network.set_offline(true);
        let again = engine.on_request(&request).await.unwrap();
        assert_eq!(again, response);
        assert_eq!(network.call_count(), 1);
    }

    #[tokio::test]
    async fn test_same_origin_offline_uncached_is_gateway_timeout() {
        let network = Arc::new(ScriptedNetwork::new());
        network.set_offline(true);
        let engine = engine_with(network).await;

        let response = engine.on_request(&Request::get(url("https://app.example/app.js"))).await.unwrap();
        assert_eq!(response.status, 504);
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn test_same_origin_offline_relaxed_match() {
        let network = Arc::new(ScriptedNetwork::new());
        network.set_offline(true);
        let engine = engine_with(network).await;
        engine
            .generation()
            .put(&Request::get(url("https://app.example/app.js?v=1")), &Response::ok("v1 bundle"))
            .await
            .unwrap();

        let response = engine
            .on_request(&Request::get(url("https://app.example/app.js?v=2")))
            .await
            .unwrap();
        assert_eq!(&response.body[..], b"v1 bundle");
    }

    #[tokio::test]
    async fn test_third_party_miss_awaits_network_and_stores() {
        let network = Arc::new(ScriptedNetwork::new().route(JSPDF, Response::ok("B")));
        let engine = engine_with(network).await;
        let request = Request::get(url(JSPDF));

        let response = engine.on_request(&request).await.unwrap();
        assert_eq!(&response.body[..], b"B");

        engine.settle().await;
        let stored = engine.generation().match_request(&request).await.unwrap().unwrap();
        assert_eq!(&stored.body[..], b"B");
    }

    #[tokio::test]
    async fn test_overlapping_installs_run_one_after_another() {
        let (network, gate) = ScriptedNetwork::gated();
        let network = Arc::new(network.route("https://app.example/", Response::ok("root")));
        let engine = engine_with(network.clone()).await;
        let per_install = engine.inner.app_shell.len();

        let first = tokio::spawn({
            let engine = engine.clone();
            async move { engine.on_install().await }
        });
        tokio::time::timeout(Duration::from_secs(5), async {
            while network.call_count() < per_install {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("first install must reach the network");

        let second = tokio::spawn({
            let engine = engine.clone();
            async move { engine.on_install().await }
        });
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        assert_eq!(network.call_count(), per_install);
        assert_eq!(engine.state(), LifecycleState::Installing);

        gate.add_permits(2 * (per_install + engine.inner.warm_urls.len()));
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        assert_eq!(engine.state(), LifecycleState::Installed);
        assert_eq!(network.call_count(), 2 * (per_install + engine.inner.warm_urls.len()));
    }

    #[tokio::test]
    async fn test_third_party_miss_offline_is_gateway_timeout() {
        let network = Arc::new(ScriptedNetwork::new());
        network.set_offline(true);
        let engine = engine_with(network).await;

        let response = engine.on_request(&Request::get(url(JSPDF))).await.unwrap();
        assert_eq!(response.status, 504);
    }

    #[tokio::test]
    async fn test_third_party_hit_does_not_wait_for_network() {
        let (network, gate) = ScriptedNetwork::gated();
        let network = Arc::new(network.route(JSPDF, Response::ok("fresh")));
        let engine = engine_with(network.clone()).await;
        let request = Request::get(url(JSPDF));
        engine.generation().put(&request, &Response::ok("stale")).await.unwrap();

        let response = tokio::time::timeout(Duration::from_secs(5), engine.on_request(&request))
            .await
            .expect("cached response must not wait on the network")
            .unwrap();
        assert_eq!(&response.body[..], b"stale");

        gate.add_permits(1);
        engine.settle().await;

        assert_eq!(network.calls(), vec![JSPDF.to_string()]);
        let refreshed = engine.generation().match_request(&request).await.unwrap().unwrap();
        assert_eq!(&refreshed.body[..], b"fresh");
    }

    #[tokio::test]
    async fn test_third_party_revalidation_failure_keeps_cache() {
        let network = Arc::new(ScriptedNetwork::new());
        network.set_offline(true);
        let engine = engine_with(network).await;
        let request = Request::get(url(JSPDF));
        engine.generation().put(&request, &Response::ok("stale")).await.unwrap();

        let response = engine.on_request(&request).await.unwrap();
        engine.settle().await;

        assert_eq!(&response.body[..], b"stale");
        let kept = engine.generation().match_request(&request).await.unwrap().unwrap();
        assert_eq!(&kept.body[..], b"stale");
    }

    #[tokio::test]
    async fn test_unhandled_is_not_intercepted() {
        let network = Arc::new(ScriptedNetwork::new().route("https://unpkg.com/lib.js", Response::ok("lib")));
        let engine = engine_with(network).await;
        let request = Request::get(url("https://unpkg.com/lib.js"));

        assert_eq!(engine.classify(&request), Classification::Unhandled);
        assert!(engine.intercept(&request).await.is_none());

        let response = engine.on_request(&request).await.unwrap();
        assert_eq!(&response.body[..], b"lib");
        engine.settle().await;
        assert!(engine.generation().match_request(&request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unhandled_surfaces_network_error() {
        let network = Arc::new(ScriptedNetwork::new());
        network.set_offline(true);
        let engine = engine_with(network).await;
        let request = Request::new("POST", url("https://app.example/api/save"));

        let result = engine.on_request(&request).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_non_get_navigation_store_failure_is_silent() {
        let network = Arc::new(ScriptedNetwork::new().route("https://app.example/submit", Response::ok("done")));
        let engine = engine_with(network).await;
        let request = Request::new("POST", url("https://app.example/submit")).with_mode(RequestMode::Navigate);

        let response = engine.on_request(&request).await.unwrap();
        engine.settle().await;

        assert_eq!(&response.body[..], b"done");
        assert!(engine.generation().keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_requests_after_version_change_use_new_generation() {
        let storage = CacheStorage::open_in_memory().await.unwrap();
        let network: Arc<ScriptedNetwork> = Arc::new(ScriptedNetwork::new());
        network.set_offline(true);

        let old = CachePolicyEngine::new(&config("v0"), storage.clone(), network.clone()).unwrap();
        old.generation()
            .put(&Request::get(url("https://app.example/index.html")), &Response::ok("old shell"))
            .await
            .unwrap();

        let new = CachePolicyEngine::new(&config("v1"), storage, network).unwrap();
        new.on_install().await.unwrap();
        new.on_activate().await.unwrap();

        let response = new.on_request(&navigate("https://app.example/")).await.unwrap();
        assert_eq!(response.status, 503);
    }
}
