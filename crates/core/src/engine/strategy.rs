//! Retrieval strategies.
//!
//! Each strategy runs against an explicit generation handle and never fails:
//! network and cache errors are recovered locally, at worst into a
//! synthesized 5xx placeholder.

use std::sync::Arc;

use super::background::Background;
use crate::cache::Generation;
use crate::http::{Request, Response};
use crate::network::Fetch;

/// Everything a strategy needs for one request.
pub(crate) struct Strategy<'a> {
    pub generation: &'a Generation,
    pub network: &'a Arc<dyn Fetch>,
    pub background: &'a Background,
}

impl Strategy<'_> {
    /// Network-first. On failure, serve the cached root document or the
    /// offline placeholder.
    pub async fn network_first(&self, request: &Request, root_document: &Request) -> Response {
        match self.network.fetch(request).await {
            Ok(response) => {
                store_detached(self.background, self.generation, request, &response);
                response
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "navigation failed, falling back to shell");
                match lookup(self.generation, root_document).await {
                    Some(shell) => shell,
                    None => Response::offline(),
                }
            }
        }
    }

    /// Cache-first. A cached entry is authoritative and skips the network.
    pub async fn cache_first(&self, request: &Request) -> Response {
        if let Some(cached) = lookup(self.generation, request).await {
            tracing::debug!(url = %request.url, "cache hit");
            return cached;
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                store_detached(self.background, self.generation, request, &response);
                response
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "asset fetch failed");
                match self.generation.match_ignore_search(request).await {
                    Ok(Some(stale)) => stale,
                    Ok(None) => Response::gateway_timeout(),
                    Err(e) => {
                        tracing::warn!(url = %request.url, error = %e, "relaxed cache lookup failed");
                        Response::gateway_timeout()
                    }
                }
            }
        }
    }

    /// Stale-while-revalidate. A cached copy is returned at once while the
    /// refresh continues detached.
    pub async fn stale_while_revalidate(&self, request: &Request) -> Response {
        let cached = lookup(self.generation, request).await;

        let revalidate = {
            let network = self.network.clone();
            let generation = self.generation.clone();
            let background = self.background.clone();
            let request = request.clone();
            async move {
                match network.fetch(&request).await {
                    Ok(fresh) => {
                        store_detached(&background, &generation, &request, &fresh);
                        Some(fresh)
                    }
                    Err(e) => {
                        tracing::debug!(url = %request.url, error = %e, "revalidation failed, keeping cached copy");
                        None
                    }
                }
            }
        };

        match cached {
            Some(cached) => {
                tracing::debug!(url = %request.url, "serving cached copy, revalidating");
                self.background.detach(async move {
                    revalidate.await;
                });
                cached
            }
            None => revalidate.await.unwrap_or_else(Response::gateway_timeout),
        }
    }
}

/// Exact lookup; storage errors count as a miss.
async fn lookup(generation: &Generation, request: &Request) -> Option<Response> {
    match generation.match_request(request).await {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!(generation = %generation.name(), url = %request.url, error = %e, "cache lookup failed");
            None
        }
    }
}

/// Store an independent copy of `response` without awaiting it.
pub(crate) fn store_detached(background: &Background, generation: &Generation, request: &Request, response: &Response) {
    let generation = generation.clone();
    let request = request.clone();
    let copy = response.clone();
    background.detach(async move {
        if let Err(e) = generation.put(&request, &copy).await {
            tracing::warn!(generation = %generation.name(), url = %request.url, error = %e, "cache store failed");
        }
    });
}
