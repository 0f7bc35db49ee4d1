//! Request classification.
//!
//! Maps a request to the retrieval strategy that serves it. First match
//! wins: navigation, same-origin asset, allow-listed third-party asset,
//! otherwise unhandled.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::http::{Request, RequestMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Network-first with the cached shell as offline fallback.
    Navigation,
    /// Cache-first with network fallback.
    SameOriginAsset,
    /// Stale-while-revalidate.
    ThirdPartyAsset,
    /// Not intercepted; goes to the network unchanged.
    Unhandled,
}

impl Classification {
    pub fn strategy(&self) -> &'static str {
        match self {
            Classification::Navigation => "network-first",
            Classification::SameOriginAsset => "cache-first",
            Classification::ThirdPartyAsset => "stale-while-revalidate",
            Classification::Unhandled => "passthrough",
        }
    }
}

/// Classify `request` for a shell served from `origin`.
///
/// `third_party_host` is matched as a substring of the request hostname.
pub fn classify(request: &Request, origin: &Url, third_party_host: &str) -> Classification {
    if is_navigation(request) {
        return Classification::Navigation;
    }
    if !request.is_get() {
        return Classification::Unhandled;
    }
    if request.url.origin() == origin.origin() {
        return Classification::SameOriginAsset;
    }
    if request
        .url
        .host_str()
        .is_some_and(|host| host.contains(third_party_host))
    {
        return Classification::ThirdPartyAsset;
    }
    Classification::Unhandled
}

fn is_navigation(request: &Request) -> bool {
    request.mode == RequestMode::Navigate
        || (request.is_get() && request.header("accept").is_some_and(|accept| accept.contains("text/html")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CDN: &str = "cdnjs.cloudflare.com";

    fn origin() -> Url {
        Url::parse("https://app.example").unwrap()
    }

    fn get(s: &str) -> Request {
        Request::get(Url::parse(s).unwrap())
    }

    #[test]
    fn test_navigate_mode() {
        let req = get("https://app.example/").with_mode(RequestMode::Navigate);
        assert_eq!(classify(&req, &origin(), CDN), Classification::Navigation);
    }

    #[test]
    fn test_accept_html_is_navigation() {
        let req = get("https://app.example/about").with_header("Accept", "text/html,*/*;q=0.8");
        assert_eq!(classify(&req, &origin(), CDN), Classification::Navigation);
    }

    #[test]
    fn test_navigate_mode_wins_for_any_origin_and_method() {
        let req = Request::new("POST", Url::parse("https://elsewhere.example/form").unwrap())
            .with_mode(RequestMode::Navigate);
        assert_eq!(classify(&req, &origin(), CDN), Classification::Navigation);
    }

    #[test]
    fn test_accept_html_on_post_is_not_navigation() {
        let req = Request::new("POST", Url::parse("https://app.example/form").unwrap()).with_header("Accept", "text/html");
        assert_eq!(classify(&req, &origin(), CDN), Classification::Unhandled);
    }

    #[test]
    fn test_same_origin_asset() {
        let req = get("https://app.example/icons/icon-192.png");
        assert_eq!(classify(&req, &origin(), CDN), Classification::SameOriginAsset);
    }

    #[test]
    fn test_same_host_other_port_is_not_same_origin() {
        let req = get("https://app.example:8443/app.js");
        assert_eq!(classify(&req, &origin(), CDN), Classification::Unhandled);
    }

    #[test]
    fn test_same_host_other_scheme_is_not_same_origin() {
        let req = get("http://app.example/app.js");
        assert_eq!(classify(&req, &origin(), CDN), Classification::Unhandled);
    }

    #[test]
    fn test_third_party_asset() {
        let req = get("https://cdnjs.cloudflare.com/ajax/libs/jspdf/2.5.1/jspdf.umd.min.js");
        assert_eq!(classify(&req, &origin(), CDN), Classification::ThirdPartyAsset);
    }

    #[test]
    fn test_third_party_host_is_substring_match() {
        let req = get("https://eu.cdnjs.cloudflare.com/lib.js");
        assert_eq!(classify(&req, &origin(), CDN), Classification::ThirdPartyAsset);
    }

    #[test]
    fn test_unknown_cross_origin_unhandled() {
        let req = get("https://unpkg.com/lib.js");
        assert_eq!(classify(&req, &origin(), CDN), Classification::Unhandled);
    }

    #[test]
    fn test_non_get_unhandled() {
        let req = Request::new("POST", Url::parse("https://app.example/api/save").unwrap());
        assert_eq!(classify(&req, &origin(), CDN), Classification::Unhandled);

        let req = Request::new("PUT", Url::parse("https://cdnjs.cloudflare.com/x.js").unwrap());
        assert_eq!(classify(&req, &origin(), CDN), Classification::Unhandled);
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(Classification::Navigation.strategy(), "network-first");
        assert_eq!(Classification::SameOriginAsset.strategy(), "cache-first");
        assert_eq!(Classification::ThirdPartyAsset.strategy(), "stale-while-revalidate");
        assert_eq!(Classification::Unhandled.strategy(), "passthrough");
    }
}
