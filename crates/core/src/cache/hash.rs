//! Request identity keys.

use sha2::{Digest, Sha256};
use url::Url;

/// Compute the storage key for a request identity.
///
/// The fragment is not part of the identity; callers pass URLs that already
/// had it removed, and this strips it again for keys built from raw input.
pub fn request_key(method: &str, url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);

    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_str().as_bytes());
    hex::encode(hasher.finalize())
}

/// The URL with query string and fragment removed, used for relaxed matches.
pub fn without_search(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.to_string()
}
