//! The network seam the engine fetches through.
//!
//! Implementations resolve with whatever response the server sent, error
//! statuses included, and fail only when no response could be obtained.

use async_trait::async_trait;

use crate::Error;
use crate::http::{Request, Response};

#[async_trait]
pub trait Fetch: Send + Sync {
    /// Perform `request` against the network.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}
