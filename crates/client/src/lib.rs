//! Network client for swcache.
//!
//! This crate provides the reqwest-backed [`Fetch`](swcache_core::Fetch)
//! implementation and URL resolution shared by the server and CLI.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, UrlError, resolve};
