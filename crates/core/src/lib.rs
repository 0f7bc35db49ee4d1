//! Core types and the cache policy engine for swcache.
//!
//! This crate provides:
//! - Request/response model and the `Fetch` network seam
//! - Versioned cache generations with SQLite backend
//! - The cache policy engine (lifecycle, classification, strategies)
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod network;

pub use cache::{CacheStorage, Generation, StoredEntry};
pub use config::{AppConfig, ConfigError};
pub use engine::{ActivationReport, CachePolicyEngine, Classification, InstallReport, LifecycleState};
pub use error::Error;
pub use http::{Request, RequestMode, Response};
pub use network::Fetch;
