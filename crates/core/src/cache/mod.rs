//! SQLite-backed cache storage for versioned cache generations.
//!
//! This module provides the persistent request→response store the engine
//! works against, using SQLite with async access via tokio-rusqlite:
//!
//! - Named generations, listed in creation order and deleted as a unit
//! - Entries keyed by a SHA-256 request identity (method + URL)
//! - Exact and ignore-query ("relaxed") lookups
//! - Automatic schema migrations and WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod generations;
pub mod hash;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheStorage;
pub use entries::StoredEntry;
pub use generations::Generation;
