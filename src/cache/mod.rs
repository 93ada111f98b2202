//! Generic snapshot caching layer for paginated collections.
//!
//! This module provides a GitHub-agnostic caching mechanism that:
//! - Caches parsed response bodies per URL and credential, with a global bust
//! - Persists the last full listing of a collection as a snapshot
//! - Serves a shallow fetch merged with that snapshot, then refreshes it in the background
//! - Provides basic offline mode (serve the snapshot when the network is unavailable)

pub mod fetch;
mod layer;
mod merge;
mod storage;
mod traits;

pub use fetch::{FetchCache, ParsedBody, ResponseFormat};
pub use layer::CacheLayer;
pub use storage::{CsvRecord, CsvStorage, NoopStorage, SnapshotError, SnapshotStorage};
pub use traits::{CacheResult, CacheSource, Cacheable, FetchDepth, SnapshotKey};
