//! Core traits and types for the caching system.

use serde::Serialize;

/// Trait for items that can be merged and snapshotted.
///
/// Implementors must provide a unique cache key. Two items with the same key
/// are the same item observed at different times.
pub trait Cacheable: Clone + Send + Sync + 'static {
  /// Unique identifier for this item within its collection (e.g., gist id)
  fn cache_key(&self) -> &str;
}

/// Identifies one durable snapshot.
pub trait SnapshotKey: Clone + Send + Sync + 'static {
  /// Filesystem-safe stem used to name the snapshot file.
  fn file_stem(&self) -> String;

  /// Human-readable description for logs.
  fn description(&self) -> String;
}

/// How deep a fetch should walk the remote collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDepth {
  /// A snapshot exists; walk only the first page and backfill from it.
  Shallow,
  /// No usable snapshot, or a background refresh: walk the full page budget.
  Full,
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// Message of the fetch error, if the fast fetch failed
  pub error: Option<String>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data with no snapshot behind it.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      error: None,
    }
  }

  /// Create a new cache result from fresh data backfilled from a snapshot.
  pub fn merged(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Merged,
      error: None,
    }
  }

  /// Create a new cache result for offline mode.
  pub fn offline(data: T, error: String) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
      error: Some(error),
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheSource {
  /// Fresh data from network, no snapshot existed
  Network,
  /// Fresh data from network, older items backfilled from the snapshot
  Merged,
  /// Offline mode - network fetch failed, serving the snapshot alone
  Offline,
}
