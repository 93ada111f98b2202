//! Cache layer that orchestrates snapshots, merging and background refresh.

use color_eyre::{eyre::eyre, Result};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use super::merge::merge;
use super::storage::SnapshotStorage;
use super::traits::{CacheResult, FetchDepth, SnapshotKey};

/// Cache layer that manages snapshot logic and network fetching.
///
/// This layer sits between the service and the network client, answering
/// from a shallow fetch plus the last snapshot and keeping the snapshot
/// current with a detached full fetch.
pub struct CacheLayer<S: SnapshotStorage> {
  storage: Arc<S>,
  /// Handles of background refreshes that may still be running
  refreshes: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl<S: SnapshotStorage> CacheLayer<S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
      refreshes: Arc::new(Mutex::new(Vec::new())),
    }
  }

  /// Fetch a collection with stale-while-revalidate semantics.
  ///
  /// 1. Read the snapshot - if it is missing or corrupt, treat it as empty
  ///    and ask the fetcher for a full walk instead of a shallow one
  /// 2. Run the fetcher; on failure keep the error and treat the fresh items
  ///    as empty
  /// 3. Merge the fresh items in front of the snapshot
  /// 4. Spawn a full fetch that overwrites the snapshot, without awaiting it
  ///
  /// Only storage faults other than a missing or corrupt snapshot are returned
  /// as errors.
  pub async fn fetch_incremental<K, F, Fut>(
    &self,
    key: K,
    fetcher: F,
  ) -> Result<CacheResult<Vec<S::Item>>>
  where
    K: SnapshotKey,
    F: Fn(FetchDepth) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<S::Item>>> + Send + 'static,
  {
    let (snapshot, depth) = match self.storage.read(&key) {
      Ok(items) => (Some(items), FetchDepth::Shallow),
      Err(e) if e.is_recoverable() => {
        tracing::debug!("{}; fetching full collection", e);
        (None, FetchDepth::Full)
      }
      Err(e) => return Err(eyre!("Failed to read snapshot: {}", e)),
    };

    let result = match (fetcher(depth).await, snapshot) {
      (Ok(fresh), Some(snapshot)) => CacheResult::merged(merge(snapshot, fresh)),
      (Ok(fresh), None) => CacheResult::from_network(merge(Vec::new(), fresh)),
      (Err(e), snapshot) => {
        tracing::warn!("Fetch for {} failed, serving snapshot: {}", key.description(), e);
        CacheResult::offline(merge(snapshot.unwrap_or_default(), Vec::new()), e.to_string())
      }
    };

    self.spawn_refresh(key, fetcher);

    Ok(result)
  }

  /// Run a full fetch in the background and replace the snapshot with it.
  ///
  /// Failures and empty results leave the previous snapshot in place and are
  /// never reported to the caller.
  fn spawn_refresh<K, F, Fut>(&self, key: K, fetcher: F)
  where
    K: SnapshotKey,
    F: Fn(FetchDepth) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<S::Item>>> + Send + 'static,
  {
    let storage = Arc::clone(&self.storage);

    let handle = tokio::spawn(async move {
      match fetcher(FetchDepth::Full).await {
        Ok(items) if items.is_empty() => {
          tracing::debug!("Refresh of {} returned nothing; keeping snapshot", key.description());
        }
        Ok(items) => {
          // Overlapping pages can repeat an id; snapshots hold each id once
          let items = merge(Vec::new(), items);
          if let Err(e) = storage.write(&key, &items) {
            tracing::warn!("Failed to store refreshed {}: {}", key.description(), e);
          }
        }
        Err(e) => {
          tracing::debug!("Refresh of {} failed: {}", key.description(), e);
        }
      }
    });

    match self.refreshes.lock() {
      Ok(mut refreshes) => {
        refreshes.retain(|h| !h.is_finished());
        refreshes.push(handle);
      }
      Err(e) => tracing::warn!("Lock poisoned, refresh will not be tracked: {}", e),
    }
  }

  /// Wait for every background refresh started so far.
  pub async fn wait_for_refreshes(&self) {
    let handles: Vec<JoinHandle<()>> = match self.refreshes.lock() {
      Ok(mut refreshes) => refreshes.drain(..).collect(),
      Err(_) => return,
    };

    for result in futures::future::join_all(handles).await {
      if let Err(e) = result {
        tracing::warn!("Background refresh panicked: {}", e);
      }
    }
  }
}

impl<S: SnapshotStorage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      refreshes: Arc::clone(&self.refreshes),
    }
  }
}
