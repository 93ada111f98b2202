//! Cached gist client that serves listings from snapshots and refreshes them.

use color_eyre::Result;

use crate::cache::{CacheLayer, CsvStorage, FetchDepth, SnapshotStorage};
use crate::config::{CollectionsConfig, Config};

use super::cache::CollectionKey;
use super::client::{BudgetCheck, GistClient, PageWalk};
use super::types::{CollectionResult, Gist, GistKind, OwnedGists};

/// Gist client with snapshot caching and background refresh.
///
/// Every lookup answers from a shallow fetch merged with the last snapshot
/// (or a full fetch when there is none), then refreshes the snapshot with a
/// full fetch that the caller never waits on.
pub struct CachedGistClient<S: SnapshotStorage<Item = Gist> = CsvStorage<Gist>> {
  inner: GistClient,
  cache: CacheLayer<S>,
  collections: CollectionsConfig,
}

impl CachedGistClient {
  /// Create a new cached gist client with CSV snapshots in the configured directory.
  pub fn new(config: &Config) -> Result<Self> {
    let storage = CsvStorage::new(config.snapshot_dir()?);
    Self::with_storage(config, storage)
  }
}

impl<S: SnapshotStorage<Item = Gist>> CachedGistClient<S> {
  pub fn with_storage(config: &Config, storage: S) -> Result<Self> {
    Ok(Self {
      inner: GistClient::new(config)?,
      cache: CacheLayer::new(storage),
      collections: config.collections.clone(),
    })
  }

  /// Get the gists owned by `owner`.
  ///
  /// When nothing is found, `owner` may really be a gist id; if that gist
  /// belongs to someone else the result is a redirect to its owner.
  pub async fn owned_gists(&self, owner: &str, credential: Option<&str>) -> Result<OwnedGists> {
    let result = self.collection(GistKind::Owned, owner, credential).await?;

    if result.items.is_empty() {
      if let Some(real_owner) = self.resolve_owner(owner).await {
        tracing::info!("{} is a gist of {}; redirecting", owner, real_owner);
        return Ok(OwnedGists::Redirect {
          owner: real_owner,
          id: owner.to_string(),
        });
      }
    }

    Ok(OwnedGists::Collection(result))
  }

  /// Get the gists starred by the holder of `credential`.
  ///
  /// Starred gists are only visible with a credential; without one nothing is
  /// read or requested and the result is flagged instead.
  pub async fn starred_gists(
    &self,
    owner: &str,
    credential: Option<&str>,
  ) -> Result<CollectionResult> {
    self.collection(GistKind::Starred, owner, credential).await
  }

  /// Drop every cached response so the next lookups hit the API.
  pub fn bust_cache(&self) {
    self.inner.fetch_cache().bust();
  }

  /// Wait for background refreshes started by earlier lookups.
  pub async fn wait_for_refreshes(&self) {
    self.cache.wait_for_refreshes().await;
  }

  /// Number of responses the fetch cache would currently serve.
  pub fn cached_responses(&self) -> usize {
    self.inner.fetch_cache().live_entries()
  }

  async fn collection(
    &self,
    kind: GistKind,
    owner: &str,
    credential: Option<&str>,
  ) -> Result<CollectionResult> {
    let credential = credential.filter(|c| !c.is_empty());
    if kind.requires_credential() && credential.is_none() {
      return Ok(CollectionResult::credential_missing());
    }

    let key = CollectionKey::new(kind, owner, credential);
    let inner = self.inner.clone();
    let collections = self.collections.clone();
    let owner = owner.to_string();
    let credential = credential.map(String::from);

    let result = self
      .cache
      .fetch_incremental(key, move |depth| {
        let inner = inner.clone();
        let walk = page_walk(kind, &owner, depth, &collections);
        let credential = credential.clone();
        async move { inner.fetch_pages(&walk, credential.as_deref()).await }
      })
      .await?;

    Ok(CollectionResult {
      items: result.data,
      error: result.error,
      credential_missing: false,
      source: Some(result.source),
    })
  }

  /// Look up `id` as a gist and return its owner login when that differs from `id`.
  async fn resolve_owner(&self, id: &str) -> Option<String> {
    match self.inner.get_gist(id).await {
      Ok(gist) => gist
        .owner
        .map(|o| o.login)
        .filter(|login| !login.is_empty() && login != id),
      Err(e) => {
        tracing::debug!("{} is not a gist either: {}", id, e);
        None
      }
    }
  }
}

/// Page walk for a collection kind at a given depth.
///
/// A shallow walk asks for zero extra pages, so only the first page is
/// fetched. A user's own gists are walked shallowly with a smaller page.
fn page_walk(
  kind: GistKind,
  owner: &str,
  depth: FetchDepth,
  collections: &CollectionsConfig,
) -> PageWalk {
  let (segments, budget, full_pages, shallow_page_size) = match kind {
    GistKind::Owned => (
      vec!["users".to_string(), owner.to_string(), "gists".to_string()],
      BudgetCheck::Exclusive,
      collections.owned_max_pages,
      collections.shallow_page_size,
    ),
    GistKind::Starred => (
      vec!["gists".to_string(), "starred".to_string()],
      BudgetCheck::Inclusive,
      collections.starred_max_pages,
      collections.page_size,
    ),
  };

  let (per_page, max_pages) = match depth {
    FetchDepth::Shallow => (shallow_page_size, 0),
    FetchDepth::Full => (collections.page_size, full_pages),
  };

  PageWalk {
    segments,
    per_page,
    max_pages,
    budget,
    include_owner: kind.includes_owner(),
  }
}
