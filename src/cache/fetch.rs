//! Process-wide cache of parsed HTTP response bodies, keyed by URL and credential.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// How a response body should be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
  Json,
  Text,
}

/// A parsed response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
  Json(Value),
  Text(String),
}

impl ParsedBody {
  /// Take the JSON value, failing if the body was fetched as text.
  pub fn into_json(self) -> Result<Value> {
    match self {
      Self::Json(value) => Ok(value),
      Self::Text(_) => Err(eyre!("Expected a JSON body, got text")),
    }
  }
}

#[derive(Debug, Clone)]
struct CacheEntry {
  body: ParsedBody,
  created_at: DateTime<Utc>,
  generation: u64,
}

/// Fetch cache shared by every request in the process.
///
/// Entries never expire on their own. [`FetchCache::bust`] bumps a generation
/// counter; entries recorded under an older generation are treated as absent
/// and pruned on the next store.
pub struct FetchCache {
  http: reqwest::Client,
  entries: RwLock<HashMap<String, CacheEntry>>,
  generation: AtomicU64,
  pruned_generation: AtomicU64,
}

impl FetchCache {
  pub fn new(http: reqwest::Client) -> Self {
    Self {
      http,
      entries: RwLock::new(HashMap::new()),
      generation: AtomicU64::new(0),
      pruned_generation: AtomicU64::new(0),
    }
  }

  /// Return the cached body for `url`, fetching and storing it on a miss.
  ///
  /// The credential is part of the cache identity: the same URL fetched with
  /// two different credentials is two entries.
  pub async fn fetch(
    &self,
    url: &str,
    format: ResponseFormat,
    credential: Option<&str>,
  ) -> Result<ParsedBody> {
    let key = cache_key(url, credential);
    let generation = self.generation.load(Ordering::Acquire);

    if let Some(entry) = self.lookup(&key, generation)? {
      tracing::debug!(
        "Fetch cache hit for {} (cached {}s ago)",
        url,
        (Utc::now() - entry.created_at).num_seconds()
      );
      return Ok(entry.body);
    }
    tracing::debug!("Fetch cache miss for {}", url);

    let mut request = self.http.get(url);
    if let Some(token) = credential {
      request = request.header(AUTHORIZATION, format!("token {}", token));
    }

    let response = request
      .send()
      .await
      .map_err(|e| eyre!("Request to {} failed: {}", url, e))?
      .error_for_status()
      .map_err(|e| eyre!("Request to {} failed: {}", url, e))?;

    let body = match format {
      ResponseFormat::Json => ParsedBody::Json(
        response
          .json()
          .await
          .map_err(|e| eyre!("Failed to parse JSON from {}: {}", url, e))?,
      ),
      ResponseFormat::Text => ParsedBody::Text(
        response
          .text()
          .await
          .map_err(|e| eyre!("Failed to read body from {}: {}", url, e))?,
      ),
    };

    self.store(key, body.clone(), generation)?;
    Ok(body)
  }

  /// Invalidate every cached entry, for all keys.
  pub fn bust(&self) {
    let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
    tracing::info!("Fetch cache busted (generation {})", generation);
  }

  /// Number of entries that would currently be served.
  pub fn live_entries(&self) -> usize {
    let generation = self.generation.load(Ordering::Acquire);
    self
      .entries
      .read()
      .map(|entries| {
        entries
          .values()
          .filter(|entry| entry.generation == generation)
          .count()
      })
      .unwrap_or(0)
  }

  fn lookup(&self, key: &str, generation: u64) -> Result<Option<CacheEntry>> {
    let entries = self
      .entries
      .read()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Ok(
      entries
        .get(key)
        .filter(|entry| entry.generation == generation)
        .cloned(),
    )
  }

  /// Store a body fetched under `generation`. A bust that landed mid-request
  /// means the body is already stale, so it is dropped instead.
  fn store(&self, key: String, body: ParsedBody, generation: u64) -> Result<()> {
    let mut entries = self
      .entries
      .write()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let current = self.generation.load(Ordering::Acquire);
    if self.pruned_generation.swap(current, Ordering::AcqRel) != current {
      entries.retain(|_, entry| entry.generation == current);
    }
    if generation != current {
      tracing::debug!("Fetch cache busted during request; not storing");
      return Ok(());
    }

    entries.insert(
      key,
      CacheEntry {
        body,
        created_at: Utc::now(),
        generation,
      },
    );
    Ok(())
  }
}

fn cache_key(url: &str, credential: Option<&str>) -> String {
  format!("{}#{}", url, credential_digest(credential))
}

/// Short stable digest of a credential; `anon` when there is none.
pub fn credential_digest(credential: Option<&str>) -> String {
  use sha2::{Digest, Sha256};

  match credential {
    Some(token) if !token.is_empty() => {
      let mut hasher = Sha256::new();
      hasher.update(token.as_bytes());
      hex::encode(hasher.finalize())[..16].to_string()
    }
    _ => "anon".to_string(),
  }
}
