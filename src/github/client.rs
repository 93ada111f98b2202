use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::cache::{FetchCache, ResponseFormat};
use crate::config::Config;
use crate::github::api_types::ApiGist;
use crate::github::types::Gist;

/// How the page budget bounds a walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetCheck {
  /// Keep going while the next page number is below the budget
  Exclusive,
  /// Keep going while the next page number is at most the budget
  Inclusive,
}

impl BudgetCheck {
  fn allows(self, next_page: u32, max_pages: u32) -> bool {
    match self {
      Self::Exclusive => next_page < max_pages,
      Self::Inclusive => next_page <= max_pages,
    }
  }
}

/// One paginated walk of a gist listing.
#[derive(Debug, Clone)]
pub struct PageWalk {
  /// Path segments of the listing endpoint, relative to the API root
  pub segments: Vec<String>,
  pub per_page: u32,
  pub max_pages: u32,
  pub budget: BudgetCheck,
  /// Keep each gist's owner login
  pub include_owner: bool,
}

/// GitHub gist API client wrapper
#[derive(Clone)]
pub struct GistClient {
  base_url: Url,
  fetch: Arc<FetchCache>,
}

impl GistClient {
  pub fn new(config: &Config) -> Result<Self> {
    let mut builder = reqwest::Client::builder().user_agent(config.github.user_agent.as_str());
    if let Some(secs) = config.github.timeout_secs {
      builder = builder.timeout(Duration::from_secs(secs));
    }
    let http = builder
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Self::with_fetch_cache(&config.github.api_url, Arc::new(FetchCache::new(http)))
  }

  /// Build a client on top of an existing fetch cache.
  pub fn with_fetch_cache(api_url: &str, fetch: Arc<FetchCache>) -> Result<Self> {
    let base_url =
      Url::parse(api_url).map_err(|e| eyre!("Invalid API URL {}: {}", api_url, e))?;
    if base_url.cannot_be_a_base() {
      return Err(eyre!("API URL {} cannot be used as a base", api_url));
    }

    Ok(Self { base_url, fetch })
  }

  /// The fetch cache every request goes through.
  pub fn fetch_cache(&self) -> &FetchCache {
    &self.fetch
  }

  fn endpoint<S: AsRef<str>>(&self, segments: &[S]) -> Result<Url> {
    let mut url = self.base_url.clone();
    url
      .path_segments_mut()
      .map_err(|_| eyre!("API URL {} cannot be used as a base", self.base_url))?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  /// Walk the pages of a gist listing.
  ///
  /// Pages are requested one after the other starting at 1. The walk stops
  /// after a page shorter than `per_page`, or when the budget check rejects
  /// the next page. The first page is always requested.
  pub async fn fetch_pages(&self, walk: &PageWalk, credential: Option<&str>) -> Result<Vec<Gist>> {
    let mut gists = Vec::new();
    let mut page = 1u32;

    loop {
      let mut url = self.endpoint(&walk.segments)?;
      url
        .query_pairs_mut()
        .append_pair("page", &page.to_string())
        .append_pair("per_page", &walk.per_page.to_string());

      let body = self
        .fetch
        .fetch(url.as_str(), ResponseFormat::Json, credential)
        .await?;
      let raw: Vec<ApiGist> = serde_json::from_value(body.into_json()?)
        .map_err(|e| eyre!("Failed to parse gist page {}: {}", url, e))?;

      // Fullness is judged before filtering, on what the API returned
      let full = raw.len() >= walk.per_page as usize;
      gists.extend(raw.into_iter().filter_map(|g| g.into_gist(walk.include_owner)));

      page += 1;
      if !full || !walk.budget.allows(page, walk.max_pages) {
        break;
      }
    }

    tracing::debug!(
      "Fetched {} gists from {} in {} pages",
      gists.len(),
      walk.segments.join("/"),
      page - 1
    );
    Ok(gists)
  }

  /// Get a single gist by id.
  ///
  /// Always requested anonymously: the lookup only needs the owner login.
  pub async fn get_gist(&self, id: &str) -> Result<ApiGist> {
    let url = self.endpoint(&["gists", id])?;

    let body = self
      .fetch
      .fetch(url.as_str(), ResponseFormat::Json, None)
      .await?;

    serde_json::from_value(body.into_json()?)
      .map_err(|e| eyre!("Failed to parse gist {}: {}", id, e))
  }
}
