use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub github: GithubConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub collections: CollectionsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
  /// Base URL of the REST API (GitHub Enterprise uses https://host/api/v3)
  pub api_url: String,
  pub user_agent: String,
  /// Per-request timeout; unset means requests may take as long as the server does
  pub timeout_secs: Option<u64>,
}

impl Default for GithubConfig {
  fn default() -> Self {
    Self {
      api_url: "https://api.github.com".to_string(),
      user_agent: concat!("gistcache/", env!("CARGO_PKG_VERSION")).to_string(),
      timeout_secs: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Directory for snapshot files (defaults to the platform cache dir)
  pub dir: Option<PathBuf>,
  /// Keep snapshots on disk; when off every request walks the full page budget
  pub snapshots: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      dir: None,
      snapshots: true,
    }
  }
}

/// Page sizes and budgets for walking gist listings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectionsConfig {
  /// Gists per page on full walks
  pub page_size: u32,
  /// Gists per page on the shallow walk of a user's own gists
  pub shallow_page_size: u32,
  /// Page budget for a user's own gists; pages requested stay below it
  pub owned_max_pages: u32,
  /// Page budget for starred gists; pages requested may reach it
  pub starred_max_pages: u32,
}

impl Default for CollectionsConfig {
  fn default() -> Self {
    Self {
      page_size: 100,
      shallow_page_size: 10,
      owned_max_pages: 11,
      starred_max_pages: 3,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./gistcache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/gistcache/config.yaml
  ///
  /// Every setting has a default, so finding no file is not an error.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("gistcache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("gistcache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file is a valid config with every default
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  /// Directory holding snapshot files.
  pub fn snapshot_dir(&self) -> Result<PathBuf> {
    if let Some(dir) = &self.cache.dir {
      return Ok(dir.clone());
    }

    let cache_dir = dirs::cache_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".cache")))
      .ok_or_else(|| eyre!("Could not determine cache directory"))?;

    Ok(cache_dir.join("gistcache").join("usercache"))
  }

  /// Get the GitHub token from environment variables.
  ///
  /// Checks GISTCACHE_TOKEN first, then GITHUB_TOKEN as fallback. A missing
  /// token is not an error: anonymous access still lists public gists.
  pub fn get_token() -> Option<String> {
    std::env::var("GISTCACHE_TOKEN")
      .or_else(|_| std::env::var("GITHUB_TOKEN"))
      .ok()
      .filter(|token| !token.is_empty())
  }
}
