//! Caching implementations for gist types.

use serde::Deserialize;

use crate::cache::fetch::credential_digest;
use crate::cache::{Cacheable, CsvRecord, SnapshotKey};

use super::types::{Gist, GistKind, Visibility};

// ============================================================================
// Cacheable implementations
// ============================================================================

impl Cacheable for Gist {
  fn cache_key(&self) -> &str {
    &self.id
  }
}

/// One record of a gist snapshot file.
#[derive(Debug, Deserialize)]
pub struct GistRow {
  id: String,
  description: Option<String>,
  public: String,
  #[serde(default)]
  owner: Option<String>,
}

const COLUMNS: &[&str] = &["id", "description", "public"];
const COLUMNS_WITH_OWNER: &[&str] = &["id", "description", "public", "owner"];

impl CsvRecord for Gist {
  type Row = GistRow;

  fn header(items: &[Self]) -> &'static [&'static str] {
    if items.iter().any(|g| g.owner.is_some()) {
      COLUMNS_WITH_OWNER
    } else {
      COLUMNS
    }
  }

  /// An empty description is written as an empty cell, which reads back as
  /// `None`; snapshots do not distinguish `Some("")` from no description.
  fn field(&self, column: &str) -> String {
    match column {
      "id" => self.id.clone(),
      "description" => self.description.clone().unwrap_or_default(),
      "public" => self.visibility.is_public().to_string(),
      "owner" => self.owner.clone().unwrap_or_default(),
      _ => String::new(),
    }
  }

  fn from_row(row: GistRow) -> Result<Self, String> {
    if row.id.is_empty() {
      return Err("gist without id".to_string());
    }

    Ok(Gist {
      id: row.id,
      description: row.description,
      // Anything but the literal written for public gists reads as private
      visibility: Visibility::from_public(row.public == "true"),
      owner: row.owner,
    })
  }
}

// ============================================================================
// Snapshot keys
// ============================================================================

/// Identifies the snapshot of one collection as seen by one credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionKey {
  pub kind: GistKind,
  pub owner: String,
  /// Digest of the credential; different credentials see different gists
  pub credential_digest: String,
}

impl CollectionKey {
  pub fn new(kind: GistKind, owner: &str, credential: Option<&str>) -> Self {
    Self {
      kind,
      owner: owner.to_string(),
      credential_digest: credential_digest(credential),
    }
  }
}

impl SnapshotKey for CollectionKey {
  fn file_stem(&self) -> String {
    let stem = format!("{}-{}", sanitize(&self.owner), self.credential_digest);
    match self.kind {
      GistKind::Owned => stem,
      GistKind::Starred => format!("{}-starred", stem),
    }
  }

  fn description(&self) -> String {
    match self.kind {
      GistKind::Owned => format!("gists of {}", self.owner),
      GistKind::Starred => format!("starred gists of {}", self.owner),
    }
  }
}

/// Percent-encode every byte of an owner key outside `[A-Za-z0-9_-]`.
///
/// The result cannot leave the snapshot directory, and distinct owner keys
/// always map to distinct names.
fn sanitize(owner: &str) -> String {
  let mut out = String::with_capacity(owner.len());
  for byte in owner.bytes() {
    if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
      out.push(byte as char);
    } else {
      out.push_str(&format!("%{:02X}", byte));
    }
  }
  out
}
