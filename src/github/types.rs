use serde::Serialize;

use crate::cache::CacheSource;

/// Whether a gist is listed publicly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
  Public,
  Private,
}

impl Visibility {
  pub fn from_public(public: bool) -> Self {
    if public {
      Self::Public
    } else {
      Self::Private
    }
  }

  pub fn is_public(self) -> bool {
    self == Self::Public
  }
}

/// A gist as listed in a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Gist {
  pub id: String,
  pub description: Option<String>,
  pub visibility: Visibility,
  /// Owner login; only set for collections spanning several owners (starred)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub owner: Option<String>,
}

/// Which listing of gists to mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GistKind {
  /// Gists owned by a user; readable without a credential
  Owned,
  /// Gists starred by the authenticated user; requires a credential
  Starred,
}

impl GistKind {
  pub fn requires_credential(self) -> bool {
    matches!(self, Self::Starred)
  }

  /// Starred gists belong to many owners, so each keeps its owner login.
  pub fn includes_owner(self) -> bool {
    matches!(self, Self::Starred)
  }
}

/// Caller-facing result of a collection lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionResult {
  pub items: Vec<Gist>,
  pub error: Option<String>,
  pub credential_missing: bool,
  /// Where the items came from; `None` when nothing was consulted
  pub source: Option<CacheSource>,
}

impl CollectionResult {
  pub fn credential_missing() -> Self {
    Self {
      items: Vec::new(),
      error: None,
      credential_missing: true,
      source: None,
    }
  }
}

/// Result of looking up a user's own gists
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OwnedGists {
  Collection(CollectionResult),
  /// The requested owner key was really a gist id; it lives under `owner`
  Redirect { owner: String, id: String },
}
