//! Serde-deserializable types matching GitHub gist API responses.
//!
//! These types are separate from domain types to allow lenient deserialization
//! while keeping domain types focused on application needs.

use serde::Deserialize;

use super::types::{Gist, Visibility};

#[derive(Debug, Deserialize)]
pub struct ApiOwner {
  pub login: String,
}

/// A gist as returned by the list and single-gist endpoints
#[derive(Debug, Deserialize)]
pub struct ApiGist {
  pub id: Option<String>,
  pub description: Option<String>,
  #[serde(default)]
  pub public: bool,
  pub owner: Option<ApiOwner>,
}

impl ApiGist {
  /// Normalize into a listed gist.
  ///
  /// Returns `None` for gists without an id and for gists whose description
  /// marks them as unlisted.
  pub fn into_gist(self, include_owner: bool) -> Option<Gist> {
    let id = self.id.filter(|id| !id.is_empty())?;
    if self.description.as_deref().is_some_and(is_unlisted) {
      return None;
    }

    Some(Gist {
      id,
      description: self.description,
      visibility: Visibility::from_public(self.public),
      owner: if include_owner {
        self.owner.map(|o| o.login)
      } else {
        None
      },
    })
  }
}

fn is_unlisted(description: &str) -> bool {
  description.to_lowercase().contains("unlisted")
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn parse(value: serde_json::Value) -> ApiGist {
    serde_json::from_value(value).unwrap()
  }

  #[test]
  fn test_into_gist_keeps_fields() {
    let gist = parse(json!({
      "id": "abc",
      "description": "A bar chart",
      "public": false,
      "owner": { "login": "mbostock" },
      "files": {}
    }))
    .into_gist(true)
    .unwrap();

    assert_eq!(gist.id, "abc");
    assert_eq!(gist.description.as_deref(), Some("A bar chart"));
    assert_eq!(gist.visibility, Visibility::Private);
    assert_eq!(gist.owner.as_deref(), Some("mbostock"));
  }

  #[test]
  fn test_owner_dropped_for_single_owner_listings() {
    let gist = parse(json!({ "id": "abc", "public": true, "owner": { "login": "x" } }))
      .into_gist(false)
      .unwrap();
    assert_eq!(gist.owner, None);
    assert_eq!(gist.visibility, Visibility::Public);
  }

  #[test]
  fn test_missing_or_empty_id_is_dropped() {
    assert!(parse(json!({ "description": "x" })).into_gist(false).is_none());
    assert!(parse(json!({ "id": "" })).into_gist(false).is_none());
  }

  #[test]
  fn test_unlisted_description_is_dropped() {
    for description in ["unlisted", "Draft (UNLISTED)", "some UnListed thing"] {
      let gist = parse(json!({ "id": "a", "description": description }));
      assert!(gist.into_gist(false).is_none(), "{description}");
    }

    let listed = parse(json!({ "id": "a", "description": "listed" }));
    assert!(listed.into_gist(false).is_some());
  }
}
