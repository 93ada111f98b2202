//! Line-oriented host that answers many lookups from one long-lived client.
//!
//! Each input line is one request; each answer is one line of JSON. Keeping
//! the client alive between requests is what lets the fetch cache serve
//! repeated lookups and lets `cachebust` drop them.

use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::cache::SnapshotStorage;
use crate::github::cached_client::CachedGistClient;
use crate::github::types::Gist;

/// A single request read from the input stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
  Owned(String),
  Starred(String),
  CacheBust,
}

impl Request {
  /// Parse one input line, e.g. `owned alice`, `starred alice` or `cachebust`.
  pub fn parse(line: &str) -> Result<Self> {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default().to_lowercase();
    let user = words.next().map(String::from);

    if words.next().is_some() {
      return Err(eyre!("Too many arguments in '{}'", line.trim()));
    }

    match (command.as_str(), user) {
      ("owned" | "o", Some(user)) => Ok(Self::Owned(user)),
      ("starred" | "s", Some(user)) => Ok(Self::Starred(user)),
      ("owned" | "o" | "starred" | "s", None) => Err(eyre!("'{}' needs a user", command)),
      ("cachebust" | "bust", None) => Ok(Self::CacheBust),
      _ => Err(eyre!("Unknown request '{}'", line.trim())),
    }
  }
}

/// Answer requests from `input` until it ends, writing one JSON line each.
///
/// A bad line or a failed lookup is answered with `{"error": ...}` and the
/// loop carries on; only I/O on the streams themselves ends it early.
pub async fn serve<S, R, W>(
  client: &CachedGistClient<S>,
  input: R,
  mut output: W,
  token: Option<&str>,
) -> Result<()>
where
  S: SnapshotStorage<Item = Gist>,
  R: AsyncBufRead + Unpin,
  W: AsyncWrite + Unpin,
{
  let mut lines = input.lines();

  while let Some(line) = lines
    .next_line()
    .await
    .map_err(|e| eyre!("Failed to read request: {}", e))?
  {
    if line.trim().is_empty() {
      continue;
    }

    let reply = match answer(client, &line, token).await {
      Ok(value) => value,
      Err(e) => {
        tracing::warn!("Request '{}' failed: {}", line.trim(), e);
        json!({ "error": e.to_string() })
      }
    };

    let mut text = serde_json::to_string(&reply)?;
    text.push('\n');
    output
      .write_all(text.as_bytes())
      .await
      .map_err(|e| eyre!("Failed to write answer: {}", e))?;
    output
      .flush()
      .await
      .map_err(|e| eyre!("Failed to write answer: {}", e))?;
  }

  Ok(())
}

async fn answer<S: SnapshotStorage<Item = Gist>>(
  client: &CachedGistClient<S>,
  line: &str,
  token: Option<&str>,
) -> Result<serde_json::Value> {
  match Request::parse(line)? {
    Request::Owned(user) => to_value(&client.owned_gists(&user, token).await?),
    Request::Starred(user) => to_value(&client.starred_gists(&user, token).await?),
    Request::CacheBust => {
      client.bust_cache();
      Ok(json!({ "busted": true }))
    }
  }
}

fn to_value<T: Serialize>(value: &T) -> Result<serde_json::Value> {
  serde_json::to_value(value).map_err(|e| eyre!("Failed to encode answer: {}", e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::NoopStorage;
  use crate::config::Config;
  use serde_json::Value;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  #[test]
  fn test_parse_requests() {
    assert_eq!(
      Request::parse("owned alice").unwrap(),
      Request::Owned("alice".to_string())
    );
    assert_eq!(
      Request::parse("  S bob ").unwrap(),
      Request::Starred("bob".to_string())
    );
    assert_eq!(Request::parse("cachebust").unwrap(), Request::CacheBust);
    assert!(Request::parse("owned").is_err());
    assert!(Request::parse("owned a b").is_err());
    assert!(Request::parse("cachebust now").is_err());
    assert!(Request::parse("forks alice").is_err());
  }

  fn answers(output: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(output)
      .lines()
      .map(|line| serde_json::from_str(line).unwrap())
      .collect()
  }

  #[tokio::test]
  async fn test_lookups_share_fetch_cache_until_bust() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/users/alice/gists"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{ "id": "a" }])))
      .mount(&server)
      .await;

    let mut config = Config::default();
    config.github.api_url = server.uri();
    let client = CachedGistClient::with_storage(&config, NoopStorage::<Gist>::default()).unwrap();

    let mut output = Vec::new();
    serve(&client, b"owned alice\nowned alice\n\n".as_slice(), &mut output, None)
      .await
      .unwrap();
    client.wait_for_refreshes().await;
    serve(&client, b"cachebust\nowned alice\n".as_slice(), &mut output, None)
      .await
      .unwrap();
    client.wait_for_refreshes().await;

    let answers = answers(&output);
    assert_eq!(answers.len(), 4);
    assert_eq!(answers[0]["items"][0]["id"], "a");
    assert_eq!(answers[1], answers[0]);
    assert_eq!(answers[2], serde_json::json!({ "busted": true }));
    assert_eq!(answers[3]["items"][0]["id"], "a");

    // One request before the bust, one after; every other walk was a cache hit
    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 2);
  }

  #[tokio::test]
  async fn test_bad_request_is_answered_and_loop_continues() {
    let server = MockServer::start().await;
    let mut config = Config::default();
    config.github.api_url = server.uri();
    let client = CachedGistClient::with_storage(&config, NoopStorage::<Gist>::default()).unwrap();

    let input = b"forks alice\nstarred alice\n".as_slice();
    let mut output = Vec::new();
    serve(&client, input, &mut output, None).await.unwrap();

    let answers = answers(&output);
    assert_eq!(answers.len(), 2);
    assert!(answers[0]["error"]
      .as_str()
      .unwrap()
      .contains("Unknown request"));
    assert_eq!(answers[1]["credentialMissing"], true);
  }
}
