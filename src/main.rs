mod cache;
mod config;
mod github;
mod serve;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::cache::{NoopStorage, SnapshotStorage};
use crate::github::cached_client::CachedGistClient;
use crate::github::types::Gist;

#[derive(Parser, Debug)]
#[command(name = "gistcache")]
#[command(about = "List a user's gists from a local snapshot, refreshed from GitHub")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/gistcache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// GitHub token; needed for starred gists and private gists
  #[arg(short, long, env = "GISTCACHE_TOKEN", hide_env_values = true)]
  token: Option<String>,

  /// Exit without waiting for the background snapshot refresh
  #[arg(long)]
  no_wait: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Gists owned by a user
  Owned { user: String },
  /// Gists starred by the token's user
  Starred { user: String },
  /// Answer `owned <user>`, `starred <user>` and `cachebust` lines from stdin
  Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  // Logs go to stderr so stdout stays machine-readable
  let (writer, _guard) = tracing_appender::non_blocking(std::io::stderr());
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gistcache=info")),
    )
    .with_writer(writer)
    .init();

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let token = args.token.clone().or_else(config::Config::get_token);

  if config.cache.snapshots {
    run(CachedGistClient::new(&config)?, &args, token.as_deref()).await
  } else {
    let client = CachedGistClient::with_storage(&config, NoopStorage::<Gist>::default())?;
    run(client, &args, token.as_deref()).await
  }
}

async fn run<S: SnapshotStorage<Item = Gist>>(
  client: CachedGistClient<S>,
  args: &Args,
  token: Option<&str>,
) -> Result<()> {
  match &args.command {
    Command::Owned { user } => print_json(&client.owned_gists(user, token).await?)?,
    Command::Starred { user } => print_json(&client.starred_gists(user, token).await?)?,
    Command::Serve => {
      let stdin = tokio::io::BufReader::new(tokio::io::stdin());
      serve::serve(&client, stdin, tokio::io::stdout(), token).await?
    }
  }

  if !args.no_wait {
    client.wait_for_refreshes().await;
  }
  tracing::debug!("Fetch cache holds {} responses", client.cached_responses());

  Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
