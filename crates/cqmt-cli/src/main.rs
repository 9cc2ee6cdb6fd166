//! `cqmt` — command-line front end for the competency-question engine.
//!
//! Reads `cqmt.toml` (or the path given with `--config`), layers `CQMT_*`
//! environment variables over it, opens the SQLite catalog and talks to the
//! configured SPARQL endpoint. Every command prints JSON on stdout; logs go
//! to stderr.
//!
//! ```text
//! cqmt mt create --project 6f1c… --label baseline --default
//! cqmt cq upsert question.json
//! cqmt run --project 6f1c… --cq aircraft-with-labels --param type=http://ex.org/Aircraft
//! cqmt changes --ontology http://ex.org/onto proposed.ttl
//! ```
//!
//! Nested keys use `__` after the prefix, e.g. `CQMT_SPARQL__QUERY_URL`.

mod commands;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use commands::Command;
use cqmt_engine::{ChangeDetector, DependencyTracker, EngineConfig, Workbench};
use cqmt_sparql::{HttpEndpoint, TriplestoreClient};
use cqmt_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Competency questions over ontology microtheories")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "cqmt.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

/// Everything a command may need, built once from the configuration.
pub struct Engine {
  pub workbench: Workbench<SqliteStore, HttpEndpoint>,
  pub tracker:   DependencyTracker<SqliteStore, HttpEndpoint>,
  pub detector:  ChangeDetector<SqliteStore, HttpEndpoint>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("CQMT")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?;

  let engine_cfg: EngineConfig = settings
    .try_deserialize()
    .context("failed to deserialise EngineConfig")?;

  let store_path = expand_tilde(&engine_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  let endpoint = HttpEndpoint::new(engine_cfg.sparql.endpoint_config())
    .context("failed to build SPARQL client")?;
  let client = TriplestoreClient::new(endpoint);

  let tracker = DependencyTracker::new(store.clone(), client.clone());
  let engine = Engine {
    workbench: Workbench::new(store.clone(), client.clone(), engine_cfg.workbench_settings()),
    detector:  ChangeDetector::new(DependencyTracker::new(store, client)),
    tracker,
  };

  let output = commands::execute(&engine, cli.command).await?;
  println!(
    "{}",
    serde_json::to_string_pretty(&output).context("failed to encode output")?
  );
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
