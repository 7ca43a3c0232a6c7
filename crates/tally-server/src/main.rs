//! tally server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite ledger and serves the JSON API over HTTP.
//!
//! # Repairing aggregates
//!
//! To re-derive every job's counters from its ledger and exit:
//!
//! ```
//! cargo run -p tally-server --bin server -- --repair
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use tally_core::Ledger;
use tally_server::{ServerConfig, expand_tilde};
use tally_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Tally production ledger server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Re-derive every job aggregate from its ledger, print a report and exit.
  #[arg(long)]
  repair: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
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
    .add_source(config::Environment::with_prefix("TALLY"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let ledger = Ledger::new(store).with_policy(server_cfg.capacity_policy);

  // Helper mode: repair aggregates and exit.
  if cli.repair {
    let report = ledger.repair_all().await.context("repair pass failed")?;
    println!(
      "checked {} jobs, repaired {}",
      report.checked,
      report.repaired.len()
    );
    for job_id in &report.repaired {
      println!("  {job_id}");
    }
    return Ok(());
  }

  let app = tally_server::router(Arc::new(ledger));
  let address = server_cfg.address();

  tracing::info!(
    store = %store_path.display(),
    policy = ?server_cfg.capacity_policy,
    "Listening on http://{address}"
  );
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
