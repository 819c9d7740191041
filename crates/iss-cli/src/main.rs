//! `iss`: command-line front end for the caseload store.
//!
//! Reads `iss.toml` (or the path given with `--config`), opens the SQLite
//! store and runs one command, printing the result as JSON.
//!
//! # Usage
//!
//! ```
//! iss staff add "Alice Smith" --role staff
//! iss child add Ada Byron --dob 2021-03-14
//! iss assign <CHILD_ID> <STAFF_ID> --primary
//! iss discharge <CHILD_ID> --date 2026-06-01 --reason "Aged out"
//! ```

mod commands;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Parser;
use iss_store_sqlite::SqliteStore;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::commands::Command;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "iss", version, about = "Caseload and child status management")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "iss.toml")]
  config: PathBuf,

  /// SQLite database path; overrides `store_path` from the config.
  #[arg(long, value_name = "FILE")]
  store: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

// ─── Config ───────────────────────────────────────────────────────────────────

/// Settings read from the config file and `ISS_*` environment variables.
#[derive(Deserialize, Debug)]
struct CliConfig {
  store_path: PathBuf,
}

fn load_config(path: PathBuf) -> anyhow::Result<CliConfig> {
  let settings = config::Config::builder()
    .set_default("store_path", "iss.db")?
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("ISS"))
    .build()
    .context("failed to read config file")?;

  settings
    .try_deserialize()
    .context("failed to deserialise CliConfig")
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let cfg = load_config(cli.config)?;

  let store_path = expand_tilde(cli.store.as_deref().unwrap_or(&cfg.store_path));
  tracing::debug!(?store_path, "opening store");

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let output = commands::run(&store, cli.command).await?;
  println!("{}", serde_json::to_string_pretty(&output)?);

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
