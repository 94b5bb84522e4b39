//! `referee`: keep the review-tracking stores in agreement.
//!
//! # Usage
//!
//! ```text
//! referee sync
//! referee sync --pair dir-cache
//! referee --config ~/.config/referee/referee.toml list --all
//! referee search euonco
//! referee check-remote
//! referee import edits.json
//! referee import reviewer_metrics.csv
//! ```

mod commands;
mod settings;

use std::{path::PathBuf, process::ExitCode};

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::Pair;
use settings::Settings;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "referee", version, about = "Reconcile peer-review records across stores")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, value_name = "FILE", default_value = "referee.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Run reconcile passes (default: dir-cache, cache-remote, remote-cache).
  Sync {
    /// A pass to run; repeat to run several in order.
    #[arg(long = "pair", value_enum, value_name = "PAIR")]
    pairs: Vec<Pair>,
  },

  /// Show the cache, one line per manuscript at its latest round.
  List {
    /// Show every stored round instead.
    #[arg(long)]
    all: bool,
  },

  /// Filter the cache by manuscript number, file name or editor.
  Search { query: String },

  /// Check that the remote table is reachable and count its rows.
  CheckRemote,

  /// Save edited records (a JSON array, or a `.csv` cache export) into the
  /// cache.
  Import { file: PathBuf },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<ExitCode> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  // `.env` supplies SUPABASE_URL / SUPABASE_KEY when they are not exported.
  if let Err(e) = dotenvy::dotenv()
    && !e.not_found()
  {
    tracing::warn!(error = %e, "ignoring unreadable .env");
  }

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config)?;
  tracing::debug!(cache = ?settings.cache_path, dir = ?settings.dealt_with_dir, "loaded settings");

  match cli.command {
    Command::Sync { pairs } => commands::sync(&settings, &pairs).await,
    Command::List { all } => commands::list(&settings, all).await,
    Command::Search { query } => commands::search(&settings, &query).await,
    Command::CheckRemote => commands::check_remote(&settings).await,
    Command::Import { file } => commands::import(&settings, &file).await,
  }
}
