//! Subcommand implementations.

use std::{collections::HashSet, path::Path, process::ExitCode};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::ValueEnum;
use referee_core::{
  CompositeKey, ManuscriptRecord,
  normalize::{ColumnMap, RawRow, format_date},
  reconcile::{PairOutcome, run_pair},
  resolve,
  store::RecordSource,
  view,
};
use referee_store_dir::DirectoryStore;
use referee_store_remote::RemoteStore;
use referee_store_sqlite::SqliteStore;
use serde_json::Value;

use crate::settings::Settings;

// ─── Sync ────────────────────────────────────────────────────────────────────

/// A directional reconcile pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Pair {
  DirCache,
  CacheRemote,
  RemoteCache,
}

impl Pair {
  /// Directory into the cache, then the cache out to the remote, then
  /// anything only the remote knows back into the cache.
  pub const DEFAULT_PLAN: [Pair; 3] = [Pair::DirCache, Pair::CacheRemote, Pair::RemoteCache];
}

pub async fn sync(settings: &Settings, pairs: &[Pair]) -> Result<ExitCode> {
  let outcomes = run_plan(settings, pairs).await?;
  for outcome in &outcomes {
    println!("{}", outcome.describe());
  }

  let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
  if failed > 0 {
    tracing::warn!(failed, "some passes failed");
    return Ok(ExitCode::FAILURE);
  }
  Ok(ExitCode::SUCCESS)
}

/// Run each pass in order. A failed pass does not stop the ones after it;
/// passes that need an unconfigured remote are skipped.
async fn run_plan(settings: &Settings, pairs: &[Pair]) -> Result<Vec<PairOutcome>> {
  let plan = if pairs.is_empty() { &Pair::DEFAULT_PLAN[..] } else { pairs };

  let columns = settings.column_map()?;
  let cache = open_cache(settings).await?;
  let dir = DirectoryStore::new(&settings.dealt_with_dir);
  let remote = match settings.remote() {
    Some(cfg) => Some(RemoteStore::new(cfg.clone(), columns).context("remote client")?),
    None => None,
  };

  let mut outcomes = Vec::with_capacity(plan.len());
  for &pair in plan {
    let outcome = match (pair, &remote) {
      (Pair::DirCache, _) => run_pair(&dir, &cache).await,
      (Pair::CacheRemote, Some(remote)) => run_pair(&cache, remote).await,
      (Pair::RemoteCache, Some(remote)) => run_pair(remote, &cache).await,
      (pair, None) => {
        tracing::warn!(?pair, "remote table not configured; skipping");
        continue;
      }
    };
    outcomes.push(outcome);
  }
  Ok(outcomes)
}

// ─── Cache views ─────────────────────────────────────────────────────────────

pub async fn list(settings: &Settings, all: bool) -> Result<ExitCode> {
  let cache = open_cache(settings).await?;
  let rows = cache.read_all().await.context("reading the cache")?;
  if !all {
    let mut current = resolve::current(rows);
    view::sort_for_display(&mut current);
    print_records(current.iter());
    return Ok(ExitCode::SUCCESS);
  }

  let mut rows = rows;
  view::sort_for_display(&mut rows);
  let hidden: HashSet<CompositeKey> = resolve::superseded(&rows)
    .into_iter()
    .map(ManuscriptRecord::composite_key)
    .collect();
  for r in &rows {
    let mark = if hidden.contains(&r.composite_key()) { "  (superseded)" } else { "" };
    println!("{}{mark}", render(r));
  }
  Ok(ExitCode::SUCCESS)
}

pub async fn search(settings: &Settings, query: &str) -> Result<ExitCode> {
  let cache = open_cache(settings).await?;
  let rows = cache.read_all().await.context("reading the cache")?;
  let mut current = resolve::current(rows);
  view::sort_for_display(&mut current);
  let hits = view::search(&current, query);
  if hits.is_empty() {
    println!("no manuscripts match {query:?}");
  } else {
    print_records(hits.into_iter());
  }
  Ok(ExitCode::SUCCESS)
}

/// Save edited records into the cache. A `.csv` file is read like the
/// cache export (`Name, MS Number, Version, ...`); anything else must be a
/// JSON array of records.
pub async fn import(settings: &Settings, file: &Path) -> Result<ExitCode> {
  let raw = tokio::fs::read(file)
    .await
    .with_context(|| format!("reading {}", file.display()))?;
  let is_csv = file
    .extension()
    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
  let edits = if is_csv {
    read_csv(&raw, &settings.column_map()?)
  } else {
    serde_json::from_slice::<Vec<ManuscriptRecord>>(&raw).map_err(Into::into)
  }
  .with_context(|| format!("parsing {}", file.display()))?;

  let cache = open_cache(settings).await?;
  let report = view::apply_edits(&cache, edits).await?;
  println!("saved: {} new, {} updated", report.inserted, report.updated);
  Ok(ExitCode::SUCCESS)
}

/// Rows of a CSV export through the column normalizer. Empty cells are
/// null.
fn read_csv(raw: &[u8], columns: &ColumnMap) -> Result<Vec<ManuscriptRecord>> {
  let mut reader = csv::Reader::from_reader(raw);
  let header: Vec<String> = reader.headers()?.iter().map(str::to_owned).collect();
  columns.validate_header(header.iter().map(String::as_str))?;

  let mut rows = Vec::new();
  for (i, fields) in reader.records().enumerate() {
    let fields = fields.with_context(|| format!("row {}", i + 2))?;
    let row: RawRow = header
      .iter()
      .cloned()
      .zip(fields.iter().map(|f| if f.is_empty() { Value::Null } else { Value::from(f) }))
      .collect();
    rows.push(row);
  }
  Ok(columns.normalize_rows(&rows)?)
}

// ─── Remote ──────────────────────────────────────────────────────────────────

pub async fn check_remote(settings: &Settings) -> Result<ExitCode> {
  let Some(cfg) = settings.remote() else {
    bail!("remote table not configured: set SUPABASE_URL and SUPABASE_KEY or a [remote] section");
  };
  let remote = RemoteStore::new(cfg.clone(), settings.column_map()?).context("remote client")?;
  let endpoint = cfg.endpoint();

  remote
    .ping()
    .await
    .with_context(|| format!("connecting to {endpoint}"))?;
  let rows = remote
    .read_all()
    .await
    .with_context(|| format!("reading {endpoint}"))?;
  let stored = rows.len();
  let current = resolve::current(rows).len();
  println!("{endpoint}: reachable, {stored} row(s), {current} manuscript(s)");
  Ok(ExitCode::SUCCESS)
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

async fn open_cache(settings: &Settings) -> Result<SqliteStore> {
  let path = &settings.cache_path;
  SqliteStore::open(path, settings.column_map()?)
    .await
    .with_context(|| format!("failed to open cache at {path:?}"))
}

fn print_records<'a>(records: impl Iterator<Item = &'a ManuscriptRecord>) {
  for line in records.map(render) {
    println!("{line}");
  }
}

/// One aligned line per record.
fn render(r: &ManuscriptRecord) -> String {
  let date = |d: Option<NaiveDate>| d.map(format_date).unwrap_or_else(|| "-".into());
  format!(
    "{:<24} {:>4}  {:<20} {:<10}  {:<10}",
    r.composite_key().to_string(),
    r.year.map(|y| y.to_string()).unwrap_or_else(|| "-".into()),
    r.editor.as_deref().unwrap_or("-"),
    date(r.date_invited),
    date(r.date_completed),
  )
}
