//! The reconciler: brings one store up to date from another.
//!
//! A pass is directional (source → target) and upsert-only: rows the target
//! lacks by composite key are added, nothing is removed. Bringing every store
//! into agreement takes one pass per ordered pair; the caller decides which
//! pairs to run and in what order.

use std::collections::HashSet;

use serde::Serialize;

use crate::{
  error::SyncError,
  normalize::canonicalize,
  record::{CompositeKey, ManuscriptRecord},
  resolve,
  store::{RecordSource, RecordStore},
};

// ─── Reports ─────────────────────────────────────────────────────────────────

/// The result of a successful pass.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
  pub source:      String,
  pub target:      String,
  /// Keys written to the target, in write order.
  pub inserted:    Vec<CompositeKey>,
  /// Physical rows in the target after the pass, superseded rounds included.
  pub stored_rows: usize,
  /// The target's current view: one record per identity, highest round.
  pub current:     Vec<ManuscriptRecord>,
}

impl SyncReport {
  pub fn is_noop(&self) -> bool { self.inserted.is_empty() }

  pub fn summary(&self) -> String {
    if self.is_noop() {
      format!("{} → {}: no new rows", self.source, self.target)
    } else {
      format!(
        "{} → {}: appended {} new row(s); {} stored, {} current",
        self.source,
        self.target,
        self.inserted.len(),
        self.stored_rows,
        self.current.len(),
      )
    }
  }
}

/// The outcome of one pair in a multi-pair run. Failures are kept as values
/// so one unreachable store does not stop the remaining pairs.
#[derive(Debug)]
pub struct PairOutcome {
  pub source: String,
  pub target: String,
  pub result: Result<SyncReport, SyncError>,
}

impl PairOutcome {
  pub fn is_ok(&self) -> bool { self.result.is_ok() }

  /// One human-readable line for the caller or UI.
  pub fn describe(&self) -> String {
    match &self.result {
      Ok(report) => report.summary(),
      Err(e) => format!("{} → {}: failed: {e}", self.source, self.target),
    }
  }
}

// ─── Reconcile ───────────────────────────────────────────────────────────────

/// Bring `target` up to date with `source`.
///
/// 1. read and resolve the source to its current view
/// 2. read the target and collect its composite keys
/// 3. upsert the source records whose key the target lacks, newest year first
/// 4. re-read the target and return its current view
pub async fn reconcile<S, T>(source: &S, target: &T) -> Result<SyncReport, SyncError>
where
  S: RecordSource,
  T: RecordStore,
{
  let source_records = source.read_all().await.map_err(Into::<SyncError>::into)?;
  let source_current = resolve::current(source_records.into_iter().map(canonicalize));
  tracing::debug!(store = source.name(), current = source_current.len(), "read source");

  let target_records = target.read_all().await.map_err(Into::<SyncError>::into)?;
  let target_keys: HashSet<CompositeKey> = target_records
    .into_iter()
    .map(canonicalize)
    .map(|r| r.composite_key())
    .collect();
  tracing::debug!(store = target.name(), rows = target_keys.len(), "read target");

  let mut missing: Vec<ManuscriptRecord> = source_current
    .into_iter()
    .filter(|r| !target_keys.contains(&r.composite_key()))
    .collect();

  if missing.is_empty() {
    tracing::info!(source = source.name(), target = target.name(), "no new rows");
  } else {
    if let Some(bad) = missing.iter().find(|r| r.identity.is_empty()) {
      return Err(SyncError::InvalidRecord(format!(
        "{} produced a record without a manuscript number: {:?}",
        source.name(),
        bad.name,
      )));
    }

    // Stable: equal years keep source order; unknown years go last.
    missing.sort_by(|a, b| b.year.cmp(&a.year));
    let report = target.upsert(&missing).await.map_err(Into::<SyncError>::into)?;
    tracing::info!(
      source = source.name(),
      target = target.name(),
      inserted = report.inserted,
      updated = report.updated,
      "appended new rows",
    );
  }

  let after = target.read_all().await.map_err(Into::<SyncError>::into)?;
  let stored_rows = after.len();
  let current = resolve::current(after.into_iter().map(canonicalize));

  Ok(SyncReport {
    source: source.name().to_owned(),
    target: target.name().to_owned(),
    inserted: missing.iter().map(ManuscriptRecord::composite_key).collect(),
    stored_rows,
    current,
  })
}

/// [`reconcile`], with the error captured in a [`PairOutcome`] and logged.
pub async fn run_pair<S, T>(source: &S, target: &T) -> PairOutcome
where
  S: RecordSource,
  T: RecordStore,
{
  let result = reconcile(source, target).await;
  if let Err(e) = &result {
    tracing::warn!(source = source.name(), target = target.name(), error = %e, "pass failed");
  }
  PairOutcome {
    source: source.name().to_owned(),
    target: target.name().to_owned(),
    result,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::MemoryStore;

  fn rec(identity: &str, version: u32, year: Option<i32>) -> ManuscriptRecord {
    let mut r = ManuscriptRecord::new(identity, version);
    r.year = year;
    r
  }

  #[tokio::test]
  async fn first_pass_copies_missing_rows() {
    let source = MemoryStore::with_rows("dir", vec![rec("A-D-24-00001", 1, Some(2024))]);
    let target = MemoryStore::new("cache");

    let report = reconcile(&source, &target).await.unwrap();
    assert_eq!(report.inserted, vec![CompositeKey::new("A-D-24-00001", 1)]);
    assert_eq!(target.rows().len(), 1);
    assert_eq!(report.current.len(), 1);
    assert_eq!(report.current[0].version, 1);
  }

  #[tokio::test]
  async fn new_round_is_added_and_old_round_kept() {
    let source = MemoryStore::with_rows("dir", vec![rec("A-D-24-00001", 1, Some(2024))]);
    let target = MemoryStore::new("cache");
    reconcile(&source, &target).await.unwrap();

    source.push(rec("A-D-24-00001", 2, Some(2024)));
    let report = reconcile(&source, &target).await.unwrap();

    assert_eq!(report.inserted, vec![CompositeKey::new("A-D-24-00001", 2)]);
    assert_eq!(report.stored_rows, 2);
    assert_eq!(report.current.len(), 1);
    assert_eq!(report.current[0].version, 2);
    assert_eq!(target.rows().len(), 2);
  }

  #[tokio::test]
  async fn second_pass_is_a_no_op() {
    let source = MemoryStore::with_rows(
      "dir",
      vec![rec("A-D-24-00001", 0, Some(2023)), rec("B-D-24-00002", 1, Some(2024))],
    );
    let target = MemoryStore::new("cache");
    reconcile(&source, &target).await.unwrap();
    let before = target.rows();

    let report = reconcile(&source, &target).await.unwrap();
    assert!(report.is_noop());
    assert!(report.summary().contains("no new rows"));
    assert_eq!(target.rows(), before);
  }

  #[tokio::test]
  async fn every_source_key_reaches_the_target() {
    let source = MemoryStore::with_rows(
      "dir",
      vec![
        rec("A-D-24-00001", 0, Some(2022)),
        rec("B-D-24-00002", 3, None),
        rec("C-D-24-00003", 1, Some(2024)),
      ],
    );
    let target = MemoryStore::with_rows("cache", vec![rec("B-D-24-00002", 3, None)]);
    reconcile(&source, &target).await.unwrap();

    let keys: HashSet<_> = target.rows().iter().map(ManuscriptRecord::composite_key).collect();
    for r in source.rows() {
      assert!(keys.contains(&r.composite_key()));
    }
    assert_eq!(target.rows().len(), 3);
  }

  #[tokio::test]
  async fn missing_rows_are_written_newest_year_first() {
    let source = MemoryStore::with_rows(
      "dir",
      vec![
        rec("A-D-22-00001", 0, Some(2022)),
        rec("X-D-00-00000", 0, None),
        rec("B-D-24-00002", 0, Some(2024)),
        rec("C-D-23-00003", 0, Some(2023)),
      ],
    );
    let target = MemoryStore::new("cache");
    let report = reconcile(&source, &target).await.unwrap();
    let order: Vec<_> = report.inserted.iter().map(|k| k.identity.as_str()).collect();
    assert_eq!(order, ["B-D-24-00002", "C-D-23-00003", "A-D-22-00001", "X-D-00-00000"]);
  }

  #[tokio::test]
  async fn only_the_current_round_of_the_source_is_pushed() {
    let source = MemoryStore::with_rows(
      "dir",
      vec![rec("A-D-24-00001", 1, Some(2024)), rec("A-D-24-00001", 2, Some(2024))],
    );
    let target = MemoryStore::new("cache");
    let report = reconcile(&source, &target).await.unwrap();
    assert_eq!(report.inserted, vec![CompositeKey::new("A-D-24-00001", 2)]);
  }

  #[tokio::test]
  async fn legacy_suffixed_keys_match_canonical_ones() {
    let source = MemoryStore::with_rows("dir", vec![rec("A-D-24-00001", 2, Some(2024))]);
    let target = MemoryStore::with_rows("cache", vec![rec("A-D-24-00001R2", 0, Some(2024))]);
    let report = reconcile(&source, &target).await.unwrap();
    assert!(report.is_noop());
    assert_eq!(report.current[0].identity, "A-D-24-00001");
  }

  #[tokio::test]
  async fn unavailable_source_aborts_without_writing() {
    let mut source = MemoryStore::with_rows("remote", vec![rec("A-D-24-00001", 0, None)]);
    source.unavailable = true;
    let target = MemoryStore::new("cache");
    let err = reconcile(&source, &target).await.unwrap_err();
    assert!(matches!(err, SyncError::StoreUnavailable { .. }));
    assert!(target.rows().is_empty());
  }

  #[tokio::test]
  async fn partial_write_is_surfaced() {
    let source = MemoryStore::with_rows(
      "dir",
      vec![rec("A-D-24-00001", 0, Some(2024)), rec("B-D-24-00002", 0, Some(2023))],
    );
    let mut target = MemoryStore::new("cache");
    target.fail_after = Some(1);

    let outcome = run_pair(&source, &target).await;
    assert!(!outcome.is_ok());
    match outcome.result {
      Err(SyncError::StoreWrite { written, failed, .. }) => {
        assert_eq!(written, 1);
        assert_eq!(failed, vec![CompositeKey::new("B-D-24-00002", 0)]);
      }
      other => panic!("expected StoreWrite, got {other:?}"),
    }
    assert_eq!(target.rows().len(), 1);
  }

  #[tokio::test]
  async fn keyless_source_record_fails_the_batch() {
    let source = MemoryStore::with_rows(
      "dir",
      vec![rec("A-D-24-00001", 0, None), rec("  ", 0, None)],
    );
    let target = MemoryStore::new("cache");
    let err = reconcile(&source, &target).await.unwrap_err();
    assert!(matches!(err, SyncError::InvalidRecord(_)));
    assert!(target.rows().is_empty());
  }
}
