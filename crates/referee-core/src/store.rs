//! The store traits and supporting report types.
//!
//! The traits are implemented by storage backends (`referee-store-dir`,
//! `referee-store-sqlite`, `referee-store-remote`). The reconciler depends on
//! this abstraction, not on any concrete backend, which is what lets it treat
//! all three stores interchangeably.

use std::future::Future;

use serde::Serialize;

use crate::{error::SyncError, record::ManuscriptRecord};

// ─── Reports ─────────────────────────────────────────────────────────────────

/// What an [`RecordStore::upsert`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertReport {
  /// Rows whose composite key was new to the store.
  pub inserted: usize,
  /// Rows whose composite key was already present.
  pub updated:  usize,
}

impl UpsertReport {
  pub fn written(&self) -> usize { self.inserted + self.updated }
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Anything manuscript records can be read from.
///
/// All methods return `Send` futures so a pass can run on a multi-threaded
/// tokio runtime, even though a pass awaits its stores one at a time.
pub trait RecordSource: Send + Sync {
  type Error: std::error::Error + Into<SyncError> + Send + Sync + 'static;

  /// Short human-readable name used in logs and reports (e.g. `cache`).
  fn name(&self) -> &str;

  /// Every record in the store, in stable store order.
  ///
  /// Fails with a `StoreUnavailable`-class error if the store cannot be
  /// reached or opened; an existing but empty store yields an empty vec.
  fn read_all(
    &self,
  ) -> impl Future<Output = Result<Vec<ManuscriptRecord>, Self::Error>> + Send + '_;
}

/// A store that can also be written to.
pub trait RecordStore: RecordSource {
  /// Insert records whose composite key is absent and update those already
  /// present (see [`ManuscriptRecord::merge`]). Calling it again with the same
  /// records never duplicates a row.
  ///
  /// Fails with a `StoreWrite`-class error that reports how many rows made it
  /// in before the backend refused.
  fn upsert<'a>(
    &'a self,
    records: &'a [ManuscriptRecord],
  ) -> impl Future<Output = Result<UpsertReport, Self::Error>> + Send + 'a;
}
