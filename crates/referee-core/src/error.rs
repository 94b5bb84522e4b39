//! Error taxonomy shared by every store adapter and the reconciler.
//!
//! A filename that does not fit the manuscript pattern is not an error at
//! all; [`crate::identity::extract`] simply returns `None` for it.

use thiserror::Error;

use crate::record::CompositeKey;

#[derive(Debug, Error)]
pub enum SyncError {
  /// The backing store could not be reached or opened. Aborts the current
  /// store pair; other pairs may still run.
  #[error("store {store} is unavailable: {reason}")]
  StoreUnavailable { store: String, reason: String },

  /// The backend rejected a write. `written` rows made it in before the
  /// failure; `failed` lists the keys that did not.
  #[error(
    "write to store {store} failed after {written} row(s), {} row(s) not written: {reason}",
    failed.len()
  )]
  StoreWrite {
    store:   String,
    written: usize,
    failed:  Vec<CompositeKey>,
    reason:  String,
  },

  /// A column could not be mapped onto the canonical record.
  #[error("store {store} has an unmappable schema: {column}")]
  SchemaMismatch { store: String, column: String },

  /// A record would violate the composite-key invariant (e.g. empty identity).
  #[error("invalid record: {0}")]
  InvalidRecord(String),
}

impl SyncError {
  pub fn unavailable(store: impl Into<String>, reason: impl ToString) -> Self {
    Self::StoreUnavailable { store: store.into(), reason: reason.to_string() }
  }

  pub fn schema(store: impl Into<String>, column: impl Into<String>) -> Self {
    Self::SchemaMismatch { store: store.into(), column: column.into() }
  }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
