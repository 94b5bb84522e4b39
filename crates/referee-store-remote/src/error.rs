//! Error type for `referee-store-remote`.

use referee_core::{CompositeKey, SyncError, normalize::NormalizeError};
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("failed to build HTTP client: {0}")]
  Client(#[source] reqwest::Error),

  #[error("{store} unreachable: {source}")]
  Unreachable {
    store:  String,
    #[source]
    source: reqwest::Error,
  },

  #[error("{store} answered {status} to {operation}: {body}")]
  Status {
    store:     String,
    operation: &'static str,
    status:    StatusCode,
    body:      String,
  },

  #[error("rows from {store} do not map onto manuscript records: {source}")]
  Schema {
    store:  String,
    #[source]
    source: NormalizeError,
  },

  /// Batches before the failing one were committed; `failed` lists every
  /// key from the failing batch on.
  #[error("write to {store} failed after {written} row(s): {reason}")]
  Write {
    store:   String,
    written: usize,
    failed:  Vec<CompositeKey>,
    reason:  String,
  },
}

impl From<Error> for SyncError {
  fn from(e: Error) -> Self {
    match e {
      Error::Client(source) => SyncError::unavailable("remote", source),
      Error::Unreachable { store, source } => SyncError::unavailable(store, source),
      Error::Status { store, operation, status, body } => {
        SyncError::unavailable(store, format!("{operation} returned {status}: {body}"))
      }
      Error::Schema { store, source } => source.in_store(&store),
      Error::Write { store, written, failed, reason } => {
        SyncError::StoreWrite { store, written, failed, reason }
      }
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
