//! Error type for `referee-store-sqlite`.

use referee_core::{CompositeKey, SyncError, normalize::NormalizeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database {store} unavailable: {source}")]
  Unavailable {
    store:  String,
    #[source]
    source: tokio_rusqlite::Error,
  },

  #[error("table in {store} does not map onto manuscript records: {source}")]
  Schema {
    store:  String,
    #[source]
    source: NormalizeError,
  },

  /// The write transaction was rolled back; none of `failed` was written.
  #[error("write to {store} rolled back ({} row(s)): {source}", failed.len())]
  Write {
    store:  String,
    failed: Vec<CompositeKey>,
    #[source]
    source: tokio_rusqlite::Error,
  },
}

impl From<Error> for SyncError {
  fn from(e: Error) -> Self {
    match e {
      Error::Unavailable { store, source } => SyncError::unavailable(store, source),
      Error::Schema { store, source } => source.in_store(&store),
      Error::Write { store, failed, source } => SyncError::StoreWrite {
        store,
        written: 0,
        failed,
        reason: source.to_string(),
      },
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
