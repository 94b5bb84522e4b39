//! Error type for `referee-store-dir`.

use std::path::PathBuf;

use referee_core::SyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("cannot list {path}: {source}")]
  Unreadable {
    store:  String,
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl From<Error> for SyncError {
  fn from(e: Error) -> Self {
    let Error::Unreadable { store, .. } = &e;
    SyncError::unavailable(store.clone(), &e)
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
