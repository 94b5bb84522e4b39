//! [`DirectoryStore`]: manuscript records derived from a directory listing.

use std::path::{Path, PathBuf};

use referee_core::{identity, record::ManuscriptRecord, store::RecordSource};

use crate::{Error, Result};

/// A read-only record source over one directory of review PDFs.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
  name: String,
  root: PathBuf,
}

impl DirectoryStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { name: "dir".to_owned(), root: root.into() }
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn root(&self) -> &Path { &self.root }

  /// Names of the regular files in the directory, sorted so that the
  /// observation order is stable across runs. Subdirectories, broken links
  /// and names that are not valid UTF-8 are skipped.
  pub async fn filenames(&self) -> Result<Vec<String>> {
    let unreadable = |source| Error::Unreadable {
      store: self.name.clone(),
      path: self.root.clone(),
      source,
    };

    let mut entries = tokio::fs::read_dir(&self.root).await.map_err(unreadable)?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
      let is_file = tokio::fs::metadata(entry.path())
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
      if !is_file {
        continue;
      }
      match entry.file_name().into_string() {
        Ok(name) => names.push(name),
        Err(raw) => tracing::trace!(?raw, "skipping non-UTF-8 filename"),
      }
    }
    names.sort();
    Ok(names)
  }
}

impl RecordSource for DirectoryStore {
  type Error = Error;

  fn name(&self) -> &str { &self.name }

  async fn read_all(&self) -> Result<Vec<ManuscriptRecord>> {
    let names = self.filenames().await?;
    let records: Vec<ManuscriptRecord> =
      names.iter().filter_map(|n| identity::extract(n)).collect();
    tracing::debug!(
      dir = %self.root.display(),
      files = names.len(),
      manuscripts = records.len(),
      "listed review directory",
    );
    Ok(records)
  }
}

#[cfg(test)]
mod tests {
  use std::fs;

  use referee_core::SyncError;

  use super::*;

  fn touch(dir: &Path, name: &str) {
    fs::write(dir.join(name), b"%PDF-1.4").unwrap();
  }

  #[tokio::test]
  async fn reads_matching_pdfs_and_ignores_the_rest() {
    let tmp = tempfile::tempdir().unwrap();
    touch(tmp.path(), "EUONCO-D-24-00622R2 (Assel) 2024-03-15.pdf");
    touch(tmp.path(), "EURUROL-D-23-01234 (Smith) 2023-11-02.pdf");
    touch(tmp.path(), "notes.txt");
    touch(tmp.path(), "Résumé (draft).pdf");
    fs::create_dir(tmp.path().join("EUONCO-D-24-99999 (Dir) 2024-01-01.pdf")).unwrap();

    let store = DirectoryStore::new(tmp.path());
    let records = store.read_all().await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].identity, "EUONCO-D-24-00622");
    assert_eq!(records[0].version, 2);
    assert_eq!(records[1].identity, "EURUROL-D-23-01234");
  }

  #[tokio::test]
  async fn empty_directory_is_not_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let store = DirectoryStore::new(tmp.path());
    assert!(store.read_all().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn missing_directory_is_unavailable() {
    let tmp = tempfile::tempdir().unwrap();
    let store = DirectoryStore::new(tmp.path().join("Dealt With")).with_name("dealt-with");
    let err: SyncError = store.read_all().await.unwrap_err().into();
    match err {
      SyncError::StoreUnavailable { store, .. } => assert_eq!(store, "dealt-with"),
      other => panic!("expected StoreUnavailable, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn listing_order_is_stable() {
    let tmp = tempfile::tempdir().unwrap();
    touch(tmp.path(), "B-D-24-00002 (Y) 2024-01-01.pdf");
    touch(tmp.path(), "A-D-24-00001 (X) 2024-01-01.pdf");
    let store = DirectoryStore::new(tmp.path());
    let names = store.filenames().await.unwrap();
    assert_eq!(names, ["A-D-24-00001 (X) 2024-01-01.pdf", "B-D-24-00002 (Y) 2024-01-01.pdf"]);
  }
}
