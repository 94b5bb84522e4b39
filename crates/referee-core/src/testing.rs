//! In-memory store double for reconciler tests.

use std::sync::Mutex;

use crate::{
  error::SyncError,
  record::ManuscriptRecord,
  store::{RecordSource, RecordStore, UpsertReport},
};

pub struct MemoryStore {
  name:            String,
  rows:            Mutex<Vec<ManuscriptRecord>>,
  /// Refuse writes after this many rows of a single upsert.
  pub fail_after:  Option<usize>,
  pub unavailable: bool,
}

impl MemoryStore {
  pub fn new(name: &str) -> Self { Self::with_rows(name, Vec::new()) }

  pub fn with_rows(name: &str, rows: Vec<ManuscriptRecord>) -> Self {
    Self {
      name: name.to_owned(),
      rows: Mutex::new(rows),
      fail_after: None,
      unavailable: false,
    }
  }

  pub fn rows(&self) -> Vec<ManuscriptRecord> {
    self.rows.lock().map(|r| r.clone()).unwrap_or_default()
  }

  pub fn push(&self, record: ManuscriptRecord) {
    if let Ok(mut rows) = self.rows.lock() {
      rows.push(record);
    }
  }
}

impl RecordSource for MemoryStore {
  type Error = SyncError;

  fn name(&self) -> &str { &self.name }

  async fn read_all(&self) -> Result<Vec<ManuscriptRecord>, SyncError> {
    if self.unavailable {
      return Err(SyncError::unavailable(&self.name, "offline"));
    }
    Ok(self.rows())
  }
}

impl RecordStore for MemoryStore {
  async fn upsert(&self, records: &[ManuscriptRecord]) -> Result<UpsertReport, SyncError> {
    let mut rows = self
      .rows
      .lock()
      .map_err(|e| SyncError::unavailable(&self.name, e))?;
    let mut report = UpsertReport::default();
    for (i, record) in records.iter().enumerate() {
      if self.fail_after == Some(i) {
        return Err(SyncError::StoreWrite {
          store:   self.name.clone(),
          written: i,
          failed:  records[i..].iter().map(ManuscriptRecord::composite_key).collect(),
          reason:  "refused".into(),
        });
      }
      let key = record.composite_key();
      match rows.iter_mut().find(|r| r.composite_key() == key) {
        Some(existing) => {
          existing.merge(record);
          report.updated += 1;
        }
        None => {
          rows.push(record.clone());
          report.inserted += 1;
        }
      }
    }
    Ok(report)
  }
}
