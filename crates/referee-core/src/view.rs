//! Read-side helpers behind the front-end commands: search, display order,
//! and saving edited records.

use std::cmp::Reverse;

use crate::{
  error::SyncError,
  normalize::canonicalize,
  record::ManuscriptRecord,
  store::{RecordStore, UpsertReport},
};

/// Case-insensitive substring filter over manuscript number, file name and
/// editor. An empty (or all-whitespace) query matches everything.
pub fn search<'a>(records: &'a [ManuscriptRecord], query: &str) -> Vec<&'a ManuscriptRecord> {
  let needle = query.trim().to_lowercase();
  if needle.is_empty() {
    return records.iter().collect();
  }
  records
    .iter()
    .filter(|r| {
      let ms_number = r.composite_key().to_string();
      [Some(ms_number.as_str()), r.name.as_deref(), r.editor.as_deref()]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
    })
    .collect()
}

/// Most recent first: year descending, then invitation date descending, then
/// manuscript number. Unknown years and dates sort last.
pub fn sort_for_display(records: &mut [ManuscriptRecord]) {
  records.sort_by(|a, b| {
    let rank = |r: &ManuscriptRecord| {
      (
        r.year.is_none(),
        Reverse(r.year),
        r.date_invited.is_none(),
        Reverse(r.date_invited),
      )
    };
    rank(a)
      .cmp(&rank(b))
      .then_with(|| a.composite_key().cmp(&b.composite_key()))
  });
}

/// Save an edited record set ("save edits"). Records are canonicalized and
/// checked before anything is written.
pub async fn apply_edits<T: RecordStore>(
  store: &T,
  edits: Vec<ManuscriptRecord>,
) -> Result<UpsertReport, SyncError> {
  let records: Vec<ManuscriptRecord> = edits.into_iter().map(canonicalize).collect();
  if let Some(bad) = records.iter().find(|r| r.identity.is_empty()) {
    return Err(SyncError::InvalidRecord(format!(
      "edited record has no manuscript number: {:?}",
      bad.name
    )));
  }
  let report = store.upsert(&records).await.map_err(Into::<SyncError>::into)?;
  tracing::info!(
    store = store.name(),
    inserted = report.inserted,
    updated = report.updated,
    "saved edits",
  );
  Ok(report)
}
