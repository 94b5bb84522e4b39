//! [`SqliteStore`]: the SQLite implementation of [`RecordStore`].

use std::{collections::HashMap, path::Path, time::Duration};

use referee_core::{
  normalize::{Column, ColumnMap, NormalizeError, canonicalize},
  record::{CompositeKey, ManuscriptRecord},
  store::{RecordSource, RecordStore, UpsertReport},
};

use crate::{
  Error, Result,
  encode::{Layout, decode_value, encode_record, quote},
  schema::{SCHEMA, TABLE},
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Name in logs and errors until [`SqliteStore::with_name`] changes it.
const DEFAULT_NAME: &str = "cache";

// ─── Store ───────────────────────────────────────────────────────────────────

/// The local manuscript cache, backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  name:    String,
  conn:    tokio_rusqlite::Connection,
  columns: ColumnMap,
  layout:  Layout,
}

impl SqliteStore {
  /// Open (or create) the cache at `path`, run schema initialisation and map
  /// the table's columns.
  pub async fn open(path: impl AsRef<Path>, columns: ColumnMap) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path)
      .await
      .map_err(|source| Error::Unavailable { store: DEFAULT_NAME.into(), source })?;
    Self::init(conn, columns).await
  }

  /// Open an in-memory cache, useful for testing.
  pub async fn open_in_memory(columns: ColumnMap) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory()
      .await
      .map_err(|source| Error::Unavailable { store: DEFAULT_NAME.into(), source })?;
    Self::init(conn, columns).await
  }

  /// Rename the store in logs and reports.
  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  async fn init(conn: tokio_rusqlite::Connection, columns: ColumnMap) -> Result<Self> {
    let name = DEFAULT_NAME.to_owned();
    let unavailable = |source| Error::Unavailable { store: name.clone(), source };

    let header: Vec<String> = conn
      .call(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote(TABLE)))?;
        let names = stmt
          .query_map([], |row| row.get::<_, String>(1))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
      })
      .await
      .map_err(unavailable)?;

    let layout = Layout::detect(&columns, &header)
      .map_err(|source| Error::Schema { store: name.clone(), source })?;

    Ok(Self { name, conn, columns, layout })
  }

  /// Every row with its SQLite rowid, in insertion order.
  async fn read_rows(&self) -> Result<Vec<(i64, ManuscriptRecord)>> {
    let sql = format!(
      "SELECT rowid, {} FROM {} ORDER BY rowid",
      self.layout.select_list(),
      quote(TABLE)
    );
    let width = self.layout.names().count();

    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], |row| {
            let rowid: i64 = row.get(0)?;
            let mut values = Vec::with_capacity(width);
            for i in 1..=width {
              values.push(decode_value(row.get_ref(i)?));
            }
            Ok((rowid, values))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(|source| Error::Unavailable { store: self.name.clone(), source })?;

    raws
      .into_iter()
      .map(|(rowid, values)| {
        let record = self
          .columns
          .normalize_row(&self.layout.raw_row(values))
          .map_err(|source| Error::Schema { store: self.name.clone(), source })?;
        Ok((rowid, record))
      })
      .collect()
  }
}

/// A single write in an upsert transaction.
enum Write {
  Insert(ManuscriptRecord),
  Update(i64, ManuscriptRecord),
}

/// Decide, per incoming record, whether it is new or updates a stored row.
/// Keys are compared after canonicalization, so legacy rows stored as
/// `EUONCO-D-24-00622R2` are matched (and rewritten in canonical form).
fn plan_writes(
  stored: Vec<(i64, ManuscriptRecord)>,
  incoming: &[ManuscriptRecord],
) -> Result<Vec<Write>, NormalizeError> {
  let mut by_key: HashMap<CompositeKey, (i64, ManuscriptRecord)> = HashMap::new();
  for (rowid, record) in stored {
    if record.identity.is_empty() {
      continue;
    }
    by_key.entry(record.composite_key()).or_insert((rowid, record));
  }

  let mut pending: HashMap<CompositeKey, usize> = HashMap::new();
  let mut writes: Vec<Write> = Vec::with_capacity(incoming.len());
  for record in incoming {
    let record = canonicalize(record.clone());
    if record.identity.is_empty() {
      return Err(NormalizeError::InvalidValue {
        column: Column::MsNumber.spaced(),
        value:  format!("{:?}", record.name),
      });
    }
    let key = record.composite_key();

    // The same key twice in one batch folds into the first write.
    if let Some(&i) = pending.get(&key) {
      match &mut writes[i] {
        Write::Insert(r) | Write::Update(_, r) => r.merge(&record),
      }
      continue;
    }

    pending.insert(key.clone(), writes.len());
    match by_key.remove(&key) {
      Some((rowid, mut existing)) => {
        existing.merge(&record);
        writes.push(Write::Update(rowid, existing));
      }
      None => writes.push(Write::Insert(record)),
    }
  }
  Ok(writes)
}

// ─── RecordStore impl ────────────────────────────────────────────────────────

impl RecordSource for SqliteStore {
  type Error = Error;

  fn name(&self) -> &str { &self.name }

  async fn read_all(&self) -> Result<Vec<ManuscriptRecord>> {
    let rows = self.read_rows().await?;
    let records: Vec<ManuscriptRecord> = rows
      .into_iter()
      .map(|(_, r)| r)
      .filter(|r| !r.identity.is_empty())
      .collect();
    tracing::debug!(store = %self.name, rows = records.len(), "read cache");
    Ok(records)
  }
}

impl RecordStore for SqliteStore {
  async fn upsert(&self, records: &[ManuscriptRecord]) -> Result<UpsertReport> {
    if records.is_empty() {
      return Ok(UpsertReport::default());
    }

    let stored = self.read_rows().await?;
    let writes = plan_writes(stored, records)
      .map_err(|source| Error::Schema { store: self.name.clone(), source })?;
    let keys: Vec<CompositeKey> = writes
      .iter()
      .map(|w| match w {
        Write::Insert(r) | Write::Update(_, r) => r.composite_key(),
      })
      .collect();

    let insert_sql = format!(
      "INSERT INTO {} ({}) VALUES ({})",
      quote(TABLE),
      self.layout.select_list(),
      (1..=self.layout.names().count())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", "),
    );
    let update_sql = format!(
      "UPDATE {} SET {} WHERE rowid = ?{}",
      quote(TABLE),
      self.layout.assignments(),
      self.layout.names().count() + 1,
    );

    let report = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut report = UpsertReport::default();
        {
          let mut insert = tx.prepare(&insert_sql)?;
          let mut update = tx.prepare(&update_sql)?;
          for write in &writes {
            match write {
              Write::Insert(r) => {
                insert.execute(rusqlite::params_from_iter(encode_record(r)))?;
                report.inserted += 1;
              }
              Write::Update(rowid, r) => {
                let mut params = encode_record(r);
                params.push(rusqlite::types::Value::Integer(*rowid));
                update.execute(rusqlite::params_from_iter(params))?;
                report.updated += 1;
              }
            }
          }
        }
        tx.commit()?;
        Ok(report)
      })
      .await
      .map_err(|source| Error::Write { store: self.name.clone(), failed: keys, source })?;

    tracing::debug!(
      store = %self.name,
      inserted = report.inserted,
      updated = report.updated,
      "upserted into cache",
    );
    Ok(report)
  }
}
