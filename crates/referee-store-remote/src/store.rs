//! [`RemoteStore`]: the PostgREST implementation of [`RecordStore`].

use std::{
  collections::{HashMap, hash_map::Entry},
  time::Duration,
};

use referee_core::{
  normalize::{Column, ColumnMap, NormalizeError, RawRow, Schema, canonicalize, to_row},
  record::{CompositeKey, ManuscriptRecord},
  store::{RecordSource, RecordStore, UpsertReport},
};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;

use crate::{Error, RemoteConfig, Result};

/// Upsert on the conflict columns instead of failing on duplicates.
const PREFER_UPSERT: &str = "resolution=merge-duplicates,return=minimal";

/// PostgREST query filters (`column`, `eq.value`) selecting one row.
type Filter = Vec<(String, String)>;

/// The remote hosted table.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct RemoteStore {
  name:     String,
  client:   Client,
  config:   RemoteConfig,
  columns:  ColumnMap,
  endpoint: String,
}

impl RemoteStore {
  pub fn new(config: RemoteConfig, columns: ColumnMap) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(Error::Client)?;
    let endpoint = config.endpoint();
    Ok(Self { name: "remote".to_owned(), client, config, columns, endpoint })
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn config(&self) -> &RemoteConfig { &self.config }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    req
      .header("apikey", &self.config.key)
      .bearer_auth(&self.config.key)
  }

  fn unreachable(&self) -> impl Fn(reqwest::Error) -> Error + '_ {
    move |source| Error::Unreachable { store: self.name.clone(), source }
  }

  async fn check(&self, resp: Response, operation: &'static str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Status { store: self.name.clone(), operation, status, body })
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  /// Fetch at most one row. Confirms the URL, the key and the table name.
  pub async fn ping(&self) -> Result<()> {
    let resp = self
      .auth(self.client.get(&self.endpoint))
      .query(&[("select", "*"), ("limit", "1")])
      .send()
      .await
      .map_err(self.unreachable())?;
    self.check(resp, "GET").await?;
    Ok(())
  }

  /// `GET {endpoint}?select=*&limit=<page>&offset=<offset>&order=<key>.asc`
  async fn fetch_page(&self, offset: usize, limit: usize) -> Result<Vec<RawRow>> {
    let mut query = vec![
      ("select", "*".to_owned()),
      ("limit", limit.to_string()),
      ("offset", offset.to_string()),
    ];
    if !self.config.conflict_columns.is_empty() {
      let order = self
        .config
        .conflict_columns
        .iter()
        .map(|c| format!("{c}.asc"))
        .collect::<Vec<_>>()
        .join(",");
      query.push(("order", order));
    }

    let resp = self
      .auth(self.client.get(&self.endpoint))
      .query(&query)
      .send()
      .await
      .map_err(self.unreachable())?;
    let resp = self.check(resp, "GET").await?;
    resp.json().await.map_err(self.unreachable())
  }

  /// Every raw row of the table, page by page until a short page.
  pub async fn fetch_all(&self) -> Result<Vec<RawRow>> {
    let limit = self.config.page_size.max(1);
    let mut rows = Vec::new();
    loop {
      let page = self.fetch_page(rows.len(), limit).await?;
      let short = page.len() < limit;
      rows.extend(page);
      if short {
        break;
      }
    }
    Ok(rows)
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  /// `POST {endpoint}?on_conflict=<columns>` with a JSON array body.
  async fn post_batch(&self, rows: &[RawRow]) -> Result<()> {
    let mut req = self
      .auth(self.client.post(&self.endpoint))
      .header("Prefer", PREFER_UPSERT)
      .json(rows);
    if !self.config.conflict_columns.is_empty() {
      req = req.query(&[("on_conflict", self.config.conflict_columns.join(","))]);
    }
    let resp = req.send().await.map_err(self.unreachable())?;
    self.check(resp, "POST").await?;
    Ok(())
  }

  /// `PATCH {endpoint}?<column>=eq.<value>&...` rewriting the matched row.
  async fn patch_row(&self, filter: &Filter, row: &RawRow) -> Result<()> {
    let resp = self
      .auth(self.client.patch(&self.endpoint))
      .header("Prefer", "return=minimal")
      .query(filter)
      .json(row)
      .send()
      .await
      .map_err(self.unreachable())?;
    self.check(resp, "PATCH").await?;
    Ok(())
  }
}

/// A planned write: POSTed on the conflict columns, or PATCHed in place
/// when the stored row spells its key differently.
struct Write {
  record: ManuscriptRecord,
  at:     Option<Filter>,
}

/// Filters addressing `row` by its stored key columns, or `None` when
/// they already hold `record`'s canonical key and a POST lands on the row.
/// Rows written as `MS_Number = "A-D-24-00001R2", Version = "R2"` (or a
/// null round) need the filter.
fn legacy_filter(columns: &ColumnMap, row: &RawRow, record: &ManuscriptRecord) -> Option<Filter> {
  let mut filter = Filter::new();
  let mut legacy = false;
  for (spelling, value) in row {
    let canonical = match columns.resolve(spelling) {
      Ok(Some(Column::MsNumber)) => value.as_str() == Some(record.identity.as_str()),
      Ok(Some(Column::Version)) => match value {
        Value::Number(n) => n.as_u64() == Some(u64::from(record.version)),
        Value::String(s) => s.trim().parse::<u32>().ok() == Some(record.version),
        _ => false,
      },
      _ => continue,
    };
    legacy |= !canonical;
    let condition = match value {
      Value::Null => "is.null".to_owned(),
      Value::String(s) => format!("eq.{s}"),
      other => format!("eq.{other}"),
    };
    filter.push((spelling.clone(), condition));
  }
  legacy.then_some(filter)
}

// ─── RecordStore impl ────────────────────────────────────────────────────────

impl RecordSource for RemoteStore {
  type Error = Error;

  fn name(&self) -> &str { &self.name }

  async fn read_all(&self) -> Result<Vec<ManuscriptRecord>> {
    let rows = self.fetch_all().await?;
    let records = self
      .columns
      .normalize_rows(&rows)
      .map_err(|source| Error::Schema { store: self.name.clone(), source })?;
    tracing::debug!(store = %self.name, rows = records.len(), "read remote table");
    Ok(records)
  }
}

impl RecordStore for RemoteStore {
  /// Stored rows are merged locally first so that attributes the remote
  /// already holds are never overwritten by a merge-duplicates POST.
  async fn upsert(&self, records: &[ManuscriptRecord]) -> Result<UpsertReport> {
    if records.is_empty() {
      return Ok(UpsertReport::default());
    }
    let schema = |source| Error::Schema { store: self.name.clone(), source };

    // A row already in canonical form wins over a legacy spelling of the
    // same key.
    let mut stored: HashMap<CompositeKey, (ManuscriptRecord, Option<Filter>)> = HashMap::new();
    for row in self.fetch_all().await? {
      let record = self.columns.normalize_row(&row).map_err(schema)?;
      if record.identity.is_empty() {
        continue;
      }
      let at = legacy_filter(&self.columns, &row, &record);
      match stored.entry(record.composite_key()) {
        Entry::Occupied(mut e) if e.get().1.is_some() && at.is_none() => {
          e.insert((record, at));
        }
        Entry::Occupied(_) => {}
        Entry::Vacant(e) => {
          e.insert((record, at));
        }
      }
    }

    let mut report = UpsertReport::default();
    let mut index: HashMap<CompositeKey, usize> = HashMap::new();
    let mut writes: Vec<Write> = Vec::with_capacity(records.len());
    for record in records {
      let record = canonicalize(record.clone());
      if record.identity.is_empty() {
        return Err(schema(NormalizeError::InvalidValue {
          column: Column::MsNumber.spaced(),
          value:  format!("{:?}", record.name),
        }));
      }
      let key = record.composite_key();
      if let Some(&i) = index.get(&key) {
        writes[i].record.merge(&record);
        continue;
      }
      index.insert(key.clone(), writes.len());
      match stored.remove(&key) {
        Some((mut existing, at)) => {
          existing.merge(&record);
          writes.push(Write { record: existing, at });
          report.updated += 1;
        }
        None => {
          writes.push(Write { record, at: None });
          report.inserted += 1;
        }
      }
    }

    // In-place rewrites go first, one request each; the rest is POSTed in
    // batches.
    writes.sort_by_key(|w| w.at.is_none());
    let keys: Vec<CompositeKey> = writes.iter().map(|w| w.record.composite_key()).collect();
    let failed = |written: usize, e: Error| Error::Write {
      store: self.name.clone(),
      written,
      failed: keys[written..].to_vec(),
      reason: e.to_string(),
    };

    let mut written = 0;
    let patched = writes.iter().take_while(|w| w.at.is_some()).count();
    for write in &writes[..patched] {
      if let Some(filter) = &write.at {
        let row = to_row(&write.record, Schema::Underscored);
        self.patch_row(filter, &row).await.map_err(|e| failed(written, e))?;
        written += 1;
      }
    }
    if patched > 0 {
      tracing::debug!(store = %self.name, rows = patched, "rewrote legacy keys in place");
    }

    for chunk in writes[patched..].chunks(self.config.batch_size.max(1)) {
      let rows: Vec<RawRow> = chunk
        .iter()
        .map(|w| to_row(&w.record, Schema::Underscored))
        .collect();
      self.post_batch(&rows).await.map_err(|e| failed(written, e))?;
      written += chunk.len();
      tracing::debug!(store = %self.name, rows = chunk.len(), written, "posted batch");
    }

    tracing::debug!(
      store = %self.name,
      inserted = report.inserted,
      updated = report.updated,
      "upserted into remote table",
    );
    Ok(report)
  }
}
