//! Field normalizer: maps heterogeneous store rows onto [`ManuscriptRecord`].
//!
//! The stores disagree on almost everything: the cache spells columns with
//! spaces (`MS Number`), the hosted table with underscores (`MS_Number`),
//! years arrive as `2024`, `2024.0` or `"FY2024"`, and "nothing" is variously
//! `null`, `""`, `NaN` or `NaT`. Every column the engine understands is
//! enumerated once in [`Column`]; anything else is a schema mismatch unless
//! it was explicitly configured as ignorable.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
  error::SyncError,
  identity::{journal_of, split_round_suffix},
  record::ManuscriptRecord,
};

/// A row as read from a backing store: column name → loosely-typed value.
pub type RawRow = Map<String, Value>;

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum NormalizeError {
  #[error("unknown column {0:?}")]
  UnknownColumn(String),

  #[error("missing required column {0:?}")]
  MissingColumn(&'static str),

  #[error("column spelling {spelling:?} is claimed by both {first:?} and {second:?}")]
  AmbiguousSpelling {
    spelling: String,
    first:    &'static str,
    second:   String,
  },

  #[error("invalid {column} value: {value}")]
  InvalidValue { column: &'static str, value: String },
}

impl NormalizeError {
  /// Attach the name of the store the offending row came from.
  pub fn in_store(self, store: &str) -> SyncError {
    match self {
      Self::UnknownColumn(column) => SyncError::schema(store, column),
      Self::MissingColumn(column) => SyncError::schema(store, format!("missing {column}")),
      Self::AmbiguousSpelling { spelling, .. } => SyncError::schema(store, spelling),
      Self::InvalidValue { column, value } => {
        SyncError::InvalidRecord(format!("{store}: invalid {column} value {value}"))
      }
    }
  }
}

// ─── Columns ─────────────────────────────────────────────────────────────────

/// Every column the engine knows how to read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
  Name,
  MsNumber,
  Version,
  Year,
  Editor,
  Journal,
  DateInvited,
  DateCompleted,
}

impl Column {
  pub const ALL: [Column; 8] = [
    Column::Name,
    Column::MsNumber,
    Column::Version,
    Column::Year,
    Column::Editor,
    Column::Journal,
    Column::DateInvited,
    Column::DateCompleted,
  ];

  /// Spelling used by the local cache (`MS Number`).
  pub fn spaced(self) -> &'static str {
    match self {
      Column::Name => "Name",
      Column::MsNumber => "MS Number",
      Column::Version => "Version",
      Column::Year => "Year",
      Column::Editor => "Editor",
      Column::Journal => "Journal",
      Column::DateInvited => "Date Invited",
      Column::DateCompleted => "Date Completed",
    }
  }

  /// Spelling used by the hosted table (`MS_Number`).
  pub fn underscored(self) -> &'static str {
    match self {
      Column::Name => "Name",
      Column::MsNumber => "MS_Number",
      Column::Version => "Version",
      Column::Year => "Year",
      Column::Editor => "Editor",
      Column::Journal => "Journal",
      Column::DateInvited => "Date_Invited",
      Column::DateCompleted => "Date_Completed",
    }
  }

  /// Extra spellings seen in older exports, already folded.
  fn aliases(self) -> &'static [&'static str] {
    match self {
      Column::Name => &["file name", "filename"],
      Column::MsNumber => &["manuscript number", "identity"],
      Column::Version => &["round"],
      _ => &[],
    }
  }
}

/// A store's column naming convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Schema {
  #[default]
  Spaced,
  Underscored,
}

impl Schema {
  pub fn column_name(self, column: Column) -> &'static str {
    match self {
      Schema::Spaced => column.spaced(),
      Schema::Underscored => column.underscored(),
    }
  }
}

/// Fold a column spelling so `MS Number`, `MS_Number` and `ms-number`
/// compare equal.
fn fold(spelling: &str) -> String {
  spelling
    .trim()
    .chars()
    .map(|c| if c == '_' || c == '-' { ' ' } else { c.to_ascii_lowercase() })
    .collect::<String>()
    .split_whitespace()
    .collect::<Vec<_>>()
    .join(" ")
}

// ─── Column map ──────────────────────────────────────────────────────────────

/// The validated spelling table for one run.
#[derive(Debug, Clone)]
pub struct ColumnMap {
  spellings: HashMap<String, Column>,
  ignored:   HashSet<String>,
}

impl ColumnMap {
  /// The built-in spellings with nothing ignored.
  pub fn standard() -> Result<Self, NormalizeError> { Self::new(std::iter::empty::<&str>()) }

  /// Build and validate the spelling table. `ignored` names columns that a
  /// store may carry but the engine does not model (e.g. `id`,
  /// `created_at`); they must not collide with a known column.
  pub fn new<I, S>(ignored: I) -> Result<Self, NormalizeError>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let mut spellings: HashMap<String, Column> = HashMap::new();
    for column in Column::ALL {
      let names = [column.spaced(), column.underscored()]
        .into_iter()
        .chain(column.aliases().iter().copied());
      for name in names {
        let key = fold(name);
        if let Some(prev) = spellings.insert(key.clone(), column)
          && prev != column
        {
          return Err(NormalizeError::AmbiguousSpelling {
            spelling: key,
            first:    prev.spaced(),
            second:   column.spaced().to_owned(),
          });
        }
      }
    }

    let mut ignored_set = HashSet::new();
    for name in ignored {
      let key = fold(name.as_ref());
      if let Some(column) = spellings.get(&key) {
        return Err(NormalizeError::AmbiguousSpelling {
          spelling: key,
          first:    column.spaced(),
          second:   "ignored".to_owned(),
        });
      }
      ignored_set.insert(key);
    }

    Ok(Self { spellings, ignored: ignored_set })
  }

  /// `Ok(None)` for an ignorable column, an error for an unknown one.
  pub fn resolve(&self, spelling: &str) -> Result<Option<Column>, NormalizeError> {
    let key = fold(spelling);
    if let Some(column) = self.spellings.get(&key) {
      return Ok(Some(*column));
    }
    if self.ignored.contains(&key) {
      return Ok(None);
    }
    Err(NormalizeError::UnknownColumn(spelling.to_owned()))
  }

  /// Check a store's header up front. Every column must be mappable and the
  /// manuscript number must be present.
  pub fn validate_header<'a>(
    &self,
    header: impl IntoIterator<Item = &'a str>,
  ) -> Result<(), NormalizeError> {
    let mut has_identity = false;
    for spelling in header {
      if self.resolve(spelling)? == Some(Column::MsNumber) {
        has_identity = true;
      }
    }
    if !has_identity {
      return Err(NormalizeError::MissingColumn(Column::MsNumber.spaced()));
    }
    Ok(())
  }

  /// Map one raw row onto a canonical record.
  pub fn normalize_row(&self, row: &RawRow) -> Result<ManuscriptRecord, NormalizeError> {
    let mut record = ManuscriptRecord::new(String::new(), 0);
    let mut has_identity = false;

    for (spelling, value) in row {
      let Some(column) = self.resolve(spelling)? else {
        continue;
      };
      match column {
        Column::Name => record.name = text(value),
        Column::MsNumber => {
          has_identity = true;
          record.identity = text(value).unwrap_or_default();
        }
        Column::Version => record.version = version(value)?.unwrap_or(0),
        Column::Year => record.year = year(value),
        Column::Editor => record.editor = text(value),
        Column::Journal => record.journal = text(value),
        Column::DateInvited => record.date_invited = date(value),
        Column::DateCompleted => record.date_completed = date(value),
      }
    }

    if !has_identity {
      return Err(NormalizeError::MissingColumn(Column::MsNumber.spaced()));
    }
    Ok(canonicalize(record))
  }

  /// Normalize a whole store read. Rows without a manuscript number carry
  /// no key and are skipped.
  pub fn normalize_rows(&self, rows: &[RawRow]) -> Result<Vec<ManuscriptRecord>, NormalizeError> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
      let record = self.normalize_row(row)?;
      if record.identity.is_empty() {
        tracing::warn!(?row, "skipping row without a manuscript number");
        continue;
      }
      out.push(record);
    }
    Ok(out)
  }
}

// ─── Record-level canonicalization ───────────────────────────────────────────

/// Canonicalize a record already in typed form. Idempotent.
///
/// - text fields are trimmed and null markers become `None`
/// - a legacy `R<n>` suffix on the identity is split off and used as the
///   round when no explicit round was set
/// - a missing journal is read from the identity prefix
pub fn canonicalize(mut record: ManuscriptRecord) -> ManuscriptRecord {
  record.name = record.name.as_deref().and_then(clean_text);
  record.editor = record.editor.as_deref().and_then(clean_text);
  record.journal = record.journal.as_deref().and_then(clean_text);

  let identity = clean_text(&record.identity).unwrap_or_default();
  record.identity = match split_round_suffix(&identity) {
    Some((base, round)) => {
      if record.version == 0 {
        record.version = round;
      }
      base.to_owned()
    }
    None => identity,
  };

  if record.journal.is_none() {
    record.journal = journal_of(&record.identity).map(str::to_owned);
  }
  record
}

/// Render a record under a store's naming convention.
pub fn to_row(record: &ManuscriptRecord, schema: Schema) -> RawRow {
  let mut row = RawRow::new();
  let mut put = |column: Column, value: Value| {
    row.insert(schema.column_name(column).to_owned(), value);
  };
  put(Column::Name, opt_text(&record.name));
  put(Column::MsNumber, Value::from(record.identity.clone()));
  put(Column::Version, Value::from(record.version));
  put(Column::Year, record.year.map_or(Value::Null, Value::from));
  put(Column::Editor, opt_text(&record.editor));
  put(Column::Journal, opt_text(&record.journal));
  put(Column::DateInvited, opt_date(record.date_invited));
  put(Column::DateCompleted, opt_date(record.date_completed));
  row
}

/// Render a date the way every store stores it.
pub fn format_date(date: NaiveDate) -> String { date.format("%Y-%m-%d").to_string() }

fn opt_text(value: &Option<String>) -> Value {
  value.clone().map_or(Value::Null, Value::from)
}

fn opt_date(value: Option<NaiveDate>) -> Value {
  value.map_or(Value::Null, |d| Value::from(format_date(d)))
}

// ─── Value coercion ──────────────────────────────────────────────────────────

const NULL_MARKERS: &[&str] = &["nan", "nat", "none", "null", "n/a"];

fn is_null_marker(s: &str) -> bool {
  s.is_empty() || NULL_MARKERS.iter().any(|m| s.eq_ignore_ascii_case(m))
}

fn clean_text(s: &str) -> Option<String> {
  let s = s.trim();
  (!is_null_marker(s)).then(|| s.to_owned())
}

/// Text value, or `None` for any null representation.
pub fn text(value: &Value) -> Option<String> {
  match value {
    Value::Null => None,
    Value::String(s) => clean_text(s),
    Value::Number(n) => match n.as_f64() {
      Some(f) if f.is_nan() => None,
      _ => Some(n.to_string()),
    },
    Value::Bool(b) => Some(b.to_string()),
    Value::Array(_) | Value::Object(_) => Some(value.to_string()),
  }
}

fn whole_number(f: f64) -> Option<i64> {
  (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

fn number(value: &Value) -> Option<i64> {
  match value {
    Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(whole_number)),
    _ => None,
  }
}

/// Year as an integer; text containing a 4-digit run (`"FY2024"`) yields it.
pub fn year(value: &Value) -> Option<i32> {
  let plausible = |n: i64| (1000..=9999).contains(&n).then_some(n as i32);
  if let Some(n) = number(value) {
    return plausible(n);
  }
  let s = text(value)?;
  if let Some(n) = s.parse::<f64>().ok().and_then(whole_number).and_then(plausible) {
    return Some(n);
  }
  embedded_year(&s)
}

/// The first run of exactly four ASCII digits.
fn embedded_year(s: &str) -> Option<i32> {
  let bytes = s.as_bytes();
  let mut i = 0usize;
  while i < bytes.len() {
    if bytes[i].is_ascii_digit() {
      let len = bytes[i..].iter().take_while(|b| b.is_ascii_digit()).count();
      if len == 4 {
        return s[i..i + 4].parse().ok();
      }
      i += len;
    } else {
      i += 1;
    }
  }
  None
}

/// Review round from `2`, `2.0`, `"2"` or `"R2"`. `Ok(None)` when absent.
pub fn version(value: &Value) -> Result<Option<u32>, NormalizeError> {
  let invalid = || NormalizeError::InvalidValue {
    column: Column::Version.spaced(),
    value:  value.to_string(),
  };
  if let Some(n) = number(value) {
    return u32::try_from(n).map(Some).map_err(|_| invalid());
  }
  let Some(s) = text(value) else {
    return Ok(None);
  };
  let digits = s.strip_prefix(['R', 'r']).unwrap_or(&s);
  if let Ok(n) = digits.parse::<u32>() {
    return Ok(Some(n));
  }
  digits
    .parse::<f64>()
    .ok()
    .and_then(whole_number)
    .and_then(|n| u32::try_from(n).ok())
    .map(Some)
    .ok_or_else(invalid)
}

/// A calendar date from any of the representations the stores produce.
/// Unparseable values are treated as absent.
pub fn date(value: &Value) -> Option<NaiveDate> {
  let s = text(value)?;
  let parsed = parse_date(&s);
  if parsed.is_none() {
    tracing::debug!(value = %s, "unparseable date treated as absent");
  }
  parsed
}

fn parse_date(s: &str) -> Option<NaiveDate> {
  for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
    if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
      return Some(d);
    }
  }
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.date_naive());
  }
  if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
    return Some(dt.date_naive());
  }
  for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
      return Some(dt.date());
    }
  }
  // `2024-03-15 00:00:00+00:00` and friends: trust the leading date.
  s.get(..10)
    .filter(|_| s.len() > 10 && !s.as_bytes()[10].is_ascii_digit())
    .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn row(value: Value) -> RawRow {
    match value {
      Value::Object(map) => map,
      _ => panic!("expected an object"),
    }
  }

  fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> { NaiveDate::from_ymd_opt(y, m, d) }

  #[test]
  fn spaced_and_underscored_rows_normalize_alike() {
    let map = ColumnMap::standard().unwrap();
    let spaced = row(json!({
      "Name": "EUONCO-D-24-00622R2 (Assel) 2024-03-15.pdf",
      "MS Number": "EUONCO-D-24-00622",
      "Version": 2,
      "Year": 2024,
      "Editor": "Assel",
      "Journal": "EUONCO",
      "Date Invited": "2024-03-01",
      "Date Completed": null,
    }));
    let underscored = row(json!({
      "Name": "EUONCO-D-24-00622R2 (Assel) 2024-03-15.pdf",
      "MS_Number": "EUONCO-D-24-00622",
      "Version": "R2",
      "Year": "2024.0",
      "Editor": " Assel ",
      "Journal": "EUONCO",
      "Date_Invited": "2024-03-01T00:00:00",
      "Date_Completed": "NaT",
    }));
    let a = map.normalize_row(&spaced).unwrap();
    let b = map.normalize_row(&underscored).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.version, 2);
    assert_eq!(a.date_invited, ymd(2024, 3, 1));
    assert!(a.date_completed.is_none());
  }

  #[test]
  fn legacy_ms_number_carries_the_round() {
    let map = ColumnMap::standard().unwrap();
    let r = map
      .normalize_row(&row(json!({ "MS Number": "EUONCO-D-24-00622R2", "Version": "R2" })))
      .unwrap();
    assert_eq!(r.identity, "EUONCO-D-24-00622");
    assert_eq!(r.version, 2);
    assert_eq!(r.journal.as_deref(), Some("EUONCO"));

    let r = map
      .normalize_row(&row(json!({ "MS Number": "EUONCO-D-24-00622R3" })))
      .unwrap();
    assert_eq!(r.version, 3);
  }

  #[test]
  fn unknown_column_is_a_schema_mismatch() {
    let map = ColumnMap::standard().unwrap();
    let err = map
      .normalize_row(&row(json!({ "MS Number": "A-D-24-00001", "Reviewer Email": "x" })))
      .unwrap_err();
    assert!(matches!(err, NormalizeError::UnknownColumn(ref c) if c == "Reviewer Email"));
    assert!(matches!(err.in_store("cache"), SyncError::SchemaMismatch { .. }));
  }

  #[test]
  fn ignored_columns_are_dropped() {
    let map = ColumnMap::new(["id", "created_at"]).unwrap();
    let r = map
      .normalize_row(&row(json!({ "id": 7, "created_at": "x", "MS_Number": "A-D-24-00001" })))
      .unwrap();
    assert_eq!(r.identity, "A-D-24-00001");
  }

  #[test]
  fn ignoring_a_known_column_fails_validation() {
    assert!(matches!(
      ColumnMap::new(["ms_number"]),
      Err(NormalizeError::AmbiguousSpelling { .. })
    ));
  }

  #[test]
  fn missing_identity_column_is_rejected() {
    let map = ColumnMap::standard().unwrap();
    assert!(matches!(
      map.normalize_row(&row(json!({ "Year": 2024 }))),
      Err(NormalizeError::MissingColumn(_))
    ));
    assert!(map.validate_header(["Name", "Year"]).is_err());
    assert!(map.validate_header(["Name", "MS_Number"]).is_ok());
  }

  #[test]
  fn garbage_version_is_rejected() {
    let map = ColumnMap::standard().unwrap();
    assert!(matches!(
      map.normalize_row(&row(json!({ "MS Number": "A-D-24-00001", "Version": "final" }))),
      Err(NormalizeError::InvalidValue { .. })
    ));
  }

  #[test]
  fn keyless_rows_are_skipped() {
    let map = ColumnMap::standard().unwrap();
    let rows = vec![
      row(json!({ "MS Number": "NaN" })),
      row(json!({ "MS Number": "A-D-24-00001" })),
    ];
    let records = map.normalize_rows(&rows).unwrap();
    assert_eq!(records.len(), 1);
  }

  #[test]
  fn null_markers_become_absent() {
    let markers = [
      json!(null),
      json!(""),
      json!("  "),
      json!("NaN"),
      json!("nan"),
      json!("NaT"),
      json!("None"),
      json!("NULL"),
      json!("N/A"),
    ];
    for v in markers {
      assert_eq!(text(&v), None, "{v}");
      assert_eq!(date(&v), None, "{v}");
      assert_eq!(year(&v), None, "{v}");
    }
  }

  #[test]
  fn years_are_extracted_from_noisy_input() {
    assert_eq!(year(&json!(2024)), Some(2024));
    assert_eq!(year(&json!(2024.0)), Some(2024));
    assert_eq!(year(&json!("2024")), Some(2024));
    assert_eq!(year(&json!("FY2024 batch")), Some(2024));
    assert_eq!(year(&json!("123456")), None);
    assert_eq!(year(&json!(24)), None);
    assert_eq!(year(&json!("soon")), None);
  }

  #[test]
  fn dates_accept_common_representations() {
    let want = ymd(2024, 3, 15);
    for s in [
      "2024-03-15",
      "2024/03/15",
      "2024-03-15T10:20:30",
      "2024-03-15 10:20:30.123",
      "2024-03-15T10:20:30+00:00",
      "Fri, 15 Mar 2024 10:20:30 +0000",
      "2024-03-15 00:00:00+00:00",
    ] {
      assert_eq!(date(&json!(s)), want, "{s}");
    }
    assert_eq!(date(&json!("15th of March")), None);
  }

  #[test]
  fn canonicalize_is_idempotent() {
    let mut r = ManuscriptRecord::new(" EUONCO-D-24-00622R2 ", 0);
    r.editor = Some("  Assel ".into());
    r.name = Some("nan".into());
    let once = canonicalize(r);
    let twice = canonicalize(once.clone());
    assert_eq!(once, twice);
    assert_eq!(once.identity, "EUONCO-D-24-00622");
    assert_eq!(once.version, 2);
    assert_eq!(once.editor.as_deref(), Some("Assel"));
    assert!(once.name.is_none());
  }

  #[test]
  fn normalizing_a_rendered_row_is_a_no_op() {
    let map = ColumnMap::standard().unwrap();
    let mut r = ManuscriptRecord::new("EUONCO-D-24-00622", 1);
    r.year = Some(2024);
    r.journal = Some("EUONCO".into());
    r.date_completed = ymd(2024, 4, 2);
    for schema in [Schema::Spaced, Schema::Underscored] {
      assert_eq!(map.normalize_row(&to_row(&r, schema)).unwrap(), r);
    }
  }
}
