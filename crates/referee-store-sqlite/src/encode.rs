//! Encoding and decoding helpers between manuscript records and the SQLite
//! columns of the cache table.
//!
//! Dates are stored as `YYYY-MM-DD` text, the round as an integer, and the
//! manuscript number without its `R<n>` suffix. Rows written by older tools
//! may disagree on all of that; they are read back through the normalizer.

use referee_core::{
  normalize::{Column, ColumnMap, NormalizeError, RawRow, format_date},
  record::ManuscriptRecord,
};
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::Value;

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// Quote an SQL identifier (`MS Number` → `"MS Number"`).
pub fn quote(name: &str) -> String { format!("\"{}\"", name.replace('"', "\"\"")) }

// ─── Layout ──────────────────────────────────────────────────────────────────

/// Where each canonical column lives in the actual table.
#[derive(Debug, Clone)]
pub struct Layout {
  /// `(column, actual name)` in [`Column::ALL`] order.
  columns: Vec<(Column, String)>,
}

impl Layout {
  /// Map a table header onto canonical columns. Every column must be
  /// mappable (or ignorable) and every canonical column must be present.
  pub fn detect(map: &ColumnMap, header: &[String]) -> Result<Self, NormalizeError> {
    map.validate_header(header.iter().map(String::as_str))?;

    let mut columns = Vec::with_capacity(Column::ALL.len());
    for wanted in Column::ALL {
      let mut found = None;
      for name in header {
        if map.resolve(name)? == Some(wanted) {
          found = Some(name.clone());
          break;
        }
      }
      let name = found.ok_or(NormalizeError::MissingColumn(wanted.spaced()))?;
      columns.push((wanted, name));
    }
    Ok(Self { columns })
  }

  pub fn names(&self) -> impl Iterator<Item = &str> { self.columns.iter().map(|(_, n)| n.as_str()) }

  /// `"Name", "MS Number", ...` for SELECT and INSERT lists.
  pub fn select_list(&self) -> String {
    self.names().map(quote).collect::<Vec<_>>().join(", ")
  }

  /// `"Name" = ?1, "MS Number" = ?2, ...` for UPDATE.
  pub fn assignments(&self) -> String {
    self
      .names()
      .enumerate()
      .map(|(i, n)| format!("{} = ?{}", quote(n), i + 1))
      .collect::<Vec<_>>()
      .join(", ")
  }

  /// Turn the values of one SELECTed row (in layout order) into a raw row.
  pub fn raw_row(&self, values: Vec<Value>) -> RawRow {
    self.names().map(str::to_owned).zip(values).collect()
  }
}

// ─── Values ──────────────────────────────────────────────────────────────────

/// A loosely-typed JSON value for whatever SQLite handed back.
pub fn decode_value(v: ValueRef<'_>) -> Value {
  match v {
    ValueRef::Null => Value::Null,
    ValueRef::Integer(i) => Value::from(i),
    ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
    ValueRef::Text(t) => Value::from(String::from_utf8_lossy(t).into_owned()),
    ValueRef::Blob(b) => Value::from(String::from_utf8_lossy(b).into_owned()),
  }
}

/// Bind values for a record, in [`Column::ALL`] order.
pub fn encode_record(r: &ManuscriptRecord) -> Vec<SqlValue> {
  let text = |v: &Option<String>| v.clone().map_or(SqlValue::Null, SqlValue::Text);
  Column::ALL
    .iter()
    .map(|column| match column {
      Column::Name => text(&r.name),
      Column::MsNumber => SqlValue::Text(r.identity.clone()),
      Column::Version => SqlValue::Integer(i64::from(r.version)),
      Column::Year => r.year.map_or(SqlValue::Null, |y| SqlValue::Integer(i64::from(y))),
      Column::Editor => text(&r.editor),
      Column::Journal => text(&r.journal),
      Column::DateInvited => r
        .date_invited
        .map_or(SqlValue::Null, |d| SqlValue::Text(format_date(d))),
      Column::DateCompleted => r
        .date_completed
        .map_or(SqlValue::Null, |d| SqlValue::Text(format_date(d))),
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn header(names: &[&str]) -> Vec<String> { names.iter().map(|s| s.to_string()).collect() }

  #[test]
  fn detects_underscored_legacy_layout() {
    let map = ColumnMap::new(["id"]).unwrap();
    let layout = Layout::detect(
      &map,
      &header(&[
        "id",
        "Name",
        "MS_Number",
        "Version",
        "Year",
        "Editor",
        "Journal",
        "Date_Invited",
        "Date_Completed",
      ]),
    )
    .unwrap();
    assert_eq!(layout.names().nth(1), Some("MS_Number"));
    assert_eq!(layout.names().count(), 8);
    assert!(layout.assignments().starts_with("\"Name\" = ?1, \"MS_Number\" = ?2"));
  }

  #[test]
  fn missing_column_is_reported() {
    let map = ColumnMap::standard().unwrap();
    let err = Layout::detect(&map, &header(&["MS Number", "Version"])).unwrap_err();
    assert!(matches!(err, NormalizeError::MissingColumn("Name")));
  }

  #[test]
  fn quote_escapes_embedded_quotes() {
    assert_eq!(quote("MS Number"), "\"MS Number\"");
    assert_eq!(quote("a\"b"), "\"a\"\"b\"");
  }
}
