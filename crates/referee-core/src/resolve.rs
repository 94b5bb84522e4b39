//! Version resolution: the "current" projection of a record set.
//!
//! Lower review rounds are never removed from a store; they are only hidden
//! from the current view once a higher round of the same manuscript exists.

use std::collections::HashMap;

use crate::record::ManuscriptRecord;

/// Keep the highest-version record per identity.
///
/// Ties on `(identity, version)` go to the record observed last, so callers
/// must pass records in a stable order (directory listing or store read
/// order). The output lists identities in order of first appearance.
pub fn current<I>(records: I) -> Vec<ManuscriptRecord>
where
  I: IntoIterator<Item = ManuscriptRecord>,
{
  let mut slots: HashMap<String, usize> = HashMap::new();
  let mut out: Vec<ManuscriptRecord> = Vec::new();

  for record in records {
    match slots.get(&record.identity) {
      Some(&i) => {
        if record.version >= out[i].version {
          out[i] = record;
        }
      }
      None => {
        slots.insert(record.identity.clone(), out.len());
        out.push(record);
      }
    }
  }
  out
}

/// Records hidden from the current view because a higher round exists.
pub fn superseded(records: &[ManuscriptRecord]) -> Vec<&ManuscriptRecord> {
  let mut latest: HashMap<&str, u32> = HashMap::new();
  for r in records {
    let v = latest.entry(r.identity.as_str()).or_insert(r.version);
    *v = (*v).max(r.version);
  }
  records
    .iter()
    .filter(|r| latest.get(r.identity.as_str()).is_some_and(|&v| r.version < v))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn rec(identity: &str, version: u32, editor: &str) -> ManuscriptRecord {
    let mut r = ManuscriptRecord::new(identity, version);
    r.editor = Some(editor.to_owned());
    r
  }

  #[test]
  fn keeps_highest_version_per_identity() {
    let out = current(vec![
      rec("A-D-24-00001", 1, "x"),
      rec("B-D-24-00002", 0, "y"),
      rec("A-D-24-00001", 3, "x"),
      rec("A-D-24-00001", 2, "x"),
    ]);
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].identity, "A-D-24-00001");
    assert_eq!(out[0].version, 3);
    assert_eq!(out[1].identity, "B-D-24-00002");
  }

  #[test]
  fn duplicate_keys_resolve_to_last_observed() {
    let out = current(vec![
      rec("A-D-24-00001", 2, "first"),
      rec("A-D-24-00001", 2, "second"),
    ]);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].editor.as_deref(), Some("second"));
  }

  #[test]
  fn empty_input_yields_empty_view() {
    assert!(current(Vec::new()).is_empty());
  }

  #[test]
  fn resolution_is_deterministic() {
    let input = vec![
      rec("C-D-24-00003", 0, "c"),
      rec("A-D-24-00001", 1, "a"),
      rec("C-D-24-00003", 1, "c"),
    ];
    assert_eq!(current(input.clone()), current(input));
  }

  #[test]
  fn superseded_lists_hidden_rounds() {
    let records = vec![
      rec("A-D-24-00001", 1, "x"),
      rec("A-D-24-00001", 2, "x"),
      rec("B-D-24-00002", 0, "y"),
    ];
    let hidden = superseded(&records);
    assert_eq!(hidden.len(), 1);
    assert_eq!(hidden[0].version, 1);
  }
}
