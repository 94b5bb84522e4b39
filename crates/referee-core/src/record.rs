//! The manuscript record: one row per (manuscript, review round).
//!
//! A manuscript keeps the same `identity` across every revision round; the
//! round itself is `version`. Only the pair is unique, see [`CompositeKey`].

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ─── Composite key ───────────────────────────────────────────────────────────

/// `identity + version`, the true unique key of a record within a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompositeKey {
  pub identity: String,
  pub version:  u32,
}

impl CompositeKey {
  pub fn new(identity: impl Into<String>, version: u32) -> Self {
    Self { identity: identity.into(), version }
  }
}

/// Renders the legacy "MS Number" form: `EUONCO-D-24-00622` for round 0 and
/// `EUONCO-D-24-00622R2` for later rounds.
impl fmt::Display for CompositeKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.version == 0 {
      f.write_str(&self.identity)
    } else {
      write!(f, "{}R{}", self.identity, self.version)
    }
  }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// A single review round of a manuscript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManuscriptRecord {
  /// Original filename (or display name) the record was observed under.
  #[serde(default)]
  pub name:           Option<String>,
  /// Journal + submission number, e.g. `EUONCO-D-24-00622`.
  pub identity:       String,
  /// Review round; 0 for the initial submission.
  #[serde(default)]
  pub version:        u32,
  #[serde(default)]
  pub editor:         Option<String>,
  #[serde(default)]
  pub journal:        Option<String>,
  #[serde(default)]
  pub year:           Option<i32>,
  #[serde(default)]
  pub date_invited:   Option<NaiveDate>,
  /// Stays `None` until a review reply is observed.
  #[serde(default)]
  pub date_completed: Option<NaiveDate>,
}

impl ManuscriptRecord {
  /// A bare record with only its key set.
  pub fn new(identity: impl Into<String>, version: u32) -> Self {
    Self {
      name: None,
      identity: identity.into(),
      version,
      editor: None,
      journal: None,
      year: None,
      date_invited: None,
      date_completed: None,
    }
  }

  pub fn composite_key(&self) -> CompositeKey {
    CompositeKey::new(self.identity.clone(), self.version)
  }

  /// Fold a newer observation of the same key into this record, the way
  /// every store applies an update.
  ///
  /// Descriptive attributes are immutable once set; dates and the file name
  /// take the newer value, and absence never erases what is stored.
  pub fn merge(&mut self, incoming: &ManuscriptRecord) {
    self.name = incoming.name.clone().or_else(|| self.name.take());
    self.editor = self.editor.take().or_else(|| incoming.editor.clone());
    self.journal = self.journal.take().or_else(|| incoming.journal.clone());
    self.year = self.year.or(incoming.year);
    self.date_invited = incoming.date_invited.or(self.date_invited);
    self.date_completed = incoming.date_completed.or(self.date_completed);
  }

  /// `true` if `other` has a strictly higher review round of the same
  /// manuscript.
  pub fn is_superseded_by(&self, other: &ManuscriptRecord) -> bool {
    self.identity == other.identity && other.version > self.version
  }
}
