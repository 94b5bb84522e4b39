//! Manuscript identity extraction from review-file names.
//!
//! Handled reviews are filed as PDFs named
//!
//! ```text
//! EUONCO-D-24-00622R2 (Assel) 2024-03-15.pdf
//! └────┘   └──────┘└┘ └───┘  └────────┘
//! journal   number  round editor  filed
//! ```
//!
//! Pipeline:
//!   filename
//!     └─ find each `-D-` marker
//!          └─ match_at()  → journal letters before, code and round after
//!               └─ split_editor() → editor text + filing date
//!
//! Anything that does not fit is skipped. Directories are full of other
//! files, so a mismatch is never an error.

use crate::record::ManuscriptRecord;

const MARKER: &str = "-D-";

/// Parse `filename` into a record, or `None` if it is not a review file.
///
/// The pattern may appear anywhere in the name; the first match wins.
pub fn extract(filename: &str) -> Option<ManuscriptRecord> {
  let mut from = 0usize;
  while let Some(offset) = filename[from..].find(MARKER) {
    let at = from + offset;
    if let Some(record) = match_at(filename, at) {
      return Some(record);
    }
    from = at + 1;
  }
  tracing::trace!(filename, "not a manuscript filename");
  None
}

/// The canonical base identity, e.g. `EUONCO-D-24-00622`.
pub fn format_identity(journal: &str, year_code: &str, number: &str) -> String {
  format!("{journal}{MARKER}{year_code}-{number}")
}

/// Split a trailing `R<n>` round marker off a code like
/// `EUONCO-D-24-00622R2`. Returns `None` if there is no marker.
///
/// A code carrying two markers (`...R2R3`) is left alone so that splitting
/// stays idempotent.
pub fn split_round_suffix(code: &str) -> Option<(&str, u32)> {
  let (base, digits) = round_split(code)?;
  if round_split(base).is_some() {
    return None;
  }
  Some((base, digits.parse().ok()?))
}

fn round_split(code: &str) -> Option<(&str, &str)> {
  let digits_start = code
    .char_indices()
    .rev()
    .take_while(|(_, c)| c.is_ascii_digit())
    .last()
    .map(|(i, _)| i)?;
  let base = code[..digits_start].strip_suffix('R')?;
  // `R` must close a submission number, not stand alone.
  if !base.ends_with(|c: char| c.is_ascii_digit()) {
    return None;
  }
  Some((base, &code[digits_start..]))
}

/// The journal prefix of a canonical identity (`EUONCO` for
/// `EUONCO-D-24-00622`).
pub fn journal_of(identity: &str) -> Option<&str> {
  let (journal, _) = identity.split_once(MARKER)?;
  (!journal.is_empty() && journal.bytes().all(|b| b.is_ascii_alphabetic()))
    .then_some(journal)
}

// ─── Matching ────────────────────────────────────────────────────────────────

fn match_at(name: &str, at: usize) -> Option<ManuscriptRecord> {
  let bytes = name.as_bytes();
  let journal_start = bytes[..at]
    .iter()
    .rposition(|b| !b.is_ascii_alphabetic())
    .map_or(0, |i| i + 1);
  let journal = &name[journal_start..at];
  if journal.is_empty() {
    return None;
  }

  let rest = &name[at + MARKER.len()..];
  let (year_code, rest) = take_digits(rest, 2)?;
  let rest = rest.strip_prefix('-')?;
  let (number, rest) = take_digits(rest, 5)?;

  let (version, rest) = match rest.strip_prefix('R') {
    Some(after) => {
      let len = after.bytes().take_while(u8::is_ascii_digit).count();
      if len == 0 {
        return None;
      }
      (after[..len].parse::<u32>().ok()?, &after[len..])
    }
    None => (0, rest),
  };

  let rest = take_whitespace(rest)?;
  let rest = rest.strip_prefix('(')?;
  let (editor, year) = split_editor(rest)?;

  Some(ManuscriptRecord {
    name: Some(name.to_owned()),
    identity: format_identity(journal, year_code, number),
    version,
    editor: Some(editor.to_owned()),
    journal: Some(journal.to_owned()),
    year: Some(year),
    date_invited: None,
    date_completed: None,
  })
}

/// Find the shortest editor text such that `) YYYY-MM-DD.pdf` follows it.
/// Editor names may contain parentheses of their own.
fn split_editor(s: &str) -> Option<(&str, i32)> {
  for (close, _) in s.match_indices(')') {
    let editor = &s[..close];
    if editor.contains('\n') {
      return None;
    }
    if let Some(year) = filing_tail(&s[close + 1..]) {
      return Some((editor, year));
    }
  }
  None
}

/// Match ` YYYY-MM-DD.pdf` and return the year.
fn filing_tail(s: &str) -> Option<i32> {
  let s = take_whitespace(s)?;
  let (year, s) = take_digits(s, 4)?;
  let s = s.strip_prefix('-')?;
  let (_, s) = take_digits(s, 2)?;
  let s = s.strip_prefix('-')?;
  let (_, s) = take_digits(s, 2)?;
  s.strip_prefix(".pdf")?;
  year.parse().ok()
}

fn take_digits(s: &str, n: usize) -> Option<(&str, &str)> {
  let head = s.get(..n)?;
  head
    .bytes()
    .all(|b| b.is_ascii_digit())
    .then(|| (head, &s[n..]))
}

fn take_whitespace(s: &str) -> Option<&str> {
  let c = s.chars().next()?;
  c.is_whitespace().then(|| &s[c.len_utf8()..])
}
