//! SQL schema for the Referee cache table.
//!
//! Executed once at connection startup. A table created by an older tool
//! under the same name is left as it is; its columns are mapped through the
//! field normalizer instead (see [`crate::encode::Layout`]).

pub const TABLE: &str = "reviewer_metrics";

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per (manuscript, review round). Rows are upserted, never deleted.
CREATE TABLE IF NOT EXISTS reviewer_metrics (
    \"Name\"           TEXT,
    \"MS Number\"      TEXT    NOT NULL,   -- base identity, no R<n> suffix
    \"Version\"        INTEGER NOT NULL DEFAULT 0,
    \"Year\"           INTEGER,
    \"Editor\"         TEXT,
    \"Journal\"        TEXT,
    \"Date Invited\"   TEXT,               -- YYYY-MM-DD or NULL
    \"Date Completed\" TEXT,               -- YYYY-MM-DD or NULL
    PRIMARY KEY (\"MS Number\", \"Version\")
);

PRAGMA user_version = 1;
";
