use serde::Deserialize;

/// Where the remote table lives and how to talk to it.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
  /// Project URL, e.g. `https://abc.supabase.co`.
  #[serde(default)]
  pub url:              String,
  /// Service or anon key; sent as both `apikey` and bearer token.
  #[serde(default)]
  pub key:              String,
  #[serde(default = "default_table")]
  pub table:            String,
  /// Columns PostgREST resolves upsert conflicts on.
  #[serde(default = "default_conflict_columns")]
  pub conflict_columns: Vec<String>,
  #[serde(default = "default_page_size")]
  pub page_size:        usize,
  #[serde(default = "default_batch_size")]
  pub batch_size:       usize,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs:     u64,
}

fn default_table() -> String { "reviewer_metrics_prod".into() }
fn default_conflict_columns() -> Vec<String> { vec!["MS_Number".into(), "Version".into()] }
fn default_page_size() -> usize { 1000 }
fn default_batch_size() -> usize { 500 }
fn default_timeout_secs() -> u64 { 30 }

impl RemoteConfig {
  /// Defaults for everything but the location and key.
  pub fn new(url: impl Into<String>, key: impl Into<String>) -> Self {
    Self {
      url:              url.into(),
      key:              key.into(),
      table:            default_table(),
      conflict_columns: default_conflict_columns(),
      page_size:        default_page_size(),
      batch_size:       default_batch_size(),
      timeout_secs:     default_timeout_secs(),
    }
  }

  /// A section with no URL or no key leaves the remote disabled.
  pub fn is_configured(&self) -> bool {
    !self.url.trim().is_empty() && !self.key.trim().is_empty()
  }

  /// `{url}/rest/v1/{table}`
  pub fn endpoint(&self) -> String {
    format!("{}/rest/v1/{}", self.url.trim_end_matches('/'), self.table)
  }
}
