//! Layered configuration: defaults, then `SUPABASE_*` from the environment
//! (or `.env`), then the TOML file, then `REFEREE_*` variables.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use referee_core::normalize::ColumnMap;
use referee_store_remote::RemoteConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  /// Directory of completed review PDFs.
  pub dealt_with_dir:  PathBuf,
  /// SQLite cache file.
  pub cache_path:      PathBuf,
  /// Columns the stores may carry that are not part of a record.
  pub ignored_columns: Vec<String>,
  #[serde(default)]
  pub remote:          Option<RemoteConfig>,
}

impl Settings {
  pub fn load(path: &Path) -> Result<Self> {
    let mut builder = config::Config::builder()
      .set_default("dealt_with_dir", "Dealt With")?
      .set_default("cache_path", "referee.sqlite3")?
      .set_default("ignored_columns", vec!["id", "created_at"])?;
    for (var, key) in [("SUPABASE_URL", "remote.url"), ("SUPABASE_KEY", "remote.key")] {
      if let Ok(value) = std::env::var(var) {
        builder = builder.set_default(key, value)?;
      }
    }

    let settings: Settings = builder
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("REFEREE")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()
      .with_context(|| format!("failed to read config file {}", path.display()))?
      .try_deserialize()
      .context("failed to deserialise settings")?;

    Ok(Self {
      dealt_with_dir: expand_tilde(&settings.dealt_with_dir),
      cache_path: expand_tilde(&settings.cache_path),
      ..settings
    })
  }

  pub fn column_map(&self) -> Result<ColumnMap> {
    ColumnMap::new(&self.ignored_columns).context("invalid ignored_columns")
  }

  /// The remote table, if both a URL and a key were given.
  pub fn remote(&self) -> Option<&RemoteConfig> {
    self.remote.as_ref().filter(|r| r.is_configured())
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::fs;

  use super::*;

  #[test]
  fn file_values_override_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("referee.toml");
    fs::write(
      &path,
      r#"
dealt_with_dir  = "/data/Dealt With"
cache_path      = "/data/cache.sqlite3"
ignored_columns = ["id"]

[remote]
url        = "https://abc.supabase.co"
key        = "service-key"
batch_size = 50
"#,
    )
    .unwrap();

    let settings = Settings::load(&path).unwrap();
    assert_eq!(settings.dealt_with_dir, PathBuf::from("/data/Dealt With"));
    assert_eq!(settings.cache_path, PathBuf::from("/data/cache.sqlite3"));
    assert_eq!(settings.ignored_columns, ["id"]);

    let remote = settings.remote().expect("remote configured");
    assert_eq!(remote.url, "https://abc.supabase.co");
    assert_eq!(remote.batch_size, 50);
    assert_eq!(remote.table, "reviewer_metrics_prod");
    assert!(settings.column_map().is_ok());
  }

  #[test]
  fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(settings.cache_path, PathBuf::from("referee.sqlite3"));
    assert_eq!(settings.ignored_columns, ["id", "created_at"]);
    if std::env::var("SUPABASE_URL").is_err() {
      assert!(settings.remote().is_none());
    }
  }

  #[test]
  fn ignored_column_may_not_shadow_a_record_column() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("referee.toml");
    fs::write(&path, "ignored_columns = [\"MS_Number\"]\n").unwrap();
    let settings = Settings::load(&path).unwrap();
    assert!(settings.column_map().is_err());
  }

  #[test]
  fn tilde_is_expanded() {
    let Ok(home) = std::env::var("HOME") else {
      return;
    };
    assert_eq!(expand_tilde(Path::new("~/Reviews")), PathBuf::from(home).join("Reviews"));
    assert_eq!(expand_tilde(Path::new("/abs/path")), PathBuf::from("/abs/path"));
  }
}
