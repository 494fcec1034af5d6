//! Process-wide settings read from the environment.
//!
//! Command-line flags override these; the CLI merges the two before building
//! a deployment request.

use std::path::PathBuf;

use tracing::debug;

/// Disables backup archives when set to a truthy value.
pub const NO_BACKUP_VAR: &str = "ENSCONCE_NO_BACKUP";

/// Path to a JSON file of extra tags.
pub const TAGS_FILE_VAR: &str = "ENSCONCE_TAGS_FILE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
  pub backups: bool,
  pub tags_file: Option<PathBuf>,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      backups: true,
      tags_file: None,
    }
  }
}

impl Settings {
  pub fn from_env() -> Self {
    let settings = Self {
      backups: !std::env::var(NO_BACKUP_VAR).is_ok_and(|v| is_truthy(&v)),
      tags_file: std::env::var_os(TAGS_FILE_VAR)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from),
    };
    debug!(backups = settings.backups, tags_file = ?settings.tags_file, "settings loaded");
    settings
  }
}

fn is_truthy(value: &str) -> bool {
  matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}
