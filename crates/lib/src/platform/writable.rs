//! Clearing read-only attributes before a directory is deleted.
//!
//! Previous deployments may leave files marked read-only, which makes
//! recursive removal fail on Windows and leaves directories undeletable on
//! Unix when their write bit is missing.
//!
//! ## Platform Behavior
//!
//! - **Unix**: Adds the owner write bit (and owner search bit on directories)
//! - **Windows**: Clears the read-only attribute

use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

/// Error during attribute changes.
#[derive(Debug, thiserror::Error)]
pub enum WritableError {
  #[error("failed to set permissions on {path}: {source}")]
  SetPermissions {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to read metadata for {path}: {source}")]
  Metadata {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to traverse directory {path}: {source}")]
  WalkDir {
    path: String,
    #[source]
    source: walkdir::Error,
  },
}

/// Recursively make `path` and everything below it writable by the owner.
///
/// Per-entry failures are logged and skipped; the following delete reports
/// anything that is still locked.
pub fn make_writable(path: &Path) -> Result<(), WritableError> {
  if !path.exists() {
    return Ok(());
  }

  debug!(path = ?path, "clearing read-only attributes");

  // Directories before contents so we can enter them
  for entry in WalkDir::new(path) {
    let entry = entry.map_err(|e| WritableError::WalkDir {
      path: path.display().to_string(),
      source: e,
    })?;

    if entry.path_is_symlink() {
      continue;
    }

    if let Err(e) = make_entry_writable(entry.path()) {
      warn!(path = ?entry.path(), error = %e, "failed to clear read-only attribute, continuing");
    }
  }

  Ok(())
}

#[cfg(unix)]
fn make_entry_writable(path: &Path) -> Result<(), WritableError> {
  use std::os::unix::fs::PermissionsExt;

  let metadata = std::fs::metadata(path).map_err(|e| WritableError::Metadata {
    path: path.display().to_string(),
    source: e,
  })?;

  let current_mode = metadata.permissions().mode();
  let new_mode = if metadata.is_dir() {
    current_mode | 0o700
  } else {
    current_mode | 0o200
  };

  if new_mode == current_mode {
    return Ok(());
  }

  let mut perms = metadata.permissions();
  perms.set_mode(new_mode);
  std::fs::set_permissions(path, perms).map_err(|e| WritableError::SetPermissions {
    path: path.display().to_string(),
    source: e,
  })
}

#[cfg(windows)]
fn make_entry_writable(path: &Path) -> Result<(), WritableError> {
  let metadata = std::fs::metadata(path).map_err(|e| WritableError::Metadata {
    path: path.display().to_string(),
    source: e,
  })?;

  let mut perms = metadata.permissions();
  if !perms.readonly() {
    return Ok(());
  }

  // Only clears FILE_ATTRIBUTE_READONLY on Windows
  #[allow(clippy::permissions_set_readonly_false)]
  perms.set_readonly(false);
  std::fs::set_permissions(path, perms).map_err(|e| WritableError::SetPermissions {
    path: path.display().to_string(),
    source: e,
  })
}
