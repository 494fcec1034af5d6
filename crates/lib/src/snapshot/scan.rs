//! Drift scanning across every snapshot repository below a root.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::consts::VCS_MARKER;

use super::storage::{SnapshotStore, is_repository_root};
use super::types::DriftReport;

#[derive(Debug, Error)]
pub enum ScanError {
  #[error("scan root does not exist: {0}")]
  RootNotFound(PathBuf),
}

/// Outcome of scanning a directory tree.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
  pub root: PathBuf,
  /// Repositories whose status was read, in traversal order.
  pub repositories: Vec<PathBuf>,
  /// Repositories that could not be opened or read.
  pub skipped: Vec<PathBuf>,
  pub report: DriftReport,
}

impl ScanReport {
  pub fn has_drift(&self) -> bool {
    !self.report.is_clean()
  }
}

/// Lazily yield every repository root below `root` (including `root` itself),
/// depth first in file-name order.
///
/// Unreadable directories are logged and skipped.
pub fn find_repositories(root: &Path) -> impl Iterator<Item = PathBuf> + use<> {
  WalkDir::new(root)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|e| e.file_name() != VCS_MARKER)
    .filter_map(|entry| match entry {
      Ok(entry) => Some(entry),
      Err(e) => {
        warn!(error = %e, "skipping unreadable directory during scan");
        None
      }
    })
    .filter(|entry| entry.file_type().is_dir() && is_repository_root(entry.path()))
    .map(|entry| entry.into_path())
}

/// Collect drift from every repository under `root`.
///
/// Repositories that fail to open are skipped so one corrupt history does
/// not hide drift elsewhere.
pub fn scan(root: &Path) -> Result<ScanReport, ScanError> {
  if !root.is_dir() {
    return Err(ScanError::RootNotFound(root.to_path_buf()));
  }

  info!(root = %root.display(), "scanning for changes");

  let mut result = ScanReport {
    root: root.to_path_buf(),
    ..Default::default()
  };

  for repo in find_repositories(root) {
    match SnapshotStore::new(&repo).status() {
      Ok(report) => {
        debug!(repository = %repo.display(), changes = report.count(), "repository scanned");
        result.report.extend(report);
        result.repositories.push(repo);
      }
      Err(e) => {
        warn!(repository = %repo.display(), error = %e, "skipping repository that could not be read");
        result.skipped.push(repo);
      }
    }
  }

  info!(
    repositories = result.repositories.len(),
    skipped = result.skipped.len(),
    changes = result.report.count(),
    "scan complete"
  );

  Ok(result)
}
