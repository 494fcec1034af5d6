use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Classification of a single difference between a directory and its last snapshot.
///
/// Variants are declared in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftKind {
  /// Tracked file whose working tree content differs from the index.
  Modified,
  /// Staged file whose content differs from the last commit.
  Changed,
  /// Staged file that is not part of the last commit.
  Added,
  /// Tracked file that no longer exists on disk.
  Missing,
  /// File on disk that is not tracked at all.
  Untracked,
}

impl DriftKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Modified => "modified",
      Self::Changed => "changed",
      Self::Added => "added",
      Self::Missing => "missing",
      Self::Untracked => "untracked",
    }
  }
}

impl fmt::Display for DriftKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftRecord {
  pub kind: DriftKind,
  /// Root of the repository the file belongs to.
  pub repository: PathBuf,
  /// Path relative to `repository`, always `/`-separated.
  pub file: String,
}

impl DriftRecord {
  /// Full on-disk location of the drifted file.
  pub fn full_path(&self) -> PathBuf {
    self.repository.join(&self.file)
  }
}

/// Ordered drift records. A report with no records is clean.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriftReport {
  records: Vec<DriftRecord>,
}

impl DriftReport {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, record: DriftRecord) {
    self.records.push(record);
  }

  /// Append another report, preserving its order after the existing records.
  pub fn extend(&mut self, other: DriftReport) {
    self.records.extend(other.records);
  }

  pub fn records(&self) -> &[DriftRecord] {
    &self.records
  }

  pub fn count(&self) -> usize {
    self.records.len()
  }

  pub fn is_clean(&self) -> bool {
    self.records.is_empty()
  }

  /// Records of a single kind, in report order.
  pub fn of_kind(&self, kind: DriftKind) -> impl Iterator<Item = &DriftRecord> {
    self.records.iter().filter(move |r| r.kind == kind)
  }
}

impl IntoIterator for DriftReport {
  type Item = DriftRecord;
  type IntoIter = std::vec::IntoIter<DriftRecord>;

  fn into_iter(self) -> Self::IntoIter {
    self.records.into_iter()
  }
}

/// Errors raised while opening, committing or reading a snapshot repository.
#[derive(Debug, Error)]
pub enum SnapshotError {
  #[error("directory does not exist: {0}")]
  DirectoryNotFound(PathBuf),

  #[error("failed to initialize repository at '{path}': {source}")]
  Init {
    path: PathBuf,
    #[source]
    source: Box<gix::init::Error>,
  },

  #[error("failed to open repository at '{path}': {source}")]
  Open {
    path: PathBuf,
    #[source]
    source: Box<gix::open::Error>,
  },

  #[error("failed to read '{path}': {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to traverse directory {path}: {source}")]
  WalkDir {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("repository operation failed in '{path}': {source}")]
  Repository {
    path: PathBuf,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },
}

impl SnapshotError {
  pub(crate) fn repository<E>(path: impl Into<PathBuf>, source: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Repository {
      path: path.into(),
      source: Box::new(source),
    }
  }
}
