//! The per-directory replace pipeline.
//!
//! Replacing a directory runs `Backup -> StopServices -> StopProcesses ->
//! Delete -> Copy`, recording each stage in a [`TargetOutcome`]. A failed
//! backup or delete stops the pipeline. Failed service or process teardown
//! is recorded but deletion is still attempted: if anything is still
//! holding files open the delete fails and reports it.
//!
//! Copy mode runs the `Copy` stage alone, layering the source over whatever
//! the target already holds.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::backup::{BackupSummary, backup};
use crate::platform::writable::{WritableError, make_writable};
use crate::reap::{ReapError, ReapReport, Reaper, SystemControl};
use crate::snapshot::CommitSummary;

#[derive(Debug, Error)]
pub enum ReplaceError {
  #[error("deployment source does not exist: {0}")]
  SourceNotFound(PathBuf),

  #[error(transparent)]
  Writable(#[from] WritableError),

  #[error("failed to delete '{path}': {source}")]
  Delete {
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

  #[error("failed to create directory '{path}': {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to copy '{from}' to '{to}': {source}")]
  Copy {
    from: PathBuf,
    to: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// One step of work against a target directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
  Backup,
  StopServices,
  StopProcesses,
  Delete,
  Copy,
  Finalise,
}

impl Stage {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Backup => "backup",
      Self::StopServices => "stop services",
      Self::StopProcesses => "stop processes",
      Self::Delete => "delete",
      Self::Copy => "copy",
      Self::Finalise => "finalise",
    }
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageRecord {
  pub stage: Stage,
  /// Failure description; `None` when the stage succeeded.
  pub error: Option<String>,
}

impl StageRecord {
  pub fn succeeded(&self) -> bool {
    self.error.is_none()
  }
}

/// Everything that happened to one target directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetOutcome {
  pub path: PathBuf,
  pub stages: Vec<StageRecord>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub backup: Option<BackupSummary>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub commit: Option<CommitSummary>,
}

impl TargetOutcome {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      stages: Vec::new(),
      backup: None,
      commit: None,
    }
  }

  pub fn succeed(&mut self, stage: Stage) {
    self.stages.push(StageRecord { stage, error: None });
  }

  pub fn fail(&mut self, stage: Stage, error: impl fmt::Display) {
    warn!(path = %self.path.display(), %stage, error = %error, "stage failed");
    self.stages.push(StageRecord {
      stage,
      error: Some(error.to_string()),
    });
  }

  pub fn attempted(&self) -> impl Iterator<Item = Stage> + '_ {
    self.stages.iter().map(|r| r.stage)
  }

  pub fn succeeded(&self) -> impl Iterator<Item = Stage> + '_ {
    self.stages.iter().filter(|r| r.succeeded()).map(|r| r.stage)
  }

  /// First failure, if any.
  pub fn error(&self) -> Option<(Stage, &str)> {
    self
      .stages
      .iter()
      .find_map(|r| r.error.as_deref().map(|e| (r.stage, e)))
  }

  pub fn is_success(&self) -> bool {
    self.stages.iter().all(StageRecord::succeeded)
  }
}

/// Runs the replace and copy pipelines for a single deployment source.
pub struct DirectoryReplacer<'a, S: SystemControl + ?Sized> {
  reaper: Reaper<'a, S>,
  source: PathBuf,
  backups: bool,
}

impl<'a, S: SystemControl + ?Sized> DirectoryReplacer<'a, S> {
  pub fn new(system: &'a S, source: impl Into<PathBuf>, backups: bool) -> Self {
    Self {
      reaper: Reaper::new(system),
      source: source.into(),
      backups,
    }
  }

  pub fn source(&self) -> &Path {
    &self.source
  }

  /// Back up, tear down, delete and recreate `target` from the source.
  pub fn replace(&self, target: &Path) -> TargetOutcome {
    info!(target = %target.display(), source = %self.source.display(), "replacing directory");
    let mut outcome = TargetOutcome::new(target);

    match backup(target, self.backups) {
      Ok(summary) => {
        outcome.backup = summary;
        outcome.succeed(Stage::Backup);
      }
      Err(e) => {
        outcome.fail(Stage::Backup, e);
        return outcome;
      }
    }

    record_reap(&mut outcome, Stage::StopServices, self.reaper.reap_services(target));
    record_reap(&mut outcome, Stage::StopProcesses, self.reaper.reap_processes(target));

    if let Err(e) = delete_directory(target) {
      outcome.fail(Stage::Delete, e);
      return outcome;
    }
    outcome.succeed(Stage::Delete);

    self.copy_into(target, &mut outcome);
    outcome
  }

  /// Copy the source over `target` without removing anything first.
  pub fn copy(&self, target: &Path) -> TargetOutcome {
    info!(target = %target.display(), source = %self.source.display(), "copying into directory");
    let mut outcome = TargetOutcome::new(target);
    self.copy_into(target, &mut outcome);
    outcome
  }

  fn copy_into(&self, target: &Path, outcome: &mut TargetOutcome) {
    match copy_directory(&self.source, target) {
      Ok(count) => {
        debug!(target = %target.display(), files = count, "copy complete");
        outcome.succeed(Stage::Copy);
      }
      Err(e) => outcome.fail(Stage::Copy, e),
    }
  }
}

fn record_reap<T>(outcome: &mut TargetOutcome, stage: Stage, result: Result<ReapReport<T>, ReapError>) {
  match result {
    Ok(report) if report.is_success() => {
      debug!(path = %outcome.path.display(), %stage, count = report.reaped.len(), "reaped");
      outcome.succeed(stage);
    }
    Ok(report) => outcome.fail(stage, report.failures.join("; ")),
    Err(e) => outcome.fail(stage, e),
  }
}

/// Remove `path` and everything below it, clearing read-only attributes
/// first. An absent directory counts as deleted.
pub fn delete_directory(path: &Path) -> Result<(), ReplaceError> {
  if !path.exists() {
    debug!(path = %path.display(), "nothing to delete");
    return Ok(());
  }

  info!(path = %path.display(), "deleting directory");
  make_writable(path)?;
  match fs::remove_dir_all(path) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(ReplaceError::Delete {
      path: path.to_path_buf(),
      source: e,
    }),
  }
}

/// Copy every file below `from` into `to`, creating directories as needed
/// and overwriting files that already exist. Returns the number of files
/// copied.
pub fn copy_directory(from: &Path, to: &Path) -> Result<usize, ReplaceError> {
  if !from.is_dir() {
    return Err(ReplaceError::SourceNotFound(from.to_path_buf()));
  }

  let mut copied = 0;
  for entry in WalkDir::new(from).sort_by_file_name().follow_links(true) {
    let entry = entry.map_err(|e| ReplaceError::WalkDir {
      path: from.to_path_buf(),
      source: e,
    })?;
    let Ok(relative) = entry.path().strip_prefix(from) else {
      continue;
    };
    let dest = to.join(relative);

    if entry.file_type().is_dir() {
      fs::create_dir_all(&dest).map_err(|e| ReplaceError::CreateDir {
        path: dest.clone(),
        source: e,
      })?;
      continue;
    }

    // Read-only files from an earlier deployment would reject the write.
    if dest.exists() {
      make_writable(&dest)?;
    }
    fs::copy(entry.path(), &dest).map_err(|e| ReplaceError::Copy {
      from: entry.path().to_path_buf(),
      to: dest.clone(),
      source: e,
    })?;
    copied += 1;
  }

  Ok(copied)
}
