//! Sequencing scan, replace/copy and finalise across target directories.
//!
//! A run validates the whole request up front, so configuration mistakes
//! abort before the filesystem is touched. After that:
//!
//! 1. an optional drift scan; any drift ends the run
//! 2. replace or copy for each target, independently
//! 3. finalise for each target whose pipeline did not fail
//!
//! Failures in one target never stop work on the others.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::platform::paths::{full_path, is_within};
use crate::render::{RenderError, TagDictionary};
use crate::reap::SystemControl;
use crate::replace::{DirectoryReplacer, Stage, TargetOutcome};
use crate::snapshot::{ScanError, ScanReport, finalise, scan};

/// Exit code for a run where every requested stage succeeded.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code when any stage on any target failed.
pub const EXIT_STAGE_FAILED: u8 = 1;
/// Exit code when the scan found drift.
pub const EXIT_DRIFT: u8 = 2;
/// Exit code for configuration and prerequisite errors.
pub const EXIT_CONFIGURATION: u8 = 3;

#[derive(Debug, Error)]
pub enum DeployError {
  #[error("invalid configuration: {0}")]
  Configuration(String),

  #[error("failed to render target list '{input}': {source}")]
  Render {
    input: String,
    #[source]
    source: RenderError,
  },

  #[error("missing prerequisite: {0}")]
  MissingPrerequisite(String),

  #[error("{count} change(s) detected since the last finalise")]
  DriftDetected { count: usize },

  #[error("{failed} of {total} target(s) failed")]
  StageFailed { failed: usize, total: usize },
}

impl DeployError {
  /// Process exit code for this error.
  pub fn exit_code(&self) -> u8 {
    match self {
      Self::Configuration(_) | Self::Render { .. } | Self::MissingPrerequisite(_) => EXIT_CONFIGURATION,
      Self::DriftDetected { .. } => EXIT_DRIFT,
      Self::StageFailed { .. } => EXIT_STAGE_FAILED,
    }
  }
}

/// Destructive operation applied to each target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
  /// Back up, tear down, delete and recreate from the source.
  Replace,
  /// Copy the source over the existing contents.
  Copy,
}

impl Mode {
  /// Resolve the mutually exclusive replace/copy flags.
  pub fn from_flags(replace: bool, copy: bool) -> Result<Option<Self>, DeployError> {
    match (replace, copy) {
      (true, true) => Err(DeployError::Configuration(
        "replace and copy cannot be requested together".to_string(),
      )),
      (true, false) => Ok(Some(Self::Replace)),
      (false, true) => Ok(Some(Self::Copy)),
      (false, false) => Ok(None),
    }
  }
}

/// Everything a single run was asked to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployRequest {
  pub scan_root: Option<PathBuf>,
  pub targets: Vec<PathBuf>,
  pub source: Option<PathBuf>,
  pub mode: Option<Mode>,
  pub finalise: bool,
  pub backups: bool,
}

/// Render raw target lists and split them on `;`.
///
/// Each input may hold several directories; empty segments are dropped.
/// A directory named more than once, under any spelling, is kept only at
/// its first position.
pub fn parse_targets<S: AsRef<str>>(raw: &[S], tags: &TagDictionary) -> Result<Vec<PathBuf>, DeployError> {
  let mut targets: Vec<PathBuf> = Vec::new();
  let mut seen: Vec<PathBuf> = Vec::new();
  for input in raw {
    let input = input.as_ref();
    let rendered = tags.render_list(input).map_err(|e| DeployError::Render {
      input: input.to_string(),
      source: e,
    })?;
    for target in rendered.into_iter().map(PathBuf::from) {
      let qualified = full_path(&target);
      if seen.contains(&qualified) {
        debug!(path = %target.display(), "ignoring repeated target");
        continue;
      }
      seen.push(qualified);
      targets.push(target);
    }
  }
  Ok(targets)
}

impl DeployRequest {
  /// Reject requests that cannot run, before anything is mutated.
  pub fn validate(&self) -> Result<(), DeployError> {
    if self.scan_root.is_none() && self.mode.is_none() && !self.finalise {
      return Err(DeployError::Configuration(
        "nothing to do: request a scan, replace, copy or finalise".to_string(),
      ));
    }

    if let Some(mode) = self.mode {
      if self.targets.is_empty() {
        return Err(DeployError::Configuration(format!(
          "{} requested without target directories",
          mode_name(mode)
        )));
      }
      match &self.source {
        None => {
          return Err(DeployError::MissingPrerequisite(format!(
            "{} requested without a deployment source",
            mode_name(mode)
          )));
        }
        Some(source) if !source.is_dir() => {
          return Err(DeployError::MissingPrerequisite(format!(
            "deployment source does not exist: {}",
            source.display()
          )));
        }
        Some(source) => {
          if let Some(target) = self.targets.iter().find(|t| overlaps(mode, source, t)) {
            return Err(DeployError::MissingPrerequisite(format!(
              "deployment source {} overlaps target {}",
              source.display(),
              target.display()
            )));
          }
        }
      }
    }

    if self.finalise {
      if self.targets.is_empty() {
        return Err(DeployError::Configuration(
          "finalise requested without target directories".to_string(),
        ));
      }
      // With replace/copy the targets are created first, so they are
      // checked at finalise time instead.
      if self.mode.is_none()
        && let Some(missing) = self.targets.iter().find(|t| !t.is_dir())
      {
        return Err(DeployError::MissingPrerequisite(format!(
          "cannot finalise missing directory: {}",
          missing.display()
        )));
      }
    }

    Ok(())
  }
}

/// Whether running `mode` against `target` would read from a tree it is
/// also deleting or writing into.
///
/// Replace deletes the target before copying, so the source may not sit at
/// or below it, nor the target below the source. Copy only writes, so it is
/// safe unless the target is the source or lies inside it.
fn overlaps(mode: Mode, source: &Path, target: &Path) -> bool {
  match mode {
    Mode::Replace => is_within(source, target) || is_within(target, source),
    Mode::Copy => is_within(target, source),
  }
}

fn mode_name(mode: Mode) -> &'static str {
  match mode {
    Mode::Replace => "replace",
    Mode::Copy => "copy",
  }
}

/// Aggregate result of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub scan: Option<ScanReport>,
  pub targets: Vec<TargetOutcome>,
}

impl RunSummary {
  pub fn has_drift(&self) -> bool {
    self.scan.as_ref().is_some_and(ScanReport::has_drift)
  }

  pub fn failed_targets(&self) -> impl Iterator<Item = &TargetOutcome> {
    self.targets.iter().filter(|t| !t.is_success())
  }

  /// The run-level failure, if there was one. Drift takes precedence.
  pub fn error(&self) -> Option<DeployError> {
    if let Some(scan) = self.scan.as_ref().filter(|s| s.has_drift()) {
      return Some(DeployError::DriftDetected {
        count: scan.report.count(),
      });
    }
    let failed = self.failed_targets().count();
    (failed > 0).then(|| DeployError::StageFailed {
      failed,
      total: self.targets.len(),
    })
  }

  pub fn is_success(&self) -> bool {
    self.error().is_none()
  }

  pub fn exit_code(&self) -> u8 {
    self.error().map_or(EXIT_SUCCESS, |e| e.exit_code())
  }

  fn outcome_for(&mut self, target: &Path) -> &mut TargetOutcome {
    match self.targets.iter().position(|t| t.path == target) {
      Some(index) => &mut self.targets[index],
      None => {
        self.targets.push(TargetOutcome::new(target));
        let last = self.targets.len() - 1;
        &mut self.targets[last]
      }
    }
  }
}

/// Drives a validated [`DeployRequest`] to completion.
pub struct Orchestrator<'a, S: SystemControl + ?Sized> {
  system: &'a S,
  tags: &'a TagDictionary,
}

impl<'a, S: SystemControl + ?Sized> Orchestrator<'a, S> {
  pub fn new(system: &'a S, tags: &'a TagDictionary) -> Self {
    Self { system, tags }
  }

  /// Run every requested operation.
  ///
  /// Returns `Err` only when the request is rejected before any work
  /// starts; stage failures and drift are reported in the summary.
  pub fn run(&self, request: &DeployRequest) -> Result<RunSummary, DeployError> {
    request.validate()?;
    let mut summary = RunSummary::default();

    if let Some(root) = &request.scan_root {
      let report = scan(root).map_err(|e| match e {
        ScanError::RootNotFound(path) => {
          DeployError::MissingPrerequisite(format!("scan root does not exist: {}", path.display()))
        }
      })?;
      let drift = report.has_drift();
      summary.scan = Some(report);
      if drift {
        warn!(root = %root.display(), "changes detected, stopping before deployment");
        return Ok(summary);
      }
    }

    if let (Some(mode), Some(source)) = (request.mode, &request.source) {
      let replacer = DirectoryReplacer::new(self.system, source, request.backups);
      for target in &request.targets {
        let outcome = match mode {
          Mode::Replace => replacer.replace(target),
          Mode::Copy => replacer.copy(target),
        };
        summary.targets.push(outcome);
      }
    }

    if request.finalise {
      for target in &request.targets {
        self.finalise_target(target, summary.outcome_for(target));
      }
    }

    info!(
      targets = summary.targets.len(),
      failed = summary.failed_targets().count(),
      "run complete"
    );
    Ok(summary)
  }

  fn finalise_target(&self, target: &Path, outcome: &mut TargetOutcome) {
    if !outcome.is_success() {
      warn!(path = %target.display(), "not finalising directory after failed deployment");
      return;
    }
    if !target.is_dir() {
      outcome.fail(
        Stage::Finalise,
        DeployError::MissingPrerequisite(format!("cannot finalise missing directory: {}", target.display())),
      );
      return;
    }

    info!(path = %target.display(), "finalising directory");
    match finalise(target, self.tags) {
      Ok(commit) => {
        outcome.commit = Some(commit);
        outcome.succeed(Stage::Finalise);
      }
      Err(e) => outcome.fail(Stage::Finalise, e),
    }
  }
}
