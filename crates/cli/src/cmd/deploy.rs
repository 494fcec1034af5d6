//! Implementation of the `ensconce deploy` command.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};

use ensconce_lib::deploy::{DeployRequest, Mode, Orchestrator, parse_targets};
use ensconce_lib::reap::NativeSystem;
use ensconce_lib::render::TagDictionary;

use super::report::print_summary;
use crate::output::{OutputFormat, format_duration, print_json, print_stat};

/// Flags of a deploy invocation, already merged with environment settings.
pub struct DeployOptions {
  pub scan_root: Option<PathBuf>,
  pub targets: Vec<String>,
  pub source: Option<PathBuf>,
  pub replace: bool,
  pub copy: bool,
  pub finalise: bool,
  pub backups: bool,
  pub output: OutputFormat,
}

/// Execute the deploy command.
///
/// Builds a [`DeployRequest`] from the flags, runs it against the live
/// system and returns the process exit code.
pub fn cmd_deploy(options: DeployOptions, tags_file: Option<&Path>) -> Result<u8> {
  let start = Instant::now();
  let tags = TagDictionary::load(tags_file).context("Failed to load tags")?;

  let request = DeployRequest {
    scan_root: options.scan_root,
    targets: parse_targets(&options.targets, &tags)?,
    source: options.source,
    mode: Mode::from_flags(options.replace, options.copy)?,
    finalise: options.finalise,
    backups: options.backups,
  };

  let summary = Orchestrator::new(&NativeSystem::new(), &tags).run(&request)?;

  if options.output.is_json() {
    print_json(&summary)?;
  } else {
    print_summary(&summary);
    print_stat("Duration", &format_duration(start.elapsed()));
  }

  Ok(summary.exit_code())
}
