//! Implementation of the `ensconce finalise` command.

use std::path::Path;

use anyhow::{Context, Result};

use ensconce_lib::deploy::{DeployRequest, Orchestrator, parse_targets};
use ensconce_lib::reap::NativeSystem;
use ensconce_lib::render::TagDictionary;

use super::report::print_summary;
use crate::output::{OutputFormat, print_json};

/// Commit the current state of every target as its new baseline.
pub fn cmd_finalise(targets: &[String], tags_file: Option<&Path>, output: OutputFormat) -> Result<u8> {
  let tags = TagDictionary::load(tags_file).context("Failed to load tags")?;
  let request = DeployRequest {
    targets: parse_targets(targets, &tags)?,
    finalise: true,
    ..Default::default()
  };

  let summary = Orchestrator::new(&NativeSystem::new(), &tags).run(&request)?;

  if output.is_json() {
    print_json(&summary)?;
  } else {
    print_summary(&summary);
  }

  Ok(summary.exit_code())
}
