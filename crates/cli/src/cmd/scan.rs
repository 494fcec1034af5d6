//! Implementation of the `ensconce scan` command.

use std::path::Path;

use anyhow::Result;

use ensconce_lib::deploy::{DeployRequest, Orchestrator};
use ensconce_lib::reap::NativeSystem;
use ensconce_lib::render::TagDictionary;

use super::report::print_summary;
use crate::output::{OutputFormat, print_json};

/// Scan `root` for drift. Exits non-zero when anything changed.
pub fn cmd_scan(root: &Path, output: OutputFormat) -> Result<u8> {
  let request = DeployRequest {
    scan_root: Some(root.to_path_buf()),
    ..Default::default()
  };
  let tags = TagDictionary::default();
  let summary = Orchestrator::new(&NativeSystem::new(), &tags).run(&request)?;

  match (&summary.scan, output.is_json()) {
    (Some(scan), true) => print_json(scan)?,
    _ => print_summary(&summary),
  }

  Ok(summary.exit_code())
}
