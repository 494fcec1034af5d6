//! Service control through `systemctl`.
//!
//! Only the output parsers are platform independent; the command wrappers
//! are used by [`super::NativeSystem`] on Linux.

#![cfg_attr(not(target_os = "linux"), allow(dead_code))]

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use super::native::{command_error, run};
use super::{ReapError, ServiceBinding, ServiceState};

const SYSTEMCTL: &str = "systemctl";

/// Exit code for operations on a unit that is not loaded.
const EXIT_NOT_LOADED: i32 = 5;

/// Units queried per `systemctl show` invocation.
const SHOW_BATCH: usize = 64;

/// `true` when the host was booted with systemd as init.
fn booted() -> bool {
  Path::new("/run/systemd/system").is_dir()
}

pub fn list() -> Result<Vec<ServiceBinding>, ReapError> {
  if !booted() {
    debug!("systemd is not running, no services to inspect");
    return Ok(Vec::new());
  }

  let mut units = BTreeSet::new();
  for args in [
    ["list-unit-files", "--type=service", "--no-legend", "--no-pager", "--plain"].as_slice(),
    ["list-units", "--type=service", "--all", "--no-legend", "--no-pager", "--plain"].as_slice(),
  ] {
    let output = run(SYSTEMCTL, args)?;
    if !output.status.success() {
      return Err(command_error(SYSTEMCTL, args, &output));
    }
    units.extend(parse_unit_names(&String::from_utf8_lossy(&output.stdout)));
  }

  let units: Vec<String> = units.into_iter().collect();
  let mut services = Vec::new();
  for batch in units.chunks(SHOW_BATCH) {
    let mut args = vec!["show", "--no-pager", "--property=Id,Description,ExecStart"];
    args.extend(batch.iter().map(String::as_str));
    let output = run(SYSTEMCTL, &args)?;
    if !output.status.success() {
      return Err(command_error(SYSTEMCTL, &args, &output));
    }
    services.extend(parse_show(&String::from_utf8_lossy(&output.stdout)));
  }

  debug!(count = services.len(), "enumerated systemd services");
  Ok(services)
}

pub fn state(name: &str) -> Result<ServiceState, ReapError> {
  let properties = show(name, "LoadState,ActiveState")?;
  Ok(parse_state(&properties))
}

pub fn stop(name: &str) -> Result<(), ReapError> {
  // `systemctl stop` waits for the stop job to finish.
  let args = ["stop", name];
  let output = run(SYSTEMCTL, &args)?;
  match output.status.code() {
    Some(0) => Ok(()),
    Some(EXIT_NOT_LOADED) => Err(ReapError::ServiceNotFound(name.to_string())),
    _ => Err(command_error(SYSTEMCTL, &args, &output)),
  }
}

pub fn remove(name: &str) -> Result<(), ReapError> {
  let properties = show(name, "LoadState,FragmentPath")?;
  if properties.get("LoadState").map(String::as_str) == Some("not-found") {
    return Err(ReapError::ServiceNotFound(name.to_string()));
  }

  let args = ["disable", name];
  let output = run(SYSTEMCTL, &args)?;
  if !output.status.success() {
    // Static and generated units cannot be disabled but can still be removed.
    warn!(service = name, error = %command_error(SYSTEMCTL, &args, &output), "failed to disable service");
  }

  if let Some(fragment) = properties.get("FragmentPath").filter(|p| !p.is_empty()) {
    debug!(service = name, path = %fragment, "removing unit file");
    if let Err(e) = fs::remove_file(fragment)
      && e.kind() != std::io::ErrorKind::NotFound
    {
      return Err(ReapError::Command {
        command: format!("remove {}", fragment),
        code: None,
        stderr: e.to_string(),
      });
    }
  }

  let args = ["daemon-reload"];
  let output = run(SYSTEMCTL, &args)?;
  if !output.status.success() {
    return Err(command_error(SYSTEMCTL, &args, &output));
  }

  reset_failed(name);
  Ok(())
}

/// Clear any lingering failed state. The unit is already gone, so a failure
/// here is only worth a debug line.
fn reset_failed(name: &str) {
  let args = ["reset-failed", name];
  let result = run(SYSTEMCTL, &args).and_then(|output| {
    if output.status.success() {
      Ok(())
    } else {
      Err(command_error(SYSTEMCTL, &args, &output))
    }
  });
  note_reset_failed(name, result);
}

fn note_reset_failed(name: &str, result: Result<(), ReapError>) {
  if let Err(e) = result {
    debug!(service = name, error = %e, "failed to reset failed state");
  }
}

fn show(name: &str, properties: &str) -> Result<HashMap<String, String>, ReapError> {
  let property_arg = format!("--property={}", properties);
  let args = ["show", "--no-pager", property_arg.as_str(), name];
  let output = run(SYSTEMCTL, &args)?;
  if !output.status.success() {
    return Err(command_error(SYSTEMCTL, &args, &output));
  }
  Ok(parse_properties(&String::from_utf8_lossy(&output.stdout)))
}

/// Unit names from `list-unit-files`/`list-units` output, skipping templates.
pub(super) fn parse_unit_names(output: &str) -> Vec<String> {
  output
    .lines()
    .filter_map(|line| line.split_whitespace().next())
    .filter(|unit| unit.ends_with(".service") && !unit.ends_with("@.service"))
    .map(String::from)
    .collect()
}

/// `Key=Value` lines of a single unit.
pub(super) fn parse_properties(block: &str) -> HashMap<String, String> {
  block
    .lines()
    .filter_map(|line| line.split_once('='))
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Bindings from multi-unit `show` output, where units are separated by
/// blank lines. Units without an `ExecStart` are skipped.
pub(super) fn parse_show(output: &str) -> Vec<ServiceBinding> {
  output
    .split("\n\n")
    .map(parse_properties)
    .filter_map(|props| {
      let name = props.get("Id")?.clone();
      let exec = props.get("ExecStart").filter(|v| !v.is_empty())?;
      Some(ServiceBinding {
        display_name: props.get("Description").cloned().unwrap_or_else(|| name.clone()),
        executable_path: exec_path(exec).to_string(),
        name,
      })
    })
    .collect()
}

/// The `path=` field of an `ExecStart` property, or the raw value when the
/// property is not in structured form.
pub(super) fn exec_path(exec_start: &str) -> &str {
  exec_start
    .split(';')
    .map(|field| field.trim().trim_start_matches('{').trim())
    .find_map(|field| field.strip_prefix("path="))
    .map(str::trim)
    .unwrap_or(exec_start)
}

pub(super) fn parse_state(properties: &HashMap<String, String>) -> ServiceState {
  if properties.get("LoadState").map(String::as_str) == Some("not-found") {
    return ServiceState::Missing;
  }
  match properties.get("ActiveState").map(String::as_str) {
    Some("active" | "activating" | "reloading" | "deactivating" | "refreshing") => ServiceState::Running,
    _ => ServiceState::Stopped,
  }
}
