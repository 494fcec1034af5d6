//! Service control through the Windows service control manager.
//!
//! Services are enumerated through CIM, which exposes each service's
//! configured command line, and driven with `sc.exe`.

#![cfg_attr(not(windows), allow(dead_code))]

use std::thread;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, trace};

use super::native::{command_error, run};
use super::{ReapError, ServiceBinding, ServiceState};

const POWERSHELL: &str = "powershell.exe";
const SC: &str = "sc.exe";

const LIST_SCRIPT: &str =
  "Get-CimInstance Win32_Service | Select-Object Name,DisplayName,PathName,State | ConvertTo-Json -Compress";

const ERROR_SERVICE_DOES_NOT_EXIST: i32 = 1060;
const ERROR_SERVICE_CANNOT_ACCEPT_CTRL: i32 = 1061;
const ERROR_SERVICE_NOT_ACTIVE: i32 = 1062;
const ERROR_SERVICE_MARKED_FOR_DELETE: i32 = 1072;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CimService {
  name: String,
  display_name: Option<String>,
  path_name: Option<String>,
}

/// `ConvertTo-Json` emits a bare object when there is exactly one result.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CimOutput {
  Many(Vec<CimService>),
  One(CimService),
}

pub fn list() -> Result<Vec<ServiceBinding>, ReapError> {
  let args = ["-NoProfile", "-NonInteractive", "-Command", LIST_SCRIPT];
  let output = run(POWERSHELL, &args)?;
  if !output.status.success() {
    return Err(command_error(POWERSHELL, &args, &output));
  }
  let services = parse_services(&String::from_utf8_lossy(&output.stdout))?;
  debug!(count = services.len(), "enumerated windows services");
  Ok(services)
}

pub fn state(name: &str) -> Result<ServiceState, ReapError> {
  let args = ["query", name];
  let output = run(SC, &args)?;
  match output.status.code() {
    Some(0) => Ok(parse_query_state(&String::from_utf8_lossy(&output.stdout))),
    Some(ERROR_SERVICE_DOES_NOT_EXIST) => Ok(ServiceState::Missing),
    _ => Err(command_error(SC, &args, &output)),
  }
}

/// Request a stop and poll until the service reports stopped.
///
/// There is no timeout: a service that never stops blocks the caller.
pub fn stop(name: &str) -> Result<(), ReapError> {
  let args = ["stop", name];
  let output = run(SC, &args)?;
  match output.status.code() {
    Some(0 | ERROR_SERVICE_NOT_ACTIVE | ERROR_SERVICE_CANNOT_ACCEPT_CTRL) => {}
    Some(ERROR_SERVICE_DOES_NOT_EXIST) => return Err(ReapError::ServiceNotFound(name.to_string())),
    _ => return Err(command_error(SC, &args, &output)),
  }

  loop {
    match state(name)? {
      ServiceState::Stopped => return Ok(()),
      ServiceState::Missing => return Err(ReapError::ServiceNotFound(name.to_string())),
      ServiceState::Running => {
        trace!(service = name, "waiting for service to stop");
        thread::sleep(POLL_INTERVAL);
      }
    }
  }
}

pub fn remove(name: &str) -> Result<(), ReapError> {
  let args = ["delete", name];
  let output = run(SC, &args)?;
  match output.status.code() {
    Some(0 | ERROR_SERVICE_MARKED_FOR_DELETE) => Ok(()),
    Some(ERROR_SERVICE_DOES_NOT_EXIST) => Err(ReapError::ServiceNotFound(name.to_string())),
    _ => Err(command_error(SC, &args, &output)),
  }
}

pub(super) fn parse_services(json: &str) -> Result<Vec<ServiceBinding>, ReapError> {
  let json = json.trim();
  if json.is_empty() {
    return Ok(Vec::new());
  }
  let parsed: CimOutput = serde_json::from_str(json).map_err(|e| ReapError::Parse {
    what: "service list",
    message: e.to_string(),
  })?;
  let services = match parsed {
    CimOutput::Many(services) => services,
    CimOutput::One(service) => vec![service],
  };
  Ok(
    services
      .into_iter()
      .map(|s| ServiceBinding {
        display_name: s.display_name.unwrap_or_else(|| s.name.clone()),
        executable_path: s.path_name.unwrap_or_default(),
        name: s.name,
      })
      .collect(),
  )
}

/// Read the `STATE` line of `sc query` output. Pending states count as running.
pub(super) fn parse_query_state(output: &str) -> ServiceState {
  output
    .lines()
    .find(|line| line.trim_start().starts_with("STATE"))
    .map(|line| {
      if line.contains("STOPPED") {
        ServiceState::Stopped
      } else {
        ServiceState::Running
      }
    })
    .unwrap_or(ServiceState::Running)
}
