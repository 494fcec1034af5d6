//! [`SystemControl`] backed by the host's service manager and process table.

use std::process::{Command, Output};

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System, UpdateKind};
use tracing::{debug, trace};

use super::{ProcessBinding, ReapError, ServiceBinding, ServiceState, SystemControl};

#[cfg(target_os = "linux")]
use super::systemd as services;
#[cfg(windows)]
use super::windows as services;
#[cfg(not(any(target_os = "linux", windows)))]
use unsupported as services;

/// The live operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeSystem;

impl NativeSystem {
  pub fn new() -> Self {
    Self
  }
}

impl SystemControl for NativeSystem {
  fn services(&self) -> Result<Vec<ServiceBinding>, ReapError> {
    services::list()
  }

  fn service_state(&self, service: &ServiceBinding) -> Result<ServiceState, ReapError> {
    services::state(&service.name)
  }

  fn stop_service(&self, service: &ServiceBinding) -> Result<(), ReapError> {
    services::stop(&service.name)
  }

  fn remove_service(&self, service: &ServiceBinding) -> Result<(), ReapError> {
    services::remove(&service.name)
  }

  fn processes(&self) -> Result<Vec<ProcessBinding>, ReapError> {
    let system = System::new_with_specifics(RefreshKind::nothing().with_processes(exe_refresh()));
    let mut processes: Vec<ProcessBinding> = system
      .processes()
      .iter()
      .filter_map(|(pid, process)| {
        let exe = process.exe()?;
        Some(ProcessBinding {
          pid: pid.as_u32(),
          name: process.name().to_string_lossy().into_owned(),
          executable_path: exe.to_path_buf(),
        })
      })
      .collect();
    processes.sort_by_key(|p| p.pid);
    trace!(count = processes.len(), "enumerated processes");
    Ok(processes)
  }

  fn terminate(&self, process: &ProcessBinding) -> Result<(), ReapError> {
    let pid = Pid::from_u32(process.pid);
    let mut system = System::new();
    system.refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), true, exe_refresh());

    // The pid may have been reused since enumeration.
    let Some(target) = system
      .process(pid)
      .filter(|p| p.exe() == Some(process.executable_path.as_path()))
    else {
      return Err(ReapError::ProcessNotFound(process.pid));
    };

    if target.kill() {
      target.wait();
      debug!(pid = process.pid, "process exited");
      return Ok(());
    }

    system.refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), true, exe_refresh());
    if system.process(pid).is_none() {
      return Err(ReapError::ProcessNotFound(process.pid));
    }
    Err(ReapError::Terminate {
      pid: process.pid,
      message: "kill signal was not delivered".to_string(),
    })
  }
}

fn exe_refresh() -> ProcessRefreshKind {
  ProcessRefreshKind::nothing().with_exe(UpdateKind::Always)
}

/// Run a command to completion, capturing its output.
///
/// A non-zero exit status is not an error here; callers interpret codes.
pub(super) fn run(program: &str, args: &[&str]) -> Result<Output, ReapError> {
  trace!(program, ?args, "running command");
  Command::new(program).args(args).output().map_err(|e| ReapError::Spawn {
    program: program.to_string(),
    source: e,
  })
}

/// Turn a failed [`Output`] into a [`ReapError::Command`].
pub(super) fn command_error(program: &str, args: &[&str], output: &Output) -> ReapError {
  ReapError::Command {
    command: format!("{} {}", program, args.join(" ")),
    code: output.status.code(),
    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
  }
}

#[cfg(not(any(target_os = "linux", windows)))]
mod unsupported {
  use super::{ReapError, ServiceBinding, ServiceState};

  pub fn list() -> Result<Vec<ServiceBinding>, ReapError> {
    tracing::debug!("no supported service manager on this platform");
    Ok(Vec::new())
  }

  pub fn state(_name: &str) -> Result<ServiceState, ReapError> {
    Ok(ServiceState::Missing)
  }

  pub fn stop(name: &str) -> Result<(), ReapError> {
    Err(ReapError::ServiceNotFound(name.to_string()))
  }

  pub fn remove(name: &str) -> Result<(), ReapError> {
    Err(ReapError::ServiceNotFound(name.to_string()))
  }
}
