//! Discovering and tearing down OS services and processes bound to a directory.
//!
//! Before a deployment directory is deleted, anything still executing from
//! it must go: services are stopped through their manager and unregistered,
//! then any remaining processes are killed. OS state is queried live on
//! every call; nothing is cached.
//!
//! All OS access goes through [`SystemControl`] so the teardown logic in
//! [`Reaper`] can run against a fake in tests.

mod native;
mod systemd;
#[cfg(test)]
pub(crate) mod testing;
mod windows;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::platform::paths::{contains_ignore_case, full_path, is_within};

pub use native::NativeSystem;

/// A registered OS service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceBinding {
  /// Name used to address the service manager.
  pub name: String,
  pub display_name: String,
  /// Configured command line or executable path.
  pub executable_path: String,
}

/// A running OS process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessBinding {
  pub pid: u32,
  pub name: String,
  pub executable_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
  Running,
  Stopped,
  /// No longer registered with the service manager.
  Missing,
}

#[derive(Debug, Error)]
pub enum ReapError {
  #[error("failed to run '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  #[error("'{command}' failed with exit code {code:?}: {stderr}")]
  Command {
    command: String,
    code: Option<i32>,
    stderr: String,
  },

  #[error("failed to parse {what}: {message}")]
  Parse { what: &'static str, message: String },

  #[error("service not found: {0}")]
  ServiceNotFound(String),

  #[error("process {0} not found")]
  ProcessNotFound(u32),

  #[error("failed to terminate process {pid}: {message}")]
  Terminate { pid: u32, message: String },
}

/// Narrow capability interface over the OS service manager and process table.
pub trait SystemControl {
  /// Every registered service.
  fn services(&self) -> Result<Vec<ServiceBinding>, ReapError>;

  fn service_state(&self, service: &ServiceBinding) -> Result<ServiceState, ReapError>;

  /// Stop a service, blocking until the service manager reports it stopped.
  fn stop_service(&self, service: &ServiceBinding) -> Result<(), ReapError>;

  /// Permanently unregister a stopped service.
  fn remove_service(&self, service: &ServiceBinding) -> Result<(), ReapError>;

  /// Every running process whose executable path is known.
  fn processes(&self) -> Result<Vec<ProcessBinding>, ReapError>;

  /// Kill a process, blocking until it has exited.
  fn terminate(&self, process: &ProcessBinding) -> Result<(), ReapError>;
}

/// Outcome of reaping one kind of entity under a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReapReport<T> {
  pub reaped: Vec<T>,
  /// Human-readable failure per entity that could not be torn down.
  pub failures: Vec<String>,
}

impl<T> Default for ReapReport<T> {
  fn default() -> Self {
    Self {
      reaped: Vec::new(),
      failures: Vec::new(),
    }
  }
}

impl<T> ReapReport<T> {
  pub fn is_success(&self) -> bool {
    self.failures.is_empty()
  }
}

impl fmt::Display for ServiceBinding {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.display_name.is_empty() || self.display_name == self.name {
      write!(f, "{}", self.name)
    } else {
      write!(f, "{} ({})", self.display_name, self.name)
    }
  }
}

impl fmt::Display for ProcessBinding {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} (PID {})", self.name, self.pid)
  }
}

/// Finds and tears down services and processes rooted under a directory.
pub struct Reaper<'a, S: SystemControl + ?Sized> {
  system: &'a S,
}

impl<'a, S: SystemControl + ?Sized> Reaper<'a, S> {
  pub fn new(system: &'a S) -> Self {
    Self { system }
  }

  /// Services whose configured executable path contains `dir`, ignoring case.
  ///
  /// The fully-qualified form is always tried. An absolute `dir` is also
  /// tried as spelled, so either form in the service configuration matches.
  /// A relative spelling is never used on its own: a bare name would match
  /// any service whose command line happens to contain it.
  pub fn find_services_under(&self, dir: &Path) -> Result<Vec<ServiceBinding>, ReapError> {
    let qualified = trim_separators(&full_path(dir).to_string_lossy()).to_string();
    let given = dir
      .is_absolute()
      .then(|| trim_separators(&dir.to_string_lossy()).to_string());

    Ok(
      self
        .system
        .services()?
        .into_iter()
        .filter(|svc| {
          contains_ignore_case(&svc.executable_path, &qualified)
            || given
              .as_deref()
              .is_some_and(|given| contains_ignore_case(&svc.executable_path, given))
        })
        .collect(),
    )
  }

  /// Processes whose fully-qualified executable lies under `dir`.
  ///
  /// The current process is never included.
  pub fn find_processes_under(&self, dir: &Path) -> Result<Vec<ProcessBinding>, ReapError> {
    let own_pid = std::process::id();
    Ok(
      self
        .system
        .processes()?
        .into_iter()
        .filter(|p| p.pid != own_pid && is_within(&p.executable_path, dir))
        .collect(),
    )
  }

  /// Stop a service if it is running, then unregister it.
  ///
  /// A service that disappears at any point counts as removed.
  pub fn stop_and_remove(&self, service: &ServiceBinding) -> Result<(), ReapError> {
    match self.system.service_state(service) {
      Ok(ServiceState::Missing) | Err(ReapError::ServiceNotFound(_)) => {
        debug!(service = %service, "service already removed");
        return Ok(());
      }
      Ok(ServiceState::Running) => {
        info!(service = %service, "stopping service");
        match self.system.stop_service(service) {
          Ok(()) => {}
          Err(ReapError::ServiceNotFound(_)) => return Ok(()),
          Err(e) => return Err(e),
        }
      }
      Ok(ServiceState::Stopped) => {}
      Err(e) => return Err(e),
    }

    info!(service = %service, "uninstalling service");
    match self.system.remove_service(service) {
      Ok(()) | Err(ReapError::ServiceNotFound(_)) => Ok(()),
      Err(e) => Err(e),
    }
  }

  /// Kill a process and wait for it to exit. A process that has already
  /// exited counts as terminated.
  pub fn terminate(&self, process: &ProcessBinding) -> Result<(), ReapError> {
    info!(process = %process, path = %process.executable_path.display(), "terminating process");
    match self.system.terminate(process) {
      Ok(()) | Err(ReapError::ProcessNotFound(_)) => Ok(()),
      Err(e) => Err(e),
    }
  }

  /// Stop and remove every service bound to `dir`, continuing past failures.
  pub fn reap_services(&self, dir: &Path) -> Result<ReapReport<ServiceBinding>, ReapError> {
    let mut report = ReapReport::default();
    for service in self.find_services_under(dir)? {
      match self.stop_and_remove(&service) {
        Ok(()) => report.reaped.push(service),
        Err(e) => {
          warn!(service = %service, error = %e, "failed to remove service");
          report.failures.push(format!("{}: {}", service, e));
        }
      }
    }
    Ok(report)
  }

  /// Terminate every process running from `dir`, continuing past failures.
  pub fn reap_processes(&self, dir: &Path) -> Result<ReapReport<ProcessBinding>, ReapError> {
    let mut report = ReapReport::default();
    for process in self.find_processes_under(dir)? {
      match self.terminate(&process) {
        Ok(()) => report.reaped.push(process),
        Err(e) => {
          warn!(process = %process, error = %e, "failed to terminate process");
          report.failures.push(format!("{}: {}", process, e));
        }
      }
    }
    Ok(report)
  }
}

fn trim_separators(path: &str) -> &str {
  let trimmed = path.trim_end_matches(['/', '\\']);
  if trimmed.is_empty() { path } else { trimmed }
}
