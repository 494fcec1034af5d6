//! In-memory [`SystemControl`] for exercising teardown without touching the OS.

use std::cell::RefCell;
use std::collections::HashSet;

use super::{ProcessBinding, ReapError, ServiceBinding, ServiceState, SystemControl};

#[derive(Default)]
pub struct FakeSystem {
  services: RefCell<Vec<(ServiceBinding, ServiceState)>>,
  processes: RefCell<Vec<ProcessBinding>>,
  calls: RefCell<Vec<String>>,
  failing_removals: HashSet<String>,
  failing_enumeration: bool,
}

impl FakeSystem {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_service(self, service: ServiceBinding, state: ServiceState) -> Self {
    self.services.borrow_mut().push((service, state));
    self
  }

  pub fn with_process(self, process: ProcessBinding) -> Self {
    self.processes.borrow_mut().push(process);
    self
  }

  /// Make `remove_service` fail for the named service.
  pub fn failing_removal(mut self, name: &str) -> Self {
    self.failing_removals.insert(name.to_string());
    self
  }

  /// Make `services` and `processes` fail.
  pub fn failing_enumeration(mut self) -> Self {
    self.failing_enumeration = true;
    self
  }

  /// Mutating calls in the order they were made.
  pub fn calls(&self) -> Vec<String> {
    self.calls.borrow().clone()
  }

  pub fn state_of(&self, name: &str) -> ServiceState {
    self
      .services
      .borrow()
      .iter()
      .find(|(s, _)| s.name == name)
      .map(|(_, state)| *state)
      .unwrap_or(ServiceState::Missing)
  }

  fn enumeration_error(&self) -> ReapError {
    ReapError::Command {
      command: "fake enumerate".to_string(),
      code: Some(1),
      stderr: "enumeration disabled".to_string(),
    }
  }
}

impl SystemControl for FakeSystem {
  fn services(&self) -> Result<Vec<ServiceBinding>, ReapError> {
    if self.failing_enumeration {
      return Err(self.enumeration_error());
    }
    Ok(self.services.borrow().iter().map(|(s, _)| s.clone()).collect())
  }

  fn service_state(&self, service: &ServiceBinding) -> Result<ServiceState, ReapError> {
    Ok(self.state_of(&service.name))
  }

  fn stop_service(&self, service: &ServiceBinding) -> Result<(), ReapError> {
    self.calls.borrow_mut().push(format!("stop {}", service.name));
    let mut services = self.services.borrow_mut();
    match services.iter_mut().find(|(s, _)| s.name == service.name) {
      Some((_, state)) => {
        *state = ServiceState::Stopped;
        Ok(())
      }
      None => Err(ReapError::ServiceNotFound(service.name.clone())),
    }
  }

  fn remove_service(&self, service: &ServiceBinding) -> Result<(), ReapError> {
    self.calls.borrow_mut().push(format!("remove {}", service.name));
    if self.failing_removals.contains(&service.name) {
      return Err(ReapError::Command {
        command: format!("fake delete {}", service.name),
        code: Some(5),
        stderr: "access denied".to_string(),
      });
    }
    let mut services = self.services.borrow_mut();
    let before = services.len();
    services.retain(|(s, _)| s.name != service.name);
    if services.len() == before {
      return Err(ReapError::ServiceNotFound(service.name.clone()));
    }
    Ok(())
  }

  fn processes(&self) -> Result<Vec<ProcessBinding>, ReapError> {
    if self.failing_enumeration {
      return Err(self.enumeration_error());
    }
    Ok(self.processes.borrow().clone())
  }

  fn terminate(&self, process: &ProcessBinding) -> Result<(), ReapError> {
    self.calls.borrow_mut().push(format!("terminate {}", process.pid));
    let mut processes = self.processes.borrow_mut();
    let before = processes.len();
    processes.retain(|p| p.pid != process.pid);
    if processes.len() == before {
      return Err(ReapError::ProcessNotFound(process.pid));
    }
    Ok(())
  }
}
