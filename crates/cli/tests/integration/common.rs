//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Isolated test environment.
///
/// Each test gets its own temporary directory holding deployment sources,
/// targets and backup archives.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// Absolute path below the temp directory.
  pub fn path(&self, relative: &str) -> PathBuf {
    self.temp.path().join(relative)
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.path(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn read_file(&self, relative_path: &str) -> String {
    std::fs::read_to_string(self.path(relative_path)).unwrap()
  }

  /// Get a pre-configured Command for the ensconce binary.
  ///
  /// Clears inherited configuration and provides the package tag used in
  /// finalise commit messages.
  pub fn ensconce_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("ensconce");
    cmd.env_remove("ENSCONCE_NO_BACKUP");
    cmd.env_remove("ENSCONCE_TAGS_FILE");
    cmd.env_remove("RUST_LOG");
    cmd.env("PackageNameAndVersion", "TestApp 1.0.0");
    cmd.current_dir(self.temp.path());
    cmd
  }

  /// Finalise `dir` through the CLI, asserting success.
  pub fn finalise(&self, dir: &Path) {
    self
      .ensconce_cmd()
      .arg("finalise")
      .arg("-t")
      .arg(dir)
      .assert()
      .success();
  }
}
