//! Terminal output for the CLI.
//!
//! Every human-readable line is a [`Status`] symbol followed by a message.
//! Progress goes to stdout and is silenced by `--quiet`; warnings and errors
//! go to stderr and are always shown. Drift lines are the exception: they are
//! results, so they stay on stdout even when quiet.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{AnsiColors, OwoColorize, Stream};

static QUIET: AtomicBool = AtomicBool::new(false);

pub fn set_quiet(quiet: bool) {
  QUIET.store(quiet, Ordering::Relaxed);
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
}

/// Kind of status line, deciding symbol, color and stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
  Success,
  Info,
  Change,
  Warning,
  Error,
}

impl Status {
  fn symbol(self) -> &'static str {
    match self {
      Status::Success => symbols::SUCCESS,
      Status::Info => symbols::INFO,
      Status::Change | Status::Warning => symbols::WARNING,
      Status::Error => symbols::ERROR,
    }
  }

  fn color(self) -> AnsiColors {
    match self {
      Status::Success => AnsiColors::Green,
      Status::Info => AnsiColors::Blue,
      Status::Change | Status::Warning => AnsiColors::Yellow,
      Status::Error => AnsiColors::Red,
    }
  }

  fn to_stderr(self) -> bool {
    matches!(self, Status::Warning | Status::Error)
  }

  fn suppressed_when_quiet(self) -> bool {
    matches!(self, Status::Success | Status::Info)
  }
}

fn status_line(status: Status, message: &str) {
  if status.suppressed_when_quiet() && QUIET.load(Ordering::Relaxed) {
    return;
  }
  let color = status.color();
  if status.to_stderr() {
    // Problems are colored in full so they stand out among log lines.
    eprintln!(
      "{} {}",
      status.symbol().if_supports_color(Stream::Stderr, |s| s.color(color)),
      message.if_supports_color(Stream::Stderr, |s| s.color(color))
    );
  } else {
    println!(
      "{} {}",
      status.symbol().if_supports_color(Stream::Stdout, |s| s.color(color)),
      message
    );
  }
}

pub fn print_success(message: &str) {
  status_line(Status::Success, message);
}

pub fn print_info(message: &str) {
  status_line(Status::Info, message);
}

/// A drift line.
pub fn print_change(message: &str) {
  status_line(Status::Change, message);
}

pub fn print_warning(message: &str) {
  status_line(Status::Warning, message);
}

pub fn print_error(message: &str) {
  status_line(Status::Error, message);
}

/// An indented `label: value` line under the preceding status line.
pub fn print_stat(label: &str, value: &str) {
  if QUIET.load(Ordering::Relaxed) {
    return;
  }
  println!("  {}: {}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()), value);
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// Commit ids are shown abbreviated, like `git log --oneline`.
pub fn truncate_hash(hash: &str) -> &str {
  hash.get(..12).unwrap_or(hash)
}

/// Archive sizes in binary units with one decimal.
pub fn format_bytes(bytes: u64) -> String {
  const UNITS: [&str; 3] = ["KB", "MB", "GB"];

  if bytes < 1024 {
    return format!("{} B", bytes);
  }
  let mut value = bytes as f64 / 1024.0;
  let mut unit = 0;
  while value >= 1024.0 && unit + 1 < UNITS.len() {
    value /= 1024.0;
    unit += 1;
  }
  format!("{:.1} {}", value, UNITS[unit])
}

pub fn format_duration(duration: Duration) -> String {
  match duration.as_secs() {
    0 => format!("{}ms", duration.subsec_millis()),
    secs @ 1..60 => format!("{}.{:02}s", secs, duration.subsec_millis() / 10),
    secs => format!("{}m {}s", secs / 60, secs % 60),
  }
}
