//! Per-directory snapshots: finalising a deployed tree and detecting drift.

mod scan;
mod storage;
mod types;

use std::path::Path;

use tracing::warn;

use crate::render::TagDictionary;

pub use scan::{ScanError, ScanReport, scan};
pub use storage::{CommitSummary, OpenedRepository, SnapshotStore, is_repository_root};
pub use types::{DriftKind, DriftRecord, DriftReport, SnapshotError};

/// Commit message template rendered for every finalise.
pub const FINALISE_MESSAGE: &str = "Package {{ PackageNameAndVersion }} has finalised directory";

/// Message used when [`FINALISE_MESSAGE`] cannot be rendered.
pub const FALLBACK_MESSAGE: &str = "Unknown package has finalised directory";

/// Build the commit message for finalising `dir`.
///
/// Rendering failures degrade to a message that still names the directory.
pub fn finalise_message(dir: &Path, tags: &TagDictionary) -> String {
  match tags.render(FINALISE_MESSAGE) {
    Ok(rendered) => format!("{} {}", rendered, dir.display()),
    Err(e) => {
      warn!(path = %dir.display(), error = %e, "could not render finalise message, using fallback");
      format!("{} {}", FALLBACK_MESSAGE, dir.display())
    }
  }
}

/// Record a new baseline snapshot of `dir`.
pub fn finalise(dir: &Path, tags: &TagDictionary) -> Result<CommitSummary, SnapshotError> {
  SnapshotStore::new(dir).commit(&finalise_message(dir, tags))
}
