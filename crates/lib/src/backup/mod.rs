//! Zip snapshots of a directory taken before it is replaced.
//!
//! The archive lands next to the directory as `<name>.old.zip` and holds
//! every file below it under its relative path, with the file's size and
//! last-modified time. An existing archive of the same name is overwritten.

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Datelike, Local, Timelike};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::platform::paths::backup_path;
use crate::util::tree::{TreeFile, all_files};

const PARTIAL_SUFFIX: &str = ".partial";

#[derive(Debug, Error)]
pub enum ArchiveError {
  #[error("cannot derive a backup location for {0}")]
  InvalidPath(PathBuf),

  #[error("failed to traverse directory {path}: {source}")]
  WalkDir {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("I/O error on '{path}': {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write archive '{path}': {source}")]
  Zip {
    path: PathBuf,
    #[source]
    source: zip::result::ZipError,
  },
}

/// What a completed backup wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupSummary {
  pub archive: PathBuf,
  pub file_count: usize,
  /// Uncompressed bytes across all entries.
  pub total_bytes: u64,
}

/// Archive `dir` to its sibling `.old.zip`.
///
/// Returns `Ok(None)` without touching anything when backups are disabled
/// or `dir` does not exist.
pub fn backup(dir: &Path, enabled: bool) -> Result<Option<BackupSummary>, ArchiveError> {
  if !enabled {
    debug!(path = %dir.display(), "backups disabled, skipping");
    return Ok(None);
  }
  if !dir.is_dir() {
    debug!(path = %dir.display(), "nothing to back up");
    return Ok(None);
  }

  let archive = backup_path(dir).ok_or_else(|| ArchiveError::InvalidPath(dir.to_path_buf()))?;
  let mut partial = archive.clone().into_os_string();
  partial.push(PARTIAL_SUFFIX);
  let partial = PathBuf::from(partial);

  info!(path = %dir.display(), archive = %archive.display(), "backing up directory");

  let result = write_archive(dir, &partial).and_then(|(file_count, total_bytes)| {
    fs::rename(&partial, &archive).map_err(|e| ArchiveError::Io {
      path: archive.clone(),
      source: e,
    })?;
    Ok(BackupSummary {
      archive: archive.clone(),
      file_count,
      total_bytes,
    })
  });

  match result {
    Ok(summary) => {
      info!(
        archive = %summary.archive.display(),
        files = summary.file_count,
        bytes = summary.total_bytes,
        "backup complete"
      );
      Ok(Some(summary))
    }
    Err(e) => {
      let _ = fs::remove_file(&partial);
      Err(e)
    }
  }
}

fn write_archive(dir: &Path, target: &Path) -> Result<(usize, u64), ArchiveError> {
  let zip_err = |e: zip::result::ZipError| ArchiveError::Zip {
    path: target.to_path_buf(),
    source: e,
  };

  let file = File::create(target).map_err(|e| ArchiveError::Io {
    path: target.to_path_buf(),
    source: e,
  })?;
  let mut writer = ZipWriter::new(BufWriter::new(file));

  let mut file_count = 0;
  let mut total_bytes = 0;

  for entry in all_files(dir) {
    let entry = entry.map_err(|e| ArchiveError::WalkDir {
      path: dir.to_path_buf(),
      source: e,
    })?;
    let Some(written) = add_file(&mut writer, &entry).map_err(|e| match e {
      EntryError::Io(source) => ArchiveError::Io {
        path: entry.path.clone(),
        source,
      },
      EntryError::Zip(source) => zip_err(source),
    })?
    else {
      continue;
    };
    file_count += 1;
    total_bytes += written;
  }

  let mut inner = writer.finish().map_err(zip_err)?;
  io::Write::flush(&mut inner).map_err(|e| ArchiveError::Io {
    path: target.to_path_buf(),
    source: e,
  })?;

  Ok((file_count, total_bytes))
}

enum EntryError {
  Io(io::Error),
  Zip(zip::result::ZipError),
}

impl From<io::Error> for EntryError {
  fn from(e: io::Error) -> Self {
    Self::Io(e)
  }
}

impl From<zip::result::ZipError> for EntryError {
  fn from(e: zip::result::ZipError) -> Self {
    Self::Zip(e)
  }
}

/// Write one entry. Symlinks are archived as the file they point to;
/// links to directories are skipped.
fn add_file<W: io::Write + io::Seek>(writer: &mut ZipWriter<W>, entry: &TreeFile) -> Result<Option<u64>, EntryError> {
  let metadata = fs::metadata(&entry.path)?;
  if metadata.is_dir() {
    debug!(path = %entry.path.display(), "skipping link to directory");
    return Ok(None);
  }

  let size = metadata.len();
  let options = SimpleFileOptions::default()
    .compression_method(CompressionMethod::Deflated)
    .last_modified_time(zip_time(metadata.modified()?))
    .large_file(size > u64::from(u32::MAX));

  writer.start_file(entry.relative.as_str(), options)?;
  let mut source = File::open(&entry.path)?;
  let written = io::copy(&mut source, writer)?;
  debug!(entry = %entry.relative, bytes = written, "archived");
  Ok(Some(written))
}

/// Local-time zip timestamp, clamped to the zip epoch when out of range.
fn zip_time(modified: SystemTime) -> zip::DateTime {
  let local: DateTime<Local> = modified.into();
  u16::try_from(local.year())
    .ok()
    .and_then(|year| {
      zip::DateTime::from_date_and_time(
        year,
        local.month() as u8,
        local.day() as u8,
        local.hour() as u8,
        local.minute() as u8,
        local.second() as u8,
      )
      .ok()
    })
    .unwrap_or_default()
}
