//! Path qualification and containment checks.

use std::path::{Path, PathBuf};

use crate::consts::BACKUP_SUFFIX;

/// Fully qualify `path`.
///
/// Existing paths are canonicalized (without the `\\?\` prefix on Windows);
/// missing ones are made absolute against the current directory.
pub fn full_path(path: &Path) -> PathBuf {
  dunce::canonicalize(path)
    .or_else(|_| std::path::absolute(path))
    .unwrap_or_else(|_| path.to_path_buf())
}

/// Case-insensitive substring test used for service executable paths,
/// which may be quoted or carry arguments.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
  if needle.is_empty() {
    return false;
  }
  haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// True if `path` lies at or below `dir`, compared component-wise after
/// qualifying both.
pub fn is_within(path: &Path, dir: &Path) -> bool {
  let path = full_path(path);
  let dir = full_path(dir);

  #[cfg(windows)]
  {
    let lower = |p: &Path| PathBuf::from(p.to_string_lossy().to_lowercase());
    lower(&path).starts_with(lower(&dir))
  }

  #[cfg(not(windows))]
  path.starts_with(&dir)
}

/// Location of the backup artifact for `dir`: a sibling named `<name>.old.zip`.
///
/// Returns `None` for paths without a final component (e.g. `/`).
pub fn backup_path(dir: &Path) -> Option<PathBuf> {
  let dir = full_path(dir);
  let name = dir.file_name()?.to_string_lossy().into_owned();
  let parent = dir.parent()?;
  Some(parent.join(format!("{}{}", name, BACKUP_SUFFIX)))
}
