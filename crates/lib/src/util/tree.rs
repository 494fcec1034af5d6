//! Lazy file-tree walking shared by snapshots, scans, backups and copies.
//!
//! Walks are sorted by file name so every traversal of an unchanged tree
//! yields the same order.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::consts::VCS_MARKER;
use crate::snapshot::is_repository_root;

/// A non-directory entry found below a walk root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeFile {
  pub path: PathBuf,
  /// Path relative to the walk root, `/`-separated.
  pub relative: String,
  pub is_symlink: bool,
}

impl TreeFile {
  fn from_entry(root: &Path, entry: &walkdir::DirEntry) -> Self {
    Self {
      path: entry.path().to_path_buf(),
      relative: relative_name(root, entry.path()),
      is_symlink: entry.path_is_symlink(),
    }
  }
}

/// Relative, `/`-separated name of `path` below `root`.
pub fn relative_name(root: &Path, path: &Path) -> String {
  path
    .strip_prefix(root)
    .unwrap_or(path)
    .components()
    .map(|c| c.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/")
}

/// Every file and symlink below `root`, including repository markers.
pub fn all_files(root: &Path) -> impl Iterator<Item = Result<TreeFile, walkdir::Error>> + use<> {
  let root = root.to_path_buf();
  WalkDir::new(&root)
    .sort_by_file_name()
    .into_iter()
    .filter(|entry| entry.as_ref().map(|e| !e.file_type().is_dir()).unwrap_or(true))
    .map(move |entry| entry.map(|e| TreeFile::from_entry(&root, &e)))
}

/// Files owned by the repository rooted at `root`.
///
/// Skips the marker itself and prunes nested directories that are
/// repository roots of their own.
pub fn repository_files(root: &Path) -> impl Iterator<Item = Result<TreeFile, walkdir::Error>> + use<> {
  let root = root.to_path_buf();
  WalkDir::new(&root)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|e| {
      if e.depth() == 0 {
        return true;
      }
      if e.file_name() == VCS_MARKER {
        return false;
      }
      !(e.file_type().is_dir() && is_repository_root(e.path()))
    })
    .filter(|entry| entry.as_ref().map(|e| !e.file_type().is_dir()).unwrap_or(true))
    .map(move |entry| entry.map(|e| TreeFile::from_entry(&root, &e)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::write_tree;
  use tempfile::TempDir;

  #[test]
  fn relative_name_uses_forward_slashes() {
    let root = Path::new("/app");
    assert_eq!(relative_name(root, &root.join("bin").join("app.dll")), "bin/app.dll");
  }

  #[test]
  fn all_files_is_sorted_and_skips_directories() {
    let temp = TempDir::new().unwrap();
    write_tree(temp.path(), &[("b.txt", "b"), ("a/z.txt", "z"), ("a/c.txt", "c")]);

    let names: Vec<_> = all_files(temp.path()).map(|f| f.unwrap().relative).collect();
    assert_eq!(names, vec!["a/c.txt", "a/z.txt", "b.txt"]);
  }

  #[test]
  fn repository_files_prunes_markers_and_nested_roots() {
    let temp = TempDir::new().unwrap();
    write_tree(
      temp.path(),
      &[
        ("keep.txt", "k"),
        (".git/HEAD", "ref"),
        ("nested/.git/HEAD", "ref"),
        ("nested/inner.txt", "i"),
        ("plain/file.txt", "f"),
      ],
    );

    let names: Vec<_> = repository_files(temp.path()).map(|f| f.unwrap().relative).collect();
    assert_eq!(names, vec!["keep.txt", "plain/file.txt"]);
  }

  #[test]
  fn missing_root_yields_error() {
    let temp = TempDir::new().unwrap();
    let mut files = all_files(&temp.path().join("missing"));
    assert!(files.next().unwrap().is_err());
  }
}
