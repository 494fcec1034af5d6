//! Test utilities for ensconce-lib.

use std::fs;
use std::path::Path;

/// Create `root` and write each `(relative_path, content)` pair below it.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
  fs::create_dir_all(root).unwrap();
  for (relative, content) in files {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
  }
}

/// Recursively mark every entry below `root` read-only.
pub fn make_read_only(root: &Path) {
  for entry in walkdir::WalkDir::new(root).contents_first(true) {
    let entry = entry.unwrap();
    let mut perms = entry.metadata().unwrap().permissions();
    perms.set_readonly(true);
    fs::set_permissions(entry.path(), perms).unwrap();
  }
}
