//! Snapshot repository storage for ensconce.
//!
//! Each managed directory owns exactly one git repository rooted at the
//! directory itself. A commit records the full file tree; the index is kept
//! equal to the last commit so that any later difference is drift.
//!
//! # Layout
//!
//! ```text
//! {managed_dir}/
//! ├── .git/               # repository history (append-only)
//! └── ...                 # deployed release files
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use gix::bstr::ByteSlice;
use gix::objs::tree::EntryKind;
use serde::Serialize;
use tracing::{debug, info};

use crate::consts::{AGENT_EMAIL, AGENT_NAME, VCS_MARKER};
use crate::util::tree::{TreeFile, repository_files};

use super::types::{DriftKind, DriftRecord, DriftReport, SnapshotError};

/// Result of looking for an existing repository.
pub enum OpenedRepository {
  Found(Box<gix::Repository>),
  NotYetInitialized,
}

/// Summary of a finalise commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
  pub id: String,
  pub file_count: usize,
  /// True when this commit started the history.
  pub root: bool,
}

/// Returns true if `path` holds a repository marker.
pub fn is_repository_root(path: &Path) -> bool {
  path.join(VCS_MARKER).is_dir()
}

/// Snapshot repository for one managed directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
  root: PathBuf,
}

impl SnapshotStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn is_managed(&self) -> bool {
    is_repository_root(&self.root)
  }

  /// Open the repository if one exists.
  ///
  /// Absence is reported as [`OpenedRepository::NotYetInitialized`], never as an error.
  pub fn locate(&self) -> Result<OpenedRepository, SnapshotError> {
    if !self.root.is_dir() {
      return Err(SnapshotError::DirectoryNotFound(self.root.clone()));
    }
    if !self.is_managed() {
      return Ok(OpenedRepository::NotYetInitialized);
    }

    let repo = gix::open_opts(&self.root, open_options()).map_err(|e| SnapshotError::Open {
      path: self.root.clone(),
      source: Box::new(e),
    })?;
    Ok(OpenedRepository::Found(Box::new(repo)))
  }

  /// Open the repository, initializing an empty non-bare one on first use.
  pub fn open_or_init(&self) -> Result<gix::Repository, SnapshotError> {
    match self.locate()? {
      OpenedRepository::Found(repo) => Ok(*repo),
      OpenedRepository::NotYetInitialized => {
        info!(path = %self.root.display(), "initializing snapshot repository");
        gix::init(&self.root).map_err(|e| SnapshotError::Init {
          path: self.root.clone(),
          source: Box::new(e),
        })?;
        gix::open_opts(&self.root, open_options()).map_err(|e| SnapshotError::Open {
          path: self.root.clone(),
          source: Box::new(e),
        })
      }
    }
  }

  /// Record the full current tree as a new commit.
  ///
  /// New, changed and deleted files are all captured because the tree is
  /// rebuilt from disk rather than patched. The index is rewritten to match.
  pub fn commit(&self, message: &str) -> Result<CommitSummary, SnapshotError> {
    let repo = self.open_or_init()?;

    let mut editor = repo
      .edit_tree(gix::ObjectId::empty_tree(repo.object_hash()))
      .map_err(|e| SnapshotError::repository(&self.root, e))?;

    let mut file_count = 0;
    for file in repository_files(&self.root) {
      let file = file.map_err(|e| SnapshotError::WalkDir {
        path: self.root.clone(),
        source: e,
      })?;

      let (content, kind) = read_entry(&file)?;
      let blob = repo
        .write_blob(&content)
        .map_err(|e| SnapshotError::repository(&self.root, e))?
        .detach();
      editor
        .upsert(file.relative.as_str(), kind, blob)
        .map_err(|e| SnapshotError::repository(&self.root, e))?;

      debug!(file = %file.relative, "staged");
      file_count += 1;
    }

    let tree = editor
      .write()
      .map_err(|e| SnapshotError::repository(&self.root, e))?
      .detach();

    let parent = self.head_id(&repo)?;
    let root = parent.is_none();
    let id = repo
      .commit("HEAD", message, tree, parent)
      .map_err(|e| SnapshotError::repository(&self.root, e))?
      .detach();

    let mut index = repo
      .index_from_tree(&tree)
      .map_err(|e| SnapshotError::repository(&self.root, e))?;
    index
      .write(gix::index::write::Options::default())
      .map_err(|e| SnapshotError::repository(&self.root, e))?;

    info!(path = %self.root.display(), commit = %id, files = file_count, root, "snapshot committed");

    Ok(CommitSummary {
      id: id.to_string(),
      file_count,
      root,
    })
  }

  /// Compare the working tree against the last commit.
  ///
  /// A directory without a repository, or with one but no commits, reports
  /// every file as untracked.
  pub fn status(&self) -> Result<DriftReport, SnapshotError> {
    let repo = match self.locate()? {
      OpenedRepository::Found(repo) => repo,
      OpenedRepository::NotYetInitialized => {
        let mut found: BTreeMap<DriftKind, Vec<String>> = BTreeMap::new();
        for file in repository_files(&self.root) {
          let file = file.map_err(|e| SnapshotError::WalkDir {
            path: self.root.clone(),
            source: e,
          })?;
          found.entry(DriftKind::Untracked).or_default().push(file.relative);
        }
        return Ok(self.build_report(found));
      }
    };

    let committed = self.head_entries(&repo)?;

    let index = repo
      .index_or_empty()
      .map_err(|e| SnapshotError::repository(&self.root, e))?;
    let staged: BTreeMap<String, gix::ObjectId> = index
      .entries()
      .iter()
      .map(|entry| (entry.path(&index).to_str_lossy().into_owned(), entry.id))
      .collect();

    let mut found: BTreeMap<DriftKind, Vec<String>> = BTreeMap::new();

    for (path, id) in &staged {
      match committed.get(path) {
        None => found.entry(DriftKind::Added).or_default().push(path.clone()),
        Some(head_id) if head_id != id => found.entry(DriftKind::Changed).or_default().push(path.clone()),
        Some(_) => {}
      }
    }

    let mut seen = HashSet::new();
    for file in repository_files(&self.root) {
      let file = file.map_err(|e| SnapshotError::WalkDir {
        path: self.root.clone(),
        source: e,
      })?;

      match staged.get(&file.relative) {
        None => found.entry(DriftKind::Untracked).or_default().push(file.relative.clone()),
        Some(id) => {
          let (content, _) = read_entry(&file)?;
          let recorded = repo
            .find_object(*id)
            .map_err(|e| SnapshotError::repository(&self.root, e))?;
          if recorded.data != content {
            found.entry(DriftKind::Modified).or_default().push(file.relative.clone());
          }
        }
      }
      seen.insert(file.relative);
    }

    for path in staged.keys().filter(|p| !seen.contains(*p)) {
      found.entry(DriftKind::Missing).or_default().push(path.clone());
    }

    Ok(self.build_report(found))
  }

  fn build_report(&self, found: BTreeMap<DriftKind, Vec<String>>) -> DriftReport {
    let mut report = DriftReport::new();
    for (kind, mut files) in found {
      files.sort();
      for file in files {
        report.push(DriftRecord {
          kind,
          repository: self.root.clone(),
          file,
        });
      }
    }
    report
  }

  fn head_id(&self, repo: &gix::Repository) -> Result<Option<gix::ObjectId>, SnapshotError> {
    let head = repo.head().map_err(|e| SnapshotError::repository(&self.root, e))?;
    if head.is_unborn() {
      return Ok(None);
    }
    let id = repo.head_id().map_err(|e| SnapshotError::repository(&self.root, e))?;
    Ok(Some(id.detach()))
  }

  /// Map of every file path in the last commit to its blob id.
  fn head_entries(&self, repo: &gix::Repository) -> Result<BTreeMap<String, gix::ObjectId>, SnapshotError> {
    if self.head_id(repo)?.is_none() {
      return Ok(BTreeMap::new());
    }

    let tree = repo
      .head_commit()
      .map_err(|e| SnapshotError::repository(&self.root, e))?
      .tree()
      .map_err(|e| SnapshotError::repository(&self.root, e))?;

    let mut recorder = gix::traverse::tree::Recorder::default();
    tree
      .traverse()
      .breadthfirst(&mut recorder)
      .map_err(|e| SnapshotError::repository(&self.root, e))?;

    Ok(
      recorder
        .records
        .into_iter()
        .filter(|entry| !entry.mode.is_tree() && !entry.mode.is_commit())
        .map(|entry| (entry.filepath.to_str_lossy().into_owned(), entry.oid))
        .collect(),
    )
  }
}

/// Options shared by every repository we open: no system or user
/// configuration, and the deployment agent as the only identity.
fn open_options() -> gix::open::Options {
  gix::open::Options::isolated().config_overrides([
    format!("user.name={AGENT_NAME}"),
    format!("user.email={AGENT_EMAIL}"),
    format!("committer.name={AGENT_NAME}"),
    format!("committer.email={AGENT_EMAIL}"),
  ])
}

/// Read the bytes git would store for this entry and its tree entry kind.
fn read_entry(file: &TreeFile) -> Result<(Vec<u8>, EntryKind), SnapshotError> {
  let io_err = |e| SnapshotError::Io {
    path: file.path.clone(),
    source: e,
  };

  if file.is_symlink {
    let target = fs::read_link(&file.path).map_err(io_err)?;
    let target = gix::path::into_bstr(target).into_owned();
    return Ok((target.into(), EntryKind::Link));
  }

  let content = fs::read(&file.path).map_err(io_err)?;
  let kind = if is_executable(&file.path) {
    EntryKind::BlobExecutable
  } else {
    EntryKind::Blob
  };
  Ok((content, kind))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
  use std::os::unix::fs::PermissionsExt;

  fs::metadata(path)
    .map(|m| m.permissions().mode() & 0o111 != 0)
    .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
  false
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::write_tree;
  use tempfile::TempDir;

  fn release_dir() -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("release");
    write_tree(&dir, &[("app.exe", "binary"), ("app.config", "<config/>"), ("web/index.html", "<html/>")]);
    (temp, dir)
  }

  fn kinds(report: &DriftReport) -> Vec<(DriftKind, String)> {
    report.records().iter().map(|r| (r.kind, r.file.clone())).collect()
  }

  #[test]
  fn locate_reports_not_yet_initialized() {
    let (_temp, dir) = release_dir();
    let store = SnapshotStore::new(&dir);
    assert!(matches!(store.locate().unwrap(), OpenedRepository::NotYetInitialized));
    assert!(!store.is_managed());
  }

  #[test]
  fn locate_missing_directory_fails() {
    let temp = TempDir::new().unwrap();
    let store = SnapshotStore::new(temp.path().join("nope"));
    assert!(matches!(store.locate(), Err(SnapshotError::DirectoryNotFound(_))));
  }

  #[test]
  fn status_without_repository_is_all_untracked() {
    let (_temp, dir) = release_dir();
    let report = SnapshotStore::new(&dir).status().unwrap();

    assert_eq!(report.count(), 3);
    assert!(report.records().iter().all(|r| r.kind == DriftKind::Untracked));
    assert!(!dir.join(VCS_MARKER).exists(), "status must not create a repository");
  }

  #[test]
  fn first_commit_is_root_and_tracks_every_file() {
    let (_temp, dir) = release_dir();
    let store = SnapshotStore::new(&dir);

    let summary = store.commit("first").unwrap();

    assert!(summary.root);
    assert_eq!(summary.file_count, 3);
    assert!(store.is_managed());
    assert!(store.status().unwrap().is_clean());
  }

  #[test]
  fn initialized_repository_without_commits_is_all_untracked() {
    let (_temp, dir) = release_dir();
    let store = SnapshotStore::new(&dir);
    store.open_or_init().unwrap();

    let report = store.status().unwrap();
    assert_eq!(report.count(), 3);
    assert!(report.records().iter().all(|r| r.kind == DriftKind::Untracked));
  }

  #[test]
  fn second_commit_without_changes_stays_clean() {
    let (_temp, dir) = release_dir();
    let store = SnapshotStore::new(&dir);

    store.commit("first").unwrap();
    let second = store.commit("second").unwrap();

    assert!(!second.root);
    assert!(store.status().unwrap().is_clean());
  }

  #[test]
  fn commit_history_is_appended() {
    let (_temp, dir) = release_dir();
    let store = SnapshotStore::new(&dir);

    let first = store.commit("first").unwrap();
    let second = store.commit("second").unwrap();

    let repo = store.open_or_init().unwrap();
    let head = repo.head_commit().unwrap();
    let parents: Vec<String> = head.parent_ids().map(|id| id.to_string()).collect();
    assert_eq!(head.id().to_string(), second.id);
    assert_eq!(parents, vec![first.id]);
  }

  #[test]
  fn commit_uses_agent_identity() {
    let (_temp, dir) = release_dir();
    let store = SnapshotStore::new(&dir);
    store.commit("finalised").unwrap();

    let repo = store.open_or_init().unwrap();
    let commit = repo.head_commit().unwrap();
    let author = commit.author().unwrap();
    assert_eq!(author.name.to_str_lossy(), AGENT_NAME);
    assert_eq!(author.email.to_str_lossy(), AGENT_EMAIL);
    assert_eq!(commit.message_raw_sloppy().to_str_lossy().trim(), "finalised");
  }

  #[test]
  fn status_detects_each_working_tree_kind() {
    let (_temp, dir) = release_dir();
    let store = SnapshotStore::new(&dir);
    store.commit("first").unwrap();

    fs::write(dir.join("app.config"), "<config edited/>").unwrap();
    fs::remove_file(dir.join("web/index.html")).unwrap();
    fs::write(dir.join("notes.txt"), "left behind").unwrap();

    let report = store.status().unwrap();
    assert_eq!(
      kinds(&report),
      vec![
        (DriftKind::Modified, "app.config".to_string()),
        (DriftKind::Missing, "web/index.html".to_string()),
        (DriftKind::Untracked, "notes.txt".to_string()),
      ]
    );
    assert!(report.records().iter().all(|r| r.repository == dir));
  }

  #[test]
  fn commit_captures_deletions() {
    let (_temp, dir) = release_dir();
    let store = SnapshotStore::new(&dir);
    store.commit("first").unwrap();

    fs::remove_file(dir.join("app.exe")).unwrap();
    let summary = store.commit("second").unwrap();

    assert_eq!(summary.file_count, 2);
    assert!(store.status().unwrap().is_clean());
  }

  #[test]
  fn nested_repository_is_not_tracked_by_parent() {
    let (temp, dir) = release_dir();
    let parent = SnapshotStore::new(temp.path());
    SnapshotStore::new(&dir).commit("child").unwrap();
    write_tree(temp.path(), &[("top.txt", "top")]);

    let summary = parent.commit("parent").unwrap();

    assert_eq!(summary.file_count, 1);
    assert!(parent.status().unwrap().is_clean());
  }

  #[test]
  fn commit_on_missing_directory_fails() {
    let temp = TempDir::new().unwrap();
    let result = SnapshotStore::new(temp.path().join("gone")).commit("x");
    assert!(matches!(result, Err(SnapshotError::DirectoryNotFound(_))));
  }
}
