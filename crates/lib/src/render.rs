//! Tag substitution for `{{ Key }}` placeholders.
//!
//! Commit messages and target directory lists may reference deployment
//! tags such as `{{ ClientCode }}` or `{{ PackageNameAndVersion }}`. Tags
//! are resolved from a [`TagDictionary`] built once at startup and shared
//! by reference.
//!
//! # Syntax
//!
//! - `{{ Key }}` - replaced by the value of `Key` (surrounding spaces optional)
//! - Keys are matched case-insensitively
//! - Single braces pass through unchanged
//!
//! # Example
//!
//! ```
//! use ensconce_lib::render::TagDictionary;
//!
//! let tags = TagDictionary::from_pairs([("Environment", "LIVE")]);
//! assert_eq!(tags.render("D:\\{{ Environment }}\\web").unwrap(), "D:\\LIVE\\web");
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Error)]
pub enum RenderError {
  #[error("unclosed tag at position {0}")]
  Unclosed(usize),

  #[error("empty tag at position {0}")]
  Empty(usize),

  #[error("unknown tag: {0}")]
  UnknownTag(String),

  #[error("failed to read tags file '{path}': {source}")]
  ReadTags {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse tags file '{path}': {source}")]
  ParseTags {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// Immutable key/value dictionary used to resolve tags.
#[derive(Debug, Clone, Default)]
pub struct TagDictionary {
  tags: HashMap<String, String>,
}

impl TagDictionary {
  pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
  where
    K: AsRef<str>,
    V: Into<String>,
  {
    Self {
      tags: pairs
        .into_iter()
        .map(|(k, v)| (normalize_key(k.as_ref()), v.into()))
        .collect(),
    }
  }

  /// Build the dictionary from the process environment, with entries from an
  /// optional JSON tags file taking precedence.
  pub fn load(tags_file: Option<&Path>) -> Result<Self, RenderError> {
    let mut tags = Self::from_pairs(
      std::env::vars_os().filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
    );
    if let Some(path) = tags_file {
      tags.merge_file(path)?;
    }
    debug!(count = tags.len(), "tag dictionary built");
    Ok(tags)
  }

  /// Merge a flat JSON object of string values over the existing tags.
  fn merge_file(&mut self, path: &Path) -> Result<(), RenderError> {
    let content = fs::read_to_string(path).map_err(|e| RenderError::ReadTags {
      path: path.to_path_buf(),
      source: e,
    })?;
    let entries: HashMap<String, String> = serde_json::from_str(&content).map_err(|e| RenderError::ParseTags {
      path: path.to_path_buf(),
      source: e,
    })?;
    for (key, value) in entries {
      self.tags.insert(normalize_key(&key), value);
    }
    Ok(())
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.tags.get(&normalize_key(key)).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.tags.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tags.is_empty()
  }

  /// Replace every `{{ Key }}` in `input`.
  ///
  /// # Errors
  ///
  /// Fails on an unclosed or empty tag, or a key with no value.
  pub fn render(&self, input: &str) -> Result<String, RenderError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    let mut offset = 0;

    while let Some(start) = rest.find(OPEN) {
      output.push_str(&rest[..start]);
      let after_open = &rest[start + OPEN.len()..];
      let end = after_open
        .find(CLOSE)
        .ok_or(RenderError::Unclosed(offset + start))?;

      let key = after_open[..end].trim();
      if key.is_empty() {
        return Err(RenderError::Empty(offset + start));
      }
      let value = self.get(key).ok_or_else(|| RenderError::UnknownTag(key.to_string()))?;
      output.push_str(value);

      let consumed = start + OPEN.len() + end + CLOSE.len();
      offset += consumed;
      rest = &rest[consumed..];
    }

    output.push_str(rest);
    Ok(output)
  }

  /// Render a `;`-separated list, dropping empty segments.
  pub fn render_list(&self, input: &str) -> Result<Vec<String>, RenderError> {
    Ok(
      self
        .render(input)?
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect(),
    )
  }
}

fn normalize_key(key: &str) -> String {
  key.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;
  use tempfile::TempDir;

  fn tags() -> TagDictionary {
    TagDictionary::from_pairs([("ClientCode", "ACME"), ("Environment", "LIVE")])
  }

  #[test]
  fn renders_with_and_without_spaces() {
    assert_eq!(tags().render("{{ClientCode}}-{{ Environment }}").unwrap(), "ACME-LIVE");
  }

  #[test]
  fn keys_are_case_insensitive() {
    assert_eq!(tags().render("{{ clientcode }}").unwrap(), "ACME");
  }

  #[test]
  fn plain_text_is_unchanged() {
    assert_eq!(tags().render("no {tags} here").unwrap(), "no {tags} here");
  }

  #[test]
  fn unknown_tag_fails() {
    let err = tags().render("{{ Missing }}").unwrap_err();
    assert!(matches!(err, RenderError::UnknownTag(key) if key == "Missing"));
  }

  #[test]
  fn unclosed_tag_reports_position() {
    let err = tags().render("abc {{ ClientCode").unwrap_err();
    assert!(matches!(err, RenderError::Unclosed(4)));
  }

  #[test]
  fn empty_tag_fails() {
    assert!(matches!(tags().render("{{  }}"), Err(RenderError::Empty(0))));
  }

  #[test]
  fn render_list_splits_and_drops_empty() {
    let list = tags().render_list("/srv/{{ ClientCode }}/web;;/srv/{{ ClientCode }}/api;").unwrap();
    assert_eq!(list, vec!["/srv/ACME/web", "/srv/ACME/api"]);
  }

  #[test]
  #[serial]
  fn load_merges_file_over_environment() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("tags.json");
    fs::write(&file, r#"{"EnsconceTestTag": "from-file"}"#).unwrap();

    temp_env::with_var("ENSCONCETESTTAG", Some("from-env"), || {
      let tags = TagDictionary::load(Some(&file)).unwrap();
      assert_eq!(tags.get("EnsconceTestTag"), Some("from-file"));
    });
  }

  #[test]
  #[serial]
  fn load_reads_environment() {
    temp_env::with_var("ENSCONCE_RENDER_TEST", Some("value"), || {
      let tags = TagDictionary::load(None).unwrap();
      assert_eq!(tags.render("{{ ENSCONCE_RENDER_TEST }}").unwrap(), "value");
    });
  }

  #[test]
  fn load_rejects_malformed_file() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("tags.json");
    fs::write(&file, "not json").unwrap();

    assert!(matches!(TagDictionary::load(Some(&file)), Err(RenderError::ParseTags { .. })));
  }
}
