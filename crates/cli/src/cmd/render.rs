//! Implementation of the `ensconce render` command.

use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};

use ensconce_lib::render::TagDictionary;

/// Render tags in standard input and write the result to standard output.
pub fn cmd_render(tags_file: Option<&Path>) -> Result<u8> {
  let tags = TagDictionary::load(tags_file).context("Failed to load tags")?;

  let mut input = String::new();
  io::stdin().read_to_string(&mut input).context("Failed to read standard input")?;

  let rendered = tags.render(&input).context("Failed to render input")?;

  let mut stdout = io::stdout().lock();
  stdout.write_all(rendered.as_bytes()).context("Failed to write output")?;
  stdout.flush()?;
  Ok(0)
}
