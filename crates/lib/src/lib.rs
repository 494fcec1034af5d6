//! ensconce-lib: Core types and logic for Ensconce
//!
//! This crate manages the lifecycle of deployment target directories:
//! - `snapshot`: per-directory git history used to finalise and detect drift
//! - `reap`: discovers and tears down services and processes bound to a directory
//! - `backup`: archives a directory before it is replaced
//! - `replace`: the backup, reap, delete, copy pipeline for one target
//! - `deploy`: sequences scans, replacements and finalisation across targets

pub mod backup;
pub mod config;
pub mod consts;
pub mod deploy;
pub mod platform;
pub mod reap;
pub mod render;
pub mod replace;
pub mod snapshot;
pub mod util;
