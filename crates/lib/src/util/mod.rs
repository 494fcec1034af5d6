//! Shared utilities.
//!
//! Common utilities used across the crate including tree walking and test helpers.

pub mod tree;

#[cfg(test)]
pub mod testutil;
