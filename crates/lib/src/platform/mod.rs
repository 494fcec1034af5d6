//! Platform helpers: path qualification and filesystem attribute handling.

pub mod paths;
pub mod writable;
