//! End-to-end tests driving the ensconce binary against temporary trees.

mod common;
mod deploy_tests;
mod finalise_tests;
mod scan_tests;
