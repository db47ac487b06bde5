//! Integration tests for driftwatch
//!
//! These tests serve listing pages from wiremock servers and drive full runs
//! against on-disk SQLite stores.

mod common;
mod export_tests;
mod run_tests;
