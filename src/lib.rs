//! # Changefeed
//!
//! Connector sync engine: pulls change events (pull requests, releases, CI
//! runs, commits, registry images, issues) from GitHub, GitLab and Jira,
//! normalizes them into one canonical shape and stores each upstream item at
//! most once per connection.

pub mod config;
pub mod connectors;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod normalization;
pub mod repositories;
pub mod sync_executor;
pub mod telemetry;
pub use migration;
