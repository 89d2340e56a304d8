//! query-pane - the run/cancel/report core of a SQL query editor pane.
//!
//! This library exposes the core modules for use by embedding UIs, the CLI
//! driver and integration tests.

pub mod config;
pub mod editor;
pub mod engine;
pub mod error;
pub mod feed;
pub mod logging;
pub mod query;
pub mod session;
