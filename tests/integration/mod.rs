//! Session-level integration tests.

pub mod common;
pub mod feed_test;
pub mod postgres_test;
pub mod session_test;
