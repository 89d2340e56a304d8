//! Error types for the query pane.
//!
//! Defines the main error enum used throughout the crate. Statement-level
//! engine rejections are not errors in this sense; they travel as
//! [`crate::engine::EngineFailure`] values so their position survives.

use thiserror::Error;

/// Main error type for query pane operations.
#[derive(Error, Debug)]
pub enum PaneError {
    /// Engine connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query errors raised outside of a statement run (bad input files, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// Configuration errors (invalid config file, bad CLI values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session errors (actor stopped, command channel closed, etc.)
    #[error("Session error: {0}")]
    Session(String),

    /// Internal errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PaneError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a session error with the given message.
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::Config(_) => "Configuration Error",
            Self::Session(_) => "Session Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using PaneError.
pub type Result<T> = std::result::Result<T, PaneError>;
