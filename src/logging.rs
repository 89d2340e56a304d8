//! Logging configuration for the query pane.
//!
//! The CLI driver logs to stderr unless `--log-file` is given. Embedding UIs
//! that own the terminal pick [`LogTarget::File`].

use crate::error::{PaneError, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "query-pane.log";

/// Where log output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber for `target`.
pub fn init(target: &LogTarget) -> Result<()> {
    match target {
        LogTarget::Stderr => tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_writer(std::io::stderr)
            .init(),
        LogTarget::File(path) => tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_writer(open_log_file(path)?)
            .with_ansi(false)
            .init(),
    }
    Ok(())
}

/// Creates the log file and its parent directories, truncating any
/// previous run's output.
pub fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            PaneError::config(format!(
                "Could not create log directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    File::create(path)
        .map_err(|e| PaneError::config(format!("Could not create log file {}: {e}", path.display())))
}

/// Default log file location.
///
/// `~/.local/state/query-pane/query-pane.log` on Linux (XDG state directory),
/// or the platform-appropriate state/config directory elsewhere.
pub fn default_log_path() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::config_dir)
        .map(|dir| dir.join("query-pane").join(LOG_FILE_NAME))
        .unwrap_or_else(|| std::env::temp_dir().join(LOG_FILE_NAME))
}
