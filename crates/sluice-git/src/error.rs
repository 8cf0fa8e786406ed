//! Error types for sluice-git.

use std::path::PathBuf;
use std::time::Duration;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving the git executable.
///
/// A non-zero exit code is not an error: it comes back as a
/// [`CommandOutput`](crate::CommandOutput) for the caller to classify.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The git executable could not be started.
    #[error("cannot run `{program}` - is git installed and on PATH? ({source})")]
    ToolUnavailable {
        /// Program that failed to spawn.
        program: String,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// Working directory does not exist.
    #[error("working directory does not exist: {}", .0.display())]
    WorkdirMissing(PathBuf),

    /// The command did not finish within the configured limit and was killed.
    #[error("`{command}` timed out after {}s", .after.as_secs())]
    Timeout {
        /// Masked command line.
        command: String,
        /// The limit that was exceeded.
        after: Duration,
    },

    /// A git command that must succeed returned non-zero.
    #[error("`{command}` failed: {stderr}")]
    CommandFailed {
        /// Masked command line.
        command: String,
        /// Trimmed standard error.
        stderr: String,
    },

    /// Remote URL could not be parsed or is not usable for credentials.
    #[error("invalid remote URL: {0}")]
    InvalidRemoteUrl(String),

    /// Rewriting or restoring a remote URL failed.
    #[error("failed to update remote '{remote}': {message}")]
    RemoteUpdateFailed {
        /// Remote name.
        remote: String,
        /// What git reported.
        message: String,
    },

    /// Another sluice process holds the repository lock.
    #[error("repository is locked by another sluice process ({})", .0.display())]
    Locked(PathBuf),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
