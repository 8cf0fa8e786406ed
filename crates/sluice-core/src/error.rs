//! Error types for sluice-core.

use std::path::PathBuf;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sluice-core operations.
///
/// Push outcomes (diverged, aborted, failed) are not errors; they are
/// reported through [`PushReport`](crate::PushReport). These are the cases
/// where a run cannot proceed at all.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Commit message was empty.
    #[error("commit message must not be empty")]
    EmptyMessage,

    /// No saved identity with this alias.
    #[error("no saved account with alias '{0}'")]
    UnknownIdentity(String),

    /// An identity with this alias already exists.
    #[error("an account with alias '{0}' already exists")]
    DuplicateIdentity(String),

    /// Identity alias or username was blank.
    #[error("account {0} must not be empty")]
    MissingField(&'static str),

    /// Store or config file could not be parsed.
    #[error("failed to parse {}: {message}", .file.display())]
    ParseError { file: PathBuf, message: String },

    /// No platform configuration directory could be determined.
    #[error("cannot determine a configuration directory - pass --config")]
    NoConfigDir,

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("toml serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// Git operation error.
    #[error("git error: {0}")]
    Git(#[from] sluice_git::Error),
}
