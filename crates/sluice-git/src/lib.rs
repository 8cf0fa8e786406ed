//! # sluice-git
//!
//! Git subprocess layer for sluice. Every operation is a single `git`
//! invocation in the target working directory; nothing here links against
//! libgit2.
//!
//! # Security
//!
//! Remote credentials only ever live in the repository configuration for the
//! duration of one [`CredentialScoper::run`] call. The [`RemoteScope`] guard
//! restores the original remote URL on every exit path, and command lines are
//! masked before they reach the logs.

mod credentials;
mod error;
mod lock;
mod probe;
mod runner;

pub use credentials::{
    CredentialScoper, Credentials, RemoteScope, authenticated_url, has_embedded_credentials,
    is_credential_compatible, mask_url, parse_credentials,
};
pub use error::{Error, Result};
pub use lock::RepoLock;
pub use probe::{InitStatus, Probe, config_value, git_common_dir, push_url, remote_url};
pub use runner::{CommandOutput, Git, GitRunner, MIN_REDACT_LEN, render_command};
