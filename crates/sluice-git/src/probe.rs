//! Repository state queries.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::runner::{CommandOutput, GitRunner, render_command};

/// What [`Probe::ensure_initialized`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    /// A repository was created just now.
    Init,
    /// The repository already existed and is on a branch.
    Ok,
}

impl fmt::Display for InitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => f.write_str("INIT"),
            Self::Ok => f.write_str("OK"),
        }
    }
}

/// Read the URL configured for `remote`.
///
/// Returns `Ok(None)` when the remote does not exist.
///
/// # Errors
/// Returns error only if git cannot run.
pub fn remote_url<R: GitRunner + ?Sized>(runner: &R, remote: &str) -> Result<Option<String>> {
    let out = runner.run(&["remote", "get-url", remote])?;
    let url = out.stdout.trim();
    if out.success() && !url.is_empty() {
        Ok(Some(url.to_string()))
    } else {
        Ok(None)
    }
}

/// URL `git push` would use for `remote`: `pushurl` if set, else `url`,
/// with `pushInsteadOf`/`insteadOf` applied.
///
/// # Errors
/// Returns error only if git cannot run.
pub fn push_url<R: GitRunner + ?Sized>(runner: &R, remote: &str) -> Result<Option<String>> {
    let out = runner.run(&["remote", "get-url", "--push", remote])?;
    let url = out.stdout.trim();
    Ok((out.success() && !url.is_empty()).then(|| url.to_string()))
}

/// Value stored under `key` in git config, exactly as written.
///
/// Unlike [`remote_url`], no `insteadOf` rewriting is applied. Returns
/// `Ok(None)` when the key is unset.
///
/// # Errors
/// Returns error only if git cannot run.
pub fn config_value<R: GitRunner + ?Sized>(runner: &R, key: &str) -> Result<Option<String>> {
    let out = runner.run(&["config", "--get", key])?;
    let value = out.stdout.trim_end_matches(['\r', '\n']);
    Ok((out.success() && !value.is_empty()).then(|| value.to_string()))
}

/// Git directory shared by every worktree of the repository.
///
/// In a linked worktree or submodule `.git` is a file, so this asks git
/// instead of assuming `<workdir>/.git`.
///
/// # Errors
/// Returns `CommandFailed` if the working directory is not a repository.
pub fn git_common_dir<R: GitRunner + ?Sized>(runner: &R) -> Result<PathBuf> {
    let args = ["rev-parse", "--git-common-dir"];
    let out = runner.run(&args)?;
    let dir = out.stdout.trim();
    if !out.success() || dir.is_empty() {
        return Err(Error::CommandFailed {
            command: render_command(&args),
            stderr: out.stderr.trim().to_string(),
        });
    }

    let dir = Path::new(dir);
    Ok(if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        runner.workdir().join(dir)
    })
}

/// Thin queries and setup steps over a working directory.
#[derive(Debug)]
pub struct Probe<'a, R: GitRunner + ?Sized> {
    runner: &'a R,
    default_branch: String,
}

impl<'a, R: GitRunner + ?Sized> Probe<'a, R> {
    /// Create a probe that falls back to `default_branch`.
    #[must_use]
    pub fn new(runner: &'a R, default_branch: impl Into<String>) -> Self {
        Self {
            runner,
            default_branch: default_branch.into(),
        }
    }

    /// Branch name used when none can be detected.
    #[must_use]
    pub fn default_branch(&self) -> &str {
        &self.default_branch
    }

    /// Whether `.git` exists in the working directory, as a directory or as
    /// the pointer file of a worktree or submodule.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.runner.workdir().join(".git").exists()
    }

    /// Name of the checked-out branch, if HEAD is on one.
    ///
    /// # Errors
    /// Returns error if git cannot run.
    pub fn branch_name(&self) -> Result<Option<String>> {
        let out = self.runner.run(&["branch", "--show-current"])?;
        let name = out.stdout.trim();
        Ok((out.success() && !name.is_empty()).then(|| name.to_string()))
    }

    /// Name of the checked-out branch, or the default when none is detected.
    ///
    /// # Errors
    /// Returns error if git cannot run.
    pub fn current_branch(&self) -> Result<String> {
        Ok(self
            .branch_name()?
            .unwrap_or_else(|| self.default_branch.clone()))
    }

    /// Make sure the directory is a repository sitting on a branch.
    ///
    /// A fresh repository has HEAD pointed at the default branch. An existing
    /// one on a detached HEAD is moved onto the default branch.
    ///
    /// # Errors
    /// Returns error if initialization or the branch fix-up fails.
    pub fn ensure_initialized(&self) -> Result<InitStatus> {
        let head_ref = format!("refs/heads/{}", self.default_branch);

        if !self.is_initialized() {
            self.require(&["init"])?;
            self.require(&["symbolic-ref", "HEAD", &head_ref])?;
            info!(branch = %self.default_branch, "initialized repository");
            return Ok(InitStatus::Init);
        }

        if self.branch_name()?.is_none() {
            let has_commits = self
                .runner
                .run(&["rev-parse", "--verify", "--quiet", "HEAD"])?
                .success();
            if has_commits {
                self.require(&["checkout", "-B", &self.default_branch])?;
            } else {
                self.require(&["symbolic-ref", "HEAD", &head_ref])?;
            }
            info!(branch = %self.default_branch, "moved HEAD onto default branch");
        }

        Ok(InitStatus::Ok)
    }

    /// URL of `remote`, if configured.
    ///
    /// # Errors
    /// Returns error if git cannot run.
    pub fn remote_url(&self, remote: &str) -> Result<Option<String>> {
        remote_url(self.runner, remote)
    }

    /// Register a new remote.
    ///
    /// # Errors
    /// Returns error if git rejects the remote.
    pub fn add_remote(&self, remote: &str, url: &str) -> Result<()> {
        self.require(&["remote", "add", remote, url.trim()])
            .map(|_| ())
    }

    /// Point an existing remote at `url`.
    ///
    /// # Errors
    /// Returns error if git rejects the change.
    pub fn set_remote_url(&self, remote: &str, url: &str) -> Result<()> {
        self.require(&["remote", "set-url", remote, url.trim()])
            .map(|_| ())
    }

    /// Write repository-local `user.name` and `user.email`.
    ///
    /// Empty values are skipped rather than written.
    ///
    /// # Errors
    /// Returns error if git config cannot be written.
    pub fn configure_identity(&self, username: &str, email: &str) -> Result<()> {
        if !username.is_empty() {
            self.require(&["config", "user.name", username])?;
        }
        if !email.is_empty() {
            self.require(&["config", "user.email", email])?;
        }
        debug!(username, "configured commit identity");
        Ok(())
    }

    fn require(&self, args: &[&str]) -> Result<CommandOutput> {
        let out = self.runner.run(args)?;
        if out.success() {
            Ok(out)
        } else {
            Err(Error::CommandFailed {
                command: render_command(args),
                stderr: out.stderr.trim().to_string(),
            })
        }
    }
}
