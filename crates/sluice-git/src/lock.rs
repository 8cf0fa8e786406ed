//! Exclusive per-repository lock.
//!
//! A push rewrites the remote URL, runs, and restores it. Two of those
//! sequences interleaving on one repository could restore a credentialed URL
//! over a clean one, so a push holds `sluice.lock` in the repository's common
//! git directory for its duration. Linked worktrees share that directory, and
//! the remote configuration with it, so they share the lock too.
//!
//! The lock is an OS-level advisory lock (`fs2`), released on drop.
//! Acquisition never blocks.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::probe::git_common_dir;
use crate::runner::GitRunner;

/// Held lock on one repository.
#[derive(Debug)]
pub struct RepoLock {
    path: PathBuf,
    file: Option<File>,
}

impl RepoLock {
    /// Lock file name inside the git directory.
    pub const FILE_NAME: &'static str = "sluice.lock";

    /// Lock the repository the runner works in.
    ///
    /// # Errors
    /// Returns `CommandFailed` if the working directory is not a repository,
    /// otherwise as [`acquire`](Self::acquire).
    pub fn for_repository<R: GitRunner + ?Sized>(runner: &R) -> Result<Self> {
        Self::acquire(&git_common_dir(runner)?)
    }

    /// Try to lock the repository whose git directory is `git_dir`.
    ///
    /// # Errors
    /// Returns `Locked` if another process holds it, or an IO error if the
    /// lock file cannot be opened.
    pub fn acquire(git_dir: &Path) -> Result<Self> {
        let path = git_dir.join(Self::FILE_NAME);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(path = %path.display(), "repository lock acquired");
                Ok(Self {
                    path,
                    file: Some(file),
                })
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Err(Error::Locked(path)),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Whether this guard still holds the lock.
    #[must_use]
    pub const fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = FileExt::unlock(&file) {
                warn!(path = %self.path.display(), error = %e, "failed to release repository lock");
            }
        }
    }
}
