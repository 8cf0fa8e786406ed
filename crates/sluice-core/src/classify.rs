//! Classification of git output.
//!
//! git reports "nothing to commit", "up to date" and rejected pushes only as
//! text, and that text is localized. All recognized phrases live in one
//! [`PhraseTable`] that is loaded from configuration, so new locales or git
//! versions need a config entry rather than a code change.

use serde::{Deserialize, Serialize};
use sluice_git::CommandOutput;

/// Result of `git commit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A commit was created.
    Committed,
    /// There was nothing to commit. Not an error.
    NothingToCommit,
    /// The commit failed for another reason.
    Failed,
}

/// Result of `git push`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// New state reached the remote.
    Pushed,
    /// Exit 0 but git reported nothing new was sent.
    UpToDate,
    /// Rejected because the remote has history we don't.
    Diverged,
    /// Any other failure.
    Failed,
}

/// Phrases recognized in case-folded combined stdout and stderr.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseTable {
    /// `git commit` had nothing to record.
    #[serde(default = "default_nothing_to_commit")]
    pub nothing_to_commit: Vec<String>,

    /// `git push` had nothing to send.
    #[serde(default = "default_up_to_date")]
    pub up_to_date: Vec<String>,

    /// `git push` was rejected as non-fast-forward.
    #[serde(default = "default_diverged")]
    pub diverged: Vec<String>,
}

impl Default for PhraseTable {
    fn default() -> Self {
        Self {
            nothing_to_commit: default_nothing_to_commit(),
            up_to_date: default_up_to_date(),
            diverged: default_diverged(),
        }
    }
}

fn default_nothing_to_commit() -> Vec<String> {
    vec!["nothing to commit".into(), "işlenecek".into(), "clean".into()]
}

fn default_up_to_date() -> Vec<String> {
    vec![
        "everything up-to-date".into(),
        "up to date".into(),
        "her şey güncel".into(),
    ]
}

fn default_diverged() -> Vec<String> {
    vec!["non-fast-forward".into(), "fetch first".into()]
}

impl PhraseTable {
    /// Classify the output of `git commit`.
    #[must_use]
    pub fn classify_commit(&self, output: &CommandOutput) -> CommitOutcome {
        if output.success() {
            CommitOutcome::Committed
        } else if matches_any(&self.nothing_to_commit, &output.combined()) {
            CommitOutcome::NothingToCommit
        } else {
            CommitOutcome::Failed
        }
    }

    /// Classify the output of `git push`.
    #[must_use]
    pub fn classify_push(&self, output: &CommandOutput) -> PushOutcome {
        let text = output.combined();
        if output.success() {
            if matches_any(&self.up_to_date, &text) {
                PushOutcome::UpToDate
            } else {
                PushOutcome::Pushed
            }
        } else if matches_any(&self.diverged, &text) {
            PushOutcome::Diverged
        } else {
            PushOutcome::Failed
        }
    }
}

fn matches_any(phrases: &[String], text: &str) -> bool {
    let text = text.to_lowercase();
    phrases
        .iter()
        .filter(|p| !p.trim().is_empty())
        .any(|p| text.contains(&p.to_lowercase()))
}
