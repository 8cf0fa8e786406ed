//! Push resolution state machine.
//!
//! One run walks a working directory from "whatever state it is in" to
//! "pushed", asking the [`Operator`] only when it has to:
//!
//! ```text
//! START -> STAGE -> COMMIT -> VERIFY_REMOTE -> PUSH -> DONE
//!                                  |             |
//!                               ABORTED       RESOLVE -> DONE | FAILED | ABORTED
//! ```
//!
//! Commit failures never stop the run, so work committed earlier still gets
//! pushed. Every command that talks to the remote goes through the
//! [`CredentialScoper`], and the whole run holds the [`RepoLock`].

use std::cell::RefCell;
use std::fmt;
use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use sluice_git::{
    CommandOutput, CredentialScoper, Error as GitError, Git, GitRunner, InitStatus, Probe,
    RepoLock, has_embedded_credentials, mask_url, render_command,
};
use tracing::{debug, info, warn};

use crate::classify::{CommitOutcome, PushOutcome};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::ignore;
use crate::traits::{IdentityStore, Operator};

/// Message of the empty commit created before force-pushing a stale branch.
pub const FORCED_UPDATE_MESSAGE: &str = "Manual Forced Update";

/// Terminal result of a push run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// New state reached the remote.
    Done,
    /// A command failed and recovery was not possible.
    Failed,
    /// The operator declined a required input.
    Aborted,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => f.write_str("DONE"),
            Self::Failed => f.write_str("FAILED"),
            Self::Aborted => f.write_str("ABORTED"),
        }
    }
}

/// Why a run ended as [`Outcome::Aborted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The identity had no token and none was supplied.
    NoToken,
    /// The remote was missing and no URL was supplied.
    NoRemote,
    /// The operator chose to cancel recovery.
    Cancelled,
}

/// Why a push needs recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Divergence {
    /// The remote rejected the push: it has commits we don't.
    Diverged,
    /// git said "up to date" although a push of new state was intended.
    Stale,
}

/// Recovery chosen by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Pull with rebase, then push once more.
    RebaseRetry,
    /// Overwrite the remote branch.
    ForcePush,
    /// Stop without changing anything further.
    Cancel,
}

/// User-visible steps of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Initialize,
    Stage,
    Commit,
    VerifyRemote,
    Push,
    Pull,
    RetryPush,
    ForcePush,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Initialize => "Checking Git",
            Self::Stage => "Adding Files",
            Self::Commit => "Committing",
            Self::VerifyRemote => "Checking Remote",
            Self::Push => "Pushing",
            Self::Pull => "Pulling",
            Self::RetryPush => "Retrying Push",
            Self::ForcePush => "Force Pushing",
        };
        f.write_str(label)
    }
}

/// Status reported for a [`Step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Running,
    Ok,
    Init,
    Skipped,
    Missing,
    Added,
    Conflict,
    Stuck,
    Error,
    Failed,
    Done,
}

impl StepStatus {
    /// Whether this status ends the step.
    #[must_use]
    pub const fn is_final(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Running => "...",
            Self::Ok => "OK",
            Self::Init => "INIT",
            Self::Skipped => "SKIP",
            Self::Missing => "MISSING",
            Self::Added => "ADDED",
            Self::Conflict => "CONFLICT",
            Self::Stuck => "STUCK",
            Self::Error => "ERROR",
            Self::Failed => "FAILED",
            Self::Done => "DONE",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Stage,
    Commit,
    VerifyRemote,
    Push,
    Resolve(Divergence),
    Done,
    Failed,
    Aborted(AbortReason),
}

/// One git invocation made during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    /// Masked command line.
    pub command: String,
    /// Exit code, or `None` if the command could not run.
    pub exit_code: Option<i32>,
}

/// Everything a caller needs to report on a finished run.
#[derive(Debug, Clone)]
pub struct PushReport {
    /// Terminal state.
    pub outcome: Outcome,
    /// Set when `outcome` is `Aborted`.
    pub abort_reason: Option<AbortReason>,
    /// Branch that was pushed, once known.
    pub branch: Option<String>,
    /// Result of the initialization step.
    pub init: Option<InitStatus>,
    /// Result of the commit step.
    pub commit: Option<CommitOutcome>,
    /// Why recovery was needed, if it was.
    pub divergence: Option<Divergence>,
    /// What the operator chose for recovery.
    pub resolution: Option<Resolution>,
    /// Combined stdout and stderr of the last command, credentials redacted.
    pub last_output: String,
    /// All git commands run, in order.
    pub transcript: Vec<TranscriptEntry>,
}

impl PushReport {
    fn aborted(reason: AbortReason) -> Self {
        Self {
            outcome: Outcome::Aborted,
            abort_reason: Some(reason),
            branch: None,
            init: None,
            commit: None,
            divergence: None,
            resolution: None,
            last_output: String::new(),
            transcript: Vec::new(),
        }
    }

    /// Whether the run ended in [`Outcome::Done`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Done
    }
}

/// Commit everything in `workdir` and push it, as `identity` if given.
///
/// Builds a [`Git`] runner with the configured timeout and drives a
/// [`PushSession`].
///
/// # Errors
/// Returns error if git is unavailable, the message is empty, the repository
/// is locked by another run, or the identity store fails.
pub fn run_push<S, O>(
    workdir: &Path,
    identity: Option<Identity>,
    message: &str,
    config: &Config,
    store: &S,
    operator: &mut O,
) -> Result<PushReport>
where
    S: IdentityStore + ?Sized,
    O: Operator + ?Sized,
{
    let git = Git::new(workdir).with_timeout(config.command_timeout());
    PushSession::new(&git, config).run(store, operator, identity, message)
}

/// A push run over any [`GitRunner`].
#[derive(Debug)]
pub struct PushSession<'a, R: GitRunner + ?Sized> {
    runner: &'a R,
    config: &'a Config,
}

impl<'a, R: GitRunner + ?Sized> PushSession<'a, R> {
    /// Create a session.
    #[must_use]
    pub const fn new(runner: &'a R, config: &'a Config) -> Self {
        Self { runner, config }
    }

    /// Drive the state machine to a terminal state.
    ///
    /// An identity without a token gets one from the operator first; the new
    /// token is saved to `store`.
    ///
    /// # Errors
    /// Returns error if git is unavailable, the message is empty, the
    /// repository is locked by another run, or the identity store fails.
    pub fn run<S, O>(
        &self,
        store: &S,
        operator: &mut O,
        identity: Option<Identity>,
        message: &str,
    ) -> Result<PushReport>
    where
        S: IdentityStore + ?Sized,
        O: Operator + ?Sized,
    {
        if message.trim().is_empty() {
            return Err(Error::EmptyMessage);
        }

        let identity = match identity {
            Some(identity) if !identity.has_token() => {
                let token = operator
                    .token_for(&identity)
                    .filter(|t| !t.expose_secret().trim().is_empty());
                let Some(token) = token else {
                    info!(alias = %identity.alias, "no token supplied, aborting");
                    return Ok(PushReport::aborted(AbortReason::NoToken));
                };
                Some(persist_token(store, identity, token)?)
            }
            other => other,
        };

        Machine::new(self.runner, self.config, operator, identity, message).drive()
    }
}

fn persist_token<S: IdentityStore + ?Sized>(
    store: &S,
    mut identity: Identity,
    token: SecretString,
) -> Result<Identity> {
    match store.update_token(&identity.alias, token.clone()) {
        Ok(updated) => Ok(updated),
        Err(Error::UnknownIdentity(_)) => {
            identity.set_token(token);
            Ok(identity)
        }
        Err(e) => Err(e),
    }
}

/// Runner wrapper that records every command for the report.
struct Transcript<'a, R: GitRunner + ?Sized> {
    inner: &'a R,
    entries: RefCell<Vec<TranscriptEntry>>,
}

impl<R: GitRunner + ?Sized> GitRunner for Transcript<'_, R> {
    fn workdir(&self) -> &Path {
        self.inner.workdir()
    }

    fn run(&self, args: &[&str]) -> sluice_git::Result<CommandOutput> {
        let result = self.inner.run(args);
        self.entries.borrow_mut().push(TranscriptEntry {
            command: render_command(args),
            exit_code: result.as_ref().ok().map(|out| out.exit_code),
        });
        result
    }
}

struct Machine<'a, R: GitRunner + ?Sized, O: Operator + ?Sized> {
    git: Transcript<'a, R>,
    config: &'a Config,
    operator: &'a mut O,
    identity: Option<Identity>,
    message: &'a str,
    lock: Option<RepoLock>,
    branch: Option<String>,
    init: Option<InitStatus>,
    commit: Option<CommitOutcome>,
    divergence: Option<Divergence>,
    resolution: Option<Resolution>,
    last_output: String,
}

impl<'a, R: GitRunner + ?Sized, O: Operator + ?Sized> Machine<'a, R, O> {
    fn new(
        runner: &'a R,
        config: &'a Config,
        operator: &'a mut O,
        identity: Option<Identity>,
        message: &'a str,
    ) -> Self {
        Self {
            git: Transcript {
                inner: runner,
                entries: RefCell::new(Vec::new()),
            },
            config,
            operator,
            identity,
            message,
            lock: None,
            branch: None,
            init: None,
            commit: None,
            divergence: None,
            resolution: None,
            last_output: String::new(),
        }
    }

    fn drive(mut self) -> Result<PushReport> {
        let mut state = State::Start;
        loop {
            debug!(?state, "push state");
            state = match state {
                State::Done => return Ok(self.finish(Outcome::Done, None)),
                State::Failed => return Ok(self.finish(Outcome::Failed, None)),
                State::Aborted(reason) => {
                    return Ok(self.finish(Outcome::Aborted, Some(reason)));
                }
                active => match self.step(active) {
                    Ok(next) => next,
                    Err(Error::Git(
                        e @ (GitError::Timeout { .. } | GitError::CommandFailed { .. }),
                    )) => {
                        warn!(error = %e, "git command failed");
                        self.last_output = e.to_string();
                        State::Failed
                    }
                    Err(e) => return Err(e),
                },
            };
        }
    }

    fn step(&mut self, state: State) -> Result<State> {
        match state {
            State::Start => self.start(),
            State::Stage => self.stage(),
            State::Commit => self.commit(),
            State::VerifyRemote => self.verify_remote(),
            State::Push => self.push(),
            State::Resolve(divergence) => self.resolve(divergence),
            State::Done | State::Failed | State::Aborted(_) => Ok(state),
        }
    }

    fn finish(self, outcome: Outcome, abort_reason: Option<AbortReason>) -> PushReport {
        info!(%outcome, branch = ?self.branch, "push finished");
        if let Some(lock) = &self.lock {
            debug!(path = %lock.path().display(), "releasing repository lock");
        }
        PushReport {
            outcome,
            abort_reason,
            branch: self.branch,
            init: self.init,
            commit: self.commit,
            divergence: self.divergence,
            resolution: self.resolution,
            last_output: self.last_output,
            transcript: self.git.entries.into_inner(),
        }
    }

    // === Steps ===

    fn start(&mut self) -> Result<State> {
        self.progress(Step::Initialize, StepStatus::Running);
        let status = self.probe().ensure_initialized()?;
        self.init = Some(status);
        self.progress(
            Step::Initialize,
            match status {
                InitStatus::Init => StepStatus::Init,
                InitStatus::Ok => StepStatus::Ok,
            },
        );

        self.lock = Some(RepoLock::for_repository(&self.git)?);

        if let Some(identity) = &self.identity {
            self.probe()
                .configure_identity(&identity.username, &identity.email)?;
        }

        match ignore::ensure_lines(self.git.workdir(), &self.config.ignore.lines) {
            Ok(added) if !added.is_empty() => debug!(?added, "updated .gitignore"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "could not update .gitignore"),
        }

        Ok(State::Stage)
    }

    fn stage(&mut self) -> Result<State> {
        self.progress(Step::Stage, StepStatus::Running);
        let out = self.plain(&["add", "."])?;
        self.record(&out);
        self.progress(
            Step::Stage,
            if out.success() {
                StepStatus::Ok
            } else {
                StepStatus::Error
            },
        );
        Ok(State::Commit)
    }

    fn commit(&mut self) -> Result<State> {
        self.progress(Step::Commit, StepStatus::Running);
        let message = self.message;
        let out = self.plain(&["commit", "-m", message])?;
        let outcome = self.config.phrases.classify_commit(&out);
        self.record(&out);
        self.commit = Some(outcome);

        let status = match outcome {
            CommitOutcome::Committed => StepStatus::Ok,
            CommitOutcome::NothingToCommit => StepStatus::Skipped,
            CommitOutcome::Failed => {
                warn!(exit_code = out.exit_code, "commit failed, pushing existing commits");
                StepStatus::Error
            }
        };
        self.progress(Step::Commit, status);
        Ok(State::VerifyRemote)
    }

    fn verify_remote(&mut self) -> Result<State> {
        let remote = self.config.general.remote.clone();
        self.progress(Step::VerifyRemote, StepStatus::Running);

        if self.probe().remote_url(&remote)?.is_some() {
            self.progress(Step::VerifyRemote, StepStatus::Ok);
            return Ok(State::Push);
        }

        self.progress(Step::VerifyRemote, StepStatus::Missing);
        let url = self
            .operator
            .remote_url(&remote)
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        let Some(url) = url else {
            return Ok(State::Aborted(AbortReason::NoRemote));
        };

        if has_embedded_credentials(&url) {
            warn!(url = %mask_url(&url), "remote URL carries credentials and will be stored as-is");
        }

        let added = self.probe().add_remote(&remote, &url);
        match added {
            Ok(()) => {
                info!(remote = %remote, url = %mask_url(&url), "added remote");
                self.progress(Step::VerifyRemote, StepStatus::Added);
                Ok(State::Push)
            }
            Err(GitError::CommandFailed { stderr, .. }) => {
                self.last_output = stderr;
                self.progress(Step::VerifyRemote, StepStatus::Failed);
                Ok(State::Failed)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn push(&mut self) -> Result<State> {
        let branch = self.probe().current_branch()?;
        self.branch = Some(branch.clone());
        let remote = self.config.general.remote.clone();

        self.progress(Step::Push, StepStatus::Running);
        let out = self.scoped(&["push", "-u", &remote, &branch])?;
        let outcome = self.config.phrases.classify_push(&out);
        self.record(&out);

        let next = match outcome {
            PushOutcome::Pushed => {
                self.progress(Step::Push, StepStatus::Done);
                State::Done
            }
            PushOutcome::UpToDate if self.config.general.stale_push_check => {
                self.progress(Step::Push, StepStatus::Stuck);
                State::Resolve(Divergence::Stale)
            }
            PushOutcome::UpToDate => {
                self.progress(Step::Push, StepStatus::Done);
                State::Done
            }
            PushOutcome::Diverged => {
                self.progress(Step::Push, StepStatus::Conflict);
                State::Resolve(Divergence::Diverged)
            }
            PushOutcome::Failed => {
                self.progress(Step::Push, StepStatus::Failed);
                State::Failed
            }
        };
        Ok(next)
    }

    fn resolve(&mut self, divergence: Divergence) -> Result<State> {
        self.divergence = Some(divergence);
        let resolution = self.operator.resolve(divergence);
        self.resolution = Some(resolution);
        info!(?divergence, ?resolution, "resolving push");

        match resolution {
            Resolution::Cancel => Ok(State::Aborted(AbortReason::Cancelled)),
            Resolution::RebaseRetry => self.rebase_retry(),
            Resolution::ForcePush => self.force_push(divergence),
        }
    }

    fn rebase_retry(&mut self) -> Result<State> {
        let (remote, branch) = self.target();

        self.progress(Step::Pull, StepStatus::Running);
        let pull = self.scoped(&["pull", "--rebase", &remote, &branch])?;
        self.record(&pull);

        if !pull.success() {
            self.progress(Step::Pull, StepStatus::Failed);
            // Leave the working tree as it was before the pull.
            let abort = self.plain(&["rebase", "--abort"])?;
            if !abort.success() {
                debug!("no rebase in progress to abort");
            }
            return Ok(State::Failed);
        }
        self.progress(Step::Pull, StepStatus::Ok);

        self.progress(Step::RetryPush, StepStatus::Running);
        let retry = self.scoped(&["push", "-u", &remote, &branch])?;
        self.record(&retry);
        Ok(self.settle(Step::RetryPush, &retry))
    }

    fn force_push(&mut self, divergence: Divergence) -> Result<State> {
        let (remote, branch) = self.target();
        self.progress(Step::ForcePush, StepStatus::Running);

        if divergence == Divergence::Stale {
            let marker = self.plain(&["commit", "--allow-empty", "-m", FORCED_UPDATE_MESSAGE])?;
            if !marker.success() {
                warn!(exit_code = marker.exit_code, "could not create marker commit");
            }
        }

        let out = self.scoped(&["push", "-u", &remote, &branch, "--force"])?;
        self.record(&out);
        Ok(self.settle(Step::ForcePush, &out))
    }

    // === Helpers ===

    fn settle(&mut self, step: Step, out: &CommandOutput) -> State {
        if out.success() {
            self.progress(step, StepStatus::Done);
            State::Done
        } else {
            self.progress(step, StepStatus::Failed);
            State::Failed
        }
    }

    fn target(&self) -> (String, String) {
        let branch = self
            .branch
            .clone()
            .unwrap_or_else(|| self.config.general.default_branch.clone());
        (self.config.general.remote.clone(), branch)
    }

    fn probe(&self) -> Probe<'_, Transcript<'a, R>> {
        Probe::new(&self.git, self.config.general.default_branch.as_str())
    }

    fn plain(&self, args: &[&str]) -> Result<CommandOutput> {
        Ok(self.git.run(args)?)
    }

    fn scoped(&self, args: &[&str]) -> Result<CommandOutput> {
        let scoper = CredentialScoper::new(&self.git, self.config.general.remote.as_str())
            .with_hosts(self.config.auth.hosts.clone());
        let credentials = self.identity.as_ref().and_then(Identity::credentials);
        Ok(scoper.run(credentials, args)?)
    }

    fn record(&mut self, out: &CommandOutput) {
        self.last_output = out.combined();
    }

    fn progress(&mut self, step: Step, status: StepStatus) {
        debug!(%step, %status, "progress");
        self.operator.progress(step, status);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::test_mocks::{MemoryStore, MockRunner, ScriptedOperator, fail, ok};
    use sluice_git::parse_credentials;

    const HTTPS_REMOTE: &str = "https://github.com/owner/repo.git";
    const FETCH_FIRST: &str = " ! [rejected]        main -> main (fetch first)\n\
                               error: failed to push some refs to 'github.com/owner/repo.git'";

    fn config() -> Config {
        let mut config = Config::default();
        config.ignore.lines.clear();
        config
    }

    fn run(
        runner: &MockRunner,
        operator: &mut ScriptedOperator,
        identity: Option<Identity>,
    ) -> PushReport {
        let config = config();
        let store = MemoryStore::default();
        PushSession::new(runner, &config)
            .run(&store, operator, identity, "update")
            .unwrap()
    }

    fn alice() -> Identity {
        Identity::new("work", "alice@example.com", "alice@example.com").with_token("ghp_t0k:en")
    }

    #[test]
    fn test_empty_directory_without_remote_aborts() {
        let runner = MockRunner::uninitialized().on(
            &["commit"],
            fail(1, "nothing to commit (create/copy files and use \"git add\" to track)"),
        );
        let mut operator = ScriptedOperator::new();

        let config = config();
        let store = MemoryStore::default();
        let report = PushSession::new(&runner, &config)
            .run(&store, &mut operator, None, "init")
            .unwrap();

        assert_eq!(report.outcome, Outcome::Aborted);
        assert_eq!(report.abort_reason, Some(AbortReason::NoRemote));
        assert_eq!(report.init, Some(InitStatus::Init));
        assert_eq!(report.commit, Some(CommitOutcome::NothingToCommit));
        assert_eq!(operator.remote_prompts, 1);
        assert!(runner.called(&["add", "."]));
        assert!(!runner.called(&["push"]));
    }

    #[test]
    fn test_repeated_no_op_commit_is_soft_success() {
        let runner = MockRunner::new()
            .with_remote("origin", HTTPS_REMOTE)
            .on(&["commit"], fail(1, "nothing to commit, working tree clean"))
            .on(&["push"], ok("", "   1a2b3c..4d5e6f  main -> main"));

        for _ in 0..2 {
            let mut operator = ScriptedOperator::new();
            let report = run(&runner, &mut operator, None);
            assert_eq!(report.commit, Some(CommitOutcome::NothingToCommit));
            assert_eq!(report.outcome, Outcome::Done);
            assert!(operator.has_event(Step::Commit, StepStatus::Skipped));
        }
    }

    #[test]
    fn test_commit_failure_still_pushes() {
        let runner = MockRunner::new()
            .with_remote("origin", HTTPS_REMOTE)
            .on(&["commit"], fail(128, "*** Please tell me who you are."))
            .on(&["push"], ok("", "   1a2b3c..4d5e6f  main -> main"));
        let mut operator = ScriptedOperator::new();

        let report = run(&runner, &mut operator, None);

        assert_eq!(report.commit, Some(CommitOutcome::Failed));
        assert_eq!(report.outcome, Outcome::Done);
        assert!(operator.has_event(Step::Commit, StepStatus::Error));
    }

    #[test]
    fn test_push_in_sync_is_done_with_scoped_credentials() {
        let runner = MockRunner::new()
            .with_remote("origin", HTTPS_REMOTE)
            .on(&["push"], ok("", "   1a2b3c..4d5e6f  main -> main"));
        let mut operator = ScriptedOperator::new();

        let report = run(&runner, &mut operator, Some(alice()));

        assert_eq!(report.outcome, Outcome::Done);
        assert_eq!(report.branch.as_deref(), Some("main"));
        assert!(runner.called(&["push", "-u", "origin", "main"]));
        assert!(runner.called(&["config", "user.name", "alice@example.com"]));

        let seen = runner.network_urls();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            parse_credentials(seen[0].as_deref().unwrap()),
            Some(("alice@example.com".to_string(), "ghp_t0k:en".to_string()))
        );
        assert_eq!(runner.remote("origin").as_deref(), Some(HTTPS_REMOTE));
    }

    #[test]
    fn test_transcript_never_contains_token() {
        let runner = MockRunner::new()
            .with_remote("origin", HTTPS_REMOTE)
            .on(&["push"], ok("", "done"));
        let mut operator = ScriptedOperator::new();

        let report = run(&runner, &mut operator, Some(alice()));

        assert!(report.transcript.iter().any(|e| e.command.contains("set-url")));
        for entry in &report.transcript {
            assert!(!entry.command.contains("ghp_t0k"), "{}", entry.command);
            assert!(!entry.command.contains("ghp_t0k%3Aen"), "{}", entry.command);
        }
    }

    #[test]
    fn test_fetch_first_resolves_with_force_push() {
        let runner = MockRunner::new()
            .with_remote("origin", HTTPS_REMOTE)
            .on(&["push"], fail(1, FETCH_FIRST))
            .on(&["push"], ok("", " + 1a2b3c...4d5e6f main -> main (forced update)"));
        let mut operator = ScriptedOperator::new().resolving(Resolution::ForcePush);

        let report = run(&runner, &mut operator, Some(alice()));

        assert_eq!(report.outcome, Outcome::Done);
        assert_eq!(operator.asked, vec![Divergence::Diverged]);
        assert_eq!(report.divergence, Some(Divergence::Diverged));
        assert!(runner.called(&["push", "-u", "origin", "main", "--force"]));
        assert!(!runner.called(&["commit", "--allow-empty"]));
        assert_eq!(runner.remote("origin").as_deref(), Some(HTTPS_REMOTE));
    }

    #[test]
    fn test_non_fast_forward_goes_to_resolve() {
        let runner = MockRunner::new().with_remote("origin", HTTPS_REMOTE).on(
            &["push"],
            fail(1, " ! [rejected]  main -> main (non-fast-forward)"),
        );
        let mut operator = ScriptedOperator::new().resolving(Resolution::Cancel);

        let report = run(&runner, &mut operator, None);

        assert_eq!(operator.asked, vec![Divergence::Diverged]);
        assert_eq!(report.outcome, Outcome::Aborted);
        assert_eq!(report.abort_reason, Some(AbortReason::Cancelled));
        assert!(operator.has_event(Step::Push, StepStatus::Conflict));
    }

    #[test]
    fn test_up_to_date_push_is_stale() {
        let runner = MockRunner::new()
            .with_remote("origin", HTTPS_REMOTE)
            .on(&["push"], ok("", "Everything up-to-date"))
            .on(&["push"], ok("", " + abc...def main -> main (forced update)"));
        let mut operator = ScriptedOperator::new().resolving(Resolution::ForcePush);

        let report = run(&runner, &mut operator, None);

        assert_eq!(operator.asked, vec![Divergence::Stale]);
        assert!(runner.called(&["commit", "--allow-empty", "-m", FORCED_UPDATE_MESSAGE]));
        assert!(runner.called(&["push", "-u", "origin", "main", "--force"]));
        assert_eq!(report.outcome, Outcome::Done);
    }

    #[test]
    fn test_stale_check_can_be_disabled() {
        let runner = MockRunner::new()
            .with_remote("origin", HTTPS_REMOTE)
            .on(&["push"], ok("", "Everything up-to-date"));
        let mut operator = ScriptedOperator::new();
        let mut config = config();
        config.general.stale_push_check = false;

        let report = PushSession::new(&runner, &config)
            .run(&MemoryStore::default(), &mut operator, None, "msg")
            .unwrap();

        assert_eq!(report.outcome, Outcome::Done);
        assert!(operator.asked.is_empty());
    }

    #[test]
    fn test_rebase_retry_succeeds() {
        let runner = MockRunner::new()
            .with_remote("origin", HTTPS_REMOTE)
            .on(&["push"], fail(1, FETCH_FIRST))
            .on(&["push"], ok("", "   1a2b3c..4d5e6f  main -> main"))
            .on(&["pull"], ok("Successfully rebased and updated refs/heads/main.", ""));
        let mut operator = ScriptedOperator::new().resolving(Resolution::RebaseRetry);

        let report = run(&runner, &mut operator, Some(alice()));

        assert_eq!(report.outcome, Outcome::Done);
        assert!(runner.called(&["pull", "--rebase", "origin", "main"]));
        assert!(!runner.called(&["rebase", "--abort"]));
        assert!(operator.has_event(Step::RetryPush, StepStatus::Done));
        // The pull and both pushes all ran with credentials in place.
        assert_eq!(runner.network_urls().len(), 3);
        assert!(runner.network_urls().iter().all(|u| {
            u.as_deref().is_some_and(sluice_git::has_embedded_credentials)
        }));
        assert_eq!(runner.remote("origin").as_deref(), Some(HTTPS_REMOTE));
    }

    #[test]
    fn test_failed_rebase_is_aborted() {
        let runner = MockRunner::new()
            .with_remote("origin", HTTPS_REMOTE)
            .on(&["push"], fail(1, FETCH_FIRST))
            .on(
                &["pull"],
                fail(1, "CONFLICT (content): Merge conflict in shared.txt"),
            );
        let mut operator = ScriptedOperator::new().resolving(Resolution::RebaseRetry);

        let report = run(&runner, &mut operator, None);

        assert_eq!(report.outcome, Outcome::Failed);
        assert!(runner.called(&["rebase", "--abort"]));
        assert!(report.last_output.contains("CONFLICT"));
        assert_eq!(runner.count(&["push"]), 1);
    }

    #[test]
    fn test_retry_push_failure_is_failed() {
        let runner = MockRunner::new()
            .with_remote("origin", HTTPS_REMOTE)
            .on(&["push"], fail(1, FETCH_FIRST))
            .on(&["push"], fail(1, "remote: rejected by hook"));
        let mut operator = ScriptedOperator::new().resolving(Resolution::RebaseRetry);

        let report = run(&runner, &mut operator, None);

        assert_eq!(report.outcome, Outcome::Failed);
        assert!(report.last_output.contains("rejected by hook"));
        assert_eq!(operator.asked.len(), 1);
    }

    #[test]
    fn test_failed_force_push_is_failed() {
        let runner = MockRunner::new()
            .with_remote("origin", HTTPS_REMOTE)
            .on(&["push"], fail(1, FETCH_FIRST))
            .on(&["push"], fail(1, "remote: protected branch"));
        let mut operator = ScriptedOperator::new().resolving(Resolution::ForcePush);

        let report = run(&runner, &mut operator, None);

        assert_eq!(report.outcome, Outcome::Failed);
        assert!(operator.has_event(Step::ForcePush, StepStatus::Failed));
    }

    #[test]
    fn test_other_push_failure_is_failed_without_resolving() {
        let runner = MockRunner::new().with_remote("origin", HTTPS_REMOTE).on(
            &["push"],
            fail(128, "fatal: Authentication failed for 'https://github.com/owner/repo.git/'"),
        );
        let mut operator = ScriptedOperator::new();

        let report = run(&runner, &mut operator, None);

        assert_eq!(report.outcome, Outcome::Failed);
        assert!(operator.asked.is_empty());
        assert!(report.last_output.contains("Authentication failed"));
    }

    #[test]
    fn test_missing_remote_is_added_from_operator() {
        let runner = MockRunner::new().on(&["push"], ok("", " * [new branch] main -> main"));
        let mut operator = ScriptedOperator::new().with_remote_url(" https://github.com/o/new.git ");

        let report = run(&runner, &mut operator, None);

        assert_eq!(report.outcome, Outcome::Done);
        assert_eq!(
            runner.remote("origin").as_deref(),
            Some("https://github.com/o/new.git")
        );
        assert!(operator.has_event(Step::VerifyRemote, StepStatus::Added));
    }

    #[test]
    fn test_identity_without_token_prompts_and_persists() {
        let store = MemoryStore::with(vec![Identity::new("work", "alice", "a@x.com")]);
        let runner = MockRunner::new()
            .with_remote("origin", HTTPS_REMOTE)
            .on(&["push"], ok("", "   1a2b3c..4d5e6f  main -> main"));
        let mut operator = ScriptedOperator::new().with_token("ghp_fresh");
        let identity = store.find("work").unwrap();

        let report = PushSession::new(&runner, &config())
            .run(&store, &mut operator, identity, "msg")
            .unwrap();

        assert_eq!(report.outcome, Outcome::Done);
        assert_eq!(operator.token_prompts, 1);
        let saved = store.find("work").unwrap().unwrap();
        assert_eq!(saved.token.unwrap().expose_secret(), "ghp_fresh");
        assert!(saved.token_updated_at.is_some());
        assert!(runner.network_urls()[0]
            .as_deref()
            .is_some_and(|u| u.contains("ghp_fresh")));
    }

    #[test]
    fn test_declined_token_aborts_before_any_git_command() {
        let runner = MockRunner::new().with_remote("origin", HTTPS_REMOTE);
        let mut operator = ScriptedOperator::new();

        let report = run(&runner, &mut operator, Some(Identity::new("w", "alice", "")));

        assert_eq!(report.outcome, Outcome::Aborted);
        assert_eq!(report.abort_reason, Some(AbortReason::NoToken));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_empty_message_is_rejected() {
        let runner = MockRunner::new();
        let mut operator = ScriptedOperator::new();

        let result = PushSession::new(&runner, &config()).run(
            &MemoryStore::default(),
            &mut operator,
            None,
            "   ",
        );
        assert!(matches!(result, Err(Error::EmptyMessage)));
    }

    #[test]
    fn test_timeout_fails_and_restores_remote() {
        let runner = MockRunner::new()
            .with_remote("origin", HTTPS_REMOTE)
            .timing_out(&["push"]);
        let mut operator = ScriptedOperator::new();

        let report = run(&runner, &mut operator, Some(alice()));

        assert_eq!(report.outcome, Outcome::Failed);
        assert!(report.last_output.contains("timed out"));
        assert_eq!(runner.remote("origin").as_deref(), Some(HTTPS_REMOTE));
    }

    #[test]
    fn test_detached_head_moves_to_default_branch() {
        let runner = MockRunner::new()
            .with_branch(None)
            .with_remote("origin", HTTPS_REMOTE)
            .on(&["push"], ok("", "   1a2b3c..4d5e6f  main -> main"));
        let mut operator = ScriptedOperator::new();

        let report = run(&runner, &mut operator, None);

        assert!(runner.called(&["checkout", "-B", "main"]));
        assert_eq!(report.branch.as_deref(), Some("main"));
    }

    #[test]
    fn test_progress_events_for_clean_push() {
        let runner = MockRunner::new()
            .with_remote("origin", HTTPS_REMOTE)
            .on(&["push"], ok("", "   1a2b3c..4d5e6f  main -> main"));
        let mut operator = ScriptedOperator::new();

        run(&runner, &mut operator, None);

        let finals: Vec<_> = operator
            .events
            .iter()
            .filter(|(_, status)| status.is_final())
            .copied()
            .collect();
        assert_eq!(
            finals,
            vec![
                (Step::Initialize, StepStatus::Ok),
                (Step::Stage, StepStatus::Ok),
                (Step::Commit, StepStatus::Ok),
                (Step::VerifyRemote, StepStatus::Ok),
                (Step::Push, StepStatus::Done),
            ]
        );
    }

    #[test]
    fn test_locked_repository_is_an_error() {
        let runner = MockRunner::new().with_remote("origin", HTTPS_REMOTE);
        let _held = RepoLock::acquire(&runner.workdir().join(".git")).unwrap();
        let mut operator = ScriptedOperator::new();

        let result = PushSession::new(&runner, &config()).run(
            &MemoryStore::default(),
            &mut operator,
            None,
            "msg",
        );

        assert!(matches!(result, Err(Error::Git(GitError::Locked(_)))));
    }
}
