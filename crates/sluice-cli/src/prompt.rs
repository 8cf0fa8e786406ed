//! Interactive prompts and the terminal [`Operator`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::validator::Validation;
use inquire::{InquireError, Password, PasswordDisplayMode, Select, Text};
use secrecy::SecretString;
use sluice_core::{Divergence, Identity, Operator, Resolution, Step, StepStatus};

use crate::commands::ConflictPolicy;
use crate::output;

/// Map a cancelled prompt (Esc / Ctrl-C) to `None`.
pub fn optional<T>(result: inquire::error::InquireResult<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(e) => Err(e).context("Prompt failed"),
    }
}

/// Ask for a directory, defaulting to the current one.
pub fn choose_directory() -> Result<Option<PathBuf>> {
    let current = std::env::current_dir().context("Cannot read current directory")?;
    let answer = Text::new("Directory to push:")
        .with_default(&current.to_string_lossy())
        .with_validator(|input: &str| {
            if Path::new(input.trim()).is_dir() {
                Ok(Validation::Valid)
            } else {
                Ok(Validation::Invalid("Not a directory".into()))
            }
        })
        .prompt();

    Ok(optional(answer)?.map(|dir| PathBuf::from(dir.trim())))
}

/// Ask for a non-empty commit message.
pub fn commit_message() -> Result<Option<String>> {
    let answer = Text::new("Commit message:")
        .with_validator(|input: &str| {
            if input.trim().is_empty() {
                Ok(Validation::Invalid("Message cannot be empty".into()))
            } else {
                Ok(Validation::Valid)
            }
        })
        .prompt();
    optional(answer)
}

/// Ask for a token without echoing it.
pub fn token(message: &str) -> Result<Option<SecretString>> {
    let answer = Password::new(message)
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Masked)
        .prompt();

    Ok(optional(answer)?
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .map(SecretString::from))
}

/// Entry in the identity picker.
struct IdentityChoice(Option<Identity>);

impl fmt::Display for IdentityChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(identity) => write!(
                f,
                "{} ({} <{}>)",
                identity.alias, identity.username, identity.email
            ),
            None => f.write_str("No account (use git's own configuration)"),
        }
    }
}

/// Pick a saved identity. `Ok(None)` means "no identity", cancelling is `Err`.
pub fn choose_identity(identities: Vec<Identity>) -> Result<Option<Identity>> {
    if identities.is_empty() {
        return Ok(None);
    }

    let mut choices: Vec<IdentityChoice> = identities
        .into_iter()
        .map(|i| IdentityChoice(Some(i)))
        .collect();
    choices.push(IdentityChoice(None));

    let choice = Select::new("Push as:", choices)
        .prompt()
        .context("Selection cancelled")?;
    Ok(choice.0)
}

#[derive(Clone, Copy)]
struct ResolutionChoice(Resolution);

impl fmt::Display for ResolutionChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self.0 {
            Resolution::RebaseRetry => "Pull with rebase, then push again",
            Resolution::ForcePush => "Force push (overwrite the remote branch)",
            Resolution::Cancel => "Cancel",
        })
    }
}

/// [`Operator`] backed by the terminal.
///
/// Renders each step as a spinner while it runs and a status line when it
/// finishes. Answers given on the command line are used instead of prompts.
pub struct TerminalOperator {
    policy: ConflictPolicy,
    remote_url: Option<String>,
    spinner: Option<ProgressBar>,
}

impl TerminalOperator {
    pub const fn new(policy: ConflictPolicy, remote_url: Option<String>) -> Self {
        Self {
            policy,
            remote_url,
            spinner: None,
        }
    }

    fn start_spinner(&mut self, step: Step) {
        self.clear_spinner();
        if output::is_quiet() {
            return;
        }

        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        let spinner = ProgressBar::new_spinner()
            .with_style(style)
            .with_message(step.to_string());
        spinner.enable_steady_tick(Duration::from_millis(80));
        self.spinner = Some(spinner);
    }

    fn clear_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

impl Drop for TerminalOperator {
    fn drop(&mut self) {
        self.clear_spinner();
    }
}

impl Operator for TerminalOperator {
    fn remote_url(&mut self, remote: &str) -> Option<String> {
        self.clear_spinner();
        if let Some(url) = self.remote_url.take() {
            return Some(url);
        }

        output::warn(&format!("Remote '{remote}' is not configured"));
        let answer = Text::new("Repository URL:")
            .with_help_message("Leave empty to cancel")
            .prompt();
        match optional(answer) {
            Ok(url) => url.filter(|u| !u.trim().is_empty()),
            Err(e) => {
                output::error(&format!("{e:#}"));
                None
            }
        }
    }

    fn token_for(&mut self, identity: &Identity) -> Option<SecretString> {
        self.clear_spinner();
        output::warn(&format!("Account '{}' has no token", identity.alias));
        match token(&format!("Token for {}:", identity.username)) {
            Ok(token) => token,
            Err(e) => {
                output::error(&format!("{e:#}"));
                None
            }
        }
    }

    fn resolve(&mut self, divergence: Divergence) -> Resolution {
        self.clear_spinner();
        match self.policy {
            ConflictPolicy::Rebase => return Resolution::RebaseRetry,
            ConflictPolicy::Force => return Resolution::ForcePush,
            ConflictPolicy::Abort => return Resolution::Cancel,
            ConflictPolicy::Ask => {}
        }

        match divergence {
            Divergence::Diverged => output::warn("The remote has commits you don't have"),
            Divergence::Stale => {
                output::warn("git sent nothing: the remote already matches this branch");
            }
        }

        let choices = vec![
            ResolutionChoice(Resolution::RebaseRetry),
            ResolutionChoice(Resolution::ForcePush),
            ResolutionChoice(Resolution::Cancel),
        ];
        match optional(Select::new("How do you want to continue?", choices).prompt()) {
            Ok(Some(choice)) => choice.0,
            Ok(None) => Resolution::Cancel,
            Err(e) => {
                output::error(&format!("{e:#}"));
                Resolution::Cancel
            }
        }
    }

    fn progress(&mut self, step: Step, status: StepStatus) {
        if status.is_final() {
            self.clear_spinner();
            if !output::is_quiet() {
                println!("{}", output::step_line(&step.to_string(), status));
            }
        } else {
            self.start_spinner(step);
        }
    }
}
