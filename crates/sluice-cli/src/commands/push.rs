//! `sluice push` command - commit a directory and push it.

use std::path::Path;

use anyhow::{Context, Result, bail};
use sluice_core::{AbortReason, Identity, IdentityStore, Outcome, PushReport, Resolution, run_push};

use super::{App, PushArgs};
use crate::output;
use crate::prompt::{self, TerminalOperator};

/// Run the push command.
pub fn run(app: &App, args: PushArgs) -> Result<()> {
    let workdir = match args.path {
        Some(path) => path,
        None => std::env::current_dir().context("Cannot read current directory")?,
    };

    let identity = match &args.account {
        Some(alias) => Some(
            app.store
                .find(alias)?
                .with_context(|| format!("No saved account with alias '{alias}'"))?,
        ),
        None => None,
    };

    let message = match args.message {
        Some(message) => message,
        None => match prompt::commit_message()? {
            Some(message) => message,
            None => bail!("Cancelled"),
        },
    };

    let operator = TerminalOperator::new(args.on_conflict, args.remote_url);
    execute(app, &workdir, identity, &message, operator)
}

/// Push `workdir` and print the result.
pub fn execute(
    app: &App,
    workdir: &Path,
    identity: Option<Identity>,
    message: &str,
    mut operator: TerminalOperator,
) -> Result<()> {
    if !workdir.is_dir() {
        bail!("{} is not a directory", workdir.display());
    }

    match &identity {
        Some(identity) => output::info(&format!(
            "Pushing {} as {}",
            workdir.display(),
            identity.alias
        )),
        None => output::info(&format!("Pushing {}", workdir.display())),
    }

    let report = run_push(
        workdir,
        identity,
        message,
        &app.config,
        &app.store,
        &mut operator,
    )
    .context("Push could not run")?;
    drop(operator);

    report_outcome(&report)
}

fn report_outcome(report: &PushReport) -> Result<()> {
    output::hr();
    let label = output::outcome_label(report.outcome);

    match report.outcome {
        Outcome::Done => {
            let branch = report.branch.as_deref().unwrap_or("branch");
            output::success(&format!("{label} - {branch} is on the remote"));
            Ok(())
        }
        Outcome::Aborted => {
            let why = match report.abort_reason {
                Some(AbortReason::NoToken) => "no token was given",
                Some(AbortReason::NoRemote) => "no remote URL was given",
                Some(AbortReason::Cancelled) | None => "cancelled",
            };
            output::warn(&format!("{label} - {why}"));
            Ok(())
        }
        Outcome::Failed => {
            output::error(&label);
            output::tool_output(&report.last_output);
            match report.resolution {
                Some(Resolution::RebaseRetry) => {
                    bail!("Rebase and retry did not complete")
                }
                Some(Resolution::ForcePush) => bail!("Force push failed"),
                _ => bail!("Push failed"),
            }
        }
    }
}
