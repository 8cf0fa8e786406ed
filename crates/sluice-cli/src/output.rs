//! Terminal output formatting utilities.

use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;
use sluice_core::{Outcome, StepStatus};

static QUIET_MODE: AtomicBool = AtomicBool::new(false);

/// Set quiet mode globally. Call once at startup.
pub fn set_quiet(quiet: bool) {
    QUIET_MODE.store(quiet, Ordering::Relaxed);
}

pub fn is_quiet() -> bool {
    QUIET_MODE.load(Ordering::Relaxed)
}

/// Print a success message (suppressed in quiet mode).
pub fn success(msg: &str) {
    if !is_quiet() {
        println!("{} {}", "✓".green(), msg);
    }
}

/// Print an error message (always prints to stderr).
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a warning message (always prints to stderr).
pub fn warn(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

/// Print an info message (suppressed in quiet mode).
pub fn info(msg: &str) {
    if !is_quiet() {
        println!("{} {}", "→".blue(), msg);
    }
}

/// Print a detail line without prefix (suppressed in quiet mode).
///
/// Use for indented detail lines that accompany info or warn messages.
pub fn detail(msg: &str) {
    if !is_quiet() {
        println!("{msg}");
    }
}

/// Print essential machine-readable output (always prints).
///
/// Use for results that should be available for piping, like account lists.
pub fn essential(msg: &str) {
    println!("{msg}");
}

/// Print captured tool output indented under an error (always to stderr).
pub fn tool_output(text: &str) {
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        eprintln!("    {}", line.dimmed());
    }
}

/// One finished step, e.g. `Pushing          DONE`.
#[must_use]
pub fn step_line(label: &str, status: StepStatus) -> String {
    format!("{label:<16} {}", status_label(status))
}

/// Colored status word for a step.
#[must_use]
pub fn status_label(status: StepStatus) -> String {
    let text = status.to_string();
    match status {
        StepStatus::Ok | StepStatus::Init | StepStatus::Added | StepStatus::Done => {
            text.green().to_string()
        }
        StepStatus::Skipped | StepStatus::Running => text.dimmed().to_string(),
        StepStatus::Missing | StepStatus::Conflict | StepStatus::Stuck => {
            text.yellow().to_string()
        }
        StepStatus::Error | StepStatus::Failed => text.red().to_string(),
    }
}

/// Colored terminal outcome.
#[must_use]
pub fn outcome_label(outcome: Outcome) -> String {
    let text = outcome.to_string();
    match outcome {
        Outcome::Done => text.green().bold().to_string(),
        Outcome::Failed => text.red().bold().to_string(),
        Outcome::Aborted => text.yellow().bold().to_string(),
    }
}

/// Print a horizontal line (suppressed in quiet mode).
pub fn hr() {
    if !is_quiet() {
        println!("{}", "─".repeat(50).dimmed());
    }
}
