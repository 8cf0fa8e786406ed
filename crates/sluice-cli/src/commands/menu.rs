//! Interactive main menu, shown when sluice runs without a command.

use std::fmt;

use anyhow::Result;
use colored::Colorize;
use console::Term;
use inquire::Select;
use sluice_core::IdentityStore;

use super::{AccountFields, App, ConflictPolicy, accounts, push};
use crate::output;
use crate::prompt::{self, TerminalOperator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MainItem {
    Push,
    Accounts,
    Exit,
}

impl fmt::Display for MainItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Push => "Push a directory",
            Self::Accounts => "Manage accounts",
            Self::Exit => "Exit",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccountItem {
    List,
    Add,
    Edit,
    Remove,
    Token,
    Back,
}

impl fmt::Display for AccountItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::List => "List accounts",
            Self::Add => "Add account",
            Self::Edit => "Edit account",
            Self::Remove => "Remove account",
            Self::Token => "Update token",
            Self::Back => "Back",
        })
    }
}

/// Run the menu until the user exits.
pub fn run(app: &App) -> Result<()> {
    loop {
        clear_screen();
        output::detail(&format!("{}\n", "sluice".cyan().bold()));

        let items = vec![MainItem::Push, MainItem::Accounts, MainItem::Exit];
        let Some(item) = prompt::optional(Select::new("What do you want to do?", items).prompt())?
        else {
            return Ok(());
        };

        match item {
            MainItem::Push => {
                report(push_flow(app));
                pause();
            }
            MainItem::Accounts => accounts_menu(app)?,
            MainItem::Exit => return Ok(()),
        }
    }
}

fn push_flow(app: &App) -> Result<()> {
    let Some(dir) = prompt::choose_directory()? else {
        return Ok(());
    };
    let identity = prompt::choose_identity(app.store.list()?)?;
    let Some(message) = prompt::commit_message()? else {
        return Ok(());
    };

    let operator = TerminalOperator::new(ConflictPolicy::Ask, None);
    push::execute(app, &dir, identity, &message, operator)
}

fn accounts_menu(app: &App) -> Result<()> {
    loop {
        clear_screen();
        let items = vec![
            AccountItem::List,
            AccountItem::Add,
            AccountItem::Edit,
            AccountItem::Remove,
            AccountItem::Token,
            AccountItem::Back,
        ];
        let Some(item) = prompt::optional(Select::new("Accounts:", items).prompt())? else {
            return Ok(());
        };

        let result = match item {
            AccountItem::List => accounts::list(app),
            AccountItem::Add => accounts::add(app, AccountFields::default()),
            AccountItem::Edit => with_alias(app, |alias| {
                accounts::edit(app, alias, AccountFields::default())
            }),
            AccountItem::Remove => with_alias(app, |alias| accounts::remove(app, alias, false)),
            AccountItem::Token => with_alias(app, |alias| accounts::set_token(app, alias, None)),
            AccountItem::Back => return Ok(()),
        };
        report(result);
        pause();
    }
}

/// Pick a saved alias and run `action` on it.
fn with_alias(app: &App, action: impl FnOnce(&str) -> Result<()>) -> Result<()> {
    let aliases: Vec<String> = app.store.list()?.into_iter().map(|i| i.alias).collect();
    if aliases.is_empty() {
        output::info("No saved accounts");
        return Ok(());
    }

    match prompt::optional(Select::new("Account:", aliases).prompt())? {
        Some(alias) => action(&alias),
        None => Ok(()),
    }
}

fn report(result: Result<()>) {
    if let Err(e) = result {
        output::error(&format!("{e:#}"));
    }
}

fn clear_screen() {
    if let Err(e) = Term::stdout().clear_screen() {
        tracing::debug!(error = %e, "could not clear screen");
    }
}

fn pause() {
    output::detail(&format!("\n{}", "Press Enter to continue".dimmed()));
    if let Err(e) = Term::stdout().read_line() {
        tracing::debug!(error = %e, "could not read from terminal");
    }
}
