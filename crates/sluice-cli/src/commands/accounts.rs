//! `sluice accounts` command - manage saved identities.

use anyhow::{Context, Result, bail};
use chrono::Local;
use colored::Colorize;
use inquire::{Confirm, Text};
use secrecy::{ExposeSecret, SecretString};
use sluice_core::{Identity, IdentityStore};

use super::{AccountFields, AccountsCommand, App};
use crate::output;
use crate::prompt;

/// Run an accounts subcommand.
pub fn run(app: &App, command: AccountsCommand) -> Result<()> {
    match command {
        AccountsCommand::List => list(app),
        AccountsCommand::Add(fields) => add(app, fields),
        AccountsCommand::Edit { target, fields } => edit(app, &target, fields),
        AccountsCommand::Remove { target, yes } => remove(app, &target, yes),
        AccountsCommand::Token { target, token } => set_token(app, &target, token),
    }
}

/// Print every saved account with its token masked.
pub fn list(app: &App) -> Result<()> {
    let identities = app.store.list()?;
    if identities.is_empty() {
        output::info("No saved accounts - add one with `sluice accounts add`");
        return Ok(());
    }

    for identity in &identities {
        output::essential(&format_row(identity));
    }
    Ok(())
}

fn format_row(identity: &Identity) -> String {
    let updated = identity
        .token_updated_at
        .map(|at| {
            format!(
                " (set {})",
                at.with_timezone(&Local).format("%Y-%m-%d")
            )
        })
        .unwrap_or_default();
    let token = if identity.has_token() {
        identity.masked_token().normal()
    } else {
        identity.masked_token().yellow()
    };

    format!(
        "{:<14} {:<20} {:<28} {token}{}",
        identity.alias.bold(),
        identity.username,
        identity.email,
        updated.dimmed()
    )
}

/// Save a new account, prompting for fields not given.
pub fn add(app: &App, fields: AccountFields) -> Result<()> {
    let interactive = !fields.any();

    let alias = value_or_ask(fields.alias, "Alias:", None)?;
    let username = value_or_ask(fields.username, "GitHub username:", None)?;
    let email = match fields.email {
        Some(email) => email,
        None if interactive => ask("Email:", None)?,
        None => String::new(),
    };
    let token = match fields.token {
        Some(token) => Some(SecretString::from(token)),
        None if interactive => prompt::token("Token (leave empty to add it later):")?,
        None => None,
    };

    let mut identity = Identity::new(alias.trim(), username.trim(), email.trim());
    if let Some(token) = token.filter(|t| !t.expose_secret().trim().is_empty()) {
        identity.set_token(token);
    }
    let has_token = identity.has_token();
    app.store.add(identity)?;

    output::success(&format!("Saved account '{}'", alias.trim()));
    if !has_token {
        output::detail("  No token yet - you'll be asked for one on the first push");
    }
    Ok(())
}

/// Change a saved account. Without flags, every field is prompted with its
/// current value as default.
pub fn edit(app: &App, target: &str, fields: AccountFields) -> Result<()> {
    let current = find(app, target)?;
    let mut updated = current.clone();

    if fields.any() {
        if let Some(alias) = fields.alias {
            updated.alias = alias.trim().to_string();
        }
        if let Some(username) = fields.username {
            updated.username = username.trim().to_string();
        }
        if let Some(email) = fields.email {
            updated.email = email.trim().to_string();
        }
        if let Some(token) = fields.token {
            updated.set_token(SecretString::from(token));
        }
    } else {
        updated.alias = ask("Alias:", Some(&current.alias))?;
        updated.username = ask("GitHub username:", Some(&current.username))?;
        updated.email = ask("Email:", Some(&current.email))?;
        if let Some(token) = prompt::token("New token (leave empty to keep the current one):")? {
            updated.set_token(token);
        }
    }

    let alias = updated.alias.clone();
    app.store.update(target, updated)?;
    output::success(&format!("Updated account '{alias}'"));
    Ok(())
}

/// Delete a saved account after confirmation.
pub fn remove(app: &App, target: &str, yes: bool) -> Result<()> {
    find(app, target)?;

    if !yes {
        let confirmed = prompt::optional(
            Confirm::new(&format!("Delete account '{target}'?"))
                .with_default(false)
                .prompt(),
        )?
        .unwrap_or(false);
        if !confirmed {
            output::info("Nothing removed");
            return Ok(());
        }
    }

    app.store.remove(target)?;
    output::success(&format!("Removed account '{target}'"));
    Ok(())
}

/// Replace an account's token.
pub fn set_token(app: &App, target: &str, token: Option<String>) -> Result<()> {
    find(app, target)?;

    let token = match token {
        Some(token) => Some(SecretString::from(token.trim().to_string())),
        None => prompt::token(&format!("New token for '{target}':"))?,
    };
    let Some(token) = token.filter(|t| !t.expose_secret().is_empty()) else {
        bail!("No token given");
    };

    let updated = app.store.update_token(target, token)?;
    output::success(&format!(
        "Token updated for '{target}' ({})",
        updated.masked_token()
    ));
    Ok(())
}

fn find(app: &App, alias: &str) -> Result<Identity> {
    app.store
        .find(alias)?
        .with_context(|| format!("No saved account with alias '{alias}'"))
}

fn value_or_ask(value: Option<String>, message: &str, default: Option<&str>) -> Result<String> {
    match value {
        Some(value) => Ok(value),
        None => ask(message, default),
    }
}

fn ask(message: &str, default: Option<&str>) -> Result<String> {
    let mut text = Text::new(message);
    if let Some(default) = default {
        text = text.with_default(default);
    }
    match prompt::optional(text.prompt())? {
        Some(answer) => Ok(answer.trim().to_string()),
        None => bail!("Cancelled"),
    }
}
