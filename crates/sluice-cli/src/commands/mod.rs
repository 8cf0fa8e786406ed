//! CLI command definitions and implementations.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use sluice_core::{Config, JsonIdentityStore};

pub mod accounts;
pub mod completions;
pub mod config;
pub mod menu;
pub mod push;

/// sluice - commit and push any directory as any saved identity.
#[derive(Parser)]
#[command(name = "sluice")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (defaults to <config dir>/sluice/config.toml).
    #[arg(long, global = true, env = "SLUICE_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Show debug logs on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress informational output.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Without a command, an interactive menu opens.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Commit everything in a directory and push it.
    ///
    /// Initializes the repository if needed, stages all changes, commits,
    /// and pushes the current branch. Rejected or stale pushes can be
    /// resolved by rebasing or force-pushing.
    Push(PushArgs),

    /// Manage saved accounts.
    #[command(subcommand, alias = "account")]
    Accounts(AccountsCommand),

    /// Show the effective configuration and where it comes from.
    Config,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct PushArgs {
    /// Directory to push. Defaults to the current directory.
    pub path: Option<PathBuf>,

    /// Commit message. Prompted for when omitted.
    #[arg(short, long)]
    pub message: Option<String>,

    /// Saved account to push as. Uses git's own configuration when omitted.
    #[arg(short = 'a', long = "account", value_name = "ALIAS")]
    pub account: Option<String>,

    /// URL to add if the remote does not exist yet.
    #[arg(long, value_name = "URL")]
    pub remote_url: Option<String>,

    /// What to do when the push is rejected or nothing was sent.
    #[arg(long, value_enum, default_value_t = ConflictPolicy::Ask)]
    pub on_conflict: ConflictPolicy,
}

/// Answer to a divergence, decided up front or at the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConflictPolicy {
    /// Ask interactively.
    Ask,
    /// Pull with rebase and push again.
    Rebase,
    /// Overwrite the remote branch.
    Force,
    /// Stop without changing the remote.
    Abort,
}

#[derive(Subcommand)]
pub enum AccountsCommand {
    /// List saved accounts.
    #[command(alias = "ls")]
    List,

    /// Save a new account. Prompts for anything not given.
    Add(AccountFields),

    /// Change a saved account. Prompts when no field is given.
    Edit {
        /// Alias of the account to change.
        #[arg(value_name = "ALIAS")]
        target: String,

        #[command(flatten)]
        fields: AccountFields,
    },

    /// Delete a saved account.
    #[command(alias = "rm")]
    Remove {
        /// Alias of the account to delete.
        #[arg(value_name = "ALIAS")]
        target: String,

        /// Skip confirmation.
        #[arg(short, long)]
        yes: bool,
    },

    /// Set or replace an account's token.
    Token {
        /// Alias of the account.
        #[arg(value_name = "ALIAS")]
        target: String,

        /// New token. Prompted for (hidden) when omitted.
        #[arg(long)]
        token: Option<String>,
    },
}

#[derive(Args, Default)]
pub struct AccountFields {
    /// Unique name for the account.
    #[arg(long)]
    pub alias: Option<String>,

    /// GitHub username, also used as commit author name.
    #[arg(long)]
    pub username: Option<String>,

    /// Commit email.
    #[arg(long)]
    pub email: Option<String>,

    /// Personal access token.
    #[arg(long)]
    pub token: Option<String>,
}

impl AccountFields {
    /// Whether any field was given on the command line.
    pub const fn any(&self) -> bool {
        self.alias.is_some() || self.username.is_some() || self.email.is_some() || self.token.is_some()
    }
}

/// Loaded configuration and the identity store it points at.
pub struct App {
    pub config: Config,
    pub config_path: PathBuf,
    pub store: JsonIdentityStore,
}

impl App {
    /// Load config from `path`, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Config::default_path()?,
        };
        let config = Config::load(&config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
        let accounts_path = config.accounts_path(config_path.parent())?;

        Ok(Self {
            config,
            config_path,
            store: JsonIdentityStore::new(accounts_path),
        })
    }
}
