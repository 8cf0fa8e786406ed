//! sluice CLI - commit and push any directory as any saved identity.

use std::path::Path;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod output;
mod prompt;

use commands::{App, Cli, Commands};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    output::set_quiet(cli.quiet);

    let result = match cli.command {
        // Completions must work even with a broken config file.
        Some(Commands::Completions { shell }) => commands::completions::run(shell),
        command => dispatch(cli.config.as_deref(), command),
    };

    if let Err(e) = result {
        output::error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

fn dispatch(config: Option<&Path>, command: Option<Commands>) -> anyhow::Result<()> {
    let app = App::load(config)?;
    match command {
        None => commands::menu::run(&app),
        Some(Commands::Push(args)) => commands::push::run(&app, args),
        Some(Commands::Accounts(command)) => commands::accounts::run(&app, command),
        Some(Commands::Config) => commands::config::run(&app),
        Some(Commands::Completions { shell }) => commands::completions::run(shell),
    }
}

/// Log to stderr. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "sluice=debug,sluice_core=debug,sluice_git=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}
