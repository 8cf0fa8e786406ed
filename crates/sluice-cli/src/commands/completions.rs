//! `sluice completions` command - shell completion scripts.

use std::io::{self, Write};

use anyhow::Result;
use clap::CommandFactory;
use clap_complete::{Shell, generate};

use super::Cli;

/// Print the completion script for `shell` to stdout.
pub fn run(shell: Shell) -> Result<()> {
    write_script(shell, &mut io::stdout().lock())
}

fn write_script(shell: Shell, out: &mut dyn Write) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, out);
    out.flush()?;
    Ok(())
}
