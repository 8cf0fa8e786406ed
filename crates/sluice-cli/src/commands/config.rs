//! `sluice config` command - show the effective configuration.

use anyhow::Result;

use super::App;
use crate::output;

/// Print where configuration comes from, then the effective values as TOML.
pub fn run(app: &App) -> Result<()> {
    let source = if app.config_path.exists() {
        String::new()
    } else {
        " (not found, using defaults)".to_string()
    };
    output::info(&format!(
        "Config file: {}{source}",
        app.config_path.display()
    ));
    output::info(&format!("Accounts file: {}", app.store.path().display()));
    output::hr();
    output::essential(app.config.to_toml()?.trim_end());
    Ok(())
}
