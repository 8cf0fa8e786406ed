//! Configuration management for sluice.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classify::PhraseTable;
use crate::error::{Error, Result};
use crate::identity::ACCOUNTS_FILE_NAME;

/// Sluice configuration loaded from `<config dir>/sluice/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Which remotes may receive scoped credentials.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Output phrases used to classify git results.
    #[serde(default)]
    pub phrases: PhraseTable,

    /// Lines kept in every pushed repository's `.gitignore`.
    #[serde(default)]
    pub ignore: IgnoreConfig,
}

impl Config {
    /// Directory name under the platform config dir.
    pub const APP_DIR: &'static str = "sluice";
    const CONFIG_FILE: &'static str = "config.toml";

    /// Load config from a TOML file. A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns error if file can't be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to a TOML file, creating parent directories.
    ///
    /// # Errors
    /// Returns error if serialization or write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Render as pretty TOML.
    ///
    /// # Errors
    /// Returns error if a value cannot be represented in TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// `<config dir>/sluice/config.toml`.
    ///
    /// # Errors
    /// Returns `NoConfigDir` if the platform has no config directory.
    pub fn default_path() -> Result<PathBuf> {
        Ok(app_dir()?.join(Self::CONFIG_FILE))
    }

    /// Where saved identities live.
    ///
    /// A relative `accounts_file` is resolved against `base`, normally the
    /// directory holding the config file.
    ///
    /// # Errors
    /// Returns `NoConfigDir` if no path is configured and the platform has no
    /// config directory.
    pub fn accounts_path(&self, base: Option<&Path>) -> Result<PathBuf> {
        match (&self.general.accounts_file, base) {
            (Some(file), Some(base)) if file.is_relative() => Ok(base.join(file)),
            (Some(file), _) => Ok(file.clone()),
            (None, Some(base)) => Ok(base.join(ACCOUNTS_FILE_NAME)),
            (None, None) => Ok(app_dir()?.join(ACCOUNTS_FILE_NAME)),
        }
    }

    /// Per-command time limit. `None` when disabled.
    #[must_use]
    pub const fn command_timeout(&self) -> Option<Duration> {
        match self.general.command_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

fn app_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(Config::APP_DIR))
        .ok_or(Error::NoConfigDir)
}

/// General sluice settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Remote to push to.
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Branch used for new repositories and detached HEADs.
    #[serde(default = "default_branch")]
    pub default_branch: String,

    /// Seconds before a git command is killed. `0` disables the limit.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Treat an "up to date" push as out of sync and offer recovery.
    #[serde(default = "default_true")]
    pub stale_push_check: bool,

    /// Identity store location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accounts_file: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            remote: default_remote(),
            default_branch: default_branch(),
            command_timeout_secs: default_command_timeout_secs(),
            stale_push_check: true,
            accounts_file: None,
        }
    }
}

fn default_remote() -> String {
    "origin".into()
}

fn default_branch() -> String {
    "main".into()
}

const fn default_command_timeout_secs() -> u64 {
    300
}

const fn default_true() -> bool {
    true
}

/// Credential scoping settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Hosts that may receive credentials. Empty allows any https host.
    #[serde(default)]
    pub hosts: Vec<String>,
}

/// Ignore-file bootstrap settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreConfig {
    /// Literal lines appended to `.gitignore` when missing.
    #[serde(default = "default_ignore_lines")]
    pub lines: Vec<String>,
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            lines: default_ignore_lines(),
        }
    }
}

fn default_ignore_lines() -> Vec<String> {
    vec![
        ACCOUNTS_FILE_NAME.into(),
        "target/".into(),
        "__pycache__/".into(),
        "*.pyc".into(),
        ".DS_Store".into(),
    ]
}
