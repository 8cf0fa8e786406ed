//! Saved identities and their JSON store.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sluice_git::Credentials;
use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::IdentityStore;

/// File name of the identity store.
pub const ACCOUNTS_FILE_NAME: &str = "sluice-accounts.json";

/// A named git identity, optionally with a personal access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// Unique, user-chosen name.
    pub alias: String,

    /// Username for commits and for authenticating with the remote.
    #[serde(alias = "name")]
    pub username: String,

    /// Commit email.
    #[serde(default)]
    pub email: String,

    /// Token embedded in the remote URL while pushing.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_token",
        deserialize_with = "deserialize_token"
    )]
    pub token: Option<SecretString>,

    /// When the token was last set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_updated_at: Option<DateTime<Utc>>,
}

impl Identity {
    /// Create an identity without a token.
    #[must_use]
    pub fn new(
        alias: impl Into<String>,
        username: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            alias: alias.into(),
            username: username.into(),
            email: email.into(),
            token: None,
            token_updated_at: None,
        }
    }

    /// Builder-style token setter.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.set_token(SecretString::from(token.into()));
        self
    }

    /// Replace the token and stamp the update time.
    pub fn set_token(&mut self, token: SecretString) {
        self.token = Some(token);
        self.token_updated_at = Some(Utc::now());
    }

    /// Whether a non-empty token is present.
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.token
            .as_ref()
            .is_some_and(|t| !t.expose_secret().is_empty())
    }

    /// Token shown as `****` plus its last four characters.
    #[must_use]
    pub fn masked_token(&self) -> String {
        match &self.token {
            Some(token) if self.has_token() => {
                let secret = token.expose_secret();
                let tail: String = secret
                    .chars()
                    .rev()
                    .take(4)
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .collect();
                format!("****{tail}")
            }
            _ => "NO TOKEN".to_string(),
        }
    }

    /// Credentials for a scoped push, when a token is present.
    #[must_use]
    pub fn credentials(&self) -> Option<Credentials<'_>> {
        self.token
            .as_ref()
            .filter(|_| self.has_token())
            .map(|token| Credentials::new(&self.username, token))
    }

    /// Check the fields every stored identity needs.
    ///
    /// # Errors
    /// Returns `MissingField` for a blank alias or username.
    pub fn validate(&self) -> Result<()> {
        if self.alias.trim().is_empty() {
            return Err(Error::MissingField("alias"));
        }
        if self.username.trim().is_empty() {
            return Err(Error::MissingField("username"));
        }
        Ok(())
    }
}

#[allow(clippy::ref_option)]
fn serialize_token<S: Serializer>(
    token: &Option<SecretString>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match token {
        Some(token) => serializer.serialize_some(token.expose_secret()),
        None => serializer.serialize_none(),
    }
}

fn deserialize_token<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<SecretString>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|t| !t.is_empty()).map(SecretString::from))
}

/// Identity store backed by a pretty-printed JSON array.
#[derive(Debug, Clone)]
pub struct JsonIdentityStore {
    path: PathBuf,
}

impl JsonIdentityStore {
    /// Store identities at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the JSON file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IdentityStore for JsonIdentityStore {
    fn list(&self) -> Result<Vec<Identity>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|e| Error::ParseError {
            file: self.path.clone(),
            message: e.to_string(),
        })
    }

    fn save(&self, identities: &[Identity]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(identities)?;

        // Write-then-rename so a crash never leaves a truncated store.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        restrict_permissions(&tmp)?;
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), count = identities.len(), "saved identities");
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
const fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, JsonIdentityStore) {
        let temp = TempDir::new().unwrap();
        let store = JsonIdentityStore::new(temp.path().join("accounts.json"));
        (temp, store)
    }

    #[test]
    fn test_masked_token() {
        let id = Identity::new("work", "alice", "a@example.com").with_token("ghp_abcdef1234");
        assert_eq!(id.masked_token(), "****1234");

        let short = Identity::new("w", "a", "").with_token("xy");
        assert_eq!(short.masked_token(), "****xy");

        let none = Identity::new("w", "a", "");
        assert_eq!(none.masked_token(), "NO TOKEN");

        let empty = Identity::new("w", "a", "").with_token("");
        assert_eq!(empty.masked_token(), "NO TOKEN");
        assert!(empty.credentials().is_none());
    }

    #[test]
    fn test_debug_does_not_leak_token() {
        let id = Identity::new("work", "alice", "").with_token("ghp_supersecret");
        assert!(!format!("{id:?}").contains("ghp_supersecret"));
    }

    #[test]
    fn test_set_token_stamps_time() {
        let mut id = Identity::new("work", "alice", "");
        assert!(id.token_updated_at.is_none());
        id.set_token(SecretString::from("t0k"));
        assert!(id.has_token());
        assert!(id.token_updated_at.is_some());
    }

    #[test]
    fn test_validate() {
        assert!(Identity::new("work", "alice", "").validate().is_ok());
        assert!(matches!(
            Identity::new(" ", "alice", "").validate(),
            Err(Error::MissingField("alias"))
        ));
        assert!(matches!(
            Identity::new("work", "", "").validate(),
            Err(Error::MissingField("username"))
        ));
    }

    #[test]
    fn test_missing_store_is_empty() {
        let (_temp, store) = store();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_list_preserves_order_and_token() {
        let (_temp, store) = store();
        let ids = vec![
            Identity::new("work", "alice", "alice@work.com").with_token("ghp_work"),
            Identity::new("home", "alice-h", "alice@home.com"),
        ];
        store.save(&ids).unwrap();

        let loaded = store.list().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].alias, "work");
        assert_eq!(loaded[1].alias, "home");
        assert_eq!(
            loaded[0].token.as_ref().unwrap().expose_secret(),
            "ghp_work"
        );
        assert!(loaded[1].token.is_none());
    }

    #[test]
    fn test_reads_legacy_field_names() {
        let (_temp, store) = store();
        fs::write(
            store.path(),
            r#"[{"alias": "Work", "name": "alice", "email": "a@x.com", "token": ""}]"#,
        )
        .unwrap();

        let loaded = store.list().unwrap();
        assert_eq!(loaded[0].username, "alice");
        assert!(!loaded[0].has_token());
    }

    #[test]
    fn test_corrupt_store_is_parse_error() {
        let (_temp, store) = store();
        fs::write(store.path(), "{not json").unwrap();

        assert!(matches!(store.list(), Err(Error::ParseError { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let (_temp, store) = store();
        store.save(&[Identity::new("w", "a", "")]).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
