//! Trait abstractions for sluice's collaborators.
//!
//! `IdentityStore` abstracts where saved identities live and `Operator`
//! abstracts the person driving a push, so the push state machine can run
//! against in-memory stores and scripted answers in tests.

use secrecy::SecretString;

use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::push::{Divergence, Resolution, Step, StepStatus};

/// Persistent storage of saved identities.
#[allow(clippy::missing_errors_doc)]
pub trait IdentityStore {
    /// All saved identities in display order.
    fn list(&self) -> Result<Vec<Identity>>;

    /// Replace the saved identities.
    fn save(&self, identities: &[Identity]) -> Result<()>;

    /// Look up an identity by alias.
    fn find(&self, alias: &str) -> Result<Option<Identity>> {
        Ok(self.list()?.into_iter().find(|i| i.alias == alias))
    }

    /// Append a new identity. Aliases must be unique.
    fn add(&self, identity: Identity) -> Result<()> {
        identity.validate()?;
        let mut all = self.list()?;
        if all.iter().any(|i| i.alias == identity.alias) {
            return Err(Error::DuplicateIdentity(identity.alias));
        }
        all.push(identity);
        self.save(&all)
    }

    /// Replace the identity currently saved as `alias`.
    fn update(&self, alias: &str, identity: Identity) -> Result<()> {
        identity.validate()?;
        let mut all = self.list()?;
        if identity.alias != alias && all.iter().any(|i| i.alias == identity.alias) {
            return Err(Error::DuplicateIdentity(identity.alias));
        }
        let slot = all
            .iter_mut()
            .find(|i| i.alias == alias)
            .ok_or_else(|| Error::UnknownIdentity(alias.to_string()))?;
        *slot = identity;
        self.save(&all)
    }

    /// Remove and return the identity saved as `alias`.
    fn remove(&self, alias: &str) -> Result<Identity> {
        let mut all = self.list()?;
        let index = all
            .iter()
            .position(|i| i.alias == alias)
            .ok_or_else(|| Error::UnknownIdentity(alias.to_string()))?;
        let removed = all.remove(index);
        self.save(&all)?;
        Ok(removed)
    }

    /// Set a new token on `alias` and persist it. Returns the updated identity.
    fn update_token(&self, alias: &str, token: SecretString) -> Result<Identity> {
        let mut all = self.list()?;
        let identity = all
            .iter_mut()
            .find(|i| i.alias == alias)
            .ok_or_else(|| Error::UnknownIdentity(alias.to_string()))?;
        identity.set_token(token);
        let updated = identity.clone();
        self.save(&all)?;
        Ok(updated)
    }
}

/// The person (or script) answering questions during a push.
pub trait Operator {
    /// URL for a remote that does not exist yet. `None` aborts the push.
    fn remote_url(&mut self, remote: &str) -> Option<String>;

    /// Token for an identity that has none. `None` aborts the push.
    fn token_for(&mut self, identity: &Identity) -> Option<SecretString>;

    /// How to recover from a rejected or stale push.
    fn resolve(&mut self, divergence: Divergence) -> Resolution;

    /// A step started or finished.
    fn progress(&mut self, _step: Step, _status: StepStatus) {}
}
