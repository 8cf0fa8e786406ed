//! # sluice-core
//!
//! Core library for sluice: saved identities, configuration, output
//! classification and the push resolution state machine.
//!
//! A push is driven by [`run_push`] (or [`PushSession`] over any
//! [`GitRunner`](sluice_git::GitRunner)). Questions the run cannot answer on
//! its own go to an [`Operator`]; the result comes back as a [`PushReport`].

pub mod classify;
pub mod config;
pub mod error;
pub mod identity;
pub mod ignore;
pub mod push;
pub mod traits;

#[cfg(test)]
mod test_mocks;

pub use classify::{CommitOutcome, PhraseTable, PushOutcome};
pub use config::Config;
pub use error::{Error, Result};
pub use identity::{ACCOUNTS_FILE_NAME, Identity, JsonIdentityStore};
pub use push::{
    AbortReason, Divergence, FORCED_UPDATE_MESSAGE, Outcome, PushReport, PushSession, Resolution,
    Step, StepStatus, TranscriptEntry, run_push,
};
pub use traits::{IdentityStore, Operator};
