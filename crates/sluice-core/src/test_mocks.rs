//! Mock implementations for testing the push state machine.
//!
//! `MockRunner` plays git: it keeps remotes and the current branch in memory,
//! answers everything else from scripted outputs, and records every call.
//! The working directory is a real temporary directory so the repository
//! lock and ignore file behave as they would on disk.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;
use sluice_git::{CommandOutput, Error as GitError, GitRunner, Result as GitResult, render_command};
use tempfile::TempDir;

use crate::error::Result;
use crate::identity::Identity;
use crate::push::{Divergence, Resolution, Step, StepStatus};
use crate::traits::{IdentityStore, Operator};

/// Exit 0 with the given streams.
pub fn ok(stdout: &str, stderr: &str) -> CommandOutput {
    CommandOutput::new(0, stdout, stderr)
}

/// Non-zero exit with the given stderr.
pub fn fail(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput::new(code, "", stderr)
}

#[derive(Clone)]
enum Reply {
    Output(CommandOutput),
    Timeout,
}

/// Mock implementation of `GitRunner`.
pub struct MockRunner {
    dir: TempDir,
    remotes: RefCell<HashMap<String, String>>,
    branch: RefCell<Option<String>>,
    replies: RefCell<Vec<(Vec<String>, VecDeque<Reply>)>>,
    calls: RefCell<Vec<Vec<String>>>,
    network_urls: RefCell<Vec<Option<String>>>,
}

impl MockRunner {
    /// An initialized repository on `main`.
    pub fn new() -> Self {
        let runner = Self::uninitialized();
        fs::create_dir_all(runner.dir.path().join(".git")).unwrap();
        runner
    }

    /// A plain directory; `git init` creates `.git`.
    pub fn uninitialized() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            remotes: RefCell::new(HashMap::new()),
            branch: RefCell::new(Some("main".to_string())),
            replies: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            network_urls: RefCell::new(Vec::new()),
        }
    }

    pub fn with_remote(self, name: &str, url: &str) -> Self {
        self.remotes
            .borrow_mut()
            .insert(name.to_string(), url.to_string());
        self
    }

    pub fn with_branch(self, branch: Option<&str>) -> Self {
        *self.branch.borrow_mut() = branch.map(String::from);
        self
    }

    /// Queue a reply for commands starting with `prefix`.
    ///
    /// Replies are used in order; the last one repeats.
    pub fn on(self, prefix: &[&str], output: CommandOutput) -> Self {
        self.queue(prefix, Reply::Output(output));
        self
    }

    /// Make commands starting with `prefix` time out.
    pub fn timing_out(self, prefix: &[&str]) -> Self {
        self.queue(prefix, Reply::Timeout);
        self
    }

    fn queue(&self, prefix: &[&str], reply: Reply) {
        let prefix: Vec<String> = prefix.iter().map(|s| (*s).to_string()).collect();
        let mut replies = self.replies.borrow_mut();
        if let Some((_, queue)) = replies.iter_mut().find(|(p, _)| *p == prefix) {
            queue.push_back(reply);
        } else {
            replies.push((prefix, VecDeque::from([reply])));
        }
    }

    /// Every call, rendered as a command line.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|args| {
                let args: Vec<&str> = args.iter().map(String::as_str).collect();
                render_command(&args)
            })
            .collect()
    }

    /// Number of calls starting with `prefix`.
    pub fn count(&self, prefix: &[&str]) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|args| starts_with(args, prefix))
            .count()
    }

    /// Whether any call started with `prefix`.
    pub fn called(&self, prefix: &[&str]) -> bool {
        self.count(prefix) > 0
    }

    /// Current URL of a remote.
    pub fn remote(&self, name: &str) -> Option<String> {
        self.remotes.borrow().get(name).cloned()
    }

    /// URL `origin` had each time a push or pull ran.
    pub fn network_urls(&self) -> Vec<Option<String>> {
        self.network_urls.borrow().clone()
    }

    fn scripted(&self, args: &[String]) -> GitResult<CommandOutput> {
        let mut replies = self.replies.borrow_mut();
        let best = replies
            .iter_mut()
            .filter(|(prefix, _)| {
                let prefix: Vec<&str> = prefix.iter().map(String::as_str).collect();
                starts_with(args, &prefix)
            })
            .max_by_key(|(prefix, _)| prefix.len());

        let reply = match best {
            Some((_, queue)) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some((_, queue)) => queue.front().cloned().unwrap(),
            None => Reply::Output(ok("", "")),
        };

        match reply {
            Reply::Output(out) => Ok(out),
            Reply::Timeout => {
                let args: Vec<&str> = args.iter().map(String::as_str).collect();
                Err(GitError::Timeout {
                    command: render_command(&args),
                    after: Duration::from_secs(1),
                })
            }
        }
    }
}

/// Split `remote.<name>.<field>` into name and field.
fn remote_key(key: &str) -> Option<(&str, &str)> {
    key.strip_prefix("remote.")?.rsplit_once('.')
}

fn starts_with(args: &[String], prefix: &[&str]) -> bool {
    args.len() >= prefix.len() && args.iter().zip(prefix).all(|(a, p)| a == p)
}

impl GitRunner for MockRunner {
    fn workdir(&self) -> &Path {
        self.dir.path()
    }

    fn run(&self, args: &[&str]) -> GitResult<CommandOutput> {
        let owned: Vec<String> = args.iter().map(|s| (*s).to_string()).collect();
        self.calls.borrow_mut().push(owned.clone());

        match args {
            ["init", ..] => {
                fs::create_dir_all(self.dir.path().join(".git"))?;
                Ok(ok("Initialized empty Git repository", ""))
            }
            ["rev-parse", "--git-common-dir"] => Ok(ok(".git\n", "")),
            ["config", "--get", key] => Ok(match remote_key(key) {
                Some((name, "url")) => match self.remotes.borrow().get(name) {
                    Some(url) => ok(&format!("{url}\n"), ""),
                    None => fail(1, ""),
                },
                _ => fail(1, ""),
            }),
            ["remote", "get-url", name] | ["remote", "get-url", "--push", name] => {
                Ok(match self.remotes.borrow().get(*name) {
                    Some(url) => ok(&format!("{url}\n"), ""),
                    None => fail(2, &format!("error: No such remote '{name}'")),
                })
            }
            ["remote", "set-url", name, url] => {
                let mut remotes = self.remotes.borrow_mut();
                match remotes.get_mut(*name) {
                    Some(slot) => {
                        *slot = (*url).to_string();
                        Ok(ok("", ""))
                    }
                    None => Ok(fail(2, &format!("error: No such remote '{name}'"))),
                }
            }
            ["remote", "add", name, url] => {
                let mut remotes = self.remotes.borrow_mut();
                if remotes.contains_key(*name) {
                    Ok(fail(3, &format!("error: remote {name} already exists.")))
                } else {
                    remotes.insert((*name).to_string(), (*url).to_string());
                    Ok(ok("", ""))
                }
            }
            ["branch", "--show-current"] => {
                let branch = self.branch.borrow().clone().unwrap_or_default();
                Ok(ok(&format!("{branch}\n"), ""))
            }
            ["push" | "pull", ..] => {
                self.network_urls.borrow_mut().push(self.remote("origin"));
                self.scripted(&owned)
            }
            _ => self.scripted(&owned),
        }
    }
}

/// Operator that answers from a script and records what it was asked.
#[derive(Default)]
pub struct ScriptedOperator {
    pub remote_url: Option<String>,
    pub token: Option<String>,
    pub resolutions: VecDeque<Resolution>,
    pub asked: Vec<Divergence>,
    pub events: Vec<(Step, StepStatus)>,
    pub remote_prompts: usize,
    pub token_prompts: usize,
}

impl ScriptedOperator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_remote_url(mut self, url: &str) -> Self {
        self.remote_url = Some(url.to_string());
        self
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn resolving(mut self, resolution: Resolution) -> Self {
        self.resolutions.push_back(resolution);
        self
    }

    pub fn has_event(&self, step: Step, status: StepStatus) -> bool {
        self.events.contains(&(step, status))
    }
}

impl Operator for ScriptedOperator {
    fn remote_url(&mut self, _remote: &str) -> Option<String> {
        self.remote_prompts += 1;
        self.remote_url.clone()
    }

    fn token_for(&mut self, _identity: &Identity) -> Option<SecretString> {
        self.token_prompts += 1;
        self.token.clone().map(SecretString::from)
    }

    fn resolve(&mut self, divergence: Divergence) -> Resolution {
        self.asked.push(divergence);
        self.resolutions.pop_front().unwrap_or(Resolution::Cancel)
    }

    fn progress(&mut self, step: Step, status: StepStatus) {
        self.events.push((step, status));
    }
}

/// In-memory identity store.
#[derive(Default)]
pub struct MemoryStore {
    identities: RefCell<Vec<Identity>>,
}

impl MemoryStore {
    pub fn with(identities: Vec<Identity>) -> Self {
        Self {
            identities: RefCell::new(identities),
        }
    }
}

impl IdentityStore for MemoryStore {
    fn list(&self) -> Result<Vec<Identity>> {
        Ok(self.identities.borrow().clone())
    }

    fn save(&self, identities: &[Identity]) -> Result<()> {
        *self.identities.borrow_mut() = identities.to_vec();
        Ok(())
    }
}
