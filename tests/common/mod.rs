//! Shared fakes for the integration tests.
//!
//! Each fake records what the procedure asked of it so tests can assert on
//! the exact sequence of effects.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};
use std::io;
use std::time::Duration;

use wsl_oobe::{
    AccountSpec, AccountStore, CommandOutput, Complexity, ComplexityChecker, EnvironmentProbe,
    Executor, FileEdit, NetworkProbe, OobeError, PasswordHash, PasswordHasher, Result, RunMode,
    Secret, SystemCommand, Terminal,
};

// =============================================================================
// Executor
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommand {
    pub program: String,
    pub line: String,
    pub mutating: bool,
}

/// Records every command and edit. Commands succeed unless their program is
/// listed in `failing`; edits are applied to disk only when `apply_edits`.
pub struct RecordingExecutor {
    mode: RunMode,
    pub commands: RefCell<Vec<RecordedCommand>>,
    pub edits: RefCell<Vec<FileEdit>>,
    pub failing: RefCell<HashSet<String>>,
    pub apply_edits: bool,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self {
            mode: RunMode::Live,
            commands: RefCell::new(Vec::new()),
            edits: RefCell::new(Vec::new()),
            failing: RefCell::new(HashSet::new()),
            apply_edits: false,
        }
    }

    pub fn applying_edits() -> Self {
        Self {
            apply_edits: true,
            ..Self::new()
        }
    }

    pub fn fail(&self, program: &str) {
        self.failing.borrow_mut().insert(program.to_string());
    }

    pub fn ran(&self, program: &str) -> usize {
        self.commands
            .borrow()
            .iter()
            .filter(|c| c.program == program)
            .count()
    }

    pub fn lines(&self) -> Vec<String> {
        self.commands.borrow().iter().map(|c| c.line.clone()).collect()
    }
}

impl Executor for RecordingExecutor {
    fn run(&self, command: &dyn SystemCommand) -> Result<CommandOutput> {
        self.commands.borrow_mut().push(RecordedCommand {
            program: command.program().to_string(),
            line: command.describe(),
            mutating: command.is_mutating(),
        });
        if self.failing.borrow().contains(command.program()) {
            return Ok(CommandOutput {
                stderr: format!("{}: simulated failure", command.program()),
                exit_code: Some(1),
                success: false,
                ..CommandOutput::default()
            });
        }
        Ok(CommandOutput {
            exit_code: Some(0),
            success: true,
            ..CommandOutput::default()
        })
    }

    fn edit(&self, edit: &FileEdit) -> Result<()> {
        self.edits.borrow_mut().push(edit.clone());
        if self.apply_edits {
            edit.apply()?;
        }
        Ok(())
    }

    fn mode(&self) -> RunMode {
        self.mode
    }
}

// =============================================================================
// Accounts and hashing
// =============================================================================

#[derive(Default)]
pub struct FakeAccountStore {
    pub users: RefCell<HashSet<String>>,
    pub uids: RefCell<HashSet<u32>>,
    pub groups: RefCell<HashSet<String>>,
    pub created: RefCell<Vec<AccountSpec>>,
    pub deleted: RefCell<Vec<String>>,
    /// (username, salt) for every applied hash.
    pub applied: RefCell<Vec<(String, String)>>,
    pub fail_create: Cell<bool>,
    pub fail_set_hash_for: RefCell<HashSet<String>>,
}

impl FakeAccountStore {
    /// `root` plus the default groups.
    pub fn standard() -> Self {
        let store = Self::default();
        store.users.borrow_mut().insert("root".into());
        store.uids.borrow_mut().insert(0);
        for group in ["root", "users", "wheel"] {
            store.groups.borrow_mut().insert(group.into());
        }
        store
    }

    pub fn fail_password_for(&self, username: &str) {
        self.fail_set_hash_for.borrow_mut().insert(username.to_string());
    }
}

impl AccountStore for FakeAccountStore {
    fn uid_exists(&self, uid: u32) -> Result<bool> {
        Ok(self.uids.borrow().contains(&uid))
    }

    fn user_exists(&self, username: &str) -> Result<bool> {
        Ok(self.users.borrow().contains(username))
    }

    fn group_exists(&self, group: &str) -> Result<bool> {
        Ok(self.groups.borrow().contains(group))
    }

    fn create(&self, account: &AccountSpec) -> Result<()> {
        if self.fail_create.get() {
            return Err(OobeError::AccountCreation {
                username: account.username.clone(),
                reason: "useradd: cannot lock /etc/passwd".into(),
            });
        }
        self.users.borrow_mut().insert(account.username.clone());
        self.uids.borrow_mut().insert(account.uid);
        self.created.borrow_mut().push(account.clone());
        Ok(())
    }

    fn delete(&self, username: &str) -> Result<()> {
        self.users.borrow_mut().remove(username);
        self.deleted.borrow_mut().push(username.to_string());
        Ok(())
    }

    fn set_hash(&self, username: &str, hash: &PasswordHash) -> Result<()> {
        if self.fail_set_hash_for.borrow().contains(username) {
            return Err(OobeError::system(format!("chpasswd for {username} failed")));
        }
        self.applied
            .borrow_mut()
            .push((username.to_string(), hash.salt().to_string()));
        Ok(())
    }
}

/// Produces well-formed hashes unless told to misbehave.
#[derive(Default)]
pub struct FakeHasher {
    pub salts: RefCell<Vec<String>>,
    /// Raw outputs returned instead of a hash, consumed in order.
    pub garbage: RefCell<VecDeque<String>>,
}

impl FakeHasher {
    pub fn returning_garbage(raw: &str) -> Self {
        let hasher = Self::default();
        hasher.garbage.borrow_mut().push_back(raw.to_string());
        hasher
    }
}

impl PasswordHasher for FakeHasher {
    fn hash(&self, _secret: &Secret, salt: &str) -> Result<String> {
        self.salts.borrow_mut().push(salt.to_string());
        if let Some(raw) = self.garbage.borrow_mut().pop_front() {
            return Ok(raw);
        }
        Ok(format!("$6${salt}${}\n", "x".repeat(86)))
    }
}

// =============================================================================
// Terminal
// =============================================================================

/// Replays answers in order; `None` simulates end of input.
#[derive(Default)]
pub struct ScriptedTerminal {
    pub answers: VecDeque<Option<String>>,
    pub prompts: Vec<String>,
    pub output: Vec<String>,
    pub pauses: Vec<Duration>,
}

impl ScriptedTerminal {
    pub fn new<'a>(answers: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            answers: answers.into_iter().map(|a| Some(a.to_string())).collect(),
            ..Self::default()
        }
    }

    pub fn then_eof(mut self) -> Self {
        self.answers.push_back(None);
        self
    }

    pub fn said(&self, needle: &str) -> bool {
        self.output.iter().any(|line| line.contains(needle))
    }

    fn next(&mut self, prompt: &str) -> Option<String> {
        self.prompts.push(prompt.to_string());
        self.answers.pop_front().flatten()
    }
}

impl Terminal for ScriptedTerminal {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        Ok(self.next(prompt))
    }

    fn read_secret(&mut self, prompt: &str) -> io::Result<Option<Secret>> {
        Ok(self.next(prompt).map(Secret::new))
    }

    fn say(&mut self, message: &str) {
        self.output.push(message.to_string());
    }

    fn pause(&mut self, duration: Duration) {
        self.pauses.push(duration);
    }
}

// =============================================================================
// Probes and policy
// =============================================================================

pub struct FakeProbe {
    pub missing: HashSet<String>,
    pub interactive: bool,
    pub root: bool,
}

impl FakeProbe {
    pub fn healthy() -> Self {
        Self {
            missing: HashSet::new(),
            interactive: true,
            root: true,
        }
    }

    pub fn without(command: &str) -> Self {
        let mut probe = Self::healthy();
        probe.missing.insert(command.to_string());
        probe
    }
}

impl EnvironmentProbe for FakeProbe {
    fn has_command(&self, name: &str) -> bool {
        !self.missing.contains(name)
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn is_root(&self) -> bool {
        self.root
    }
}

pub struct FakeNetwork {
    pub reachable: bool,
    pub probes: Cell<usize>,
}

impl FakeNetwork {
    pub fn up() -> Self {
        Self {
            reachable: true,
            probes: Cell::new(0),
        }
    }

    pub fn down() -> Self {
        Self {
            reachable: false,
            probes: Cell::new(0),
        }
    }
}

impl NetworkProbe for FakeNetwork {
    fn is_reachable(&self) -> bool {
        self.probes.set(self.probes.get() + 1);
        self.reachable
    }
}

/// Rejects passwords listed in `weak`; errors on every check when `broken`.
#[derive(Default)]
pub struct FakeChecker {
    pub available: bool,
    pub weak: Vec<&'static str>,
    pub broken: bool,
}

impl FakeChecker {
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn rejecting(weak: Vec<&'static str>) -> Self {
        Self {
            available: true,
            weak,
            broken: false,
        }
    }

    /// Configured, but the tool cannot be started.
    pub fn broken() -> Self {
        Self {
            available: true,
            weak: vec![],
            broken: true,
        }
    }
}

impl ComplexityChecker for FakeChecker {
    fn is_available(&self) -> bool {
        self.available
    }

    fn check(&self, secret: &Secret) -> Result<Complexity> {
        if self.broken {
            return Err(OobeError::system("failed to start pwqcheck: No such file or directory"));
        }
        if self.weak.iter().any(|w| w.as_bytes() == secret.as_bytes()) {
            Ok(Complexity::Rejected("Bad passphrase (too short)".into()))
        } else {
            Ok(Complexity::Accepted)
        }
    }
}
