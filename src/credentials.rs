//! Interactive credential collection.
//!
//! Bad input never ends the procedure here: every rejection prints a
//! specific message and prompts again. Only a declined summary or closed
//! input aborts.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::accounts::{AccountSpec, AccountStore};
use crate::commands::Pwqcheck;
use crate::config_file::OobeConfig;
use crate::error::{OobeError, Result};
use crate::executor::Executor;
use crate::preflight::EnvironmentProbe;
use crate::secret::Secret;
use crate::terminal::{self, Terminal};

/// PAM module name that marks passwdqc as the configured policy.
const PASSWDQC_PAM_MODULE: &str = "pam_passwdqc";

fn username_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z_][a-z0-9_-]{0,30}\$?$").expect("static regex is valid"))
}

/// Why a username was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsernameError {
    #[error("The username must not be empty.")]
    Empty,
    #[error("The username must not contain spaces or other whitespace.")]
    Whitespace,
    #[error("'root' already exists and cannot be used. Choose a different name.")]
    Root,
    #[error(
        "Invalid username '{0}'. Use up to 32 characters: start with a lowercase letter \
         or '_', then lowercase letters, digits, '_' or '-' (an optional trailing '$' is allowed)."
    )]
    InvalidFormat(String),
    #[error("The user '{0}' already exists. Choose a different name.")]
    Exists(String),
}

/// Checks that need no account database, in the order they are reported.
pub fn check_username_syntax(name: &str) -> std::result::Result<(), UsernameError> {
    if name.is_empty() {
        return Err(UsernameError::Empty);
    }
    if name.chars().any(char::is_whitespace) {
        return Err(UsernameError::Whitespace);
    }
    if name == "root" {
        return Err(UsernameError::Root);
    }
    if !username_pattern().is_match(name) {
        return Err(UsernameError::InvalidFormat(name.to_string()));
    }
    Ok(())
}

/// Full validation including the existing-account lookup.
///
/// The outer `Result` is a lookup failure; the inner one is the verdict.
pub fn validate_username(
    name: &str,
    accounts: &dyn AccountStore,
) -> Result<std::result::Result<(), UsernameError>> {
    if let Err(e) = check_username_syntax(name) {
        return Ok(Err(e));
    }
    if accounts.user_exists(name)? {
        return Ok(Err(UsernameError::Exists(name.to_string())));
    }
    Ok(Ok(()))
}

/// A validated, confirmed account request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateAccount {
    pub username: String,
    /// Secondary groups, in configuration order.
    pub groups: Vec<String>,
}

impl CandidateAccount {
    pub fn to_spec(&self, config: &OobeConfig) -> AccountSpec {
        AccountSpec {
            username: self.username.clone(),
            uid: config.default_uid,
            shell: config.default_shell.clone(),
            groups: self.groups.clone(),
        }
    }
}

/// Prompt until a valid username is entered, then confirm the summary.
pub fn collect_account(
    term: &mut dyn Terminal,
    accounts: &dyn AccountStore,
    config: &OobeConfig,
) -> Result<CandidateAccount> {
    term.say("Please create a default UNIX user account. The username does not need to match your Windows username.");

    let username = loop {
        let answer = terminal::ask(term, "Enter new UNIX username: ")?;
        match validate_username(&answer, accounts)? {
            Ok(()) => break answer,
            Err(reason) => {
                debug!(%reason, "username rejected");
                term.say(&reason.to_string());
            }
        }
    };

    let mut groups = Vec::with_capacity(config.groups.len());
    for group in &config.groups {
        if !groups.contains(group) {
            groups.push(group.clone());
        }
    }
    let candidate = CandidateAccount { username, groups };

    term.say("");
    term.say("The following account will be created:");
    term.say(&format!("  Username: {}", candidate.username));
    term.say(&format!("  UID:      {}", config.default_uid));
    term.say(&format!("  Groups:   {}", candidate.groups.join(", ")));
    term.say(&format!("  Shell:    {}", config.default_shell));
    if !terminal::confirm(term, "Create this account? [y/N] ")? {
        info!("account summary declined");
        return Err(OobeError::Declined);
    }

    info!(username = %candidate.username, "account confirmed");
    Ok(candidate)
}

/// Verdict of a password policy check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Complexity {
    Accepted,
    /// Rejected with the checker's own explanation.
    Rejected(String),
}

/// Optional password policy.
pub trait ComplexityChecker {
    fn is_available(&self) -> bool;
    fn check(&self, secret: &Secret) -> Result<Complexity>;
}

/// `ComplexityChecker` backed by passwdqc's `pwqcheck`.
pub struct PasswdqcChecker<'a> {
    exec: &'a dyn Executor,
    config: Option<PathBuf>,
    available: bool,
}

impl<'a> PasswdqcChecker<'a> {
    /// Available only when the PAM stack references passwdqc and `pwqcheck`
    /// is on `PATH`.
    pub fn detect(exec: &'a dyn Executor, probe: &dyn EnvironmentProbe, config: &OobeConfig) -> Self {
        let configured = pam_references_passwdqc(&config.paths.pam_config);
        let binary = probe.has_command("pwqcheck");
        debug!(configured, binary, "passwdqc detection");
        Self {
            exec,
            config: Some(config.paths.passwdqc_config.clone()).filter(|p| p.is_file()),
            available: configured && binary,
        }
    }
}

fn pam_references_passwdqc(pam_config: &Path) -> bool {
    fs::read_to_string(pam_config)
        .map(|contents| {
            contents
                .lines()
                .filter(|line| !line.trim_start().starts_with('#'))
                .any(|line| line.contains(PASSWDQC_PAM_MODULE))
        })
        .unwrap_or(false)
}

impl ComplexityChecker for PasswdqcChecker<'_> {
    fn is_available(&self) -> bool {
        self.available
    }

    fn check(&self, secret: &Secret) -> Result<Complexity> {
        let output = self
            .exec
            .run(&Pwqcheck::new(secret.as_bytes(), self.config.clone()))?;
        if output.success {
            Ok(Complexity::Accepted)
        } else {
            Ok(Complexity::Rejected(output.message()))
        }
    }
}

/// Prompt until a non-empty, policy-compliant password is entered twice.
pub fn collect_password(
    term: &mut dyn Terminal,
    checker: &dyn ComplexityChecker,
    backoff: Duration,
) -> Result<Secret> {
    if !checker.is_available() {
        warn!("password complexity checker unavailable");
        term.say("Warning: no password complexity checker is configured; any non-empty password will be accepted.");
    }

    loop {
        let mut password = terminal::ask_secret(term, "New password: ")?;
        if password.is_empty() {
            term.say("The password must not be empty.");
            continue;
        }

        if checker.is_available() {
            match checker.check(&password) {
                Ok(Complexity::Accepted) => {}
                Ok(Complexity::Rejected(reason)) => {
                    debug!("password rejected by complexity checker");
                    term.say(&format!("Password rejected: {reason}"));
                    term.pause(backoff);
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "complexity checker failed, accepting password");
                    term.say("Warning: the password complexity checker could not run; the password was not checked.");
                }
            }
        }

        let confirmation = terminal::ask_secret(term, "Retype new password: ")?;
        if password.confirm_with(confirmation) {
            debug!("password confirmed");
            return Ok(password);
        }
        term.say("The passwords do not match. Please try again.");
    }
}
