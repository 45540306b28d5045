//! OOBE procedure and its stage machine.
//!
//! `Oobe` owns everything a run needs: configuration, run mode, the
//! capability seams and the current `Stage`. Stages only move forward
//! along this graph:
//!
//! ```text
//! Start
//!   ↓
//! PreflightOk ──→ AlreadyProvisioned
//!   ↓
//! Collecting
//!   ↓
//! Confirmed
//!   ↓
//! Provisioned
//!   ↓
//! Bootstrapped
//!   ↓
//! Reported
//! ```
//!
//! Failures leave the machine where it is and surface as `OobeError`.

use std::fmt;

use thiserror::Error;
use tracing::{debug, error, info};

use crate::accounts::{AccountStore, PasswordHasher};
use crate::bootstrap::{BootstrapReport, Bootstrapper, NetworkProbe};
use crate::config_file::OobeConfig;
use crate::credentials::{self, ComplexityChecker};
use crate::error::{OobeError, Result};
use crate::executor::{Executor, RunMode};
use crate::preflight::{self, Capabilities, EnvironmentProbe};
use crate::provision::Provisioner;
use crate::report;
use crate::terminal::Terminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Stage {
    Start = 0,
    PreflightOk = 1,
    Collecting = 2,
    Confirmed = 3,
    Provisioned = 4,
    Bootstrapped = 5,
    Reported = 6,
    /// The default account existed before this run (terminal).
    AlreadyProvisioned = 255,
}

impl Stage {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Reported | Self::AlreadyProvisioned)
    }

    /// Whether `to` directly follows `self`.
    pub const fn can_advance_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Start, Self::PreflightOk)
                | (Self::PreflightOk, Self::AlreadyProvisioned)
                | (Self::PreflightOk, Self::Collecting)
                | (Self::Collecting, Self::Confirmed)
                | (Self::Confirmed, Self::Provisioned)
                | (Self::Provisioned, Self::Bootstrapped)
                | (Self::Bootstrapped, Self::Reported)
        )
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Start => "Starting",
            Self::PreflightOk => "Pre-flight checks passed",
            Self::Collecting => "Collecting credentials",
            Self::Confirmed => "Account confirmed",
            Self::Provisioned => "Account provisioned",
            Self::Bootstrapped => "Environment bootstrapped",
            Self::Reported => "Setup complete",
            Self::AlreadyProvisioned => "Already provisioned",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Cannot transition from terminal stage {from}")]
    FromTerminal { from: Stage },

    #[error("Invalid stage transition from {from} to {to}")]
    Invalid { from: Stage, to: Stage },
}

/// Forward-only stage tracker.
#[derive(Debug, Clone)]
pub struct StageTracker {
    current: Stage,
    history: Vec<Stage>,
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTracker {
    pub fn new() -> Self {
        Self {
            current: Stage::Start,
            history: vec![Stage::Start],
        }
    }

    pub fn current(&self) -> Stage {
        self.current
    }

    pub fn history(&self) -> &[Stage] {
        &self.history
    }

    pub fn advance_to(&mut self, to: Stage) -> std::result::Result<(), TransitionError> {
        let from = self.current;
        if from.is_terminal() {
            return Err(TransitionError::FromTerminal { from });
        }
        if !from.can_advance_to(to) {
            return Err(TransitionError::Invalid { from, to });
        }
        info!(from = %from, to = %to, "stage transition");
        self.current = to;
        self.history.push(to);
        Ok(())
    }
}

impl From<TransitionError> for OobeError {
    fn from(e: TransitionError) -> Self {
        OobeError::system(e.to_string())
    }
}

/// The host integrations a run talks to.
#[derive(Clone, Copy)]
pub struct Seams<'a> {
    pub exec: &'a dyn Executor,
    pub accounts: &'a dyn AccountStore,
    pub hasher: &'a dyn PasswordHasher,
    pub checker: &'a dyn ComplexityChecker,
    pub env: &'a dyn EnvironmentProbe,
    pub network: &'a dyn NetworkProbe,
}

/// How a successful run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The default uid already existed; nothing was asked or changed.
    AlreadyProvisioned,
    Provisioned {
        username: String,
        /// `None` when bootstrap was skipped.
        bootstrap: Option<BootstrapReport>,
    },
}

pub struct Oobe<'a> {
    config: &'a OobeConfig,
    seams: Seams<'a>,
    terminal: &'a mut dyn Terminal,
    skip_bootstrap: bool,
    stage: StageTracker,
}

impl<'a> Oobe<'a> {
    pub fn new(config: &'a OobeConfig, seams: Seams<'a>, terminal: &'a mut dyn Terminal) -> Self {
        Self {
            config,
            seams,
            terminal,
            skip_bootstrap: false,
            stage: StageTracker::new(),
        }
    }

    /// Stop after provisioning; the closing report is still printed.
    pub fn skip_bootstrap(mut self, skip: bool) -> Self {
        self.skip_bootstrap = skip;
        self
    }

    pub fn mode(&self) -> RunMode {
        self.seams.exec.mode()
    }

    pub fn stage(&self) -> Stage {
        self.stage.current()
    }

    /// Gather the capability report without enforcing it.
    pub fn check(&self) -> Capabilities {
        Capabilities::gather(self.config, self.mode(), self.seams.env, self.seams.accounts)
    }

    /// Run every stage in order.
    pub fn run(&mut self) -> Result<Outcome> {
        let mode = self.mode();
        if mode.is_simulation() {
            self.terminal
                .say("[SIMULATION] Running in dry-run mode; no changes will be made.");
        }

        preflight::run_preflight_checks(self.config, mode, self.seams.env, self.seams.accounts)?;
        self.stage.advance_to(Stage::PreflightOk)?;

        if preflight::already_provisioned(self.config, self.seams.accounts)? {
            self.terminal.say(&format!(
                "A user with uid {} already exists; setup has already been completed.",
                self.config.default_uid
            ));
            self.stage.advance_to(Stage::AlreadyProvisioned)?;
            return Ok(Outcome::AlreadyProvisioned);
        }

        self.stage.advance_to(Stage::Collecting)?;
        let candidate = credentials::collect_account(self.terminal, self.seams.accounts, self.config)?;
        self.stage.advance_to(Stage::Confirmed)?;

        let password = credentials::collect_password(
            self.terminal,
            self.seams.checker,
            self.config.complexity_backoff(),
        )?;

        let spec = candidate.to_spec(self.config);
        let provisioner = Provisioner::new(self.seams.accounts, self.seams.hasher);
        let outcome = provisioner.provision(&spec, &password).inspect_err(|e| {
            error!(error = %e, rolled_back = e.rolled_back(), "provisioning failed");
        })?;
        drop(password);
        debug!(?outcome, "provisioning outcome");
        self.stage.advance_to(Stage::Provisioned)?;

        let bootstrap = if self.skip_bootstrap {
            info!("bootstrap skipped on request");
            None
        } else {
            let bootstrapper = Bootstrapper::new(self.seams.exec, self.config);
            Some(bootstrapper.run(self.terminal, self.seams.env, self.seams.network))
        };
        self.stage.advance_to(Stage::Bootstrapped)?;

        report::print_report(&candidate.username, mode, bootstrap.as_ref());
        self.stage.advance_to(Stage::Reported)?;

        Ok(Outcome::Provisioned {
            username: candidate.username,
            bootstrap,
        })
    }
}
