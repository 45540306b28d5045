//! Environment bootstrap.
//!
//! Every step here is best-effort. A failure becomes a `Warning` with a
//! follow-up instruction in the `BootstrapReport`; nothing in this module
//! changes the exit code or triggers account rollback.

pub mod locale;
pub mod network;
pub mod repository;
pub mod services;

use std::fmt;

use tracing::{info, warn};

use crate::command::SystemCommand;
use crate::config_file::OobeConfig;
use crate::executor::Executor;
use crate::preflight::EnvironmentProbe;
use crate::terminal::Terminal;

pub use locale::{LocaleEntry, parse_supported, resolve_locale};
pub use network::{NetworkProbe, TcpProbe};

/// Bootstrap step a warning belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Step {
    #[strum(serialize = "locale")]
    Locale,
    #[strum(serialize = "network")]
    Network,
    #[strum(serialize = "keyring")]
    Keyring,
    #[strum(serialize = "repository")]
    Repository,
    #[strum(serialize = "news")]
    News,
    #[strum(serialize = "services")]
    Services,
    #[strum(serialize = "machine-id")]
    MachineId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub step: Step,
    pub message: String,
    pub follow_up: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} (to fix: {})", self.step, self.message, self.follow_up)
    }
}

/// What the bootstrap stage did and what it could not do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub warnings: Vec<Warning>,
    pub repository_synced: bool,
    pub units_masked: usize,
    /// The machine identity changed; the environment needs a restart.
    pub restart_required: bool,
}

impl BootstrapReport {
    pub fn warn(&mut self, step: Step, message: impl Into<String>, follow_up: impl Into<String>) {
        let warning = Warning {
            step,
            message: message.into(),
            follow_up: follow_up.into(),
        };
        warn!(step = %warning.step, message = %warning.message, "bootstrap step failed");
        self.warnings.push(warning);
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn warnings_for(&self, step: Step) -> impl Iterator<Item = &Warning> {
        self.warnings.iter().filter(move |w| w.step == step)
    }
}

/// Run `command`, recording a warning if it cannot start or exits non-zero.
pub(crate) fn run_step(
    exec: &dyn Executor,
    report: &mut BootstrapReport,
    step: Step,
    command: &dyn SystemCommand,
    follow_up: &str,
) -> bool {
    match exec.run(command) {
        Ok(output) if output.success => true,
        Ok(output) => {
            let detail = output.message();
            let message = if detail.is_empty() {
                format!("{} failed (exit code {})", command.describe(), output.exit_code.unwrap_or(-1))
            } else {
                format!("{} failed: {}", command.describe(), detail)
            };
            report.warn(step, message, follow_up);
            false
        }
        Err(e) => {
            report.warn(step, e.to_string(), follow_up);
            false
        }
    }
}

/// Conditions the optional steps are gated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapFacts {
    pub network_reachable: bool,
    pub service_manager: bool,
}

impl BootstrapFacts {
    /// systemd counts as present when its runtime directory exists and
    /// `systemctl` is on `PATH`.
    pub fn gather(config: &OobeConfig, env: &dyn EnvironmentProbe, network: &dyn NetworkProbe) -> Self {
        let service_manager = config.paths.systemd_runtime_dir.is_dir() && env.has_command("systemctl");
        let facts = Self {
            network_reachable: network.is_reachable(),
            service_manager,
        };
        info!(?facts, "bootstrap conditions");
        facts
    }
}

pub struct Bootstrapper<'a> {
    exec: &'a dyn Executor,
    config: &'a OobeConfig,
}

impl<'a> Bootstrapper<'a> {
    pub fn new(exec: &'a dyn Executor, config: &'a OobeConfig) -> Self {
        Self { exec, config }
    }

    /// Locale, then network probe, then keyring and repository, then services.
    pub fn run(
        &self,
        term: &mut dyn Terminal,
        env: &dyn EnvironmentProbe,
        network: &dyn NetworkProbe,
    ) -> BootstrapReport {
        let mut report = BootstrapReport::default();

        if let Err(e) = locale::configure(self.exec, self.config, term, &mut report) {
            report.warn(
                Step::Locale,
                e.to_string(),
                format!("edit {} and run locale-gen", self.config.paths.locale_gen.display()),
            );
        }

        term.say("Checking network connectivity...");
        let facts = BootstrapFacts::gather(self.config, env, network);

        if facts.network_reachable {
            repository::set_up(self.exec, self.config, &mut report);
        } else {
            report.warn(
                Step::Network,
                "no network connection; skipped keyring setup and repository sync",
                "run getuto and emaint sync --repo gentoo once online",
            );
        }

        if facts.service_manager {
            services::mask_units(self.exec, self.config, &mut report);
            services::regenerate_machine_id(self.exec, self.config, &mut report);
        } else {
            info!("systemd not running; skipped unit masking");
        }

        report
    }
}
