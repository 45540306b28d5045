//! Pre-flight checks for the runtime environment
//!
//! This module verifies the system before the first prompt:
//! - Required external commands are on `PATH`
//! - Required groups exist in the group database
//! - Standard input is an interactive terminal
//! - Running with root privileges (EUID 0), unless simulating
//!
//! Nothing here mutates the system. A failed check maps to its own exit code
//! through `OobeError::exit_code`.

use std::fmt;
use std::io::IsTerminal;

use tracing::{debug, info, warn};

use crate::accounts::AccountStore;
use crate::config_file::OobeConfig;
use crate::error::{OobeError, Result};
use crate::executor::RunMode;

/// Facts about the process environment.
pub trait EnvironmentProbe {
    /// Whether `name` resolves to an executable on `PATH`.
    fn has_command(&self, name: &str) -> bool;
    fn is_interactive(&self) -> bool;
    fn is_root(&self) -> bool;
}

/// `EnvironmentProbe` for the running process.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostProbe;

impl EnvironmentProbe for HostProbe {
    fn has_command(&self, name: &str) -> bool {
        which::which(name).is_ok()
    }

    fn is_interactive(&self) -> bool {
        std::io::stdin().is_terminal()
    }

    fn is_root(&self) -> bool {
        nix::unistd::geteuid().is_root()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCheck {
    pub name: String,
    pub package: String,
    pub present: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCheck {
    pub name: String,
    pub present: bool,
}

/// Presence facts gathered once at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// In configuration order.
    pub commands: Vec<CommandCheck>,
    /// In configuration order.
    pub groups: Vec<GroupCheck>,
    pub simulation: bool,
    pub interactive: bool,
    pub root: bool,
}

impl Capabilities {
    pub fn gather(
        config: &OobeConfig,
        mode: RunMode,
        probe: &dyn EnvironmentProbe,
        accounts: &dyn AccountStore,
    ) -> Self {
        let commands = config
            .required_commands
            .iter()
            .map(|cmd| CommandCheck {
                name: cmd.name.clone(),
                package: cmd.package.clone(),
                present: probe.has_command(&cmd.name),
            })
            .collect();

        let groups = config
            .groups
            .iter()
            .map(|group| {
                let present = accounts.group_exists(group).unwrap_or_else(|e| {
                    // Usually getent itself is missing, which the command
                    // check reports first.
                    warn!(group = %group, error = %e, "group lookup failed");
                    false
                });
                GroupCheck {
                    name: group.clone(),
                    present,
                }
            })
            .collect();

        let caps = Self {
            commands,
            groups,
            simulation: mode.is_simulation(),
            interactive: probe.is_interactive(),
            root: probe.is_root(),
        };
        debug!(?caps, "environment capabilities");
        caps
    }

    /// First failed check, in the order commands, groups, terminal, root.
    pub fn verdict(&self) -> Result<()> {
        if let Some(cmd) = self.commands.iter().find(|c| !c.present) {
            return Err(OobeError::MissingCommand {
                command: cmd.name.clone(),
                package: cmd.package.clone(),
            });
        }
        if let Some(group) = self.groups.iter().find(|g| !g.present) {
            return Err(OobeError::MissingGroup(group.name.clone()));
        }
        if !self.interactive {
            return Err(OobeError::NotInteractive);
        }
        if !self.root && !self.simulation {
            return Err(OobeError::NotRoot);
        }
        Ok(())
    }

    pub fn is_ok(&self) -> bool {
        self.verdict().is_ok()
    }

    fn missing_packages(&self) -> Vec<&str> {
        let mut packages: Vec<&str> = Vec::new();
        for cmd in self.commands.iter().filter(|c| !c.present) {
            if !packages.contains(&cmd.package.as_str()) {
                packages.push(&cmd.package);
            }
        }
        packages
    }
}

fn mark(ok: bool) -> &'static str {
    if ok { "✓" } else { "✗" }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Commands:")?;
        for cmd in &self.commands {
            if cmd.present {
                writeln!(f, "  {} {}", mark(true), cmd.name)?;
            } else {
                writeln!(f, "  {} {} (install: emerge --ask {})", mark(false), cmd.name, cmd.package)?;
            }
        }
        writeln!(f, "Groups:")?;
        for group in &self.groups {
            writeln!(f, "  {} {}", mark(group.present), group.name)?;
        }
        writeln!(f, "Environment:")?;
        writeln!(f, "  {} interactive terminal", mark(self.interactive))?;
        if self.simulation {
            writeln!(f, "  - root privileges (not required in simulation)")?;
        } else {
            writeln!(f, "  {} root privileges", mark(self.root))?;
        }

        let packages = self.missing_packages();
        if !packages.is_empty() {
            writeln!(f)?;
            writeln!(f, "Install missing packages with:")?;
            writeln!(f, "  emerge --ask {}", packages.join(" "))?;
        }
        Ok(())
    }
}

/// Run every check and fail with the first problem found.
pub fn run_preflight_checks(
    config: &OobeConfig,
    mode: RunMode,
    probe: &dyn EnvironmentProbe,
    accounts: &dyn AccountStore,
) -> Result<Capabilities> {
    debug!("running pre-flight checks");
    let caps = Capabilities::gather(config, mode, probe, accounts);
    caps.verdict()?;
    info!(simulation = caps.simulation, "pre-flight checks passed");
    Ok(caps)
}

/// Whether the well-known account id is already taken.
pub fn already_provisioned(config: &OobeConfig, accounts: &dyn AccountStore) -> Result<bool> {
    let exists = accounts.uid_exists(config.default_uid)?;
    if exists {
        info!(uid = config.default_uid, "default account already exists");
    }
    Ok(exists)
}
