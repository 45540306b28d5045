//! Typed commands for systemd and locale tooling.

use crate::command::SystemCommand;

/// `systemctl mask <unit>`.
#[derive(Debug, Clone)]
pub struct SystemctlMask {
    pub unit: String,
}

impl SystemCommand for SystemctlMask {
    fn program(&self) -> &'static str {
        "systemctl"
    }

    fn args(&self) -> Vec<String> {
        vec!["mask".to_string(), self.unit.clone()]
    }
}

/// `systemd-machine-id-setup`: writes a fresh `/etc/machine-id` when the
/// file is missing or empty.
#[derive(Debug, Clone, Copy)]
pub struct MachineIdSetup;

impl SystemCommand for MachineIdSetup {
    fn program(&self) -> &'static str {
        "systemd-machine-id-setup"
    }

    fn args(&self) -> Vec<String> {
        vec![]
    }
}

/// `locale-gen`: compiles every locale listed in `/etc/locale.gen`.
#[derive(Debug, Clone, Copy)]
pub struct LocaleGen;

impl SystemCommand for LocaleGen {
    fn program(&self) -> &'static str {
        "locale-gen"
    }

    fn args(&self) -> Vec<String> {
        vec![]
    }

    fn inherit_output(&self) -> bool {
        true
    }
}
