//! Service masking and machine identity.

use tracing::info;

use super::{BootstrapReport, Step, run_step};
use crate::commands::{MachineIdSetup, SystemctlMask};
use crate::config_file::OobeConfig;
use crate::executor::{Executor, FileEdit};

/// Mask each configured unit; one failure does not stop the rest.
pub(super) fn mask_units(exec: &dyn Executor, config: &OobeConfig, report: &mut BootstrapReport) {
    for unit in &config.masked_units {
        let command = SystemctlMask { unit: unit.clone() };
        if run_step(exec, report, Step::Services, &command, &format!("run systemctl mask {unit}")) {
            report.units_masked += 1;
        }
    }
    info!(masked = report.units_masked, total = config.masked_units.len(), "units masked");
}

/// Replace the image's shared machine id with a fresh one.
///
/// Masking and the new id only take effect after the environment restarts.
pub(super) fn regenerate_machine_id(exec: &dyn Executor, config: &OobeConfig, report: &mut BootstrapReport) {
    report.restart_required = true;
    let path = &config.paths.machine_id;
    let follow_up = format!("remove {} and run systemd-machine-id-setup", path.display());

    if let Err(e) = exec.edit(&FileEdit::Remove { path: path.clone() }) {
        report.warn(Step::MachineId, e.to_string(), follow_up);
        return;
    }
    run_step(exec, report, Step::MachineId, &MachineIdSetup, &follow_up);
}
