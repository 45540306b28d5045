//! Closing summary printed on the success path.

use std::fmt::Write;

use crate::bootstrap::BootstrapReport;
use crate::executor::RunMode;

const SIMULATION_BANNER: &str = "[SIMULATION] No changes were made to this system.";

const TIPS: &str = "\
Tips:
  * Your password was also set for root. Use sudo or doas for administrative
    tasks, and give root its own password with: passwd root
  * Update the system with: emerge --ask --update --deep --newuse @world
  * Read news items after each sync with: eselect news read
  * Binary packages are verified with the keyring set up by getuto.

Resources:
  * Gentoo Handbook: https://wiki.gentoo.org/wiki/Handbook:AMD64
  * Gentoo on WSL:   https://wiki.gentoo.org/wiki/Gentoo_in_WSL
  * Forums:          https://forums.gentoo.org/
";

/// Build the closing summary.
///
/// `bootstrap` is `None` when the bootstrap stage was skipped.
pub fn render(username: &str, mode: RunMode, bootstrap: Option<&BootstrapReport>) -> String {
    let mut out = String::new();

    if mode.is_simulation() {
        let _ = writeln!(out, "{SIMULATION_BANNER}");
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "Setup complete. Welcome to Gentoo, {username}!");
    let _ = writeln!(out);

    match bootstrap {
        None => {
            let _ = writeln!(out, "Environment bootstrap was skipped.");
            let _ = writeln!(out);
        }
        Some(report) => {
            if report.has_warnings() {
                let _ = writeln!(out, "Some optional steps did not complete:");
                for warning in &report.warnings {
                    let _ = writeln!(out, "  ! {}: {}", warning.step, warning.message);
                    let _ = writeln!(out, "    {}", warning.follow_up);
                }
                let _ = writeln!(out);
            }
            if report.restart_required {
                let _ = writeln!(
                    out,
                    "Restart this distribution for service changes to take effect \
                     (run 'wsl.exe --terminate <distro>' from Windows)."
                );
                let _ = writeln!(out);
            }
        }
    }

    out.push_str(TIPS);

    if mode.is_simulation() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{SIMULATION_BANNER}");
    }
    out
}

pub fn print_report(username: &str, mode: RunMode, bootstrap: Option<&BootstrapReport>) {
    print!("{}", render(username, mode, bootstrap));
}
