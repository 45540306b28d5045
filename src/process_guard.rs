//! Keeps spawned tools from outliving the OOBE.
//!
//! `useradd`, `emaint sync` and `locale-gen` can run for a while. If the
//! user presses Ctrl+C or the WSL session is torn down, every tool still
//! running is stopped along with anything it forked:
//!
//! - each tool runs as the leader of its own process group and receives
//!   SIGTERM from the kernel if we die first
//! - live leaders are tracked in [`ProcessTable`]
//! - the signal thread drains the table (SIGTERM, grace period, SIGKILL),
//!   restores the terminal settings saved at startup and exits with
//!   `128 + signal`

use std::collections::BTreeSet;
use std::fs::File;
use std::os::fd::AsFd;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

use nix::libc;
use nix::sys::signal::{self, Signal};
use nix::sys::termios::{self, SetArg, Termios};
use nix::unistd::Pid;

/// How long tools get to exit after SIGTERM before being killed.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Process group leaders of every tool currently running.
#[derive(Debug, Default)]
pub struct ProcessTable {
    leaders: BTreeSet<u32>,
    draining: bool,
}

impl ProcessTable {
    /// The table shared by the executor and the signal thread.
    pub fn shared() -> &'static Mutex<ProcessTable> {
        static TABLE: OnceLock<Mutex<ProcessTable>> = OnceLock::new();
        TABLE.get_or_init(Mutex::default)
    }

    pub fn track(&mut self, pid: u32) {
        self.leaders.insert(pid);
        tracing::debug!(pid, "tracking tool");
    }

    pub fn forget(&mut self, pid: u32) {
        if self.leaders.remove(&pid) {
            tracing::debug!(pid, "tool finished");
        }
    }

    pub fn len(&self) -> usize {
        self.leaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaders.is_empty()
    }

    /// Stop every tracked group. Only the first call does anything.
    pub fn drain(&mut self, grace: Duration) {
        if std::mem::replace(&mut self.draining, true) {
            return;
        }
        let leaders = std::mem::take(&mut self.leaders);
        if leaders.is_empty() {
            return;
        }

        tracing::info!(count = leaders.len(), "stopping running tools");
        for &pid in &leaders {
            signal_group(pid, Signal::SIGTERM);
        }

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if !leaders.iter().any(|&pid| is_running(pid)) {
                return;
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        for pid in leaders.into_iter().filter(|&pid| is_running(pid)) {
            tracing::warn!(pid, "tool ignored SIGTERM, killing it");
            signal_group(pid, Signal::SIGKILL);
        }
    }
}

/// Signal the whole group led by `pid`, falling back to `pid` alone when the
/// group is already gone.
fn signal_group(pid: u32, sig: Signal) {
    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    if let Err(e) = signal::kill(Pid::from_raw(-raw), sig) {
        tracing::debug!(pid, signal = ?sig, error = %e, "group signal failed");
        let _ = signal::kill(Pid::from_raw(raw), sig);
    }
}

/// Zombies still accept signals, so the state letter in `/proc` decides.
fn is_running(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if signal::kill(Pid::from_raw(raw), None).is_err() {
        return false;
    }
    std::fs::read_to_string(format!("/proc/{pid}/stat"))
        .ok()
        .and_then(|stat| {
            // comm may contain spaces and parentheses
            let (_, rest) = stat.rsplit_once(')')?;
            rest.split_whitespace().next().map(|state| !matches!(state, "Z" | "X"))
        })
        .unwrap_or(true)
}

/// Membership in [`ProcessTable::shared`] for as long as the handle lives.
pub struct TrackedChild {
    pid: u32,
}

impl TrackedChild {
    pub fn new(pid: u32) -> Self {
        if let Ok(mut table) = ProcessTable::shared().lock() {
            table.track(pid);
        }
        Self { pid }
    }
}

impl Drop for TrackedChild {
    fn drop(&mut self) {
        if let Ok(mut table) = ProcessTable::shared().lock() {
            table.forget(self.pid);
        }
    }
}

/// Terminal settings captured before any prompt.
///
/// Password prompts turn echo off and only restore it from the prompting
/// thread, which never resumes once the signal thread exits the process.
pub struct SavedTerminal<F: AsFd> {
    fd: F,
    settings: Termios,
}

impl<F: AsFd> SavedTerminal<F> {
    /// `None` when `fd` is not a terminal.
    pub fn capture(fd: F) -> Option<Self> {
        let settings = termios::tcgetattr(&fd).ok()?;
        Some(Self { fd, settings })
    }

    pub fn restore(&self) {
        if let Err(e) = termios::tcsetattr(&self.fd, SetArg::TCSANOW, &self.settings) {
            tracing::debug!(error = %e, "could not restore terminal settings");
        }
    }
}

/// Start the thread that reacts to SIGINT, SIGTERM and SIGHUP.
pub fn install_signal_handlers() -> std::io::Result<()> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    // Password prompts read from the controlling terminal, not stdin
    let terminal = File::open("/dev/tty").ok().and_then(SavedTerminal::capture);
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;
    std::thread::Builder::new()
        .name("oobe-signals".into())
        .spawn(move || {
            let Some(sig) = signals.forever().next() else {
                return;
            };
            tracing::info!(signal = sig, "interrupted");
            if let Ok(mut table) = ProcessTable::shared().lock() {
                table.drain(SHUTDOWN_GRACE);
            }
            if let Some(terminal) = &terminal {
                terminal.restore();
            }
            eprintln!();
            eprintln!("Setup interrupted. Run the distribution again to restart it.");
            std::process::exit(128 + sig);
        })?;
    Ok(())
}

/// Spawn-time isolation for tools run by the executor.
pub trait ProcessGroupExt {
    /// Lead a new process group and get SIGTERM when the parent dies.
    fn isolated(&mut self) -> &mut Self;
}

impl ProcessGroupExt for std::process::Command {
    fn isolated(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        // SAFETY: setpgid and prctl are async-signal-safe.
        unsafe {
            self.pre_exec(|| {
                nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0))
                    .map_err(std::io::Error::other)?;
                if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
        self
    }
}
