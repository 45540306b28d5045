//! Type-Safe Command Execution
//!
//! This module provides the ONLY sanctioned way for the OOBE to touch the
//! system. Every external tool runs through `Executor::run` and every file
//! change through `Executor::edit`, which gives three guarantees:
//!
//! - Process group isolation and PID registration for signal cleanup
//! - Type-safe argv and stdin via the `SystemCommand` trait
//! - Simulation mode: mutating operations are described instead of executed
//!
//! # Architecture Rule
//!
//! Stage code never calls `std::process::Command` or `std::fs` write APIs
//! directly. Reading files is fine; anything that changes state goes here so
//! a dry run can intercept it and tests can record it.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use crate::command::SystemCommand;
use crate::error::{OobeError, Result};
use crate::process_guard::{ProcessGroupExt, TrackedChild};

/// Whether mutating operations actually run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Live,
    /// Mutations are printed, not performed, and reported as successful.
    Simulation,
}

impl RunMode {
    /// Name of the environment toggle selecting simulation mode.
    pub const ENV_TOGGLE: &'static str = "DEBUG";

    /// Simulation if the CLI flag is set or `DEBUG` holds any non-empty value.
    pub fn detect(cli_dry_run: bool) -> Self {
        let env_set = std::env::var_os(Self::ENV_TOGGLE).is_some_and(|v| !v.is_empty());
        Self::from_flags(cli_dry_run, env_set)
    }

    pub fn from_flags(cli_dry_run: bool, env_toggle: bool) -> Self {
        if cli_dry_run || env_toggle {
            Self::Simulation
        } else {
            Self::Live
        }
    }

    pub fn is_simulation(self) -> bool {
        matches!(self, Self::Simulation)
    }
}

/// Output from a command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Captured stdout (empty when output was inherited or simulated).
    pub stdout: String,
    /// Captured stderr (empty when output was inherited or simulated).
    pub stderr: String,
    /// Exit code (None if terminated by signal).
    pub exit_code: Option<i32>,
    /// Whether the command exited with status 0.
    pub success: bool,
    /// Whether the command was skipped in simulation mode.
    pub simulated: bool,
}

impl CommandOutput {
    /// Successful placeholder for a command skipped in simulation mode.
    pub fn simulated() -> Self {
        Self {
            exit_code: Some(0),
            success: true,
            simulated: true,
            ..Self::default()
        }
    }

    /// Turn a non-zero exit into an error carrying the tool's stderr.
    pub fn ensure_success(&self, context: &str) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(OobeError::system(format!(
                "{} failed (exit code {}): {}",
                context,
                self.exit_code.unwrap_or(-1),
                self.message()
            )))
        }
    }

    /// The most useful diagnostic line the tool printed.
    pub fn message(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// A change to a file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEdit {
    /// Append `line` plus a newline, creating the file if needed.
    AppendLine { path: PathBuf, line: String },
    /// Replace the file's contents, creating parent directories.
    Write { path: PathBuf, contents: String },
    /// Remove a file; a missing file is not an error.
    Remove { path: PathBuf },
    /// Remove a directory tree; a missing directory is not an error.
    RemoveTree { path: PathBuf },
}

impl FileEdit {
    pub fn path(&self) -> &Path {
        match self {
            Self::AppendLine { path, .. }
            | Self::Write { path, .. }
            | Self::Remove { path }
            | Self::RemoveTree { path } => path,
        }
    }

    /// Perform the change on disk.
    pub fn apply(&self) -> std::io::Result<()> {
        match self {
            Self::AppendLine { path, line } => {
                let mut file = OpenOptions::new().create(true).append(true).open(path)?;
                writeln!(file, "{line}")
            }
            Self::Write { path, contents } => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(path, contents)
            }
            Self::Remove { path } => match fs::remove_file(path) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
            Self::RemoveTree { path } => match fs::remove_dir_all(path) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        }
    }
}

impl fmt::Display for FileEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AppendLine { path, line } => {
                write!(f, "append '{}' to {}", line, path.display())
            }
            Self::Write { path, .. } => write!(f, "write {}", path.display()),
            Self::Remove { path } => write!(f, "remove {}", path.display()),
            Self::RemoveTree { path } => write!(f, "remove directory {}", path.display()),
        }
    }
}

/// The integration boundary between the procedure and the host system.
pub trait Executor {
    /// Run an external command to completion.
    ///
    /// `Err` means the command could not be started at all; a non-zero exit
    /// is reported through `CommandOutput::success`.
    fn run(&self, command: &dyn SystemCommand) -> Result<CommandOutput>;

    /// Apply a file change.
    fn edit(&self, edit: &FileEdit) -> Result<()>;

    /// Current run mode.
    fn mode(&self) -> RunMode;
}

/// Executor backed by real processes and the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostExecutor {
    mode: RunMode,
}

impl HostExecutor {
    pub fn new(mode: RunMode) -> Self {
        Self { mode }
    }
}

impl Executor for HostExecutor {
    fn run(&self, command: &dyn SystemCommand) -> Result<CommandOutput> {
        let description = command.describe();

        if command.is_mutating() && self.mode.is_simulation() {
            println!("[DRY RUN] would run: {description}");
            info!(command = %description, "simulated");
            return Ok(CommandOutput::simulated());
        }

        debug!(command = %description, "running");

        let mut cmd = Command::new(command.program());
        cmd.args(command.args()).isolated();

        // The child leads a background process group; reading the terminal
        // would stop it with SIGTTIN.
        let stdin_data = command.stdin();
        cmd.stdin(if stdin_data.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        if command.inherit_output() {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| OobeError::system(format!("failed to start {description}: {e}")))?;
        let _tracked = TrackedChild::new(child.id());

        if let (Some(data), Some(mut pipe)) = (stdin_data, child.stdin.take()) {
            // A tool that exits before reading all input closes the pipe;
            // its exit status carries the real error.
            if let Err(e) = pipe.write_all(data) {
                warn!(command = %description, error = %e, "writing stdin failed");
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| OobeError::system(format!("failed waiting for {description}: {e}")))?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
            success: output.status.success(),
            simulated: false,
        };

        if result.success {
            debug!(command = %description, "succeeded");
        } else {
            debug!(command = %description, code = ?result.exit_code, "failed");
        }

        Ok(result)
    }

    fn edit(&self, edit: &FileEdit) -> Result<()> {
        if self.mode.is_simulation() {
            println!("[DRY RUN] would {edit}");
            info!(edit = %edit, "simulated");
            return Ok(());
        }

        debug!(edit = %edit, "applying");
        edit.apply().map_err(|e| {
            OobeError::system(format!("failed to {edit}: {e}"))
        })
    }

    fn mode(&self) -> RunMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::GetentPasswd;
    use tempfile::TempDir;

    struct Echo<'a> {
        input: &'a [u8],
    }

    impl SystemCommand for Echo<'_> {
        fn program(&self) -> &'static str {
            "cat"
        }

        fn args(&self) -> Vec<String> {
            vec![]
        }

        fn stdin(&self) -> Option<&[u8]> {
            Some(self.input)
        }

        fn is_mutating(&self) -> bool {
            false
        }
    }

    struct Touch {
        path: PathBuf,
    }

    impl SystemCommand for Touch {
        fn program(&self) -> &'static str {
            "touch"
        }

        fn args(&self) -> Vec<String> {
            vec![self.path.display().to_string()]
        }
    }

    #[test]
    fn test_run_mode_flags() {
        assert_eq!(RunMode::from_flags(false, false), RunMode::Live);
        assert_eq!(RunMode::from_flags(true, false), RunMode::Simulation);
        assert_eq!(RunMode::from_flags(false, true), RunMode::Simulation);
    }

    #[test]
    fn test_stdin_is_piped() {
        let exec = HostExecutor::new(RunMode::Live);
        let out = exec.run(&Echo { input: b"hello" }).unwrap();
        assert!(out.success);
        assert_eq!(out.stdout, "hello");
    }

    #[test]
    fn test_stdin_is_never_the_terminal() {
        struct Drain;

        impl SystemCommand for Drain {
            fn program(&self) -> &'static str {
                "cat"
            }

            fn args(&self) -> Vec<String> {
                vec![]
            }

            fn is_mutating(&self) -> bool {
                false
            }
        }

        let exec = HostExecutor::new(RunMode::Live);
        let out = exec.run(&Drain).unwrap();
        assert!(out.success);
        assert!(out.stdout.is_empty());
    }

    #[test]
    fn test_simulation_skips_mutating_commands() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("marker");
        let exec = HostExecutor::new(RunMode::Simulation);

        let out = exec.run(&Touch { path: path.clone() }).unwrap();
        assert!(out.success);
        assert!(out.simulated);
        assert!(!path.exists());
    }

    #[test]
    fn test_simulation_still_runs_queries() {
        let exec = HostExecutor::new(RunMode::Simulation);
        let out = exec.run(&Echo { input: b"q" }).unwrap();
        assert!(!out.simulated);
        assert_eq!(out.stdout, "q");
    }

    #[test]
    fn test_missing_program_is_an_error() {
        struct Nope;
        impl SystemCommand for Nope {
            fn program(&self) -> &'static str {
                "definitely-not-a-real-binary-12345"
            }
            fn args(&self) -> Vec<String> {
                vec![]
            }
        }
        let exec = HostExecutor::new(RunMode::Live);
        assert!(exec.run(&Nope).is_err());
    }

    #[test]
    fn test_nonzero_exit_is_reported() {
        let exec = HostExecutor::new(RunMode::Live);
        let out = exec
            .run(&GetentPasswd {
                key: "no-such-user-oobe-test".into(),
            })
            .unwrap();
        assert!(!out.success);
        assert!(out.ensure_success("getent").is_err());
    }

    #[test]
    fn test_file_edits() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("locale.gen");
        let exec = HostExecutor::new(RunMode::Live);

        exec.edit(&FileEdit::Write {
            path: path.clone(),
            contents: "# header\n".into(),
        })
        .unwrap();
        exec.edit(&FileEdit::AppendLine {
            path: path.clone(),
            line: "en_US.UTF-8 UTF-8".into(),
        })
        .unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "# header\nen_US.UTF-8 UTF-8\n"
        );

        exec.edit(&FileEdit::Remove { path: path.clone() }).unwrap();
        assert!(!path.exists());
        // Removing again is fine
        exec.edit(&FileEdit::Remove { path }).unwrap();
    }

    #[test]
    fn test_simulated_edits_leave_disk_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("machine-id");
        fs::write(&path, "abc\n").unwrap();

        let exec = HostExecutor::new(RunMode::Simulation);
        exec.edit(&FileEdit::Remove { path: path.clone() }).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_output_message_prefers_stderr() {
        let out = CommandOutput {
            stdout: "ignored".into(),
            stderr: "  useradd: user 'larry' already exists\n".into(),
            exit_code: Some(9),
            success: false,
            simulated: false,
        };
        assert_eq!(out.message(), "useradd: user 'larry' already exists");
        let err = out.ensure_success("useradd").unwrap_err().to_string();
        assert!(err.contains("exit code 9"));
    }
}
