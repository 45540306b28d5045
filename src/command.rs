//! Type-safe external command contracts.
//!
//! This module provides the `SystemCommand` trait for ensuring compile-time
//! correctness of every external tool invocation. Instead of raw string
//! vectors, Rust structs implement this trait to produce the program name,
//! its argv, and any data that must travel over stdin.
//!
//! # Design Goals
//!
//! 1. **Compile-Time Safety**: Flag mismatches (e.g., `-G` vs `-g`) live in
//!    exactly one `impl` and are covered by unit tests.
//! 2. **Single Source of Truth**: The struct definition IS the contract.
//! 3. **Secrets via stdin**: Passwords and hashes never appear in argv, which
//!    is readable by every user through `/proc/<pid>/cmdline`.
//! 4. **Simulation awareness**: Each command declares whether it mutates the
//!    system so the executor can replace it with a description in dry-run
//!    mode.

/// Trait for typed external commands.
///
/// # Contract
///
/// - `program()`: Executable name, resolved through `PATH`.
/// - `args()`: Arguments exactly as the tool expects them.
/// - `stdin()`: Bytes written to the child's stdin (None = `/dev/null`).
/// - `is_mutating()`: Whether running it changes persistent system state.
///
/// # Invariants
///
/// - `args()` MUST NOT contain secret material.
/// - `describe()` MUST NOT include `stdin()`.
pub trait SystemCommand {
    /// Executable name (e.g., `useradd`).
    fn program(&self) -> &'static str;

    /// Command-line arguments.
    fn args(&self) -> Vec<String>;

    /// Data to feed on stdin. Defaults to none.
    fn stdin(&self) -> Option<&[u8]> {
        None
    }

    /// Whether this command changes persistent state.
    ///
    /// Mutating commands are skipped in simulation mode. Defaults to `true`
    /// so that a forgotten override errs on the side of not touching the
    /// system during a dry run.
    fn is_mutating(&self) -> bool {
        true
    }

    /// Stream the tool's stdout/stderr straight to the terminal instead of
    /// capturing it. Used for long-running tools with progress output.
    fn inherit_output(&self) -> bool {
        false
    }

    /// Human-readable command line, safe to print and log.
    fn describe(&self) -> String {
        let args = self.args();
        if args.is_empty() {
            self.program().to_string()
        } else {
            format!("{} {}", self.program(), args.join(" "))
        }
    }
}
