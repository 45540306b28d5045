//! wsl-oobe Library
//!
//! First-boot account provisioning and environment bootstrap for Gentoo on
//! WSL. The binary in `main.rs` wires the host implementations of each seam
//! into `procedure::Oobe`; tests wire in fakes.

pub mod accounts;
pub mod bootstrap;
pub mod cli;
pub mod command;
pub mod commands;
pub mod config_file;
pub mod credentials;
pub mod error;
pub mod executor;
pub mod password_hash;
pub mod preflight;
pub mod procedure;
pub mod process_guard;
pub mod provision;
pub mod report;
pub mod secret;
pub mod terminal;

// Re-export main types for convenience
pub use accounts::{AccountSpec, AccountStore, HostAccountStore, OpensslHasher, PasswordHasher};
pub use bootstrap::{BootstrapFacts, BootstrapReport, Bootstrapper, NetworkProbe, TcpProbe};
pub use command::SystemCommand;
pub use config_file::OobeConfig;
pub use credentials::{CandidateAccount, Complexity, ComplexityChecker, PasswdqcChecker, UsernameError};
pub use error::{OobeError, Result, exit_code};
pub use executor::{CommandOutput, Executor, FileEdit, HostExecutor, RunMode};
pub use password_hash::PasswordHash;
pub use preflight::{Capabilities, EnvironmentProbe, HostProbe};
pub use procedure::{Oobe, Outcome, Seams, Stage, StageTracker, TransitionError};
pub use process_guard::{ProcessGroupExt, ProcessTable};
pub use provision::{CredentialDecision, Provisioner, ProvisioningOutcome};
pub use secret::Secret;
pub use terminal::{ConsoleTerminal, Terminal};
