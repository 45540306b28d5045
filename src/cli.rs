use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// wsl-oobe - First-boot setup for Gentoo on WSL
#[derive(Parser, Debug)]
#[command(name = "wsl-oobe")]
#[command(about = "Create the default user and bootstrap a fresh Gentoo WSL distribution")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: show what would be changed without making changes.
    ///
    /// Account creation, password changes, file edits and service masking
    /// are printed instead of executed. Queries (getent, hashing, the
    /// password policy check) still run so the preview is realistic.
    /// Setting DEBUG to any non-empty value has the same effect.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Path to a JSON configuration file (overrides WSL_OOBE_CONFIG).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Stop after the account is provisioned (no locale, sync or masking).
    #[arg(long, global = true)]
    pub skip_bootstrap: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Run the interactive first-boot setup (default)
    Run,
    /// Check the environment and print a report without prompting
    Check,
}

impl Cli {
    pub fn action(&self) -> Commands {
        self.command.unwrap_or(Commands::Run)
    }
}
