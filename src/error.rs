//! Error handling module for the OOBE procedure
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Every fatal path of the procedure ends in one of these variants, and the
//! variant alone decides the process exit code.

use thiserror::Error;

/// Process exit codes.
pub mod exit_code {
    /// Provisioning finished, or the default account already existed.
    pub const SUCCESS: i32 = 0;
    /// Declined confirmation, closed input, or a failed provisioning step.
    pub const FAILURE: i32 = 1;
    /// A required external command is not on `PATH`.
    pub const MISSING_COMMAND: i32 = 2;
    /// A required group does not exist in the group database.
    pub const MISSING_GROUP: i32 = 3;
    /// Standard input is not an interactive terminal.
    pub const NOT_INTERACTIVE: i32 = 4;
    /// Not running as root outside simulation mode.
    pub const NOT_ROOT: i32 = 5;
}

/// Which account a password application targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum HashTarget {
    #[strum(serialize = "user")]
    User,
    #[strum(serialize = "root")]
    Root,
}

/// Main error type for the OOBE procedure
#[derive(Error, Debug)]
pub enum OobeError {
    /// IO errors (terminal, config files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors (loading, parsing, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required command is missing from `PATH`
    #[error("required command '{command}' was not found (install {package})")]
    MissingCommand { command: String, package: String },

    /// A required group is missing from the group database
    #[error("required group '{0}' does not exist")]
    MissingGroup(String),

    /// Standard input is not a terminal
    #[error("this setup must be run from an interactive terminal")]
    NotInteractive,

    /// Effective user is not root
    #[error("this setup must be run as root")]
    NotRoot,

    /// The user declined the account summary
    #[error("account creation was cancelled")]
    Declined,

    /// Standard input reached end of file while waiting for an answer
    #[error("input closed before setup finished")]
    InputClosed,

    /// `useradd` failed; nothing was created
    #[error("failed to create user '{username}': {reason}")]
    AccountCreation { username: String, reason: String },

    /// The hashing tool produced something that is not a SHA-512 crypt string
    #[error("generated {target} password hash is malformed: '{raw}'")]
    MalformedHash { target: HashTarget, raw: String },

    /// One or both pre-hashed password applications failed
    #[error("failed to set the password for {}", describe_failed(.user_failed, .root_failed))]
    CredentialsNotApplied { user_failed: bool, root_failed: bool },

    /// System errors (spawning commands, unexpected tool output)
    #[error("System error: {0}")]
    System(String),
}

fn describe_failed(user_failed: &bool, root_failed: &bool) -> &'static str {
    match (*user_failed, *root_failed) {
        (true, true) => "both the new user and root",
        (true, false) => "the new user",
        (false, true) => "root",
        (false, false) => "no account",
    }
}

/// Result type alias for OOBE operations
pub type Result<T> = std::result::Result<T, OobeError>;

impl OobeError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a system error
    pub fn system(msg: impl Into<String>) -> Self {
        Self::System(msg.into())
    }

    /// Exit code the process terminates with for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingCommand { .. } => exit_code::MISSING_COMMAND,
            Self::MissingGroup(_) => exit_code::MISSING_GROUP,
            Self::NotInteractive => exit_code::NOT_INTERACTIVE,
            Self::NotRoot => exit_code::NOT_ROOT,
            _ => exit_code::FAILURE,
        }
    }

    /// True when the failure points at a defect in the image or in this tool
    /// rather than at something the user did or the environment they chose.
    pub fn is_bug(&self) -> bool {
        match self {
            Self::MissingCommand { .. }
            | Self::MissingGroup(_)
            | Self::MalformedHash { .. }
            | Self::Config(_)
            | Self::System(_)
            | Self::Io(_) => true,
            Self::NotInteractive
            | Self::NotRoot
            | Self::Declined
            | Self::InputClosed
            | Self::AccountCreation { .. }
            | Self::CredentialsNotApplied { .. } => false,
        }
    }

    /// True when account state was rolled back before this error surfaced.
    pub fn rolled_back(&self) -> bool {
        matches!(
            self,
            Self::MalformedHash { .. } | Self::CredentialsNotApplied { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OobeError::config("probe timeout must be positive");
        assert_eq!(
            err.to_string(),
            "Configuration error: probe timeout must be positive"
        );

        let err = OobeError::MissingGroup("wheel".to_string());
        assert_eq!(err.to_string(), "required group 'wheel' does not exist");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: OobeError = io_err.into();
        assert!(matches!(err, OobeError::Io(_)));
        assert_eq!(err.exit_code(), exit_code::FAILURE);
    }

    #[test]
    fn test_preflight_exit_codes_are_distinct() {
        let codes = [
            OobeError::MissingCommand {
                command: "useradd".into(),
                package: "sys-apps/shadow".into(),
            }
            .exit_code(),
            OobeError::MissingGroup("wheel".into()).exit_code(),
            OobeError::NotInteractive.exit_code(),
            OobeError::NotRoot.exit_code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            assert_ne!(*a, exit_code::SUCCESS);
            assert_ne!(*a, exit_code::FAILURE);
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_transactional_failures_exit_one() {
        let err = OobeError::CredentialsNotApplied {
            user_failed: false,
            root_failed: true,
        };
        assert_eq!(err.exit_code(), 1);
        assert!(err.rolled_back());
        assert!(err.to_string().contains("root"));
        assert!(!err.is_bug());

        let err = OobeError::MalformedHash {
            target: HashTarget::User,
            raw: "garbage".into(),
        };
        assert_eq!(err.exit_code(), 1);
        assert!(err.is_bug());
        assert!(err.to_string().contains("garbage"));
    }

    #[test]
    fn test_declined_is_not_a_bug() {
        assert!(!OobeError::Declined.is_bug());
        assert!(!OobeError::Declined.rolled_back());
        assert_eq!(OobeError::Declined.exit_code(), 1);
    }
}
