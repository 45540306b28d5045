//! Typed commands for the account and credential database.
//!
//! - `GetentPasswd` / `GetentGroup` for lookups (read-only)
//! - `UserAdd` / `UserDel` for account creation and rollback
//! - `OpensslPasswd` for SHA-512 crypt hashing (read-only)
//! - `ChpasswdEncrypted` for applying pre-hashed passwords
//! - `Pwqcheck` for the optional passwdqc complexity check (read-only)
//!
//! # Security: Secret Handling
//!
//! **CRITICAL**: Plaintext passwords and hashes are passed on stdin, never as
//! CLI flags. CLI arguments are visible in `/proc/<pid>/cmdline` to all users.

use std::path::PathBuf;

use zeroize::Zeroizing;

use crate::command::SystemCommand;

// ============================================================================
// Lookups
// ============================================================================

/// `getent passwd <key>`, where key is a username or a numeric uid.
#[derive(Debug, Clone)]
pub struct GetentPasswd {
    pub key: String,
}

impl SystemCommand for GetentPasswd {
    fn program(&self) -> &'static str {
        "getent"
    }

    fn args(&self) -> Vec<String> {
        vec!["passwd".to_string(), self.key.clone()]
    }

    fn is_mutating(&self) -> bool {
        false
    }
}

/// `getent group <name>`.
#[derive(Debug, Clone)]
pub struct GetentGroup {
    pub name: String,
}

impl SystemCommand for GetentGroup {
    fn program(&self) -> &'static str {
        "getent"
    }

    fn args(&self) -> Vec<String> {
        vec!["group".to_string(), self.name.clone()]
    }

    fn is_mutating(&self) -> bool {
        false
    }
}

// ============================================================================
// Account creation / deletion
// ============================================================================

/// `useradd` for the first interactive account.
///
/// # Field to Flag Mapping
///
/// | Rust Field | Flag | Notes |
/// |------------|------|-------|
/// | `uid`      | `-u` | Fixed well-known id |
/// | `shell`    | `-s` | Login shell |
/// | `groups`   | `-G` | Comma-separated secondary groups |
/// | -          | `-m` | Always create the home directory |
#[derive(Debug, Clone)]
pub struct UserAdd {
    pub username: String,
    pub uid: u32,
    pub shell: String,
    pub groups: Vec<String>,
}

impl SystemCommand for UserAdd {
    fn program(&self) -> &'static str {
        "useradd"
    }

    fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-m".to_string(),
            "-u".to_string(),
            self.uid.to_string(),
            "-s".to_string(),
            self.shell.clone(),
        ];
        if !self.groups.is_empty() {
            args.push("-G".to_string());
            args.push(self.groups.join(","));
        }
        args.push(self.username.clone());
        args
    }
}

/// `userdel` used to undo a partially provisioned account.
#[derive(Debug, Clone)]
pub struct UserDel {
    pub username: String,
    /// Also remove the home directory and mail spool (`-r`).
    pub remove_home: bool,
}

impl SystemCommand for UserDel {
    fn program(&self) -> &'static str {
        "userdel"
    }

    fn args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(2);
        if self.remove_home {
            args.push("-r".to_string());
        }
        args.push(self.username.clone());
        args
    }
}

// ============================================================================
// Hashing and password application
// ============================================================================

/// `openssl passwd -6 -salt <salt> -stdin`.
///
/// Reads the plaintext from stdin and prints `$6$<salt>$<digest>`.
/// Borrowing the plaintext keeps the only copy inside `Secret`.
pub struct OpensslPasswd<'a> {
    pub salt: &'a str,
    pub plaintext: &'a [u8],
}

impl std::fmt::Debug for OpensslPasswd<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpensslPasswd")
            .field("salt", &self.salt)
            .field("plaintext", &"[REDACTED]")
            .finish()
    }
}

impl SystemCommand for OpensslPasswd<'_> {
    fn program(&self) -> &'static str {
        "openssl"
    }

    fn args(&self) -> Vec<String> {
        vec![
            "passwd".to_string(),
            "-6".to_string(),
            "-salt".to_string(),
            self.salt.to_string(),
            "-stdin".to_string(),
        ]
    }

    fn stdin(&self) -> Option<&[u8]> {
        Some(self.plaintext)
    }

    fn is_mutating(&self) -> bool {
        false
    }
}

/// `chpasswd -e`: applies a `name:hash` line without re-hashing.
pub struct ChpasswdEncrypted {
    line: Zeroizing<String>,
}

impl ChpasswdEncrypted {
    pub fn new(username: &str, hash: &str) -> Self {
        Self {
            line: Zeroizing::new(format!("{username}:{hash}\n")),
        }
    }
}

impl std::fmt::Debug for ChpasswdEncrypted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ChpasswdEncrypted([REDACTED])")
    }
}

impl SystemCommand for ChpasswdEncrypted {
    fn program(&self) -> &'static str {
        "chpasswd"
    }

    fn args(&self) -> Vec<String> {
        vec!["-e".to_string()]
    }

    fn stdin(&self) -> Option<&[u8]> {
        Some(self.line.as_bytes())
    }
}

/// `pwqcheck -1 [config=<file>]`: checks one passphrase read from stdin.
///
/// Exits non-zero and prints the reason when the passphrase is rejected.
pub struct Pwqcheck {
    input: Zeroizing<Vec<u8>>,
    pub config: Option<PathBuf>,
}

impl Pwqcheck {
    pub fn new(plaintext: &[u8], config: Option<PathBuf>) -> Self {
        let mut input = Zeroizing::new(Vec::with_capacity(plaintext.len() + 1));
        input.extend_from_slice(plaintext);
        input.push(b'\n');
        Self { input, config }
    }
}

impl std::fmt::Debug for Pwqcheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pwqcheck")
            .field("input", &"[REDACTED]")
            .field("config", &self.config)
            .finish()
    }
}

impl SystemCommand for Pwqcheck {
    fn program(&self) -> &'static str {
        "pwqcheck"
    }

    fn args(&self) -> Vec<String> {
        let mut args = vec!["-1".to_string()];
        if let Some(ref config) = self.config {
            args.push(format!("config={}", config.display()));
        }
        args
    }

    fn stdin(&self) -> Option<&[u8]> {
        Some(self.input.as_slice())
    }

    fn is_mutating(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_useradd_args() {
        let cmd = UserAdd {
            username: "larry".to_string(),
            uid: 1000,
            shell: "/bin/bash".to_string(),
            groups: vec!["users".to_string(), "wheel".to_string()],
        };
        assert_eq!(
            cmd.args(),
            vec!["-m", "-u", "1000", "-s", "/bin/bash", "-G", "users,wheel", "larry"]
        );
        assert!(cmd.is_mutating());
        // Username is always the last positional argument
        assert_eq!(cmd.args().last().map(String::as_str), Some("larry"));
    }

    #[test]
    fn test_useradd_without_groups() {
        let cmd = UserAdd {
            username: "larry".to_string(),
            uid: 1000,
            shell: "/bin/zsh".to_string(),
            groups: vec![],
        };
        assert!(!cmd.args().contains(&"-G".to_string()));
    }

    #[test]
    fn test_userdel_removes_home() {
        let cmd = UserDel {
            username: "larry".to_string(),
            remove_home: true,
        };
        assert_eq!(cmd.args(), vec!["-r", "larry"]);
        assert_eq!(cmd.describe(), "userdel -r larry");
    }

    #[test]
    fn test_openssl_secret_stays_off_argv() {
        let cmd = OpensslPasswd {
            salt: "abcdefghijklmnop",
            plaintext: b"hunter2",
        };
        assert!(!cmd.describe().contains("hunter2"));
        assert_eq!(cmd.stdin(), Some(&b"hunter2"[..]));
        assert!(!cmd.is_mutating());
        assert!(cmd.args().contains(&"-6".to_string()));
    }

    #[test]
    fn test_chpasswd_line_format() {
        let cmd = ChpasswdEncrypted::new("root", "$6$salt$digest");
        assert_eq!(cmd.stdin(), Some(&b"root:$6$salt$digest\n"[..]));
        assert_eq!(cmd.args(), vec!["-e"]);
        assert!(!cmd.describe().contains("$6$"));
        assert!(!format!("{cmd:?}").contains("digest"));
    }

    #[test]
    fn test_pwqcheck_appends_newline() {
        let cmd = Pwqcheck::new(b"correct horse", Some(PathBuf::from("/etc/passwdqc.conf")));
        assert_eq!(cmd.stdin(), Some(&b"correct horse\n"[..]));
        assert_eq!(cmd.args(), vec!["-1", "config=/etc/passwdqc.conf"]);
        assert!(!format!("{cmd:?}").contains("horse"));
    }

    #[test]
    fn test_lookups_are_read_only() {
        assert!(!GetentPasswd { key: "1000".into() }.is_mutating());
        assert!(!GetentGroup { name: "wheel".into() }.is_mutating());
    }
}
