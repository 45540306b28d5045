//! Account database and password hashing capabilities.
//!
//! The provisioning logic talks to the system only through the two traits in
//! this module, so the transactional rules in `provision` can be tested
//! against in-memory fakes. The host implementations shell out through an
//! `Executor`, which keeps simulation mode and process cleanup in one place.

use tracing::{debug, warn};

use crate::commands::{ChpasswdEncrypted, GetentGroup, GetentPasswd, OpensslPasswd, UserAdd, UserDel};
use crate::error::{OobeError, Result};
use crate::executor::{CommandOutput, Executor};
use crate::password_hash::PasswordHash;
use crate::secret::Secret;

/// `getent` exit status for "key not found".
const GETENT_NOT_FOUND: i32 = 2;

/// Everything `useradd` needs to create the account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSpec {
    pub username: String,
    pub uid: u32,
    pub shell: String,
    pub groups: Vec<String>,
}

/// Access to the user/group database.
pub trait AccountStore {
    fn uid_exists(&self, uid: u32) -> Result<bool>;
    fn user_exists(&self, username: &str) -> Result<bool>;
    fn group_exists(&self, group: &str) -> Result<bool>;
    /// Create the account and its home directory.
    fn create(&self, account: &AccountSpec) -> Result<()>;
    /// Delete the account and its home directory.
    fn delete(&self, username: &str) -> Result<()>;
    /// Store an already-hashed password without re-hashing it.
    fn set_hash(&self, username: &str, hash: &PasswordHash) -> Result<()>;
}

/// Produces SHA-512 crypt strings.
pub trait PasswordHasher {
    /// Hash `secret` with `salt` and return the tool's raw output.
    ///
    /// The output is validated by the caller; a hasher that misbehaves is
    /// caught there rather than trusted here.
    fn hash(&self, secret: &Secret, salt: &str) -> Result<String>;
}

/// `AccountStore` backed by shadow-utils and `getent`.
pub struct HostAccountStore<'a> {
    exec: &'a dyn Executor,
}

impl<'a> HostAccountStore<'a> {
    pub fn new(exec: &'a dyn Executor) -> Self {
        Self { exec }
    }

    fn lookup(&self, output: CommandOutput, what: &str) -> Result<bool> {
        match output.exit_code {
            Some(0) => Ok(true),
            Some(GETENT_NOT_FOUND) => Ok(false),
            _ => Err(OobeError::system(format!(
                "getent lookup for {} failed: {}",
                what,
                output.message()
            ))),
        }
    }
}

impl AccountStore for HostAccountStore<'_> {
    fn uid_exists(&self, uid: u32) -> Result<bool> {
        let output = self.exec.run(&GetentPasswd {
            key: uid.to_string(),
        })?;
        self.lookup(output, &format!("uid {uid}"))
    }

    fn user_exists(&self, username: &str) -> Result<bool> {
        let output = self.exec.run(&GetentPasswd {
            key: username.to_string(),
        })?;
        self.lookup(output, &format!("user '{username}'"))
    }

    fn group_exists(&self, group: &str) -> Result<bool> {
        let output = self.exec.run(&GetentGroup {
            name: group.to_string(),
        })?;
        self.lookup(output, &format!("group '{group}'"))
    }

    fn create(&self, account: &AccountSpec) -> Result<()> {
        let output = self.exec.run(&UserAdd {
            username: account.username.clone(),
            uid: account.uid,
            shell: account.shell.clone(),
            groups: account.groups.clone(),
        })?;
        if output.success {
            debug!(username = %account.username, uid = account.uid, "account created");
            Ok(())
        } else {
            Err(OobeError::AccountCreation {
                username: account.username.clone(),
                reason: output.message(),
            })
        }
    }

    fn delete(&self, username: &str) -> Result<()> {
        self.exec
            .run(&UserDel {
                username: username.to_string(),
                remove_home: true,
            })?
            .ensure_success(&format!("userdel {username}"))
    }

    fn set_hash(&self, username: &str, hash: &PasswordHash) -> Result<()> {
        let output = self.exec.run(&ChpasswdEncrypted::new(username, hash.as_str()))?;
        if !output.success {
            // stderr from chpasswd never echoes the hash
            warn!(username, error = %output.message(), "chpasswd -e failed");
        }
        output.ensure_success(&format!("chpasswd for {username}"))
    }
}

/// `PasswordHasher` backed by `openssl passwd -6`.
pub struct OpensslHasher<'a> {
    exec: &'a dyn Executor,
}

impl<'a> OpensslHasher<'a> {
    pub fn new(exec: &'a dyn Executor) -> Self {
        Self { exec }
    }
}

impl PasswordHasher for OpensslHasher<'_> {
    fn hash(&self, secret: &Secret, salt: &str) -> Result<String> {
        let output = self.exec.run(&OpensslPasswd {
            salt,
            plaintext: secret.as_bytes(),
        })?;
        if output.success {
            Ok(output.stdout)
        } else {
            // Surface whatever the tool printed so validation reports it
            Ok(output.message())
        }
    }
}
