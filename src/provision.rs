//! Account provisioning.
//!
//! Creates the account, derives two independently salted hashes from the
//! confirmed password and applies them to the new user and to `root`. Once
//! the account exists, any failure deletes it again before the error is
//! returned, so a failed run leaves no half-configured login behind.

use rand::{CryptoRng, Rng};
use tracing::{error, info, warn};

use crate::accounts::{AccountSpec, AccountStore, PasswordHasher};
use crate::error::{HashTarget, OobeError, Result};
use crate::password_hash::{PasswordHash, generate_salt};
use crate::secret::Secret;

/// Account that receives the same password as the new user.
pub const ROOT_USER: &str = "root";

/// What stage 3 achieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvisioningOutcome {
    pub user_created: bool,
    pub user_password_set: bool,
    pub root_password_set: bool,
}

impl ProvisioningOutcome {
    pub fn decision(&self) -> CredentialDecision {
        CredentialDecision::from_results(self.user_password_set, self.root_password_set)
    }
}

/// Result table for the two pre-hashed password applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialDecision {
    BothApplied,
    UserFailed,
    RootFailed,
    BothFailed,
}

impl CredentialDecision {
    pub fn from_results(user_ok: bool, root_ok: bool) -> Self {
        match (user_ok, root_ok) {
            (true, true) => Self::BothApplied,
            (false, true) => Self::UserFailed,
            (true, false) => Self::RootFailed,
            (false, false) => Self::BothFailed,
        }
    }

    pub fn needs_rollback(self) -> bool {
        !matches!(self, Self::BothApplied)
    }

    /// The error to report, or `None` when both applications succeeded.
    pub fn into_error(self) -> Option<OobeError> {
        match self {
            Self::BothApplied => None,
            Self::UserFailed => Some(OobeError::CredentialsNotApplied {
                user_failed: true,
                root_failed: false,
            }),
            Self::RootFailed => Some(OobeError::CredentialsNotApplied {
                user_failed: false,
                root_failed: true,
            }),
            Self::BothFailed => Some(OobeError::CredentialsNotApplied {
                user_failed: true,
                root_failed: true,
            }),
        }
    }
}

pub struct Provisioner<'a> {
    accounts: &'a dyn AccountStore,
    hasher: &'a dyn PasswordHasher,
}

impl<'a> Provisioner<'a> {
    pub fn new(accounts: &'a dyn AccountStore, hasher: &'a dyn PasswordHasher) -> Self {
        Self { accounts, hasher }
    }

    /// Create `account` and set `password` for it and for root.
    pub fn provision(&self, account: &AccountSpec, password: &Secret) -> Result<ProvisioningOutcome> {
        self.provision_with_rng(account, password, &mut rand::rng())
    }

    pub fn provision_with_rng<R: Rng + CryptoRng>(
        &self,
        account: &AccountSpec,
        password: &Secret,
        rng: &mut R,
    ) -> Result<ProvisioningOutcome> {
        let mut outcome = ProvisioningOutcome::default();

        // Nothing exists yet if this fails, so there is nothing to undo.
        self.accounts.create(account)?;
        outcome.user_created = true;
        info!(username = %account.username, uid = account.uid, "account created");

        let hashes = self
            .derive(password, HashTarget::User, rng)
            .and_then(|user| Ok((user, self.derive(password, HashTarget::Root, rng)?)));
        let (user_hash, root_hash) = match hashes {
            Ok(pair) => pair,
            Err(e) => {
                self.roll_back(&account.username);
                return Err(e);
            }
        };

        outcome.user_password_set = self.apply(&account.username, &user_hash);
        outcome.root_password_set = self.apply(ROOT_USER, &root_hash);

        if let Some(err) = outcome.decision().into_error() {
            self.roll_back(&account.username);
            return Err(err);
        }

        info!(username = %account.username, "passwords applied");
        Ok(outcome)
    }

    fn derive<R: Rng + CryptoRng>(
        &self,
        password: &Secret,
        target: HashTarget,
        rng: &mut R,
    ) -> Result<PasswordHash> {
        let salt = generate_salt(rng);
        let raw = self.hasher.hash(password, &salt)?;
        PasswordHash::parse(&raw).map_err(|raw| {
            error!(%target, "hashing tool returned a malformed hash");
            OobeError::MalformedHash { target, raw }
        })
    }

    fn apply(&self, username: &str, hash: &PasswordHash) -> bool {
        match self.accounts.set_hash(username, hash) {
            Ok(()) => true,
            Err(e) => {
                warn!(username, error = %e, "password application failed");
                false
            }
        }
    }

    fn roll_back(&self, username: &str) {
        warn!(username, "rolling back account creation");
        if let Err(e) = self.accounts.delete(username) {
            error!(username, error = %e, "rollback failed");
            eprintln!("Could not remove '{username}' during cleanup: {e}");
            eprintln!("Remove it manually with: userdel -r {username}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_table() {
        assert_eq!(CredentialDecision::from_results(true, true), CredentialDecision::BothApplied);
        assert_eq!(CredentialDecision::from_results(false, true), CredentialDecision::UserFailed);
        assert_eq!(CredentialDecision::from_results(true, false), CredentialDecision::RootFailed);
        assert_eq!(CredentialDecision::from_results(false, false), CredentialDecision::BothFailed);
    }

    #[test]
    fn test_rollback_on_exactly_three_branches() {
        let rollbacks = [
            CredentialDecision::BothApplied,
            CredentialDecision::UserFailed,
            CredentialDecision::RootFailed,
            CredentialDecision::BothFailed,
        ]
        .into_iter()
        .filter(|d| d.needs_rollback())
        .count();
        assert_eq!(rollbacks, 3);
        assert!(CredentialDecision::BothApplied.into_error().is_none());
    }

    #[test]
    fn test_error_names_failed_side() {
        let err = CredentialDecision::RootFailed.into_error().unwrap();
        assert_eq!(err.to_string(), "failed to set the password for root");
        let err = CredentialDecision::BothFailed.into_error().unwrap();
        assert!(err.to_string().contains("both"));
    }
}
