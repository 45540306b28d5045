//! OOBE configuration file handling.
//!
//! Every knob has a default matching the shipped Gentoo WSL image, so the
//! file is optional. Distribution maintainers can drop a JSON file at
//! `/etc/wsl-oobe.json` (or point `WSL_OOBE_CONFIG` / `--config` at one) to
//! override individual fields; missing fields keep their defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the optional configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/wsl-oobe.json";

/// Environment variable naming an alternative configuration file.
pub const CONFIG_ENV: &str = "WSL_OOBE_CONFIG";

/// A required external command and the package that provides it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredCommand {
    pub name: String,
    pub package: String,
}

impl RequiredCommand {
    pub fn new(name: &str, package: &str) -> Self {
        Self {
            name: name.to_string(),
            package: package.to_string(),
        }
    }
}

/// Upstream ebuild repository registered during bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Repository name as used by Portage (`gentoo`).
    pub name: String,
    /// Git URI to sync from.
    pub sync_uri: String,
    /// Checkout location.
    pub location: PathBuf,
    /// OpenPGP key used to verify commit signatures.
    pub openpgp_key_path: PathBuf,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            name: "gentoo".to_string(),
            sync_uri: "https://github.com/gentoo-mirror/gentoo.git".to_string(),
            location: PathBuf::from("/var/db/repos/gentoo"),
            openpgp_key_path: PathBuf::from("/usr/share/openpgp-keys/gentoo-release.asc"),
        }
    }
}

/// Filesystem locations the procedure reads or edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    /// Locale generation list appended to during locale setup.
    pub locale_gen: PathBuf,
    /// System-wide `LANG` setting.
    pub locale_conf: PathBuf,
    /// List of every locale glibc can generate.
    pub supported_locales: PathBuf,
    /// PAM stack inspected for the passwdqc module.
    pub pam_config: PathBuf,
    /// passwdqc configuration passed to `pwqcheck`.
    pub passwdqc_config: PathBuf,
    /// Directory holding Portage repository definitions.
    pub repos_conf_dir: PathBuf,
    /// Machine identity file regenerated after masking.
    pub machine_id: PathBuf,
    /// Exists only when systemd is running as PID 1.
    pub systemd_runtime_dir: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            locale_gen: PathBuf::from("/etc/locale.gen"),
            locale_conf: PathBuf::from("/etc/locale.conf"),
            supported_locales: PathBuf::from("/usr/share/i18n/SUPPORTED"),
            pam_config: PathBuf::from("/etc/pam.d/system-auth"),
            passwdqc_config: PathBuf::from("/etc/security/passwdqc.conf"),
            repos_conf_dir: PathBuf::from("/etc/portage/repos.conf"),
            machine_id: PathBuf::from("/etc/machine-id"),
            systemd_runtime_dir: PathBuf::from("/run/systemd/system"),
        }
    }
}

/// OOBE configuration that can be loaded from JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OobeConfig {
    // Account
    pub default_uid: u32,
    pub default_shell: String,
    /// Secondary groups for the new account; all must exist before setup.
    pub groups: Vec<String>,

    // Preflight
    pub required_commands: Vec<RequiredCommand>,

    // Credentials
    /// Delay after a rejected password before prompting again, in milliseconds.
    pub complexity_backoff_ms: u64,

    // Bootstrap
    /// `host:port` pairs tried in order by the network probe. Literal
    /// addresses avoid depending on DNS.
    pub probe_hosts: Vec<String>,
    /// Per-host deadline covering name resolution and connects, in
    /// milliseconds.
    pub probe_timeout_ms: u64,
    /// Units masked when systemd is detected.
    pub masked_units: Vec<String>,
    pub repository: RepositoryConfig,
    pub paths: Paths,
}

impl Default for OobeConfig {
    fn default() -> Self {
        Self {
            default_uid: 1000,
            default_shell: "/bin/bash".to_string(),
            groups: vec!["users".to_string(), "wheel".to_string()],
            required_commands: vec![
                RequiredCommand::new("getent", "sys-libs/glibc"),
                RequiredCommand::new("useradd", "sys-apps/shadow"),
                RequiredCommand::new("userdel", "sys-apps/shadow"),
                RequiredCommand::new("chpasswd", "sys-apps/shadow"),
                RequiredCommand::new("openssl", "dev-libs/openssl"),
            ],
            complexity_backoff_ms: 2000,
            probe_hosts: vec![
                "1.1.1.1:443".to_string(),
                "9.9.9.9:443".to_string(),
                "8.8.8.8:443".to_string(),
            ],
            probe_timeout_ms: 3000,
            masked_units: [
                "NetworkManager.service",
                "systemd-networkd.service",
                "systemd-networkd.socket",
                "systemd-resolved.service",
                "systemd-tmpfiles-clean.service",
                "systemd-tmpfiles-clean.timer",
                "systemd-tmpfiles-setup-dev-early.service",
                "systemd-tmpfiles-setup-dev.service",
                "systemd-tmpfiles-setup.service",
                "tmp.mount",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            repository: RepositoryConfig::default(),
            paths: Paths::default(),
        }
    }
}

impl OobeConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;

        Ok(config)
    }

    /// Resolve the configuration for this run.
    ///
    /// An explicit path (CLI or environment) must load; the default path is
    /// used only if it exists; otherwise built-in defaults apply.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let config = match explicit.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::load_from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::load_from_file(DEFAULT_CONFIG_PATH)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.default_uid == 0 {
            anyhow::bail!("default_uid must not be 0 (root)");
        }
        if !self.default_shell.starts_with('/') {
            anyhow::bail!("default_shell must be an absolute path");
        }
        if let Some(group) = self.groups.iter().find(|g| g.trim().is_empty()) {
            anyhow::bail!("groups contains an empty name: {:?}", group);
        }
        if self.required_commands.iter().any(|c| c.name.trim().is_empty()) {
            anyhow::bail!("required_commands contains an empty command name");
        }
        if self.probe_hosts.is_empty() {
            anyhow::bail!("probe_hosts must list at least one host");
        }
        if let Some(host) = self.probe_hosts.iter().find(|h| !h.contains(':')) {
            anyhow::bail!("probe host {:?} must be in host:port form", host);
        }
        if self.probe_timeout_ms == 0 {
            anyhow::bail!("probe_timeout_ms must be positive");
        }
        if self.repository.name.trim().is_empty() {
            anyhow::bail!("repository name must be specified");
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn complexity_backoff(&self) -> Duration {
        Duration::from_millis(self.complexity_backoff_ms)
    }
}
