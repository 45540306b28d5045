//! Binary package trust and ebuild repository sync.
//!
//! The image ships an rsync-style `gentoo` repository snapshot. It is
//! replaced by a git-synced registration with commit signature verification
//! required, then synced once so the first `emerge` works.

use std::path::Path;

use tracing::{debug, info};

use super::{BootstrapReport, Step, run_step};
use crate::commands::{EmaintSync, EselectNews, Getuto, NewsAction};
use crate::config_file::{OobeConfig, RepositoryConfig};
use crate::executor::{Executor, FileEdit};

/// Contents of `repos.conf/<name>.conf` for a git-synced repository.
pub fn registration(repo: &RepositoryConfig) -> String {
    format!(
        "[DEFAULT]\n\
         main-repo = {name}\n\
         \n\
         [{name}]\n\
         location = {location}\n\
         sync-type = git\n\
         sync-uri = {uri}\n\
         auto-sync = yes\n\
         sync-depth = 1\n\
         sync-git-verify-commit-signature = yes\n\
         sync-openpgp-key-path = {key}\n",
        name = repo.name,
        location = repo.location.display(),
        uri = repo.sync_uri,
        key = repo.openpgp_key_path.display(),
    )
}

/// A repository directory that exists but is not a git checkout.
pub fn is_stale_tree(location: &Path) -> bool {
    location.is_dir() && !location.join(".git").exists()
}

fn register(exec: &dyn Executor, config: &OobeConfig, report: &mut BootstrapReport) -> bool {
    let repo = &config.repository;
    let conf = config.paths.repos_conf_dir.join(format!("{}.conf", repo.name));
    let follow_up = format!("write {} by hand and run emaint sync --repo {}", conf.display(), repo.name);

    let mut edits = Vec::new();
    if conf.exists() {
        debug!(path = %conf.display(), "replacing existing registration");
        edits.push(FileEdit::Remove { path: conf.clone() });
    }
    if is_stale_tree(&repo.location) {
        info!(path = %repo.location.display(), "removing non-git repository tree");
        edits.push(FileEdit::RemoveTree {
            path: repo.location.clone(),
        });
    }
    edits.push(FileEdit::Write {
        path: conf,
        contents: registration(repo),
    });

    for edit in &edits {
        if let Err(e) = exec.edit(edit) {
            report.warn(Step::Repository, e.to_string(), follow_up);
            return false;
        }
    }
    true
}

/// Keyring, registration, sync and news, each failure recorded and skipped.
pub(super) fn set_up(exec: &dyn Executor, config: &OobeConfig, report: &mut BootstrapReport) {
    let name = &config.repository.name;

    run_step(exec, report, Step::Keyring, &Getuto, "run getuto as root");

    if !register(exec, config, report) {
        return;
    }

    let sync = EmaintSync { repo: name.clone() };
    if !run_step(exec, report, Step::Repository, &sync, &format!("run emaint sync --repo {name}")) {
        return;
    }
    report.repository_synced = true;
    info!(repo = %name, "repository synced");

    for action in [NewsAction::Read, NewsAction::Purge] {
        run_step(
            exec,
            report,
            Step::News,
            &EselectNews { action },
            &format!("run eselect news {action}"),
        );
    }
}
