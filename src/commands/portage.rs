//! Typed commands for Portage trust, sync and news handling.

use strum::Display;

use crate::command::SystemCommand;

/// `getuto`: sets up the keyring Portage uses to verify binary packages.
#[derive(Debug, Clone, Copy)]
pub struct Getuto;

impl SystemCommand for Getuto {
    fn program(&self) -> &'static str {
        "getuto"
    }

    fn args(&self) -> Vec<String> {
        vec![]
    }

    fn inherit_output(&self) -> bool {
        true
    }
}

/// `emaint sync --repo <name>`.
#[derive(Debug, Clone)]
pub struct EmaintSync {
    pub repo: String,
}

impl SystemCommand for EmaintSync {
    fn program(&self) -> &'static str {
        "emaint"
    }

    fn args(&self) -> Vec<String> {
        vec!["sync".to_string(), "--repo".to_string(), self.repo.clone()]
    }

    fn inherit_output(&self) -> bool {
        true
    }
}

/// News item action for `eselect news`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum NewsAction {
    /// Mark all unread items as read.
    Read,
    /// Remove read items from the news directory.
    Purge,
}

/// `eselect news read all` / `eselect news purge`.
#[derive(Debug, Clone, Copy)]
pub struct EselectNews {
    pub action: NewsAction,
}

impl SystemCommand for EselectNews {
    fn program(&self) -> &'static str {
        "eselect"
    }

    fn args(&self) -> Vec<String> {
        let mut args = vec!["news".to_string(), self.action.to_string()];
        if self.action == NewsAction::Read {
            // "new" would only show unread items; "all" marks everything read
            args.push("all".to_string());
        }
        args
    }
}
