//! Typed external commands.
//!
//! This module contains structs that implement `SystemCommand` for each tool
//! the OOBE procedure shells out to. Each struct maps Rust fields to the exact
//! flags the corresponding tool expects.

pub mod accounts;
pub mod portage;
pub mod system;

pub use accounts::{ChpasswdEncrypted, GetentGroup, GetentPasswd, OpensslPasswd, Pwqcheck, UserAdd, UserDel};
pub use portage::{EmaintSync, EselectNews, Getuto, NewsAction};
pub use system::{LocaleGen, MachineIdSetup, SystemctlMask};
