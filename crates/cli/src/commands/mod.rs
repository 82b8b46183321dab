//! CLI Commands

pub mod account;
pub mod events;
pub mod group;
pub mod netmap;
pub mod peer;
pub mod policy;
pub mod route;

use crate::output::OutputFormat;
use meshplane_management::AccountManager;

/// Shared state handed to every command
pub struct Context {
    pub manager: AccountManager,
    pub account: String,
    pub user: String,
    pub format: OutputFormat,
}
