//! Account persistence interface

use crate::db::{required, Database};
use crate::types::Account;
use crate::Result;

/// Loads and saves whole account snapshots.
///
/// Saving replaces the previous snapshot atomically. Callers serialize access
/// per account through [`crate::lock::AccountLocks`].
pub trait Store: Send + Sync {
    /// Load an account, `NotFound` if it does not exist
    fn get_account(&self, account_id: &str) -> Result<Account>;

    /// Persist an account snapshot
    fn save_account(&self, account: &Account) -> Result<()>;

    /// ID of the account a peer belongs to, `NotFound` for unknown peers
    fn get_account_id_by_peer(&self, peer_id: &str) -> Result<String>;

    fn account_exists(&self, account_id: &str) -> Result<bool>;
}

impl Store for Database {
    fn get_account(&self, account_id: &str) -> Result<Account> {
        required(self.load_account(account_id)?, "account", account_id)
    }

    fn save_account(&self, account: &Account) -> Result<()> {
        self.store_account(account)
    }

    fn get_account_id_by_peer(&self, peer_id: &str) -> Result<String> {
        required(self.peer_account_id(peer_id)?, "peer", peer_id)
    }

    fn account_exists(&self, account_id: &str) -> Result<bool> {
        Database::account_exists(self, account_id)
    }
}
