//! SQLite database for Meshplane state persistence
//!
//! Accounts are stored as whole JSON snapshots; a side table indexes which
//! account each peer belongs to.

use crate::types::Account;
use crate::{Error, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Database wrapper for state persistence
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Expose the underlying connection for subsystems that manage their own
    /// tables within the shared state DB.
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }
}

impl Database {
    /// Open or create database at path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.init_schema()?;

        info!("Opened database at {:?}", path.as_ref());
        Ok(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            -- Account snapshots
            CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                snapshot TEXT NOT NULL,
                serial INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            -- Peer -> account index, rewritten with every snapshot
            CREATE TABLE IF NOT EXISTS peer_accounts (
                peer_id TEXT PRIMARY KEY,
                account_id TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_peer_accounts_account ON peer_accounts(account_id);

            -- Audit trail
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                activity TEXT NOT NULL,
                initiator_id TEXT NOT NULL,
                target_id TEXT NOT NULL,
                account_id TEXT NOT NULL,
                meta TEXT NOT NULL DEFAULT '{}'
            );
            CREATE INDEX IF NOT EXISTS idx_events_account ON events(account_id, timestamp);
            "#,
        )?;

        debug!("Database schema initialized");
        Ok(())
    }

    // ========================================================================
    // Account snapshots
    // ========================================================================

    /// Load an account snapshot
    pub fn load_account(&self, id: &str) -> Result<Option<Account>> {
        let conn = self.conn.lock();

        let snapshot: Option<String> = conn
            .query_row(
                "SELECT snapshot FROM accounts WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        match snapshot {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Replace an account snapshot and its peer index in one transaction
    pub fn store_account(&self, account: &Account) -> Result<()> {
        let snapshot = serde_json::to_string(account)?;
        let now = chrono::Utc::now().timestamp();

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO accounts (id, snapshot, serial, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                snapshot = excluded.snapshot,
                serial = excluded.serial,
                updated_at = excluded.updated_at",
            params![account.id, snapshot, account.serial as i64, account.created_at, now],
        )?;

        tx.execute(
            "DELETE FROM peer_accounts WHERE account_id = ?1",
            params![account.id],
        )?;
        {
            let mut stmt =
                tx.prepare("INSERT OR REPLACE INTO peer_accounts (peer_id, account_id) VALUES (?1, ?2)")?;
            for peer_id in account.peers.keys() {
                stmt.execute(params![peer_id, account.id])?;
            }
        }

        tx.commit()?;

        debug!("Stored account {} at serial {}", account.id, account.serial);
        Ok(())
    }

    /// Account owning a peer
    pub fn peer_account_id(&self, peer_id: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let id = conn
            .query_row(
                "SELECT account_id FROM peer_accounts WHERE peer_id = ?1",
                params![peer_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Whether an account exists
    pub fn account_exists(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM accounts WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

/// Map a missing row to a `NotFound` error
pub(crate) fn required<T>(value: Option<T>, kind: &str, id: &str) -> Result<T> {
    value.ok_or_else(|| Error::not_found(kind, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Peer;

    #[test]
    fn test_account_snapshot() {
        let db = Database::open_memory().unwrap();
        assert!(db.load_account("acc").unwrap().is_none());

        let mut account = Account::new("acc", "admin", "example.com");
        account.peers.insert(
            "p1".to_string(),
            Peer {
                id: "p1".to_string(),
                key: "key".to_string(),
                ip: "100.64.0.1".parse().unwrap(),
                name: "p1".to_string(),
            },
        );
        db.store_account(&account).unwrap();

        let loaded = db.load_account("acc").unwrap().unwrap();
        assert_eq!(loaded, account);
        assert_eq!(db.peer_account_id("p1").unwrap().as_deref(), Some("acc"));
        assert!(db.account_exists("acc").unwrap());
    }

    #[test]
    fn test_peer_index_follows_snapshot() {
        let db = Database::open_memory().unwrap();
        let mut account = Account::new("acc", "admin", "example.com");
        account.peers.insert(
            "p1".to_string(),
            Peer {
                id: "p1".to_string(),
                key: "key".to_string(),
                ip: "100.64.0.1".parse().unwrap(),
                name: "p1".to_string(),
            },
        );
        db.store_account(&account).unwrap();

        account.peers.clear();
        account.inc_serial();
        db.store_account(&account).unwrap();

        assert!(db.peer_account_id("p1").unwrap().is_none());
        assert_eq!(db.load_account("acc").unwrap().unwrap().serial, 1);
    }
}
