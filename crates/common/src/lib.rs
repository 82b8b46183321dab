//! Meshplane Common Library
//!
//! Data model, persistence and validation shared by the Meshplane control plane.

pub mod activity;
pub mod crypto;
pub mod db;
pub mod error;
pub mod lock;
pub mod proto;
pub mod route;
pub mod store;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use activity::{Activity, Event, EventStore, InMemoryEventStore, SqliteEventStore};
pub use crypto::WgKeyPair;
pub use db::Database;
pub use error::{Error, ErrorKind, Result};
pub use lock::{AccountLockGuard, AccountLocks};
pub use route::{EgressTarget, NetworkType, Route};
pub use store::Store;
pub use types::*;

/// Meshplane version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default store path
pub fn default_store_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".meshplane")
}

/// Default configuration file path
pub fn default_config_path() -> std::path::PathBuf {
    default_store_path().join("config.toml")
}
