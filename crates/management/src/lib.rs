//! Meshplane management
//!
//! Owns account state: routes, groups, policies and peers. Every committed
//! change is pushed to connected peers as a recomputed network map.

pub mod config;
pub mod manager;
pub mod network_map;
pub mod updates;

pub use config::ManagementConfig;
pub use manager::{AccountManager, RouteUpdateKind, RouteUpdateOperation};
pub use network_map::{compute_network_map, NetworkMap};
pub use updates::PeersUpdateManager;
