//! Account manager
//!
//! Every operation follows the same protocol: take the account lock, load the
//! account, validate, mutate, bump the serial, persist, push fresh network maps
//! to connected peers, then record an audit event.

mod group;
mod policy;
mod route;

pub use route::{RouteUpdateKind, RouteUpdateOperation};

use crate::config::ManagementConfig;
use crate::network_map::{compute_network_map, NetworkMap};
use crate::updates::PeersUpdateManager;
use ipnetwork::Ipv4Network;
use meshplane_common::crypto::validate_public_key;
use meshplane_common::{
    new_id, Account, AccountLocks, Activity, Database, Error, Event, EventStore, Peer, Result,
    SqliteEventStore, Store, User, UserRole,
};
use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Address range peers are allocated from
const PEER_NETWORK: Ipv4Addr = Ipv4Addr::new(100, 64, 0, 0);
const PEER_NETWORK_PREFIX: u8 = 10;

/// Entry point for every account mutation and query
#[derive(Clone)]
pub struct AccountManager {
    store: Arc<dyn Store>,
    events: Arc<dyn EventStore>,
    peers_update: Arc<PeersUpdateManager>,
    locks: AccountLocks,
    events_enabled: bool,
}

impl AccountManager {
    pub fn new(
        store: Arc<dyn Store>,
        events: Arc<dyn EventStore>,
        peers_update: Arc<PeersUpdateManager>,
    ) -> Self {
        Self {
            store,
            events,
            peers_update,
            locks: AccountLocks::new(),
            events_enabled: true,
        }
    }

    /// Manager backed by the SQLite database under the configured store path
    pub fn from_config(config: &ManagementConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.store_path)?;
        let db = Database::open(config.db_path())?;

        let manager = Self::new(
            Arc::new(db.clone()),
            Arc::new(SqliteEventStore::new(db)),
            Arc::new(PeersUpdateManager::new(config.peer_update_buffer)),
        );
        Ok(manager.with_events_enabled(config.events.enabled))
    }

    pub fn with_events_enabled(mut self, enabled: bool) -> Self {
        self.events_enabled = enabled;
        self
    }

    pub fn peers_update_manager(&self) -> &Arc<PeersUpdateManager> {
        &self.peers_update
    }

    // ========================================================================
    // Commit helpers
    // ========================================================================

    /// Bump the serial and persist the account
    fn persist(&self, account: &mut Account) -> Result<()> {
        account.inc_serial();
        self.store.save_account(account)?;
        debug!("Account {} saved at serial {}", account.id, account.serial);
        Ok(())
    }

    /// Push network maps after a committed change to `kind` `id`
    fn push(&self, account: &Account, kind: &str, id: &str) -> Result<()> {
        self.peers_update
            .update_account_peers(account)
            .map_err(|e| Error::PeersNotUpdated {
                kind: kind.to_string(),
                id: id.to_string(),
                reason: e.to_string(),
            })
    }

    /// Record an audit event; failures are logged, never returned
    fn store_event(
        &self,
        initiator_id: &str,
        target_id: &str,
        account_id: &str,
        activity: Activity,
        meta: HashMap<String, serde_json::Value>,
    ) {
        if !self.events_enabled {
            return;
        }

        let event = Event::new(activity, initiator_id, target_id, account_id, meta);
        match self.events.save(event) {
            Ok(event) => debug!("Stored event {} ({})", event.id, activity),
            Err(e) => error!(
                "Failed to store {} event for {} in account {}: {}",
                activity, target_id, account_id, e
            ),
        }
    }

    // ========================================================================
    // Account operations
    // ========================================================================

    /// Create an account with its `All` group, default policy and admin user
    pub fn create_account(&self, account_id: &str, admin_user_id: &str, domain: &str) -> Result<Account> {
        if account_id.is_empty() || admin_user_id.is_empty() {
            return Err(Error::invalid_argument("account ID and user ID must not be empty"));
        }

        let _lock = self.locks.acquire(account_id);
        if self.store.account_exists(account_id)? {
            return Err(Error::AlreadyExists(format!(
                "account {} already exists",
                account_id
            )));
        }

        let mut account = Account::new(account_id, admin_user_id, domain);
        self.persist(&mut account)?;
        info!("Created account {}", account_id);

        self.store_event(
            admin_user_id,
            account_id,
            account_id,
            Activity::AccountCreated,
            HashMap::new(),
        );
        Ok(account)
    }

    /// Register a peer by its WireGuard public key and add it to the `All` group
    pub fn add_peer(&self, account_id: &str, user_id: &str, key: &str, name: &str) -> Result<Peer> {
        validate_public_key(key)?;

        let _lock = self.locks.acquire(account_id);
        let mut account = self.store.get_account(account_id)?;
        account.find_user(user_id)?;

        if account.peers.values().any(|p| p.key == key) {
            return Err(Error::AlreadyExists(format!(
                "peer with key {} already registered",
                key
            )));
        }

        let peer = Peer {
            id: new_id(),
            key: key.to_string(),
            ip: allocate_peer_ip(&account)?,
            name: name.to_string(),
        };
        let all_id = account.get_group_all()?.id.clone();
        if let Some(all) = account.groups.get_mut(&all_id) {
            all.peers.push(peer.id.clone());
        }
        account.peers.insert(peer.id.clone(), peer.clone());

        self.persist(&mut account)?;
        info!("Added peer {} ({}) to account {}", peer.id, peer.ip, account_id);

        let pushed = self.push(&account, "peer", &peer.id);
        self.store_event(
            user_id,
            &peer.id,
            account_id,
            Activity::PeerAddedByUser,
            HashMap::from([
                ("name".to_string(), peer.name.clone().into()),
                ("ip".to_string(), peer.ip.to_string().into()),
            ]),
        );
        pushed?;
        Ok(peer)
    }

    /// Add a user to the account; only administrators may do so
    pub fn add_user(&self, account_id: &str, admin_user_id: &str, user_id: &str, role: UserRole) -> Result<User> {
        if user_id.is_empty() {
            return Err(Error::invalid_argument("user ID must not be empty"));
        }

        let _lock = self.locks.acquire(account_id);
        let mut account = self.store.get_account(account_id)?;
        if !account.find_user(admin_user_id)?.is_admin() {
            return Err(Error::PermissionDenied(
                "only administrators can add users".to_string(),
            ));
        }
        if account.users.contains_key(user_id) {
            return Err(Error::AlreadyExists(format!("user {} already exists", user_id)));
        }

        let user = User {
            id: user_id.to_string(),
            role,
        };
        account.users.insert(user.id.clone(), user.clone());
        self.persist(&mut account)?;
        info!("Added user {} to account {}", user_id, account_id);

        self.store_event(
            admin_user_id,
            user_id,
            account_id,
            Activity::UserCreated,
            HashMap::from([("role".to_string(), role.to_string().into())]),
        );
        Ok(user)
    }

    /// Peers of the account, ordered by IP
    pub fn list_peers(&self, account_id: &str, user_id: &str) -> Result<Vec<Peer>> {
        let _lock = self.locks.acquire(account_id);
        let account = self.store.get_account(account_id)?;
        account.find_user(user_id)?;

        let mut peers: Vec<Peer> = account.peers.into_values().collect();
        peers.sort_by(|a, b| a.ip.cmp(&b.ip));
        Ok(peers)
    }

    /// Audit trail of the account, oldest first
    pub fn list_events(&self, account_id: &str, user_id: &str, offset: usize, limit: usize) -> Result<Vec<Event>> {
        {
            let _lock = self.locks.acquire(account_id);
            self.store.get_account(account_id)?.require_admin(user_id, "Events")?;
        }
        self.events.get(account_id, offset, limit)
    }

    /// Current network map of a peer
    pub fn get_network_map(&self, peer_id: &str) -> Result<NetworkMap> {
        let account_id = self.store.get_account_id_by_peer(peer_id)?;

        let _lock = self.locks.acquire(&account_id);
        let account = self.store.get_account(&account_id)?;
        compute_network_map(&account, peer_id)
    }
}

/// First free address of the peer network
fn allocate_peer_ip(account: &Account) -> Result<IpAddr> {
    let network = Ipv4Network::new(PEER_NETWORK, PEER_NETWORK_PREFIX)
        .map_err(|e| Error::Internal(e.to_string()))?;
    let taken: HashSet<IpAddr> = account.peers.values().map(|p| p.ip).collect();

    network
        .iter()
        .skip(1)
        .map(IpAddr::V4)
        .find(|ip| !taken.contains(ip))
        .ok_or_else(|| Error::Internal(format!("no free address left in {}", network)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use meshplane_common::{InMemoryEventStore, WgKeyPair};

    pub(crate) struct Fixture {
        pub manager: AccountManager,
        pub events: InMemoryEventStore,
    }

    pub(crate) const ACCOUNT: &str = "acc";
    pub(crate) const ADMIN: &str = "admin";

    pub(crate) fn fixture() -> Fixture {
        let events = InMemoryEventStore::new();
        let manager = AccountManager::new(
            Arc::new(Database::open_memory().unwrap()),
            Arc::new(events.clone()),
            Arc::new(PeersUpdateManager::new(8)),
        );
        manager.create_account(ACCOUNT, ADMIN, "example.com").unwrap();
        Fixture { manager, events }
    }

    pub(crate) fn add_peer(manager: &AccountManager, name: &str) -> Peer {
        let key = WgKeyPair::generate().public_key_base64();
        manager.add_peer(ACCOUNT, ADMIN, &key, name).unwrap()
    }

    pub(crate) fn serial(manager: &AccountManager) -> u64 {
        manager.store.get_account(ACCOUNT).unwrap().serial
    }

    #[test]
    fn test_create_account() {
        let f = fixture();
        let err = f.manager.create_account(ACCOUNT, ADMIN, "").unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));

        let events = f.events.all();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].activity, Activity::AccountCreated);
    }

    #[test]
    fn test_add_peer_allocates_ips() {
        let f = fixture();
        let p1 = add_peer(&f.manager, "p1");
        let p2 = add_peer(&f.manager, "p2");
        assert_eq!(p1.ip.to_string(), "100.64.0.1");
        assert_eq!(p2.ip.to_string(), "100.64.0.2");

        let peers = f.manager.list_peers(ACCOUNT, ADMIN).unwrap();
        assert_eq!(peers.len(), 2);

        // same key twice
        let err = f.manager.add_peer(ACCOUNT, ADMIN, &p1.key, "again").unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        // malformed key
        let err = f.manager.add_peer(ACCOUNT, ADMIN, "nope", "bad").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_add_user_requires_admin() {
        let f = fixture();
        f.manager.add_user(ACCOUNT, ADMIN, "bob", UserRole::User).unwrap();

        let err = f.manager.add_user(ACCOUNT, "bob", "eve", UserRole::Admin).unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));
        let err = f.manager.add_user(ACCOUNT, ADMIN, "bob", UserRole::User).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        let err = f.manager.add_user(ACCOUNT, "ghost", "eve", UserRole::User).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_events_disabled() {
        let events = InMemoryEventStore::new();
        let manager = AccountManager::new(
            Arc::new(Database::open_memory().unwrap()),
            Arc::new(events.clone()),
            Arc::new(PeersUpdateManager::default()),
        )
        .with_events_enabled(false);
        manager.create_account(ACCOUNT, ADMIN, "").unwrap();
        assert!(events.all().is_empty());
    }

    #[test]
    fn test_list_events_requires_admin() {
        let f = fixture();
        f.manager.add_user(ACCOUNT, ADMIN, "bob", UserRole::User).unwrap();

        let events = f.manager.list_events(ACCOUNT, ADMIN, 0, 10).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            f.manager.list_events(ACCOUNT, "bob", 0, 10),
            Err(Error::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_network_map_for_unknown_peer() {
        let f = fixture();
        assert!(matches!(
            f.manager.get_network_map("ghost"),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_push_failure_still_committed() {
        let events = InMemoryEventStore::new();
        let manager = AccountManager::new(
            Arc::new(Database::open_memory().unwrap()),
            Arc::new(events.clone()),
            Arc::new(PeersUpdateManager::new(1)),
        );
        manager.create_account(ACCOUNT, ADMIN, "").unwrap();
        let p1 = add_peer(&manager, "p1");
        let _rx = manager.peers_update_manager().create_channel(&p1.id);

        // first push fills the single slot, second cannot be delivered
        add_peer(&manager, "p2");
        let key = WgKeyPair::generate().public_key_base64();
        let err = manager.add_peer(ACCOUNT, ADMIN, &key, "p3").unwrap_err();
        match err {
            Error::PeersNotUpdated { kind, .. } => assert_eq!(kind, "peer"),
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(manager.list_peers(ACCOUNT, ADMIN).unwrap().len(), 3);
        assert_eq!(events.all().last().unwrap().activity, Activity::PeerAddedByUser);
    }
}
