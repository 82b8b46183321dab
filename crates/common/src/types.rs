//! Core types for Meshplane

use crate::route::Route;
use crate::{Error, Result};
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use uuid::Uuid;

/// Name of the group every peer of an account belongs to
pub const GROUP_ALL: &str = "All";
/// Name of the policy created together with an account
pub const DEFAULT_POLICY: &str = "Default";

/// Generate a fresh resource identifier
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Mesh participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Internal identifier, used as foreign key by groups and routes
    pub id: String,
    /// WireGuard public key (base64), the identity other peers see
    pub key: String,
    /// Address inside the mesh
    pub ip: IpAddr,
    pub name: String,
}

/// Named set of peers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub peers: Vec<String>,
}

impl Group {
    pub fn contains(&self, peer_id: &str) -> bool {
        self.peers.iter().any(|p| p == peer_id)
    }
}

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    User,
}

impl Default for UserRole {
    fn default() -> Self {
        Self::User
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::User => write!(f, "user"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            _ => Err(Error::invalid_argument(format!("unknown user role: {}", s))),
        }
    }
}

/// Account user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub role: UserRole,
}

impl User {
    pub fn new_admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: UserRole::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// What a matching rule does with traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    Accept,
    Drop,
}

impl Default for PolicyAction {
    fn default() -> Self {
        Self::Accept
    }
}

/// Single reachability rule between source and destination groups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub action: PolicyAction,
    #[serde(default)]
    pub bidirectional: bool,
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// Access policy: a named set of rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub rules: Vec<PolicyRule>,
}

impl Policy {
    /// Policy letting every member of `group_id` reach every other member
    pub fn allow_all(group_id: &str) -> Self {
        Self {
            id: new_id(),
            name: DEFAULT_POLICY.to_string(),
            description: "This is a default policy that allows connections between all the resources".to_string(),
            enabled: true,
            rules: vec![PolicyRule {
                id: new_id(),
                name: DEFAULT_POLICY.to_string(),
                enabled: true,
                action: PolicyAction::Accept,
                bidirectional: true,
                sources: vec![group_id.to_string()],
                destinations: vec![group_id.to_string()],
            }],
        }
    }

    pub fn event_meta(&self) -> HashMap<String, serde_json::Value> {
        HashMap::from([("name".to_string(), self.name.clone().into())])
    }
}

/// A tenant's complete configuration graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub domain: String,
    pub created_by: String,
    pub created_at: i64,
    /// Configuration version; bumped on every mutation
    pub serial: u64,
    #[serde(default)]
    pub peers: HashMap<String, Peer>,
    #[serde(default)]
    pub groups: HashMap<String, Group>,
    #[serde(default)]
    pub routes: HashMap<String, Route>,
    #[serde(default)]
    pub policies: HashMap<String, Policy>,
    #[serde(default)]
    pub users: HashMap<String, User>,
}

impl Account {
    /// New account with an `All` group, an allow-all policy and `created_by` as admin
    pub fn new(id: impl Into<String>, created_by: impl Into<String>, domain: impl Into<String>) -> Self {
        let created_by = created_by.into();

        let all = Group {
            id: new_id(),
            name: GROUP_ALL.to_string(),
            peers: Vec::new(),
        };
        let policy = Policy::allow_all(&all.id);

        Self {
            id: id.into(),
            domain: domain.into(),
            created_at: chrono::Utc::now().timestamp(),
            serial: 0,
            peers: HashMap::new(),
            groups: HashMap::from([(all.id.clone(), all)]),
            routes: HashMap::new(),
            policies: HashMap::from([(policy.id.clone(), policy)]),
            users: HashMap::from([(created_by.clone(), User::new_admin(created_by.clone()))]),
            created_by,
        }
    }

    pub fn inc_serial(&mut self) {
        self.serial += 1;
    }

    pub fn get_peer(&self, peer_id: &str) -> Option<&Peer> {
        self.peers.get(peer_id)
    }

    pub fn get_group(&self, group_id: &str) -> Option<&Group> {
        self.groups.get(group_id)
    }

    pub fn get_group_all(&self) -> Result<&Group> {
        self.groups
            .values()
            .find(|g| g.name == GROUP_ALL)
            .ok_or_else(|| Error::not_found("group", GROUP_ALL))
    }

    pub fn find_user(&self, user_id: &str) -> Result<&User> {
        self.users
            .get(user_id)
            .ok_or_else(|| Error::not_found("user", user_id))
    }

    /// Fail with `PermissionDenied` unless `user_id` is an administrator of this account
    pub fn require_admin(&self, user_id: &str, what: &str) -> Result<()> {
        if !self.find_user(user_id)?.is_admin() {
            return Err(Error::PermissionDenied(format!(
                "Only administrators can view {}",
                what
            )));
        }
        Ok(())
    }

    /// Routes advertising exactly `prefix`
    pub fn routes_by_prefix(&self, prefix: &IpNetwork) -> impl Iterator<Item = &Route> + '_ {
        let prefix = *prefix;
        self.routes.values().filter(move |r| r.network == prefix)
    }

    /// IDs of every group containing `peer_id`
    pub fn peer_groups(&self, peer_id: &str) -> HashSet<&str> {
        self.groups
            .values()
            .filter(|g| g.contains(peer_id))
            .map(|g| g.id.as_str())
            .collect()
    }

    /// Whether policies allow `source` to open connections to `destination`
    pub fn can_reach(&self, source: &str, destination: &str) -> bool {
        let source_groups = self.peer_groups(source);
        let destination_groups = self.peer_groups(destination);
        let in_any = |groups: &HashSet<&str>, ids: &[String]| ids.iter().any(|id| groups.contains(id.as_str()));

        self.policies
            .values()
            .filter(|p| p.enabled)
            .flat_map(|p| p.rules.iter())
            .filter(|r| r.enabled && r.action == PolicyAction::Accept)
            .any(|rule| {
                let forward = in_any(&source_groups, &rule.sources)
                    && in_any(&destination_groups, &rule.destinations);
                let backward = rule.bidirectional
                    && in_any(&destination_groups, &rule.sources)
                    && in_any(&source_groups, &rule.destinations);
                forward || backward
            })
    }

    /// Group IDs referenced by routes, mapped to the referencing route
    pub fn route_group_links(&self) -> HashMap<&str, &Route> {
        let mut links = HashMap::new();
        for route in self.routes.values() {
            for group in &route.groups {
                links.insert(group.as_str(), route);
            }
            if let Some(group) = route.egress.peers_group() {
                links.insert(group, route);
            }
        }
        links
    }
}
