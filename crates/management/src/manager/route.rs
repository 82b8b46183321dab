//! Route operations

use super::AccountManager;
use meshplane_common::route::{parse_network, validate_metric, validate_net_id, MAX_METRIC, MIN_METRIC};
use meshplane_common::validation::{check_egress_conflicts, check_prefix_peer_conflict, validate_egress, validate_groups};
use meshplane_common::{new_id, Account, Activity, EgressTarget, Error, Result, Route};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Field of a route touched by an update operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteUpdateKind {
    Description,
    Network,
    Peer,
    Metric,
    Masquerade,
    Enabled,
    NetworkIdentifier,
    Groups,
}

impl std::fmt::Display for RouteUpdateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RouteUpdateKind::Description => "UpdateRouteDescription",
            RouteUpdateKind::Network => "UpdateRouteNetwork",
            RouteUpdateKind::Peer => "UpdateRoutePeer",
            RouteUpdateKind::Metric => "UpdateRouteMetric",
            RouteUpdateKind::Masquerade => "UpdateRouteMasquerade",
            RouteUpdateKind::Enabled => "UpdateRouteEnabled",
            RouteUpdateKind::NetworkIdentifier => "UpdateRouteNetworkIdentifier",
            RouteUpdateKind::Groups => "UpdateRouteGroups",
        };
        write!(f, "{}", name)
    }
}

/// Single change applied by [`AccountManager::update_route`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteUpdateOperation {
    pub kind: RouteUpdateKind,
    /// Must hold exactly one value
    pub values: Vec<String>,
}

impl RouteUpdateOperation {
    pub fn new(kind: RouteUpdateKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            values: vec![value.into()],
        }
    }
}

impl AccountManager {
    /// Create a route and distribute it to the peers of its groups
    #[allow(clippy::too_many_arguments)]
    pub fn create_route(
        &self,
        account_id: &str,
        network: &str,
        peer_id: &str,
        peers_group_id: &str,
        description: &str,
        net_id: &str,
        masquerade: bool,
        metric: i64,
        groups: &[String],
        enabled: bool,
        user_id: &str,
    ) -> Result<Route> {
        let _lock = self.locks.acquire(account_id);
        let mut account = self.store.get_account(account_id)?;

        let egress = EgressTarget::from_fields(peer_id, peers_group_id)?;
        validate_egress(&egress, &account)?;

        let (_, prefix) = parse_network(network)?;
        check_egress_conflicts(&account, &egress, &prefix, None)?;
        validate_metric(metric)?;
        validate_net_id(net_id)?;
        validate_groups(groups, &account)?;

        let route = Route {
            id: new_id(),
            network: prefix,
            net_id: net_id.to_string(),
            egress,
            description: description.to_string(),
            metric,
            masquerade,
            enabled,
            groups: groups.to_vec(),
        };
        account.routes.insert(route.id.clone(), route.clone());

        self.persist(&mut account)?;
        info!("Created route {} ({}) in account {}", route.id, route.network, account_id);

        let pushed = self.push(&account, "route", &route.id);
        self.store_event(user_id, &route.id, account_id, Activity::RouteCreated, route.event_meta());
        pushed?;
        Ok(route)
    }

    /// Replace an existing route with `route`, validating it as a whole
    pub fn save_route(&self, account_id: &str, user_id: &str, route: Option<Route>) -> Result<Route> {
        let mut route = route.ok_or_else(|| Error::invalid_argument("route provided is nil"))?;

        let _lock = self.locks.acquire(account_id);
        let mut account = self.store.get_account(account_id)?;
        if !account.routes.contains_key(&route.id) {
            return Err(Error::not_found("route", &route.id));
        }

        let (_, prefix) = parse_network(&route.network.to_string())?;
        route.network = prefix;
        validate_metric(route.metric)?;
        validate_net_id(&route.net_id)?;
        validate_egress(&route.egress, &account)?;
        check_egress_conflicts(&account, &route.egress, &route.network, Some(&route.id))?;
        validate_groups(&route.groups, &account)?;

        account.routes.insert(route.id.clone(), route.clone());

        self.persist(&mut account)?;
        info!("Saved route {} in account {}", route.id, account_id);

        let pushed = self.push(&account, "route", &route.id);
        self.store_event(user_id, &route.id, account_id, Activity::RouteUpdated, route.event_meta());
        pushed?;
        Ok(route)
    }

    /// Apply a batch of field updates atomically: all succeed or nothing changes
    pub fn update_route(
        &self,
        account_id: &str,
        route_id: &str,
        operations: &[RouteUpdateOperation],
        user_id: &str,
    ) -> Result<Route> {
        let _lock = self.locks.acquire(account_id);
        let mut account = self.store.get_account(account_id)?;

        let current = account
            .routes
            .get(route_id)
            .ok_or_else(|| Error::not_found("route", route_id))?;

        let mut updated = current.clone();
        for operation in operations {
            apply_operation(&account, current, &mut updated, operation)?;
        }
        // a batch may move both egress and network; the final pair must be free too
        if updated.egress != current.egress || updated.network != current.network {
            check_egress_conflicts(&account, &updated.egress, &updated.network, Some(route_id))?;
        }
        debug!("Applied {} operations to route {}", operations.len(), route_id);

        account.routes.insert(route_id.to_string(), updated.clone());

        self.persist(&mut account)?;
        info!("Updated route {} in account {}", route_id, account_id);

        let pushed = self.push(&account, "route", route_id);
        self.store_event(user_id, route_id, account_id, Activity::RouteUpdated, updated.event_meta());
        pushed?;
        Ok(updated)
    }

    pub fn delete_route(&self, account_id: &str, route_id: &str, user_id: &str) -> Result<()> {
        let _lock = self.locks.acquire(account_id);
        let mut account = self.store.get_account(account_id)?;

        let route = account
            .routes
            .remove(route_id)
            .ok_or_else(|| Error::not_found("route", route_id))?;

        self.persist(&mut account)?;
        info!("Deleted route {} from account {}", route_id, account_id);

        let pushed = self.push(&account, "route", route_id);
        self.store_event(user_id, route_id, account_id, Activity::RouteRemoved, route.event_meta());
        pushed
    }

    /// Get a route; administrators only
    pub fn get_route(&self, account_id: &str, route_id: &str, user_id: &str) -> Result<Route> {
        let _lock = self.locks.acquire(account_id);
        let account = self.store.get_account(account_id)?;
        account.require_admin(user_id, "Network Routes")?;

        account
            .routes
            .get(route_id)
            .cloned()
            .ok_or_else(|| Error::not_found("route", route_id))
    }

    /// All routes of the account ordered by ID; administrators only
    pub fn list_routes(&self, account_id: &str, user_id: &str) -> Result<Vec<Route>> {
        let _lock = self.locks.acquire(account_id);
        let account = self.store.get_account(account_id)?;
        account.require_admin(user_id, "Network Routes")?;

        let mut routes: Vec<Route> = account.routes.into_values().collect();
        routes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(routes)
    }
}

/// Apply one operation to `updated`.
///
/// Conflict checks look at `current`, the route as stored, so operations in the
/// same batch do not see each other's egress or network changes.
fn apply_operation(
    account: &Account,
    current: &Route,
    updated: &mut Route,
    operation: &RouteUpdateOperation,
) -> Result<()> {
    let [value] = operation.values.as_slice() else {
        return Err(Error::invalid_argument(format!(
            "operation {} contains invalid number of values, it should be 1",
            operation.kind
        )));
    };

    match operation.kind {
        RouteUpdateKind::Description => updated.description = value.clone(),
        RouteUpdateKind::NetworkIdentifier => {
            validate_net_id(value)?;
            updated.net_id = value.clone();
        }
        RouteUpdateKind::Network => {
            let (_, prefix) = parse_network(value)?;
            check_egress_conflicts(account, &current.egress, &prefix, Some(&current.id))?;
            updated.network = prefix;
        }
        RouteUpdateKind::Peer => {
            if value.is_empty() {
                if let EgressTarget::Peer(_) = updated.egress {
                    updated.egress = EgressTarget::None;
                }
                return Ok(());
            }
            if account.get_peer(value).is_none() {
                return Err(Error::invalid_argument(format!("peer with ID {} not found", value)));
            }
            if let EgressTarget::Group(group) = &updated.egress {
                return Err(Error::invalid_argument(format!(
                    "peer with ID {} and peers group {} should not be provided at the same time",
                    value, group
                )));
            }
            check_prefix_peer_conflict(account, value, &current.network, Some(&current.id))?;
            updated.egress = EgressTarget::Peer(value.clone());
        }
        RouteUpdateKind::Metric => {
            let metric: i64 = value.parse().map_err(|_| {
                Error::invalid_argument(format!("failed to parse metric {}, not int", value))
            })?;
            if validate_metric(metric).is_err() {
                return Err(Error::invalid_argument(format!(
                    "failed to parse metric {}, value should be {} > N < {}",
                    value, MIN_METRIC, MAX_METRIC
                )));
            }
            updated.metric = metric;
        }
        RouteUpdateKind::Masquerade => {
            updated.masquerade = parse_bool(value).ok_or_else(|| {
                Error::invalid_argument(format!("failed to parse masquerade {}, not boolean", value))
            })?;
        }
        RouteUpdateKind::Enabled => {
            updated.enabled = parse_bool(value).ok_or_else(|| {
                Error::invalid_argument(format!("failed to parse enabled {}, not boolean", value))
            })?;
        }
        RouteUpdateKind::Groups => {
            validate_groups(&operation.values, account)?;
            updated.groups = operation.values.clone();
        }
    }
    Ok(())
}

/// Boolean spellings accepted for flag updates
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
