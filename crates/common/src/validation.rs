//! Checks a route must pass against the current account before it is stored

use crate::route::{EgressTarget, Route};
use crate::types::Account;
use crate::{Error, Result};
use ipnetwork::IpNetwork;

/// Peer IDs through which `route` leaves the mesh
pub fn egress_peers<'a>(account: &'a Account, route: &'a Route) -> Vec<&'a str> {
    match &route.egress {
        EgressTarget::None => Vec::new(),
        EgressTarget::Peer(id) => vec![id.as_str()],
        EgressTarget::Group(id) => account
            .get_group(id)
            .map(|g| g.peers.iter().map(String::as_str).collect())
            .unwrap_or_default(),
    }
}

/// Reject `prefix` if `peer_id` already routes it, directly or as a peers group member.
///
/// `exclude_route` names a route to ignore, normally the one being modified.
pub fn check_prefix_peer_conflict(
    account: &Account,
    peer_id: &str,
    prefix: &IpNetwork,
    exclude_route: Option<&str>,
) -> Result<()> {
    if peer_id.is_empty() {
        return Ok(());
    }

    let taken = account
        .routes_by_prefix(prefix)
        .filter(|r| Some(r.id.as_str()) != exclude_route)
        .any(|r| egress_peers(account, r).contains(&peer_id));

    if taken {
        return Err(Error::AlreadyExists(format!(
            "failed to add route with prefix {} - peer {} already has this route",
            prefix, peer_id
        )));
    }
    Ok(())
}

/// Reject `prefix` if any member of the peers group already routes it.
///
/// An unknown group is treated as empty.
pub fn check_prefix_peers_group_conflict(
    account: &Account,
    peers_group_id: &str,
    prefix: &IpNetwork,
    exclude_route: Option<&str>,
) -> Result<()> {
    if peers_group_id.is_empty() {
        return Ok(());
    }
    let Some(group) = account.get_group(peers_group_id) else {
        return Ok(());
    };

    for peer_id in &group.peers {
        check_prefix_peer_conflict(account, peer_id, prefix, exclude_route)?;
    }
    Ok(())
}

/// Distribution groups must be non-empty and reference existing groups only
pub fn validate_groups(group_ids: &[String], account: &Account) -> Result<()> {
    if group_ids.is_empty() {
        return Err(Error::invalid_argument("groups list can't be empty"));
    }

    for id in group_ids {
        if id.is_empty() {
            return Err(Error::invalid_argument("group ID should not be empty string"));
        }
        if account.get_group(id).is_none() {
            return Err(Error::invalid_argument(format!("group id {} not found", id)));
        }
    }
    Ok(())
}

/// The peer or peers group a route egresses through must exist
pub fn validate_egress(egress: &EgressTarget, account: &Account) -> Result<()> {
    match egress {
        EgressTarget::None => Ok(()),
        EgressTarget::Peer(id) => match account.get_peer(id) {
            Some(_) => Ok(()),
            None => Err(Error::invalid_argument(format!("peer with ID {} not found", id))),
        },
        EgressTarget::Group(id) => match account.get_group(id) {
            Some(_) => Ok(()),
            None => Err(Error::invalid_argument(format!(
                "peers group with ID {} not found",
                id
            ))),
        },
    }
}

/// Prefix conflict checks for whichever egress the route uses
pub fn check_egress_conflicts(
    account: &Account,
    egress: &EgressTarget,
    prefix: &IpNetwork,
    exclude_route: Option<&str>,
) -> Result<()> {
    match egress {
        EgressTarget::None => Ok(()),
        EgressTarget::Peer(id) => check_prefix_peer_conflict(account, id, prefix, exclude_route),
        EgressTarget::Group(id) => {
            check_prefix_peers_group_conflict(account, id, prefix, exclude_route)
        }
    }
}
