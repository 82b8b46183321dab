//! Per-peer view of an account
//!
//! A peer's network map lists the peers it may connect to and the routes it
//! should install. Routes egressing through a peers group are expanded into one
//! replica per group member so the client can fail over between them.

use meshplane_common::proto;
use meshplane_common::{Account, EgressTarget, Error, Peer, Result, Route};
use serde::Serialize;
use tracing::debug;

/// Routes and remote peers delivered to a single peer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkMap {
    /// Account serial the map was computed from
    pub serial: u64,
    /// Peers the target may connect to, ordered by ID
    pub remote_peers: Vec<Peer>,
    /// Routes with their egress resolved to a WireGuard public key, ordered by ID
    pub routes: Vec<Route>,
}

impl NetworkMap {
    /// Wire form of the map
    pub fn to_protocol(&self) -> proto::NetworkMap {
        proto::NetworkMap {
            serial: self.serial,
            remote_peers: self.remote_peers.iter().map(proto::RemotePeerConfig::from).collect(),
            routes: proto::to_protocol_routes(&self.routes),
        }
    }
}

/// Compute the network map of `peer_id` from an account snapshot
pub fn compute_network_map(account: &Account, peer_id: &str) -> Result<NetworkMap> {
    if account.get_peer(peer_id).is_none() {
        return Err(Error::not_found("peer", peer_id));
    }

    let mut remote_peers: Vec<Peer> = account
        .peers
        .values()
        .filter(|p| p.id != peer_id && account.can_reach(peer_id, &p.id))
        .cloned()
        .collect();
    remote_peers.sort_by(|a, b| a.id.cmp(&b.id));

    let mut routes = Vec::new();
    for route in account.routes.values() {
        routes.extend(routes_for_peer(account, route, peer_id));
    }
    routes.sort_by(|a, b| a.id.cmp(&b.id));

    debug!(
        "Network map for peer {}: {} routes, {} remote peers",
        peer_id,
        routes.len(),
        remote_peers.len()
    );

    Ok(NetworkMap {
        serial: account.serial,
        remote_peers,
        routes,
    })
}

/// Entries of `route` that `peer_id` receives, possibly none
fn routes_for_peer(account: &Account, route: &Route, peer_id: &str) -> Vec<Route> {
    if !route.enabled {
        return Vec::new();
    }

    // members of a peers group see the route's other replicas even when they
    // are not in a distribution group
    let ha_member = route
        .egress
        .peers_group()
        .and_then(|id| account.get_group(id))
        .is_some_and(|g| g.contains(peer_id));
    let distributed = ha_member
        || route
            .groups
            .iter()
            .filter_map(|id| account.get_group(id))
            .any(|g| g.contains(peer_id));
    if !distributed {
        return Vec::new();
    }

    match &route.egress {
        EgressTarget::None => vec![route.clone()],
        EgressTarget::Peer(egress) => egress_entry(account, route, egress, peer_id)
            .into_iter()
            .collect(),
        EgressTarget::Group(group_id) => {
            let Some(group) = account.get_group(group_id) else {
                return Vec::new();
            };
            group
                .peers
                .iter()
                .filter(|member| member.as_str() != peer_id)
                .filter_map(|member| {
                    let mut replica = egress_entry(account, route, member, peer_id)?;
                    replica.id = format!("{}:{}", route.id, member);
                    Some(replica)
                })
                .collect()
        }
    }
}

/// Copy of `route` egressing through `egress`, if `peer_id` may use that peer
fn egress_entry(account: &Account, route: &Route, egress: &str, peer_id: &str) -> Option<Route> {
    let egress_peer = account.get_peer(egress)?;
    if egress != peer_id && !account.can_reach(peer_id, egress) {
        return None;
    }

    let mut entry = route.clone();
    entry.egress = EgressTarget::Peer(egress_peer.key.clone());
    Some(entry)
}
