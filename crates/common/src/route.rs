//! Routed subnet advertisements
//!
//! A route advertises a network prefix through either a single egress peer or a
//! group of interchangeable (high-availability) egress peers. Which peers receive
//! the route is decided by its distribution groups.

use crate::{Error, Result};
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Lowest (most preferred) route metric
pub const MIN_METRIC: i64 = 1;
/// Highest route metric
pub const MAX_METRIC: i64 = 9999;
/// Maximum length of a network identifier, in characters
pub const MAX_NET_ID_CHARS: usize = 40;

/// Address family of a route's network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Invalid,
    IPv4,
    IPv6,
}

impl NetworkType {
    /// Integer code used on the wire
    pub fn code(self) -> i64 {
        match self {
            NetworkType::Invalid => 0,
            NetworkType::IPv4 => 1,
            NetworkType::IPv6 => 2,
        }
    }
}

impl std::fmt::Display for NetworkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkType::Invalid => write!(f, "Invalid"),
            NetworkType::IPv4 => write!(f, "IPv4"),
            NetworkType::IPv6 => write!(f, "IPv6"),
        }
    }
}

/// Parse a CIDR prefix, returning its family and the masked network.
///
/// The prefix length is mandatory: `10.0.0.1` is rejected, `10.0.0.1/24`
/// yields `10.0.0.0/24`.
pub fn parse_network(network: &str) -> Result<(NetworkType, IpNetwork)> {
    let invalid = || Error::invalid_argument(format!("failed to parse IP {}", network));

    if !network.contains('/') {
        return Err(invalid());
    }
    let parsed = IpNetwork::from_str(network.trim()).map_err(|_| invalid())?;
    let masked = IpNetwork::new(parsed.network(), parsed.prefix()).map_err(|_| invalid())?;

    let network_type = if masked.is_ipv6() {
        NetworkType::IPv6
    } else {
        NetworkType::IPv4
    };
    Ok((network_type, masked))
}

/// Check that a metric lies within [`MIN_METRIC`, `MAX_METRIC`]
pub fn validate_metric(metric: i64) -> Result<()> {
    if !(MIN_METRIC..=MAX_METRIC).contains(&metric) {
        return Err(Error::invalid_argument(format!(
            "metric should be between {} and {}",
            MIN_METRIC, MAX_METRIC
        )));
    }
    Ok(())
}

/// Check that a network identifier is non-empty and at most [`MAX_NET_ID_CHARS`] long
pub fn validate_net_id(net_id: &str) -> Result<()> {
    if net_id.is_empty() || net_id.chars().count() > MAX_NET_ID_CHARS {
        return Err(Error::invalid_argument(format!(
            "identifier should be between 1 and {}",
            MAX_NET_ID_CHARS
        )));
    }
    Ok(())
}

/// Where traffic for a route leaves the mesh
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EgressTarget {
    /// Advertised without an egress recommendation
    #[default]
    None,
    /// A single routing peer, by peer ID
    Peer(String),
    /// Any member of a peers group, by group ID
    Group(String),
}

impl EgressTarget {
    /// Build a target from the two optional boundary fields.
    ///
    /// Empty strings mean "unset"; setting both is rejected.
    pub fn from_fields(peer: &str, peers_group: &str) -> Result<Self> {
        match (peer.is_empty(), peers_group.is_empty()) {
            (true, true) => Ok(EgressTarget::None),
            (false, true) => Ok(EgressTarget::Peer(peer.to_string())),
            (true, false) => Ok(EgressTarget::Group(peers_group.to_string())),
            (false, false) => Err(Error::invalid_argument(format!(
                "peer with ID {} and peers group {} should not be provided at the same time",
                peer, peers_group
            ))),
        }
    }

    pub fn peer(&self) -> Option<&str> {
        match self {
            EgressTarget::Peer(id) => Some(id),
            _ => None,
        }
    }

    pub fn peers_group(&self) -> Option<&str> {
        match self {
            EgressTarget::Group(id) => Some(id),
            _ => None,
        }
    }
}

/// Routed subnet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "RouteRecord", try_from = "RouteRecord")]
pub struct Route {
    pub id: String,
    pub network: IpNetwork,
    pub net_id: String,
    pub egress: EgressTarget,
    pub description: String,
    pub metric: i64,
    pub masquerade: bool,
    pub enabled: bool,
    /// Distribution groups
    pub groups: Vec<String>,
}

impl Route {
    pub fn network_type(&self) -> NetworkType {
        if self.network.is_ipv6() {
            NetworkType::IPv6
        } else {
            NetworkType::IPv4
        }
    }

    /// Egress peer ID, or `""` when the route has none
    pub fn peer(&self) -> &str {
        self.egress.peer().unwrap_or_default()
    }

    /// Peers group ID, or `""` when the route has none
    pub fn peers_group(&self) -> &str {
        self.egress.peers_group().unwrap_or_default()
    }

    /// Metadata attached to audit events about this route
    pub fn event_meta(&self) -> HashMap<String, serde_json::Value> {
        HashMap::from([
            ("name".to_string(), self.net_id.clone().into()),
            ("network_range".to_string(), self.network.to_string().into()),
            ("peer_id".to_string(), self.peer().into()),
            ("peers_group".to_string(), self.peers_group().into()),
        ])
    }
}

/// Flat representation of a [`Route`] as it crosses a serialization boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRecord {
    pub id: String,
    pub network: String,
    #[serde(default)]
    pub network_type: i64,
    pub net_id: String,
    #[serde(default)]
    pub peer: String,
    #[serde(default)]
    pub peers_group: String,
    #[serde(default)]
    pub description: String,
    pub metric: i64,
    #[serde(default)]
    pub masquerade: bool,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl From<Route> for RouteRecord {
    fn from(route: Route) -> Self {
        Self {
            network: route.network.to_string(),
            network_type: route.network_type().code(),
            peer: route.peer().to_string(),
            peers_group: route.peers_group().to_string(),
            id: route.id,
            net_id: route.net_id,
            description: route.description,
            metric: route.metric,
            masquerade: route.masquerade,
            enabled: route.enabled,
            groups: route.groups,
        }
    }
}

impl TryFrom<RouteRecord> for Route {
    type Error = Error;

    fn try_from(record: RouteRecord) -> Result<Self> {
        let (_, network) = parse_network(&record.network)?;
        let egress = EgressTarget::from_fields(&record.peer, &record.peers_group)?;
        Ok(Self {
            id: record.id,
            network,
            net_id: record.net_id,
            egress,
            description: record.description,
            metric: record.metric,
            masquerade: record.masquerade,
            enabled: record.enabled,
            groups: record.groups,
        })
    }
}
