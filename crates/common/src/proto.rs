//! Messages pushed to peers
//!
//! Field numbers are part of the wire contract; append, never renumber.

use crate::route::Route as RouteModel;
use crate::types::Peer;

/// Route as seen by a remote peer
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Route {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub network: ::prost::alloc::string::String,
    #[prost(int64, tag = "3")]
    pub network_type: i64,
    /// Egress peer public key, empty for advertise-only routes
    #[prost(string, tag = "4")]
    pub peer: ::prost::alloc::string::String,
    #[prost(int64, tag = "5")]
    pub metric: i64,
    #[prost(bool, tag = "6")]
    pub masquerade: bool,
    #[prost(string, tag = "7")]
    pub net_id: ::prost::alloc::string::String,
}

/// Remote peer a peer may connect to
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RemotePeerConfig {
    #[prost(string, tag = "1")]
    pub wg_pub_key: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "2")]
    pub allowed_ips: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

/// Peer-specific view of the account
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NetworkMap {
    #[prost(uint64, tag = "1")]
    pub serial: u64,
    #[prost(message, repeated, tag = "2")]
    pub remote_peers: ::prost::alloc::vec::Vec<RemotePeerConfig>,
    #[prost(message, repeated, tag = "3")]
    pub routes: ::prost::alloc::vec::Vec<Route>,
}

/// Update pushed over a peer's sync stream
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SyncResponse {
    #[prost(message, optional, tag = "1")]
    pub network_map: ::core::option::Option<NetworkMap>,
}

impl From<&RouteModel> for Route {
    fn from(route: &RouteModel) -> Self {
        Self {
            id: route.id.clone(),
            network: route.network.to_string(),
            network_type: route.network_type().code(),
            peer: route.peer().to_string(),
            metric: route.metric,
            masquerade: route.masquerade,
            net_id: route.net_id.clone(),
        }
    }
}

impl From<&Peer> for RemotePeerConfig {
    fn from(peer: &Peer) -> Self {
        let prefix = if peer.ip.is_ipv6() { 128 } else { 32 };
        Self {
            wg_pub_key: peer.key.clone(),
            allowed_ips: vec![format!("{}/{}", peer.ip, prefix)],
        }
    }
}

/// Convert routes to their wire form
pub fn to_protocol_routes<'a>(routes: impl IntoIterator<Item = &'a RouteModel>) -> Vec<Route> {
    routes.into_iter().map(Route::from).collect()
}
