//! Push channels to connected peers
//!
//! Every connected peer owns a bounded channel. Updates are offered without
//! blocking; a peer that stops draining its channel is reported rather than
//! allowed to stall the account.

use crate::network_map::compute_network_map;
use dashmap::DashMap;
use meshplane_common::proto::SyncResponse;
use meshplane_common::{Account, Error, Result};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Outbound update channels, keyed by peer ID
pub struct PeersUpdateManager {
    channels: DashMap<String, mpsc::Sender<SyncResponse>>,
    buffer: usize,
}

impl PeersUpdateManager {
    /// `buffer` is the number of undelivered updates a peer may have pending
    pub fn new(buffer: usize) -> Self {
        Self {
            channels: DashMap::new(),
            buffer: buffer.max(1),
        }
    }

    /// Open a channel for a peer, replacing any previous one
    pub fn create_channel(&self, peer_id: &str) -> mpsc::Receiver<SyncResponse> {
        let (tx, rx) = mpsc::channel(self.buffer);
        if self.channels.insert(peer_id.to_string(), tx).is_some() {
            debug!("Replaced update channel for peer {}", peer_id);
        } else {
            debug!("Opened update channel for peer {}", peer_id);
        }
        rx
    }

    pub fn close_channel(&self, peer_id: &str) {
        if self.channels.remove(peer_id).is_some() {
            debug!("Closed update channel for peer {}", peer_id);
        }
    }

    pub fn has_channel(&self, peer_id: &str) -> bool {
        self.channels.contains_key(peer_id)
    }

    /// IDs of peers with an open channel, sorted
    pub fn connected_peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.channels.iter().map(|e| e.key().clone()).collect();
        peers.sort();
        peers
    }

    /// Offer an update to a peer.
    ///
    /// A peer without a channel is not connected and is skipped. A channel whose
    /// receiver is gone is dropped. A full channel is an error.
    pub fn send_update(&self, peer_id: &str, update: SyncResponse) -> Result<()> {
        let Some(tx) = self.channels.get(peer_id).map(|tx| tx.clone()) else {
            return Ok(());
        };

        match tx.try_send(update) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!("Update channel for peer {} is full, dropping update", peer_id);
                Err(Error::Internal(format!(
                    "update channel for peer {} is full",
                    peer_id
                )))
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Peer {} disconnected, removing its channel", peer_id);
                self.channels.remove(peer_id);
                Ok(())
            }
        }
    }

    /// Push a freshly computed network map to every connected peer of the account
    pub fn update_account_peers(&self, account: &Account) -> Result<()> {
        let mut failed = Vec::new();

        for peer_id in account.peers.keys() {
            if !self.has_channel(peer_id) {
                continue;
            }

            let update = compute_network_map(account, peer_id).map(|map| SyncResponse {
                network_map: Some(map.to_protocol()),
            });
            let sent = update.and_then(|update| self.send_update(peer_id, update));
            if let Err(e) = sent {
                warn!("Failed to update peer {}: {}", peer_id, e);
                failed.push(peer_id.as_str());
            }
        }

        if failed.is_empty() {
            return Ok(());
        }
        failed.sort_unstable();
        Err(Error::Internal(format!(
            "failed to update peers: {}",
            failed.join(", ")
        )))
    }
}

impl Default for PeersUpdateManager {
    fn default() -> Self {
        Self::new(100)
    }
}
