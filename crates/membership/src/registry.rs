//! Lock-protected map of known peers

use std::collections::HashMap;
use std::net::SocketAddr;

use parking_lot::Mutex;

use crate::peer::Peer;

/// Peers keyed by replication address
///
/// The first peer seen for an address is kept until it is removed.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: Mutex<HashMap<SocketAddr, Peer>>,
}

impl PeerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the peer unless its address is already known
    ///
    /// Returns true when the peer was inserted.
    pub fn upsert_if_absent(&self, peer: Peer) -> bool {
        let mut peers = self.peers.lock();
        if peers.contains_key(&peer.replication_addr) {
            return false;
        }
        peers.insert(peer.replication_addr, peer);
        true
    }

    /// Remove the peer registered under `replication_addr`
    pub fn remove(&self, replication_addr: &SocketAddr) -> Option<Peer> {
        self.peers.lock().remove(replication_addr)
    }

    /// Copy of the peer registered under `replication_addr`
    pub fn get(&self, replication_addr: &SocketAddr) -> Option<Peer> {
        self.peers.lock().get(replication_addr).cloned()
    }

    /// Copy of all peers, ordered by replication address
    pub fn snapshot(&self) -> Vec<Peer> {
        let mut peers: Vec<Peer> = self.peers.lock().values().cloned().collect();
        peers.sort_by_key(|peer| peer.replication_addr);
        peers
    }

    /// Number of known peers
    pub fn len(&self) -> usize {
        self.peers.lock().len()
    }

    /// Whether no peers are known
    pub fn is_empty(&self) -> bool {
        self.peers.lock().is_empty()
    }

    /// Forget every peer
    pub fn clear(&self) {
        self.peers.lock().clear();
    }
}
