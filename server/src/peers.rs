//! Peer connection bookkeeping for the UDP transport
//!
//! Tracks which remote addresses count as connected peers, enforces the
//! peer capacity, and notices peers that have gone silent. The UDP adapter
//! turns table changes into transport-level connect/disconnect events for
//! the tick engine.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use log::info;

/// Transport-level peer identifier; distinct from object ids
pub type PeerId = u64;

/// Silence after which a peer is considered gone
pub const PEER_TIMEOUT: Duration = Duration::from_secs(5);

/// One connected remote endpoint
#[derive(Debug)]
pub struct Peer {
    pub id: PeerId,
    pub addr: SocketAddr,
    /// Last time any datagram arrived from this address
    pub last_seen: Instant,
}

impl Peer {
    fn new(id: PeerId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
        }
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// All connected peers, capacity-limited
pub struct PeerTable {
    peers: HashMap<PeerId, Peer>,
    next_peer_id: PeerId,
    max_peers: usize,
}

impl PeerTable {
    pub fn new(max_peers: usize) -> Self {
        Self {
            peers: HashMap::new(),
            next_peer_id: 1,
            max_peers,
        }
    }

    /// Registers a new peer, or returns None at capacity.
    pub fn add_peer(&mut self, addr: SocketAddr) -> Option<PeerId> {
        if self.peers.len() >= self.max_peers {
            return None;
        }

        let id = self.next_peer_id;
        self.next_peer_id += 1;
        info!("Peer {id} connected from {addr}");
        self.peers.insert(id, Peer::new(id, addr));
        Some(id)
    }

    pub fn remove_peer(&mut self, id: PeerId) -> bool {
        if self.peers.remove(&id).is_some() {
            info!("Peer {id} disconnected");
            true
        } else {
            false
        }
    }

    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<PeerId> {
        self.peers
            .iter()
            .find(|(_, peer)| peer.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn addr_of(&self, id: PeerId) -> Option<SocketAddr> {
        self.peers.get(&id).map(|peer| peer.addr)
    }

    /// Refreshes a peer's last-seen time
    pub fn touch(&mut self, id: PeerId) {
        if let Some(peer) = self.peers.get_mut(&id) {
            peer.last_seen = Instant::now();
        }
    }

    /// Removes and returns every peer silent beyond [`PEER_TIMEOUT`]
    pub fn check_timeouts(&mut self) -> Vec<PeerId> {
        let timed_out: Vec<PeerId> = self
            .peers
            .values()
            .filter(|peer| peer.is_timed_out(PEER_TIMEOUT))
            .map(|peer| peer.id)
            .collect();

        for id in &timed_out {
            self.remove_peer(*id);
        }
        timed_out
    }

    /// (id, address) pairs for broadcasting, in id order
    pub fn peer_addrs(&self) -> Vec<(PeerId, SocketAddr)> {
        let mut addrs: Vec<(PeerId, SocketAddr)> = self
            .peers
            .iter()
            .map(|(id, peer)| (*id, peer.addr))
            .collect();
        addrs.sort_by_key(|(id, _)| *id);
        addrs
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
