use libp2p::PeerId;
use std::collections::{HashMap, HashSet};

/// A discovered endpoint as presented to a peer list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub id: PeerId,
    pub name: String,
    pub is_connected: bool,
}

#[derive(Debug, Clone, Default)]
struct PeerEntry {
    name: Option<String>,
    is_connected: bool,
    /// `Some(false)` once identify reports another service
    compatible: Option<bool>,
}

/// Last few characters of a peer id, for display
pub fn short_id(peer_id: &PeerId) -> String {
    let full = peer_id.to_base58();
    // base58 is ASCII, and every ed25519 id shares the same prefix
    full[full.len().saturating_sub(8)..].to_string()
}

/// Best-known view of peers, updated by the transport as events arrive
#[derive(Debug, Default)]
pub struct PeerRegistry {
    order: Vec<PeerId>,
    entries: HashMap<PeerId, PeerEntry>,
    selected: HashSet<PeerId>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, peer_id: PeerId) -> &mut PeerEntry {
        if !self.entries.contains_key(&peer_id) {
            self.order.push(peer_id);
        }
        self.entries.entry(peer_id).or_default()
    }

    /// Record a peer found by discovery. Returns true if it was new.
    pub fn discovered(&mut self, peer_id: PeerId) -> bool {
        let is_new = !self.entries.contains_key(&peer_id);
        self.entry(peer_id);
        is_new
    }

    /// Discovery no longer sees the peer; keep it while still connected
    pub fn expired(&mut self, peer_id: &PeerId) {
        if !self.is_connected(peer_id) {
            self.remove_peer(peer_id);
        }
    }

    pub fn connected(&mut self, peer_id: PeerId) {
        self.entry(peer_id).is_connected = true;
    }

    pub fn disconnected(&mut self, peer_id: &PeerId) {
        if let Some(entry) = self.entries.get_mut(peer_id) {
            entry.is_connected = false;
        }
    }

    /// Apply the peer's self-description from identify
    pub fn identified(&mut self, peer_id: PeerId, name: String, compatible: bool) {
        let entry = self.entry(peer_id);
        if !name.is_empty() {
            entry.name = Some(name);
        }
        entry.compatible = Some(compatible);
        if !compatible {
            self.selected.remove(&peer_id);
        }
    }

    pub fn remove_peer(&mut self, peer_id: &PeerId) {
        if self.entries.remove(peer_id).is_some() {
            self.order.retain(|p| p != peer_id);
        }
        self.selected.remove(peer_id);
    }

    pub fn is_connected(&self, peer_id: &PeerId) -> bool {
        self.entries
            .get(peer_id)
            .map(|e| e.is_connected)
            .unwrap_or(false)
    }

    /// False only for peers known to speak another service
    pub fn is_compatible(&self, peer_id: &PeerId) -> bool {
        self.entries
            .get(peer_id)
            .and_then(|e| e.compatible)
            .unwrap_or(true)
    }

    /// Peers in discovery order, excluding other services
    pub fn snapshot(&self) -> Vec<Peer> {
        self.order
            .iter()
            .filter(|p| self.is_compatible(p))
            .filter_map(|p| {
                self.entries.get(p).map(|entry| Peer {
                    id: *p,
                    name: entry.name.clone().unwrap_or_else(|| short_id(p)),
                    is_connected: entry.is_connected,
                })
            })
            .collect()
    }

    /// Flip a peer in or out of the selected subset. Returns the new state.
    pub fn toggle_selected(&mut self, peer_id: &PeerId) -> bool {
        if !self.entries.contains_key(peer_id) {
            return false;
        }
        if self.selected.remove(peer_id) {
            false
        } else {
            self.selected.insert(*peer_id);
            true
        }
    }

    pub fn selected_peers(&self) -> Vec<PeerId> {
        self.order
            .iter()
            .filter(|p| self.selected.contains(p))
            .copied()
            .collect()
    }

    /// Forget every peer, used when the transport stops
    pub fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
        self.selected.clear();
    }
}
