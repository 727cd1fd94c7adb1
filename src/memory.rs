//! In-memory reference implementations of [`RoutingTable`], [`PeerStore`],
//! and [`TokenStore`]. These exist so the engine is
//! independently buildable and testable as a standalone crate; they are
//! deliberately simple (linear scan for proximity, no persistence, no
//! bucket structure) and are not a recommended production routing table.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;

use crate::contact::{encode_compact_node, Contact, Peer};
use crate::node_id::NodeId;
use crate::routing::{PeerStore, RoutingTable, TokenStore};

/// A flat table of contacts, ranked by XOR distance on each query. Fine for
/// tests and small deployments; a real k-bucket structure is out of scope
/// here.
pub struct InMemoryRoutingTable {
    local_id: NodeId,
    contacts: Mutex<HashMap<NodeId, Contact>>,
}

impl InMemoryRoutingTable {
    pub fn new(local_id: NodeId) -> Self {
        Self {
            local_id,
            contacts: Mutex::new(HashMap::new()),
        }
    }
}

impl RoutingTable for InMemoryRoutingTable {
    fn insert(&self, contact: Contact) -> bool {
        let Some(id) = contact.id else {
            return false;
        };
        if id == self.local_id {
            return false;
        }
        let mut contacts = self.contacts.lock().expect("routing table poisoned");
        contacts.insert(id, contact).is_none()
    }

    fn remove(&self, id: NodeId) {
        let mut contacts = self.contacts.lock().expect("routing table poisoned");
        contacts.remove(&id);
    }

    fn get_node(&self, id: NodeId) -> Option<Contact> {
        let contacts = self.contacts.lock().expect("routing table poisoned");
        contacts.get(&id).cloned()
    }

    fn find_closest(&self, target: NodeId, k: usize) -> Vec<Contact> {
        let contacts = self.contacts.lock().expect("routing table poisoned");
        let mut ranked: Vec<&Contact> = contacts.values().collect();
        ranked.sort_by_key(|c| c.id.map(|id| id.distance(&target)));
        ranked.into_iter().take(k).cloned().collect()
    }

    fn closest_compact_info(&self, target: NodeId, k: usize) -> Vec<[u8; 26]> {
        self.find_closest(target, k)
            .into_iter()
            .filter_map(|c| encode_compact_node(c.id?, c.addr))
            .collect()
    }
}

/// Peers announced per info-hash, most-recent first.
#[derive(Default)]
pub struct InMemoryPeerStore {
    peers: Mutex<HashMap<NodeId, Vec<Peer>>>,
}

impl InMemoryPeerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PeerStore for InMemoryPeerStore {
    fn get_peers(&self, info_hash: NodeId, k: usize) -> Vec<Peer> {
        let peers = self.peers.lock().expect("peer store poisoned");
        peers
            .get(&info_hash)
            .map(|v| v.iter().rev().take(k).cloned().collect())
            .unwrap_or_default()
    }

    fn insert(&self, info_hash: NodeId, peer: Peer) {
        let mut peers = self.peers.lock().expect("peer store poisoned");
        peers.entry(info_hash).or_default().push(peer);
    }
}

/// Issues one fixed token per querier address. A production store should
/// rotate tokens periodically and accept the current plus prior one — this
/// reference store keeps it simple by never rotating.
#[derive(Default)]
pub struct InMemoryTokenStore {
    tokens: Mutex<HashMap<SocketAddr, Vec<u8>>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for InMemoryTokenStore {
    fn token_for(&self, addr: SocketAddr) -> Vec<u8> {
        let mut tokens = self.tokens.lock().expect("token store poisoned");
        tokens
            .entry(addr)
            .or_insert_with(|| {
                let id = NodeId::random();
                id.as_bytes()[..8].to_vec()
            })
            .clone()
    }

    fn check(&self, addr: SocketAddr, token: &[u8]) -> bool {
        let tokens = self.tokens.lock().expect("token store poisoned");
        tokens.get(&addr).map(|t| t.as_slice()) == Some(token)
    }
}
