//! Contracts for the collaborators the engine treats as external: the
//! routing table, the peer store, and the token issuer. Production
//! embedders supply their own implementations; [`crate::memory`] carries
//! lightweight in-memory ones for tests and examples.

use std::net::SocketAddr;

use crate::contact::{Contact, Peer};
use crate::node_id::NodeId;

pub trait RoutingTable: Send + Sync {
    /// Inserts or refreshes a contact. Returns whether the contact was new
    /// to the table — the lookup driver's convergence flag depends on this.
    fn insert(&self, contact: Contact) -> bool;
    fn remove(&self, id: NodeId);
    fn get_node(&self, id: NodeId) -> Option<Contact>;
    fn find_closest(&self, target: NodeId, k: usize) -> Vec<Contact>;
    /// The K closest contacts to `target`, pre-encoded as compact node-info
    /// blobs, for use directly in a `find_node`/`get_peers` reply.
    fn closest_compact_info(&self, target: NodeId, k: usize) -> Vec<[u8; 26]>;
}

pub trait PeerStore: Send + Sync {
    fn get_peers(&self, info_hash: NodeId, k: usize) -> Vec<Peer>;
    fn insert(&self, info_hash: NodeId, peer: Peer);
}

pub trait TokenStore: Send + Sync {
    fn token_for(&self, addr: SocketAddr) -> Vec<u8>;
    /// Accepts the current and most recent prior token — rotation
    /// policy is the store's own concern.
    fn check(&self, addr: SocketAddr, token: &[u8]) -> bool;
}
