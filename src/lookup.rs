//! Recursive lookup driver, `findOn`. Consumes a `nodes` blob from a
//! `find_node`/`get_peers` response, merges discovered contacts into the
//! routing table, and — unless the target was found or no contact was new —
//! asks the routing table for the closest contacts to the target and
//! re-enqueues the same-kind query toward each of them.

use tracing::trace;

use crate::contact::decode_compact_nodes;
use crate::dispatcher::Dispatcher;
use crate::message::QueryKind;
use crate::node_id::NodeId;
use crate::routing::RoutingTable;

/// Outcome of merging one `nodes` blob into the routing table. Pure and
/// unit-testable without a socket or dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LookupOutcome {
    /// `true` if any decoded contact's id equals the target.
    pub found: bool,
    /// `true` if the routing table reported any decoded contact was new.
    pub has_new: bool,
}

impl LookupOutcome {
    /// The lookup has converged: either the target was located, or the
    /// frontier of known nodes stopped growing.
    pub fn converged(&self) -> bool {
        self.found || !self.has_new
    }
}

/// Decodes `nodes_blob` and merges every contact into `routing`. Returns
/// `None` if the blob's length isn't a multiple of 26: the caller must drop
/// the response without touching the routing table, so
/// this function inserts nothing before validating the full blob.
pub fn merge_nodes<R: RoutingTable>(
    nodes_blob: &[u8],
    target: NodeId,
    routing: &R,
) -> Option<LookupOutcome> {
    let contacts = decode_compact_nodes(nodes_blob)?;
    let mut outcome = LookupOutcome::default();
    for (id, addr) in contacts {
        if id == target {
            outcome.found = true;
        }
        let contact = crate::contact::Contact::new(Some(id), addr);
        if routing.insert(contact) {
            outcome.has_new = true;
        }
    }
    Some(outcome)
}

/// The full `findOn` driver: merges `nodes_blob`, and if the lookup has not
/// converged, enqueues the same-kind query to the K closest known contacts
/// toward `target`. The dispatcher's own duplicate-suppression gates apply
/// to each enqueue, so peers already in flight are skipped for free.
pub fn find_on<R: RoutingTable>(
    nodes_blob: &[u8],
    target: NodeId,
    kind: QueryKind,
    routing: &R,
    dispatcher: &Dispatcher,
    k: usize,
) -> Option<LookupOutcome> {
    let outcome = merge_nodes(nodes_blob, target, routing)?;
    if outcome.converged() {
        trace!(?outcome, "lookup converged toward {target}");
        return Some(outcome);
    }

    for contact in routing.find_closest(target, k) {
        let result = match kind {
            QueryKind::FindNode => dispatcher.find_node(contact, target),
            QueryKind::GetPeers => dispatcher.get_peers(contact, target),
            QueryKind::Ping | QueryKind::AnnouncePeer => {
                unreachable!("findOn is only driven by find_node/get_peers responses")
            }
        };
        if let Err(e) = result {
            trace!(error = %e, "lookup enqueue skipped");
        }
    }

    Some(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::encode_compact_node;
    use crate::memory::InMemoryRoutingTable;
    use crate::transaction::TransactionTable;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn blob_of(contacts: &[(NodeId, SocketAddr)]) -> Vec<u8> {
        contacts
            .iter()
            .flat_map(|(id, addr)| encode_compact_node(*id, *addr).unwrap())
            .collect()
    }

    #[test]
    fn rejects_blob_not_multiple_of_26_without_touching_routing_table() {
        let routing = InMemoryRoutingTable::new(NodeId::random());
        let result = merge_nodes(&[0u8; 27], NodeId::random(), &routing);
        assert!(result.is_none());
    }

    #[test]
    fn found_flag_set_when_target_present() {
        let local = NodeId::random();
        let routing = InMemoryRoutingTable::new(local);
        let target = NodeId::random();
        let addr: SocketAddr = "192.0.2.1:6881".parse().unwrap();
        let blob = blob_of(&[(target, addr)]);

        let outcome = merge_nodes(&blob, target, &routing).unwrap();
        assert!(outcome.found);
        assert!(outcome.converged());
    }

    #[test]
    fn converges_when_all_contacts_already_known() {
        let local = NodeId::random();
        let routing = InMemoryRoutingTable::new(local);
        let other = NodeId::random();
        let addr: SocketAddr = "192.0.2.1:6881".parse().unwrap();
        routing.insert(crate::contact::Contact::new(Some(other), addr));

        let blob = blob_of(&[(other, addr)]);
        let target = NodeId::random();
        let outcome = merge_nodes(&blob, target, &routing).unwrap();
        assert!(!outcome.found);
        assert!(!outcome.has_new);
        assert!(outcome.converged());
    }

    #[test]
    fn find_on_issues_no_queries_when_converged() {
        let local = NodeId::random();
        let routing = Arc::new(InMemoryRoutingTable::new(local));
        let table = Arc::new(TransactionTable::new());
        let (tx, mut rx) = mpsc::channel(16);
        let dispatcher = Dispatcher::new(crate::identity::LocalIdentity::new(local), table, tx);

        let target = NodeId::random();
        let addr: SocketAddr = "192.0.2.1:6881".parse().unwrap();
        let blob = blob_of(&[(target, addr)]);

        let outcome = find_on(&blob, target, QueryKind::FindNode, &*routing, &dispatcher, 8).unwrap();
        assert!(outcome.found);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn find_on_enqueues_toward_new_contacts() {
        let local = NodeId::random();
        let routing = Arc::new(InMemoryRoutingTable::new(local));
        let table = Arc::new(TransactionTable::new());
        let (tx, mut rx) = mpsc::channel(16);
        let dispatcher = Dispatcher::new(crate::identity::LocalIdentity::new(local), table, tx);

        let target = NodeId::random();
        let new_contact = NodeId::random();
        let addr: SocketAddr = "192.0.2.1:6881".parse().unwrap();
        let blob = blob_of(&[(new_contact, addr)]);

        let outcome = find_on(&blob, target, QueryKind::FindNode, &*routing, &dispatcher, 8).unwrap();
        assert!(!outcome.found);
        assert!(outcome.has_new);
        assert!(rx.try_recv().is_ok());
    }
}
