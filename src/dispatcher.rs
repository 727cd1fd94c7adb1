//! Query dispatcher: the producer side of the bounded pending-query
//! queue. `ping`/`find_node`/`get_peers`/`announce_peer` build the `a`
//! mapping and enqueue a query, gated by the two duplicate-suppression
//! checks — never query self, never enqueue a second query of the same
//! kind to a peer already in flight. The queue's single consumer (the
//! dispatch loop in [`crate::engine`]) performs the authoritative check by
//! actually inserting into the transaction table; these gates just avoid
//! filling the queue with redundant work ahead of time.

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::codec::{self, BValue};
use crate::contact::Contact;
use crate::error::DispatchError;
use crate::identity::LocalIdentity;
use crate::message::QueryKind;
use crate::node_id::NodeId;
use crate::transaction::TransactionTable;

/// One query waiting to be picked up by the dispatch loop and turned into a
/// live transaction plus a spawned [`crate::runner::run_query`] task.
pub struct PendingQuery {
    pub kind: QueryKind,
    pub target: Contact,
    /// The node-id or info-hash the lookup driver is walking toward, for
    /// `find_node`/`get_peers`; unused for `ping`/`announce_peer`.
    pub lookup_target: NodeId,
    pub args: BValue,
}

pub struct Dispatcher {
    local: LocalIdentity,
    table: Arc<TransactionTable>,
    tx: mpsc::Sender<PendingQuery>,
}

impl Clone for Dispatcher {
    fn clone(&self) -> Self {
        Self {
            local: self.local,
            table: self.table.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl Dispatcher {
    pub fn new(local: LocalIdentity, table: Arc<TransactionTable>, tx: mpsc::Sender<PendingQuery>) -> Self {
        Self { local, table, tx }
    }

    fn enqueue(
        &self,
        kind: QueryKind,
        target: Contact,
        lookup_target: NodeId,
        args: BValue,
    ) -> Result<(), DispatchError> {
        if target.id == Some(self.local.id) {
            return Err(DispatchError::TargetIsSelf);
        }
        if self.table.by_index(kind, &target.addr).is_some() {
            return Err(DispatchError::Duplicate);
        }
        self.tx
            .try_send(PendingQuery {
                kind,
                target,
                lookup_target,
                args,
            })
            .map_err(|_| DispatchError::QueueFull)
    }

    fn local_id_arg(&self) -> BValue {
        BValue::Bytes(self.local.id.as_bytes().to_vec())
    }

    pub fn ping(&self, target: Contact) -> Result<(), DispatchError> {
        let args = codec::dict([("id", self.local_id_arg())]);
        self.enqueue(QueryKind::Ping, target, self.local.id, args)
    }

    pub fn find_node(&self, target: Contact, find_target: NodeId) -> Result<(), DispatchError> {
        let args = codec::dict([
            ("id", self.local_id_arg()),
            ("target", BValue::Bytes(find_target.as_bytes().to_vec())),
        ]);
        self.enqueue(QueryKind::FindNode, target, find_target, args)
    }

    pub fn get_peers(&self, target: Contact, info_hash: NodeId) -> Result<(), DispatchError> {
        let args = codec::dict([
            ("id", self.local_id_arg()),
            ("info_hash", BValue::Bytes(info_hash.as_bytes().to_vec())),
        ]);
        self.enqueue(QueryKind::GetPeers, target, info_hash, args)
    }

    pub fn announce_peer(
        &self,
        target: Contact,
        info_hash: NodeId,
        implied_port: bool,
        port: u16,
        token: Vec<u8>,
    ) -> Result<(), DispatchError> {
        let args = codec::dict([
            ("id", self.local_id_arg()),
            ("info_hash", BValue::Bytes(info_hash.as_bytes().to_vec())),
            ("port", BValue::Int(port as i64)),
            ("token", BValue::Bytes(token)),
            ("implied_port", BValue::Int(implied_port as i64)),
        ]);
        self.enqueue(QueryKind::AnnouncePeer, target, info_hash, args)
    }

    /// Exposed for the routing-table eviction path and tests; not part of
    /// the wire-facing contract.
    pub fn local(&self) -> LocalIdentity {
        self.local
    }
}
