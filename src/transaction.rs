use std::collections::HashMap;
use std::net::SocketAddr;
use std::num::Wrapping;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::codec::BValue;
use crate::error::TransactionError;
use crate::message::QueryKind;
use crate::node_id::NodeId;

/// The signal fired at most once per response into a transaction's
/// completion channel. The channel itself is buffered to `Try + 1`
/// capacity so a late duplicate delivery — from a retried attempt, or a
/// race between the response and error handlers — never blocks the sender.
#[derive(Clone, Debug)]
pub enum CompletionSignal {
    Response(BValue),
    Error(BValue),
}

/// A live outstanding request. Cheap to clone: the completion sender
/// is an `mpsc::Sender`, itself a cheap `Arc`-backed clone.
#[derive(Clone)]
pub struct Transaction {
    pub id: Vec<u8>,
    pub kind: QueryKind,
    pub target_addr: SocketAddr,
    pub target_id: Option<NodeId>,
    pub lookup_target: NodeId,
    completion_tx: mpsc::Sender<CompletionSignal>,
}

impl Transaction {
    /// Fires the completion signal. This is at most once *observably* per
    /// response, but the buffered channel tolerates
    /// multiple non-blocking sends from retried attempts or a race between
    /// the response and error handlers.
    pub fn complete(&self, signal: CompletionSignal) {
        let _ = self.completion_tx.try_send(signal);
    }
}

struct Inner {
    by_id: HashMap<Vec<u8>, Transaction>,
    by_index: HashMap<(QueryKind, String), Vec<u8>>,
}

/// The transaction table: two concurrent mappings (by transaction-id; by
/// `(query-kind, peer-addr)`), a monotonic id allocator, and the
/// cross-map invariant that both registrations are inserted and removed
/// together. Mutations hold one exclusive lock, generalizing the familiar
/// `Arc<Mutex<RoutingTable>>` shape to the two-map invariant this protocol
/// requires.
pub struct TransactionTable {
    inner: Mutex<Inner>,
    id_counter: AtomicU32,
}

impl Default for TransactionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionTable {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                by_id: HashMap::new(),
                by_index: HashMap::new(),
            }),
            id_counter: AtomicU32::new(0),
        }
    }

    /// Returns a fresh textual transaction id from a wrapping 32-bit
    /// counter. IDs already live in the table (vanishingly unlikely, but
    /// never tolerated) are skipped.
    pub fn alloc_id(&self) -> Vec<u8> {
        let inner = self.inner.lock().expect("transaction table poisoned");
        loop {
            let n = self.id_counter.fetch_add(1, Ordering::Relaxed);
            let id = encode_short_id(n);
            if !inner.by_id.contains_key(&id) {
                return id;
            }
        }
    }

    /// Registers a transaction under both keys. Precondition: neither key
    /// is live — callers must consult [`TransactionTable::by_index`] before
    /// issuing a query (this is the duplicate-suppression mechanism).
    pub fn insert(
        &self,
        id: Vec<u8>,
        kind: QueryKind,
        target_addr: SocketAddr,
        target_id: Option<NodeId>,
        lookup_target: NodeId,
        completion_tx: mpsc::Sender<CompletionSignal>,
    ) -> Result<(), TransactionError> {
        let mut inner = self.inner.lock().expect("transaction table poisoned");
        if inner.by_id.contains_key(&id) {
            return Err(TransactionError::IdAlreadyLive(
                String::from_utf8_lossy(&id).into_owned(),
            ));
        }
        let index_key = (kind, target_addr.to_string());
        if inner.by_index.contains_key(&index_key) {
            return Err(TransactionError::IndexAlreadyLive {
                kind: kind.as_str(),
                addr: target_addr.to_string(),
            });
        }
        let txn = Transaction {
            id: id.clone(),
            kind,
            target_addr,
            target_id,
            lookup_target,
            completion_tx,
        };
        inner.by_index.insert(index_key, id.clone());
        inner.by_id.insert(id, txn);
        Ok(())
    }

    /// Removes both registrations. Idempotent: a missing id is a no-op.
    pub fn remove(&self, id: &[u8]) {
        let mut inner = self.inner.lock().expect("transaction table poisoned");
        if let Some(txn) = inner.by_id.remove(id) {
            inner
                .by_index
                .remove(&(txn.kind, txn.target_addr.to_string()));
        }
    }

    pub fn by_id(&self, id: &[u8]) -> Option<Transaction> {
        let inner = self.inner.lock().expect("transaction table poisoned");
        inner.by_id.get(id).cloned()
    }

    pub fn by_index(&self, kind: QueryKind, addr: &SocketAddr) -> Option<Transaction> {
        let inner = self.inner.lock().expect("transaction table poisoned");
        let id = inner.by_index.get(&(kind, addr.to_string()))?;
        inner.by_id.get(id).cloned()
    }

    /// Returns the transaction for `t` only if its stored target address
    /// matches `addr`'s string form — binding the reply to the precise
    /// peer the query was sent to, defeating third-party forgery by
    /// transaction-id guessing.
    pub fn filter_one(&self, t: &[u8], addr: &SocketAddr) -> Option<Transaction> {
        let inner = self.inner.lock().expect("transaction table poisoned");
        let txn = inner.by_id.get(t)?;
        if txn.target_addr.to_string() == addr.to_string() {
            Some(txn.clone())
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.lock().expect("transaction table poisoned");
        debug_assert_eq!(inner.by_id.len(), inner.by_index.len());
        inner.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Short ASCII transaction id from a wrapping counter — lowercase hex of
/// the little-endian bytes, trimmed of leading zero bytes, keeping
/// transaction ids short byte-strings while staying collision-safe within a
/// `u32` cycle.
fn encode_short_id(n: u32) -> Vec<u8> {
    let n = Wrapping(n).0;
    let bytes = n.to_le_bytes();
    let trimmed_len = bytes.iter().rposition(|&b| b != 0).map_or(1, |i| i + 1);
    hex::encode(&bytes[..trimmed_len]).into_bytes()
}
