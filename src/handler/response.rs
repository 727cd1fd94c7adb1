//! Response handler: inbound `y = "r"` messages. Correlates against
//! the transaction table via `filter_one` (binding the reply to the exact
//! peer the query was sent to, defeating third-party forgery by
//! transaction-id guessing), validates `r`, runs the per-query-kind
//! response logic, and fires the transaction's completion signal.

use std::net::SocketAddr;

use crate::codec::BValue;
use crate::contact::{decode_compact_peers, Contact};
use crate::context::Context;
use crate::message::envelope::require_bytes;
use crate::lookup;
use crate::message::query::QueryKind;
use crate::metrics;
use crate::node_id::NodeId;
use crate::routing::{PeerStore, RoutingTable, TokenStore};
use crate::transaction::CompletionSignal;

pub async fn handle_response<R, P, T>(
    ctx: &Context<R, P, T>,
    t: &[u8],
    r: &BValue,
    from: SocketAddr,
) where
    R: RoutingTable,
    P: PeerStore,
    T: TokenStore,
{
    let Some(txn) = ctx.table.filter_one(t, &from) else {
        return;
    };

    let Ok(id_bytes) = require_bytes(r, "id") else {
        return;
    };
    let Some(responder_id) = NodeId::from_slice(id_bytes) else {
        return;
    };

    // Address-id mismatch: the target had a known id that differs from the
    // one in this reply.
    if let Some(expected) = txn.target_id {
        if expected != responder_id {
            return;
        }
    }

    match txn.kind {
        QueryKind::Ping => {}
        QueryKind::FindNode => {
            let Ok(nodes) = require_bytes(r, "nodes") else {
                return;
            };
            lookup::find_on(
                nodes,
                txn.lookup_target,
                QueryKind::FindNode,
                &*ctx.routing,
                &ctx.dispatcher,
                ctx.config.k,
            );
        }
        QueryKind::GetPeers => {
            let Ok(token) = require_bytes(r, "token") else {
                return;
            };
            if let Some(values) = r.get("values").and_then(|v| v.as_list()) {
                // When both `values` and `nodes` are present, `values` wins:
                // peers are inserted and there is no recursion.
                for entry in values {
                    let Some(blob) = entry.as_bytes() else {
                        continue;
                    };
                    if let Some(peers) = decode_compact_peers(blob, token) {
                        for peer in peers {
                            ctx.peers.insert(txn.lookup_target, peer);
                        }
                    }
                }
            } else {
                let Ok(nodes) = require_bytes(r, "nodes") else {
                    return;
                };
                lookup::find_on(
                    nodes,
                    txn.lookup_target,
                    QueryKind::GetPeers,
                    &*ctx.routing,
                    &ctx.dispatcher,
                    ctx.config.k,
                );
            }
        }
        QueryKind::AnnouncePeer => {}
    }

    txn.complete(CompletionSignal::Response(r.clone()));
    ctx.routing.insert(Contact::new(Some(responder_id), from));
    metrics::record_response_matched();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::Callbacks;
    use crate::codec;
    use crate::config::Config;
    use crate::dispatcher::Dispatcher;
    use crate::identity::LocalIdentity;
    use crate::memory::{InMemoryPeerStore, InMemoryRoutingTable, InMemoryTokenStore};
    use crate::transaction::TransactionTable;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::sync::Arc;
    use tokio::net::UdpSocket as TokioUdpSocket;
    use tokio::sync::mpsc;

    type TestContext = Context<InMemoryRoutingTable, InMemoryPeerStore, InMemoryTokenStore>;

    async fn test_context() -> TestContext {
        let local = LocalIdentity::random();
        let socket = Arc::new(
            TokioUdpSocket::bind((Ipv4Addr::LOCALHOST, 0))
                .await
                .unwrap(),
        );
        let table = Arc::new(TransactionTable::new());
        let routing = Arc::new(InMemoryRoutingTable::new(local.id));
        let (tx, _rx) = mpsc::channel(16);
        let dispatcher = Dispatcher::new(local, table.clone(), tx);
        Context {
            local,
            socket,
            table,
            routing,
            peers: Arc::new(InMemoryPeerStore::new()),
            tokens: Arc::new(InMemoryTokenStore::new()),
            dispatcher,
            callbacks: Callbacks::default(),
            config: Config::default(),
        }
    }

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), port)
    }

    #[tokio::test]
    async fn ping_response_fires_completion_and_records_contact() {
        let ctx = test_context().await;
        let responder_id = NodeId::random();
        let (tx, mut rx) = mpsc::channel(4);
        ctx.table
            .insert(
                b"aa".to_vec(),
                QueryKind::Ping,
                addr(1),
                None,
                ctx.local.id,
                tx,
            )
            .unwrap();

        let r = codec::dict([("id", BValue::Bytes(responder_id.as_bytes().to_vec()))]);
        handle_response(&ctx, b"aa", &r, addr(1)).await;

        assert!(rx.try_recv().is_ok());
        assert!(ctx.routing.get_node(responder_id).is_some());
    }

    #[tokio::test]
    async fn forged_reply_from_wrong_address_is_dropped() {
        // S4: outbound transaction to P; a reply claiming the same `t` but
        // arriving from a different address Q must not correlate.
        let ctx = test_context().await;
        let (tx, mut rx) = mpsc::channel(4);
        ctx.table
            .insert(
                b"a1".to_vec(),
                QueryKind::Ping,
                addr(1),
                None,
                ctx.local.id,
                tx,
            )
            .unwrap();

        let r = codec::dict([("id", BValue::Bytes(vec![7; 20]))]);
        handle_response(&ctx, b"a1", &r, addr(2)).await;

        assert!(rx.try_recv().is_err());
        assert!(ctx.table.by_id(b"a1").is_some(), "transaction still live");
    }

    #[tokio::test]
    async fn id_mismatch_against_known_target_is_dropped() {
        let ctx = test_context().await;
        let known_id = NodeId::random();
        let (tx, mut rx) = mpsc::channel(4);
        ctx.table
            .insert(
                b"aa".to_vec(),
                QueryKind::Ping,
                addr(1),
                Some(known_id),
                ctx.local.id,
                tx,
            )
            .unwrap();

        let r = codec::dict([("id", BValue::Bytes(vec![9; 20]))]);
        handle_response(&ctx, b"aa", &r, addr(1)).await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn get_peers_response_with_values_inserts_peers_without_recursing() {
        let ctx = test_context().await;
        let info_hash = NodeId::random();
        let (tx, mut rx) = mpsc::channel(4);
        ctx.table
            .insert(
                b"gp".to_vec(),
                QueryKind::GetPeers,
                addr(1),
                None,
                info_hash,
                tx,
            )
            .unwrap();

        let peer_blob = crate::contact::encode_compact_peer(Ipv4Addr::new(10, 0, 0, 1), 4000);
        let nodes_blob = vec![0u8; 26]; // present alongside `values`, must be ignored
        let r = codec::dict([
            ("id", BValue::Bytes(vec![1; 20])),
            ("token", BValue::Bytes(b"tok".to_vec())),
            ("values", BValue::List(vec![BValue::Bytes(peer_blob.to_vec())])),
            ("nodes", BValue::Bytes(nodes_blob)),
        ]);
        handle_response(&ctx, b"gp", &r, addr(1)).await;

        let peers = ctx.peers.get_peers(info_hash, 8);
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].port, 4000);
        assert!(rx.try_recv().is_ok());
    }
}
