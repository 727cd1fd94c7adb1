//! Error handler: inbound `y = "e"` messages. Validates the `[code,
//! message]` pair, correlates via `filter_one`, and — if matched — fires
//! the transaction's completion signal so its runner stops retrying.

use std::net::SocketAddr;

use crate::codec::BValue;
use crate::context::Context;
use crate::metrics;
use crate::routing::{PeerStore, RoutingTable, TokenStore};
use crate::transaction::CompletionSignal;

pub async fn handle_error<R, P, T>(ctx: &Context<R, P, T>, t: &[u8], e: &BValue, from: SocketAddr)
where
    R: RoutingTable,
    P: PeerStore,
    T: TokenStore,
{
    let Some(list) = e.as_list() else {
        return;
    };
    if list.len() != 2 {
        return;
    }

    let Some(txn) = ctx.table.filter_one(t, &from) else {
        return;
    };

    txn.complete(CompletionSignal::Error(e.clone()));
    metrics::record_error_matched();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::Callbacks;
    use crate::config::Config;
    use crate::dispatcher::Dispatcher;
    use crate::identity::LocalIdentity;
    use crate::memory::{InMemoryPeerStore, InMemoryRoutingTable, InMemoryTokenStore};
    use crate::message::query::QueryKind;
    use crate::node_id::NodeId;
    use crate::transaction::TransactionTable;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::sync::Arc;
    use tokio::net::UdpSocket;
    use tokio::sync::mpsc;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), port)
    }

    async fn test_context() -> Context<InMemoryRoutingTable, InMemoryPeerStore, InMemoryTokenStore>
    {
        let local = LocalIdentity::random();
        let socket = Arc::new(UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap());
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

    #[tokio::test]
    async fn matched_error_fires_completion_so_the_runner_stops_retrying() {
        let ctx = test_context().await;
        let (tx, mut rx) = mpsc::channel(4);
        ctx.table
            .insert(
                b"aa".to_vec(),
                QueryKind::Ping,
                addr(1),
                None,
                NodeId::random(),
                tx,
            )
            .unwrap();

        let e = BValue::List(vec![BValue::Int(201), BValue::Bytes(b"Generic Error".to_vec())]);
        handle_error(&ctx, b"aa", &e, addr(1)).await;

        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn malformed_list_length_is_ignored() {
        let ctx = test_context().await;
        let (tx, mut rx) = mpsc::channel(4);
        ctx.table
            .insert(
                b"aa".to_vec(),
                QueryKind::Ping,
                addr(1),
                None,
                NodeId::random(),
                tx,
            )
            .unwrap();

        let e = BValue::List(vec![BValue::Int(201)]);
        handle_error(&ctx, b"aa", &e, addr(1)).await;

        assert!(rx.try_recv().is_err());
    }
}
