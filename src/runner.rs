//! Query runner: owns the send-and-wait retry loop for one outbound
//! query. On exhausted retries, evicts the peer from the routing table — but
//! only if the target's id was known, and never when the loop aborted
//! because the local socket write itself failed.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::codec::{self, BValue};
use crate::config::Config;
use crate::contact::Contact;
use crate::error::SendError;
use crate::message::QueryKind;
use crate::metrics;
use crate::routing::RoutingTable;
use crate::transaction::{CompletionSignal, TransactionTable};

/// Runs one transaction's retry loop to completion and removes it from the
/// table on exit, success or failure alike.
pub async fn run_query<R: RoutingTable>(
    socket: Arc<UdpSocket>,
    table: Arc<TransactionTable>,
    routing: Arc<R>,
    config: Config,
    id: Vec<u8>,
    kind: QueryKind,
    target: Contact,
    payload: BValue,
    mut completion_rx: mpsc::Receiver<CompletionSignal>,
) {
    let bytes = match codec::encode(&payload) {
        Ok(b) => b,
        Err(e) => {
            warn!(error = %e, "failed to encode outbound query, dropping transaction");
            table.remove(&id);
            return;
        }
    };

    let mut succeeded = false;
    let mut send_failed = false;

    for attempt in 0..config.try_count {
        if let Err(e) = send_once(&socket, &bytes, target.addr).await {
            warn!(error = %e, peer = %target.addr, "send failed, aborting retry loop");
            send_failed = true;
            break;
        }
        trace!(attempt, kind = kind.as_str(), peer = %target.addr, "sent query");
        metrics::record_query_sent();

        match tokio::time::timeout(config.attempt_timeout, completion_rx.recv()).await {
            Ok(Some(_signal)) => {
                succeeded = true;
                break;
            }
            Ok(None) => {
                // sender side dropped; nothing more will ever arrive.
                break;
            }
            Err(_elapsed) => {
                debug!(attempt, peer = %target.addr, "query attempt timed out");
                continue;
            }
        }
    }

    table.remove(&id);

    if !succeeded && !send_failed {
        if let Some(target_id) = target.id {
            debug!(peer = %target.addr, id = %target_id, "evicting peer after exhausting retries");
            routing.remove(target_id);
            metrics::record_timeout_evicted();
        }
    }
}

async fn send_once(socket: &UdpSocket, bytes: &[u8], to: SocketAddr) -> Result<(), SendError> {
    let sent = socket.send_to(bytes, to).await?;
    if sent != bytes.len() {
        return Err(SendError::ShortWrite {
            sent,
            expected: bytes.len(),
        });
    }
    Ok(())
}
