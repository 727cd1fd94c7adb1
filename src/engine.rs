//! The protocol engine: wires the transaction table, dispatcher, handlers,
//! and lookup driver to a UDP socket. Shaped like `Discv4::start_discovery_service`
//! — an `Arc`-wrapped, `Clone` handle whose `run` spawns the receive loop,
//! the dispatch loop, and the periodic-lookup loop as independent tasks and
//! joins them.

use std::sync::{Arc, Mutex};

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::sync::Semaphore;
use tracing::{debug, error, trace};

use crate::callbacks::Callbacks;
use crate::config::Config;
use crate::context::Context;
use crate::dispatcher::{Dispatcher, PendingQuery};
use crate::error::EngineError;
use crate::handler::{error as error_handler, request as request_handler, response as response_handler};
use crate::identity::LocalIdentity;
use crate::message::{self, EnvelopeKind};
use crate::node_id::NodeId;
use crate::routing::{PeerStore, RoutingTable, TokenStore};
use crate::runner;
use crate::transaction::TransactionTable;

/// Largest datagram the engine will attempt to read. BEP-5 payloads are
/// small; this matches the generous margin used for discovery-style UDP
/// protocols in the wider ecosystem.
const MAX_PACKET_SIZE: usize = 2048;

struct Inner<R: RoutingTable, P: PeerStore, T: TokenStore> {
    ctx: Arc<Context<R, P, T>>,
    semaphore: Arc<Semaphore>,
    dispatch_rx: Mutex<Option<mpsc::Receiver<PendingQuery>>>,
}

/// Builds an [`Engine`]. Uses the same consuming-builder style as
/// `Discv4::with_revalidation_interval_of` for the optional callbacks.
pub struct EngineBuilder<R: RoutingTable, P: PeerStore, T: TokenStore> {
    local: LocalIdentity,
    socket: Arc<UdpSocket>,
    routing: Arc<R>,
    peers: Arc<P>,
    tokens: Arc<T>,
    config: Config,
    callbacks: Callbacks,
}

impl<R: RoutingTable, P: PeerStore, T: TokenStore> EngineBuilder<R, P, T> {
    pub fn new(
        local: LocalIdentity,
        socket: Arc<UdpSocket>,
        routing: Arc<R>,
        peers: Arc<P>,
        tokens: Arc<T>,
    ) -> Self {
        Self {
            local,
            socket,
            routing,
            peers,
            tokens,
            config: Config::default(),
            callbacks: Callbacks::default(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_callbacks(mut self, callbacks: Callbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn build(self) -> Engine<R, P, T> {
        let (dispatch_tx, dispatch_rx) = mpsc::channel(self.config.pending_query_capacity);
        let table = Arc::new(TransactionTable::new());
        let dispatcher = Dispatcher::new(self.local, table.clone(), dispatch_tx);
        let ctx = Arc::new(Context {
            local: self.local,
            socket: self.socket,
            table,
            routing: self.routing,
            peers: self.peers,
            tokens: self.tokens,
            dispatcher,
            callbacks: self.callbacks,
            config: self.config.clone(),
        });
        Engine {
            inner: Arc::new(Inner {
                ctx,
                semaphore: Arc::new(Semaphore::new(self.config.work_semaphore_capacity)),
                dispatch_rx: Mutex::new(Some(dispatch_rx)),
            }),
        }
    }
}

#[derive(Clone)]
pub struct Engine<R: RoutingTable, P: PeerStore, T: TokenStore> {
    inner: Arc<Inner<R, P, T>>,
}

impl<R, P, T> Engine<R, P, T>
where
    R: RoutingTable + 'static,
    P: PeerStore + 'static,
    T: TokenStore + 'static,
{
    /// A handle to the dispatcher — the public entry point for issuing
    /// `ping`/`find_node`/`get_peers`/`announce_peer` queries from outside
    /// the engine (e.g. bootstrap, or a caller answering `get_peers` for a
    /// torrent it cares about).
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.ctx.dispatcher
    }

    pub fn transaction_count(&self) -> usize {
        self.inner.ctx.table.len()
    }

    pub fn routing(&self) -> &Arc<R> {
        &self.inner.ctx.routing
    }

    pub fn peers(&self) -> &Arc<P> {
        &self.inner.ctx.peers
    }

    pub fn tokens(&self) -> &Arc<T> {
        &self.inner.ctx.tokens
    }

    pub fn local(&self) -> LocalIdentity {
        self.inner.ctx.local
    }

    /// Runs the engine until a background task panics. Each of the receive
    /// loop, dispatch loop, and periodic-lookup loop runs forever under
    /// normal operation — no protocol-level error reaches a fatal path —
    /// so this only returns on a task join error.
    pub async fn run(self: Arc<Self>) -> Result<(), EngineError> {
        let dispatch_rx = self
            .inner
            .dispatch_rx
            .lock()
            .expect("engine poisoned")
            .take()
            .ok_or(EngineError::AlreadyRunning)?;

        let receive_handle = tokio::spawn(self.clone().receive_loop());
        let dispatch_handle = tokio::spawn(self.clone().dispatch_loop(dispatch_rx));
        let lookup_handle = tokio::spawn(self.clone().periodic_lookup_loop());

        tokio::try_join!(receive_handle, dispatch_handle, lookup_handle)?;
        Ok(())
    }

    /// Packet intake: reads datagrams and spawns one decode/dispatch
    /// task per packet, gated by the bounded work semaphore. A full
    /// semaphore means the packet is dropped at the door.
    async fn receive_loop(self: Arc<Self>) {
        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        loop {
            let (n, from) = match self.inner.ctx.socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(e) => {
                    error!(error = %e, "udp recv_from failed");
                    continue;
                }
            };

            let Ok(permit) = self.inner.semaphore.clone().try_acquire_owned() else {
                trace!(peer = %from, "work semaphore full, dropping packet");
                continue;
            };

            let data = buf[..n].to_vec();
            let ctx = self.inner.ctx.clone();
            tokio::spawn(async move {
                let _permit = permit;
                handle_packet(ctx, &data, from).await;
            });
        }
    }

    /// Query dispatcher consumer: the single reader of the pending-
    /// query channel. Allocates a transaction id, performs the authoritative
    /// duplicate-suppression insert, and spawns a runner task per item.
    async fn dispatch_loop(self: Arc<Self>, mut rx: mpsc::Receiver<PendingQuery>) {
        while let Some(item) = rx.recv().await {
            let ctx = self.inner.ctx.clone();
            let id = ctx.table.alloc_id();
            let (completion_tx, completion_rx) =
                mpsc::channel(ctx.config.completion_channel_capacity());

            if let Err(e) = ctx.table.insert(
                id.clone(),
                item.kind,
                item.target.addr,
                item.target.id,
                item.lookup_target,
                completion_tx,
            ) {
                debug!(error = %e, "duplicate suppressed at insert time");
                continue;
            }

            let payload = message::query::build_query(&id, item.kind, item.args);
            let socket = ctx.socket.clone();
            let table = ctx.table.clone();
            let routing = ctx.routing.clone();
            let config = ctx.config.clone();
            let target = item.target;
            let kind = item.kind;

            tokio::spawn(async move {
                runner::run_query(
                    socket,
                    table,
                    routing,
                    config,
                    id,
                    kind,
                    target,
                    payload,
                    completion_rx,
                )
                .await;
            });
        }
    }

    /// Periodic maintenance: on a timer, kicks off a
    /// `find_node` lookup toward the local id plus a handful of random ids,
    /// so the routing table stays populated even without external
    /// `get_peers` traffic. This only issues the first wave of queries
    /// toward the currently-known closest contacts — convergence and
    /// further rounds are driven by `findOn` as responses arrive.
    async fn periodic_lookup_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.inner.ctx.config.lookup_interval);
        loop {
            interval.tick().await;
            debug!("starting periodic lookup round");

            let local_id = self.inner.ctx.local.id;
            self.start_lookup(local_id);
            for _ in 0..3 {
                self.start_lookup(NodeId::random());
            }
        }
    }

    fn start_lookup(&self, target: NodeId) {
        let ctx = &self.inner.ctx;
        for contact in ctx.routing.find_closest(target, ctx.config.k) {
            if let Err(e) = ctx.dispatcher.find_node(contact, target) {
                trace!(error = %e, "periodic lookup enqueue skipped");
            }
        }
    }
}

async fn handle_packet<R, P, T>(ctx: Arc<Context<R, P, T>>, data: &[u8], from: std::net::SocketAddr)
where
    R: RoutingTable,
    P: PeerStore,
    T: TokenStore,
{
    let envelope = match message::parse_message(data) {
        Ok(envelope) => envelope,
        Err(e) => {
            trace!(error = %e, peer = %from, "dropping malformed packet");
            return;
        }
    };

    match envelope.kind {
        EnvelopeKind::Query { q, a } => {
            request_handler::handle_request(&ctx, &envelope.t, q.as_deref(), a.as_ref(), from)
                .await
        }
        EnvelopeKind::Response { r } => {
            response_handler::handle_response(&ctx, &envelope.t, &r, from).await
        }
        EnvelopeKind::Error { e } => error_handler::handle_error(&ctx, &envelope.t, &e, from).await,
    }
}
