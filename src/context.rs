//! The shared collaborators every handler and background task needs: the
//! engine owns this `Context`, and subsystems receive a borrowed or
//! `Arc`-shared handle to it rather than a back-reference to the engine
//! itself.

use std::sync::Arc;

use tokio::net::UdpSocket;

use crate::callbacks::Callbacks;
use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::identity::LocalIdentity;
use crate::routing::{PeerStore, RoutingTable, TokenStore};
use crate::transaction::TransactionTable;

pub struct Context<R: RoutingTable, P: PeerStore, T: TokenStore> {
    pub local: LocalIdentity,
    pub socket: Arc<UdpSocket>,
    pub table: Arc<TransactionTable>,
    pub routing: Arc<R>,
    pub peers: Arc<P>,
    pub tokens: Arc<T>,
    pub dispatcher: Dispatcher,
    pub callbacks: Callbacks,
    pub config: Config,
}
