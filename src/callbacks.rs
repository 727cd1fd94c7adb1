use std::net::IpAddr;
use std::sync::Arc;

use crate::node_id::NodeId;

/// Observability hooks fired on inbound `get_peers`/`announce_peer` requests.
/// Neither is required; the engine runs identically with none registered.
pub type GetPeersHook = Arc<dyn Fn(NodeId, IpAddr, u16) + Send + Sync>;
pub type AnnouncePeerHook = Arc<dyn Fn(NodeId, IpAddr, u16) + Send + Sync>;

#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_get_peers: Option<GetPeersHook>,
    pub on_announce_peer: Option<AnnouncePeerHook>,
}

impl Callbacks {
    pub fn with_on_get_peers(mut self, hook: GetPeersHook) -> Self {
        self.on_get_peers = Some(hook);
        self
    }

    pub fn with_on_announce_peer(mut self, hook: AnnouncePeerHook) -> Self {
        self.on_announce_peer = Some(hook);
        self
    }
}
