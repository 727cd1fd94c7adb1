use crate::node_id::NodeId;

/// The local node's identity. A plain value — it has no collaborating
/// behavior beyond holding 20 bytes, unlike `RoutingTable`/`PeerStore`/
/// `TokenStore`, which are traits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocalIdentity {
    pub id: NodeId,
}

impl LocalIdentity {
    pub const fn new(id: NodeId) -> Self {
        Self { id }
    }

    pub fn random() -> Self {
        Self { id: NodeId::random() }
    }
}
