use crate::codec::{self, BValue};
use crate::error::EnvelopeError;
use crate::message::envelope::{require_bytes, require_dict, require_int};
use crate::node_id::NodeId;

/// Query kinds the engine knows how to issue and handle. One variant per
/// wire message, kept as a plain tag since bencode queries carry their kind
/// in the `q` string rather than as distinct message structs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Ping,
    FindNode,
    GetPeers,
    AnnouncePeer,
}

impl QueryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryKind::Ping => "ping",
            QueryKind::FindNode => "find_node",
            QueryKind::GetPeers => "get_peers",
            QueryKind::AnnouncePeer => "announce_peer",
        }
    }

    pub fn from_str(s: &[u8]) -> Option<Self> {
        match s {
            b"ping" => Some(QueryKind::Ping),
            b"find_node" => Some(QueryKind::FindNode),
            b"get_peers" => Some(QueryKind::GetPeers),
            b"announce_peer" => Some(QueryKind::AnnouncePeer),
            _ => None,
        }
    }
}

pub struct FindNodeArgs {
    pub id: NodeId,
    pub target: NodeId,
}

pub struct GetPeersArgs {
    pub id: NodeId,
    pub info_hash: NodeId,
}

pub struct AnnouncePeerArgs {
    pub id: NodeId,
    pub info_hash: NodeId,
    pub port: u16,
    pub token: Vec<u8>,
    pub implied_port: bool,
}

/// Every inbound request must carry `a.id` as a 20-byte string; this
/// is validated once and reused by each per-kind arg parser below.
pub fn require_sender_id(a: &BValue) -> Result<NodeId, EnvelopeError> {
    let id_bytes = require_bytes(a, "id")?;
    NodeId::from_slice(id_bytes).ok_or(EnvelopeError::BadKeyType {
        key: "id",
        expected: "20-byte string",
    })
}

pub fn parse_find_node_args(a: &BValue) -> Result<FindNodeArgs, EnvelopeError> {
    let id = require_sender_id(a)?;
    let target_bytes = require_bytes(a, "target")?;
    let target = NodeId::from_slice(target_bytes).ok_or(EnvelopeError::BadKeyType {
        key: "target",
        expected: "20-byte string",
    })?;
    Ok(FindNodeArgs { id, target })
}

pub fn parse_get_peers_args(a: &BValue) -> Result<GetPeersArgs, EnvelopeError> {
    let id = require_sender_id(a)?;
    let info_hash_bytes = require_bytes(a, "info_hash")?;
    let info_hash = NodeId::from_slice(info_hash_bytes).ok_or(EnvelopeError::BadKeyType {
        key: "info_hash",
        expected: "20-byte string",
    })?;
    Ok(GetPeersArgs { id, info_hash })
}

pub fn parse_announce_peer_args(a: &BValue) -> Result<AnnouncePeerArgs, EnvelopeError> {
    let id = require_sender_id(a)?;
    let info_hash_bytes = require_bytes(a, "info_hash")?;
    let info_hash = NodeId::from_slice(info_hash_bytes).ok_or(EnvelopeError::BadKeyType {
        key: "info_hash",
        expected: "20-byte string",
    })?;
    let port = require_int(a, "port")?;
    let port = u16::try_from(port).map_err(|_| EnvelopeError::BadKeyType {
        key: "port",
        expected: "u16",
    })?;
    let token = require_bytes(a, "token")?.to_vec();
    let implied_port = a
        .get("implied_port")
        .and_then(|v| v.as_int())
        .unwrap_or(0)
        != 0;
    Ok(AnnouncePeerArgs {
        id,
        info_hash,
        port,
        token,
        implied_port,
    })
}

/// Builds the bencoded dict for an outbound query: `{t, y: "q", q, a}`.
pub fn build_query(t: &[u8], kind: QueryKind, a: BValue) -> BValue {
    codec::dict([
        ("t", BValue::Bytes(t.to_vec())),
        ("y", BValue::Bytes(b"q".to_vec())),
        ("q", BValue::Bytes(kind.as_str().as_bytes().to_vec())),
        ("a", a),
    ])
}

/// Builds the bencoded dict for a response: `{t, y: "r", r}`.
pub fn build_response(t: &[u8], r: BValue) -> BValue {
    codec::dict([
        ("t", BValue::Bytes(t.to_vec())),
        ("y", BValue::Bytes(b"r".to_vec())),
        ("r", r),
    ])
}

/// Builds the bencoded dict for an error reply: `{t, y: "e", e: [code, msg]}`.
/// The engine only ever emits code 203 (generic protocol error).
pub fn build_error(t: &[u8], code: i64, message: &str) -> BValue {
    codec::dict([
        ("t", BValue::Bytes(t.to_vec())),
        ("y", BValue::Bytes(b"e".to_vec())),
        (
            "e",
            BValue::List(vec![
                BValue::Int(code),
                BValue::Bytes(message.as_bytes().to_vec()),
            ]),
        ),
    ])
}

pub const ERROR_PROTOCOL: i64 = 203;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_kind_round_trips_through_strings() {
        for kind in [
            QueryKind::Ping,
            QueryKind::FindNode,
            QueryKind::GetPeers,
            QueryKind::AnnouncePeer,
        ] {
            assert_eq!(QueryKind::from_str(kind.as_str().as_bytes()), Some(kind));
        }
    }

    #[test]
    fn announce_peer_args_default_implied_port_to_false() {
        let a = codec::dict([
            ("id", BValue::Bytes(vec![1; 20])),
            ("info_hash", BValue::Bytes(vec![2; 20])),
            ("port", BValue::Int(6881)),
            ("token", BValue::Bytes(b"tok".to_vec())),
        ]);
        let args = parse_announce_peer_args(&a).unwrap();
        assert!(!args.implied_port);
        assert_eq!(args.port, 6881);
    }

    #[test]
    fn announce_peer_args_honors_implied_port() {
        let a = codec::dict([
            ("id", BValue::Bytes(vec![1; 20])),
            ("info_hash", BValue::Bytes(vec![2; 20])),
            ("port", BValue::Int(6881)),
            ("token", BValue::Bytes(b"tok".to_vec())),
            ("implied_port", BValue::Int(1)),
        ]);
        let args = parse_announce_peer_args(&a).unwrap();
        assert!(args.implied_port);
    }

    #[test]
    fn find_node_args_rejects_short_id() {
        let a = codec::dict([
            ("id", BValue::Bytes(vec![1; 19])),
            ("target", BValue::Bytes(vec![2; 20])),
        ]);
        assert!(parse_find_node_args(&a).is_err());
    }
}
