use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Instant;

use crate::node_id::NodeId;

/// A DHT participant. `id` may be absent before the first successful
/// contact (e.g. a freshly-added bootstrap node).
#[derive(Clone, Debug)]
pub struct Contact {
    pub id: Option<NodeId>,
    pub network: Network,
    pub addr: SocketAddr,
    /// Bookkeeping for the reference in-memory routing table only; not
    /// part of the wire protocol.
    pub last_seen: Option<Instant>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Network {
    Udp,
    Udp4,
    Udp6,
}

impl Contact {
    pub fn new(id: Option<NodeId>, addr: SocketAddr) -> Self {
        let network = match addr {
            SocketAddr::V4(_) => Network::Udp4,
            SocketAddr::V6(_) => Network::Udp6,
        };
        Self {
            id,
            network,
            addr,
            last_seen: None,
        }
    }

    pub fn addr_key(&self) -> String {
        self.addr.to_string()
    }
}

/// A peer announced for an info-hash, with the token it was discovered under.
#[derive(Clone, Debug)]
pub struct Peer {
    pub ip: IpAddr,
    pub port: u16,
    pub token: Vec<u8>,
}

/// Decodes a BEP-5 compact node-info blob (20-byte id + 4-byte ipv4 + 2-byte
/// big-endian port) into individual 26-byte chunks.
pub fn decode_compact_nodes(blob: &[u8]) -> Option<Vec<(NodeId, SocketAddr)>> {
    if blob.len() % 26 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(blob.len() / 26);
    for chunk in blob.chunks_exact(26) {
        let id = NodeId::from_slice(&chunk[0..20])?;
        let ip = Ipv4Addr::new(chunk[20], chunk[21], chunk[22], chunk[23]);
        let port = u16::from_be_bytes([chunk[24], chunk[25]]);
        out.push((id, SocketAddr::new(IpAddr::V4(ip), port)));
    }
    Some(out)
}

/// Encodes a contact as a 26-byte compact node-info blob. Returns `None` for
/// contacts without a known id or with a non-IPv4 address (BEP-5's compact
/// encoding has no IPv6 form).
pub fn encode_compact_node(id: NodeId, addr: SocketAddr) -> Option<[u8; 26]> {
    let SocketAddr::V4(addr) = addr else {
        return None;
    };
    let mut out = [0u8; 26];
    out[0..20].copy_from_slice(id.as_bytes());
    out[20..24].copy_from_slice(&addr.ip().octets());
    out[24..26].copy_from_slice(&addr.port().to_be_bytes());
    Some(out)
}

/// Decodes a BEP-5 compact peer-info blob (4-byte ipv4 + 2-byte big-endian
/// port, 6 bytes total) into individual peers, given the token they were
/// received alongside.
pub fn decode_compact_peers(blob: &[u8], token: &[u8]) -> Option<Vec<Peer>> {
    if blob.len() % 6 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(blob.len() / 6);
    for chunk in blob.chunks_exact(6) {
        let ip = Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]);
        let port = u16::from_be_bytes([chunk[4], chunk[5]]);
        out.push(Peer {
            ip: IpAddr::V4(ip),
            port,
            token: token.to_vec(),
        });
    }
    Some(out)
}

pub fn encode_compact_peer(ip: Ipv4Addr, port: u16) -> [u8; 6] {
    let mut out = [0u8; 6];
    out[0..4].copy_from_slice(&ip.octets());
    out[4..6].copy_from_slice(&port.to_be_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_node_round_trips() {
        let id = NodeId::random();
        let addr: SocketAddr = "192.0.2.5:7777".parse().unwrap();
        let blob = encode_compact_node(id, addr).unwrap();
        let decoded = decode_compact_nodes(&blob).unwrap();
        assert_eq!(decoded, vec![(id, addr)]);
    }

    #[test]
    fn compact_nodes_rejects_non_multiple_of_26() {
        assert!(decode_compact_nodes(&[0u8; 27]).is_none());
        assert!(decode_compact_nodes(&[0u8; 52]).is_some());
    }

    #[test]
    fn compact_peers_round_trips() {
        let ip = Ipv4Addr::new(192, 0, 2, 5);
        let blob = encode_compact_peer(ip, 7777);
        let peers = decode_compact_peers(&blob, b"tok").unwrap();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].ip, IpAddr::V4(ip));
        assert_eq!(peers[0].port, 7777);
        assert_eq!(peers[0].token, b"tok");
    }

    #[test]
    fn compact_peers_rejects_non_multiple_of_6() {
        assert!(decode_compact_peers(&[0u8; 7], b"t").is_none());
    }
}
