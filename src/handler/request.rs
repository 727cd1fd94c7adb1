//! Request handler: inbound `y = "q"` messages. Validates `q`/`a`/`a.id`
//! (replying 203 echoing `t` on failure, since the envelope parser leaves
//! that validation to us — see [`crate::message::envelope`]), produces
//! replies for `ping`/`find_node`/`get_peers`/`announce_peer`, and — for
//! every request that isn't dropped — records the sender in the routing
//! table.

use std::net::SocketAddr;

use tracing::warn;

use crate::codec::{self, BValue};
use crate::contact::{encode_compact_peer, Contact};
use crate::context::Context;
use crate::message::query::{self, QueryKind};
use crate::metrics;
use crate::node_id::NodeId;
use crate::routing::{PeerStore, RoutingTable, TokenStore};

pub async fn handle_request<R, P, T>(
    ctx: &Context<R, P, T>,
    t: &[u8],
    q: Option<&[u8]>,
    a: Option<&BValue>,
    from: SocketAddr,
) where
    R: RoutingTable,
    P: PeerStore,
    T: TokenStore,
{
    // `q: string`, `a: map`. Per §4.5/§7 either one missing or
    // wrongly-typed is a request-argument error: reply 203 echoing `t`.
    // `a`'s shape as a map doesn't need its own check here — `BValue::get`
    // returns `None` for any non-dict value, so a non-map `a` fails the
    // `a.id` lookup just below exactly like a genuinely missing `a` would.
    let (Some(q), Some(a)) = (q, a) else {
        reply_error(ctx, t, from).await;
        return;
    };

    // Validate `a.id` is a 20-byte string. A malformed id is a
    // request-argument error: reply 203 echoing `t`.
    let sender_id = match query::require_sender_id(a) {
        Ok(id) => id,
        Err(_) => {
            reply_error(ctx, t, from).await;
            return;
        }
    };

    // Self-loop: drop silently, no reply, no routing-table update.
    if sender_id == ctx.local.id {
        return;
    }

    let Some(kind) = QueryKind::from_str(q) else {
        // Unknown `q`: drop silently.
        return;
    };

    let handled = match kind {
        QueryKind::Ping => handle_ping(ctx, t, from).await,
        QueryKind::FindNode => handle_find_node(ctx, t, a, from).await,
        QueryKind::GetPeers => handle_get_peers(ctx, t, a, from).await,
        QueryKind::AnnouncePeer => handle_announce_peer(ctx, t, a, from).await,
    };

    if handled {
        ctx.routing.insert(Contact::new(Some(sender_id), from));
        metrics::record_request_handled();
    }
}

async fn handle_ping<R, P, T>(ctx: &Context<R, P, T>, t: &[u8], from: SocketAddr) -> bool
where
    R: RoutingTable,
    P: PeerStore,
    T: TokenStore,
{
    let r = codec::dict([("id", local_id_bvalue(ctx))]);
    reply(ctx, t, r, from).await;
    true
}

async fn handle_find_node<R, P, T>(
    ctx: &Context<R, P, T>,
    t: &[u8],
    a: &BValue,
    from: SocketAddr,
) -> bool
where
    R: RoutingTable,
    P: PeerStore,
    T: TokenStore,
{
    let args = match query::parse_find_node_args(a) {
        Ok(args) => args,
        Err(_) => {
            reply_error(ctx, t, from).await;
            return false;
        }
    };
    let target = args.target;

    // If the exact node is known, reply with its compact info directly;
    // otherwise reply with the K closest nodes.
    let nodes_blob: Vec<u8> = match ctx.routing.get_node(target) {
        Some(contact) => contact
            .id
            .and_then(|id| crate::contact::encode_compact_node(id, contact.addr))
            .map(|compact| compact.to_vec())
            .unwrap_or_else(|| closest_compact_blob(ctx, target)),
        None => closest_compact_blob(ctx, target),
    };

    let r = codec::dict([
        ("id", local_id_bvalue(ctx)),
        ("nodes", BValue::Bytes(nodes_blob)),
    ]);
    reply(ctx, t, r, from).await;
    true
}

async fn handle_get_peers<R, P, T>(
    ctx: &Context<R, P, T>,
    t: &[u8],
    a: &BValue,
    from: SocketAddr,
) -> bool
where
    R: RoutingTable,
    P: PeerStore,
    T: TokenStore,
{
    let args = match query::parse_get_peers_args(a) {
        Ok(args) => args,
        Err(_) => {
            reply_error(ctx, t, from).await;
            return false;
        }
    };
    let info_hash = args.info_hash;

    let token = ctx.tokens.token_for(from);
    let peers = ctx.peers.get_peers(info_hash, ctx.config.k);

    let r = if !peers.is_empty() {
        let values = peers
            .iter()
            .filter_map(|p| match p.ip {
                std::net::IpAddr::V4(ip) => {
                    Some(BValue::Bytes(encode_compact_peer(ip, p.port).to_vec()))
                }
                std::net::IpAddr::V6(_) => None,
            })
            .collect();
        codec::dict([
            ("id", local_id_bvalue(ctx)),
            ("token", BValue::Bytes(token)),
            ("values", BValue::List(values)),
        ])
    } else {
        codec::dict([
            ("id", local_id_bvalue(ctx)),
            ("token", BValue::Bytes(token)),
            ("nodes", BValue::Bytes(closest_compact_blob(ctx, info_hash))),
        ])
    };

    reply(ctx, t, r, from).await;

    if let Some(hook) = &ctx.callbacks.on_get_peers {
        hook(info_hash, from.ip(), from.port());
    }

    true
}

async fn handle_announce_peer<R, P, T>(
    ctx: &Context<R, P, T>,
    t: &[u8],
    a: &BValue,
    from: SocketAddr,
) -> bool
where
    R: RoutingTable,
    P: PeerStore,
    T: TokenStore,
{
    let args = match query::parse_announce_peer_args(a) {
        Ok(args) => args,
        Err(_) => {
            reply_error(ctx, t, from).await;
            return false;
        }
    };

    // Invalid token: drop silently, no reply, no store insert — do not leak
    // token state.
    if !ctx.tokens.check(from, &args.token) {
        return false;
    }

    let port = if args.implied_port {
        from.port()
    } else {
        args.port
    };

    ctx.peers.insert(
        args.info_hash,
        crate::contact::Peer {
            ip: from.ip(),
            port,
            token: args.token,
        },
    );

    if let Some(hook) = &ctx.callbacks.on_announce_peer {
        hook(args.info_hash, from.ip(), port);
    }

    true
}

fn local_id_bvalue<R: RoutingTable, P: PeerStore, T: TokenStore>(ctx: &Context<R, P, T>) -> BValue {
    BValue::Bytes(ctx.local.id.as_bytes().to_vec())
}

fn closest_compact_blob<R: RoutingTable, P: PeerStore, T: TokenStore>(
    ctx: &Context<R, P, T>,
    target: NodeId,
) -> Vec<u8> {
    ctx.routing
        .closest_compact_info(target, ctx.config.k)
        .into_iter()
        .flatten()
        .collect()
}

async fn reply<R: RoutingTable, P: PeerStore, T: TokenStore>(
    ctx: &Context<R, P, T>,
    t: &[u8],
    r: BValue,
    to: SocketAddr,
) {
    send(ctx, query::build_response(t, r), to).await;
}

async fn reply_error<R: RoutingTable, P: PeerStore, T: TokenStore>(
    ctx: &Context<R, P, T>,
    t: &[u8],
    to: SocketAddr,
) {
    send(
        ctx,
        query::build_error(t, query::ERROR_PROTOCOL, "invalid arguments"),
        to,
    )
    .await;
}

async fn send<R: RoutingTable, P: PeerStore, T: TokenStore>(
    ctx: &Context<R, P, T>,
    msg: BValue,
    to: SocketAddr,
) {
    match codec::encode(&msg) {
        Ok(bytes) => {
            if let Err(e) = ctx.socket.send_to(&bytes, to).await {
                warn!(error = %e, peer = %to, "failed to send reply");
            }
        }
        Err(e) => warn!(error = %e, "failed to encode reply"),
    }
}
