//! Protocol engine for a BitTorrent Mainline DHT (BEP-5) node.
//!
//! This crate implements the three tightly coupled subsystems that make up
//! the hard part of a Kademlia-style DHT node: the outstanding-transaction
//! registry ([`transaction`]), the bencoded message dispatcher
//! ([`message`], [`handler`]), and the recursive node-lookup driver
//! ([`lookup`]) that discovers peers for a given info-hash. The routing
//! table, peer store, token issuer, and UDP socket are external
//! collaborators, expressed here as traits in [`routing`] — production
//! embedders supply their own implementations; [`memory`] carries
//! lightweight in-memory ones for tests and small deployments.

pub mod callbacks;
pub mod codec;
pub mod config;
pub mod contact;
pub mod context;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod handler;
pub mod identity;
pub mod lookup;
pub mod memory;
pub mod message;
pub mod metrics;
pub mod node_id;
pub mod routing;
pub mod runner;
pub mod transaction;

pub use callbacks::Callbacks;
pub use config::Config;
pub use contact::{Contact, Network, Peer};
pub use engine::{Engine, EngineBuilder};
pub use error::EngineError;
pub use identity::LocalIdentity;
pub use node_id::NodeId;
pub use routing::{PeerStore, RoutingTable, TokenStore};
