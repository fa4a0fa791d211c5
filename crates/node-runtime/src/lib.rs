//! # Node Runtime Library
//!
//! Wires the CS-BFT subsystems of one verifier into a [`node::CsBftNode`] and
//! runs a cluster of them as a local [`devnet::Devnet`]. The `node-runtime`
//! binary boots that devnet.
//!
//! - `adapters/` - in-memory chain, network and the development block type
//! - `container/` - node configuration
//! - `node/` - per-node wiring and P2P dispatch
//! - `devnet` - multi-node cluster with block production

#![allow(clippy::type_complexity)]

pub mod adapters;
pub mod container;
pub mod devnet;
pub mod node;

pub use container::{ConfigError, DevnetConfig, NodeConfig};
pub use devnet::Devnet;
pub use node::{CsBftNode, NodeDependencies, NodeError, NodeResult, PeerSender};
