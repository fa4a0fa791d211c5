//! # Adapter Implementations
//!
//! Concrete implementations of the outbound ports of the subsystems, for a
//! single-process devnet:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     OUTER LAYER (Adapters)                          │
//! │   InMemoryChain, NetworkEndpoint, PoolNotifierBridge               │
//! │                              ↑ implements ↑                         │
//! │                     MIDDLE LAYER (Ports)                            │
//! │   ChainReader, Validator, MsgSender, FetcherConn, PeerSender,       │
//! │   PoolEventNotifier, AddressInfoReader                              │
//! │                              ↑ uses ↑                               │
//! │                     INNER LAYER (Domain)                            │
//! │   BftState, PoolState, FetchTable, wallet keystore                  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

pub mod block;
pub mod chain;
pub mod network;
pub mod notifier;

pub use block::DevBlock;
pub use chain::InMemoryChain;
pub use network::{Envelope, InMemoryNetwork, NetworkEndpoint};
pub use notifier::PoolNotifierBridge;
