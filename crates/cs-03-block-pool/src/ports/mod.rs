//! Ports for the block pool

pub mod outbound;

pub use outbound::*;
