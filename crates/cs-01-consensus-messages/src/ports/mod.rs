//! Ports for consensus messages

pub mod outbound;

pub use outbound::*;
