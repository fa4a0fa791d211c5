//! Ports for the BFT state machine

pub mod outbound;

pub use outbound::*;
