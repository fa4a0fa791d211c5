//! Ports for the soft wallet

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
