//! Ports for the block fetcher

pub mod outbound;

pub use outbound::*;
