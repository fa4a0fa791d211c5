//! Cross-crate scenarios over the in-memory chain and network.

#[cfg(test)]
mod harness;

mod consensus_flows;
mod fetch_flows;
mod wallet_flows;
