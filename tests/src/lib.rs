//! # CS-BFT Test Suite
//!
//! Scenarios that need more than one crate at a time.
//!
//! ```text
//! tests/src/
//! ├── integration/
//! │   ├── harness.rs          # Devnet builders, commit bookkeeping
//! │   ├── consensus_flows.rs  # Happy path, Byzantine and silent verifiers, rotation
//! │   ├── fetch_flows.rs      # Fetcher over the in-memory network
//! │   └── wallet_flows.rs     # Wallet files and wallet-backed signers
//! benches/
//! └── message_benchmarks.rs   # Signing and witness checks
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p cs-tests
//! cargo test -p cs-tests integration::consensus_flows
//! cargo bench -p cs-tests
//! ```

pub mod integration;
