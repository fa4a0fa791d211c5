//! # Consensus Messages
//!
//! Value types exchanged by CS-BFT verifiers and the witness envelope that
//! authenticates them.
//!
//! ## Signing Envelope
//!
//! ```text
//! ┌─────────────────────────────┐
//! │ message fields              │──┐
//! │ witness = None              │  │ bincode
//! └─────────────────────────────┘  ▼
//!                           Keccak256 = content_hash
//!                                  │
//!                     MsgSigner::sign_hash (r ‖ s ‖ v)
//!                                  ▼
//!                   witness = WitMsg { address, sign }
//! ```
//!
//! A receiver recomputes the content hash, recovers the signer address from
//! the signature and compares it to `witness.address`. Verifier membership is
//! checked by the state machine, not here.
//!
//! ## Message Codes
//!
//! | Message | Code |
//! |---------|------|
//! | NewRound | 0x101 |
//! | Proposal | 0x102 |
//! | PreVote | 0x103 |
//! | Vote | 0x104 |
//! | FetchReq | 0x110 |
//! | FetchResp | 0x111 |
//! | SyncBlock | 0x112 |
//! | ReqNewRound | 0x113 |

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::KeyPairSigner;
pub use domain::*;
pub use ports::MsgSigner;
