//! Domain layer for consensus messages
//!
//! - witness: the `(address, signature)` envelope and the signing contract
//! - messages: NewRound, Proposal and Vote
//! - sync: fetch, sync and round-request messages
//! - envelope: the `ConsensusMessage` sum type dispatched by code

mod envelope;
mod error;
mod messages;
mod sync;
mod witness;

pub use envelope::*;
pub use error::*;
pub use messages::*;
pub use sync::*;
pub use witness::*;
