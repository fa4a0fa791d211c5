//! # Shared Types Crate
//!
//! Identity, hash and block abstractions shared by the consensus core.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: `Address`, `Hash`, `MsgCode` and the
//!   `Block` trait are defined once here.
//! - **Opaque Blocks**: the core only needs `number`, `hash` and
//!   `is_special`; everything else about a block belongs to collaborators.

pub mod codes;
pub mod entities;
pub mod errors;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use codes::MsgCode;
pub use entities::*;
pub use errors::*;
