//! Block pool domain

mod error;
mod pool;

pub use error::*;
pub use pool::*;
