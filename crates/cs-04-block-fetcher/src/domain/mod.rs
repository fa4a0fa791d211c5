//! Fetcher domain

mod error;
mod table;

pub use error::*;
pub use table::*;
