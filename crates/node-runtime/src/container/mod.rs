//! # Node Container
//!
//! Configuration shared by every subsystem a node owns.

pub mod config;

pub use config::{ConfigError, DevnetConfig, NodeConfig};
