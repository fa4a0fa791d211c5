//! # Block Fetcher
//!
//! Request/response coordinator that pulls a block by hash from a named
//! peer.
//!
//! ## Flow
//!
//! ```text
//!  caller ── Admit(hash) ──▶ fetcher loop ── msg_id ──▶ caller
//!  caller ── FetcherConn::send_fetch_block(FetchReq{msg_id, hash}) ──▶ peer
//!  peer   ── FetchResp{msg_id, block} ──▶ fetch_block_resp ──▶ loop ──▶ caller
//! ```
//!
//! The loop owns the table of outstanding requests:
//!
//! - at most `max_outstanding` (5) requests at once;
//! - one request per block hash, a second caller gets nothing at once;
//! - a request is forgotten after `fetch_timeout` (12 s) or on its answer;
//! - answers with an unknown `msg_id` are dropped as `UnknownRequestId`.

pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

pub use config::FetcherConfig;
pub use domain::{FetchError, FetchResult, FetchTable, MsgIdGenerator};
pub use ports::FetcherConn;
pub use service::{BlockFetcher, FetcherHandle};
