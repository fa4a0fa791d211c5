//! Adapters binding the state machine ports to the pool and fetcher actors

mod fetcher;
mod notifier;
mod pool;
