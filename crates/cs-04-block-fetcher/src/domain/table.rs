//! Outstanding request table and request ids.

use super::{FetchError, FetchResult};
use shared_types::{Address, Hash};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Request ids: wall-clock nanoseconds, forced strictly increasing.
#[derive(Debug, Default)]
pub struct MsgIdGenerator {
    last: u64,
}

impl MsgIdGenerator {
    pub fn next_id(&mut self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        self.last = now.max(self.last.saturating_add(1));
        self.last
    }
}

/// One outstanding request; `W` is whatever the caller waits on.
#[derive(Debug)]
pub struct Outstanding<W> {
    pub from: Address,
    pub block_hash: Hash,
    pub waiter: W,
}

/// Requests in flight keyed by `msg_id`.
#[derive(Debug)]
pub struct FetchTable<W> {
    max_outstanding: usize,
    requests: HashMap<u64, Outstanding<W>>,
}

impl<W> FetchTable<W> {
    pub fn new(max_outstanding: usize) -> Self {
        Self {
            max_outstanding,
            requests: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn is_fetching(&self, hash: &Hash) -> bool {
        self.requests.values().any(|r| &r.block_hash == hash)
    }

    /// Register a request unless the hash is in flight or the table is full.
    pub fn admit(&mut self, msg_id: u64, from: Address, block_hash: Hash, waiter: W) -> FetchResult<()> {
        if self.is_fetching(&block_hash) {
            return Err(FetchError::DuplicateFetch);
        }
        if self.requests.len() >= self.max_outstanding {
            return Err(FetchError::TooManyFetches(self.requests.len()));
        }
        self.requests.insert(
            msg_id,
            Outstanding {
                from,
                block_hash,
                waiter,
            },
        );
        Ok(())
    }

    pub fn get(&self, msg_id: u64) -> Option<&Outstanding<W>> {
        self.requests.get(&msg_id)
    }

    pub fn remove(&mut self, msg_id: u64) -> Option<Outstanding<W>> {
        self.requests.remove(&msg_id)
    }

    /// Drop requests whose waiter is gone; returns how many were dropped.
    pub fn prune(&mut self, mut abandoned: impl FnMut(&W) -> bool) -> usize {
        let before = self.requests.len();
        self.requests.retain(|_, r| !abandoned(&r.waiter));
        before - self.requests.len()
    }
}
