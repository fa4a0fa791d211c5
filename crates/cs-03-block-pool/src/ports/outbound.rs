//! Driven ports

/// Told when the pool goes from empty to non-empty.
///
/// Called from the pool loop; implementations must not block.
pub trait PoolEventNotifier: Send + Sync {
    fn block_pool_not_empty(&self);
}
