//! Block pool configuration

/// Block pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Capacity of the command queue; a full queue blocks the caller.
    pub channel_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 5,
        }
    }
}

impl PoolConfig {
    pub fn for_testing() -> Self {
        Self::default()
    }
}
