//! Centralized configuration for the connection registry.

/// Registry-level configuration.
pub struct PoolConfig;

impl PoolConfig {
    /// Name reported by the process-wide pool in logs and stats.
    pub const GLOBAL_POOL_NAME: &'static str = "global";
    /// Name given to pools built without an explicit name.
    pub const DEFAULT_POOL_NAME: &'static str = "pool";
    /// Initial map capacity when none is requested.
    pub const DEFAULT_CAPACITY: usize = 16;
}
