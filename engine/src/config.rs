/// Chunk size for one [`crate::pool::MemoryPool`].
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub chunk_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            chunk_size: crate::pool::DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Arena sizing for one [`crate::Engine`]. Read once at construction;
/// chunk sizes only affect how often the underlying pools grow, never
/// correctness.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub entity_pool: PoolConfig,
    pub component_link_pool: PoolConfig,
    pub child_link_pool: PoolConfig,
    pub component_pool: PoolConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            entity_pool: PoolConfig::default(),
            component_link_pool: PoolConfig::default(),
            child_link_pool: PoolConfig::default(),
            component_pool: PoolConfig::default(),
        }
    }
}
