//! Configuration for StrataKV
//!
//! Centralized configuration with sensible defaults.

use serde::{Deserialize, Serialize};

/// Main configuration for a MemStore instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Slab Allocator Configuration
    // -------------------------------------------------------------------------
    /// Enable the slab allocator for non-upsert writes
    pub use_slab_allocator: bool,

    /// Size of each slab chunk (in bytes)
    pub slab_chunk_size: usize,

    /// Largest single allocation the slab will serve; larger cells keep
    /// their own buffer
    pub slab_max_alloc: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            use_slab_allocator: true,
            slab_chunk_size: 2 * 1024 * 1024, // 2 MB
            slab_max_alloc: 256 * 1024,       // 256 KB
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Enable or disable the slab allocator
    pub fn use_slab_allocator(mut self, enabled: bool) -> Self {
        self.config.use_slab_allocator = enabled;
        self
    }

    /// Set the slab chunk size in bytes
    pub fn slab_chunk_size(mut self, bytes: usize) -> Self {
        self.config.slab_chunk_size = bytes;
        self
    }

    /// Set the maximum single slab allocation in bytes
    pub fn slab_max_alloc(mut self, bytes: usize) -> Self {
        self.config.slab_max_alloc = bytes;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
