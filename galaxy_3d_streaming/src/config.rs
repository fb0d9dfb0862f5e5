/// Streaming configuration
///
/// Sizes of the fixed arenas owned by the asset cache and the resource manager.
/// Everything here is decided once at startup; none of the arenas resize past
/// the limits given here.

use std::time::Duration;
use crate::error::{Error, Result};

/// Streaming core configuration
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Bytes in the asset cache slab
    pub slab_size: u64,
    /// Bytes per resource slot
    pub resource_slot_size: usize,
    /// Number of resource slots
    pub resource_slot_count: usize,
    /// Staging memory kept alive even when idle, and the minimum backing buffer size
    pub transfer_floor_size: u64,
    /// Upper bound on total staging memory
    pub transfer_max_size: u64,
    /// Capacity of the deferred-destroy ring
    pub destroy_queue_capacity: usize,
    /// Timeout for synchronous fence waits
    pub fence_timeout: Duration,
    /// Worker threads for `ThreadPool`
    pub worker_threads: usize,
    /// Outstanding barriers above which the cache warns about imbalance
    pub barrier_warning_threshold: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            slab_size: 64 * 1024 * 1024,
            resource_slot_size: 256,
            resource_slot_count: 4096,
            transfer_floor_size: 4 * 1024 * 1024,
            transfer_max_size: 64 * 1024 * 1024,
            destroy_queue_capacity: 4096,
            fence_timeout: Duration::from_secs(2),
            worker_threads: std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1).max(1))
                .unwrap_or(2),
            barrier_warning_threshold: 8,
        }
    }
}

impl StreamingConfig {
    /// Check the configuration for values the managers cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.slab_size == 0 {
            return Err(Error::InitializationFailed("slab_size must be non-zero".to_string()));
        }
        if self.slab_size > usize::MAX as u64 {
            return Err(Error::InitializationFailed(format!(
                "slab_size {} does not fit in addressable memory", self.slab_size
            )));
        }
        if self.resource_slot_size == 0 || self.resource_slot_count == 0 {
            return Err(Error::InitializationFailed(
                "resource slot size and count must be non-zero".to_string(),
            ));
        }
        if self.transfer_floor_size == 0 {
            return Err(Error::InitializationFailed(
                "transfer_floor_size must be non-zero".to_string(),
            ));
        }
        if self.transfer_max_size < self.transfer_floor_size {
            return Err(Error::InitializationFailed(format!(
                "transfer_max_size ({}) is smaller than transfer_floor_size ({})",
                self.transfer_max_size, self.transfer_floor_size
            )));
        }
        if self.destroy_queue_capacity == 0 {
            return Err(Error::InitializationFailed(
                "destroy_queue_capacity must be non-zero".to_string(),
            ));
        }
        if self.worker_threads == 0 {
            return Err(Error::InitializationFailed("worker_threads must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Small arenas for tests and tools
    pub fn compact() -> Self {
        Self {
            slab_size: 1024 * 1024,
            resource_slot_size: 256,
            resource_slot_count: 256,
            transfer_floor_size: 64 * 1024,
            transfer_max_size: 1024 * 1024,
            destroy_queue_capacity: 256,
            fence_timeout: Duration::from_millis(500),
            worker_threads: 2,
            barrier_warning_threshold: 8,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
