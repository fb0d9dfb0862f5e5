/// Streaming context - the asset cache and the resource manager built together
///
/// Both managers share the same job queue. The host owns the context and
/// passes it wherever streaming is needed; nothing here is global.

use std::sync::{Arc, Mutex};
use crate::asset::AssetCache;
use crate::config::StreamingConfig;
use crate::error::Result;
use crate::graphics_device::GraphicsDevice;
use crate::platform::{FileIo, JobQueue, ThreadPool};
use crate::resource::ResourceManager;

pub struct Context {
    pub assets: AssetCache,
    pub resources: ResourceManager,
}

impl Context {
    /// Build both managers from `config` and the injected capabilities
    pub fn new(
        config: &StreamingConfig,
        io: Arc<dyn FileIo>,
        jobs: Arc<dyn JobQueue>,
        device: Arc<Mutex<dyn GraphicsDevice>>,
    ) -> Result<Self> {
        config.validate()?;
        let assets = AssetCache::new(config, io, Arc::clone(&jobs))?;
        let resources = ResourceManager::new(config, assets.clone(), device, jobs)?;
        Ok(Self { assets, resources })
    }

    /// Same as `new`, running background work on a `ThreadPool` of
    /// `config.worker_threads` workers
    pub fn with_thread_pool(
        config: &StreamingConfig,
        io: Arc<dyn FileIo>,
        device: Arc<Mutex<dyn GraphicsDevice>>,
    ) -> Result<Self> {
        let pool = Arc::new(ThreadPool::new(config.worker_threads)?);
        Self::new(config, io, pool, device)
    }

    /// Load a pack into the catalog. Returns the number of assets added.
    pub fn load_pack(&self, path: &str) -> Result<usize> {
        self.assets.load(path)
    }

    /// Per-frame housekeeping: destroy resources released before `token`
    /// and return staging memory of completed uploads
    pub fn end_frame(&self, token: crate::resource::DestroyToken) -> usize {
        let destroyed = self.resources.release_until(token);
        self.resources.reclaim_staging();
        destroyed
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
