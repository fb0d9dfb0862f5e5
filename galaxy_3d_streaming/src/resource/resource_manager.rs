/// Resource manager: owns every GPU resource and their lifetimes.
///
/// Resources live in a generational slot map addressed by typed `Handle<T>`s.
/// A fixed pool of resource slots bounds how many can exist at once; when it
/// is exhausted `create` returns `None` and a warning is logged once until
/// creation succeeds again.
///
/// Destruction is deferred: `release` queues the resource behind the current
/// destroy token and `release_until` destroys everything queued before a
/// token once the host knows the GPU is done with those frames.

use std::any::type_name;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use slotmap::{new_key_type, SlotMap};
use crate::asset::AssetCache;
use crate::config::StreamingConfig;
use crate::error::Result;
use crate::graphics_device::GraphicsDevice;
use crate::log::LogLatch;
use crate::platform::JobQueue;
use super::destroy_queue::{DeferredDestroyQueue, DestroyToken};
use super::material::{Material, MaterialParams};
use super::resource::{Resource, ResourceContext};
use super::slot_pool::{ResourceSlotPool, SlotRange};
use super::transfer::TransferArena;

new_key_type! {
    /// Key of a resource in the manager
    pub struct ResourceKey;
}

// ===== HANDLE =====

/// Typed reference to a managed resource
pub struct Handle<T> {
    key: ResourceKey,
    resource: Arc<T>,
}

impl<T> Handle<T> {
    pub fn key(&self) -> ResourceKey {
        self.key
    }

    pub fn resource(&self) -> &Arc<T> {
        &self.resource
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self { key: self.key, resource: Arc::clone(&self.resource) }
    }
}

impl<T> Deref for Handle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.resource
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle<{}>({:?})", type_name::<T>(), self.key)
    }
}

// ===== ENTRIES =====

/// Type-erased view used by deferred destruction
trait ManagedResource: Send + Sync {
    fn destroy(&self, ctx: &ResourceContext);
    fn kind(&self) -> &'static str;
}

impl<R: Resource> ManagedResource for R {
    fn destroy(&self, ctx: &ResourceContext) {
        Resource::destroy(self, ctx);
    }

    fn kind(&self) -> &'static str {
        R::KIND
    }
}

struct Entry {
    resource: Arc<dyn ManagedResource>,
    slots: SlotRange,
}

// ===== RESOURCE MANAGER =====

pub struct ResourceManager {
    ctx: Arc<ResourceContext>,
    slots: ResourceSlotPool,
    entries: Mutex<SlotMap<ResourceKey, Entry>>,
    destroy_queue: Mutex<DeferredDestroyQueue<ResourceKey>>,
    pressure: LogLatch,
}

impl ResourceManager {
    pub fn new(
        config: &StreamingConfig,
        assets: AssetCache,
        device: Arc<Mutex<dyn GraphicsDevice>>,
        jobs: Arc<dyn JobQueue>,
    ) -> Result<Self> {
        config.validate()?;
        crate::engine_info!("galaxy3d::ResourceManager",
            "Resource manager ready: {} slots of {} bytes, staging {}..{} bytes",
            config.resource_slot_count, config.resource_slot_size,
            config.transfer_floor_size, config.transfer_max_size);

        Ok(Self {
            ctx: Arc::new(ResourceContext::new(config, assets, device, jobs)),
            slots: ResourceSlotPool::new(config.resource_slot_size, config.resource_slot_count),
            entries: Mutex::new(SlotMap::with_key()),
            destroy_queue: Mutex::new(DeferredDestroyQueue::new(config.destroy_queue_capacity)),
            pressure: LogLatch::new(),
        })
    }

    fn lock_entries(&self) -> MutexGuard<'_, SlotMap<ResourceKey, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_queue(&self) -> MutexGuard<'_, DeferredDestroyQueue<ResourceKey>> {
        self.destroy_queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ===== CREATION =====

    /// Create a resource.
    ///
    /// `Ok(None)` when the resource slot pool is exhausted. Errors come from
    /// the descriptor (wrong asset kind, bad in-memory data) or from a
    /// synchronous upload.
    pub fn create<T: Resource>(&self, desc: T::Desc) -> Result<Option<Handle<T>>> {
        let Some(slots) = self.slots.acquire(T::footprint()) else {
            if self.pressure.trip() {
                crate::engine_warn!("galaxy3d::ResourceManager",
                    "Resource slots exhausted: cannot create {} ({} of {} slots in use)",
                    T::KIND, self.slots.used(), self.slots.capacity());
            }
            return Ok(None);
        };

        let resource = match T::create(&self.ctx, desc) {
            Ok(resource) => Arc::new(resource),
            Err(err) => {
                self.slots.release(slots);
                return Err(err);
            }
        };
        self.pressure.reset();

        let entry = Entry { resource: resource.clone(), slots };
        let key = self.lock_entries().insert(entry);
        Ok(Some(Handle { key, resource }))
    }

    /// Advance loading of `handle`. True once it is usable. Never blocks.
    pub fn request<T: Resource>(&self, handle: &Handle<T>) -> bool {
        handle.resource.request(&self.ctx)
    }

    /// Re-upload material parameters. Caller-synchronised with rendering.
    pub fn update_material(&self, handle: &Handle<Material>, params: MaterialParams) -> Result<()> {
        handle.resource.update_params(&self.ctx, params)
    }

    // ===== DESTRUCTION =====

    /// Queue `handle` for destruction after the current token.
    /// Returns its position in the destroy sequence.
    pub fn release<T: Resource>(&self, handle: Handle<T>) -> DestroyToken {
        handle.resource.header().retire();
        self.lock_queue().push(handle.key)
    }

    /// Token covering every release issued so far
    pub fn token(&self) -> DestroyToken {
        self.lock_queue().token()
    }

    /// Destroy every resource released before `token`. Returns how many were destroyed.
    pub fn release_until(&self, token: DestroyToken) -> usize {
        let mut keys = Vec::new();
        self.lock_queue().release_until(token, |key| keys.push(key));

        let destroyed = keys.into_iter().filter(|key| self.destroy_key(*key)).count();
        self.ctx.transfer.reclaim();
        destroyed
    }

    /// Destroy `handle` now. Returns false if it was already destroyed.
    pub fn destroy<T: Resource>(&self, handle: Handle<T>) -> bool {
        self.destroy_key(handle.key)
    }

    fn destroy_key(&self, key: ResourceKey) -> bool {
        let Some(entry) = self.lock_entries().remove(key) else {
            return false;
        };
        crate::engine_trace!("galaxy3d::ResourceManager",
            "Destroying {} {:?}", entry.resource.kind(), key);
        entry.resource.destroy(&self.ctx);
        self.slots.release(entry.slots);
        true
    }

    // ===== QUERIES =====

    /// Live resources, released-but-pending ones included
    pub fn resource_count(&self) -> usize {
        self.lock_entries().len()
    }

    /// Releases not yet covered by `release_until`
    pub fn pending_destroy_count(&self) -> usize {
        self.lock_queue().len()
    }

    pub fn slots_in_use(&self) -> usize {
        self.slots.used()
    }

    /// Return staging memory of completed uploads; call once per frame
    pub fn reclaim_staging(&self) -> usize {
        self.ctx.transfer.reclaim()
    }

    pub fn context(&self) -> &Arc<ResourceContext> {
        &self.ctx
    }

    pub fn assets(&self) -> &AssetCache {
        &self.ctx.assets
    }

    pub fn transfer(&self) -> &TransferArena {
        &self.ctx.transfer
    }
}

#[cfg(test)]
#[path = "resource_manager_tests.rs"]
mod tests;
