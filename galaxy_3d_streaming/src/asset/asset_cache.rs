/// Asset cache: catalog of loaded packs plus a slab of streamed payloads.
///
/// `request()` never blocks. A miss reserves a slab slot, binds it to the asset
/// and hands the read (or block decompression) to the job queue; the caller
/// polls again on a later frame. Loaded payloads are handed out as
/// `AssetBytes` guards which pin their slot until dropped.

use std::cell::UnsafeCell;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use rustc_hash::FxHashMap;
use crate::asset::{AssetId, AssetRef, PayloadEncoding, SlabAllocator, SlabUsage, SlotId, SlotState};
use crate::config::StreamingConfig;
use crate::error::{Error, Result};
use crate::log::LogLatch;
use crate::pack::{decompress_block, PackReader, BLOCK_SIZE};
use crate::platform::{FileIo, JobQueue};

// ============================================================================
// Slab storage
// ============================================================================

/// Backing bytes of the slab.
///
/// Slot ranges are disjoint; the slab state decides who may touch a range:
/// the single load job while the slot is `Loading`, shared readers while it
/// is `Loaded` and pinned.
struct SlabStorage {
    bytes: Box<[UnsafeCell<u8>]>,
}

// SAFETY: access to each range is serialised through the slab state machine
// described above, which is only changed under the cache mutex.
unsafe impl Sync for SlabStorage {}

impl SlabStorage {
    fn new(size: usize) -> Self {
        Self { bytes: (0..size).map(|_| UnsafeCell::new(0)).collect() }
    }

    /// # Safety
    ///
    /// No writer may hold the range for the lifetime of the slice.
    unsafe fn slice(&self, offset: usize, len: usize) -> &[u8] {
        debug_assert!(offset + len <= self.bytes.len());
        std::slice::from_raw_parts(UnsafeCell::raw_get(self.bytes.as_ptr().add(offset)), len)
    }

    /// # Safety
    ///
    /// The caller must be the only user of the range for the lifetime of the slice.
    #[allow(clippy::mut_from_ref)]
    unsafe fn slice_mut(&self, offset: usize, len: usize) -> &mut [u8] {
        debug_assert!(offset + len <= self.bytes.len());
        std::slice::from_raw_parts_mut(UnsafeCell::raw_get(self.bytes.as_ptr().add(offset)), len)
    }
}

// ============================================================================
// Shared state
// ============================================================================

struct CacheState {
    slab: SlabAllocator,
    bindings: FxHashMap<AssetId, SlotId>,
    barriers: usize,
    jobs_submitted: u64,
    failures: u64,
}

struct CacheShared {
    io: Arc<dyn FileIo>,
    jobs: Arc<dyn JobQueue>,
    catalog: Mutex<FxHashMap<AssetId, AssetRef>>,
    state: Mutex<CacheState>,
    storage: SlabStorage,
    pressure: LogLatch,
    barrier_warning_threshold: usize,
}

impl CacheShared {
    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        // Jobs never panic while holding the lock, so a poisoned state is still consistent
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_catalog(&self) -> MutexGuard<'_, FxHashMap<AssetId, AssetRef>> {
        self.catalog.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Background body: stream the payload of `asset` into `slot`
    fn fill_slot(&self, asset: &AssetRef, slot: SlotId) {
        let mut guard = LoadingGuard { shared: self, asset: asset.id, slot, committed: false };

        let (offset, size) = self.lock_state().slab.range(slot);
        // SAFETY: the slot is `Loading` and bound to this job; eviction skips
        // loading slots and no reader can pin it before it becomes `Loaded`.
        let dest = unsafe { self.storage.slice_mut(offset as usize, size as usize) };

        match read_payload(self.io.as_ref(), asset, dest) {
            Ok(()) => {
                let mut state = self.lock_state();
                state.slab.set_state(slot, SlotState::Loaded);
                guard.committed = true;
                crate::engine_trace!("galaxy3d::AssetCache",
                    "Asset {} loaded ({} bytes)", asset.id, size);
            }
            Err(e) => {
                crate::engine_error!("galaxy3d::AssetCache",
                    "Failed to load asset {} ({} bytes): {}", asset.id, size, e);
            }
        }
    }
}

/// Reverts a loading slot to empty unless the job committed it
struct LoadingGuard<'a> {
    shared: &'a CacheShared,
    asset: AssetId,
    slot: SlotId,
    committed: bool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let mut state = self.shared.lock_state();
        state.slab.release(self.slot);
        state.bindings.remove(&self.asset);
        state.failures += 1;
    }
}

/// Copy or decompress the payload of `asset` into `dest`
fn read_payload(io: &dyn FileIo, asset: &AssetRef, dest: &mut [u8]) -> Result<()> {
    let payload = &asset.payload;
    match payload.encoding {
        PayloadEncoding::None => Ok(()),
        PayloadEncoding::Raw => io.read_exact(asset.file, payload.datapos, dest),
        PayloadEncoding::Compressed => {
            let mut block = vec![0u8; BLOCK_SIZE];
            let mut written = 0;
            let blocks = payload.packed_size / BLOCK_SIZE as u64;
            for index in 0..blocks {
                io.read_exact(asset.file, payload.datapos + index * BLOCK_SIZE as u64, &mut block)?;
                written += decompress_block(&block, &mut dest[written..])?;
            }
            if written != dest.len() {
                return Err(Error::Decompression(format!(
                    "asset {} decoded to {} bytes, expected {}", asset.id, written, dest.len()
                )));
            }
            Ok(())
        }
    }
}

// ============================================================================
// Public types
// ============================================================================

/// Loaded payload bytes. The slot stays pinned (never evicted) while this lives.
///
/// Records without payload bytes never occupy a slot and yield an empty guard.
pub struct AssetBytes {
    shared: Arc<CacheShared>,
    asset: AssetId,
    slot: Option<SlotId>,
    offset: usize,
    len: usize,
}

impl AssetBytes {
    pub fn asset(&self) -> AssetId {
        self.asset
    }
}

impl Deref for AssetBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        if self.slot.is_none() {
            return &[];
        }
        // SAFETY: the slot is `Loaded` and pinned by this guard, so nothing
        // writes the range until the guard is dropped.
        unsafe { self.shared.storage.slice(self.offset, self.len) }
    }
}

impl AsRef<[u8]> for AssetBytes {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl Drop for AssetBytes {
    fn drop(&mut self) {
        if let Some(slot) = self.slot {
            self.shared.lock_state().slab.unpin(slot);
        }
    }
}

impl std::fmt::Debug for AssetBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetBytes")
            .field("asset", &self.asset)
            .field("len", &self.len)
            .finish()
    }
}

/// Outstanding eviction barrier. Hand back through `AssetCache::release_barrier`.
#[derive(Debug)]
#[must_use = "a barrier that is never released stops all eviction"]
pub struct BarrierHandle {
    slot: SlotId,
}

/// Snapshot of cache activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub slab_size: u64,
    pub usage: SlabUsage,
    pub bound_assets: usize,
    pub barriers: usize,
    pub jobs_submitted: u64,
    pub evictions: u64,
    pub failures: u64,
}

// ============================================================================
// AssetCache
// ============================================================================

/// Catalog and payload cache. Cheap to clone; clones share everything.
#[derive(Clone)]
pub struct AssetCache {
    shared: Arc<CacheShared>,
}

impl AssetCache {
    pub fn new(config: &StreamingConfig, io: Arc<dyn FileIo>, jobs: Arc<dyn JobQueue>) -> Result<Self> {
        config.validate()?;
        let size = usize::try_from(config.slab_size).map_err(|_| {
            Error::InitializationFailed(format!("slab_size {} is not addressable", config.slab_size))
        })?;

        crate::engine_debug!("galaxy3d::AssetCache", "Creating asset cache with a {} byte slab", size);

        Ok(Self {
            shared: Arc::new(CacheShared {
                io,
                jobs,
                catalog: Mutex::new(FxHashMap::default()),
                state: Mutex::new(CacheState {
                    slab: SlabAllocator::new(config.slab_size),
                    bindings: FxHashMap::default(),
                    barriers: 0,
                    jobs_submitted: 0,
                    failures: 0,
                }),
                storage: SlabStorage::new(size),
                pressure: LogLatch::new(),
                barrier_warning_threshold: config.barrier_warning_threshold,
            }),
        })
    }

    // ===== CATALOG =====

    /// Parse a pack and add its records to the catalog.
    ///
    /// Returns the number of records added. On error nothing is added.
    /// Ids already present in the catalog are rejected.
    pub fn load(&self, path: &str) -> Result<usize> {
        let records = PackReader::load(self.shared.io.as_ref(), path).map_err(|e| {
            crate::engine_error!("galaxy3d::AssetCache", "Failed to load pack '{}': {}", path, e);
            e
        })?;

        let mut catalog = self.shared.lock_catalog();
        let mut seen = rustc_hash::FxHashSet::default();
        for asset in &records {
            if catalog.contains_key(&asset.id) || !seen.insert(asset.id) {
                let err = Error::InvalidFormat(format!(
                    "'{}': asset id {} is already in the catalog", path, asset.id
                ));
                crate::engine_error!("galaxy3d::AssetCache", "Failed to load pack '{}': {}", path, err);
                return Err(err);
            }
        }

        let count = records.len();
        catalog.reserve(count);
        for asset in records {
            catalog.insert(asset.id, Arc::new(asset));
        }

        crate::engine_info!("galaxy3d::AssetCache", "Loaded {} assets from '{}'", count, path);
        Ok(count)
    }

    pub fn find(&self, id: AssetId) -> Option<AssetRef> {
        self.shared.lock_catalog().get(&id).cloned()
    }

    /// Number of records in the catalog
    pub fn asset_count(&self) -> usize {
        self.shared.lock_catalog().len()
    }

    // ===== STREAMING =====

    /// Payload bytes of `asset` if resident, otherwise start loading them.
    ///
    /// Returns `None` while the load is in flight and when the slab has no
    /// room (retry on a later frame). Records without payload bytes return an
    /// empty guard at once and never touch the slab.
    pub fn request(&self, asset: &AssetRef) -> Option<AssetBytes> {
        if asset.datasize() == 0 {
            return Some(AssetBytes {
                shared: Arc::clone(&self.shared),
                asset: asset.id,
                slot: None,
                offset: 0,
                len: 0,
            });
        }

        let slot = {
            let mut guard = self.shared.lock_state();
            let state = &mut *guard;

            if let Some(&slot) = state.bindings.get(&asset.id) {
                state.slab.touch(slot);
                if state.slab.state(slot) != SlotState::Loaded {
                    return None;
                }
                state.slab.pin(slot);
                let (offset, len) = state.slab.range(slot);
                return Some(AssetBytes {
                    shared: Arc::clone(&self.shared),
                    asset: asset.id,
                    slot: Some(slot),
                    offset: offset as usize,
                    len: len as usize,
                });
            }

            let bindings = &mut state.bindings;
            let acquired = state.slab.acquire(asset.datasize(), |owner| {
                bindings.remove(&owner);
            });
            let Some(slot) = acquired else {
                if self.shared.pressure.trip() {
                    crate::engine_warn!("galaxy3d::AssetCache",
                        "Slab full: cannot place asset {} ({} bytes), retrying next frames",
                        asset.id, asset.datasize());
                }
                return None;
            };
            self.shared.pressure.reset();

            state.slab.set_owner(slot, Some(asset.id));
            state.bindings.insert(asset.id, slot);
            state.jobs_submitted += 1;
            slot
        };

        let shared = Arc::clone(&self.shared);
        let asset = Arc::clone(asset);
        self.shared.jobs.submit(Box::new(move || shared.fill_slot(&asset, slot)));
        None
    }

    /// Whether the payload of `id` is resident
    pub fn is_loaded(&self, id: AssetId) -> bool {
        let state = self.shared.lock_state();
        state.bindings.get(&id).is_some_and(|slot| state.slab.state(*slot) == SlotState::Loaded)
    }

    // ===== BARRIERS =====

    /// Stop eviction of everything touched from now on until the barrier is released
    pub fn acquire_barrier(&self) -> BarrierHandle {
        let mut state = self.shared.lock_state();
        let slot = state.slab.acquire_barrier();
        state.barriers += 1;
        if state.barriers == self.shared.barrier_warning_threshold + 1 {
            crate::engine_warn!("galaxy3d::AssetCache",
                "{} barriers outstanding; eviction is blocked until they are released",
                state.barriers);
        }
        BarrierHandle { slot }
    }

    pub fn release_barrier(&self, barrier: BarrierHandle) {
        let mut state = self.shared.lock_state();
        state.slab.release_barrier(barrier.slot);
        state.barriers -= 1;
    }

    pub fn barrier_count(&self) -> usize {
        self.shared.lock_state().barriers
    }

    // ===== INTROSPECTION =====

    pub fn stats(&self) -> CacheStats {
        let state = self.shared.lock_state();
        CacheStats {
            slab_size: state.slab.size(),
            usage: state.slab.usage(),
            bound_assets: state.bindings.len(),
            barriers: state.barriers,
            jobs_submitted: state.jobs_submitted,
            evictions: state.slab.evictions(),
            failures: state.failures,
        }
    }

    /// Check slab invariants
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.shared.lock_state().slab.validate()
    }
}

#[cfg(test)]
#[path = "asset_cache_tests.rs"]
mod tests;
