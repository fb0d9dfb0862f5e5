/// Resource trait and the load protocol shared by every streamed resource.
///
/// A streamed resource walks `Empty -> Loading -> Waiting -> Testing -> Ready`
/// driven purely by `request()` calls:
///
/// - **Empty**: pull the source bytes from the asset cache. If they are not
///   resident yet the state falls back to Empty and the next frame retries.
///   Otherwise a job creates the GPU objects, stages the bytes and submits
///   the upload, leaving the resource in Waiting.
/// - **Waiting**: one caller tests the upload fence without blocking. Once it
///   has signalled the staging lump is returned and dependencies are polled.
/// - **Ready**: terminal. Further requests are a single atomic load.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use crate::asset::{AssetBytes, AssetCache, AssetRef};
use crate::config::StreamingConfig;
use crate::error::{Error, Result};
use crate::graphics_device::GraphicsDevice;
use crate::platform::JobQueue;
use super::state::{AtomicResourceState, ResourceState};
use super::transfer::{TransferArena, TransferLump};

// ============================================================================
// ResourceHeader
// ============================================================================

/// Load state shared by every resource type
#[derive(Debug)]
pub struct ResourceHeader {
    state: AtomicResourceState,
    retired: AtomicBool,
    asset: Option<AssetRef>,
}

impl ResourceHeader {
    /// Header of a resource loaded from `asset` on demand
    pub fn streamed(asset: AssetRef) -> Self {
        Self {
            state: AtomicResourceState::new(ResourceState::Empty),
            retired: AtomicBool::new(false),
            asset: Some(asset),
        }
    }

    /// Header of a resource uploaded at creation
    pub fn resident() -> Self {
        Self {
            state: AtomicResourceState::new(ResourceState::Ready),
            retired: AtomicBool::new(false),
            asset: None,
        }
    }

    pub fn state(&self) -> ResourceState {
        self.state.load()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ResourceState::Ready && !self.is_retired()
    }

    /// Source asset, `None` for resources built from in-memory data
    pub fn asset(&self) -> Option<&AssetRef> {
        self.asset.as_ref()
    }

    /// Released or destroyed; no further loads start
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    pub(crate) fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }

    pub(crate) fn atomic_state(&self) -> &AtomicResourceState {
        &self.state
    }
}

// ============================================================================
// ResourceContext
// ============================================================================

/// Capabilities a resource needs to load itself
pub struct ResourceContext {
    pub assets: AssetCache,
    pub device: Arc<Mutex<dyn GraphicsDevice>>,
    pub transfer: TransferArena,
    pub jobs: Arc<dyn JobQueue>,
    /// Bound on synchronous fence waits
    pub fence_timeout: Duration,
}

impl ResourceContext {
    pub fn new(
        config: &StreamingConfig,
        assets: AssetCache,
        device: Arc<Mutex<dyn GraphicsDevice>>,
        jobs: Arc<dyn JobQueue>,
    ) -> Self {
        let transfer = TransferArena::new(
            Arc::clone(&device),
            config.transfer_floor_size,
            config.transfer_max_size,
        );
        Self { assets, device, transfer, jobs, fence_timeout: config.fence_timeout }
    }

    pub fn lock_device(&self) -> MutexGuard<'_, dyn GraphicsDevice + 'static> {
        self.device.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for a lump staged by a synchronous creation path
    pub(crate) fn finish_sync_upload(&self, lump: Option<TransferLump>, what: &str) -> Result<()> {
        let Some(lump) = lump else {
            crate::engine_error!("galaxy3d::ResourceManager",
                "No staging memory left to upload {}", what);
            return Err(Error::OutOfMemory);
        };
        self.transfer.release_lump_blocking(lump, self.fence_timeout)
    }
}

// ============================================================================
// Resource trait
// ============================================================================

/// A GPU resource owned by the `ResourceManager`
pub trait Resource: Send + Sync + Sized + 'static {
    /// Creation descriptor
    type Desc;

    /// Type name used in log messages
    const KIND: &'static str;

    /// Build the resource. Asset-backed descriptors give an Empty resource
    /// that loads on request; in-memory descriptors upload synchronously and
    /// give a Ready one.
    fn create(ctx: &Arc<ResourceContext>, desc: Self::Desc) -> Result<Self>;

    fn header(&self) -> &ResourceHeader;

    /// Advance loading. Returns true once the resource is usable. Never blocks.
    fn request(self: &Arc<Self>, ctx: &Arc<ResourceContext>) -> bool;

    /// Drop GPU objects and any in-flight staging lump
    fn destroy(&self, ctx: &ResourceContext);

    /// Bytes of resource-slot budget one instance consumes
    fn footprint() -> usize {
        std::mem::size_of::<Self>()
    }
}

/// Per-type half of the load protocol
pub(crate) trait Streamed: Resource {
    /// Create GPU objects for `bytes`, stage them and submit the upload.
    /// `Ok(None)` when staging memory is exhausted.
    fn stage(&self, ctx: &ResourceContext, bytes: &[u8]) -> Result<Option<TransferLump>>;

    /// Lump of the upload in flight
    fn pending_upload(&self) -> &Mutex<Option<TransferLump>>;

    /// Polled once the upload fence has signalled
    fn dependencies_ready(&self, _ctx: &Arc<ResourceContext>) -> bool {
        true
    }

    /// Drop GPU objects
    fn unload(&self);
}

fn lock_upload(slot: &Mutex<Option<TransferLump>>) -> MutexGuard<'_, Option<TransferLump>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Protocol
// ============================================================================

pub(crate) fn advance<R: Streamed>(resource: &Arc<R>, ctx: &Arc<ResourceContext>) -> bool {
    let header = resource.header();
    if header.is_retired() {
        return false;
    }
    match header.state() {
        ResourceState::Ready => true,
        ResourceState::Empty => {
            begin_load(resource, ctx);
            false
        }
        ResourceState::Waiting => test_upload(resource, ctx),
        ResourceState::Loading | ResourceState::Testing => false,
    }
}

fn begin_load<R: Streamed>(resource: &Arc<R>, ctx: &Arc<ResourceContext>) {
    let header = resource.header();
    let Some(asset) = header.asset() else {
        return;
    };
    if !header.atomic_state().transition(ResourceState::Empty, ResourceState::Loading) {
        return;
    }

    let Some(bytes) = ctx.assets.request(asset) else {
        header.atomic_state().store(ResourceState::Empty);
        return;
    };

    let job_resource = Arc::clone(resource);
    let job_ctx = Arc::clone(ctx);
    ctx.jobs.submit(Box::new(move || run_upload(&*job_resource, &job_ctx, bytes)));
}

/// Puts a resource back to Empty unless disarmed, so a failed or panicking
/// upload job leaves it retryable
struct LoadingRevert<'a, R: Streamed> {
    resource: &'a R,
    armed: bool,
}

impl<R: Streamed> Drop for LoadingRevert<'_, R> {
    fn drop(&mut self) {
        if self.armed {
            self.resource.unload();
            lock_upload(self.resource.pending_upload()).take();
            self.resource.header().atomic_state().store(ResourceState::Empty);
        }
    }
}

fn run_upload<R: Streamed>(resource: &R, ctx: &ResourceContext, bytes: AssetBytes) {
    let mut revert = LoadingRevert { resource, armed: true };
    let asset = bytes.asset();

    match resource.stage(ctx, &bytes) {
        Ok(Some(lump)) => {
            drop(bytes);
            let mut pending = lock_upload(resource.pending_upload());
            // Teardown takes this lock, so a retire seen here cannot race the store
            if resource.header().is_retired() {
                drop(pending);
                drop(lump);
                return;
            }
            *pending = Some(lump);
            revert.armed = false;
            resource.header().atomic_state().store(ResourceState::Waiting);
        }
        Ok(None) => {
            crate::engine_trace!("galaxy3d::ResourceManager",
                "No staging memory for {} {}, retrying", R::KIND, asset);
        }
        Err(err) => {
            crate::engine_error!("galaxy3d::ResourceManager",
                "Upload of {} {} failed: {}", R::KIND, asset, err);
        }
    }
}

fn test_upload<R: Streamed>(resource: &Arc<R>, ctx: &Arc<ResourceContext>) -> bool {
    let state = resource.header().atomic_state();
    if !state.transition(ResourceState::Waiting, ResourceState::Testing) {
        return state.load() == ResourceState::Ready;
    }

    {
        let mut pending = lock_upload(resource.pending_upload());
        if pending.as_ref().is_some_and(|lump| !lump.is_complete()) {
            state.store(ResourceState::Waiting);
            return false;
        }
        if let Some(lump) = pending.take() {
            ctx.transfer.release_lump(lump);
        }
    }

    if resource.dependencies_ready(ctx) {
        state.store(ResourceState::Ready);
        true
    } else {
        state.store(ResourceState::Waiting);
        false
    }
}

/// Shared body of `Resource::destroy`
pub(crate) fn teardown<R: Streamed>(resource: &R) {
    resource.header().retire();
    lock_upload(resource.pending_upload()).take();
    resource.unload();
}
