/// Graphics device capability consumed by the resource manager.
///
/// Only the upload path is modelled: create device objects, create mapped
/// staging buffers, and submit copies from staging memory. Each submission
/// returns its own fence so uploads can be tracked independently.

use std::sync::Arc;
use std::time::Duration;
use crate::error::Result;
use super::{Buffer, BufferDesc, Texture, TextureDesc, TransferBuffer};

/// Completion signal of one submission
pub trait Fence: Send + Sync {
    /// Non-blocking completion test
    fn is_signaled(&self) -> bool;

    /// Block until signalled or `timeout` elapses. Returns true if signalled.
    fn wait(&self, timeout: Duration) -> bool;
}

/// Destination of one copy
#[derive(Clone)]
pub enum UploadTarget {
    Buffer {
        buffer: Arc<dyn Buffer>,
        offset: u64,
    },
    Texture {
        texture: Arc<dyn Texture>,
        layer: u32,
        level: u32,
    },
}

/// One copy from staging memory
#[derive(Clone)]
pub struct UploadRegion {
    pub source: Arc<dyn TransferBuffer>,
    pub source_offset: u64,
    pub size: u64,
    pub target: UploadTarget,
}

/// Batch of copies submitted together under one fence
#[derive(Clone, Default)]
pub struct UploadDesc {
    pub regions: Vec<UploadRegion>,
}

/// GPU device capability.
///
/// Shared as `Arc<Mutex<dyn GraphicsDevice>>`.
pub trait GraphicsDevice: Send + Sync {
    /// Create a device-local buffer
    fn create_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn Buffer>>;

    /// Create a texture
    fn create_texture(&mut self, desc: TextureDesc) -> Result<Arc<dyn Texture>>;

    /// Create a host-visible staging buffer of `size` bytes, mapped for its lifetime
    fn create_transfer_buffer(&mut self, size: u64) -> Result<Arc<dyn TransferBuffer>>;

    /// Submit a batch of staging copies
    fn submit_upload(&mut self, desc: UploadDesc) -> Result<Arc<dyn Fence>>;
}
