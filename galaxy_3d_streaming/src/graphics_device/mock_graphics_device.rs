/// Mock graphics device for unit tests (no GPU required)
///
/// Uploads are executed at submit time by copying staging bytes into the mock
/// objects, so tests can check what reached the "GPU". Fences either signal
/// immediately (`new`) or wait for `signal_all` (`new_manual`).

use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::Duration;
use crate::error::Result;
use crate::engine_bail;
use super::{
    Buffer, BufferDesc, BufferUsage, Fence, GraphicsDevice, Texture, TextureDesc, TextureInfo,
    TransferBuffer, UploadDesc, UploadTarget,
};

// ============================================================================
// Mock Fence
// ============================================================================

#[derive(Debug, Default)]
pub struct MockFence {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl MockFence {
    pub fn new(signaled: bool) -> Self {
        Self { signaled: Mutex::new(signaled), cond: Condvar::new() }
    }

    pub fn signal(&self) {
        *self.signaled.lock().unwrap() = true;
        self.cond.notify_all();
    }
}

impl Fence for MockFence {
    fn is_signaled(&self) -> bool {
        *self.signaled.lock().unwrap()
    }

    fn wait(&self, timeout: Duration) -> bool {
        let guard = self.signaled.lock().unwrap();
        let (guard, _) = self.cond.wait_timeout_while(guard, timeout, |s| !*s).unwrap();
        *guard
    }
}

// ============================================================================
// Mock Buffer
// ============================================================================

#[derive(Debug)]
pub struct MockBuffer {
    pub size: u64,
    pub usage: BufferUsage,
    pub contents: Mutex<Vec<u8>>,
}

impl MockBuffer {
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self { size, usage, contents: Mutex::new(vec![0; size as usize]) }
    }
}

impl Buffer for MockBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }
}

// ============================================================================
// Mock Texture
// ============================================================================

/// One upload received by a mock texture
#[derive(Debug, Clone, PartialEq)]
pub struct MockTextureUpload {
    pub layer: u32,
    pub level: u32,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub struct MockTexture {
    pub info: TextureInfo,
    pub uploads: Mutex<Vec<MockTextureUpload>>,
}

impl Texture for MockTexture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }
}

// ============================================================================
// Mock Transfer Buffer
// ============================================================================

#[derive(Debug)]
pub struct MockTransferBuffer {
    pub size: u64,
    pub contents: Mutex<Vec<u8>>,
}

impl TransferBuffer for MockTransferBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        let mut contents = self.contents.lock().unwrap();
        let start = offset as usize;
        if start + data.len() > contents.len() {
            engine_bail!("galaxy3d::MockTransferBuffer",
                "write of {} bytes at {} overflows {} byte buffer", data.len(), offset, self.size);
        }
        contents[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read(&self, offset: u64, out: &mut [u8]) -> Result<()> {
        let contents = self.contents.lock().unwrap();
        let start = offset as usize;
        if start + out.len() > contents.len() {
            engine_bail!("galaxy3d::MockTransferBuffer",
                "read of {} bytes at {} overflows {} byte buffer", out.len(), offset, self.size);
        }
        out.copy_from_slice(&contents[start..start + out.len()]);
        Ok(())
    }
}

// ============================================================================
// Mock Graphics Device
// ============================================================================

pub struct MockGraphicsDevice {
    /// New fences start signalled
    pub auto_signal: bool,
    pub fail_buffers: bool,
    pub fail_textures: bool,
    pub fail_transfer_buffers: bool,
    pub fail_uploads: bool,
    pub upload_count: usize,
    fences: Vec<Arc<MockFence>>,
    buffers: Vec<Weak<MockBuffer>>,
    textures: Vec<Weak<MockTexture>>,
    transfer_buffers: Vec<Weak<MockTransferBuffer>>,
}

impl MockGraphicsDevice {
    /// Device whose uploads complete immediately
    pub fn new() -> Self {
        Self {
            auto_signal: true,
            fail_buffers: false,
            fail_textures: false,
            fail_transfer_buffers: false,
            fail_uploads: false,
            upload_count: 0,
            fences: Vec::new(),
            buffers: Vec::new(),
            textures: Vec::new(),
            transfer_buffers: Vec::new(),
        }
    }

    /// Device whose uploads complete on `signal_all`
    pub fn new_manual() -> Self {
        Self { auto_signal: false, ..Self::new() }
    }

    /// Shared handle in both typed and trait-object form
    pub fn shared(self) -> (Arc<Mutex<MockGraphicsDevice>>, Arc<Mutex<dyn GraphicsDevice>>) {
        let typed = Arc::new(Mutex::new(self));
        let device: Arc<Mutex<dyn GraphicsDevice>> = typed.clone();
        (typed, device)
    }

    /// Signal every fence handed out so far
    pub fn signal_all(&mut self) {
        for fence in self.fences.drain(..) {
            fence.signal();
        }
    }

    /// Fences not yet signalled
    pub fn pending_fences(&self) -> usize {
        self.fences.iter().filter(|f| !f.is_signaled()).count()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.iter().filter(|b| b.strong_count() > 0).count()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.iter().filter(|t| t.strong_count() > 0).count()
    }

    pub fn live_transfer_buffers(&self) -> usize {
        self.transfer_buffers.iter().filter(|t| t.strong_count() > 0).count()
    }

    /// Contents of a buffer created by this device
    pub fn buffer_contents(&self, buffer: &Arc<dyn Buffer>) -> Option<Vec<u8>> {
        self.find_buffer(buffer).map(|b| b.contents.lock().unwrap().clone())
    }

    /// Uploads received by a texture created by this device
    pub fn texture_uploads(&self, texture: &Arc<dyn Texture>) -> Option<Vec<MockTextureUpload>> {
        let target = Arc::as_ptr(texture) as *const ();
        self.textures.iter()
            .filter_map(Weak::upgrade)
            .find(|t| Arc::as_ptr(t) as *const () == target)
            .map(|t| t.uploads.lock().unwrap().clone())
    }

    fn find_buffer(&self, buffer: &Arc<dyn Buffer>) -> Option<Arc<MockBuffer>> {
        let target = Arc::as_ptr(buffer) as *const ();
        self.buffers.iter()
            .filter_map(Weak::upgrade)
            .find(|b| Arc::as_ptr(b) as *const () == target)
    }
}

impl Default for MockGraphicsDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn Buffer>> {
        if self.fail_buffers {
            engine_bail!("galaxy3d::MockGraphicsDevice", "buffer creation failed ({} bytes)", desc.size);
        }
        let buffer = Arc::new(MockBuffer::new(desc.size, desc.usage));
        self.buffers.push(Arc::downgrade(&buffer));
        Ok(buffer)
    }

    fn create_texture(&mut self, desc: TextureDesc) -> Result<Arc<dyn Texture>> {
        if self.fail_textures {
            engine_bail!("galaxy3d::MockGraphicsDevice",
                "texture creation failed ({}x{})", desc.width, desc.height);
        }
        let texture = Arc::new(MockTexture {
            info: TextureInfo::from(&desc),
            uploads: Mutex::new(Vec::new()),
        });
        self.textures.push(Arc::downgrade(&texture));
        Ok(texture)
    }

    fn create_transfer_buffer(&mut self, size: u64) -> Result<Arc<dyn TransferBuffer>> {
        if self.fail_transfer_buffers {
            engine_bail!("galaxy3d::MockGraphicsDevice", "transfer buffer creation failed ({} bytes)", size);
        }
        let buffer = Arc::new(MockTransferBuffer {
            size,
            contents: Mutex::new(vec![0; size as usize]),
        });
        self.transfer_buffers.push(Arc::downgrade(&buffer));
        Ok(buffer)
    }

    fn submit_upload(&mut self, desc: UploadDesc) -> Result<Arc<dyn Fence>> {
        if self.fail_uploads {
            engine_bail!("galaxy3d::MockGraphicsDevice", "upload submission failed");
        }

        for region in &desc.regions {
            let mut data = vec![0u8; region.size as usize];
            region.source.read(region.source_offset, &mut data)?;
            match &region.target {
                UploadTarget::Buffer { buffer, offset } => {
                    let Some(mock) = self.find_buffer(buffer) else {
                        engine_bail!("galaxy3d::MockGraphicsDevice", "upload into a foreign buffer");
                    };
                    let mut contents = mock.contents.lock().unwrap();
                    let start = *offset as usize;
                    if start + data.len() > contents.len() {
                        engine_bail!("galaxy3d::MockGraphicsDevice",
                            "upload of {} bytes at {} overflows {} byte buffer",
                            data.len(), offset, mock.size);
                    }
                    contents[start..start + data.len()].copy_from_slice(&data);
                }
                UploadTarget::Texture { texture, layer, level } => {
                    let target = Arc::as_ptr(texture) as *const ();
                    let Some(mock) = self.textures.iter()
                        .filter_map(Weak::upgrade)
                        .find(|t| Arc::as_ptr(t) as *const () == target)
                    else {
                        engine_bail!("galaxy3d::MockGraphicsDevice", "upload into a foreign texture");
                    };
                    mock.uploads.lock().unwrap().push(MockTextureUpload {
                        layer: *layer,
                        level: *level,
                        data,
                    });
                }
            }
        }

        self.upload_count += 1;
        let fence = Arc::new(MockFence::new(self.auto_signal));
        if !self.auto_signal {
            self.fences.push(fence.clone());
        }
        Ok(fence)
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
