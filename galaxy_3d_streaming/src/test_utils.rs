//! Shared helpers for unit tests: log capture, pack builders, instrumented capabilities

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::log::{LogEntry, Logger};
use crate::pack::{HeaderChunk, MeshChunk, MaterialChunk, ImageChunk, PackEntry, PackWriter, NO_ASSET};
use crate::platform::{DeferredJobQueue, FileHandle, FileIo, Job, JobQueue, MemoryFileIo};
use crate::asset::{AssetCache, AssetId, AssetRef};
use crate::config::StreamingConfig;
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use crate::resource::{Resource, ResourceContext};

// ============================================================================
// Log capture
// ============================================================================

/// Logger that records every entry. Install from `#[serial]` tests only.
#[derive(Clone, Default)]
pub struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl CaptureLogger {
    /// Install a fresh capture as the engine logger
    pub fn install() -> Self {
        let capture = Self::default();
        Engine::set_logger(capture.clone());
        capture
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Entries logged under `source`
    pub fn entries_from(&self, source: &str) -> Vec<LogEntry> {
        self.entries().into_iter().filter(|e| e.source == source).collect()
    }

    /// Entries whose message contains `needle`
    pub fn entries_containing(&self, needle: &str) -> Vec<LogEntry> {
        self.entries().into_iter().filter(|e| e.message.contains(needle)).collect()
    }
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

// ============================================================================
// Pack builders
// ============================================================================

/// Vertex and index bytes for a mesh: 48-byte vertices then u32 indices
pub fn mesh_payload(vertex_count: u32, index_count: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    for v in 0..vertex_count {
        let vertex: [f32; 12] = [
            v as f32, (v * 2) as f32, (v * 3) as f32,
            0.0, 1.0,
            0.0, 0.0, 1.0,
            1.0, 0.0, 0.0, 1.0,
        ];
        bytes.extend_from_slice(bytemuck::cast_slice(&vertex));
    }
    for i in 0..index_count {
        bytes.extend_from_slice(&(i % vertex_count.max(1)).to_le_bytes());
    }
    bytes
}

pub fn mesh_header(vertex_count: u32, index_count: u32, material: u32) -> HeaderChunk {
    HeaderChunk::Mesh(MeshChunk {
        vertexcount: vertex_count,
        indexcount: index_count,
        mincorner: [-1.0, -1.0, -1.0],
        maxcorner: [1.0, 1.0, 1.0],
        material,
    })
}

pub fn image_header(width: u32, height: u32) -> HeaderChunk {
    HeaderChunk::Image(ImageChunk { width, height, layers: 1, levels: 1, format: 0 })
}

pub fn material_header(albedo: u32, surface: u32, normal: u32) -> HeaderChunk {
    HeaderChunk::Material(MaterialChunk {
        color: [1.0, 0.5, 0.25, 1.0],
        metalness: 0.1,
        roughness: 0.7,
        reflectivity: 0.5,
        emissive: 0.0,
        albedomap: albedo,
        surfacemap: surface,
        normalmap: normal,
    })
}

/// Mesh record with its payload
pub fn mesh_entry(id: u32, vertex_count: u32, index_count: u32, compressed: bool) -> PackEntry {
    let entry = PackEntry::new(id).with_header(mesh_header(vertex_count, index_count, NO_ASSET));
    let payload = mesh_payload(vertex_count, index_count);
    if compressed { entry.with_compressed(payload) } else { entry.with_raw(payload) }
}

/// RGBA8 image record filled with `fill`
pub fn image_entry(id: u32, width: u32, height: u32, fill: u8) -> PackEntry {
    PackEntry::new(id)
        .with_header(image_header(width, height))
        .with_raw(vec![fill; (width * height * 4) as usize])
}

/// Record carrying `size` opaque bytes
pub fn blob_entry(id: u32, size: usize) -> PackEntry {
    PackEntry::new(id).with_raw((0..size).map(|i| (i % 251) as u8).collect())
}

pub fn build_pack(id_base: u32, entries: &[PackEntry]) -> Vec<u8> {
    let mut writer = PackWriter::new(id_base);
    for entry in entries {
        writer.add(entry).unwrap();
    }
    writer.finish()
}

/// In-memory file system holding one pack at `path`
pub fn memory_io(path: &str, pack: Vec<u8>) -> Arc<MemoryFileIo> {
    let io = Arc::new(MemoryFileIo::new());
    io.insert(path, pack);
    io
}

// ============================================================================
// Instrumented capabilities
// ============================================================================

/// `FileIo` wrapper whose reads can be switched to fail
pub struct FlakyFileIo {
    inner: MemoryFileIo,
    failing: AtomicBool,
}

impl FlakyFileIo {
    pub fn new(inner: MemoryFileIo) -> Self {
        Self { inner, failing: AtomicBool::new(false) }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl FileIo for FlakyFileIo {
    fn open(&self, path: &str) -> Result<FileHandle> {
        self.inner.open(path)
    }

    fn read(&self, handle: FileHandle, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Io("injected read failure".to_string()));
        }
        self.inner.read(handle, offset, buffer)
    }
}

/// Deferred queue that counts submissions
#[derive(Default)]
pub struct CountingJobQueue {
    inner: DeferredJobQueue,
    submitted: AtomicUsize,
}

impl CountingJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    pub fn run_pending(&self) -> usize {
        self.inner.run_pending()
    }
}

impl JobQueue for CountingJobQueue {
    fn submit(&self, job: Job) {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        self.inner.submit(job);
    }
}

// ============================================================================
// Resource fixture
// ============================================================================

/// Pack-backed asset cache, mock device and counting deferred jobs wired into
/// a `ResourceContext`
pub struct ResourceFixture {
    pub ctx: Arc<ResourceContext>,
    pub device: Arc<Mutex<MockGraphicsDevice>>,
    pub jobs: Arc<CountingJobQueue>,
}

impl ResourceFixture {
    pub fn new(entries: &[PackEntry]) -> Self {
        Self::with(StreamingConfig::compact(), MockGraphicsDevice::new(), entries)
    }

    pub fn with(config: StreamingConfig, device: MockGraphicsDevice, entries: &[PackEntry]) -> Self {
        let io = memory_io("assets.pack", build_pack(0, entries));
        let jobs = Arc::new(CountingJobQueue::new());
        let assets = AssetCache::new(&config, io, jobs.clone()).unwrap();
        assets.load("assets.pack").unwrap();
        let (device, shared) = device.shared();
        let ctx = Arc::new(ResourceContext::new(&config, assets, shared, jobs.clone()));
        Self { ctx, device, jobs }
    }

    pub fn asset(&self, id: u32) -> AssetRef {
        self.ctx.assets.find(AssetId(id)).unwrap()
    }

    /// Alternate `request` and job draining for up to `frames` frames
    pub fn request_until_ready<R: Resource>(&self, resource: &Arc<R>, frames: usize) -> bool {
        for _ in 0..frames {
            if resource.request(&self.ctx) {
                return true;
            }
            self.jobs.run_pending();
        }
        false
    }
}
