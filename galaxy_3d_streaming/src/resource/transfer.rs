/// Elastic staging memory for GPU uploads.
///
/// The arena keeps a list of mapped `TransferBuffer`s ("backings") and hands
/// out regions of them as `TransferLump`s. A lump is returned to its backing
/// when dropped, but only once the fence of the upload that read it has
/// signalled; until then the region sits on a retired list that every arena
/// call polls.
///
/// Growth allocates a backing of `max(request, floor)` bytes as long as the
/// total stays under the cap. Backings with no lump outstanding are freed
/// again while the total exceeds the floor.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use crate::error::{Error, Result};
use crate::graphics_device::{Fence, GraphicsDevice, TransferBuffer, UploadRegion, UploadTarget};
use crate::log::LogLatch;

/// Offsets and sizes of lumps are rounded to this many bytes
pub const LUMP_ALIGNMENT: u64 = 16;

fn align_up(value: u64) -> u64 {
    value.div_ceil(LUMP_ALIGNMENT) * LUMP_ALIGNMENT
}

// ============================================================================
// Arena state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Region {
    offset: u64,
    size: u64,
}

struct Backing {
    id: u64,
    buffer: Arc<dyn TransferBuffer>,
    size: u64,
    /// Free regions sorted by offset, never adjacent
    free: Vec<Region>,
    /// Lumps handed out and not yet returned, retired ones included
    outstanding: usize,
}

impl Backing {
    fn take(&mut self, size: u64) -> Option<Region> {
        let index = self.free.iter().position(|r| r.size >= size)?;
        let region = self.free[index];
        if region.size == size {
            self.free.remove(index);
        } else {
            self.free[index] = Region { offset: region.offset + size, size: region.size - size };
        }
        self.outstanding += 1;
        Some(Region { offset: region.offset, size })
    }

    fn give_back(&mut self, region: Region) {
        let index = self.free.partition_point(|r| r.offset < region.offset);
        self.free.insert(index, region);

        // Merge with the following region, then with the preceding one
        if index + 1 < self.free.len() {
            let next = self.free[index + 1];
            if self.free[index].offset + self.free[index].size == next.offset {
                self.free[index].size += next.size;
                self.free.remove(index + 1);
            }
        }
        if index > 0 {
            let prev = self.free[index - 1];
            if prev.offset + prev.size == self.free[index].offset {
                self.free[index - 1].size += self.free[index].size;
                self.free.remove(index);
            }
        }
        self.outstanding -= 1;
    }
}

struct Retired {
    backing: u64,
    region: Region,
    fence: Arc<dyn Fence>,
}

struct ArenaState {
    backings: Vec<Backing>,
    retired: Vec<Retired>,
    allocated: u64,
    next_id: u64,
}

impl ArenaState {
    fn give_back(&mut self, backing: u64, region: Region) {
        if let Some(backing) = self.backings.iter_mut().find(|b| b.id == backing) {
            backing.give_back(region);
        }
    }

    /// Return retired regions whose fence has signalled
    fn reclaim(&mut self) -> usize {
        let (done, pending): (Vec<_>, Vec<_>) =
            self.retired.drain(..).partition(|r| r.fence.is_signaled());
        self.retired = pending;
        for retired in &done {
            self.give_back(retired.backing, retired.region);
        }
        done.len()
    }

    /// Free idle backings, newest first, while above `floor`
    fn shrink(&mut self, floor: u64) {
        let mut index = self.backings.len();
        while index > 0 && self.allocated > floor {
            index -= 1;
            if self.backings[index].outstanding == 0 {
                let backing = self.backings.remove(index);
                self.allocated -= backing.size;
                crate::engine_debug!("galaxy3d::TransferArena",
                    "Freed idle staging buffer of {} bytes ({} bytes remain)",
                    backing.size, self.allocated);
            }
        }
    }
}

// ============================================================================
// TransferLump
// ============================================================================

/// Region of staging memory owned by one upload.
///
/// Write the source bytes, build `UploadRegion`s from it, submit, then hand the
/// submission fence to `set_fence`. Dropping the lump returns its region as soon
/// as that fence has signalled.
pub struct TransferLump {
    arena: Arc<Mutex<ArenaState>>,
    backing: u64,
    region: Region,
    size: u64,
    buffer: Arc<dyn TransferBuffer>,
    fence: Option<Arc<dyn Fence>>,
}

impl TransferLump {
    /// Usable bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Offset of the lump within its backing buffer
    pub fn offset(&self) -> u64 {
        self.region.offset
    }

    pub fn buffer(&self) -> &Arc<dyn TransferBuffer> {
        &self.buffer
    }

    /// Copy `data` into the lump at `offset`
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        if offset + data.len() as u64 > self.size {
            return Err(Error::InvalidResource(format!(
                "staging write of {} bytes at {} overflows a {} byte lump",
                data.len(), offset, self.size
            )));
        }
        self.buffer.write(self.region.offset + offset, data)
    }

    /// Copy of `size` bytes at `offset` in the lump into `target`
    pub fn upload_region(&self, offset: u64, size: u64, target: UploadTarget) -> UploadRegion {
        UploadRegion {
            source: Arc::clone(&self.buffer),
            source_offset: self.region.offset + offset,
            size,
            target,
        }
    }

    /// Fence of the submission reading this lump
    pub fn set_fence(&mut self, fence: Arc<dyn Fence>) {
        self.fence = Some(fence);
    }

    /// Whether the GPU is done reading the lump
    pub fn is_complete(&self) -> bool {
        self.fence.as_ref().is_none_or(|fence| fence.is_signaled())
    }
}

impl Drop for TransferLump {
    fn drop(&mut self) {
        let mut state = self.arena.lock().unwrap_or_else(PoisonError::into_inner);
        match self.fence.take() {
            Some(fence) if !fence.is_signaled() => {
                state.retired.push(Retired { backing: self.backing, region: self.region, fence });
            }
            _ => state.give_back(self.backing, self.region),
        }
    }
}

impl std::fmt::Debug for TransferLump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferLump")
            .field("backing", &self.backing)
            .field("offset", &self.region.offset)
            .field("size", &self.size)
            .field("complete", &self.is_complete())
            .finish()
    }
}

// ============================================================================
// TransferArena
// ============================================================================

pub struct TransferArena {
    device: Arc<Mutex<dyn GraphicsDevice>>,
    floor: u64,
    cap: u64,
    state: Arc<Mutex<ArenaState>>,
    pressure: LogLatch,
}

impl TransferArena {
    pub fn new(device: Arc<Mutex<dyn GraphicsDevice>>, floor: u64, cap: u64) -> Self {
        Self {
            device,
            floor,
            cap,
            state: Arc::new(Mutex::new(ArenaState {
                backings: Vec::new(),
                retired: Vec::new(),
                allocated: 0,
                next_id: 0,
            })),
            pressure: LogLatch::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ArenaState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Staging region of at least `size` bytes.
    ///
    /// `Ok(None)` when the cap leaves no room (retry once uploads drain).
    /// Errors come from the device failing to create a backing buffer.
    pub fn acquire_lump(&self, size: u64) -> Result<Option<TransferLump>> {
        let aligned = align_up(size.max(1));
        let mut state = self.lock();
        state.reclaim();

        for backing in state.backings.iter_mut() {
            if let Some(region) = backing.take(aligned) {
                let lump = TransferLump {
                    arena: Arc::clone(&self.state),
                    backing: backing.id,
                    region,
                    size,
                    buffer: Arc::clone(&backing.buffer),
                    fence: None,
                };
                self.pressure.reset();
                return Ok(Some(lump));
            }
        }

        let backing_size = aligned.max(self.floor);
        if state.allocated + backing_size > self.cap {
            // Idle backings too small for this request are dead weight now
            state.shrink(0);
        }
        if state.allocated + backing_size > self.cap {
            if self.pressure.trip() {
                crate::engine_warn!("galaxy3d::TransferArena",
                    "Staging memory exhausted: {} bytes requested, {} of {} bytes allocated",
                    size, state.allocated, self.cap);
            }
            return Ok(None);
        }

        let buffer = {
            let mut device = self.device.lock().unwrap_or_else(PoisonError::into_inner);
            device.create_transfer_buffer(backing_size)?
        };
        let id = state.next_id;
        state.next_id += 1;
        state.allocated += backing_size;
        let mut backing = Backing {
            id,
            buffer,
            size: backing_size,
            free: vec![Region { offset: 0, size: backing_size }],
            outstanding: 0,
        };
        let region = backing.take(aligned).ok_or_else(|| {
            Error::BackendError("fresh staging buffer cannot hold its first lump".to_string())
        })?;
        let buffer = Arc::clone(&backing.buffer);
        state.backings.push(backing);
        crate::engine_debug!("galaxy3d::TransferArena",
            "Allocated staging buffer of {} bytes ({} bytes total)", backing_size, state.allocated);

        self.pressure.reset();
        Ok(Some(TransferLump {
            arena: Arc::clone(&self.state),
            backing: id,
            region,
            size,
            buffer,
            fence: None,
        }))
    }

    /// Give a lump back without waiting on its fence
    pub fn release_lump(&self, lump: TransferLump) {
        drop(lump);
        self.reclaim();
    }

    /// Give a lump back after waiting up to `timeout` for its fence.
    ///
    /// On timeout the lump is retired like `release_lump` and an error returned.
    pub fn release_lump_blocking(&self, lump: TransferLump, timeout: Duration) -> Result<()> {
        let signalled = lump.fence.as_ref().is_none_or(|fence| fence.wait(timeout));
        drop(lump);
        self.reclaim();
        if !signalled {
            return Err(Error::BackendError(format!(
                "upload fence not signalled after {:?}", timeout
            )));
        }
        Ok(())
    }

    /// Return signalled retired lumps and free idle backings above the floor.
    /// Returns the number of lumps reclaimed.
    pub fn reclaim(&self) -> usize {
        let mut state = self.lock();
        let reclaimed = state.reclaim();
        state.shrink(self.floor);
        reclaimed
    }

    /// Bytes of staging memory currently allocated
    pub fn allocated(&self) -> u64 {
        self.lock().allocated
    }

    pub fn backing_count(&self) -> usize {
        self.lock().backings.len()
    }

    /// Lumps released while their upload was still in flight
    pub fn in_flight(&self) -> usize {
        self.lock().retired.len()
    }
}

#[cfg(test)]
#[path = "transfer_tests.rs"]
mod tests;
