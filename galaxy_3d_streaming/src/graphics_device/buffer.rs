/// Buffer traits and buffer descriptor

use bitflags::bitflags;
use crate::error::Result;

bitflags! {
    /// Buffer usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Vertex buffer
        const VERTEX = 1 << 0;
        /// Index buffer
        const INDEX = 1 << 1;
        /// Uniform/constant buffer
        const UNIFORM = 1 << 2;
        /// Storage buffer
        const STORAGE = 1 << 3;
        /// Destination of staging copies
        const TRANSFER_DST = 1 << 4;
    }
}

/// Descriptor for creating a device-local buffer
#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    /// Buffer usage
    pub usage: BufferUsage,
}

/// Device-local buffer.
///
/// Implemented by backend-specific buffer types.
/// The buffer is destroyed when the last reference is dropped.
pub trait Buffer: Send + Sync {
    /// Size in bytes
    fn size(&self) -> u64;

    fn usage(&self) -> BufferUsage;
}

/// Host-visible staging buffer, mapped once for its whole lifetime
pub trait TransferBuffer: Send + Sync {
    /// Size in bytes
    fn size(&self) -> u64;

    /// Copy `data` into mapped memory at `offset`
    fn write(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Copy mapped memory at `offset` into `out`
    fn read(&self, offset: u64, out: &mut [u8]) -> Result<()>;
}
