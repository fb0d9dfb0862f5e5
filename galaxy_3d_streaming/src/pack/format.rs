/// Pack container layout
///
/// ```text
/// signature   8 bytes   D9 'S' 'V' 'A' 0D 0A 1A 0A
/// chunk*      { u32 length; u32 type } + length bytes
/// HEND        terminating chunk
/// ```
///
/// All integers and floats are little-endian. Typed header chunks are read
/// with `bytemuck` straight from the chunk bytes, so supported hosts are
/// little-endian as well.

use std::fmt;
use bytemuck::{Pod, Zeroable};

/// File signature
pub const SIGNATURE: [u8; 8] = [0xD9, b'S', b'V', b'A', 0x0D, 0x0A, 0x1A, 0x0A];

/// Catalog magic expected in `CATL`
pub const PACK_MAGIC: u32 = u32::from_le_bytes(*b"GX3D");

/// Catalog version understood by this core
pub const PACK_VERSION: u32 = 1;

/// Size of one `CDAT` block, header included
pub const BLOCK_SIZE: usize = 16384;

/// Bytes available for compressed data in a `CDAT` block
pub const BLOCK_DATA_SIZE: usize = BLOCK_SIZE - 4;

/// Asset reference meaning "none"
pub const NO_ASSET: u32 = u32::MAX;

/// Bytes per vertex in mesh payloads (position, texcoord, normal, tangent)
pub const MESH_VERTEX_STRIDE: u64 = 48;

/// Bytes per index in mesh payloads
pub const MESH_INDEX_SIZE: u64 = 4;

// ===== CHUNK TYPES =====

/// Four-character chunk code, packed little-endian
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkType(pub u32);

impl ChunkType {
    pub const CATL: ChunkType = ChunkType::from_code(b"CATL");
    pub const ASET: ChunkType = ChunkType::from_code(b"ASET");
    pub const TEXT: ChunkType = ChunkType::from_code(b"TEXT");
    pub const IMAG: ChunkType = ChunkType::from_code(b"IMAG");
    pub const FONT: ChunkType = ChunkType::from_code(b"FONT");
    pub const MESH: ChunkType = ChunkType::from_code(b"MESH");
    pub const MATL: ChunkType = ChunkType::from_code(b"MATL");
    pub const ANIM: ChunkType = ChunkType::from_code(b"ANIM");
    pub const PART: ChunkType = ChunkType::from_code(b"PART");
    pub const MODL: ChunkType = ChunkType::from_code(b"MODL");
    pub const AEND: ChunkType = ChunkType::from_code(b"AEND");
    pub const DATA: ChunkType = ChunkType::from_code(b"DATA");
    pub const CDAT: ChunkType = ChunkType::from_code(b"CDAT");
    pub const HEND: ChunkType = ChunkType::from_code(b"HEND");

    pub const fn from_code(code: &[u8; 4]) -> Self {
        Self(u32::from_le_bytes(*code))
    }

    pub fn code(&self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

impl fmt::Debug for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.code() {
            if byte.is_ascii_graphic() {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\x{:02x}", byte)?;
            }
        }
        Ok(())
    }
}

// ===== CHUNK LAYOUTS =====

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ChunkHeader {
    pub length: u32,
    pub chunk_type: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CatalogChunk {
    pub magic: u32,
    pub version: u32,
    /// Number of asset records in the pack
    pub length: u32,
    /// Base added to every asset id in the pack
    pub offset: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct AssetChunk {
    pub id: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct TextChunk {
    pub length: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ImageChunk {
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub levels: u32,
    pub format: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FontChunk {
    pub ascent: u32,
    pub descent: u32,
    pub leading: u32,
    pub glyphcount: u32,
    pub atlas: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MeshChunk {
    pub vertexcount: u32,
    pub indexcount: u32,
    pub mincorner: [f32; 3],
    pub maxcorner: [f32; 3],
    pub material: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MaterialChunk {
    pub color: [f32; 4],
    pub metalness: f32,
    pub roughness: f32,
    pub reflectivity: f32,
    pub emissive: f32,
    pub albedomap: u32,
    pub surfacemap: u32,
    pub normalmap: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct AnimationChunk {
    pub jointcount: u32,
    pub transformcount: u32,
    pub duration: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ParticleChunk {
    pub maxparticles: u32,
    pub emittercount: u32,
    pub lifetime: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ModelChunk {
    pub meshcount: u32,
    pub materialcount: u32,
    pub nodecount: u32,
}
