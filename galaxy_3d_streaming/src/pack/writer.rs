/// Pack writer used by tools and tests.
///
/// Produces the exact layout `PackReader` consumes. The catalog chunk is
/// emitted first with a zero record count and patched by `finish()`.

use bytemuck::Pod;
use crate::asset::PayloadEncoding;
use crate::error::{Error, Result};
use super::compress::compress_blocks;
use super::format::*;

/// Typed header chunk of a record
#[derive(Debug, Clone, Copy)]
pub enum HeaderChunk {
    Text(TextChunk),
    Image(ImageChunk),
    Font(FontChunk),
    Mesh(MeshChunk),
    Material(MaterialChunk),
    Animation(AnimationChunk),
    Particle(ParticleChunk),
    Model(ModelChunk),
}

impl HeaderChunk {
    pub fn chunk_type(&self) -> ChunkType {
        match self {
            HeaderChunk::Text(_) => ChunkType::TEXT,
            HeaderChunk::Image(_) => ChunkType::IMAG,
            HeaderChunk::Font(_) => ChunkType::FONT,
            HeaderChunk::Mesh(_) => ChunkType::MESH,
            HeaderChunk::Material(_) => ChunkType::MATL,
            HeaderChunk::Animation(_) => ChunkType::ANIM,
            HeaderChunk::Particle(_) => ChunkType::PART,
            HeaderChunk::Model(_) => ChunkType::MODL,
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            HeaderChunk::Text(c) => bytemuck::bytes_of(c),
            HeaderChunk::Image(c) => bytemuck::bytes_of(c),
            HeaderChunk::Font(c) => bytemuck::bytes_of(c),
            HeaderChunk::Mesh(c) => bytemuck::bytes_of(c),
            HeaderChunk::Material(c) => bytemuck::bytes_of(c),
            HeaderChunk::Animation(c) => bytemuck::bytes_of(c),
            HeaderChunk::Particle(c) => bytemuck::bytes_of(c),
            HeaderChunk::Model(c) => bytemuck::bytes_of(c),
        }
    }
}

/// One asset record to write
#[derive(Debug, Clone)]
pub struct PackEntry {
    pub id: u32,
    pub header: Option<HeaderChunk>,
    pub payload: Vec<u8>,
    pub encoding: PayloadEncoding,
}

impl PackEntry {
    /// Header-only record
    pub fn new(id: u32) -> Self {
        Self {
            id,
            header: None,
            payload: Vec::new(),
            encoding: PayloadEncoding::None,
        }
    }

    pub fn with_header(mut self, header: HeaderChunk) -> Self {
        self.header = Some(header);
        self
    }

    /// Store the payload verbatim in a `DATA` chunk
    pub fn with_raw(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self.encoding = PayloadEncoding::Raw;
        self
    }

    /// Store the payload as `CDAT` blocks
    pub fn with_compressed(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self.encoding = PayloadEncoding::Compressed;
        self
    }
}

pub struct PackWriter {
    bytes: Vec<u8>,
    catalog_pos: usize,
    count: u32,
}

impl PackWriter {
    /// Start a pack whose ids are rebased by `id_base` when read
    pub fn new(id_base: u32) -> Self {
        let mut writer = Self {
            bytes: SIGNATURE.to_vec(),
            catalog_pos: 0,
            count: 0,
        };
        writer.catalog_pos = SIGNATURE.len() + std::mem::size_of::<ChunkHeader>();
        writer.push_struct(ChunkType::CATL, &CatalogChunk {
            magic: PACK_MAGIC,
            version: PACK_VERSION,
            length: 0,
            offset: id_base,
        });
        writer
    }

    /// Append one complete record (`ASET`, header, payload, `AEND`)
    pub fn add(&mut self, entry: &PackEntry) -> Result<()> {
        self.push_struct(ChunkType::ASET, &AssetChunk { id: entry.id });
        if let Some(header) = &entry.header {
            self.add_chunk(header.chunk_type(), header.bytes())?;
        }
        match entry.encoding {
            PayloadEncoding::None => {}
            PayloadEncoding::Raw => self.add_chunk(ChunkType::DATA, &entry.payload)?,
            PayloadEncoding::Compressed => {
                let blocks = compress_blocks(&entry.payload)?;
                self.add_chunk(ChunkType::CDAT, &blocks)?;
            }
        }
        self.add_chunk(ChunkType::AEND, &[])?;
        self.count += 1;
        Ok(())
    }

    /// Append an arbitrary chunk
    pub fn add_chunk(&mut self, chunk_type: ChunkType, payload: &[u8]) -> Result<()> {
        let length = u32::try_from(payload.len()).map_err(|_| {
            Error::InvalidFormat(format!("{} chunk of {} bytes is too large", chunk_type, payload.len()))
        })?;
        self.bytes.extend_from_slice(bytemuck::bytes_of(&ChunkHeader {
            length,
            chunk_type: chunk_type.0,
        }));
        self.bytes.extend_from_slice(payload);
        Ok(())
    }

    /// Number of records added so far
    pub fn len(&self) -> u32 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Patch the record count, append `HEND` and return the file bytes
    pub fn finish(mut self) -> Vec<u8> {
        let length_pos = self.catalog_pos + 8;
        self.bytes[length_pos..length_pos + 4].copy_from_slice(&self.count.to_le_bytes());
        self.bytes.extend_from_slice(bytemuck::bytes_of(&ChunkHeader {
            length: 0,
            chunk_type: ChunkType::HEND.0,
        }));
        self.bytes
    }

    pub fn write_to(self, path: &str) -> Result<()> {
        let bytes = self.finish();
        std::fs::write(path, bytes)
            .map_err(|e| Error::Io(format!("cannot write '{}': {}", path, e)))
    }

    fn push_struct<T: Pod>(&mut self, chunk_type: ChunkType, value: &T) {
        self.bytes.extend_from_slice(bytemuck::bytes_of(&ChunkHeader {
            length: std::mem::size_of::<T>() as u32,
            chunk_type: chunk_type.0,
        }));
        self.bytes.extend_from_slice(bytemuck::bytes_of(value));
    }
}
