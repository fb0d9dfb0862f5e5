/// Chunked pack container: layout, block codec, reader and writer

pub mod format;
pub mod compress;
pub mod reader;
pub mod writer;

pub use format::{
    ChunkType, ChunkHeader, CatalogChunk, AssetChunk, TextChunk, ImageChunk, FontChunk,
    MeshChunk, MaterialChunk, AnimationChunk, ParticleChunk, ModelChunk,
    SIGNATURE, PACK_MAGIC, PACK_VERSION, BLOCK_SIZE, BLOCK_DATA_SIZE, NO_ASSET,
    MESH_VERTEX_STRIDE, MESH_INDEX_SIZE,
};
pub use compress::{compress_blocks, decompress_block, decompress_blocks, BLOCK_INPUT_SIZE};
pub use reader::PackReader;
pub use writer::{PackWriter, PackEntry, HeaderChunk};
