/// `CDAT` block codec.
///
/// A compressed payload is a run of fixed 16 KiB blocks:
///
/// ```text
/// u32 size                 bytes used in data[]
/// u8  data[16380]          u32 uncompressed_len + lz4 block, zero padded
/// ```
///
/// Blocks decode independently, so a payload is decompressed straight into its
/// destination one block at a time with a single 16 KiB staging buffer.

use crate::error::{Error, Result};
use super::format::{BLOCK_SIZE, BLOCK_DATA_SIZE};

/// Uncompressed bytes fed into each block.
///
/// lz4's worst case for this input (plus the length prefix) still fits in
/// `BLOCK_DATA_SIZE`.
pub const BLOCK_INPUT_SIZE: usize = 14 * 1024;

/// Compress `data` into a sequence of `BLOCK_SIZE` blocks
pub fn compress_blocks(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len().div_ceil(BLOCK_INPUT_SIZE) * BLOCK_SIZE);

    for chunk in data.chunks(BLOCK_INPUT_SIZE) {
        let compressed = lz4_flex::block::compress(chunk);
        let used = 4 + compressed.len();
        if used > BLOCK_DATA_SIZE {
            return Err(Error::Decompression(format!(
                "compressed block of {} bytes does not fit in {}", used, BLOCK_DATA_SIZE
            )));
        }

        let start = out.len();
        out.extend_from_slice(&(used as u32).to_le_bytes());
        out.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
        out.extend_from_slice(&compressed);
        out.resize(start + BLOCK_SIZE, 0);
    }

    Ok(out)
}

/// Read the decoded length of a block from its first 8 bytes
pub fn block_uncompressed_len(prefix: &[u8]) -> Result<usize> {
    if prefix.len() < 8 {
        return Err(Error::Decompression(format!("block prefix of {} bytes", prefix.len())));
    }
    let used = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    if !(4..=BLOCK_DATA_SIZE).contains(&used) {
        return Err(Error::Decompression(format!("block size field {} out of range", used)));
    }
    Ok(u32::from_le_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]) as usize)
}

/// Decompress one block into `out`. Returns the number of bytes written.
pub fn decompress_block(block: &[u8], out: &mut [u8]) -> Result<usize> {
    let expected = block_uncompressed_len(block)?;
    let used = u32::from_le_bytes([block[0], block[1], block[2], block[3]]) as usize;
    if block.len() < 4 + used {
        return Err(Error::Decompression(format!(
            "block claims {} bytes but only {} present", used, block.len() - 4
        )));
    }
    if expected > out.len() {
        return Err(Error::Decompression(format!(
            "block decodes to {} bytes, destination holds {}", expected, out.len()
        )));
    }

    let written = lz4_flex::block::decompress_into(&block[8..4 + used], &mut out[..expected])
        .map_err(|e| Error::Decompression(e.to_string()))?;
    if written != expected {
        return Err(Error::Decompression(format!(
            "block decoded to {} bytes, header says {}", written, expected
        )));
    }
    Ok(written)
}

/// Decompress a whole run of blocks into `out`. Returns the total bytes written.
pub fn decompress_blocks(blocks: &[u8], out: &mut [u8]) -> Result<usize> {
    if blocks.len() % BLOCK_SIZE != 0 {
        return Err(Error::Decompression(format!(
            "{} bytes is not a whole number of blocks", blocks.len()
        )));
    }

    let mut cursor = 0;
    for block in blocks.chunks(BLOCK_SIZE) {
        cursor += decompress_block(block, &mut out[cursor..])?;
    }
    Ok(cursor)
}

#[cfg(test)]
#[path = "compress_tests.rs"]
mod tests;
