/// Texture trait, texture descriptor, and texture info

use crate::error::{Error, Result};

/// Texel format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    R8_UNORM,
    R16G16B16A16_SFLOAT,
}

impl TextureFormat {
    /// Format for the `format` code stored in `IMAG` chunks
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            0 => Ok(TextureFormat::R8G8B8A8_UNORM),
            1 => Ok(TextureFormat::R8G8B8A8_SRGB),
            2 => Ok(TextureFormat::R8_UNORM),
            3 => Ok(TextureFormat::R16G16B16A16_SFLOAT),
            other => Err(Error::InvalidResource(format!("unknown image format code {}", other))),
        }
    }

    pub fn bytes_per_texel(&self) -> u64 {
        match self {
            TextureFormat::R8G8B8A8_UNORM | TextureFormat::R8G8B8A8_SRGB => 4,
            TextureFormat::R8_UNORM => 1,
            TextureFormat::R16G16B16A16_SFLOAT => 8,
        }
    }
}

/// Descriptor for creating a texture
#[derive(Debug, Clone)]
pub struct TextureDesc {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Number of array layers (1 = simple 2D texture)
    pub layers: u32,
    /// Number of mip levels
    pub levels: u32,
    /// Pixel format
    pub format: TextureFormat,
}

impl TextureDesc {
    /// Bytes of one layer at `level`
    pub fn level_size(&self, level: u32) -> u64 {
        let width = (self.width >> level).max(1) as u64;
        let height = (self.height >> level).max(1) as u64;
        width * height * self.format.bytes_per_texel()
    }

    /// Bytes of the full mip chain for all layers, layer-major
    pub fn data_size(&self) -> u64 {
        let per_layer: u64 = (0..self.levels).map(|level| self.level_size(level)).sum();
        per_layer * self.layers as u64
    }
}

/// Read-only properties of a created texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub levels: u32,
    pub format: TextureFormat,
}

impl From<&TextureDesc> for TextureInfo {
    fn from(desc: &TextureDesc) -> Self {
        Self {
            width: desc.width,
            height: desc.height,
            layers: desc.layers,
            levels: desc.levels,
            format: desc.format,
        }
    }
}

/// Texture resource trait.
///
/// The texture is destroyed when the last reference is dropped.
pub trait Texture: Send + Sync {
    fn info(&self) -> &TextureInfo;
}
