/// Texture resource.
///
/// Streamed textures come from `IMAG` assets. The payload holds every mip
/// level of every layer, layer-major, each level tightly packed.

use std::sync::{Arc, Mutex, PoisonError};
use crate::asset::AssetRef;
use crate::error::{Error, Result};
use crate::graphics_device::{
    self, Texture as DeviceTexture, TextureFormat, UploadDesc, UploadTarget,
};
use super::resource::{self, Resource, ResourceContext, ResourceHeader, Streamed};
use super::transfer::TransferLump;

pub enum TextureDesc {
    /// Stream from an `IMAG` asset
    Asset(AssetRef),
    /// Upload `data` at creation
    Data {
        desc: graphics_device::TextureDesc,
        data: Vec<u8>,
    },
}

pub struct Texture {
    header: ResourceHeader,
    desc: graphics_device::TextureDesc,
    texture: Mutex<Option<Arc<dyn DeviceTexture>>>,
    upload: Mutex<Option<TransferLump>>,
}

impl Texture {
    /// Device descriptor the texture is created with
    pub fn desc(&self) -> &graphics_device::TextureDesc {
        &self.desc
    }

    pub fn device_texture(&self) -> Option<Arc<dyn DeviceTexture>> {
        self.texture.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Resource for Texture {
    type Desc = TextureDesc;
    const KIND: &'static str = "texture";

    fn create(ctx: &Arc<ResourceContext>, desc: TextureDesc) -> Result<Self> {
        match desc {
            TextureDesc::Asset(asset) => {
                let Some(info) = asset.as_image().copied() else {
                    return Err(Error::InvalidResource(format!(
                        "asset {} is a {}, expected an image", asset.id, asset.kind.name()
                    )));
                };
                let desc = graphics_device::TextureDesc {
                    width: info.width,
                    height: info.height,
                    layers: info.layers.max(1),
                    levels: info.levels.max(1),
                    format: TextureFormat::from_code(info.format)?,
                };
                Ok(Self {
                    header: ResourceHeader::streamed(asset),
                    desc,
                    texture: Mutex::new(None),
                    upload: Mutex::new(None),
                })
            }
            TextureDesc::Data { desc, data } => {
                let texture = Self {
                    header: ResourceHeader::resident(),
                    desc,
                    texture: Mutex::new(None),
                    upload: Mutex::new(None),
                };
                let lump = texture.stage(ctx, &data)?;
                ctx.finish_sync_upload(lump, "texture")?;
                Ok(texture)
            }
        }
    }

    fn header(&self) -> &ResourceHeader {
        &self.header
    }

    fn request(self: &Arc<Self>, ctx: &Arc<ResourceContext>) -> bool {
        resource::advance(self, ctx)
    }

    fn destroy(&self, _ctx: &ResourceContext) {
        resource::teardown(self);
    }
}

impl Streamed for Texture {
    fn stage(&self, ctx: &ResourceContext, bytes: &[u8]) -> Result<Option<TransferLump>> {
        let expected = self.desc.data_size();
        if bytes.len() as u64 != expected {
            return Err(Error::InvalidResource(format!(
                "texture payload is {} bytes, expected {} for {}x{}x{} with {} levels",
                bytes.len(), expected, self.desc.width, self.desc.height,
                self.desc.layers, self.desc.levels
            )));
        }

        let Some(mut lump) = ctx.transfer.acquire_lump(expected)? else {
            return Ok(None);
        };
        lump.write(0, bytes)?;

        let mut device = ctx.lock_device();
        let texture = device.create_texture(self.desc.clone())?;

        let mut regions = Vec::with_capacity((self.desc.layers * self.desc.levels) as usize);
        let mut offset = 0;
        for layer in 0..self.desc.layers {
            for level in 0..self.desc.levels {
                let size = self.desc.level_size(level);
                regions.push(lump.upload_region(offset, size, UploadTarget::Texture {
                    texture: Arc::clone(&texture),
                    layer,
                    level,
                }));
                offset += size;
            }
        }
        let fence = device.submit_upload(UploadDesc { regions })?;
        drop(device);
        lump.set_fence(fence);

        *self.texture.lock().unwrap_or_else(PoisonError::into_inner) = Some(texture);
        Ok(Some(lump))
    }

    fn pending_upload(&self) -> &Mutex<Option<TransferLump>> {
        &self.upload
    }

    fn unload(&self) {
        self.texture.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;
