/// Material resource: a uniform buffer of surface parameters plus the texture
/// maps it samples.
///
/// A streamed material comes from a `MATL` asset. The asset has no payload;
/// the parameters live in its header and each map is another `IMAG` asset.
/// The material owns its map textures and only reports ready once its own
/// uniforms are uploaded and every map is ready.

use std::sync::{Arc, Mutex, PoisonError};
use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use crate::asset::{AssetId, AssetRef, MaterialInfo};
use crate::error::{Error, Result};
use crate::graphics_device::{Buffer, BufferDesc, BufferUsage, UploadDesc, UploadTarget};
use super::resource::{self, Resource, ResourceContext, ResourceHeader, Streamed};
use super::texture::{Texture, TextureDesc};
use super::transfer::TransferLump;

// ===== PARAMETERS =====

/// Surface parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialParams {
    pub color: Vec4,
    pub metalness: f32,
    pub roughness: f32,
    pub reflectivity: f32,
    pub emissive: f32,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            color: Vec4::ONE,
            metalness: 0.0,
            roughness: 1.0,
            reflectivity: 0.5,
            emissive: 0.0,
        }
    }
}

impl From<&MaterialInfo> for MaterialParams {
    fn from(info: &MaterialInfo) -> Self {
        Self {
            color: info.color,
            metalness: info.metalness,
            roughness: info.roughness,
            reflectivity: info.reflectivity,
            emissive: info.emissive,
        }
    }
}

/// GPU layout of `MaterialParams`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialUniform {
    pub color: [f32; 4],
    pub metalness: f32,
    pub roughness: f32,
    pub reflectivity: f32,
    pub emissive: f32,
}

impl From<&MaterialParams> for MaterialUniform {
    fn from(params: &MaterialParams) -> Self {
        Self {
            color: params.color.to_array(),
            metalness: params.metalness,
            roughness: params.roughness,
            reflectivity: params.reflectivity,
            emissive: params.emissive,
        }
    }
}

const UNIFORM_SIZE: u64 = std::mem::size_of::<MaterialUniform>() as u64;

// ===== DESCRIPTOR =====

pub enum MaterialDesc {
    /// Stream from a `MATL` asset and the image assets it names
    Asset(AssetRef),
    /// Upload these parameters at creation; no maps
    Params(MaterialParams),
}

/// Texture maps owned by a material
#[derive(Default)]
pub struct MaterialMaps {
    pub albedo: Option<Arc<Texture>>,
    pub surface: Option<Arc<Texture>>,
    pub normal: Option<Arc<Texture>>,
}

impl MaterialMaps {
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Texture>> {
        [&self.albedo, &self.surface, &self.normal].into_iter().flatten()
    }
}

// ===== MATERIAL =====

pub struct Material {
    header: ResourceHeader,
    params: Mutex<MaterialParams>,
    maps: MaterialMaps,
    uniforms: Mutex<Option<Arc<dyn Buffer>>>,
    upload: Mutex<Option<TransferLump>>,
}

fn map_texture(ctx: &Arc<ResourceContext>, map: Option<AssetId>) -> Result<Option<Arc<Texture>>> {
    let Some(id) = map else {
        return Ok(None);
    };
    let Some(asset) = ctx.assets.find(id) else {
        return Err(Error::InvalidResource(format!("material map {} is not in the catalog", id)));
    };
    Ok(Some(Arc::new(Texture::create(ctx, TextureDesc::Asset(asset))?)))
}

impl Material {
    pub fn params(&self) -> MaterialParams {
        *self.params.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn maps(&self) -> &MaterialMaps {
        &self.maps
    }

    pub fn uniform_buffer(&self) -> Option<Arc<dyn Buffer>> {
        self.uniforms.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Rewrite the uniform buffer synchronously.
    ///
    /// The material must be ready, and the caller must ensure no frame using
    /// the previous parameters is still in flight.
    pub fn update_params(&self, ctx: &ResourceContext, params: MaterialParams) -> Result<()> {
        if !self.header.is_ready() {
            return Err(Error::InvalidResource("material is not ready".to_string()));
        }
        let Some(buffer) = self.uniform_buffer() else {
            return Err(Error::InvalidResource("material has no uniform buffer".to_string()));
        };

        let uniform = MaterialUniform::from(&params);
        let lump = ctx.transfer.acquire_lump(UNIFORM_SIZE)?;
        let lump = match lump {
            Some(mut lump) => {
                lump.write(0, bytemuck::bytes_of(&uniform))?;
                let region = lump.upload_region(0, UNIFORM_SIZE, UploadTarget::Buffer { buffer, offset: 0 });
                let fence = ctx.lock_device().submit_upload(UploadDesc { regions: vec![region] })?;
                lump.set_fence(fence);
                Some(lump)
            }
            None => None,
        };
        ctx.finish_sync_upload(lump, "material parameters")?;

        *self.params.lock().unwrap_or_else(PoisonError::into_inner) = params;
        Ok(())
    }
}

impl Resource for Material {
    type Desc = MaterialDesc;
    const KIND: &'static str = "material";

    fn create(ctx: &Arc<ResourceContext>, desc: MaterialDesc) -> Result<Self> {
        match desc {
            MaterialDesc::Asset(asset) => {
                let Some(info) = asset.as_material().copied() else {
                    return Err(Error::InvalidResource(format!(
                        "asset {} is a {}, expected a material", asset.id, asset.kind.name()
                    )));
                };
                let maps = MaterialMaps {
                    albedo: map_texture(ctx, info.albedo_map)?,
                    surface: map_texture(ctx, info.surface_map)?,
                    normal: map_texture(ctx, info.normal_map)?,
                };
                Ok(Self {
                    header: ResourceHeader::streamed(asset),
                    params: Mutex::new(MaterialParams::from(&info)),
                    maps,
                    uniforms: Mutex::new(None),
                    upload: Mutex::new(None),
                })
            }
            MaterialDesc::Params(params) => {
                let material = Self {
                    header: ResourceHeader::resident(),
                    params: Mutex::new(params),
                    maps: MaterialMaps::default(),
                    uniforms: Mutex::new(None),
                    upload: Mutex::new(None),
                };
                let lump = material.stage(ctx, &[])?;
                ctx.finish_sync_upload(lump, "material")?;
                Ok(material)
            }
        }
    }

    fn header(&self) -> &ResourceHeader {
        &self.header
    }

    fn request(self: &Arc<Self>, ctx: &Arc<ResourceContext>) -> bool {
        resource::advance(self, ctx)
    }

    fn destroy(&self, ctx: &ResourceContext) {
        resource::teardown(self);
        for map in self.maps.iter() {
            map.destroy(ctx);
        }
    }
}

impl Streamed for Material {
    fn stage(&self, ctx: &ResourceContext, _bytes: &[u8]) -> Result<Option<TransferLump>> {
        let uniform = MaterialUniform::from(&self.params());
        let Some(mut lump) = ctx.transfer.acquire_lump(UNIFORM_SIZE)? else {
            return Ok(None);
        };
        lump.write(0, bytemuck::bytes_of(&uniform))?;

        let mut device = ctx.lock_device();
        let buffer = device.create_buffer(BufferDesc {
            size: UNIFORM_SIZE,
            usage: BufferUsage::UNIFORM | BufferUsage::TRANSFER_DST,
        })?;
        let region = lump.upload_region(0, UNIFORM_SIZE,
            UploadTarget::Buffer { buffer: Arc::clone(&buffer), offset: 0 });
        let fence = device.submit_upload(UploadDesc { regions: vec![region] })?;
        drop(device);
        lump.set_fence(fence);

        *self.uniforms.lock().unwrap_or_else(PoisonError::into_inner) = Some(buffer);
        Ok(Some(lump))
    }

    fn pending_upload(&self) -> &Mutex<Option<TransferLump>> {
        &self.upload
    }

    /// Request every map so they load in parallel, ready only when all are
    fn dependencies_ready(&self, ctx: &Arc<ResourceContext>) -> bool {
        self.maps.iter().fold(true, |ready, map| map.request(ctx) && ready)
    }

    fn unload(&self) {
        self.uniforms.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

#[cfg(test)]
#[path = "material_tests.rs"]
mod tests;
