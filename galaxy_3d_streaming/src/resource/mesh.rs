/// Mesh resource: a vertex buffer and an index buffer.
///
/// Streamed meshes come from `MESH` assets whose payload is the vertex array
/// (48-byte `Vertex` records) followed by the `u32` index array.

use std::sync::{Arc, Mutex, PoisonError};
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use crate::asset::{AssetId, AssetRef};
use crate::error::{Error, Result};
use crate::pack::{MESH_INDEX_SIZE, MESH_VERTEX_STRIDE};
use crate::graphics_device::{Buffer, BufferDesc, BufferUsage, UploadDesc, UploadTarget};
use super::resource::{self, Resource, ResourceContext, ResourceHeader, Streamed};
use super::transfer::TransferLump;

/// Interleaved vertex layout shared with the pack format
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub texcoord: [f32; 2],
    pub normal: [f32; 3],
    pub tangent: [f32; 4],
}

pub const VERTEX_SIZE: u64 = std::mem::size_of::<Vertex>() as u64;
const _: () = assert!(VERTEX_SIZE == MESH_VERTEX_STRIDE);

// ===== DESCRIPTOR =====

pub enum MeshDesc {
    /// Stream from a `MESH` asset
    Asset(AssetRef),
    /// Upload these arrays at creation
    Data {
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
    },
}

// ===== MESH =====

#[derive(Default)]
struct MeshBuffers {
    vertex: Option<Arc<dyn Buffer>>,
    index: Option<Arc<dyn Buffer>>,
}

pub struct Mesh {
    header: ResourceHeader,
    vertex_count: u32,
    index_count: u32,
    bounds_min: Vec3,
    bounds_max: Vec3,
    material: Option<AssetId>,
    buffers: Mutex<MeshBuffers>,
    upload: Mutex<Option<TransferLump>>,
}

impl Mesh {
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Axis-aligned bounds as (min, max)
    pub fn bounds(&self) -> (Vec3, Vec3) {
        (self.bounds_min, self.bounds_max)
    }

    /// Material asset named by the mesh header
    pub fn material(&self) -> Option<AssetId> {
        self.material
    }

    pub fn vertex_buffer(&self) -> Option<Arc<dyn Buffer>> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner).vertex.clone()
    }

    pub fn index_buffer(&self) -> Option<Arc<dyn Buffer>> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner).index.clone()
    }

    fn vertex_bytes(&self) -> u64 {
        self.vertex_count as u64 * VERTEX_SIZE
    }

    fn index_bytes(&self) -> u64 {
        self.index_count as u64 * MESH_INDEX_SIZE
    }
}

impl Resource for Mesh {
    type Desc = MeshDesc;
    const KIND: &'static str = "mesh";

    fn create(ctx: &Arc<ResourceContext>, desc: MeshDesc) -> Result<Self> {
        match desc {
            MeshDesc::Asset(asset) => {
                let Some(info) = asset.as_mesh().copied() else {
                    return Err(Error::InvalidResource(format!(
                        "asset {} is a {}, expected a mesh", asset.id, asset.kind.name()
                    )));
                };
                Ok(Self {
                    header: ResourceHeader::streamed(asset),
                    vertex_count: info.vertex_count,
                    index_count: info.index_count,
                    bounds_min: info.bounds_min,
                    bounds_max: info.bounds_max,
                    material: info.material,
                    buffers: Mutex::new(MeshBuffers::default()),
                    upload: Mutex::new(None),
                })
            }
            MeshDesc::Data { vertices, indices } => {
                let (bounds_min, bounds_max) = vertices.iter().fold(
                    (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
                    |(min, max), v| {
                        let p = Vec3::from_array(v.position);
                        (min.min(p), max.max(p))
                    },
                );
                let (bounds_min, bounds_max) = if vertices.is_empty() {
                    (Vec3::ZERO, Vec3::ZERO)
                } else {
                    (bounds_min, bounds_max)
                };

                let mesh = Self {
                    header: ResourceHeader::resident(),
                    vertex_count: vertices.len() as u32,
                    index_count: indices.len() as u32,
                    bounds_min,
                    bounds_max,
                    material: None,
                    buffers: Mutex::new(MeshBuffers::default()),
                    upload: Mutex::new(None),
                };
                let mut bytes = Vec::with_capacity((mesh.vertex_bytes() + mesh.index_bytes()) as usize);
                bytes.extend_from_slice(bytemuck::cast_slice(&vertices));
                bytes.extend_from_slice(bytemuck::cast_slice(&indices));

                let lump = mesh.stage(ctx, &bytes)?;
                ctx.finish_sync_upload(lump, "mesh")?;
                Ok(mesh)
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

impl Streamed for Mesh {
    fn stage(&self, ctx: &ResourceContext, bytes: &[u8]) -> Result<Option<TransferLump>> {
        let vertex_bytes = self.vertex_bytes();
        let index_bytes = self.index_bytes();
        if bytes.len() as u64 != vertex_bytes + index_bytes {
            return Err(Error::InvalidResource(format!(
                "mesh payload is {} bytes, expected {} ({} vertices, {} indices)",
                bytes.len(), vertex_bytes + index_bytes, self.vertex_count, self.index_count
            )));
        }

        let Some(mut lump) = ctx.transfer.acquire_lump(bytes.len() as u64)? else {
            return Ok(None);
        };
        lump.write(0, bytes)?;

        let mut device = ctx.lock_device();
        let vertex = device.create_buffer(BufferDesc {
            size: vertex_bytes,
            usage: BufferUsage::VERTEX | BufferUsage::TRANSFER_DST,
        })?;
        let index = device.create_buffer(BufferDesc {
            size: index_bytes,
            usage: BufferUsage::INDEX | BufferUsage::TRANSFER_DST,
        })?;

        let mut regions = Vec::with_capacity(2);
        if vertex_bytes > 0 {
            regions.push(lump.upload_region(0, vertex_bytes,
                UploadTarget::Buffer { buffer: Arc::clone(&vertex), offset: 0 }));
        }
        if index_bytes > 0 {
            regions.push(lump.upload_region(vertex_bytes, index_bytes,
                UploadTarget::Buffer { buffer: Arc::clone(&index), offset: 0 }));
        }
        let fence = device.submit_upload(UploadDesc { regions })?;
        drop(device);
        lump.set_fence(fence);

        *self.buffers.lock().unwrap_or_else(PoisonError::into_inner) = MeshBuffers {
            vertex: Some(vertex),
            index: Some(index),
        };
        Ok(Some(lump))
    }

    fn pending_upload(&self) -> &Mutex<Option<TransferLump>> {
        &self.upload
    }

    fn unload(&self) {
        *self.buffers.lock().unwrap_or_else(PoisonError::into_inner) = MeshBuffers::default();
    }
}

#[cfg(test)]
#[path = "mesh_tests.rs"]
mod tests;
