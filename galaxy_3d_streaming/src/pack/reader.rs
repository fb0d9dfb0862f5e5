/// Pack reader: walks the chunk stream and builds catalog records.
///
/// Only headers are read here. Payload chunks are located (offset, stored size,
/// decoded size) and skipped; the asset cache streams them later.

use bytemuck::Pod;
use glam::{Vec3, Vec4};
use crate::asset::{
    Asset, AssetId, AssetKind, Payload, PayloadEncoding,
    TextInfo, ImageInfo, FontInfo, MeshInfo, MaterialInfo,
    AnimationInfo, ParticleInfo, ModelInfo,
};
use crate::error::{Error, Result};
use crate::platform::{FileHandle, FileIo};
use super::compress::block_uncompressed_len;
use super::format::*;

/// Record being assembled between `ASET` and `AEND`
struct RecordBuilder {
    id: AssetId,
    kind: AssetKind,
    payload: Payload,
}

/// Sequential chunk walker over one pack file
pub struct PackReader<'a> {
    io: &'a dyn FileIo,
    handle: FileHandle,
    path: &'a str,
    id_base: u32,
}

impl<'a> PackReader<'a> {
    /// Parse every record of the pack at `path`.
    ///
    /// Nothing is returned unless the whole file parses.
    pub fn load(io: &'a dyn FileIo, path: &'a str) -> Result<Vec<Asset>> {
        let handle = io.open(path)?;
        let mut reader = PackReader { io, handle, path, id_base: 0 };
        reader.read_all()
    }

    fn read_all(&mut self) -> Result<Vec<Asset>> {
        let mut signature = [0u8; 8];
        self.read_bytes(0, &mut signature)?;
        if signature != SIGNATURE {
            return Err(Error::InvalidFormat(format!("'{}' has no pack signature", self.path)));
        }

        let mut position = SIGNATURE.len() as u64;
        let mut catalog: Option<CatalogChunk> = None;
        let mut current: Option<RecordBuilder> = None;
        let mut assets = Vec::new();

        loop {
            let header: ChunkHeader = self.read_struct(position, std::mem::size_of::<ChunkHeader>() as u64)?;
            let chunk_type = ChunkType(header.chunk_type);
            let payload_pos = position + std::mem::size_of::<ChunkHeader>() as u64;
            let length = header.length as u64;

            match chunk_type {
                ChunkType::HEND => break,
                ChunkType::CATL => {
                    let chunk: CatalogChunk = self.read_struct(payload_pos, length)?;
                    if chunk.magic != PACK_MAGIC {
                        return Err(Error::VersionMismatch { expected: PACK_MAGIC, found: chunk.magic });
                    }
                    if chunk.version != PACK_VERSION {
                        return Err(Error::VersionMismatch { expected: PACK_VERSION, found: chunk.version });
                    }
                    self.id_base = chunk.offset;
                    catalog = Some(chunk);
                }
                ChunkType::ASET => {
                    if catalog.is_none() {
                        return Err(self.format_error(position, "ASET before CATL"));
                    }
                    if let Some(open) = &current {
                        return Err(self.format_error(position, &format!("record {} has no AEND", open.id)));
                    }
                    let chunk: AssetChunk = self.read_struct(payload_pos, length)?;
                    current = Some(RecordBuilder {
                        id: AssetId(self.rebase(chunk.id)?),
                        kind: AssetKind::Unknown,
                        payload: Payload::EMPTY,
                    });
                }
                ChunkType::AEND => {
                    let record = current.take()
                        .ok_or_else(|| self.format_error(position, "AEND outside a record"))?;
                    assets.push(Asset {
                        id: record.id,
                        file: self.handle,
                        kind: record.kind,
                        payload: record.payload,
                    });
                }
                ChunkType::DATA => {
                    let record = self.open_record(&mut current, position, chunk_type)?;
                    record.payload = Payload {
                        encoding: PayloadEncoding::Raw,
                        datapos: payload_pos,
                        datasize: length,
                        packed_size: length,
                    };
                }
                ChunkType::CDAT => {
                    let datasize = self.compressed_size(payload_pos, length)?;
                    let record = self.open_record(&mut current, position, chunk_type)?;
                    record.payload = Payload {
                        encoding: PayloadEncoding::Compressed,
                        datapos: payload_pos,
                        datasize,
                        packed_size: length,
                    };
                }
                ChunkType::TEXT | ChunkType::IMAG | ChunkType::FONT | ChunkType::MESH
                | ChunkType::MATL | ChunkType::ANIM | ChunkType::PART | ChunkType::MODL => {
                    let kind = self.read_kind(chunk_type, payload_pos, length)?;
                    let record = self.open_record(&mut current, position, chunk_type)?;
                    if record.kind != AssetKind::Unknown {
                        return Err(self.format_error(position, &format!(
                            "record {} has a second header chunk {}", record.id, chunk_type
                        )));
                    }
                    record.kind = kind;
                }
                other => {
                    crate::engine_warn!("galaxy3d::PackReader",
                        "Skipping unknown chunk {} ({} bytes) at offset {} in '{}'",
                        other, length, position, self.path);
                }
            }

            position = payload_pos + length;
        }

        if let Some(open) = current {
            return Err(Error::InvalidFormat(format!(
                "'{}': record {} has no AEND before HEND", self.path, open.id
            )));
        }
        let catalog = catalog.ok_or_else(|| {
            Error::InvalidFormat(format!("'{}' has no CATL chunk", self.path))
        })?;
        if catalog.length as usize != assets.len() {
            return Err(Error::InvalidFormat(format!(
                "'{}': catalog announces {} assets, found {}",
                self.path, catalog.length, assets.len()
            )));
        }

        Ok(assets)
    }

    fn open_record<'r>(
        &self,
        current: &'r mut Option<RecordBuilder>,
        position: u64,
        chunk_type: ChunkType,
    ) -> Result<&'r mut RecordBuilder> {
        current.as_mut()
            .ok_or_else(|| self.format_error(position, &format!("{} outside a record", chunk_type)))
    }

    fn read_kind(&self, chunk_type: ChunkType, position: u64, length: u64) -> Result<AssetKind> {
        let kind = match chunk_type {
            ChunkType::TEXT => {
                let c: TextChunk = self.read_struct(position, length)?;
                AssetKind::Text(TextInfo { length: c.length })
            }
            ChunkType::IMAG => {
                let c: ImageChunk = self.read_struct(position, length)?;
                AssetKind::Image(ImageInfo {
                    width: c.width,
                    height: c.height,
                    layers: c.layers,
                    levels: c.levels,
                    format: c.format,
                })
            }
            ChunkType::FONT => {
                let c: FontChunk = self.read_struct(position, length)?;
                AssetKind::Font(FontInfo {
                    ascent: c.ascent,
                    descent: c.descent,
                    leading: c.leading,
                    glyph_count: c.glyphcount,
                    atlas: self.reference(c.atlas)?,
                })
            }
            ChunkType::MESH => {
                let c: MeshChunk = self.read_struct(position, length)?;
                AssetKind::Mesh(MeshInfo {
                    vertex_count: c.vertexcount,
                    index_count: c.indexcount,
                    bounds_min: Vec3::from_array(c.mincorner),
                    bounds_max: Vec3::from_array(c.maxcorner),
                    material: self.reference(c.material)?,
                })
            }
            ChunkType::MATL => {
                let c: MaterialChunk = self.read_struct(position, length)?;
                AssetKind::Material(MaterialInfo {
                    color: Vec4::from_array(c.color),
                    metalness: c.metalness,
                    roughness: c.roughness,
                    reflectivity: c.reflectivity,
                    emissive: c.emissive,
                    albedo_map: self.reference(c.albedomap)?,
                    surface_map: self.reference(c.surfacemap)?,
                    normal_map: self.reference(c.normalmap)?,
                })
            }
            ChunkType::ANIM => {
                let c: AnimationChunk = self.read_struct(position, length)?;
                AssetKind::Animation(AnimationInfo {
                    joint_count: c.jointcount,
                    transform_count: c.transformcount,
                    duration: c.duration,
                })
            }
            ChunkType::PART => {
                let c: ParticleChunk = self.read_struct(position, length)?;
                AssetKind::Particle(ParticleInfo {
                    max_particles: c.maxparticles,
                    emitter_count: c.emittercount,
                    lifetime: c.lifetime,
                })
            }
            ChunkType::MODL => {
                let c: ModelChunk = self.read_struct(position, length)?;
                AssetKind::Model(ModelInfo {
                    mesh_count: c.meshcount,
                    material_count: c.materialcount,
                    node_count: c.nodecount,
                })
            }
            other => return Err(self.format_error(position, &format!("{} is not a header chunk", other))),
        };
        Ok(kind)
    }

    /// Sum the decoded sizes of a `CDAT` run without decompressing it
    fn compressed_size(&self, position: u64, length: u64) -> Result<u64> {
        let block = BLOCK_SIZE as u64;
        if length % block != 0 {
            return Err(self.format_error(position, &format!(
                "CDAT length {} is not a multiple of {}", length, block
            )));
        }

        let mut total = 0u64;
        let mut prefix = [0u8; 8];
        for index in 0..length / block {
            self.read_bytes(position + index * block, &mut prefix)?;
            let decoded = block_uncompressed_len(&prefix)
                .map_err(|e| self.format_error(position, &format!("CDAT block {}: {}", index, e)))?;
            total += decoded as u64;
        }
        Ok(total)
    }

    fn rebase(&self, id: u32) -> Result<u32> {
        id.checked_add(self.id_base)
            .filter(|rebased| *rebased != NO_ASSET)
            .ok_or_else(|| Error::InvalidFormat(format!(
                "'{}': asset id {} overflows with base {}", self.path, id, self.id_base
            )))
    }

    fn reference(&self, id: u32) -> Result<Option<AssetId>> {
        if id == NO_ASSET {
            Ok(None)
        } else {
            self.rebase(id).map(|id| Some(AssetId(id)))
        }
    }

    fn read_struct<T: Pod>(&self, position: u64, length: u64) -> Result<T> {
        let expected = std::mem::size_of::<T>() as u64;
        if length != expected {
            return Err(self.format_error(position, &format!(
                "chunk is {} bytes, expected {}", length, expected
            )));
        }
        let mut bytes = vec![0u8; expected as usize];
        self.read_bytes(position, &mut bytes)?;
        bytemuck::try_pod_read_unaligned(&bytes)
            .map_err(|e| self.format_error(position, &format!("{:?}", e)))
    }

    fn read_bytes(&self, position: u64, buffer: &mut [u8]) -> Result<()> {
        self.io.read_exact(self.handle, position, buffer).map_err(|e| match e {
            Error::Io(msg) => Error::InvalidFormat(format!("'{}' is truncated: {}", self.path, msg)),
            other => other,
        })
    }

    fn format_error(&self, position: u64, message: &str) -> Error {
        Error::InvalidFormat(format!("'{}' at offset {}: {}", self.path, position, message))
    }
}

#[cfg(test)]
#[path = "reader_tests.rs"]
mod tests;
