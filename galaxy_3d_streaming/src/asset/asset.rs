/// Catalog records produced by the pack reader.
///
/// An `Asset` describes where a payload lives in its pack and what the typed
/// header chunk said about it. Records are immutable once committed to the
/// catalog and are shared as `AssetRef`.

use std::fmt;
use std::sync::Arc;
use glam::{Vec3, Vec4};
use crate::platform::FileHandle;

/// Catalog identifier of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(pub u32);

impl AssetId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared reference to a catalog record
pub type AssetRef = Arc<Asset>;

// ===== PAYLOAD =====

/// How the payload bytes are stored in the pack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadEncoding {
    /// No payload chunk (header-only assets such as materials)
    None,
    /// `DATA` chunk, copied verbatim
    Raw,
    /// `CDAT` chunk, fixed-size compressed blocks
    Compressed,
}

/// Location of an asset payload inside its pack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payload {
    pub encoding: PayloadEncoding,
    /// Absolute file offset of the payload chunk contents
    pub datapos: u64,
    /// Size of the decoded payload in bytes
    pub datasize: u64,
    /// Size of the payload chunk as stored
    pub packed_size: u64,
}

impl Payload {
    pub const EMPTY: Payload = Payload {
        encoding: PayloadEncoding::None,
        datapos: 0,
        datasize: 0,
        packed_size: 0,
    };
}

// ===== TYPED HEADERS =====

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextInfo {
    pub length: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub levels: u32,
    pub format: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontInfo {
    pub ascent: u32,
    pub descent: u32,
    pub leading: u32,
    pub glyph_count: u32,
    pub atlas: Option<AssetId>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshInfo {
    pub vertex_count: u32,
    pub index_count: u32,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    pub material: Option<AssetId>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialInfo {
    pub color: Vec4,
    pub metalness: f32,
    pub roughness: f32,
    pub reflectivity: f32,
    pub emissive: f32,
    pub albedo_map: Option<AssetId>,
    pub surface_map: Option<AssetId>,
    pub normal_map: Option<AssetId>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationInfo {
    pub joint_count: u32,
    pub transform_count: u32,
    pub duration: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleInfo {
    pub max_particles: u32,
    pub emitter_count: u32,
    pub lifetime: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelInfo {
    pub mesh_count: u32,
    pub material_count: u32,
    pub node_count: u32,
}

/// Decoded type-specific header
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AssetKind {
    /// No typed header chunk in the record
    Unknown,
    Text(TextInfo),
    Image(ImageInfo),
    Font(FontInfo),
    Mesh(MeshInfo),
    Material(MaterialInfo),
    Animation(AnimationInfo),
    Particle(ParticleInfo),
    Model(ModelInfo),
}

impl AssetKind {
    pub fn name(&self) -> &'static str {
        match self {
            AssetKind::Unknown => "unknown",
            AssetKind::Text(_) => "text",
            AssetKind::Image(_) => "image",
            AssetKind::Font(_) => "font",
            AssetKind::Mesh(_) => "mesh",
            AssetKind::Material(_) => "material",
            AssetKind::Animation(_) => "animation",
            AssetKind::Particle(_) => "particle",
            AssetKind::Model(_) => "model",
        }
    }
}

// ===== ASSET =====

/// One catalog record
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub id: AssetId,
    /// Pack the payload is read from
    pub file: FileHandle,
    pub kind: AssetKind,
    pub payload: Payload,
}

impl Asset {
    /// Decoded payload size in bytes
    pub fn datasize(&self) -> u64 {
        self.payload.datasize
    }

    pub fn as_mesh(&self) -> Option<&MeshInfo> {
        match &self.kind {
            AssetKind::Mesh(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageInfo> {
        match &self.kind {
            AssetKind::Image(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_material(&self) -> Option<&MaterialInfo> {
        match &self.kind {
            AssetKind::Material(info) => Some(info),
            _ => None,
        }
    }
}
