/// Asset catalog records, slab allocator and the asset cache

pub mod asset;
pub mod slab;
pub mod asset_cache;

pub use asset::{
    Asset, AssetId, AssetRef, AssetKind, Payload, PayloadEncoding,
    TextInfo, ImageInfo, FontInfo, MeshInfo, MaterialInfo,
    AnimationInfo, ParticleInfo, ModelInfo,
};
pub use slab::{SlabAllocator, SlabUsage, SlotId, SlotState};
pub use asset_cache::{AssetCache, AssetBytes, BarrierHandle, CacheStats};
