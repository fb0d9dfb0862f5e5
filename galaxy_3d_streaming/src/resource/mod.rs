//! Resource management module
//!
//! GPU resources streamed from the asset cache: per-resource load state
//! machines, staging memory for uploads, deferred destruction, and the
//! manager that owns them all.

mod resource_manager;
pub mod resource;
pub mod state;
pub mod slot_pool;
pub mod transfer;
pub mod destroy_queue;
pub mod mesh;
pub mod texture;
pub mod material;

pub use resource_manager::{ResourceManager, ResourceKey, Handle};
pub use resource::{Resource, ResourceContext, ResourceHeader};
pub use state::{ResourceState, AtomicResourceState};
pub use slot_pool::{ResourceSlotPool, SlotRange};
pub use transfer::{TransferArena, TransferLump, LUMP_ALIGNMENT};
pub use destroy_queue::{DeferredDestroyQueue, DestroyToken};
pub use mesh::{Mesh, MeshDesc, Vertex, VERTEX_SIZE};
pub use texture::{Texture, TextureDesc};
pub use material::{
    Material, MaterialDesc, MaterialMaps,
    MaterialParams, MaterialUniform,
};
