/*!
# Galaxy 3D Streaming

Asset streaming core for the Galaxy 3D engine.

Binary asset packs are read into a catalog at load time; payloads are pulled
into a fixed-size memory slab on demand and evicted least-recently-used
first. GPU resources built from those payloads load through non-blocking
`request()` calls that advance an atomic state machine one step per frame.

## Architecture

- **pack**: chunked pack format, LZ4 block compression, reader and writer
- **asset**: catalog records, slab allocator, `AssetCache`
- **resource**: `ResourceManager`, `Mesh` / `Texture` / `Material`, staging
  memory (`TransferArena`) and deferred destruction
- **graphics_device** / **platform**: the capabilities the core consumes
  (GPU device, file I/O, job queue)
- **context**: both managers built together from a `StreamingConfig`

Nothing is global except the logger.
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod config;
pub mod platform;
pub mod pack;
pub mod asset;
pub mod graphics_device;
pub mod resource;
pub mod context;

#[cfg(test)]
mod test_utils;

// Main galaxy3d namespace module
pub mod galaxy3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine logger hub
    pub use crate::engine::Engine;

    // Configuration and context
    pub use crate::config::StreamingConfig;
    pub use crate::context::Context;

    // Logging sub-module (types only, macros live at the crate root)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger, LogLatch};
    }

    pub mod asset {
        pub use crate::asset::*;
    }

    pub mod pack {
        pub use crate::pack::*;
    }

    pub mod platform {
        pub use crate::platform::*;
    }

    pub mod graphics_device {
        pub use crate::graphics_device::*;
    }

    pub mod resource {
        pub use crate::resource::*;
    }
}

// Re-export math library at crate root
pub use glam;
