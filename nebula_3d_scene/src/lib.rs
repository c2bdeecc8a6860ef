/*!
# Nebula 3D Scene

Dynamic spatial index for the Nebula 3D rendering stack.

This crate indexes moving renderables and lights inside a bounded world
volume so a renderer can cull objects against a camera frustum and keep an
incremental map of which lights affect which objects. It is a pure
in-process data structure layer: transforms come from the scene graph,
visibility results go to the renderer.

## Architecture

- **GraphicsScene**: owning registry of renderables and lights
- **SpatialTree**: Morton-addressed loose octree over a sparse node array
- **VisibilityCache**: hierarchical frustum classification of tree nodes
- **ObjectLightIntersection**: pooled edges of the renderable/light overlap graph
- **SimdFrustum**: batched-plane frustum input for the visibility pass

All mutation is single-threaded; the visibility pass is a read-only walk
and may run from several views concurrently as long as no mutation
interleaves, with each view owning its own `VisibilityCache`.
*/

// Internal modules
mod error;
pub mod log;
pub mod camera;
pub mod math;
pub mod scene;
pub mod utils;

// Main nebula3d namespace module
pub mod nebula3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
        // Note: scene_* macros are NOT re-exported here - they are internal only
    }

    // Camera sub-module (frustum input for visibility tests)
    pub mod camera {
        pub use crate::camera::*;
    }

    // Scene sub-module with the spatial index types
    pub mod scene {
        pub use crate::scene::*;
    }
}

// Re-export math library at crate root
pub use glam;
