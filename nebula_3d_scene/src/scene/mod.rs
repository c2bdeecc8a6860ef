//! Scene spatial index module
//!
//! Provides the owning scene index (registries + loose octree), the
//! per-view visibility cache, and the object/light intersection graph.

mod bounds;
mod spatial_tree;
mod intersections;
mod graphics_scene;
mod visibility;

pub use bounds::{Sphere, AABB};
pub use spatial_tree::{SpatialTree, TreeNode, NO_SPATIAL_TREE_NODE};
pub use intersections::{IntersectionKey, ObjectLightIntersection};
pub use graphics_scene::{
    GraphicsScene, LightHandle, LightRecord, LightRef, RecordFlags, RenderableHandle,
    RenderableRecord, RenderableRef, SpatialRecord,
};
pub use visibility::{test_spatial_tree_visibility, VisibilityCache};
