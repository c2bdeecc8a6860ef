/// Pooled edges of the renderable/light overlap graph.
///
/// An edge exists exactly while the bounding spheres of its two endpoints
/// overlap. Each edge sits on two doubly-linked lists at once:
///
/// - the renderable-anchored list (all lights touching one renderable),
///   linked through `prev_light`/`next_light`, ascending light UID
/// - the light-anchored list (all renderables touched by one light),
///   linked through `prev_renderable`/`next_renderable`, ascending
///   renderable UID
///
/// Links are pool keys instead of pointers, so unlinking is O(1) without
/// aliasing hazards; the list heads live on the spatial records.

use slotmap::{new_key_type, SlotMap};
use std::ops::{Index, IndexMut};
use super::graphics_scene::{LightHandle, RenderableHandle};

new_key_type! {
    /// Stable key of a pooled intersection edge.
    ///
    /// Keys remain valid until the edge is destroyed; a destroyed key is
    /// never resolved again (the pool generation changes on slot reuse).
    pub struct IntersectionKey;
}

/// One (renderable, light) overlap.
#[derive(Debug, Clone, Copy)]
pub struct ObjectLightIntersection {
    pub(crate) renderable: RenderableHandle,
    pub(crate) light: LightHandle,
    pub(crate) renderable_uid: u32,
    pub(crate) light_uid: u32,
    /// Renderable bounds revision this edge was last validated against
    pub(crate) renderable_bounds_version: u32,
    /// Light bounds revision this edge was last validated against
    pub(crate) light_bounds_version: u32,
    // Renderable-anchored list (ascending light UID)
    pub(crate) prev_light: Option<IntersectionKey>,
    pub(crate) next_light: Option<IntersectionKey>,
    // Light-anchored list (ascending renderable UID)
    pub(crate) prev_renderable: Option<IntersectionKey>,
    pub(crate) next_renderable: Option<IntersectionKey>,
}

impl ObjectLightIntersection {
    /// Handle of the renderable endpoint.
    pub fn renderable(&self) -> RenderableHandle {
        self.renderable
    }

    /// Handle of the light endpoint.
    pub fn light(&self) -> LightHandle {
        self.light
    }

    /// Next edge in the renderable's list (next light by UID).
    pub fn next_light(&self) -> Option<IntersectionKey> {
        self.next_light
    }

    /// Next edge in the light's list (next renderable by UID).
    pub fn next_renderable(&self) -> Option<IntersectionKey> {
        self.next_renderable
    }

    pub fn renderable_bounds_version(&self) -> u32 {
        self.renderable_bounds_version
    }

    pub fn light_bounds_version(&self) -> u32 {
        self.light_bounds_version
    }
}

/// Free-list pool of intersection edges.
pub struct IntersectionPool {
    edges: SlotMap<IntersectionKey, ObjectLightIntersection>,
}

impl IntersectionPool {
    pub fn new() -> IntersectionPool {
        IntersectionPool {
            edges: SlotMap::with_key(),
        }
    }

    /// Number of live edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn get(&self, key: IntersectionKey) -> Option<&ObjectLightIntersection> {
        self.edges.get(key)
    }

    pub(crate) fn alloc(&mut self, edge: ObjectLightIntersection) -> IntersectionKey {
        self.edges.insert(edge)
    }

    pub(crate) fn release(&mut self, key: IntersectionKey) {
        let edge = self.edges.remove(key);
        debug_assert!(edge.is_some(), "releasing a dead intersection edge");
    }
}

impl Index<IntersectionKey> for IntersectionPool {
    type Output = ObjectLightIntersection;

    fn index(&self, key: IntersectionKey) -> &ObjectLightIntersection {
        &self.edges[key]
    }
}

impl IndexMut<IntersectionKey> for IntersectionPool {
    fn index_mut(&mut self, key: IntersectionKey) -> &mut ObjectLightIntersection {
        &mut self.edges[key]
    }
}
