/// GraphicsScene — the owning spatial index for renderables and lights.
///
/// Holds two UID-ordered registries (renderables, lights) of spatial
/// records, the loose octree they are indexed in, and the pooled graph of
/// (renderable, light) sphere overlaps. The owning frame loop drives the
/// registry mutators; per view, the renderer runs the visibility pass;
/// per frame, lighting systems call the intersection update for objects
/// whose bounds changed.
///
/// Ownership: the caller creates and owns the scene and passes it by
/// reference through the API; there is no hidden global state. All
/// mutation must happen on one thread; the visibility test is read-only
/// and may run concurrently from several views between mutations.

use std::collections::BTreeMap;
use std::sync::Arc;

use bitflags::bitflags;
use glam::Vec3;
use slotmap::{new_key_type, SlotMap};

use crate::camera::SimdFrustum;
use crate::error::Result;
use crate::math::morton::{morton_lca, MortonCode};
use crate::{scene_info, scene_trace};

use super::bounds::{bounds_valid, Sphere, AABB};
use super::intersections::{IntersectionKey, IntersectionPool, ObjectLightIntersection};
use super::spatial_tree::{SpatialTree, NO_SPATIAL_TREE_NODE};
use super::visibility::{self, VisibilityCache};

// ===== OWNER CAPABILITIES =====

/// Capability interface of a renderable's owner object.
///
/// The scene index never looks inside a renderable; the trait only keeps
/// owner references shareable across threads.
pub trait RenderableRef: Send + Sync {}

/// Capability interface of a light's owner object.
pub trait LightRef: Send + Sync {
    /// Precise overlap test between this light's volume and a bounding
    /// sphere. Called during intersection graph updates; may be tighter
    /// than a sphere/sphere test (spot cone, box light, etc.).
    fn intersects_sphere(&self, sphere: &Sphere) -> bool;
}

// ===== HANDLES =====

new_key_type! {
    /// Stable handle to a renderable's spatial record.
    ///
    /// Valid until the renderable is removed; the slot generation catches
    /// stale reuse.
    pub struct RenderableHandle;

    /// Stable handle to a light's spatial record.
    pub struct LightHandle;
}

// ===== RECORD FLAGS =====

bitflags! {
    /// Per-record notification opt-ins for the intersection graph.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RecordFlags: u8 {
        /// Bump the intersections version when a contact appears or disappears
        const NOTIFY_CONTACT_CHANGES = 1 << 0;
        /// Bump the intersections version when an existing contact's bounds move
        const NOTIFY_RELATIVE_MOVEMENT = 1 << 1;
    }
}

// ===== SPATIAL RECORD =====

/// Registry entry of one indexed object.
///
/// `bounds_version == 0` means "no valid bounds": the object stays
/// registered but is excluded from the tree and from intersection
/// tracking. Any positive value is a monotonically increasing revision
/// stamp of the world bounds.
pub struct SpatialRecord<A> {
    uid: u32,
    attr: A,
    box_center: Vec3,
    box_extent: Vec3,
    sphere: Sphere,
    node_index: u32,
    morton_code: MortonCode,
    bounds_version: u32,
    intersections_head: Option<IntersectionKey>,
    track_intersections: u8,
    intersections_seen_bounds_version: u32,
    intersections_version: u16,
    flags: RecordFlags,
}

impl<A> SpatialRecord<A> {
    fn new(
        uid: u32,
        attr: A,
        box_center: Vec3,
        box_extent: Vec3,
        sphere: Sphere,
        node_index: u32,
        morton_code: MortonCode,
        bounds_version: u32,
    ) -> SpatialRecord<A> {
        SpatialRecord {
            uid,
            attr,
            box_center,
            box_extent,
            sphere,
            node_index,
            morton_code,
            bounds_version,
            intersections_head: None,
            track_intersections: 0,
            intersections_seen_bounds_version: 0,
            intersections_version: 0,
            flags: RecordFlags::empty(),
        }
    }

    /// Registry UID; monotonically assigned, never reused in a session.
    pub fn uid(&self) -> u32 {
        self.uid
    }

    /// The opaque owner object.
    pub fn attr(&self) -> &A {
        &self.attr
    }

    /// World-space box center.
    pub fn box_center(&self) -> Vec3 {
        self.box_center
    }

    /// World-space box half-size.
    pub fn box_extent(&self) -> Vec3 {
        self.box_extent
    }

    /// World-space bounding sphere.
    pub fn sphere(&self) -> Sphere {
        self.sphere
    }

    /// Spatial tree node this record is accounted in, or
    /// [`NO_SPATIAL_TREE_NODE`] when unindexed.
    pub fn node_index(&self) -> u32 {
        self.node_index
    }

    /// Morton code of the record's tree cell (0 when unindexed).
    pub fn morton_code(&self) -> MortonCode {
        self.morton_code
    }

    /// Bounds revision stamp; 0 means invalid/unindexed bounds.
    pub fn bounds_version(&self) -> u32 {
        self.bounds_version
    }

    /// Whether the record currently occupies a tree node.
    pub fn is_indexed(&self) -> bool {
        self.node_index != NO_SPATIAL_TREE_NODE
    }

    /// First edge of this record's intersection list.
    pub fn intersections_head(&self) -> Option<IntersectionKey> {
        self.intersections_head
    }

    /// Whether intersection tracking is currently enabled.
    pub fn is_tracking_intersections(&self) -> bool {
        self.track_intersections > 0
    }

    /// 16-bit change counter of this record's intersection set, driven by
    /// the notification opt-ins in [`RecordFlags`].
    pub fn intersections_version(&self) -> u16 {
        self.intersections_version
    }

    /// Current notification opt-ins.
    pub fn flags(&self) -> RecordFlags {
        self.flags
    }
}

/// Record type of the renderable registry.
pub type RenderableRecord = SpatialRecord<Arc<dyn RenderableRef>>;
/// Record type of the light registry.
pub type LightRecord = SpatialRecord<Arc<dyn LightRef>>;

// ===== GRAPHICS SCENE =====

/// The spatial index over one world volume.
pub struct GraphicsScene {
    tree: SpatialTree,
    renderables: SlotMap<RenderableHandle, RenderableRecord>,
    lights: SlotMap<LightHandle, LightRecord>,
    renderables_by_uid: BTreeMap<u32, RenderableHandle>,
    lights_by_uid: BTreeMap<u32, LightHandle>,
    next_renderable_uid: u32,
    next_light_uid: u32,
    intersections: IntersectionPool,
}

impl GraphicsScene {
    /// Create a scene index for a cubic world volume centered at
    /// `world_center` with edge length `world_size`, subdivided
    /// `hierarchy_depth` times (clamped to the deepest representable
    /// level).
    pub fn new(world_center: Vec3, world_size: f32, hierarchy_depth: u8) -> Result<GraphicsScene> {
        let tree = SpatialTree::new(world_center, world_size, hierarchy_depth)?;
        scene_info!(
            "nebula3d::GraphicsScene",
            "Scene index created: world size {}, hierarchy depth {}",
            world_size,
            tree.max_depth()
        );
        Ok(GraphicsScene {
            tree,
            renderables: SlotMap::with_key(),
            lights: SlotMap::with_key(),
            renderables_by_uid: BTreeMap::new(),
            lights_by_uid: BTreeMap::new(),
            next_renderable_uid: 0,
            next_light_uid: 0,
            intersections: IntersectionPool::new(),
        })
    }

    // ===== REGISTRY: ADD =====

    /// Register a renderable with its world bounds.
    ///
    /// Invalid boxes (NaN, infinite, inverted) leave the object
    /// registered but unindexed. The returned handle stays valid until
    /// [`remove_renderable`](Self::remove_renderable).
    pub fn add_renderable(
        &mut self,
        global_box: &AABB,
        sphere: Sphere,
        attr: Arc<dyn RenderableRef>,
    ) -> RenderableHandle {
        let uid = self.next_renderable_uid;
        // If this assert is ever triggered, compacting of existing UIDs may
        // be implemented; until then the UID space is a session limit.
        debug_assert!(uid < u32::MAX, "renderable UID space exhausted");
        self.next_renderable_uid += 1;

        let record = make_record(&mut self.tree, uid, global_box, sphere, attr);
        scene_trace!(
            "nebula3d::GraphicsScene",
            "Renderable {} added (node {})",
            uid,
            record.node_index
        );
        let handle = self.renderables.insert(record);
        self.renderables_by_uid.insert(uid, handle);
        handle
    }

    /// Register a light with its world bounds. See
    /// [`add_renderable`](Self::add_renderable).
    pub fn add_light(
        &mut self,
        global_box: &AABB,
        sphere: Sphere,
        attr: Arc<dyn LightRef>,
    ) -> LightHandle {
        let uid = self.next_light_uid;
        debug_assert!(uid < u32::MAX, "light UID space exhausted");
        self.next_light_uid += 1;

        let record = make_record(&mut self.tree, uid, global_box, sphere, attr);
        scene_trace!(
            "nebula3d::GraphicsScene",
            "Light {} added (node {})",
            uid,
            record.node_index
        );
        let handle = self.lights.insert(record);
        self.lights_by_uid.insert(uid, handle);
        handle
    }

    // ===== REGISTRY: UPDATE =====

    /// Update a renderable's world bounds after a transform change.
    ///
    /// A geometrically unchanged box is a no-op. Otherwise the bounds
    /// revision advances (or drops to 0 when the new box is invalid) and
    /// the tree placement moves along the path between the old and the
    /// new cell only.
    pub fn update_renderable_bounds(
        &mut self,
        handle: RenderableHandle,
        global_box: &AABB,
        sphere: Sphere,
    ) {
        let Some(record) = self.renderables.get_mut(handle) else {
            debug_assert!(false, "updating bounds of a stale renderable handle");
            return;
        };
        update_record_bounds(&mut self.tree, record, global_box, sphere);
    }

    /// Update a light's world bounds. See
    /// [`update_renderable_bounds`](Self::update_renderable_bounds).
    pub fn update_light_bounds(&mut self, handle: LightHandle, global_box: &AABB, sphere: Sphere) {
        let Some(record) = self.lights.get_mut(handle) else {
            debug_assert!(false, "updating bounds of a stale light handle");
            return;
        };
        update_record_bounds(&mut self.tree, record, global_box, sphere);
    }

    // ===== REGISTRY: REMOVE =====

    /// Unregister a renderable, destroying all its intersection edges and
    /// unwinding its tree path. The handle becomes invalid.
    pub fn remove_renderable(&mut self, handle: RenderableHandle) {
        let Some(record) = self.renderables.remove(handle) else {
            debug_assert!(false, "removing a stale renderable handle");
            return;
        };

        // Every edge anchored here must also leave its light's list
        let mut next = record.intersections_head;
        while let Some(key) = next {
            let edge = self.intersections[key];
            next = edge.next_light;
            if let Some(light_record) = self.lights.get_mut(edge.light) {
                unlink_from_light_list(&mut self.intersections, light_record, key);
                bump_intersections_version(light_record, RecordFlags::NOTIFY_CONTACT_CHANGES);
            }
            self.intersections.release(key);
        }

        self.tree.remove(record.node_index, record.morton_code, 0);
        self.renderables_by_uid.remove(&record.uid);
        scene_trace!("nebula3d::GraphicsScene", "Renderable {} removed", record.uid);
    }

    /// Unregister a light. See [`remove_renderable`](Self::remove_renderable).
    pub fn remove_light(&mut self, handle: LightHandle) {
        let Some(record) = self.lights.remove(handle) else {
            debug_assert!(false, "removing a stale light handle");
            return;
        };

        let mut next = record.intersections_head;
        while let Some(key) = next {
            let edge = self.intersections[key];
            next = edge.next_renderable;
            if let Some(renderable_record) = self.renderables.get_mut(edge.renderable) {
                unlink_from_renderable_list(&mut self.intersections, renderable_record, key);
                bump_intersections_version(renderable_record, RecordFlags::NOTIFY_CONTACT_CHANGES);
            }
            self.intersections.release(key);
        }

        self.tree.remove(record.node_index, record.morton_code, 0);
        self.lights_by_uid.remove(&record.uid);
        scene_trace!("nebula3d::GraphicsScene", "Light {} removed", record.uid);
    }

    // ===== INTERSECTION TRACKING =====

    /// Enable or disable object/light intersection tracking for a
    /// renderable. Tracking is refcounted; disabling never destroys
    /// existing edges because they may remain valid for consumers that
    /// still read them (e.g. under changed visibility).
    pub fn track_renderable_light_intersections(&mut self, handle: RenderableHandle, track: bool) {
        let Some(record) = self.renderables.get_mut(handle) else {
            debug_assert!(false, "tracking toggle on a stale renderable handle");
            return;
        };
        toggle_tracking(record, track);
    }

    /// Enable or disable intersection tracking for a light. Lights that
    /// are not tracking neither gain nor lose edges during updates.
    pub fn track_light_intersections(&mut self, handle: LightHandle, track: bool) {
        let Some(record) = self.lights.get_mut(handle) else {
            debug_assert!(false, "tracking toggle on a stale light handle");
            return;
        };
        toggle_tracking(record, track);
    }

    /// Choose which intersection events advance the renderable's
    /// 16-bit intersections version.
    pub fn set_renderable_notification_flags(&mut self, handle: RenderableHandle, flags: RecordFlags) {
        if let Some(record) = self.renderables.get_mut(handle) {
            record.flags = flags;
        }
    }

    /// Choose which intersection events advance the light's 16-bit
    /// intersections version.
    pub fn set_light_notification_flags(&mut self, handle: LightHandle, flags: RecordFlags) {
        if let Some(record) = self.lights.get_mut(handle) {
            record.flags = flags;
        }
    }

    // ===== INTERSECTION UPDATE =====

    /// Re-derive the renderable's light contacts after a bounds change.
    ///
    /// Runs a linear merge of the UID-ordered light registry against the
    /// renderable's UID-ordered edge list: new overlaps allocate a pooled
    /// edge spliced into both lists, vanished overlaps release theirs.
    /// A repeated call at an unchanged bounds revision is a no-op, and an
    /// edge whose stamps already match both endpoints is skipped.
    pub fn update_renderable_light_intersections(&mut self, handle: RenderableHandle) {
        let (r_uid, r_bounds_version, r_sphere, head) = {
            let Some(record) = self.renderables.get_mut(handle) else {
                debug_assert!(false, "intersection update on a stale renderable handle");
                return;
            };
            debug_assert!(
                record.track_intersections > 0,
                "intersection update without tracking enabled"
            );
            debug_assert!(record.bounds_version > 0, "intersection update with invalid bounds");
            if record.track_intersections == 0 || record.bounds_version == 0 {
                return;
            }
            // Already processed at this bounds revision
            if record.intersections_seen_bounds_version == record.bounds_version {
                return;
            }
            record.intersections_seen_bounds_version = record.bounds_version;
            (record.uid, record.bounds_version, record.sphere, record.intersections_head)
        };

        // Merge cursor into the renderable's edge list and the last edge
        // that survived the merge so far (the splice point for new edges).
        let mut sync = head;
        let mut tail: Option<IntersectionKey> = None;

        for (&light_uid, &light_key) in &self.lights_by_uid {
            // The edge list holds only lights that still exist, so the
            // cursor's UID can never fall behind the registry iterator.
            let matching = match sync {
                Some(k) if self.intersections[k].light_uid == light_uid => Some(k),
                Some(k) => {
                    debug_assert!(self.intersections[k].light_uid > light_uid);
                    None
                }
                None => None,
            };
            if let Some(k) = matching {
                sync = self.intersections[k].next_light;
                // Up to date already (both endpoints updated this frame)
                if self.intersections[k].renderable_bounds_version == r_bounds_version {
                    tail = Some(k);
                    continue;
                }
            }

            // A light that is not tracking neither creates nor erases
            // edges; an existing edge may outlive the tracking toggle.
            let (l_track, l_bounds_version) = {
                let light_record = &self.lights[light_key];
                (light_record.track_intersections, light_record.bounds_version)
            };
            if l_track == 0 {
                if let Some(k) = matching {
                    tail = Some(k);
                }
                continue;
            }

            // Only lights with valid bounds track intersections
            let intersects = l_bounds_version > 0
                && self.lights[light_key].attr.intersects_sphere(&r_sphere);

            if intersects {
                if let Some(k) = matching {
                    let edge = &mut self.intersections[k];
                    let light_moved = edge.light_bounds_version != l_bounds_version;
                    edge.light_bounds_version = l_bounds_version;
                    edge.renderable_bounds_version = r_bounds_version;

                    // A known contact moved relative to an endpoint
                    if light_moved {
                        bump_intersections_version(
                            &mut self.renderables[handle],
                            RecordFlags::NOTIFY_RELATIVE_MOVEMENT,
                        );
                    }
                    bump_intersections_version(
                        &mut self.lights[light_key],
                        RecordFlags::NOTIFY_RELATIVE_MOVEMENT,
                    );
                    tail = Some(k);
                } else {
                    let key = self.intersections.alloc(ObjectLightIntersection {
                        renderable: handle,
                        light: light_key,
                        renderable_uid: r_uid,
                        light_uid,
                        renderable_bounds_version: r_bounds_version,
                        light_bounds_version: l_bounds_version,
                        prev_light: tail,
                        next_light: sync,
                        prev_renderable: None,
                        next_renderable: None,
                    });

                    // Splice into the renderable's list right before the cursor
                    match tail {
                        Some(prev) => self.intersections[prev].next_light = Some(key),
                        None => self.renderables[handle].intersections_head = Some(key),
                    }
                    if let Some(n) = sync {
                        self.intersections[n].prev_light = Some(key);
                    }

                    // The light's list position is found by renderable UID
                    link_into_light_list(
                        &mut self.intersections,
                        &mut self.lights[light_key],
                        key,
                        r_uid,
                    );

                    bump_intersections_version(
                        &mut self.renderables[handle],
                        RecordFlags::NOTIFY_CONTACT_CHANGES,
                    );
                    bump_intersections_version(
                        &mut self.lights[light_key],
                        RecordFlags::NOTIFY_CONTACT_CHANGES,
                    );
                    tail = Some(key);
                }
            } else if let Some(k) = matching {
                // Overlap ended: unlink from both lists, release the edge
                let edge = self.intersections[k];
                match edge.prev_light {
                    Some(p) => self.intersections[p].next_light = edge.next_light,
                    None => self.renderables[handle].intersections_head = edge.next_light,
                }
                if let Some(n) = edge.next_light {
                    self.intersections[n].prev_light = edge.prev_light;
                }
                unlink_from_light_list(
                    &mut self.intersections,
                    &mut self.lights[light_key],
                    k,
                );
                self.intersections.release(k);

                bump_intersections_version(
                    &mut self.renderables[handle],
                    RecordFlags::NOTIFY_CONTACT_CHANGES,
                );
                bump_intersections_version(
                    &mut self.lights[light_key],
                    RecordFlags::NOTIFY_CONTACT_CHANGES,
                );
            }
        }
    }

    /// Symmetric counterpart of
    /// [`update_renderable_light_intersections`](Self::update_renderable_light_intersections)
    /// for a light whose bounds changed: merges the UID-ordered renderable
    /// registry against the light's UID-ordered edge list.
    pub fn update_light_renderable_intersections(&mut self, handle: LightHandle) {
        let (l_uid, l_bounds_version, l_attr, head) = {
            let Some(record) = self.lights.get_mut(handle) else {
                debug_assert!(false, "intersection update on a stale light handle");
                return;
            };
            debug_assert!(
                record.track_intersections > 0,
                "intersection update without tracking enabled"
            );
            debug_assert!(record.bounds_version > 0, "intersection update with invalid bounds");
            if record.track_intersections == 0 || record.bounds_version == 0 {
                return;
            }
            if record.intersections_seen_bounds_version == record.bounds_version {
                return;
            }
            record.intersections_seen_bounds_version = record.bounds_version;
            (
                record.uid,
                record.bounds_version,
                Arc::clone(&record.attr),
                record.intersections_head,
            )
        };

        let mut sync = head;
        let mut tail: Option<IntersectionKey> = None;

        for (&renderable_uid, &renderable_key) in &self.renderables_by_uid {
            let matching = match sync {
                Some(k) if self.intersections[k].renderable_uid == renderable_uid => Some(k),
                Some(k) => {
                    debug_assert!(self.intersections[k].renderable_uid > renderable_uid);
                    None
                }
                None => None,
            };
            if let Some(k) = matching {
                sync = self.intersections[k].next_renderable;
                if self.intersections[k].light_bounds_version == l_bounds_version {
                    tail = Some(k);
                    continue;
                }
            }

            let (r_track, r_bounds_version, r_sphere) = {
                let renderable_record = &self.renderables[renderable_key];
                (
                    renderable_record.track_intersections,
                    renderable_record.bounds_version,
                    renderable_record.sphere,
                )
            };
            if r_track == 0 {
                if let Some(k) = matching {
                    tail = Some(k);
                }
                continue;
            }

            let intersects = r_bounds_version > 0 && l_attr.intersects_sphere(&r_sphere);

            if intersects {
                if let Some(k) = matching {
                    let edge = &mut self.intersections[k];
                    let renderable_moved = edge.renderable_bounds_version != r_bounds_version;
                    edge.renderable_bounds_version = r_bounds_version;
                    edge.light_bounds_version = l_bounds_version;

                    if renderable_moved {
                        bump_intersections_version(
                            &mut self.lights[handle],
                            RecordFlags::NOTIFY_RELATIVE_MOVEMENT,
                        );
                    }
                    bump_intersections_version(
                        &mut self.renderables[renderable_key],
                        RecordFlags::NOTIFY_RELATIVE_MOVEMENT,
                    );
                    tail = Some(k);
                } else {
                    let key = self.intersections.alloc(ObjectLightIntersection {
                        renderable: renderable_key,
                        light: handle,
                        renderable_uid,
                        light_uid: l_uid,
                        renderable_bounds_version: r_bounds_version,
                        light_bounds_version: l_bounds_version,
                        prev_light: None,
                        next_light: None,
                        prev_renderable: tail,
                        next_renderable: sync,
                    });

                    // Splice into the light's list right before the cursor
                    match tail {
                        Some(prev) => self.intersections[prev].next_renderable = Some(key),
                        None => self.lights[handle].intersections_head = Some(key),
                    }
                    if let Some(n) = sync {
                        self.intersections[n].prev_renderable = Some(key);
                    }

                    link_into_renderable_list(
                        &mut self.intersections,
                        &mut self.renderables[renderable_key],
                        key,
                        l_uid,
                    );

                    bump_intersections_version(
                        &mut self.lights[handle],
                        RecordFlags::NOTIFY_CONTACT_CHANGES,
                    );
                    bump_intersections_version(
                        &mut self.renderables[renderable_key],
                        RecordFlags::NOTIFY_CONTACT_CHANGES,
                    );
                    tail = Some(key);
                }
            } else if let Some(k) = matching {
                let edge = self.intersections[k];
                match edge.prev_renderable {
                    Some(p) => self.intersections[p].next_renderable = edge.next_renderable,
                    None => self.lights[handle].intersections_head = edge.next_renderable,
                }
                if let Some(n) = edge.next_renderable {
                    self.intersections[n].prev_renderable = edge.prev_renderable;
                }
                unlink_from_renderable_list(
                    &mut self.intersections,
                    &mut self.renderables[renderable_key],
                    k,
                );
                self.intersections.release(k);

                bump_intersections_version(
                    &mut self.lights[handle],
                    RecordFlags::NOTIFY_CONTACT_CHANGES,
                );
                bump_intersections_version(
                    &mut self.renderables[renderable_key],
                    RecordFlags::NOTIFY_CONTACT_CHANGES,
                );
            }
        }
    }

    // ===== VISIBILITY =====

    /// Hierarchically classify every live tree node against `frustum`
    /// into `cache`. Read-only over the scene; each concurrent view must
    /// own its cache.
    pub fn test_spatial_tree_visibility(&self, frustum: &SimdFrustum, cache: &mut VisibilityCache) {
        visibility::test_spatial_tree_visibility(&self.tree, frustum, cache);
    }

    // ===== QUERIES =====

    /// The spatial tree, for node-level inspection.
    pub fn tree(&self) -> &SpatialTree {
        &self.tree
    }

    /// Structural change counter of the tree; see
    /// [`SpatialTree::rebuild_version`].
    pub fn spatial_tree_rebuild_version(&self) -> u32 {
        self.tree.rebuild_version()
    }

    /// World-space AABB of a tree node; `loose` doubles the extent.
    pub fn node_aabb(&self, node_index: u32, loose: bool) -> Option<AABB> {
        self.tree.node_aabb(node_index, loose)
    }

    /// AABB of the tree node a renderable is accounted in.
    pub fn renderable_node_aabb(&self, handle: RenderableHandle, loose: bool) -> Option<AABB> {
        self.tree.node_aabb(self.renderables.get(handle)?.node_index, loose)
    }

    /// AABB of the tree node a light is accounted in.
    pub fn light_node_aabb(&self, handle: LightHandle, loose: bool) -> Option<AABB> {
        self.tree.node_aabb(self.lights.get(handle)?.node_index, loose)
    }

    /// A renderable's spatial record.
    pub fn renderable(&self, handle: RenderableHandle) -> Option<&RenderableRecord> {
        self.renderables.get(handle)
    }

    /// A light's spatial record.
    pub fn light(&self, handle: LightHandle) -> Option<&LightRecord> {
        self.lights.get(handle)
    }

    pub fn renderable_count(&self) -> usize {
        self.renderables.len()
    }

    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    /// A live intersection edge.
    pub fn intersection(&self, key: IntersectionKey) -> Option<&ObjectLightIntersection> {
        self.intersections.get(key)
    }

    /// Number of live intersection edges.
    pub fn intersection_count(&self) -> usize {
        self.intersections.len()
    }

    /// Walk a renderable's light contacts in ascending light UID order.
    pub fn renderable_light_intersections(
        &self,
        handle: RenderableHandle,
    ) -> impl Iterator<Item = &ObjectLightIntersection> {
        let pool = &self.intersections;
        let head = self
            .renderables
            .get(handle)
            .and_then(|record| record.intersections_head);
        std::iter::successors(head.map(|k| &pool[k]), move |edge| {
            edge.next_light.map(|k| &pool[k])
        })
    }

    /// Walk a light's renderable contacts in ascending renderable UID order.
    pub fn light_renderable_intersections(
        &self,
        handle: LightHandle,
    ) -> impl Iterator<Item = &ObjectLightIntersection> {
        let pool = &self.intersections;
        let head = self
            .lights
            .get(handle)
            .and_then(|record| record.intersections_head);
        std::iter::successors(head.map(|k| &pool[k]), move |edge| {
            edge.next_renderable.map(|k| &pool[k])
        })
    }
}

// ===== RECORD HELPERS =====

fn make_record<A>(
    tree: &mut SpatialTree,
    uid: u32,
    global_box: &AABB,
    sphere: Sphere,
    attr: A,
) -> SpatialRecord<A> {
    let box_center = global_box.center();
    let box_extent = global_box.extent();

    if bounds_valid(box_center, box_extent) {
        let morton_code = tree.calculate_morton_code(box_center, box_extent);
        let node_index = tree.insert(morton_code, 0);
        SpatialRecord::new(uid, attr, box_center, box_extent, sphere, node_index, morton_code, 1)
    } else {
        // Objects with invalid bounds live outside the spatial tree
        SpatialRecord::new(
            uid,
            attr,
            box_center,
            box_extent,
            sphere,
            NO_SPATIAL_TREE_NODE,
            0,
            0,
        )
    }
}

fn update_record_bounds<A>(
    tree: &mut SpatialTree,
    record: &mut SpatialRecord<A>,
    global_box: &AABB,
    sphere: Sphere,
) {
    let box_center = global_box.center();
    let box_extent = global_box.extent();

    if box_center == record.box_center && box_extent == record.box_extent && sphere == record.sphere
    {
        return;
    }

    let valid = bounds_valid(box_center, box_extent);
    record.box_center = box_center;
    record.box_extent = box_extent;
    record.sphere = sphere;
    record.bounds_version = if valid {
        record.bounds_version.wrapping_add(1).max(1)
    } else {
        0
    };

    let morton_code = if valid {
        tree.calculate_morton_code(box_center, box_extent)
    } else {
        0
    };
    if record.morton_code != morton_code {
        // Moving costs the depth difference to the common ancestor, not a
        // full reinsert
        let lca = morton_lca(record.morton_code, morton_code);
        tree.remove(record.node_index, record.morton_code, lca);
        record.node_index = tree.insert(morton_code, lca);
        record.morton_code = morton_code;
    }
}

fn toggle_tracking<A>(record: &mut SpatialRecord<A>, track: bool) {
    if track {
        debug_assert!(record.track_intersections < u8::MAX, "tracking refcount overflow");
        if record.track_intersections < u8::MAX {
            record.track_intersections += 1;
        }
    } else {
        // Existing intersections are kept: they may remain valid even
        // while tracking is disabled (e.g. due to a visibility change)
        debug_assert!(record.track_intersections > 0, "tracking refcount underflow");
        if record.track_intersections > 0 {
            record.track_intersections -= 1;
        }
    }
}

fn bump_intersections_version<A>(record: &mut SpatialRecord<A>, required: RecordFlags) {
    if record.flags.contains(required) {
        record.intersections_version = record.intersections_version.wrapping_add(1);
    }
}

// ===== LIST THREADING =====

fn unlink_from_renderable_list<A>(
    pool: &mut IntersectionPool,
    renderable_record: &mut SpatialRecord<A>,
    key: IntersectionKey,
) {
    let edge = pool[key];
    match edge.prev_light {
        Some(p) => pool[p].next_light = edge.next_light,
        None => renderable_record.intersections_head = edge.next_light,
    }
    if let Some(n) = edge.next_light {
        pool[n].prev_light = edge.prev_light;
    }
}

fn unlink_from_light_list<A>(
    pool: &mut IntersectionPool,
    light_record: &mut SpatialRecord<A>,
    key: IntersectionKey,
) {
    let edge = pool[key];
    match edge.prev_renderable {
        Some(p) => pool[p].next_renderable = edge.next_renderable,
        None => light_record.intersections_head = edge.next_renderable,
    }
    if let Some(n) = edge.next_renderable {
        pool[n].prev_renderable = edge.prev_renderable;
    }
}

/// Splice `key` into a light's list keeping ascending renderable UID order.
/// The position walk is bounded by the light's current contact count; the
/// splice itself is O(1) through the stored back links.
fn link_into_light_list<A>(
    pool: &mut IntersectionPool,
    light_record: &mut SpatialRecord<A>,
    key: IntersectionKey,
    renderable_uid: u32,
) {
    let mut prev: Option<IntersectionKey> = None;
    let mut next = light_record.intersections_head;
    while let Some(n) = next {
        if pool[n].renderable_uid >= renderable_uid {
            debug_assert!(
                pool[n].renderable_uid != renderable_uid,
                "duplicate edge in light list"
            );
            break;
        }
        prev = Some(n);
        next = pool[n].next_renderable;
    }

    pool[key].prev_renderable = prev;
    pool[key].next_renderable = next;
    match prev {
        Some(p) => pool[p].next_renderable = Some(key),
        None => light_record.intersections_head = Some(key),
    }
    if let Some(n) = next {
        pool[n].prev_renderable = Some(key);
    }
}

/// Splice `key` into a renderable's list keeping ascending light UID order.
fn link_into_renderable_list<A>(
    pool: &mut IntersectionPool,
    renderable_record: &mut SpatialRecord<A>,
    key: IntersectionKey,
    light_uid: u32,
) {
    let mut prev: Option<IntersectionKey> = None;
    let mut next = renderable_record.intersections_head;
    while let Some(n) = next {
        if pool[n].light_uid >= light_uid {
            debug_assert!(pool[n].light_uid != light_uid, "duplicate edge in renderable list");
            break;
        }
        prev = Some(n);
        next = pool[n].next_light;
    }

    pool[key].prev_light = prev;
    pool[key].next_light = next;
    match prev {
        Some(p) => pool[p].next_light = Some(key),
        None => renderable_record.intersections_head = Some(key),
    }
    if let Some(n) = next {
        pool[n].prev_light = Some(key);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "graphics_scene_tests.rs"]
mod tests;
