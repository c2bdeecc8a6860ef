/// Hierarchical frustum classification of spatial tree nodes.
///
/// Every live node gets a 2-bit [`ClipStatus`]: fully inside, fully
/// outside, or partial. Nodes are processed in index order; since a
/// node's index is always greater than its parent's, a decided parent
/// state (fully inside/outside) is copied down without testing the
/// child. Only nodes under a partial parent pay for the plane test.
///
/// The test itself batches the four side planes: the center distance to
/// all four is three multiply-adds, and the projection radius of a loose
/// node cube is the per-frustum projected world extent scaled by the
/// node's extent coefficient, with no per-node trigonometry. Near and
/// far are an interval test along the look axis.
///
/// The cache is incremental across frames: entries below the covered
/// count are reused as long as the tree's rebuild version is unchanged;
/// appended nodes are classified on top. When the version moved, node
/// identities changed and the whole buffer is recomputed.
///
/// See Real-Time Collision Detection 5.2.3 and
/// <https://fgiesen.wordpress.com/2010/10/17/view-frustum-culling/>

use glam::{Vec3, Vec4};
use crate::camera::{ClipStatus, SimdFrustum};
use super::spatial_tree::SpatialTree;

/// Per-view classification buffer over the tree's node slots.
///
/// Each view (camera, shadow cascade, ...) owns one cache; the test pass
/// itself never mutates the scene.
#[derive(Default)]
pub struct VisibilityCache {
    states: Vec<ClipStatus>,
    rebuild_version: u32,
}

impl VisibilityCache {
    pub fn new() -> VisibilityCache {
        VisibilityCache {
            states: Vec::new(),
            rebuild_version: 0,
        }
    }

    /// Classification of the node at `index` (untested/empty when out of
    /// range or not yet computed).
    pub fn node_status(&self, index: u32) -> ClipStatus {
        self.states
            .get(index as usize)
            .copied()
            .unwrap_or(ClipStatus::empty())
    }

    /// Whether the node at `index` has any visible part.
    pub fn is_visible(&self, index: u32) -> bool {
        self.node_status(index).contains(ClipStatus::INSIDE)
    }

    /// Number of node slots covered by the last test pass.
    pub fn covered_count(&self) -> usize {
        self.states.len()
    }

    /// Tree rebuild version the buffer contents belong to.
    pub fn rebuild_version(&self) -> u32 {
        self.rebuild_version
    }

    /// Drop all cached classifications.
    pub fn clear(&mut self) {
        self.states.clear();
    }
}

/// Classify every live node of `tree` against `frustum` into `cache`.
///
/// Reuses cached entries when the tree's rebuild version is unchanged
/// and only classifies nodes appended since; otherwise recomputes all.
pub fn test_spatial_tree_visibility(
    tree: &SpatialTree,
    frustum: &SimdFrustum,
    cache: &mut VisibilityCache,
) {
    // Stale caches refer to freed-and-reused indices; start over
    if cache.rebuild_version != tree.rebuild_version() {
        cache.states.clear();
        cache.rebuild_version = tree.rebuild_version();
    }

    let cached_count = cache.states.len();
    cache.states.resize(tree.sparse_node_count(), ClipStatus::empty());

    // Projection radius of the most outside vertex of a world-sized cube
    // onto each side plane: -E * (|Nx| + |Ny| + |Nz|), with E equal on
    // all axes. The tree is loose, so all extents are doubled; node
    // extents follow by scaling with the extent coefficient.
    let neg_world_extent = Vec4::splat(-2.0 * tree.world_extent());
    let projected_neg_world_extent = neg_world_extent * frustum.lrbt_nx.abs()
        + neg_world_extent * frustum.lrbt_ny.abs()
        + neg_world_extent * frustum.lrbt_nz.abs();

    let neg_world_extent_along_look =
        frustum.look_axis.abs().dot(Vec3::splat(-2.0 * tree.world_extent()));

    let nodes = tree.nodes();
    let mut start = cached_count as u32;
    if cached_count == 0 {
        // Process the root outside the loop to simplify conditions inside
        let root = &nodes[0];
        cache.states[0] = clip_cube(
            root.center,
            root.extent_coeff,
            projected_neg_world_extent,
            neg_world_extent_along_look,
            frustum,
        );
        start = 1;
    }

    for (index, node) in nodes.iter_from(start) {
        // Construction order guarantees parents precede children
        debug_assert!(node.parent_index < index);

        let parent_status = cache.states[node.parent_index as usize];
        cache.states[index as usize] = if parent_status.is_decided() {
            // A fully visible or fully invisible parent settles all children
            parent_status
        } else {
            clip_cube(
                node.center,
                node.extent_coeff,
                projected_neg_world_extent,
                neg_world_extent_along_look,
                frustum,
            )
        };
    }
}

/// Test a loose node cube against the frustum planes, treating the
/// positive halfspace as inside.
fn clip_cube(
    center: Vec3,
    extent_coeff: f32,
    projected_neg_world_extent: Vec4,
    neg_world_extent_along_look: f32,
    frustum: &SimdFrustum,
) -> ClipStatus {
    // Distance of the cube center from each side plane
    let mut center_distance = frustum.lrbt_nx * center.x + frustum.lrbt_w;
    center_distance += frustum.lrbt_ny * center.y;
    center_distance += frustum.lrbt_nz * center.z;

    // Projection radius of the most outside vertex (-r) for this node
    let projected_neg_extent = projected_neg_world_extent * extent_coeff;

    // Check intersection with the side planes
    let mut has_visible_part = center_distance.cmpge(projected_neg_extent).all();
    let mut has_invisible_part = false;
    if has_visible_part {
        // Inside the side planes; check the near/far interval
        let center_along_look = frustum.look_axis.dot(center);
        let neg_extent_along_look = neg_world_extent_along_look * extent_coeff;
        let closest_point = center_along_look + neg_extent_along_look;
        let farthest_point = center_along_look - neg_extent_along_look;
        has_visible_part =
            farthest_point > frustum.near_plane && closest_point < frustum.far_plane;
        has_invisible_part = !has_visible_part
            || farthest_point > frustum.far_plane
            || closest_point < frustum.near_plane;
    }

    has_invisible_part =
        has_invisible_part || center_distance.cmplt(-projected_neg_extent).any();

    let mut status = ClipStatus::empty();
    if has_visible_part {
        status |= ClipStatus::INSIDE;
    }
    if has_invisible_part {
        status |= ClipStatus::OUTSIDE;
    }
    status
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "visibility_tests.rs"]
mod tests;
