/// Sparse loose octree addressed by Morton codes.
///
/// Nodes exist only while objects reference them: a node's
/// `subtree_object_count` counts the registry records whose leaf chain
/// passes through it, and the node is returned to a free list when the
/// count reaches 0. Node lookup goes through a Morton→index map, so
/// walking from any cell to its ancestors is a matter of right-shifting
/// the code by 3 bits per level.
///
/// Storage invariants:
/// - index 0 is the permanent root; its count is faked to 1 at
///   construction so it can never be freed
/// - every node's index is greater than its parent's (children are
///   allocated from the first free slot after the parent, else appended),
///   which lets consumers process nodes in index order and trust that a
///   parent was handled first
/// - `rebuild_version` advances whenever a freed slot is rematerialized;
///   external per-index caches must be discarded when it moves. Pure
///   appends and removals keep indices of live nodes stable and do not
///   bump the version.

use glam::Vec3;
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::math::morton::{
    bit_width, morton_decode3, morton_encode3, prev_pow2,
    MortonCode, TREE_DIMENSIONS, TREE_MAX_DEPTH,
};
use crate::utils::SparseArray;
use super::bounds::AABB;

/// Sentinel node index for objects outside the tree.
pub const NO_SPATIAL_TREE_NODE: u32 = u32::MAX;

/// A single node of the loose octree.
///
/// Bounds are stored as the cell center plus a normalized extent
/// coefficient (`1 / 2^depth`); the world extent multiplies it back into
/// world units, doubled for the loose bounds.
#[derive(Debug, Clone, Copy)]
pub struct TreeNode {
    pub(crate) center: Vec3,
    pub(crate) extent_coeff: f32,
    pub(crate) morton_code: MortonCode,
    pub(crate) parent_index: u32,
    pub(crate) subtree_object_count: u32,
}

impl TreeNode {
    /// Morton code addressing this node's cell.
    pub fn morton_code(&self) -> MortonCode {
        self.morton_code
    }

    /// Index of the parent node (`NO_SPATIAL_TREE_NODE` for the root).
    pub fn parent_index(&self) -> u32 {
        self.parent_index
    }

    /// Number of registry records indexed at or below this node.
    pub fn subtree_object_count(&self) -> u32 {
        self.subtree_object_count
    }
}

/// The sparse spatial tree and its world mapping parameters.
pub struct SpatialTree {
    nodes: SparseArray<TreeNode>,
    morton_to_index: FxHashMap<MortonCode, u32>,
    world_extent: f32,
    inv_world_size: f32,
    smallest_extent: f32,
    max_depth: u8,
    rebuild_version: u32,
}

impl SpatialTree {
    /// Create the tree for a world volume centered at `world_center` with
    /// edge length `world_size`, subdivided `hierarchy_depth` times
    /// (clamped to [`TREE_MAX_DEPTH`]).
    ///
    /// The root node is materialized immediately and never freed.
    pub fn new(world_center: Vec3, world_size: f32, hierarchy_depth: u8) -> Result<SpatialTree> {
        if !world_center.is_finite() || !world_size.is_finite() || world_size <= 0.0 {
            return Err(Error::InvalidWorldBounds(format!(
                "center {:?}, size {}",
                world_center, world_size
            )));
        }

        let max_depth = hierarchy_depth.min(TREE_MAX_DEPTH);
        let world_extent = world_size * 0.5;

        let mut nodes = SparseArray::new();
        let mut morton_to_index = FxHashMap::default();

        // Create the root. This simplifies object insertion logic.
        // The object count is faked to 1 to keep the root alive forever.
        let root_index = nodes.insert(TreeNode {
            center: world_center,
            extent_coeff: 1.0,
            morton_code: 1,
            parent_index: NO_SPATIAL_TREE_NODE,
            subtree_object_count: 1,
        });
        debug_assert_eq!(root_index, 0);
        morton_to_index.insert(1, 0);

        Ok(SpatialTree {
            nodes,
            morton_to_index,
            world_extent,
            inv_world_size: 1.0 / world_size,
            smallest_extent: world_extent / (1u32 << max_depth) as f32,
            max_depth,
            rebuild_version: 0,
        })
    }

    /// Configured tree depth (after clamping).
    pub fn max_depth(&self) -> u8 {
        self.max_depth
    }

    /// Half of the world edge length.
    pub fn world_extent(&self) -> f32 {
        self.world_extent
    }

    /// Number of live nodes (root included).
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Total node slot count including freed holes; sizes per-index caches.
    pub fn sparse_node_count(&self) -> usize {
        self.nodes.sparse_len()
    }

    /// Monotonic counter of structural changes that invalidate per-index
    /// caches (a freed slot was rematerialized as a different node).
    pub fn rebuild_version(&self) -> u32 {
        self.rebuild_version
    }

    /// Live node at `index`, if any.
    pub fn node(&self, index: u32) -> Option<&TreeNode> {
        if index == NO_SPATIAL_TREE_NODE {
            None
        } else {
            self.nodes.get(index)
        }
    }

    /// Index of the node addressing `code`, if materialized.
    pub fn node_index_of(&self, code: MortonCode) -> Option<u32> {
        self.morton_to_index.get(&code).copied()
    }

    pub(crate) fn nodes(&self) -> &SparseArray<TreeNode> {
        &self.nodes
    }

    // ===== MORTON MAPPING =====

    /// Compute the Morton code of the tree cell for a box given as
    /// center + half-size extent. Returns 0 when the center lies outside
    /// the world volume (the loose tree only needs the center inside) or
    /// when no cell is coarse enough to hold the extent.
    pub fn calculate_morton_code(&self, box_center: Vec3, box_extent: Vec3) -> MortonCode {
        // Check for location outside the world bounds
        let center_diff = (box_center - self.root_center()).abs();
        if center_diff.cmpge(Vec3::splat(self.world_extent)).any() {
            return 0;
        }

        // Our level is where the non-loose node extent is not less than the
        // object extent in any dimension. Too small and degenerate extents
        // sink to the deepest possible level to avoid division errors.
        let mut node_size_coeff: u32 = 1 << self.max_depth;
        if box_extent.cmpge(Vec3::splat(self.smallest_extent)).any() {
            let max_dim = box_extent.max_element();
            let highest_share = prev_pow2((self.world_extent / max_dim) as u32);
            if node_size_coeff > highest_share {
                node_size_coeff = highest_share;
            }
        }

        let cell_coeff = node_size_coeff as f32 * self.inv_world_size;
        let cell =
            (box_center + (Vec3::splat(self.world_extent) - self.root_center())) * cell_coeff;

        let x = cell.x as u16;
        let y = cell.y as u16;
        let z = cell.z as u16;

        // The cubed size coefficient is the sentinel bit: its position is
        // 3 * depth, right above the interleaved cell coordinates.
        (node_size_coeff * node_size_coeff * node_size_coeff) | morton_encode3(x, y, z)
    }

    /// Reconstruct a node's center and extent coefficient from its code.
    fn node_bounds_from_code(&self, code: MortonCode) -> (Vec3, f32) {
        let bits = bit_width(code);
        let no_sentinel = code ^ (1 << (bits - 1));
        let (x, y, z) = morton_decode3(no_sentinel);

        // 1 / 2^depth
        let extent_coeff = 1.0 / (1u32 << (bits / TREE_DIMENSIONS)) as f32;
        let cell = Vec3::new(x as f32, y as f32, z as f32);
        let normalized = (cell * 2.0 + 1.0) * extent_coeff - 1.0; // per axis in [-1, 1)
        (normalized * self.world_extent + self.root_center(), extent_coeff)
    }

    /// World-space AABB of a node; `loose` doubles the extent.
    pub fn node_aabb(&self, index: u32, loose: bool) -> Option<AABB> {
        let node = self.node(index)?;
        let extent = self.world_extent * node.extent_coeff * if loose { 2.0 } else { 1.0 };
        Some(AABB::from_center_extent(node.center, Vec3::splat(extent)))
    }

    fn root_center(&self) -> Vec3 {
        self.nodes[0].center
    }

    // ===== OBJECT PLACEMENT =====

    /// Account one object at the cell `code`, bumping subtree counts on the
    /// path up to (not including) `stop_code` and materializing any missing
    /// nodes. Returns the node index, or `NO_SPATIAL_TREE_NODE` for code 0.
    pub fn insert(&mut self, code: MortonCode, stop_code: MortonCode) -> u32 {
        if code == 0 {
            return NO_SPATIAL_TREE_NODE;
        }

        // Find the deepest existing ancestor. The root always exists as a fallback.
        let mut missing_nodes = 0u32;
        let mut curr_code = code;
        let mut existing = self.morton_to_index.get(&curr_code).copied();
        while existing.is_none() {
            missing_nodes += 1;
            curr_code >>= TREE_DIMENSIONS;
            existing = self.morton_to_index.get(&curr_code).copied();
        }
        let existing_index = existing.unwrap_or(0);

        // Increment existing nodes' object counts
        let mut node_index = existing_index;
        while curr_code != stop_code {
            let node = &mut self.nodes[node_index];
            node.subtree_object_count += 1;
            node_index = node.parent_index;
            curr_code >>= TREE_DIMENSIONS;
        }

        if missing_nodes == 0 {
            return existing_index;
        }

        // Create missing nodes from the found ancestor downward. Reusing a
        // freed slot changes what a previously cached index refers to.
        if self.nodes.has_free_slot_after(existing_index) {
            self.rebuild_version = self.rebuild_version.wrapping_add(1).max(1);
        }

        let mut parent_index = existing_index;
        while missing_nodes > 1 {
            missing_nodes -= 1;
            parent_index =
                self.create_node(code >> (missing_nodes * TREE_DIMENSIONS), parent_index);
        }

        // Create the missing leaf node
        self.create_node(code, parent_index)
    }

    /// Remove one object's contribution, walking up from the node at
    /// `node_index` / `code` to (not including) `stop_code`. Nodes whose
    /// count reaches 0 go back to the free list.
    pub fn remove(&mut self, node_index: u32, code: MortonCode, stop_code: MortonCode) {
        let mut node_index = node_index;
        let mut code = code;
        while code != stop_code {
            let node = &mut self.nodes[node_index];
            let parent_index = node.parent_index;
            let node_code = node.morton_code;
            node.subtree_object_count -= 1;
            if node.subtree_object_count == 0 {
                debug_assert!(node_index != 0, "the root node must never be freed");
                self.morton_to_index.remove(&node_code);
                self.nodes.remove(node_index);
            }
            node_index = parent_index;
            code >>= TREE_DIMENSIONS;
        }
    }

    fn create_node(&mut self, code: MortonCode, parent_index: u32) -> u32 {
        let (center, extent_coeff) = self.node_bounds_from_code(code);
        let index = self.nodes.alloc_after(
            parent_index,
            TreeNode {
                center,
                extent_coeff,
                morton_code: code,
                parent_index,
                subtree_object_count: 1,
            },
        );
        self.morton_to_index.insert(code, index);
        index
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "spatial_tree_tests.rs"]
mod tests;
