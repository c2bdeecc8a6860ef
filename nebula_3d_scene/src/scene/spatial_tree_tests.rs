use glam::Vec3;
use crate::math::morton::depth_level;
use super::*;

/// World: cube of edge 1000 centered at the origin, 4 subdivisions.
/// Smallest non-loose node extent = 500 / 16 = 31.25.
fn make_tree() -> SpatialTree {
    SpatialTree::new(Vec3::ZERO, 1000.0, 4).unwrap()
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_new_creates_permanent_root() {
    let tree = make_tree();
    assert_eq!(tree.node_count(), 1);

    let root = tree.node(0).unwrap();
    assert_eq!(root.morton_code(), 1);
    assert_eq!(root.parent_index(), NO_SPATIAL_TREE_NODE);
    assert_eq!(root.subtree_object_count(), 1); // artificial refcount
    assert_eq!(tree.node_index_of(1), Some(0));
}

#[test]
fn test_new_rejects_bad_world() {
    assert!(SpatialTree::new(Vec3::ZERO, -1.0, 4).is_err());
    assert!(SpatialTree::new(Vec3::ZERO, 0.0, 4).is_err());
    assert!(SpatialTree::new(Vec3::ZERO, f32::NAN, 4).is_err());
    assert!(SpatialTree::new(Vec3::splat(f32::INFINITY), 100.0, 4).is_err());
}

#[test]
fn test_depth_is_clamped() {
    let tree = SpatialTree::new(Vec3::ZERO, 1000.0, 200).unwrap();
    assert_eq!(tree.max_depth(), crate::math::morton::TREE_MAX_DEPTH);
}

// ============================================================================
// Morton mapping
// ============================================================================

#[test]
fn test_morton_code_small_object_sinks_to_deepest_level() {
    let tree = make_tree();
    let code = tree.calculate_morton_code(Vec3::ZERO, Vec3::splat(1.0));

    assert_eq!(depth_level(code), 4);
    // Center (0,0,0) maps to cell (8,8,8) of the 16^3 grid
    assert_eq!(code, (1 << 12) | crate::math::morton::morton_encode3(8, 8, 8));
}

#[test]
fn test_morton_code_zero_extent_sinks_to_deepest_level() {
    let tree = make_tree();
    let code = tree.calculate_morton_code(Vec3::new(100.0, 0.0, -200.0), Vec3::ZERO);
    assert_eq!(depth_level(code), 4);
}

#[test]
fn test_morton_code_large_object_lands_on_coarse_level() {
    let tree = make_tree();
    // Extent 100 → coarsest cell extent not below 100 is 125 (depth 2)
    let code = tree.calculate_morton_code(Vec3::ZERO, Vec3::new(100.0, 1.0, 1.0));
    assert_eq!(depth_level(code), 2);
}

#[test]
fn test_morton_code_world_sized_object_is_root() {
    let tree = make_tree();
    let code = tree.calculate_morton_code(Vec3::ZERO, Vec3::splat(400.0));
    assert_eq!(code, 1);
    assert_eq!(depth_level(code), 0);
}

#[test]
fn test_morton_code_center_outside_world_is_zero() {
    let tree = make_tree();
    assert_eq!(tree.calculate_morton_code(Vec3::new(600.0, 0.0, 0.0), Vec3::splat(1.0)), 0);
    assert_eq!(tree.calculate_morton_code(Vec3::new(0.0, -500.0, 0.0), Vec3::splat(1.0)), 0);
    // Center inside, bounds sticking out: still indexed (loose tree)
    assert_ne!(tree.calculate_morton_code(Vec3::new(499.0, 0.0, 0.0), Vec3::splat(50.0)), 0);
}

#[test]
fn test_node_aabb_reconstruction() {
    let mut tree = make_tree();
    // Depth-1 cell (1,1,1) spans [0, 500]^3
    let code = (1 << 3) | crate::math::morton::morton_encode3(1, 1, 1);
    let index = tree.insert(code, 0);

    let aabb = tree.node_aabb(index, false).unwrap();
    assert_eq!(aabb.center(), Vec3::splat(250.0));
    assert_eq!(aabb.extent(), Vec3::splat(250.0));

    let loose = tree.node_aabb(index, true).unwrap();
    assert_eq!(loose.center(), Vec3::splat(250.0));
    assert_eq!(loose.extent(), Vec3::splat(500.0));
}

#[test]
fn test_decoded_loose_node_contains_box() {
    let tree = make_tree();
    let boxes = [
        (Vec3::ZERO, Vec3::splat(1.0)),
        (Vec3::new(432.0, -127.5, 88.25), Vec3::new(3.0, 40.0, 12.0)),
        (Vec3::new(-499.0, 499.0, 0.0), Vec3::splat(0.5)),
        (Vec3::new(250.0, 250.0, 250.0), Vec3::splat(249.0)),
    ];
    let mut tree = tree;
    for (center, extent) in boxes {
        let code = tree.calculate_morton_code(center, extent);
        assert_ne!(code, 0, "center {:?} is inside the world", center);
        let index = tree.insert(code, 0);
        let node_aabb = tree.node_aabb(index, true).unwrap();
        let box_aabb = AABB::from_center_extent(center, extent);
        assert!(
            node_aabb.contains(&box_aabb),
            "loose node {:?} must contain box {:?}",
            node_aabb,
            box_aabb
        );
    }
}

// ============================================================================
// Insert / remove
// ============================================================================

#[test]
fn test_insert_materializes_full_chain() {
    let mut tree = make_tree();
    let code = tree.calculate_morton_code(Vec3::ZERO, Vec3::splat(1.0)); // depth 4
    let leaf = tree.insert(code, 0);

    // Root + 4 new levels
    assert_eq!(tree.node_count(), 5);
    assert_eq!(tree.node(leaf).unwrap().subtree_object_count(), 1);

    // Every ancestor exists with count 1, root has its fake +1
    let mut curr = code >> 3;
    while curr > 1 {
        let idx = tree.node_index_of(curr).expect("ancestor must exist");
        assert_eq!(tree.node(idx).unwrap().subtree_object_count(), 1);
        curr >>= 3;
    }
    assert_eq!(tree.node(0).unwrap().subtree_object_count(), 2);
}

#[test]
fn test_parent_index_always_below_child_index() {
    let mut tree = make_tree();
    let centers = [
        Vec3::ZERO,
        Vec3::new(400.0, 400.0, 400.0),
        Vec3::new(-300.0, 120.0, -88.0),
        Vec3::new(10.0, -480.0, 233.0),
    ];
    for center in centers {
        let code = tree.calculate_morton_code(center, Vec3::splat(1.0));
        tree.insert(code, 0);
    }

    for (index, node) in tree.nodes().iter() {
        if index == 0 {
            continue;
        }
        assert!(node.parent_index() < index);
    }
}

#[test]
fn test_shared_ancestors_are_counted_once_per_object() {
    let mut tree = make_tree();
    // Two nearby cells sharing all but the deepest level
    let code_a = tree.calculate_morton_code(Vec3::new(10.0, 10.0, 10.0), Vec3::splat(1.0));
    let code_b = tree.calculate_morton_code(Vec3::new(70.0, 10.0, 10.0), Vec3::splat(1.0));
    assert_ne!(code_a, code_b);

    tree.insert(code_a, 0);
    tree.insert(code_b, 0);

    let shared = crate::math::morton::morton_lca(code_a, code_b);
    let shared_index = tree.node_index_of(shared).unwrap();
    assert_eq!(tree.node(shared_index).unwrap().subtree_object_count(), 2);
}

#[test]
fn test_insert_remove_restores_counts_tree_wide() {
    let mut tree = make_tree();
    let code_a = tree.calculate_morton_code(Vec3::new(-100.0, 30.0, 7.0), Vec3::splat(2.0));
    let idx_a = tree.insert(code_a, 0);

    // Snapshot counts with one resident object
    let before: Vec<(u32, u32)> = tree
        .nodes()
        .iter()
        .map(|(i, n)| (i, n.subtree_object_count()))
        .collect();

    let code_b = tree.calculate_morton_code(Vec3::new(-100.0, 80.0, 7.0), Vec3::splat(2.0));
    let idx_b = tree.insert(code_b, 0);
    tree.remove(idx_b, code_b, 0);

    let after: Vec<(u32, u32)> = tree
        .nodes()
        .iter()
        .map(|(i, n)| (i, n.subtree_object_count()))
        .collect();
    assert_eq!(before, after);

    // Removing the last object collapses everything but the root
    tree.remove(idx_a, code_a, 0);
    assert_eq!(tree.node_count(), 1);
    assert_eq!(tree.node(0).unwrap().subtree_object_count(), 1);
}

#[test]
fn test_full_chain_collapse_and_slot_reuse() {
    let mut tree = make_tree();
    let code = tree.calculate_morton_code(Vec3::new(88.0, -12.0, 301.0), Vec3::splat(1.0));

    let leaf_first = tree.insert(code, 0);
    let bounds_first = tree.node_aabb(leaf_first, true).unwrap();
    tree.remove(leaf_first, code, 0);
    assert_eq!(tree.node_count(), 1);

    // Same code again: freed slots are rematerialized with identical bounds
    let leaf_second = tree.insert(code, 0);
    assert_eq!(leaf_first, leaf_second);
    assert_eq!(tree.node_aabb(leaf_second, true).unwrap(), bounds_first);
}

#[test]
fn test_insert_with_zero_code_is_unindexed() {
    let mut tree = make_tree();
    assert_eq!(tree.insert(0, 0), NO_SPATIAL_TREE_NODE);
    assert_eq!(tree.node_count(), 1);
}

// ============================================================================
// Rebuild version
// ============================================================================

#[test]
fn test_rebuild_version_stays_on_pure_appends() {
    let mut tree = make_tree();
    assert_eq!(tree.rebuild_version(), 0);

    let code = tree.calculate_morton_code(Vec3::ZERO, Vec3::splat(1.0));
    tree.insert(code, 0);
    assert_eq!(tree.rebuild_version(), 0);

    let code2 = tree.calculate_morton_code(Vec3::new(400.0, 0.0, 0.0), Vec3::splat(1.0));
    tree.insert(code2, 0);
    assert_eq!(tree.rebuild_version(), 0);
}

#[test]
fn test_rebuild_version_bumps_on_slot_reuse() {
    let mut tree = make_tree();
    let code = tree.calculate_morton_code(Vec3::ZERO, Vec3::splat(1.0));
    let leaf = tree.insert(code, 0);
    tree.remove(leaf, code, 0);
    assert_eq!(tree.rebuild_version(), 0); // removal alone never bumps

    // Different cell reuses the freed slots
    let other = tree.calculate_morton_code(Vec3::new(-200.0, 150.0, 42.0), Vec3::splat(1.0));
    tree.insert(other, 0);
    assert_eq!(tree.rebuild_version(), 1);
}

// ============================================================================
// Partial (LCA-bounded) moves
// ============================================================================

#[test]
fn test_lca_bounded_move_preserves_upper_counts() {
    let mut tree = make_tree();
    let code_a = tree.calculate_morton_code(Vec3::new(10.0, 10.0, 10.0), Vec3::splat(1.0));
    let code_b = tree.calculate_morton_code(Vec3::new(70.0, 10.0, 10.0), Vec3::splat(1.0));
    let lca = crate::math::morton::morton_lca(code_a, code_b);
    assert_ne!(lca, 0);

    let idx_a = tree.insert(code_a, 0);
    let root_count = tree.node(0).unwrap().subtree_object_count();
    let lca_count = tree
        .node(tree.node_index_of(lca).unwrap())
        .unwrap()
        .subtree_object_count();

    // Move A → B restricted to below the LCA
    tree.remove(idx_a, code_a, lca);
    tree.insert(code_b, lca);

    assert_eq!(tree.node(0).unwrap().subtree_object_count(), root_count);
    let lca_index = tree.node_index_of(lca).unwrap();
    assert_eq!(tree.node(lca_index).unwrap().subtree_object_count(), lca_count);
    assert!(tree.node_index_of(code_a).is_none());
    assert!(tree.node_index_of(code_b).is_some());
}
