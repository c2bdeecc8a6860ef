use super::*;

// ============================================================================
// Bit interleaving
// ============================================================================

#[test]
fn test_part_compact_roundtrip() {
    for v in [0u32, 1, 2, 3, 7, 8, 0x155, 0x2aa, 0x3ff] {
        let parted = part_bits_1by2(v);
        assert_eq!(compact_bits_1by2(parted), v, "value {:#x}", v);
    }
}

#[test]
fn test_part_bits_spreads_every_third_bit() {
    assert_eq!(part_bits_1by2(0b1), 0b1);
    assert_eq!(part_bits_1by2(0b10), 0b1000);
    assert_eq!(part_bits_1by2(0b11), 0b1001);
    assert_eq!(part_bits_1by2(0x3ff), 0x0924_9249);
}

#[test]
fn test_encode3_known_values() {
    assert_eq!(morton_encode3(0, 0, 0), 0);
    assert_eq!(morton_encode3(1, 0, 0), 0b001);
    assert_eq!(morton_encode3(0, 1, 0), 0b010);
    assert_eq!(morton_encode3(0, 0, 1), 0b100);
    assert_eq!(morton_encode3(1, 1, 1), 0b111);
    // (x=3, y=1, z=2) → per level: (1,1,0)=011, then (1,0,1)... bit by bit:
    // x bits 11 → positions 0,3; y bit 1 → position 1; z bit 10 → position 5
    assert_eq!(morton_encode3(3, 1, 2), 0b101011);
}

#[test]
fn test_encode3_decode3_roundtrip() {
    let coords = [
        (0u16, 0u16, 0u16),
        (1, 2, 3),
        (8, 8, 8),
        (15, 0, 1023),
        (1023, 1023, 1023),
        (512, 256, 128),
    ];
    for (x, y, z) in coords {
        let code = morton_encode3(x, y, z);
        assert_eq!(morton_decode3(code), (x, y, z), "coords ({}, {}, {})", x, y, z);
    }
}

#[test]
fn test_adjacent_cells_share_prefix() {
    // Cells (4,4,4) and (5,4,4) differ only in x bit 0 → codes differ in bit 0
    let a = morton_encode3(4, 4, 4);
    let b = morton_encode3(5, 4, 4);
    assert_eq!(a ^ b, 1);
}

// ============================================================================
// Bit width helpers
// ============================================================================

#[test]
fn test_bit_width() {
    assert_eq!(bit_width(0), 0);
    assert_eq!(bit_width(1), 1);
    assert_eq!(bit_width(2), 2);
    assert_eq!(bit_width(3), 2);
    assert_eq!(bit_width(0b1000_0000), 8);
    assert_eq!(bit_width(u32::MAX), 32);
}

#[test]
fn test_prev_pow2() {
    assert_eq!(prev_pow2(0), 0);
    assert_eq!(prev_pow2(1), 1);
    assert_eq!(prev_pow2(2), 2);
    assert_eq!(prev_pow2(3), 2);
    assert_eq!(prev_pow2(500), 256);
    assert_eq!(prev_pow2(1024), 1024);
    assert_eq!(prev_pow2(1025), 1024);
}

#[test]
fn test_depth_level() {
    // Root: sentinel only
    assert_eq!(depth_level(1), 0);
    // Depth 1: sentinel at bit 3
    assert_eq!(depth_level(0b1000), 1);
    assert_eq!(depth_level(0b1111), 1);
    // Depth 2: sentinel at bit 6
    assert_eq!(depth_level(0b100_0000), 2);
    // Depth 4 at world coeff 16: sentinel at bit 12
    assert_eq!(depth_level(1 << 12), 4);
}

// ============================================================================
// Lowest common ancestor
// ============================================================================

#[test]
fn test_lca_of_identical_codes() {
    let code = (1 << 6) | morton_encode3(2, 1, 3);
    assert_eq!(morton_lca(code, code), code);
}

#[test]
fn test_lca_with_direct_ancestor() {
    let parent = (1 << 3) | morton_encode3(1, 0, 1);
    let child = (parent << 3) | 0b010;
    assert_eq!(morton_lca(parent, child), parent);
    assert_eq!(morton_lca(child, parent), parent);
}

#[test]
fn test_lca_of_siblings_is_parent() {
    let parent = (1 << 3) | morton_encode3(1, 1, 0);
    let child_a = (parent << 3) | 0b000;
    let child_b = (parent << 3) | 0b111;
    assert_eq!(morton_lca(child_a, child_b), parent);
}

#[test]
fn test_lca_of_distant_cells_is_root() {
    // Depth 2 cells in opposite corners share only the root
    let a = (1 << 6) | morton_encode3(0, 0, 0);
    let b = (1 << 6) | morton_encode3(3, 3, 3);
    assert_eq!(morton_lca(a, b), 1);
}

#[test]
fn test_lca_with_zero_is_zero() {
    let code = (1 << 9) | morton_encode3(5, 2, 7);
    assert_eq!(morton_lca(code, 0), 0);
    assert_eq!(morton_lca(0, code), 0);
    assert_eq!(morton_lca(0, 0), 0);
}

#[test]
fn test_lca_differing_depths() {
    // Deep node under cell (2,2,2) at depth 1, shallow node at depth 1 cell (2,2,2)
    let shallow = (1 << 3) | morton_encode3(1, 1, 1); // depth 1, cell (1,1,1)
    let deep = (((shallow << 3) | 0b101) << 3) | 0b011; // depth 3 below it
    assert_eq!(morton_lca(shallow, deep), shallow);
}
