/// Frustum with a plane layout built for batched culling.
///
/// The four side planes (left, right, bottom, top) are stored transposed:
/// one `Vec4` per normal axis holds that component for all four planes,
/// plus one `Vec4` of `+w` terms. A center/extent cube can then be tested
/// against all four side planes with three multiply-adds and two compares.
/// Near and far are handled separately as an interval along the (unit)
/// look axis.
///
/// Side planes are deliberately left unnormalized: both the center
/// distance and the projected extent scale with the normal length, so
/// the comparisons are unaffected.
///
/// The caller is responsible for computing and setting the frustum.
/// `from_view_projection()` is provided as a utility for matrices with a
/// [0, 1] clip-space depth range (the `glam` `*_rh` constructors).

use glam::{Mat4, Vec3, Vec4};
use bitflags::bitflags;

bitflags! {
    /// 2-bit frustum classification of a volume.
    ///
    /// `INSIDE` = some part of the volume is inside the frustum,
    /// `OUTSIDE` = some part is outside. The four states:
    /// - empty: untested
    /// - `INSIDE` alone: fully inside
    /// - `OUTSIDE` alone: fully outside
    /// - both: partially intersecting
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ClipStatus: u8 {
        /// A part of the volume is inside the frustum
        const INSIDE = 0b01;
        /// A part of the volume is outside the frustum
        const OUTSIDE = 0b10;
        /// The volume straddles the frustum boundary
        const PARTIAL = Self::INSIDE.bits() | Self::OUTSIDE.bits();
    }
}

impl ClipStatus {
    /// Whether this status settles every descendant volume: a fully
    /// inside or fully outside classification is inherited by children
    /// without further testing.
    pub fn is_decided(self) -> bool {
        self == Self::INSIDE || self == Self::OUTSIDE
    }
}

/// Six frustum planes in a SIMD-friendly transposed layout.
#[derive(Debug, Clone, Copy)]
pub struct SimdFrustum {
    /// X components of the left/right/bottom/top plane normals
    pub lrbt_nx: Vec4,
    /// Y components of the left/right/bottom/top plane normals
    pub lrbt_ny: Vec4,
    /// Z components of the left/right/bottom/top plane normals
    pub lrbt_nz: Vec4,
    /// `+w` terms of the side planes; a point P is inside plane i when
    /// `N_i · P + w_i >= 0`
    pub lrbt_w: Vec4,
    /// Unit view direction; near/far are distances along this axis
    pub look_axis: Vec3,
    /// Near distance along the look axis
    pub near_plane: f32,
    /// Far distance along the look axis
    pub far_plane: f32,
}

impl SimdFrustum {
    /// Extract frustum parameters from a view-projection matrix.
    ///
    /// Side planes come from the Gribb & Hartmann row combinations
    /// (left = row3 + row0, right = row3 - row0, bottom = row3 + row1,
    /// top = row3 - row1). The near plane is row2 (clip z >= 0) and the
    /// far plane row3 - row2, both converted to distances along the
    /// normalized near-plane axis.
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let r0 = vp.row(0);
        let r1 = vp.row(1);
        let r2 = vp.row(2);
        let r3 = vp.row(3);

        let lrbt_nx = Vec4::new(r3.x + r0.x, r3.x - r0.x, r3.x + r1.x, r3.x - r1.x);
        let lrbt_ny = Vec4::new(r3.y + r0.y, r3.y - r0.y, r3.y + r1.y, r3.y - r1.y);
        let lrbt_nz = Vec4::new(r3.z + r0.z, r3.z - r0.z, r3.z + r1.z, r3.z - r1.z);
        let lrbt_w = Vec4::new(r3.w + r0.w, r3.w - r0.w, r3.w + r1.w, r3.w - r1.w);

        // Near plane normal is row2; its direction is the view axis
        let near_axis = Vec3::new(r2.x, r2.y, r2.z);
        let inv_near_len = 1.0 / near_axis.length();
        let look_axis = near_axis * inv_near_len;
        let near_plane = -r2.w * inv_near_len;

        let far_axis = Vec3::new(r3.x - r2.x, r3.y - r2.y, r3.z - r2.z);
        let far_plane = (r3.w - r2.w) / far_axis.length();

        Self {
            lrbt_nx,
            lrbt_ny,
            lrbt_nz,
            lrbt_w,
            look_axis,
            near_plane,
            far_plane,
        }
    }

    /// Test a center/extent box for intersection with the frustum.
    ///
    /// Conservative: may return `true` for a box slightly outside a
    /// corner (plane-by-plane test), never `false` for a visible box.
    /// Useful for per-object culling after the hierarchical node pass.
    pub fn has_intersection(&self, box_center: Vec3, box_extent: Vec3) -> bool {
        // Distance of the box center from each side plane
        let mut center_distance = self.lrbt_nx * box_center.x + self.lrbt_w;
        center_distance += self.lrbt_ny * box_center.y;
        center_distance += self.lrbt_nz * box_center.z;

        // Projection radius of the most outside vertex
        let mut projected_extent = self.lrbt_nx.abs() * box_extent.x;
        projected_extent += self.lrbt_ny.abs() * box_extent.y;
        projected_extent += self.lrbt_nz.abs() * box_extent.z;

        if center_distance.cmplt(-projected_extent).any() {
            return false;
        }

        // Near/far interval along the look axis
        let center_along_look = self.look_axis.dot(box_center);
        let extent_along_look = self.look_axis.abs().dot(box_extent);
        let closest = center_along_look - extent_along_look;
        let farthest = center_along_look + extent_along_look;

        farthest > self.near_plane && closest < self.far_plane
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "frustum_tests.rs"]
mod tests;
