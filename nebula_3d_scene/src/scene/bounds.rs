/// Bounding volume types for the scene index.
///
/// World-space bounds are supplied by the scene-graph/transform layer;
/// the index only stores and compares them. Boxes are kept internally in
/// center/extent form (extent = half size), spheres as center + radius.

use glam::Vec3;

// ===== AABB =====

/// Axis-Aligned Bounding Box in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    /// Minimum corner (x, y, z)
    pub min: Vec3,
    /// Maximum corner (x, y, z)
    pub max: Vec3,
}

impl AABB {
    /// Build an AABB from a center point and a half-size extent.
    pub fn from_center_extent(center: Vec3, extent: Vec3) -> AABB {
        AABB {
            min: center - extent,
            max: center + extent,
        }
    }

    /// Compute the center point of this AABB.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Compute the half-size extent of this AABB.
    pub fn extent(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Test if this AABB fully contains another AABB.
    pub fn contains(&self, other: &AABB) -> bool {
        self.min.x <= other.min.x && self.max.x >= other.max.x
        && self.min.y <= other.min.y && self.max.y >= other.max.y
        && self.min.z <= other.min.z && self.max.z >= other.max.z
    }

    /// Test if this AABB intersects (overlaps) another AABB.
    pub fn intersects(&self, other: &AABB) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x
        && self.min.y <= other.max.y && self.max.y >= other.min.y
        && self.min.z <= other.max.z && self.max.z >= other.min.z
    }
}

// ===== SPHERE =====

/// Bounding sphere in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    /// Center point
    pub center: Vec3,
    /// Radius
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Sphere {
        Sphere { center, radius }
    }

    /// Sphere enclosing an AABB: box center, radius = |extent|.
    pub fn from_aabb(aabb: &AABB) -> Sphere {
        let extent = aabb.extent();
        Sphere {
            center: aabb.center(),
            radius: extent.length(),
        }
    }

    /// Test if this sphere overlaps another sphere (touching counts).
    pub fn intersects(&self, other: &Sphere) -> bool {
        let r = self.radius + other.radius;
        (other.center - self.center).length_squared() <= r * r
    }
}

// ===== VALIDITY =====

/// Whether a center/extent pair is indexable.
///
/// NaN and infinite values as well as inverted boxes (negative extent)
/// are treated as "no bounds": the object stays registered but outside
/// the spatial tree. A zero extent is valid and sinks to the deepest
/// tree level.
pub(crate) fn bounds_valid(center: Vec3, extent: Vec3) -> bool {
    center.is_finite() && extent.is_finite() && extent.cmpge(Vec3::ZERO).all()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "bounds_tests.rs"]
mod tests;
