//! Math type re-exports and scene-space helpers.

pub use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

use bytemuck::{Pod, Zeroable};
use std::fmt;

/// Axis-aligned bounding box in single precision.
#[derive(Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct BBox3f {
    pub min: Vec3,
    pub max: Vec3,
}

impl BBox3f {
    /// Empty box; expands on the first point.
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    #[inline]
    pub fn expand_by_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Expand by the eight corners of `other` after applying `m`.
    pub fn expand_by_transformed(&mut self, other: &Self, m: &Mat4) {
        if other.is_empty() {
            return;
        }
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { other.min.x } else { other.max.x },
                if i & 2 == 0 { other.min.y } else { other.max.y },
                if i & 4 == 0 { other.min.z } else { other.max.z },
            );
            self.expand_by_point(m.transform_point3(corner));
        }
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

impl Default for BBox3f {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for BBox3f {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BBox3f")
            .field("min", &self.min)
            .field("max", &self.max)
            .finish()
    }
}

/// Compose a local matrix from translation, rotation and scale.
#[inline]
pub fn compose_trs(t: [f32; 3], r: [f32; 4], s: [f32; 3]) -> Mat4 {
    Mat4::from_scale_rotation_translation(Vec3::from(s), Quat::from_array(r), Vec3::from(t))
}

/// Decompose a local matrix into translation, rotation and scale.
///
/// Shear is discarded; glTF nodes cannot express it.
pub fn decompose_trs(m: &Mat4) -> ([f32; 3], [f32; 4], [f32; 3]) {
    let (s, r, t) = m.to_scale_rotation_translation();
    (t.to_array(), r.normalize().to_array(), s.to_array())
}
