//! Scene triangle with cached bounding box and material attributes.

use crate::util::{Aabb, Vec3};

/// Padding applied to any bbox axis thinner than itself, so flat triangles
/// still have a traversable volume.
const PAD_EPSILON: f32 = 1e-4;

/// Shading behavior tag, encoded as a float in the GPU material stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaterialKind {
    /// Lambertian diffuse
    #[default]
    Matte,
    /// Perfect mirror
    MetalShiny,
    /// Mirror with roughness
    MetalFuzzy,
    /// Light source; color may exceed 1.0
    Emissive,
}

impl MaterialKind {
    /// All material kinds, in shader-tag order.
    pub const ALL: [MaterialKind; 4] = [
        MaterialKind::Matte,
        MaterialKind::MetalShiny,
        MaterialKind::MetalFuzzy,
        MaterialKind::Emissive,
    ];

    /// The float tag the compute kernel switches on.
    #[inline]
    pub fn shader_id(self) -> f32 {
        match self {
            MaterialKind::Matte => 0.0,
            MaterialKind::MetalShiny => 1.0,
            MaterialKind::MetalFuzzy => 2.0,
            MaterialKind::Emissive => 3.0,
        }
    }

    /// Display name for the UI.
    pub fn label(self) -> &'static str {
        match self {
            MaterialKind::Matte => "Matte (Lambertian)",
            MaterialKind::MetalShiny => "Metal (Shiny)",
            MaterialKind::MetalFuzzy => "Metal (Fuzzy)",
            MaterialKind::Emissive => "Emissive (Light)",
        }
    }
}

/// A world-space triangle carrying its instance's material attributes.
///
/// The bounding box is computed once at construction and cached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub v0: Vec3,
    pub v1: Vec3,
    pub v2: Vec3,
    /// Linear color; emissive materials may exceed 1.0
    pub color: Vec3,
    pub material: MaterialKind,
    bbox: Aabb,
}

impl Triangle {
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3, color: Vec3, material: MaterialKind) -> Self {
        let bbox = Self::padded_bbox(v0, v1, v2);
        Self {
            v0,
            v1,
            v2,
            color,
            material,
            bbox,
        }
    }

    /// Cached bounding box.
    #[inline]
    pub fn bbox(&self) -> Aabb {
        self.bbox
    }

    /// Center of the cached bounding box. Used for split-axis sorting.
    #[inline]
    pub fn bbox_center(&self) -> Vec3 {
        self.bbox.center()
    }

    /// True when every vertex component is finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.v0.is_finite() && self.v1.is_finite() && self.v2.is_finite()
    }

    /// Moller-Trumbore intersection; the hit distance within
    /// `[t_min, t_max]`, or `None`.
    ///
    /// The GPU kernel owns traversal; this exists for the geometry tests
    /// that validate the flat BVH against brute force.
    pub fn hit(&self, ray: &crate::util::Ray, t_min: f32, t_max: f32) -> Option<f32> {
        let e1 = self.v1 - self.v0;
        let e2 = self.v2 - self.v0;
        let p = ray.direction.cross(e2);
        let det = e1.dot(p);
        if det.abs() < 1e-8 {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = ray.origin - self.v0;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(e1);
        let v = ray.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = e2.dot(q) * inv_det;
        (t_min..=t_max).contains(&t).then_some(t)
    }

    /// Tight box over the three vertices, with degenerate axes widened by
    /// [`PAD_EPSILON`].
    fn padded_bbox(v0: Vec3, v1: Vec3, v2: Vec3) -> Aabb {
        let min = v0.min(v1).min(v2);
        let mut max = v0.max(v1).max(v2);
        for axis in 0..3 {
            if max[axis] - min[axis] < PAD_EPSILON {
                tracing::trace!(axis, "padding degenerate triangle bbox axis");
                max[axis] += PAD_EPSILON;
            }
        }
        Aabb::new(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec3;

    #[test]
    fn test_bbox_encloses_vertices() {
        let t = Triangle::new(
            vec3(0.0, 0.0, 0.0),
            vec3(1.0, 0.0, 2.0),
            vec3(0.0, 3.0, -1.0),
            Vec3::ONE,
            MaterialKind::Matte,
        );
        let b = t.bbox();
        assert_eq!(b.min, vec3(0.0, 0.0, -1.0));
        assert_eq!(b.max, vec3(1.0, 3.0, 2.0));
    }

    #[test]
    fn test_flat_triangle_gets_padded() {
        // Lies entirely in the z = 0 plane
        let t = Triangle::new(
            vec3(0.0, 0.0, 0.0),
            vec3(1.0, 0.0, 0.0),
            vec3(0.0, 1.0, 0.0),
            Vec3::ONE,
            MaterialKind::Matte,
        );
        let b = t.bbox();
        assert!(b.max.z > b.min.z, "degenerate z axis must be padded");
        assert!(b.max.z - b.min.z >= 1e-4);
    }

    #[test]
    fn test_non_finite_detected() {
        let t = Triangle::new(
            vec3(f32::NAN, 0.0, 0.0),
            vec3(1.0, 0.0, 0.0),
            vec3(0.0, 1.0, 0.0),
            Vec3::ONE,
            MaterialKind::Matte,
        );
        assert!(!t.is_finite());
    }

    #[test]
    fn test_ray_triangle_hit() {
        let t = Triangle::new(
            vec3(-1.0, -1.0, 0.0),
            vec3(1.0, -1.0, 0.0),
            vec3(0.0, 1.0, 0.0),
            Vec3::ONE,
            MaterialKind::Matte,
        );
        let through = crate::util::Ray::new(vec3(0.0, 0.0, 5.0), vec3(0.0, 0.0, -1.0));
        let beside = crate::util::Ray::new(vec3(3.0, 0.0, 5.0), vec3(0.0, 0.0, -1.0));

        let dist = t.hit(&through, 0.001, f32::MAX).unwrap();
        assert!((dist - 5.0).abs() < 1e-5);
        assert!(t.hit(&beside, 0.001, f32::MAX).is_none());
        // Behind the origin
        assert!(t.hit(&through, 0.001, 4.0).is_none());
    }

    #[test]
    fn test_shader_ids() {
        assert_eq!(MaterialKind::Matte.shader_id(), 0.0);
        assert_eq!(MaterialKind::MetalShiny.shader_id(), 1.0);
        assert_eq!(MaterialKind::MetalFuzzy.shader_id(), 2.0);
        assert_eq!(MaterialKind::Emissive.shader_id(), 3.0);
    }
}
