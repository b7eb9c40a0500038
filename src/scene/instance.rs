//! A single placed model in the scene.

use std::path::{Path, PathBuf};

use crate::bvh::MaterialKind;
use crate::util::Vec3;

/// One placed copy of a mesh file: transform plus material attributes.
///
/// Mutable from the UI; the scene builder reads a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInstance {
    pub mesh_path: PathBuf,
    pub display_name: String,
    pub position: Vec3,
    pub scale: Vec3,
    pub color: Vec3,
    pub material: MaterialKind,
}

impl ModelInstance {
    pub fn new(mesh_path: impl Into<PathBuf>, display_name: impl Into<String>) -> Self {
        Self {
            mesh_path: mesh_path.into(),
            display_name: display_name.into(),
            position: Vec3::ZERO,
            scale: Vec3::ONE,
            color: Vec3::splat(0.8),
            material: MaterialKind::Matte,
        }
    }

    /// Builder-style setters for scene population.
    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn scaled(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn colored(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    pub fn with_material(mut self, material: MaterialKind) -> Self {
        self.material = material;
        self
    }

    pub fn mesh_path(&self) -> &Path {
        &self.mesh_path
    }

    /// Instance transform: scale componentwise, then translate.
    /// Rotation is reserved and currently unsupported.
    #[inline]
    pub fn transform_vertex(&self, v: Vec3) -> Vec3 {
        v * self.scale + self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec3;

    #[test]
    fn test_transform_order_scale_then_translate() {
        // Non-uniform scale catches ordering bugs: translate-then-scale
        // would multiply the position too.
        let instance = ModelInstance::new("m.stl", "m")
            .at(vec3(10.0, -4.0, 2.0))
            .scaled(vec3(2.0, 3.0, 0.5));

        let v = vec3(1.0, 1.0, 1.0);
        assert_eq!(instance.transform_vertex(v), vec3(12.0, -1.0, 2.5));

        let origin = vec3(0.0, 0.0, 0.0);
        assert_eq!(instance.transform_vertex(origin), vec3(10.0, -4.0, 2.0));
    }
}
