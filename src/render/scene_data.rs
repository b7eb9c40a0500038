//! CPU-side scene package, ready for GPU upload.

use bytemuck::{Pod, Zeroable};

use crate::bvh::{FlatBvh, FlatNode};

/// Vertex positions of one triangle, each padded to a vec4 slot (48 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TriangleVertices {
    pub v0: [f32; 3],
    _pad0: f32,
    pub v1: [f32; 3],
    _pad1: f32,
    pub v2: [f32; 3],
    _pad2: f32,
}

/// Material record of one triangle: linear color plus the shading tag.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TriangleMaterial {
    pub color: [f32; 3],
    pub kind: f32,
}

/// Everything the render engine needs to upload a scene: the reordered
/// triangle streams and the flat BVH, produced by the scene builder.
///
/// Owned by the builder task until submission, then by the render engine
/// until the upload completes.
pub struct BuiltScene {
    pub vertices: Vec<TriangleVertices>,
    pub materials: Vec<TriangleMaterial>,
    pub nodes: Vec<FlatNode>,
    pub triangle_count: u32,
}

impl BuiltScene {
    /// A valid zero-triangle scene. The engine binds dummy buffers for the
    /// empty streams.
    pub fn empty() -> Self {
        Self {
            vertices: Vec::new(),
            materials: Vec::new(),
            nodes: Vec::new(),
            triangle_count: 0,
        }
    }

    /// Pack a flattened BVH into the upload streams, in leaf order.
    pub fn from_flat(flat: &FlatBvh) -> Self {
        let vertices = flat
            .triangles
            .iter()
            .map(|t| TriangleVertices {
                v0: t.v0.to_array(),
                _pad0: 0.0,
                v1: t.v1.to_array(),
                _pad1: 0.0,
                v2: t.v2.to_array(),
                _pad2: 0.0,
            })
            .collect();

        let materials = flat
            .triangles
            .iter()
            .map(|t| TriangleMaterial {
                color: t.color.to_array(),
                kind: t.material.shader_id(),
            })
            .collect();

        Self {
            vertices,
            materials,
            nodes: flat.nodes.clone(),
            triangle_count: flat.triangles.len() as u32,
        }
    }

    pub fn vertices_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn materials_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.materials)
    }

    pub fn nodes_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.nodes)
    }
}
