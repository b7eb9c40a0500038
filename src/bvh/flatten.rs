//! Depth-first BVH linearization.
//!
//! Serializes the tree into a fixed-stride node array the compute kernel
//! can walk with an index stack, and reorders the triangle list to match
//! leaf-visitation order so leaf payloads are direct indices.

use bytemuck::{Pod, Zeroable};

use crate::bvh::{BvhNode, Triangle};
use crate::util::Aabb;

/// GPU-side BVH node (48 bytes, matches the WGSL struct).
///
/// Internal node: `a` = left child index, `b` = right child index.
/// Leaf node: `a` = `-(triangle_index + 1)`, `b` = -1.
///
/// Nodes are written in depth-first pre-order: the root is entry 0 and the
/// left child of any internal node at index `i` is entry `i + 1`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FlatNode {
    pub bbox_min: [f32; 3],
    _pad0: f32,
    pub bbox_max: [f32; 3],
    _pad1: f32,
    pub a: i32,
    pub b: i32,
    _pad2: [i32; 2],
}

impl FlatNode {
    fn from_bbox(bbox: Aabb) -> Self {
        Self {
            bbox_min: bbox.min.to_array(),
            _pad0: 0.0,
            bbox_max: bbox.max.to_array(),
            _pad1: 0.0,
            a: 0,
            b: 0,
            _pad2: [0; 2],
        }
    }

    /// True when this entry encodes a leaf.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.a < 0
    }

    /// Index into the reordered triangle list, for leaf entries.
    #[inline]
    pub fn triangle_index(&self) -> usize {
        debug_assert!(self.is_leaf());
        (-(self.a + 1)) as usize
    }
}

/// Result of flattening: the node array plus the triangles reordered to
/// leaf-visitation order. Leaf payloads index into `triangles`.
pub struct FlatBvh {
    pub nodes: Vec<FlatNode>,
    pub triangles: Vec<Triangle>,
}

impl FlatBvh {
    /// Node array as bytes for GPU upload.
    pub fn nodes_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.nodes)
    }
}

/// Flatten `root` into a node array, reordering `triangles` by leaf order.
///
/// `triangles` must be the list the tree was built over; leaf indices
/// reference it.
#[tracing::instrument(skip_all, fields(node_count = root.node_count()))]
pub fn flatten_bvh(root: &BvhNode, triangles: &[Triangle]) -> FlatBvh {
    let mut flat = FlatBvh {
        nodes: Vec::with_capacity(root.node_count()),
        triangles: Vec::with_capacity(root.leaf_count()),
    };
    flatten_node(root, triangles, &mut flat);
    flat
}

/// Reserve this node's slot, recurse, then patch in the child indices.
fn flatten_node(node: &BvhNode, triangles: &[Triangle], out: &mut FlatBvh) -> i32 {
    let my = out.nodes.len();
    out.nodes.push(FlatNode::from_bbox(node.bbox()));

    match node {
        BvhNode::Internal { left, right, .. } => {
            let li = flatten_node(left, triangles, out);
            let ri = flatten_node(right, triangles, out);
            out.nodes[my].a = li;
            out.nodes[my].b = ri;
        }
        BvhNode::Leaf { triangle, .. } => {
            let slot = out.triangles.len() as i32;
            out.triangles.push(triangles[*triangle]);
            out.nodes[my].a = -(slot + 1);
            out.nodes[my].b = -1;
        }
    }

    my as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::{build_bvh, MaterialKind};
    use glam::{vec3, Vec3};

    fn tri_at(center: Vec3) -> Triangle {
        Triangle::new(
            center + vec3(-0.5, -0.5, 0.0),
            center + vec3(0.5, -0.5, 0.0),
            center + vec3(0.0, 0.5, 0.0),
            Vec3::ONE,
            MaterialKind::Matte,
        )
    }

    fn flatten(tris: &[Triangle]) -> FlatBvh {
        let root = build_bvh(tris).unwrap();
        flatten_bvh(&root, tris)
    }

    #[test]
    fn test_node_stride_is_48_bytes() {
        assert_eq!(std::mem::size_of::<FlatNode>(), 48);
    }

    #[test]
    fn test_single_triangle() {
        let tris = vec![Triangle::new(
            vec3(0.0, 0.0, 0.0),
            vec3(1.0, 0.0, 0.0),
            vec3(0.0, 1.0, 0.0),
            Vec3::ONE,
            MaterialKind::Matte,
        )];
        let flat = flatten(&tris);

        assert_eq!(flat.nodes.len(), 1);
        assert_eq!(flat.triangles.len(), 1);
        assert_eq!(flat.nodes_bytes().len(), 48);

        let leaf = flat.nodes[0];
        assert_eq!(leaf.a, -1);
        assert_eq!(leaf.b, -1);
        assert_eq!(Vec3::from(leaf.bbox_min), tris[0].bbox().min);
        assert_eq!(Vec3::from(leaf.bbox_max), tris[0].bbox().max);
    }

    #[test]
    fn test_two_triangles_three_nodes() {
        let tris = vec![tri_at(vec3(-10.0, 0.0, 0.0)), tri_at(vec3(10.0, 0.0, 0.0))];
        let flat = flatten(&tris);

        assert_eq!(flat.nodes.len(), 3);
        let root = flat.nodes[0];
        assert!(!root.is_leaf());
        assert_eq!(root.a, 1, "left child must be adjacent");
        assert_eq!(root.b, 2);

        // Left child is the smaller x center; triangle order follows leaves.
        assert_eq!(flat.nodes[1].a, -1);
        assert_eq!(flat.nodes[2].a, -2);
        assert!(flat.triangles[0].bbox_center().x < flat.triangles[1].bbox_center().x);

        let root_box = Aabb::new(Vec3::from(root.bbox_min), Vec3::from(root.bbox_max));
        assert!(root_box.contains(&tris[0].bbox()));
        assert!(root_box.contains(&tris[1].bbox()));
    }

    #[test]
    fn test_left_child_adjacency() {
        let tris: Vec<Triangle> = (0..64)
            .map(|i| tri_at(vec3((i % 8) as f32 * 2.0, (i / 8) as f32 * 2.0, 0.0)))
            .collect();
        let flat = flatten(&tris);

        for (i, node) in flat.nodes.iter().enumerate() {
            if !node.is_leaf() {
                assert_eq!(node.a as usize, i + 1, "left child of {i} must be {}", i + 1);
                let right = node.b as usize;
                assert!(right > i && right < flat.nodes.len());
            }
        }
    }

    #[test]
    fn test_leaf_encoding_and_reorder_is_permutation() {
        let tris: Vec<Triangle> = (0..41)
            .map(|i| tri_at(vec3(i as f32 * 1.3, -(i as f32) * 0.7, (i % 3) as f32)))
            .collect();
        let flat = flatten(&tris);

        assert_eq!(flat.triangles.len(), tris.len());
        assert_eq!(flat.nodes.len(), 2 * tris.len() - 1);

        let mut seen = vec![false; tris.len()];
        for node in &flat.nodes {
            if node.is_leaf() {
                assert_eq!(node.b, -1);
                let idx = node.triangle_index();
                assert!(idx < flat.triangles.len());
                assert!(!seen[idx], "each reordered slot referenced once");
                seen[idx] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));

        // Same multiset of triangles, possibly in a different order
        let mut original: Vec<_> = tris.iter().map(|t| t.v0.to_array()).collect();
        let mut reordered: Vec<_> = flat.triangles.iter().map(|t| t.v0.to_array()).collect();
        original.sort_by(|a, b| a.partial_cmp(b).unwrap());
        reordered.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(original, reordered);
    }

    /// Closest hit by walking the flat node array with an index stack, the
    /// way the compute kernel does.
    fn traverse_flat(flat: &FlatBvh, ray: &crate::util::Ray) -> Option<(usize, f32)> {
        let mut best: Option<(usize, f32)> = None;
        let mut stack = vec![0usize];
        while let Some(index) = stack.pop() {
            let node = flat.nodes[index];
            let bbox = Aabb::new(Vec3::from(node.bbox_min), Vec3::from(node.bbox_max));
            let t_max = best.map_or(f32::MAX, |(_, t)| t);
            if !bbox.hit(ray, 0.001, t_max) {
                continue;
            }
            if node.is_leaf() {
                let tri = node.triangle_index();
                if let Some(t) = flat.triangles[tri].hit(ray, 0.001, t_max) {
                    best = Some((tri, t));
                }
            } else {
                stack.push(node.a as usize);
                stack.push(node.b as usize);
            }
        }
        best
    }

    #[test]
    fn test_flat_traversal_matches_brute_force() {
        let tris: Vec<Triangle> = (0..50)
            .map(|i| {
                tri_at(vec3(
                    (i % 10) as f32 * 3.0 - 15.0,
                    (i / 10) as f32 * 3.0 - 6.0,
                    (i % 4) as f32 * 2.0,
                ))
            })
            .collect();
        let flat = flatten(&tris);

        // A fan of rays from a fixed eye point; every closest hit found by
        // brute force must match the flat-BVH walk.
        for ix in -6..=6 {
            for iy in -4..=4 {
                let ray = crate::util::Ray::new(
                    vec3(0.0, 0.0, 40.0),
                    vec3(ix as f32 * 0.1, iy as f32 * 0.1, -1.0),
                );

                let brute = flat
                    .triangles
                    .iter()
                    .enumerate()
                    .filter_map(|(i, t)| t.hit(&ray, 0.001, f32::MAX).map(|d| (i, d)))
                    .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

                let walked = traverse_flat(&flat, &ray);
                match (brute, walked) {
                    (None, None) => {}
                    (Some((bi, bt)), Some((wi, wt))) => {
                        assert_eq!(bi, wi, "ray ({ix},{iy}) hit a different triangle");
                        assert!((bt - wt).abs() < 1e-5);
                    }
                    other => panic!("ray ({ix},{iy}) disagreement: {other:?}"),
                }
            }
        }
    }

    #[test]
    fn test_leaf_order_matches_traversal() {
        let tris: Vec<Triangle> = (0..16).map(|i| tri_at(vec3(i as f32 * 4.0, 0.0, 0.0))).collect();
        let flat = flatten(&tris);

        // Walking the node array in index order visits leaves in exactly
        // the order the reordered list was appended.
        let mut expected = 0usize;
        for node in &flat.nodes {
            if node.is_leaf() {
                assert_eq!(node.triangle_index(), expected);
                expected += 1;
            }
        }
        assert_eq!(expected, tris.len());
    }
}
