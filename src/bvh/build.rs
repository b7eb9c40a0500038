//! Median-split BVH builder.
//!
//! Top-down recursive partitioning of the triangle list into a full binary
//! tree. The split axis is the longest axis of the sub-range's bounding box,
//! so builds are deterministic and tests reproducible.

use crate::bvh::Triangle;
use crate::util::{Aabb, Error, Result};

/// A node of the BVH tree.
///
/// Every node stores the union of its descendants' triangle boxes. Leaves
/// reference triangles by index into the build input; the flattener resolves
/// these into the reordered GPU stream.
#[derive(Debug, Clone)]
pub enum BvhNode {
    Internal {
        left: Box<BvhNode>,
        right: Box<BvhNode>,
        bbox: Aabb,
    },
    Leaf {
        triangle: usize,
        bbox: Aabb,
    },
}

impl BvhNode {
    /// Bounding box of this node.
    #[inline]
    pub fn bbox(&self) -> Aabb {
        match self {
            BvhNode::Internal { bbox, .. } | BvhNode::Leaf { bbox, .. } => *bbox,
        }
    }

    /// Total number of nodes in this subtree.
    pub fn node_count(&self) -> usize {
        match self {
            BvhNode::Internal { left, right, .. } => 1 + left.node_count() + right.node_count(),
            BvhNode::Leaf { .. } => 1,
        }
    }

    /// Number of leaves in this subtree.
    pub fn leaf_count(&self) -> usize {
        match self {
            BvhNode::Internal { left, right, .. } => left.leaf_count() + right.leaf_count(),
            BvhNode::Leaf { .. } => 1,
        }
    }
}

/// Build a BVH over `triangles`.
///
/// The leaves are exactly the input triangles, each appearing once.
/// Fails with [`Error::EmptyScene`] for an empty list and
/// [`Error::DegenerateGeometry`] if any triangle has a non-finite vertex.
#[tracing::instrument(skip_all, fields(tri_count = triangles.len()))]
pub fn build_bvh(triangles: &[Triangle]) -> Result<BvhNode> {
    if triangles.is_empty() {
        return Err(Error::EmptyScene);
    }
    for (index, tri) in triangles.iter().enumerate() {
        if !tri.is_finite() {
            return Err(Error::DegenerateGeometry { index });
        }
    }

    let mut order: Vec<usize> = (0..triangles.len()).collect();
    let root = build_range(triangles, &mut order);
    tracing::debug!(nodes = root.node_count(), "BVH build finished");
    Ok(root)
}

/// Recursive split over a sub-range of the triangle order.
fn build_range(triangles: &[Triangle], range: &mut [usize]) -> BvhNode {
    debug_assert!(!range.is_empty());

    if range.len() == 1 {
        let triangle = range[0];
        return BvhNode::Leaf {
            triangle,
            bbox: triangles[triangle].bbox(),
        };
    }

    let bbox = range_bbox(triangles, range);
    let axis = bbox.longest_axis();

    if range.len() == 2 {
        // Smaller bbox center on the split axis becomes the left child.
        let (a, b) = (range[0], range[1]);
        let (a, b) = if triangles[a].bbox_center()[axis] <= triangles[b].bbox_center()[axis] {
            (a, b)
        } else {
            (b, a)
        };
        return BvhNode::Internal {
            left: Box::new(BvhNode::Leaf {
                triangle: a,
                bbox: triangles[a].bbox(),
            }),
            right: Box::new(BvhNode::Leaf {
                triangle: b,
                bbox: triangles[b].bbox(),
            }),
            bbox,
        };
    }

    range.sort_unstable_by(|&a, &b| {
        triangles[a].bbox_center()[axis]
            .partial_cmp(&triangles[b].bbox_center()[axis])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mid = range.len() / 2;
    let (lo, hi) = range.split_at_mut(mid);
    let left = build_range(triangles, lo);
    let right = build_range(triangles, hi);

    BvhNode::Internal {
        left: Box::new(left),
        right: Box::new(right),
        bbox,
    }
}

fn range_bbox(triangles: &[Triangle], range: &[usize]) -> Aabb {
    let mut bbox = Aabb::EMPTY;
    for &idx in range {
        bbox.grow(&triangles[idx].bbox());
    }
    bbox
}
