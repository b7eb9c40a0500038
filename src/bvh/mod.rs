//! BVH acceleration structure.
//!
//! The GPU traverses a flat node array; the tree never leaves the CPU.
//!
//! ## Pipeline
//! ```text
//! Triangles → build_bvh (median split) → flatten_bvh → 48-byte nodes
//!                                                    + reordered triangles
//! ```

mod build;
mod flatten;
mod triangle;

pub use build::{build_bvh, BvhNode};
pub use flatten::{flatten_bvh, FlatBvh, FlatNode};
pub use triangle::{MaterialKind, Triangle};
