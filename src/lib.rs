//! # beamtrace
//!
//! Interactive GPU ray tracer for triangulated scenes.
//!
//! The GPU does the tracing; this crate is the CPU-side core that makes it
//! interactive:
//!
//! - [`bvh`] - BVH construction over all scene triangles and its
//!   linearization into a GPU-friendly flat node array
//! - [`scene`] - editable scene model, camera, mesh loading, and the
//!   background scene builder
//! - [`render`] - the render engine: a dedicated thread that owns every GPU
//!   object, consumes commands from queues, and publishes finished frames
//! - [`viewer`] - the egui application hosting the scene and driving the
//!   accumulation protocol
//! - [`util`] - errors and math primitives
//!
//! ## Threading model
//!
//! Three roles: the UI thread owns the scene and the accumulation counter,
//! the render thread owns the GPU, and an ephemeral builder task turns scene
//! snapshots into upload-ready packages. They communicate only over queues
//! and a single-slot frame handoff.

pub mod util;
pub mod bvh;
pub mod scene;
pub mod render;
pub mod viewer;

pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bvh::{build_bvh, flatten_bvh, FlatNode, MaterialKind, Triangle};
    pub use crate::render::{BuiltScene, RenderConfig, RenderEngine};
    pub use crate::scene::{Camera, ModelInstance, Scene};
    pub use crate::util::{Aabb, Error, Result};
}
