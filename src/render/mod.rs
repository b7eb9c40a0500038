//! Render engine.
//!
//! A dedicated thread owns every GPU object and runs the frame loop:
//! drain command queues, write the camera uniform, dispatch the compute
//! kernel, read the image back, publish it to the UI through a single-slot
//! handoff. Scene uploads are hot-swapped behind a device-idle wait.

mod engine;
mod frame;
mod gpu;
mod scene_data;
mod uniform;

pub use engine::{RenderConfig, RenderEngine};
pub use frame::{Frame, FrameSlot};
pub use scene_data::{BuiltScene, TriangleMaterial, TriangleVertices};
pub use uniform::CameraUniform;
