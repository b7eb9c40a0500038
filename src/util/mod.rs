//! Utility types for the tracer.
//!
//! - [`Error`] / [`Result`] - error handling
//! - Math type re-exports from glam plus [`Aabb`]

mod error;
mod math;

pub use error::*;
pub use math::*;
