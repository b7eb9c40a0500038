//! Error types for the tracer.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for tracer operations.
#[derive(Error, Debug)]
pub enum Error {
    /// BVH build invoked with zero triangles
    #[error("Cannot build a BVH from an empty triangle list")]
    EmptyScene,

    /// Triangle with a non-finite vertex component
    #[error("Degenerate geometry: triangle {index} has a non-finite component")]
    DegenerateGeometry { index: usize },

    /// A mesh file could not be loaded; the instance is skipped
    #[error("Failed to load mesh {path}: {source}")]
    MeshLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Device-side creation or allocation failure; fatal to the render role
    #[error("GPU resource failure: {0}")]
    GpuResource(String),

    /// The compute kernel could not be loaded at startup
    #[error("Failed to load shader {path}: {source}")]
    ShaderLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the tracer [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
