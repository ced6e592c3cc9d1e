//! Scene construction errors.
//!
//! Everything here is raised before a render starts. Problems found while
//! tracing (zero pdfs, degenerate normals) are never errors; the tracer
//! clamps them or drops the path.

use thiserror::Error;

use crate::texture::TextureError;

/// Errors that can occur while building a scene or configuring a render.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("Scene has no surfaces")]
    EmptyScene,

    #[error("Transform of {0} is singular or not finite")]
    SingularTransform(&'static str),

    #[error("Triangle has zero area")]
    DegenerateTriangle,

    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    #[error("Invalid resolution {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },

    #[error("Worker count must be at least 1")]
    ZeroWorkers,

    #[error("Sample buffer is {got_width}x{got_height}, expected {width}x{height}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
    },

    #[error("Texture error: {0}")]
    Texture(#[from] TextureError),
}

pub type SceneResult<T> = Result<T, SceneError>;
