//! Ivar Core - scene data shared by the renderer and scene loaders.
//!
//! This crate provides:
//!
//! - **`Energy`**: the RGB radiometric triple used for radiance and throughput
//! - **`Mesh`**: the triangle-soup interface external loaders fill in
//! - **`Texture` / `TextureCache`**: decoded, linearized images for mapped materials
//! - **`SceneError`**: everything that can go wrong before a render starts

pub mod energy;
pub mod error;
pub mod mesh;
pub mod texture;

// Re-export commonly used types
pub use energy::Energy;
pub use error::{SceneError, SceneResult};
pub use mesh::Mesh;
pub use texture::{Texture, TextureCache, TextureError, TextureResult};
