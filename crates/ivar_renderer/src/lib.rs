//! Ivar - CPU path tracing
//!
//! A Monte Carlo path tracer for physically-based rendering:
//!
//! - **Surfaces**: transformed unit spheres and cubes, smooth triangles
//! - **Materials**: stochastic choice of Lambert, GGX microfacet and refractive lobes
//! - **Tree**: SAH k-d tree with overlapper promotion and a light list
//! - **Tracer**: next-event estimation, Russian roulette, Beer's law, adaptive branching
//! - **Frame**: worker pool feeding an aggregator, snapshot while rendering

mod bsdf;
mod camera;
mod config;
mod cube;
mod environment;
mod frame;
mod hittable;
mod material;
mod sample;
mod scene;
mod sphere;
mod surface;
mod tracer;
mod tree;
mod triangle;

pub use bsdf::{fresnel_schlick, fresnel_to_ior, reflect, refract, Bsdf, Lambert, Microfacet, Transmit};
pub use camera::{Camera, ThinLensCamera};
pub use config::RenderConfig;
pub use cube::Cube;
pub use environment::{Environment, Flat, Gradient};
pub use frame::Frame;
pub use hittable::{HitRecord, Hittable, SurfaceList};
pub use material::{Grid, Mapped, Material, Uniform};
pub use sample::{Pixel, Sample};
pub use scene::Scene;
pub use sphere::Sphere;
pub use surface::{Shape, Surface, SurfaceBuilder};
pub use tracer::{Tracer, MAX_LIGHTS};
pub use tree::{Tree, TreeStats, LEAF_TARGET};
pub use triangle::Triangle;

/// Re-export the scene data and math types renderer users need
pub use ivar_core::{Energy, Mesh, SceneError, SceneResult, Texture, TextureCache};
pub use ivar_math::{Mat4, Ray, Vec3};
