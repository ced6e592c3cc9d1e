//! Render-ready surfaces and the builder that positions them.
//!
//! Spheres and cubes are unit shapes placed by a transform. The transform is
//! only mutable on a [`SurfaceBuilder`]; `build()` validates it and returns
//! an immutable [`Surface`] that can be shared with the workers.

use std::sync::Arc;

use ivar_core::{Energy, Mesh, SceneError, SceneResult};
use ivar_math::{Aabb, EulerRot, Mat4, Mat4Ext, Ray, Vec3};
use rand::RngCore;

use crate::bsdf::Bsdf;
use crate::cube::Cube;
use crate::material::Material;
use crate::sphere::Sphere;
use crate::triangle::Triangle;

/// Geometry of a surface.
#[derive(Debug, Clone)]
pub enum Shape {
    Sphere(Sphere),
    Cube(Cube),
    Triangle(Triangle),
}

/// A piece of geometry with a (shared) material.
#[derive(Debug, Clone)]
pub struct Surface {
    shape: Shape,
    material: Arc<Material>,
}

impl Surface {
    /// Start a unit-diameter sphere centered at the origin.
    pub fn sphere(material: Arc<Material>) -> SurfaceBuilder {
        SurfaceBuilder::new(UnitShape::Sphere, material)
    }

    /// Start a unit cube spanning [-0.5, 0.5] on every axis.
    pub fn cube(material: Arc<Material>) -> SurfaceBuilder {
        SurfaceBuilder::new(UnitShape::Cube, material)
    }

    pub fn triangle(triangle: Triangle, material: Arc<Material>) -> Self {
        Self {
            shape: Shape::Triangle(triangle),
            material,
        }
    }

    /// Convert a loaded mesh into triangles sharing one material.
    ///
    /// Out-of-range indices fail the whole mesh; zero-area faces are skipped.
    pub fn from_mesh(mesh: &Mesh, material: Arc<Material>) -> SceneResult<Vec<Surface>> {
        mesh.validate()?;

        let mut surfaces = Vec::with_capacity(mesh.triangle_count());
        let mut skipped = 0usize;
        for [i0, i1, i2] in mesh.faces() {
            let p = &mesh.positions;
            let mut triangle = match Triangle::new(p[i0], p[i1], p[i2]) {
                Ok(t) => t,
                Err(SceneError::DegenerateTriangle) => {
                    skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            if let Some(n) = &mesh.normals {
                triangle = triangle.with_normals([n[i0], n[i1], n[i2]]);
            }
            if let Some(uv) = &mesh.uvs {
                triangle = triangle.with_uvs([uv[i0], uv[i1], uv[i2]]);
            }
            surfaces.push(Surface::triangle(triangle, material.clone()));
        }

        if skipped > 0 {
            log::warn!("Skipped {} degenerate triangles while converting mesh", skipped);
        }
        if surfaces.is_empty() {
            return Err(SceneError::InvalidMesh("mesh has no usable triangles".into()));
        }
        Ok(surfaces)
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Short name of the shape, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match &self.shape {
            Shape::Sphere(_) => "sphere",
            Shape::Cube(_) => "cube",
            Shape::Triangle(_) => "triangle",
        }
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn bounds(&self) -> Aabb {
        match &self.shape {
            Shape::Sphere(s) => s.bounds(),
            Shape::Cube(c) => c.bounds(),
            Shape::Triangle(t) => t.bounds(),
        }
    }

    /// Distance to the nearest hit in `(BIAS, max]`.
    pub fn intersect(&self, ray: &Ray, max: f64) -> Option<f64> {
        match &self.shape {
            Shape::Sphere(s) => s.intersect(ray, max),
            Shape::Cube(c) => c.intersect(ray, max),
            Shape::Triangle(t) => t.intersect(ray, max),
        }
    }

    /// Shading normal and scattering lobe where a ray travelling along `dir`
    /// hits `point`.
    ///
    /// Opaque surfaces are two-sided: the normal is flipped to face the
    /// incoming ray. Transmissive surfaces keep the outward normal so the
    /// caller can tell entering from leaving by the sign of `dir · normal`.
    pub fn at(&self, point: Vec3, dir: Vec3, rng: &mut dyn RngCore) -> (Vec3, Option<Bsdf>) {
        let (mut normal, u, v) = match &self.shape {
            Shape::Sphere(s) => s.shade(point),
            Shape::Cube(c) => c.shade(point),
            Shape::Triangle(t) => t.shade(point),
        };
        if !self.material.is_transmissive() && dir.dot(normal) > 0.0 {
            normal = -normal;
        }
        let bsdf = self.material.at(u, v, dir.dot(normal), rng);
        (normal, bsdf)
    }

    pub fn emission(&self) -> Energy {
        self.material.emission()
    }

    pub fn is_light(&self) -> bool {
        self.material.is_light()
    }
}

#[derive(Debug, Clone, Copy)]
enum UnitShape {
    Sphere,
    Cube,
}

impl UnitShape {
    fn name(self) -> &'static str {
        match self {
            UnitShape::Sphere => "sphere",
            UnitShape::Cube => "cube",
        }
    }
}

/// Mutable handle used while placing a sphere or cube.
///
/// Calls compose like matrices written left to right:
/// `.shift(..).rotate(..).scale(..)` scales first, then rotates, then shifts.
#[derive(Debug, Clone)]
pub struct SurfaceBuilder {
    shape: UnitShape,
    material: Arc<Material>,
    transform: Mat4,
}

impl SurfaceBuilder {
    fn new(shape: UnitShape, material: Arc<Material>) -> Self {
        Self {
            shape,
            material,
            transform: Mat4::IDENTITY,
        }
    }

    /// Translate.
    pub fn shift(mut self, x: f64, y: f64, z: f64) -> Self {
        self.transform *= Mat4::from_translation(Vec3::new(x, y, z));
        self
    }

    /// Non-uniform scale.
    pub fn scale(mut self, x: f64, y: f64, z: f64) -> Self {
        self.transform *= Mat4::from_scale(Vec3::new(x, y, z));
        self
    }

    /// Rotate by Euler angles in radians, X then Y then Z.
    pub fn rotate(mut self, x: f64, y: f64, z: f64) -> Self {
        self.transform *= Mat4::from_euler(EulerRot::XYZ, x, y, z);
        self
    }

    /// Apply an arbitrary affine transform.
    pub fn transform(mut self, m: Mat4) -> Self {
        self.transform *= m;
        self
    }

    /// Validate the transform and freeze the surface.
    pub fn build(self) -> SceneResult<Surface> {
        let to_local = self
            .transform
            .checked_inverse()
            .ok_or(SceneError::SingularTransform(self.shape.name()))?;
        let shape = match self.shape {
            UnitShape::Sphere => Shape::Sphere(Sphere::new(self.transform, to_local)),
            UnitShape::Cube => Shape::Cube(Cube::new(self.transform, to_local)),
        };
        Ok(Surface {
            shape,
            material: self.material,
        })
    }
}
