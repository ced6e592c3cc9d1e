//! Scene: camera, surfaces and environment, frozen for rendering.

use std::fmt;

use ivar_core::SceneResult;
use ivar_math::Ray;

use crate::camera::Camera;
use crate::environment::Environment;
use crate::hittable::{HitRecord, Hittable};
use crate::surface::Surface;
use crate::tree::Tree;

/// Everything a worker reads while tracing. Immutable once built.
pub struct Scene {
    camera: Box<dyn Camera>,
    tree: Tree,
    environment: Box<dyn Environment>,
}

impl Scene {
    /// Build the acceleration tree over `surfaces`.
    ///
    /// Fails when there are no surfaces.
    pub fn new(
        camera: impl Camera + 'static,
        surfaces: Vec<Surface>,
        environment: impl Environment + 'static,
    ) -> SceneResult<Self> {
        let count = surfaces.len();
        let tree = Tree::new(surfaces)?;
        log::info!(
            "Scene ready: {} surfaces, {} lights, {} tree leaves",
            count,
            tree.light_count(),
            tree.stats().leaves
        );
        Ok(Self {
            camera: Box::new(camera),
            tree,
            environment: Box::new(environment),
        })
    }

    pub fn camera(&self) -> &dyn Camera {
        self.camera.as_ref()
    }

    pub fn environment(&self) -> &dyn Environment {
        self.environment.as_ref()
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Nearest surface along `ray`, at any distance.
    pub fn intersect(&self, ray: &Ray) -> Option<HitRecord<'_>> {
        self.tree.intersect(ray, f64::INFINITY)
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("surfaces", &self.tree.surfaces().len())
            .field("lights", &self.tree.light_count())
            .finish()
    }
}
