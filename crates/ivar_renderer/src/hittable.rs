//! Hittable trait and HitRecord for ray-scene intersection.

use ivar_core::{SceneError, SceneResult};
use ivar_math::{Aabb, Ray};

use crate::surface::Surface;

/// The nearest surface along a ray.
#[derive(Debug, Clone, Copy)]
pub struct HitRecord<'a> {
    pub surface: &'a Surface,
    /// Distance along the (unit) ray direction
    pub distance: f64,
}

/// Trait for objects that can be hit by rays.
pub trait Hittable: Send + Sync {
    /// Nearest hit with distance in `(BIAS, max]`.
    fn intersect(&self, ray: &Ray, max: f64) -> Option<HitRecord<'_>>;

    /// Get the axis-aligned bounding box of this object.
    fn bounds(&self) -> Aabb;
}

impl Hittable for Surface {
    fn intersect(&self, ray: &Ray, max: f64) -> Option<HitRecord<'_>> {
        Surface::intersect(self, ray, max).map(|distance| HitRecord {
            surface: self,
            distance,
        })
    }

    fn bounds(&self) -> Aabb {
        Surface::bounds(self)
    }
}

/// Nearest hit among `surfaces`, or None.
pub(crate) fn nearest<'a, I>(surfaces: I, ray: &Ray, max: f64) -> Option<HitRecord<'a>>
where
    I: IntoIterator<Item = &'a Surface>,
{
    let mut closest: Option<HitRecord<'a>> = None;
    let mut limit = max;
    for surface in surfaces {
        if let Some(distance) = surface.intersect(ray, limit) {
            limit = distance;
            closest = Some(HitRecord { surface, distance });
        }
    }
    closest
}

/// A flat list of surfaces, tested one by one.
///
/// Fine for a handful of objects and as the reference the tree is checked
/// against.
#[derive(Debug)]
pub struct SurfaceList {
    surfaces: Vec<Surface>,
    bounds: Aabb,
}

impl SurfaceList {
    pub fn new(surfaces: Vec<Surface>) -> SceneResult<Self> {
        let boxes: Vec<Aabb> = surfaces.iter().map(|s| s.bounds()).collect();
        let bounds = Aabb::enclosing(&boxes).ok_or(SceneError::EmptyScene)?;
        Ok(Self { surfaces, bounds })
    }

    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}

impl Hittable for SurfaceList {
    fn intersect(&self, ray: &Ray, max: f64) -> Option<HitRecord<'_>> {
        nearest(&self.surfaces, ray, max)
    }

    fn bounds(&self) -> Aabb {
        self.bounds
    }
}
