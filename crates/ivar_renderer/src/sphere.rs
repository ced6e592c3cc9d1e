//! Sphere primitive for ray tracing.
//!
//! The sphere is the unit-diameter sphere at the origin of its own local
//! space; position, size and squash all come from the world transform.

use std::f64::consts::PI;

use ivar_math::{unit, Aabb, Mat3, Mat4, Mat4Ext, Ray, Vec3, BIAS, UP};

/// A transformed unit sphere.
#[derive(Debug, Clone)]
pub struct Sphere {
    to_local: Mat4,
    normal_matrix: Mat3,
    bounds: Aabb,
}

impl Sphere {
    /// `transform` and its inverse must already be validated.
    pub(crate) fn new(transform: Mat4, to_local: Mat4) -> Self {
        let unit_box = Aabb::from_points(Vec3::splat(-0.5), Vec3::splat(0.5));
        Self {
            to_local,
            normal_matrix: Mat3::from_mat4(to_local).transpose(),
            bounds: transform.transform_aabb(&unit_box),
        }
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Distance to the nearest hit in `(BIAS, max]`.
    pub fn intersect(&self, ray: &Ray, max: f64) -> Option<f64> {
        match self.bounds.check(ray) {
            Some((near, _)) if near <= max => {}
            _ => return None,
        }
        // Local direction is not normalized, so local t equals world distance
        let local = self.to_local.transform_ray(ray);
        let o = local.origin;
        let d = local.direction;
        let a = d.length_squared();
        let h = o.dot(d);
        let c = o.length_squared() - 0.25;

        let discriminant = h * h - a * c;
        if discriminant < 0.0 {
            return None;
        }
        let sqrtd = discriminant.sqrt();

        // Find the nearest root in the acceptable range
        [(-h - sqrtd) / a, (-h + sqrtd) / a]
            .into_iter()
            .find(|&t| t > BIAS && t <= max)
    }

    /// Outward normal and texture coordinates at a world-space point.
    pub fn shade(&self, point: Vec3) -> (Vec3, f64, f64) {
        let p = unit(self.to_local.transform_point3(point)).unwrap_or(UP);
        let normal = unit(self.normal_matrix * p).unwrap_or(UP);
        let (u, v) = sphere_uv(p);
        (normal, u, v)
    }
}

/// Texture coordinates of a point on the unit sphere.
///
/// theta runs down from +Y, phi around Y from -X.
fn sphere_uv(p: Vec3) -> (f64, f64) {
    let theta = (-p.y).clamp(-1.0, 1.0).acos();
    let phi = (-p.z).atan2(p.x) + PI;
    (phi / (2.0 * PI), theta / PI)
}
