//! Cube primitive: the [-0.5, 0.5]³ box of its local space.

use ivar_math::{unit, Aabb, Mat3, Mat4, Mat4Ext, Ray, Vec3, BIAS, UP};

#[derive(Debug, Clone)]
pub struct Cube {
    to_local: Mat4,
    normal_matrix: Mat3,
    bounds: Aabb,
}

impl Cube {
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

    /// Distance to the nearest hit in `(BIAS, max]`, slab test in local space.
    pub fn intersect(&self, ray: &Ray, max: f64) -> Option<f64> {
        match self.bounds.check(ray) {
            Some((near, _)) if near <= max => {}
            _ => return None,
        }
        let local = self.to_local.transform_ray(ray);
        let origin = local.origin;
        let inv = local.inv_direction();

        let mut tmin = f64::NEG_INFINITY;
        let mut tmax = f64::INFINITY;
        for axis in 0..3 {
            let mut t0 = (-0.5 - origin[axis]) * inv[axis];
            let mut t1 = (0.5 - origin[axis]) * inv[axis];
            if inv[axis] < 0.0 {
                std::mem::swap(&mut t0, &mut t1);
            }
            if t0 > tmin {
                tmin = t0;
            }
            if t1 < tmax {
                tmax = t1;
            }
            if tmax < tmin {
                return None;
            }
        }
        [tmin, tmax].into_iter().find(|&t| t > BIAS && t <= max)
    }

    /// Outward face normal and texture coordinates at a world-space point.
    pub fn shade(&self, point: Vec3) -> (Vec3, f64, f64) {
        let p = self.to_local.transform_point3(point);
        let abs = p.abs();
        let (local_normal, u, v) = if abs.x > abs.y && abs.x > abs.z {
            (Vec3::new(p.x.signum(), 0.0, 0.0), p.z + 0.5, p.y + 0.5)
        } else if abs.y > abs.z {
            (Vec3::new(0.0, p.y.signum(), 0.0), p.z + 0.5, p.x + 0.5)
        } else {
            (Vec3::new(0.0, 0.0, p.z.signum()), p.x + 0.5, p.y + 0.5)
        };
        let normal = unit(self.normal_matrix * local_normal).unwrap_or(UP);
        (normal, u, v)
    }
}
