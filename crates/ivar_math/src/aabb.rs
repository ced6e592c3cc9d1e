use std::f64::consts::PI;

use rand::RngCore;

use crate::{uniform_cone, Ray, Vec3, BIAS};

/// Axis-Aligned Bounding Box for the k-d tree and for light sampling.
///
/// Besides the two corners the box caches its center and the radius of its
/// enclosing sphere; emissive surfaces are sampled through that sphere.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
    pub center: Vec3,
    pub radius: f64,
}

impl Aabb {
    /// Create an AABB from two corner points, in any order.
    ///
    /// Flat axes are padded so that planar geometry (a single triangle in an
    /// axis plane, say) still has a box the slab test can hit.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        let mut min = a.min(b);
        let mut max = a.max(b);
        pad_to_minimums(&mut min, &mut max);
        Self::with_corners(min, max)
    }

    /// Smallest AABB containing every point. `None` for an empty iterator.
    pub fn from_point_cloud<I: IntoIterator<Item = Vec3>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        Some(Self::from_points(min, max))
    }

    fn with_corners(min: Vec3, max: Vec3) -> Self {
        let center = (min + max) * 0.5;
        Self {
            min,
            max,
            center,
            radius: (max - center).length(),
        }
    }

    /// Create an AABB that surrounds two other AABBs.
    pub fn surrounding(box0: &Aabb, box1: &Aabb) -> Self {
        Self::with_corners(box0.min.min(box1.min), box0.max.max(box1.max))
    }

    /// Smallest AABB containing every box. `None` for an empty iterator.
    pub fn enclosing<'a, I: IntoIterator<Item = &'a Aabb>>(boxes: I) -> Option<Self> {
        boxes
            .into_iter()
            .fold(None, |acc: Option<Aabb>, b| match acc {
                Some(a) => Some(Aabb::surrounding(&a, b)),
                None => Some(*b),
            })
    }

    /// True when the two boxes share any volume, touching faces included.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    /// True when `p` is inside the box or on its surface.
    pub fn contains(&self, p: Vec3) -> bool {
        self.min.cmple(p).all() && self.max.cmpge(p).all()
    }

    /// Cut the box with the plane `axis = wall`, returning (below, above).
    pub fn split(&self, axis: usize, wall: f64) -> (Aabb, Aabb) {
        let mut left_max = self.max;
        let mut right_min = self.min;
        left_max[axis] = wall;
        right_min[axis] = wall;
        (
            Self::with_corners(self.min, left_max),
            Self::with_corners(right_min, self.max),
        )
    }

    /// Slab test.
    ///
    /// Returns the parametric `(near, far)` interval where the ray is inside
    /// the box. `near` never drops below [`BIAS`], so a ray starting inside
    /// the box reports `near == BIAS`.
    pub fn check(&self, ray: &Ray) -> Option<(f64, f64)> {
        let origin = ray.origin();
        let inv = ray.inv_direction();
        let mut tmin = BIAS;
        let mut tmax = f64::INFINITY;
        for axis in 0..3 {
            let mut t0 = (self.min[axis] - origin[axis]) * inv[axis];
            let mut t1 = (self.max[axis] - origin[axis]) * inv[axis];
            if inv[axis] < 0.0 {
                std::mem::swap(&mut t0, &mut t1);
            }
            // NaN (0 * inf for a ray in a face plane) leaves the bound untouched
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
        Some((tmin, tmax))
    }

    /// Returns the index (0=X, 1=Y, 2=Z) of the axis with the longest extent.
    pub fn longest_axis(&self) -> usize {
        let size = self.max - self.min;
        if size.x > size.y && size.x > size.z {
            0
        } else if size.y > size.z {
            1
        } else {
            2
        }
    }

    /// Total area of the six faces.
    pub fn surface_area(&self) -> f64 {
        let d = self.max - self.min;
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    /// Cone subtended by the enclosing sphere as seen from `origin`.
    ///
    /// `None` when the origin is inside the sphere, where no cone exists.
    pub fn cone_from(&self, origin: Vec3) -> Option<Cone> {
        let offset = self.center - origin;
        let dist = offset.length();
        if dist.is_nan() || dist <= self.radius {
            return None;
        }
        let sin = self.radius / dist;
        let sin2 = sin * sin;
        let cos_max = (1.0 - sin2).max(0.0).sqrt();
        Some(Cone {
            axis: offset / dist,
            cos_max,
            sin2,
            solid_angle: 2.0 * PI * (1.0 - cos_max),
        })
    }
}

fn pad_to_minimums(min: &mut Vec3, max: &mut Vec3) {
    let delta = 0.0001;
    for axis in 0..3 {
        if max[axis] - min[axis] < delta {
            min[axis] -= delta * 0.5;
            max[axis] += delta * 0.5;
        }
    }
}

/// A cone of directions around a unit axis.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Cone {
    pub axis: Vec3,
    /// Cosine of the half angle.
    pub cos_max: f64,
    /// Squared sine of the half angle.
    pub sin2: f64,
    /// Steradians covered.
    pub solid_angle: f64,
}

impl Cone {
    /// Half angle in radians.
    pub fn half_angle(&self) -> f64 {
        self.cos_max.clamp(-1.0, 1.0).acos()
    }

    pub fn contains(&self, dir: Vec3) -> bool {
        dir.dot(self.axis) >= self.cos_max
    }

    /// True when every direction in the cone is on the positive side of `normal`.
    pub fn above(&self, normal: Vec3) -> bool {
        let tilt = self.axis.dot(normal).clamp(-1.0, 1.0).acos();
        tilt + self.half_angle() < PI * 0.5
    }

    /// True when the two cones share any direction.
    pub fn overlaps(&self, other: &Cone) -> bool {
        let between = self.axis.dot(other.axis).clamp(-1.0, 1.0).acos();
        between < self.half_angle() + other.half_angle()
    }

    /// Uniformly sample a direction inside the cone.
    pub fn sample(&self, rng: &mut dyn RngCore) -> Vec3 {
        uniform_cone(self.axis, self.cos_max, rng)
    }
}
