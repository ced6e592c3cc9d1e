//! Ivar math - geometry primitives for the path tracer.
//!
//! Everything is double precision: the tracer accumulates many small
//! contributions and the tree/intersection code relies on a small fixed
//! [`BIAS`] to avoid self-intersection.

// Re-export the glam types we build on
pub use glam::{DMat3, DMat4, DVec3, EulerRot};

mod aabb;
mod ray;
mod sampling;
mod transform;

pub use aabb::{Aabb, Cone};
pub use ray::Ray;
pub use sampling::{
    cosine_hemisphere, gen_f64, point_in_disc, spherical_direction, uniform_cone,
    uniform_hemisphere,
};
pub use transform::{tangent_space, Mat4Ext};

/// Point or direction in 3D space.
pub type Vec3 = DVec3;

/// Affine transform.
pub type Mat4 = DMat4;

/// Rotation/scale part of a transform, also used for tangent frames.
pub type Mat3 = DMat3;

/// Minimum hit distance; anything closer is treated as self-intersection.
pub const BIAS: f64 = 1e-4;

/// "Up" in every local shading frame.
pub const UP: Vec3 = DVec3::Y;

/// Normalize a vector, returning `None` for zero-length or non-finite input.
#[inline]
pub fn unit(v: Vec3) -> Option<Vec3> {
    v.try_normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);
        let c = a + b;
        assert_eq!(c, Vec3::new(5.0, 7.0, 9.0));
    }

    #[test]
    fn test_unit_rejects_zero() {
        assert!(unit(Vec3::ZERO).is_none());
        assert!(unit(Vec3::new(f64::NAN, 0.0, 0.0)).is_none());

        let u = unit(Vec3::new(0.0, 3.0, 4.0)).unwrap();
        assert!((u.length() - 1.0).abs() < 1e-12);
    }
}
