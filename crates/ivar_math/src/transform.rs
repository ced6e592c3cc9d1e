// Transform utilities for Mat4
//
// Surfaces live in a unit local space and carry an affine world transform.
// glam already provides transform_point3/transform_vector3 and inverse();
// these helpers add the checked inverse, ray and box transforms, and the
// tangent frames the BSDFs are evaluated in.

use crate::{Aabb, Mat3, Mat4, Ray, Vec3};

/// Extension trait for Mat4 to provide additional transform utilities
pub trait Mat4Ext {
    /// Inverse of an affine transform, `None` when it is singular or not finite.
    fn checked_inverse(&self) -> Option<Mat4>;

    /// Transform an axis-aligned bounding box.
    /// Computes the bounding box of all 8 transformed corners.
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb;

    /// Transform a ray into this matrix's space.
    ///
    /// The direction is left unnormalized so that parametric distances in the
    /// new space match distances along the original ray.
    fn transform_ray(&self, ray: &Ray) -> Ray;
}

impl Mat4Ext for Mat4 {
    fn checked_inverse(&self) -> Option<Mat4> {
        if !self.is_finite() {
            return None;
        }
        let det = self.determinant();
        if !det.is_normal() {
            return None;
        }
        let inv = self.inverse();
        inv.is_finite().then_some(inv)
    }

    fn transform_aabb(&self, aabb: &Aabb) -> Aabb {
        let (lo, hi) = (aabb.min, aabb.max);
        let corners = [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ];

        let mut result_min = self.transform_point3(corners[0]);
        let mut result_max = result_min;
        for &corner in &corners[1..] {
            let p = self.transform_point3(corner);
            result_min = result_min.min(p);
            result_max = result_max.max(p);
        }

        Aabb::from_points(result_min, result_max)
    }

    fn transform_ray(&self, ray: &Ray) -> Ray {
        Ray::new(
            self.transform_point3(ray.origin),
            self.transform_vector3(ray.direction),
        )
    }
}

/// Build the shading frame around a unit `normal`.
///
/// Returns `(to_local, to_world)`. Local space has the normal on +Y, matching
/// the hemisphere samplers.
pub fn tangent_space(normal: Vec3) -> (Mat3, Mat3) {
    let (tangent, bitangent) = normal.any_orthonormal_pair();
    let to_world = Mat3::from_cols(tangent, normal, bitangent);
    (to_world.transpose(), to_world)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_transform_point3_translation() {
        let mat = Mat4::from_translation(Vec3::new(10.0, 20.0, 30.0));
        let point = Vec3::new(1.0, 2.0, 3.0);
        let transformed = mat.transform_point3(point);

        assert_eq!(transformed, Vec3::new(11.0, 22.0, 33.0));
    }

    #[test]
    fn test_transform_aabb_translation() {
        let mat = Mat4::from_translation(Vec3::splat(5.0));
        let aabb = Aabb::from_points(Vec3::ZERO, Vec3::ONE);
        let transformed = mat.transform_aabb(&aabb);

        assert!((transformed.min - Vec3::splat(5.0)).length() < 0.001);
        assert!((transformed.max - Vec3::splat(6.0)).length() < 0.001);
    }

    #[test]
    fn test_transform_aabb_rotation_grows_box() {
        let mat = Mat4::from_rotation_y(PI / 4.0);
        let aabb = Aabb::from_points(Vec3::splat(-0.5), Vec3::splat(0.5));
        let transformed = mat.transform_aabb(&aabb);

        let half_diag = 0.5 * 2.0_f64.sqrt();
        assert!((transformed.max.x - half_diag).abs() < 1e-9);
        assert!((transformed.max.y - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_checked_inverse() {
        let mat = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0))
            * Mat4::from_rotation_y(PI / 4.0)
            * Mat4::from_scale(Vec3::splat(2.0));
        let inv = mat.checked_inverse().unwrap();

        let point = Vec3::new(5.0, 3.0, 2.0);
        let back = inv.transform_point3(mat.transform_point3(point));
        assert!((back - point).length() < 1e-9);

        let flat = Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0));
        assert!(flat.checked_inverse().is_none());

        let nan = Mat4::from_translation(Vec3::new(f64::NAN, 0.0, 0.0));
        assert!(nan.checked_inverse().is_none());
    }

    #[test]
    fn test_transform_ray_keeps_distances() {
        let mat = Mat4::from_scale(Vec3::splat(0.5));
        let ray = Ray::new(Vec3::new(0.0, 0.0, -4.0), Vec3::Z);
        let local = mat.transform_ray(&ray);

        // Point at t=2 in world maps to the point at t=2 in local space
        let world = ray.at(2.0);
        assert!((mat.transform_point3(world) - local.at(2.0)).length() < 1e-12);
    }

    #[test]
    fn test_tangent_space_round_trip() {
        let normal = Vec3::new(1.0, 2.0, -0.5).normalize();
        let (to_local, to_world) = tangent_space(normal);

        assert!((to_local * normal - Vec3::Y).length() < 1e-12);

        let dir = Vec3::new(0.3, -0.2, 0.9).normalize();
        assert!((to_world * (to_local * dir) - dir).length() < 1e-12);
    }
}
