//! Triangle primitive for ray tracing.
//!
//! Uses the Möller-Trumbore algorithm for ray-triangle intersection.
//! Vertex normals and texture coordinates are blended with barycentric
//! weights, so meshes shade smoothly.

use ivar_core::{SceneError, SceneResult};
use ivar_math::{unit, Aabb, Ray, Vec3, BIAS, UP};

/// Determinants smaller than this mean the ray runs parallel to the triangle.
const PARALLEL_EPSILON: f64 = 1e-12;

/// A world-space triangle.
#[derive(Debug, Clone)]
pub struct Triangle {
    points: [Vec3; 3],
    normals: [Vec3; 3],
    uvs: [[f64; 2]; 3],
    edge1: Vec3,
    edge2: Vec3,
    bounds: Aabb,
}

impl Triangle {
    /// Create a flat-shaded triangle. Counter-clockwise winding gives the
    /// front face normal.
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> SceneResult<Self> {
        if !(a.is_finite() && b.is_finite() && c.is_finite()) {
            return Err(SceneError::DegenerateTriangle);
        }
        let edge1 = b - a;
        let edge2 = c - a;
        let normal = unit(edge1.cross(edge2)).ok_or(SceneError::DegenerateTriangle)?;

        let min = a.min(b).min(c);
        let max = a.max(b).max(c);

        Ok(Self {
            points: [a, b, c],
            normals: [normal; 3],
            uvs: [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
            edge1,
            edge2,
            bounds: Aabb::from_points(min, max),
        })
    }

    /// Replace the per-vertex normals (for smooth shading). Zero-length
    /// normals keep the face normal.
    pub fn with_normals(mut self, normals: [Vec3; 3]) -> Self {
        for (slot, n) in self.normals.iter_mut().zip(normals) {
            if let Some(n) = unit(n) {
                *slot = n;
            }
        }
        self
    }

    /// Set per-vertex texture coordinates.
    pub fn with_uvs(mut self, uvs: [[f64; 2]; 3]) -> Self {
        self.uvs = uvs;
        self
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Möller-Trumbore; distance to the hit in `(BIAS, max]`.
    pub fn intersect(&self, ray: &Ray, max: f64) -> Option<f64> {
        let h = ray.direction.cross(self.edge2);
        let a = self.edge1.dot(h);

        // Ray is parallel to triangle
        if a.abs() < PARALLEL_EPSILON {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.origin - self.points[0];
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(self.edge1);
        let v = f * ray.direction.dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * self.edge2.dot(q);
        (t > BIAS && t <= max).then_some(t)
    }

    /// Barycentric weights of a point in the triangle's plane.
    fn barycentric(&self, p: Vec3) -> (f64, f64, f64) {
        let v2 = p - self.points[0];
        let d00 = self.edge1.dot(self.edge1);
        let d01 = self.edge1.dot(self.edge2);
        let d11 = self.edge2.dot(self.edge2);
        let d20 = v2.dot(self.edge1);
        let d21 = v2.dot(self.edge2);
        let denom = d00 * d11 - d01 * d01;
        let v = (d11 * d20 - d01 * d21) / denom;
        let w = (d00 * d21 - d01 * d20) / denom;
        (1.0 - v - w, v, w)
    }

    /// Interpolated normal and texture coordinates at a world-space point.
    pub fn shade(&self, point: Vec3) -> (Vec3, f64, f64) {
        let (a, b, c) = self.barycentric(point);
        let n = self.normals[0] * a + self.normals[1] * b + self.normals[2] * c;
        let normal = unit(n).unwrap_or(UP);
        let u = self.uvs[0][0] * a + self.uvs[1][0] * b + self.uvs[2][0] * c;
        let v = self.uvs[0][1] * a + self.uvs[1][1] * b + self.uvs[2][1] * c;
        (normal, u, v)
    }

    /// Geometric (face) normal.
    pub fn face_normal(&self) -> Vec3 {
        unit(self.edge1.cross(self.edge2)).unwrap_or(UP)
    }

    pub fn centroid(&self) -> Vec3 {
        (self.points[0] + self.points[1] + self.points[2]) / 3.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri() -> Triangle {
        // Triangle in XY plane at z=-1, facing +Z
        Triangle::new(
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, -1.0, -1.0),
            Vec3::new(0.0, 1.0, -1.0),
        )
        .unwrap()
    }

    #[test]
    fn test_triangle_hit() {
        let ray = Ray::new(Vec3::ZERO, -Vec3::Z);
        let t = tri().intersect(&ray, f64::INFINITY).unwrap();
        assert!((t - 1.0).abs() < 1e-9);
        assert!(tri().intersect(&ray, 0.5).is_none());
    }

    #[test]
    fn test_triangle_miss() {
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        assert!(tri().intersect(&ray, f64::INFINITY).is_none());

        let ray = Ray::new(Vec3::new(5.0, 0.0, 0.0), -Vec3::Z);
        assert!(tri().intersect(&ray, f64::INFINITY).is_none());
    }

    #[test]
    fn test_hit_from_behind() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, -3.0), Vec3::Z);
        let t = tri().intersect(&ray, f64::INFINITY).unwrap();
        assert!((t - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_triangle_rejected() {
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert!(matches!(
            Triangle::new(p, p, Vec3::ZERO),
            Err(SceneError::DegenerateTriangle)
        ));
        assert!(Triangle::new(Vec3::ZERO, Vec3::X, Vec3::new(f64::NAN, 0.0, 0.0)).is_err());
    }

    #[test]
    fn test_smooth_normal_and_uv_interpolation() {
        let t = tri()
            .with_normals([Vec3::X, Vec3::Z, Vec3::Z])
            .with_uvs([[0.0, 0.0], [1.0, 0.0], [0.5, 1.0]]);

        // At the first vertex everything comes from vertex 0
        let (n, u, v) = t.shade(Vec3::new(-1.0, -1.0, -1.0));
        assert!((n - Vec3::X).length() < 1e-9);
        assert!(u.abs() < 1e-9 && v.abs() < 1e-9);

        // At the apex
        let (n, u, v) = t.shade(Vec3::new(0.0, 1.0, -1.0));
        assert!((n - Vec3::Z).length() < 1e-9);
        assert!((u - 0.5).abs() < 1e-9 && (v - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_face_normal_ccw() {
        assert!((tri().face_normal() - Vec3::Z).length() < 1e-12);
    }
}
