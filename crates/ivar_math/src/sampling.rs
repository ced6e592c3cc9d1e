// Random direction and point generators.
//
// Hemisphere helpers work in a local frame where +Y is the surface normal,
// matching `crate::UP` and the tangent frames from `tangent_space`.

use std::f64::consts::PI;

use rand::{Rng, RngCore};

use crate::Vec3;

/// Uniform sample in [0, 1) from a type-erased generator.
#[inline]
pub fn gen_f64(rng: &mut dyn RngCore) -> f64 {
    rng.gen::<f64>()
}

/// Unit direction from polar angle `theta` (measured from +Y) and azimuth `phi`.
#[inline]
pub fn spherical_direction(theta: f64, phi: f64) -> Vec3 {
    let (sin_t, cos_t) = theta.sin_cos();
    let (sin_p, cos_p) = phi.sin_cos();
    Vec3::new(sin_t * cos_p, cos_t, sin_t * sin_p)
}

/// Cosine-weighted direction on the +Y hemisphere (pdf = cos / π).
pub fn cosine_hemisphere(rng: &mut dyn RngCore) -> Vec3 {
    let u = gen_f64(rng);
    let phi = 2.0 * PI * gen_f64(rng);
    let r = u.sqrt();
    Vec3::new(r * phi.cos(), (1.0 - u).max(0.0).sqrt(), r * phi.sin())
}

/// Uniform direction on the +Y hemisphere (pdf = 1 / 2π).
pub fn uniform_hemisphere(rng: &mut dyn RngCore) -> Vec3 {
    let cos = gen_f64(rng);
    let phi = 2.0 * PI * gen_f64(rng);
    spherical_direction(cos.acos(), phi)
}

/// Uniform point in a disc of the given radius, as (x, y).
pub fn point_in_disc(radius: f64, rng: &mut dyn RngCore) -> (f64, f64) {
    let r = radius * gen_f64(rng).sqrt();
    let phi = 2.0 * PI * gen_f64(rng);
    (r * phi.cos(), r * phi.sin())
}

/// Uniform direction inside the cone around unit `axis` with half-angle cosine `cos_max`.
pub fn uniform_cone(axis: Vec3, cos_max: f64, rng: &mut dyn RngCore) -> Vec3 {
    let cos = 1.0 - gen_f64(rng) * (1.0 - cos_max);
    let sin = (1.0 - cos * cos).max(0.0).sqrt();
    let phi = 2.0 * PI * gen_f64(rng);
    let (t, b) = axis.any_orthonormal_pair();
    (t * (sin * phi.cos()) + b * (sin * phi.sin()) + axis * cos).normalize()
}
