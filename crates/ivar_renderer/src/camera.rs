//! Camera for ray generation.

use ivar_math::{point_in_disc, unit, Ray, Vec3};
use rand::RngCore;

/// Anything that can turn an image-plane position into a primary ray.
pub trait Camera: Send + Sync {
    /// Ray through the continuous image position `(x, y)`, measured in pixels
    /// from the top-left corner of a `width` x `height` image.
    fn ray(&self, x: f64, y: f64, width: f64, height: f64, rng: &mut dyn RngCore) -> Ray;
}

/// Pinhole camera with an optional thin lens for depth of field.
#[derive(Debug, Clone)]
pub struct ThinLensCamera {
    look_from: Vec3,
    look_at: Vec3,
    vup: Vec3,

    vfov: f64,       // Vertical field of view in degrees
    aperture: f64,   // Lens diameter, 0 for a pinhole
    focus_dist: f64, // Distance from camera to plane of perfect focus

    // Cached basis, refreshed by every builder call
    u: Vec3,
    v: Vec3,
    w: Vec3,
}

impl ThinLensCamera {
    /// Camera at the origin looking down -Z with a 40 degree field of view.
    pub fn new() -> Self {
        let mut camera = Self {
            look_from: Vec3::ZERO,
            look_at: Vec3::new(0.0, 0.0, -1.0),
            vup: Vec3::Y,
            vfov: 40.0,
            aperture: 0.0,
            focus_dist: 1.0,
            u: Vec3::X,
            v: Vec3::Y,
            w: Vec3::Z,
        };
        camera.update_basis();
        camera
    }

    /// Set camera position.
    pub fn with_position(mut self, look_from: Vec3, look_at: Vec3, vup: Vec3) -> Self {
        self.look_from = look_from;
        self.look_at = look_at;
        self.vup = vup;
        self.update_basis();
        self
    }

    /// Set lens settings. A non-positive focus distance focuses on `look_at`.
    pub fn with_lens(mut self, vfov: f64, aperture: f64, focus_dist: f64) -> Self {
        self.vfov = vfov.clamp(1e-3, 179.0);
        self.aperture = aperture.max(0.0);
        self.focus_dist = if focus_dist > 0.0 {
            focus_dist
        } else {
            (self.look_at - self.look_from).length().max(1e-3)
        };
        self
    }

    pub fn position(&self) -> Vec3 {
        self.look_from
    }

    fn update_basis(&mut self) {
        // Degenerate placements keep the previous basis
        let Some(w) = unit(self.look_from - self.look_at) else {
            return;
        };
        let Some(u) = unit(self.vup.cross(w)) else {
            return;
        };
        self.w = w;
        self.u = u;
        self.v = w.cross(u);
    }
}

impl Default for ThinLensCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera for ThinLensCamera {
    fn ray(&self, x: f64, y: f64, width: f64, height: f64, rng: &mut dyn RngCore) -> Ray {
        let h = (self.vfov.to_radians() / 2.0).tan();
        let viewport_height = 2.0 * h * self.focus_dist;
        let viewport_width = viewport_height * (width / height);

        let sx = (x / width - 0.5) * viewport_width;
        let sy = (0.5 - y / height) * viewport_height;
        let focal_point = self.look_from + self.u * sx + self.v * sy - self.w * self.focus_dist;

        let origin = if self.aperture <= 0.0 {
            self.look_from
        } else {
            let (dx, dy) = point_in_disc(self.aperture * 0.5, rng);
            self.look_from + self.u * dx + self.v * dy
        };

        let direction = unit(focal_point - origin).unwrap_or(-self.w);
        Ray::new(origin, direction)
    }
}
