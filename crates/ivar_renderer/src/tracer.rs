//! Path tracing integrator.
//!
//! Each worker owns a [`Tracer`]: its own random generator, its own copy of
//! the render settings, and a private history of everything it has traced so
//! far. The history drives adaptive branching: noisy pixels get more paths
//! per sweep than converged ones.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ivar_core::Energy;
use ivar_math::{gen_f64, tangent_space, unit, Cone, Mat3, Ray, Vec3};
use rand::rngs::StdRng;
use rand::Rng;

use crate::bsdf::Bsdf;
use crate::config::RenderConfig;
use crate::hittable::HitRecord;
use crate::sample::Sample;
use crate::scene::Scene;

/// Most lights sampled directly at one shading point.
pub const MAX_LIGHTS: usize = 8;

pub struct Tracer {
    scene: Arc<Scene>,
    config: RenderConfig,
    rng: StdRng,
    history: Sample,
}

/// Result of next-event estimation at one shading point.
struct Direct {
    energy: Energy,
    /// Cones sampled, disjoint from each other
    cones: Vec<Cone>,
}

impl Tracer {
    pub fn new(scene: Arc<Scene>, config: RenderConfig, rng: StdRng) -> Self {
        let history = Sample::new(config.width, config.height);
        Self {
            scene,
            config,
            rng,
            history,
        }
    }

    /// Trace every pixel once (plus adaptive branches).
    ///
    /// `active` is checked per scanline; a cleared flag ends the sweep early
    /// and the rows traced so far are returned.
    pub fn sweep(&mut self, active: &AtomicBool) -> Sample {
        let (width, height) = (self.config.width, self.config.height);
        let mut sample = Sample::new(width, height);

        for y in 0..height {
            if !active.load(Ordering::Relaxed) {
                break;
            }
            for x in 0..width {
                let rx = x as f64 + gen_f64(&mut self.rng);
                let ry = y as f64 + gen_f64(&mut self.rng);
                let ray = self
                    .scene
                    .camera()
                    .ray(rx, ry, width as f64, height as f64, &mut self.rng);

                let n = 1 + (self.history.noise(x, y) * self.config.branches as f64) as u32;
                let scene = Arc::clone(&self.scene);
                let first = scene.intersect(&ray);
                for _ in 0..n {
                    let energy = self.trace_from(ray, first);
                    sample.add(x, y, energy);
                }
            }
        }

        // Dimensions always match; both are built from the same config
        if let Err(e) = self.history.merge(&sample) {
            log::warn!("Dropping tracer history: {}", e);
        }
        sample
    }

    /// Radiance arriving along `ray` for one path.
    pub fn trace(&mut self, ray: Ray) -> Energy {
        let scene = Arc::clone(&self.scene);
        let first = scene.intersect(&ray);
        self.trace_from(ray, first)
    }

    fn trace_from(&mut self, mut ray: Ray, first: Option<HitRecord<'_>>) -> Energy {
        let scene = Arc::clone(&self.scene);
        let mut hit: Option<HitRecord<'_>> = first;
        let mut energy = Energy::BLACK;
        let mut signal = Energy::WHITE;
        // Cones whose emitters and sky were already counted at the previous vertex
        let mut sampled: Vec<Cone> = Vec::new();

        for bounce in 0..=self.config.bounces {
            let counted = sampled.iter().any(|c| c.contains(ray.direction));
            let Some(h) = hit else {
                if !counted {
                    energy += scene.environment().radiance_at(ray.direction) * signal;
                }
                break;
            };
            let surface = h.surface;
            if surface.is_light() {
                if !counted {
                    energy += surface.emission() * signal;
                }
                break;
            }

            let point = ray.at(h.distance);
            let (normal, bsdf) = surface.at(point, ray.direction, &mut self.rng);

            // Leaving a transmissive interior: Beer's law over the distance travelled inside
            if ray.direction.dot(normal) > 0.0 {
                if let Some(absorbance) = surface.material().absorbance() {
                    signal *= beers(h.distance, absorbance);
                }
            }

            let Some(bsdf) = bsdf else {
                break;
            };
            let (to_local, to_world) = tangent_space(normal);
            let wo = to_local * -ray.direction;

            sampled.clear();
            if bsdf.is_diffuse() {
                let direct = self.direct(&scene, point, normal, &bsdf, wo, to_local);
                energy += direct.energy * signal;
                sampled = direct.cones;
            }
            if bounce == self.config.bounces {
                break;
            }

            let (wi, pdf) = bsdf.sample(wo, &mut self.rng);
            let Some(dir) = unit(to_world * wi) else {
                break;
            };
            if pdf.is_nan() || pdf <= 0.0 {
                break;
            }

            let weight = (bsdf.eval(wi, wo) * (1.0 / pdf)).limit(self.config.max_weight);
            signal = (signal * weight).random_gain(&mut self.rng);
            if signal.is_zero() || !signal.is_finite() {
                break;
            }

            ray = Ray::new(point, dir);
            hit = scene.intersect(&ray);
        }

        if energy.is_finite() {
            energy
        } else {
            Energy::BLACK
        }
    }

    /// Next-event estimation for a diffuse lobe.
    ///
    /// Each light's bounding sphere is seen from `point` as a cone. Cones that
    /// dip below the horizon or overlap one already taken are left to bounce
    /// sampling. One direction is drawn uniformly inside each accepted cone
    /// and weighted by the cone's solid angle. It counts an emitter or the
    /// environment past the light's edge; a blocker counts as black here and
    /// is picked up by the bounce, which in turn skips emitters and sky
    /// inside the returned cones.
    fn direct(
        &mut self,
        scene: &Scene,
        point: Vec3,
        normal: Vec3,
        bsdf: &Bsdf,
        wo: Vec3,
        to_local: Mat3,
    ) -> Direct {
        let tree = scene.tree();
        let count = tree.light_count();
        let mut result = Direct {
            energy: Energy::BLACK,
            cones: Vec::new(),
        };
        if count == 0 {
            return result;
        }

        let offset = if count > MAX_LIGHTS {
            self.rng.gen_range(0..count)
        } else {
            0
        };
        for k in 0..count.min(MAX_LIGHTS) {
            let Some(light) = tree.light((offset + k) % count) else {
                continue;
            };
            let Some(cone) = light.bounds().cone_from(point) else {
                continue;
            };
            if !cone.above(normal) || result.cones.iter().any(|c| c.overlaps(&cone)) {
                continue;
            }

            let dir = cone.sample(&mut self.rng);
            result.cones.push(cone);

            let eval = bsdf.eval(to_local * dir, wo);
            if eval.is_zero() {
                continue;
            }
            let shadow = Ray::new(point, dir);
            let radiance = match scene.intersect(&shadow) {
                None => scene.environment().radiance_at(dir),
                Some(h) if h.surface.is_light() => h.surface.emission(),
                Some(_) => Energy::BLACK,
            };
            result.energy += radiance * eval * cone.solid_angle;
        }

        result
    }
}

/// Beer's law: fraction of light surviving `dist` through a medium with the
/// given per-channel absorbance.
fn beers(dist: f64, absorbance: Energy) -> Energy {
    if dist <= 0.0 {
        return Energy::WHITE;
    }
    Energy::new(
        (-absorbance.r * dist).exp(),
        (-absorbance.g * dist).exp(),
        (-absorbance.b * dist).exp(),
    )
}
