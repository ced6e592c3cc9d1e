//! Scattering lobes.
//!
//! Every lobe works in a local shading frame with the surface normal on +Y.
//! `wo` points back toward where the light is going (the viewer), `wi` is the
//! direction the next ray travels. `eval` includes the cosine term and
//! `sample` returns a solid-angle pdf, so a path's throughput update is always
//! `eval / pdf`. Delta lobes (perfect refraction) report a pdf of 1 with a
//! matching unit `eval`.

use std::f64::consts::PI;

use ivar_core::Energy;
use ivar_math::{cosine_hemisphere, gen_f64, spherical_direction, unit, Vec3, UP};
use rand::RngCore;

/// Smallest GGX alpha; perfectly smooth surfaces would produce an infinite D.
const MIN_ALPHA: f64 = 1e-3;

/// A scattering lobe chosen by a material for one shading event.
#[derive(Debug, Clone, Copy)]
pub enum Bsdf {
    Lambert(Lambert),
    Microfacet(Microfacet),
    Transmit(Transmit),
}

impl Bsdf {
    /// Pick an incoming direction for `wo`, returning it with its pdf.
    ///
    /// A pdf of 0 means the sample is unusable and the path should end.
    pub fn sample(&self, wo: Vec3, rng: &mut dyn RngCore) -> (Vec3, f64) {
        match self {
            Bsdf::Lambert(l) => l.sample(rng),
            Bsdf::Microfacet(m) => m.sample(wo, rng),
            Bsdf::Transmit(t) => t.sample(wo, rng),
        }
    }

    pub fn eval(&self, wi: Vec3, wo: Vec3) -> Energy {
        match self {
            Bsdf::Lambert(l) => l.eval(wi),
            Bsdf::Microfacet(m) => m.eval(wi, wo),
            Bsdf::Transmit(t) => t.eval(wi, wo),
        }
    }

    /// Whether direct light sampling applies to this lobe.
    pub fn is_diffuse(&self) -> bool {
        matches!(self, Bsdf::Lambert(_))
    }
}

/// Ideal diffuse reflection.
#[derive(Debug, Clone, Copy)]
pub struct Lambert {
    pub color: Energy,
    pub multiplier: f64,
}

impl Lambert {
    pub fn new(color: Energy, multiplier: f64) -> Self {
        Self { color, multiplier }
    }

    fn sample(&self, rng: &mut dyn RngCore) -> (Vec3, f64) {
        let wi = cosine_hemisphere(rng);
        (wi, self.pdf(wi))
    }

    pub fn pdf(&self, wi: Vec3) -> f64 {
        wi.y.max(0.0) / PI
    }

    fn eval(&self, wi: Vec3) -> Energy {
        if wi.y <= 0.0 {
            return Energy::BLACK;
        }
        self.color.scaled(self.multiplier * wi.y / PI)
    }
}

/// Cook-Torrance specular reflection with a GGX distribution.
#[derive(Debug, Clone, Copy)]
pub struct Microfacet {
    pub specular: Energy,
    alpha: f64,
    pub multiplier: f64,
}

impl Microfacet {
    /// `roughness` is perceptual; alpha is its square.
    pub fn new(specular: Energy, roughness: f64, multiplier: f64) -> Self {
        Self {
            specular,
            alpha: (roughness * roughness).max(MIN_ALPHA),
            multiplier,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    fn sample(&self, wo: Vec3, rng: &mut dyn RngCore) -> (Vec3, f64) {
        let r0 = gen_f64(rng);
        let r1 = gen_f64(rng);
        let a2 = self.alpha * self.alpha;
        let theta = ((1.0 - r0) / ((a2 - 1.0) * r0 + 1.0)).sqrt().acos();
        let phi = 2.0 * PI * r1;
        let wm = spherical_direction(theta, phi);
        let wi = wm * (2.0 * wo.dot(wm)) - wo;
        (wi, self.pdf(wi, wo))
    }

    pub fn pdf(&self, wi: Vec3, wo: Vec3) -> f64 {
        if wi.y <= 0.0 || wo.y <= 0.0 {
            return 0.0;
        }
        let Some(wm) = unit(wi + wo) else {
            return 0.0;
        };
        let wo_m = wo.dot(wm);
        if wo_m <= 0.0 {
            return 0.0;
        }
        ggx(wm.y, self.alpha) * wm.y / (4.0 * wo_m)
    }

    fn eval(&self, wi: Vec3, wo: Vec3) -> Energy {
        let neutral = Energy::WHITE.scaled(self.multiplier);
        let Some(wm) = unit(wi + wo) else {
            return neutral;
        };
        let wi_m = wi.dot(wm);
        if wi.y <= 0.0 || wo.y <= 0.0 || wi_m <= 0.0 {
            return neutral;
        }
        let f = Energy::new(
            fresnel_schlick(wi_m, self.specular.r),
            fresnel_schlick(wi_m, self.specular.g),
            fresnel_schlick(wi_m, self.specular.b),
        );
        let d = ggx(wm.y, self.alpha);
        let g = smith_ggx(wi.y, self.alpha) * smith_ggx(wo.y, self.alpha);
        // (F D G) / (4 cos_i cos_o), times cos_i
        let r = d * g / (4.0 * wo.y);
        if !r.is_finite() {
            return neutral;
        }
        f.scaled(r * self.multiplier)
    }
}

/// Perfect refraction through a smooth dielectric interface.
#[derive(Debug, Clone, Copy)]
pub struct Transmit {
    /// Normal-incidence Fresnel reflectance of the interface.
    pub f0: f64,
    ior: f64,
    pub multiplier: f64,
}

impl Transmit {
    pub fn new(f0: f64, multiplier: f64) -> Self {
        Self {
            f0,
            ior: fresnel_to_ior(f0),
            multiplier,
        }
    }

    pub fn ior(&self) -> f64 {
        self.ior
    }

    /// Leaving the medium (`wo.y < 0`) reflects back inside with the Fresnel
    /// probability, so both exit branches carry unit weight.
    fn sample(&self, wo: Vec3, rng: &mut dyn RngCore) -> (Vec3, f64) {
        if wo.y < 0.0 && gen_f64(rng) < fresnel_schlick(-wo.y, self.f0) {
            return (reflect(-wo, UP), 1.0);
        }
        (refract(-wo, UP, self.ior), 1.0)
    }

    fn eval(&self, wi: Vec3, wo: Vec3) -> Energy {
        if wi.y * wo.y > 0.0 || wo.y < 0.0 {
            // internal reflection and exits keep everything
            return Energy::WHITE.scaled(self.multiplier);
        }
        let f = fresnel_schlick(wo.y, self.f0);
        Energy::gray((1.0 - f) * self.multiplier)
    }
}

/// Schlick's approximation of Fresnel reflectance, clamped to [0, 1].
pub fn fresnel_schlick(cos_theta: f64, f0: f64) -> f64 {
    let x = (1.0 - cos_theta).clamp(0.0, 1.0).powi(5);
    (f0 + (1.0 - f0) * x).clamp(0.0, 1.0)
}

/// Index of refraction for a normal-incidence reflectance.
pub fn fresnel_to_ior(f0: f64) -> f64 {
    let s = f0.clamp(0.0, 0.99).sqrt();
    (1.0 + s) / (1.0 - s)
}

/// GGX normal distribution for a microfacet normal at `cos_theta` from the surface normal.
pub fn ggx(cos_theta: f64, alpha: f64) -> f64 {
    let a2 = alpha * alpha;
    let exp = (a2 - 1.0) * cos_theta * cos_theta + 1.0;
    a2 / (PI * exp * exp)
}

/// Smith masking for one direction under a GGX distribution.
pub fn smith_ggx(cos_theta: f64, alpha: f64) -> f64 {
    let a2 = alpha * alpha;
    let nv = cos_theta.max(0.0);
    let denom = nv + (a2 + (1.0 - a2) * nv * nv).sqrt();
    if denom > 0.0 {
        2.0 * nv / denom
    } else {
        0.0
    }
}

/// Mirror `incident` about `normal`.
pub fn reflect(incident: Vec3, normal: Vec3) -> Vec3 {
    incident - normal * (2.0 * incident.dot(normal))
}

/// Refract a travelling direction through an interface with index `ior`
/// on the side opposite `normal`.
///
/// Entering or leaving is decided by the sign of `incident · normal`; total
/// internal reflection mirrors the direction instead.
pub fn refract(incident: Vec3, normal: Vec3, ior: f64) -> Vec3 {
    let mut cos_i = incident.dot(normal).clamp(-1.0, 1.0);
    let (mut eta_i, mut eta_t) = (1.0, ior);
    let mut n = normal;
    if cos_i < 0.0 {
        cos_i = -cos_i;
    } else {
        std::mem::swap(&mut eta_i, &mut eta_t);
        n = -normal;
    }
    let eta = eta_i / eta_t;
    let k = 1.0 - eta * eta * (1.0 - cos_i * cos_i);
    if k < 0.0 {
        return reflect(incident, normal);
    }
    unit(incident * eta + n * (eta * cos_i - k.sqrt())).unwrap_or(incident)
}
