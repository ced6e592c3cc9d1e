//! Materials describe a physical surface and hand out one BSDF lobe per
//! shading event.
//!
//! Lobes are picked stochastically. The multiplier on each returned lobe is
//! the reciprocal of the probability it was picked with, so averaging many
//! shading events gives the full layered reflectance.

use std::sync::Arc;

use ivar_core::{Energy, Texture};
use ivar_math::gen_f64;
use rand::RngCore;

use crate::bsdf::{Bsdf, Lambert, Microfacet, Transmit};

/// Probability of taking the specular layer of a dielectric.
const REFLECT: f64 = 0.5;
const REFRACT: f64 = 1.0 - REFLECT;

/// A material with the same parameters everywhere on the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Uniform {
    /// Base (diffuse or metal) color, linear.
    pub color: Energy,
    /// Probability of the metallic lobe, 0 to 1.
    pub metalness: f64,
    /// Perceptual roughness, 0 is a mirror.
    pub roughness: f64,
    /// Normal-incidence Fresnel reflectance of the dielectric layer.
    pub specularity: f64,
    /// Emitted radiance is `color * emission`.
    pub emission: f64,
    /// Clarity of the interior, scaled by `color` per channel. Beer's law keeps
    /// `(color * transmission)^(d / ln 10)` over a distance `d`, about 0.961
    /// per unit for 0.913. Zero for opaque materials.
    pub transmission: f64,
}

impl Default for Uniform {
    fn default() -> Self {
        Self {
            color: Energy::gray(0.5),
            metalness: 0.0,
            roughness: 1.0,
            specularity: 0.04,
            emission: 0.0,
            transmission: 0.0,
        }
    }
}

impl Uniform {
    /// Plain diffuse surface with no specular layer.
    pub fn diffuse(r: f64, g: f64, b: f64) -> Self {
        Self {
            color: Energy::new(r, g, b),
            specularity: 0.0,
            ..Self::default()
        }
    }

    pub fn plastic(r: f64, g: f64, b: f64) -> Self {
        Self {
            color: Energy::new(r, g, b),
            roughness: 0.1,
            specularity: 0.2,
            ..Self::default()
        }
    }

    pub fn gold(roughness: f64) -> Self {
        Self {
            color: Energy::new(1.022, 0.782, 0.344),
            metalness: 1.0,
            roughness,
            ..Self::default()
        }
    }

    pub fn mirror(roughness: f64) -> Self {
        Self {
            color: Energy::gray(0.8),
            metalness: 1.0,
            roughness,
            ..Self::default()
        }
    }

    pub fn glass(roughness: f64) -> Self {
        Self {
            color: Energy::WHITE,
            roughness,
            specularity: 0.042,
            transmission: 0.91339,
            ..Self::default()
        }
    }

    /// Coloured glass; a green bottle is `tinted_glass(Energy::new(0.0, 1.0, 0.0), 0.001, 0.0)`.
    pub fn tinted_glass(color: Energy, transmission: f64, roughness: f64) -> Self {
        Self {
            color,
            roughness,
            specularity: 0.042,
            transmission,
            ..Self::default()
        }
    }

    /// Emitter with radiance `(r, g, b)`.
    pub fn light(r: f64, g: f64, b: f64) -> Self {
        let raw = Energy::new(r, g, b);
        Self {
            color: raw.compressed(),
            emission: raw.max_component(),
            ..Self::default()
        }
    }

    /// Warm white emitter.
    pub fn halogen(brightness: f64) -> Self {
        Self {
            color: Energy::new(4781.0, 4518.0, 4200.0).compressed(),
            emission: brightness,
            ..Self::default()
        }
    }

    /// Pick a lobe. `cos` is the cosine between the ray direction and the
    /// surface normal; positive means the ray is leaving through the back.
    pub fn at(&self, cos: f64, rng: &mut dyn RngCore) -> Option<Bsdf> {
        if cos > 0.0 {
            // Light leaving a transmissive interior refracts out or reflects back in
            return self
                .is_transmissive()
                .then(|| Bsdf::Transmit(Transmit::new(self.specularity, 1.0)));
        }
        if gen_f64(rng) < self.metalness {
            return Some(Bsdf::Microfacet(Microfacet::new(
                self.color,
                self.roughness,
                1.0,
            )));
        }
        if gen_f64(rng) < REFLECT {
            return Some(Bsdf::Microfacet(Microfacet::new(
                Energy::gray(self.specularity),
                self.roughness,
                1.0 / REFLECT,
            )));
        }
        if self.is_transmissive() {
            return Some(Bsdf::Transmit(Transmit::new(self.specularity, 1.0 / REFRACT)));
        }
        Some(Bsdf::Lambert(Lambert::new(self.color, 1.0 / REFRACT)))
    }

    pub fn emission(&self) -> Energy {
        self.color.scaled(self.emission)
    }

    pub fn is_transmissive(&self) -> bool {
        self.transmission > 0.0
    }

    /// Per-channel transmittance, `10^-absorbance`.
    pub fn transmittance(&self) -> Energy {
        self.color.scaled(self.transmission)
    }

    /// Per-channel absorbance (base 10), the exponent Beer's law uses.
    ///
    /// `None` for opaque materials. Channels with zero transmittance absorb
    /// everything.
    pub fn absorbance(&self) -> Option<Energy> {
        if !self.is_transmissive() {
            return None;
        }
        let t = self.transmittance();
        let a = |c: f64| if c > 0.0 { -c.log10() } else { f64::INFINITY };
        Some(Energy::new(a(t.r), a(t.g), a(t.b)))
    }
}

/// Two materials alternated on a UV grid of lines.
#[derive(Debug, Clone)]
pub struct Grid {
    base: Arc<Material>,
    line: Arc<Material>,
    spacing: f64,
    radius: f64,
}

impl Grid {
    /// `tiles` cells per UV unit, lines `thickness` of a cell wide.
    pub fn new(base: Arc<Material>, line: Arc<Material>, tiles: u32, thickness: f64) -> Self {
        let spacing = 1.0 / tiles.max(1) as f64;
        Self {
            base,
            line,
            spacing,
            radius: spacing * thickness,
        }
    }

    fn pick(&self, u: f64, v: f64) -> &Material {
        let du = u.rem_euclid(self.spacing);
        let dv = v.rem_euclid(self.spacing);
        if du < self.radius || dv < self.radius {
            self.line.as_ref()
        } else {
            self.base.as_ref()
        }
    }
}

/// A uniform material whose color comes from a texture.
#[derive(Debug, Clone)]
pub struct Mapped {
    base: Uniform,
    texture: Arc<Texture>,
}

impl Mapped {
    pub fn new(base: Uniform, texture: Arc<Texture>) -> Self {
        Self { base, texture }
    }
}

/// Any surface material.
///
/// A `Grid` only picks between its two materials for scattering; it never
/// emits and never transmits, whatever those materials are.
#[derive(Debug, Clone)]
pub enum Material {
    Uniform(Uniform),
    Grid(Grid),
    Mapped(Mapped),
}

impl Material {
    /// Choose a scattering lobe at texture coordinates `(u, v)`.
    ///
    /// `None` means the surface does not scatter this ray at all.
    pub fn at(&self, u: f64, v: f64, cos: f64, rng: &mut dyn RngCore) -> Option<Bsdf> {
        match self {
            Material::Uniform(m) => m.at(cos, rng),
            Material::Grid(g) => g.pick(u, v).at(u, v, cos, rng),
            Material::Mapped(m) => {
                let sample = Uniform {
                    color: m.texture.sample(u, v),
                    ..m.base.clone()
                };
                sample.at(cos, rng)
            }
        }
    }

    /// Emitted radiance, black for non-emitters.
    pub fn emission(&self) -> Energy {
        match self {
            Material::Uniform(m) => m.emission(),
            Material::Grid(_) => Energy::BLACK,
            Material::Mapped(m) => m.base.emission(),
        }
    }

    pub fn is_light(&self) -> bool {
        !self.emission().is_zero()
    }

    pub fn is_transmissive(&self) -> bool {
        match self {
            Material::Uniform(m) => m.is_transmissive(),
            Material::Grid(_) => false,
            Material::Mapped(m) => m.base.is_transmissive(),
        }
    }

    /// See [`Uniform::absorbance`].
    pub fn absorbance(&self) -> Option<Energy> {
        match self {
            Material::Uniform(m) => m.absorbance(),
            Material::Grid(_) => None,
            Material::Mapped(m) => m.base.absorbance(),
        }
    }
}

impl From<Uniform> for Material {
    fn from(m: Uniform) -> Self {
        Material::Uniform(m)
    }
}

impl Default for Material {
    fn default() -> Self {
        Material::Uniform(Uniform::default())
    }
}
