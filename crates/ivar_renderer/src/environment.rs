//! Background radiance for rays that leave the scene.

use ivar_core::Energy;
use ivar_math::{Vec3, UP};

pub trait Environment: Send + Sync {
    /// Radiance arriving from `direction` (unit length).
    fn radiance_at(&self, direction: Vec3) -> Energy;
}

/// The same radiance from every direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Flat {
    pub light: Energy,
}

impl Flat {
    pub fn new(r: f64, g: f64, b: f64) -> Self {
        Self {
            light: Energy::new(r, g, b),
        }
    }

    /// No light at all.
    pub fn black() -> Self {
        Self { light: Energy::BLACK }
    }
}

impl Environment for Flat {
    fn radiance_at(&self, _direction: Vec3) -> Energy {
        self.light
    }
}

/// Sky that blends from `down` at the nadir to `up` at the zenith.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gradient {
    pub up: Energy,
    pub down: Energy,
    /// Exponent applied to the blend factor; larger keeps the horizon darker.
    pub power: f64,
}

impl Gradient {
    pub fn new(down: Energy, up: Energy) -> Self {
        Self { up, down, power: 3.0 }
    }

    pub fn with_power(mut self, power: f64) -> Self {
        self.power = power.max(0.0);
        self
    }
}

impl Environment for Gradient {
    fn radiance_at(&self, direction: Vec3) -> Energy {
        let cos = direction.dot(UP).clamp(-1.0, 1.0);
        let vertical = (1.0 + cos) / 2.0;
        self.down.lerp(self.up, vertical.powf(self.power))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat() {
        let env = Flat::new(1.0, 2.0, 3.0);
        assert_eq!(env.radiance_at(Vec3::X), Energy::new(1.0, 2.0, 3.0));
        assert!(Flat::black().radiance_at(-Vec3::Y).is_zero());
    }

    #[test]
    fn test_gradient_endpoints() {
        let env = Gradient::new(Energy::BLACK, Energy::gray(10.0));
        assert_eq!(env.radiance_at(Vec3::Y), Energy::gray(10.0));
        assert!(env.radiance_at(-Vec3::Y).is_zero());

        // Horizon: (1/2)^3 of the way up
        let horizon = env.radiance_at(Vec3::X);
        assert!((horizon.r - 1.25).abs() < 1e-9);
    }
}
