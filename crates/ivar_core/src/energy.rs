//! Radiometric RGB energy.
//!
//! `Energy` is used both for radiance (what a path carries to the camera)
//! and for throughput (how much of it survives each bounce). Channels are
//! expected to stay non-negative; `limit` and `is_finite` let the tracer keep
//! them that way.

use std::ops::{Add, AddAssign, Mul, MulAssign};

use ivar_math::gen_f64;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Three-channel linear energy.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Energy {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Energy {
    pub const BLACK: Energy = Energy::new(0.0, 0.0, 0.0);
    pub const WHITE: Energy = Energy::new(1.0, 1.0, 1.0);

    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    pub const fn gray(v: f64) -> Self {
        Self::new(v, v, v)
    }

    pub fn scaled(self, n: f64) -> Energy {
        Energy::new(self.r * n, self.g * n, self.b * n)
    }

    /// Component-wise product.
    pub fn times(self, other: Energy) -> Energy {
        Energy::new(self.r * other.r, self.g * other.g, self.b * other.b)
    }

    /// Clamp each channel to `[0, max]`. NaN channels become 0.
    pub fn limit(self, max: f64) -> Energy {
        let clamp = |c: f64| if c > 0.0 { c.min(max) } else { 0.0 };
        Energy::new(clamp(self.r), clamp(self.g), clamp(self.b))
    }

    pub fn is_zero(&self) -> bool {
        self.r <= 0.0 && self.g <= 0.0 && self.b <= 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite()
    }

    /// Average of the three channels, used as "brightness".
    pub fn mean(&self) -> f64 {
        (self.r + self.g + self.b) / 3.0
    }

    pub fn max_component(&self) -> f64 {
        self.r.max(self.g).max(self.b)
    }

    /// Russian roulette.
    ///
    /// Survival probability is the strongest channel, capped at 1. Survivors
    /// are divided by it so the expected value is unchanged; the rest are
    /// returned as black.
    pub fn random_gain(self, rng: &mut dyn RngCore) -> Energy {
        let survive = self.max_component().min(1.0);
        if survive.is_nan() || survive <= 0.0 {
            return Energy::BLACK;
        }
        if gen_f64(rng) >= survive {
            return Energy::BLACK;
        }
        self.scaled(1.0 / survive)
    }

    /// Rescale so the strongest channel is 1, keeping hue.
    ///
    /// Light presets specify raw RGB intensities; the compressed colour is
    /// paired with a separate scalar intensity.
    pub fn compressed(self) -> Energy {
        let max = self.max_component();
        if max > 0.0 {
            self.scaled(1.0 / max)
        } else {
            Energy::BLACK
        }
    }

    /// Linear interpolation, `t = 0` gives `self`.
    pub fn lerp(self, other: Energy, t: f64) -> Energy {
        self.scaled(1.0 - t) + other.scaled(t)
    }
}

impl Add for Energy {
    type Output = Energy;

    fn add(self, rhs: Energy) -> Energy {
        Energy::new(self.r + rhs.r, self.g + rhs.g, self.b + rhs.b)
    }
}

impl AddAssign for Energy {
    fn add_assign(&mut self, rhs: Energy) {
        *self = *self + rhs;
    }
}

impl Mul for Energy {
    type Output = Energy;

    fn mul(self, rhs: Energy) -> Energy {
        self.times(rhs)
    }
}

impl Mul<f64> for Energy {
    type Output = Energy;

    fn mul(self, rhs: f64) -> Energy {
        self.scaled(rhs)
    }
}

impl MulAssign for Energy {
    fn mul_assign(&mut self, rhs: Energy) {
        *self = self.times(rhs);
    }
}

impl From<[f64; 3]> for Energy {
    fn from(c: [f64; 3]) -> Self {
        Energy::new(c[0], c[1], c[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_energy_arithmetic() {
        let a = Energy::new(1.0, 2.0, 3.0);
        let b = Energy::new(0.5, 0.5, 2.0);

        assert_eq!(a + b, Energy::new(1.5, 2.5, 5.0));
        assert_eq!(a * b, Energy::new(0.5, 1.0, 6.0));
        assert_eq!(a * 2.0, Energy::new(2.0, 4.0, 6.0));
        assert_eq!(a.mean(), 2.0);
        assert_eq!(a.max_component(), 3.0);
    }

    #[test]
    fn test_limit_clamps_and_drops_nan() {
        let e = Energy::new(50.0, -1.0, f64::NAN).limit(20.0);
        assert_eq!(e, Energy::new(20.0, 0.0, 0.0));
    }

    #[test]
    fn test_compressed() {
        let e = Energy::new(4781.0, 4518.0, 4200.0).compressed();
        assert_eq!(e.r, 1.0);
        assert!(e.g < 1.0 && e.b < e.g);
        assert_eq!(Energy::BLACK.compressed(), Energy::BLACK);
    }

    #[test]
    fn test_random_gain_bright_signal_survives() {
        let mut rng = StdRng::seed_from_u64(11);
        let e = Energy::new(2.0, 0.5, 1.0);
        for _ in 0..100 {
            assert_eq!(e.random_gain(&mut rng), e);
        }
    }

    #[test]
    fn test_random_gain_is_unbiased() {
        let mut rng = StdRng::seed_from_u64(12);
        let e = Energy::new(0.2, 0.1, 0.05);
        let n = 100_000;
        let mut sum = Energy::BLACK;
        for _ in 0..n {
            let g = e.random_gain(&mut rng);
            assert!(g.is_zero() || (g.r - 1.0).abs() < 1e-12);
            sum += g;
        }
        let mean = sum.scaled(1.0 / n as f64);
        assert!((mean.r - 0.2).abs() < 0.01);
        assert!((mean.g - 0.1).abs() < 0.005);

        assert!(Energy::BLACK.random_gain(&mut rng).is_zero());
    }
}
