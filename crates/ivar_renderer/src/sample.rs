//! Per-pixel sample statistics.
//!
//! A [`Sample`] is both the buffer a worker fills during one sweep and the
//! shared accumulator those buffers are merged into. Every field is a plain
//! sum, so merging is addition and the order of merges never matters.

use ivar_core::{Energy, SceneError, SceneResult};

/// Running sums for one pixel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pixel {
    /// Sum of path energies
    pub energy: Energy,
    /// Sum of squared path brightness
    pub brightness_sq: f64,
    /// Number of paths
    pub count: u64,
}

impl Pixel {
    pub fn add(&mut self, energy: Energy) {
        let b = energy.mean();
        self.energy += energy;
        self.brightness_sq += b * b;
        self.count += 1;
    }

    pub fn merge(&mut self, other: &Pixel) {
        self.energy += other.energy;
        self.brightness_sq += other.brightness_sq;
        self.count += other.count;
    }

    /// Mean energy per path.
    pub fn mean(&self) -> Energy {
        if self.count == 0 {
            return Energy::BLACK;
        }
        self.energy.scaled(1.0 / self.count as f64)
    }

    /// Relative standard error of the brightness, in `[0, 1]`.
    ///
    /// Zero until the pixel has at least two paths.
    pub fn noise(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        let n = self.count as f64;
        let mean = self.energy.mean() / n;
        if mean.is_nan() || mean <= 0.0 {
            return 0.0;
        }
        let variance = (self.brightness_sq / n - mean * mean).max(0.0);
        let noise = variance.sqrt() / (mean * n.sqrt());
        if noise.is_nan() {
            return 0.0;
        }
        noise.clamp(0.0, 1.0)
    }
}

/// A grid of [`Pixel`]s, row-major from the top-left.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    width: u32,
    height: u32,
    pixels: Vec<Pixel>,
}

impl Sample {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Pixel::default(); width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Record one path's energy for pixel (x, y).
    pub fn add(&mut self, x: u32, y: u32, energy: Energy) {
        let i = self.index(x, y);
        self.pixels[i].add(energy);
    }

    pub fn pixel(&self, x: u32, y: u32) -> &Pixel {
        &self.pixels[self.index(x, y)]
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    /// Add every pixel of `other` into this sample.
    pub fn merge(&mut self, other: &Sample) -> SceneResult<()> {
        if other.width != self.width || other.height != self.height {
            return Err(SceneError::DimensionMismatch {
                width: self.width,
                height: self.height,
                got_width: other.width,
                got_height: other.height,
            });
        }
        for (p, o) in self.pixels.iter_mut().zip(&other.pixels) {
            p.merge(o);
        }
        Ok(())
    }

    pub fn noise(&self, x: u32, y: u32) -> f64 {
        self.pixel(x, y).noise()
    }

    /// Total paths across all pixels.
    pub fn total(&self) -> u64 {
        self.pixels.iter().map(|p| p.count).sum()
    }

    /// Mean linear energy per pixel.
    pub fn image(&self) -> Vec<Energy> {
        self.pixels.iter().map(Pixel::mean).collect()
    }

    /// Noise estimate per pixel.
    pub fn noise_map(&self) -> Vec<f64> {
        self.pixels.iter().map(Pixel::noise).collect()
    }

    /// Average of the mean brightness over a rectangle of pixels.
    pub fn average_brightness(&self, x0: u32, y0: u32, x1: u32, y1: u32) -> f64 {
        let mut sum = 0.0;
        let mut n = 0usize;
        for y in y0..y1.min(self.height) {
            for x in x0..x1.min(self.width) {
                sum += self.pixel(x, y).mean().mean();
                n += 1;
            }
        }
        if n == 0 {
            0.0
        } else {
            sum / n as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_sample(rng: &mut StdRng) -> Sample {
        let mut s = Sample::new(4, 3);
        for _ in 0..40 {
            let x = rng.gen_range(0..4);
            let y = rng.gen_range(0..3);
            s.add(x, y, Energy::new(rng.gen(), rng.gen::<f64>() * 10.0, rng.gen()));
        }
        s
    }

    #[test]
    fn test_merge_is_commutative() {
        let mut rng = StdRng::seed_from_u64(17);
        let a = random_sample(&mut rng);
        let b = random_sample(&mut rng);

        let mut ab = Sample::new(4, 3);
        ab.merge(&a).unwrap();
        ab.merge(&b).unwrap();
        let mut ba = Sample::new(4, 3);
        ba.merge(&b).unwrap();
        ba.merge(&a).unwrap();

        for (p, q) in ab.pixels().iter().zip(ba.pixels()) {
            assert_eq!(p.count, q.count);
            assert_eq!(p.energy, q.energy);
            assert_eq!(p.brightness_sq, q.brightness_sq);
        }
        assert_eq!(ab.total(), a.total() + b.total());
    }

    #[test]
    fn test_merge_dimension_mismatch() {
        let mut a = Sample::new(4, 3);
        let b = Sample::new(3, 4);
        assert!(matches!(
            a.merge(&b),
            Err(SceneError::DimensionMismatch { got_width: 3, .. })
        ));
    }

    #[test]
    fn test_mean_and_noise() {
        let mut p = Pixel::default();
        assert_eq!(p.mean(), Energy::BLACK);
        assert_eq!(p.noise(), 0.0);

        p.add(Energy::gray(2.0));
        assert_eq!(p.noise(), 0.0);
        p.add(Energy::gray(2.0));
        assert_eq!(p.mean(), Energy::gray(2.0));
        assert!(p.noise().abs() < 1e-12);

        let mut q = Pixel::default();
        q.add(Energy::gray(0.0));
        q.add(Energy::gray(4.0));
        // mean 2, sd 2, n 2: 2 / (2 * sqrt 2)
        assert!((q.noise() - 1.0 / 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_noise_is_clamped() {
        let mut p = Pixel::default();
        p.add(Energy::gray(1000.0));
        p.add(Energy::BLACK);
        p.add(Energy::BLACK);
        let n = p.noise();
        assert!((0.0..=1.0).contains(&n));
    }
}
