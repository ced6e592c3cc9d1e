//! PNG output for accumulator snapshots.

use std::path::Path;

use anyhow::{Context, Result};
use image::{GrayImage, Luma, Rgb, RgbImage};
use ivar_renderer::{Energy, Sample};

fn clamp_01(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

/// sRGB transfer curve.
fn linear_to_gamma(linear: f64) -> f64 {
    if linear <= 0.003_130_8 {
        linear * 12.92
    } else {
        1.055 * linear.powf(1.0 / 2.4) - 0.055
    }
}

pub fn energy_to_rgb(energy: Energy, expose: f64) -> [u8; 3] {
    let channel = |c: f64| (255.0 * clamp_01(linear_to_gamma(clamp_01(c * expose)))).round() as u8;
    [channel(energy.r), channel(energy.g), channel(energy.b)]
}

/// Tone-mapped mean radiance of every pixel.
pub fn render_image(sample: &Sample, expose: f64) -> RgbImage {
    let means = sample.image();
    RgbImage::from_fn(sample.width(), sample.height(), |x, y| {
        let i = y as usize * sample.width() as usize + x as usize;
        Rgb(energy_to_rgb(means[i], expose))
    })
}

/// Greyscale noise map, white is noisiest.
pub fn heat_image(sample: &Sample) -> GrayImage {
    let noise = sample.noise_map();
    GrayImage::from_fn(sample.width(), sample.height(), |x, y| {
        let i = y as usize * sample.width() as usize + x as usize;
        Luma([(255.0 * clamp_01(noise[i])).round() as u8])
    })
}

pub fn write_pngs(sample: &Sample, expose: f64, output: &Path, heat: Option<&Path>) -> Result<()> {
    render_image(sample, expose)
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    if let Some(heat) = heat {
        heat_image(sample)
            .save(heat)
            .with_context(|| format!("Failed to write {}", heat.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_to_rgb() {
        assert_eq!(energy_to_rgb(Energy::BLACK, 1.0), [0, 0, 0]);
        assert_eq!(energy_to_rgb(Energy::WHITE, 1.0), [255, 255, 255]);
        assert_eq!(energy_to_rgb(Energy::gray(100.0), 1.0), [255, 255, 255]);
        assert_eq!(energy_to_rgb(Energy::new(f64::NAN, -1.0, 0.5), 2.0), [0, 0, 255]);

        // Mid grey lands near 188 after the transfer curve
        let [r, _, _] = energy_to_rgb(Energy::gray(0.5), 1.0);
        assert!((186..=189).contains(&r));
    }

    #[test]
    fn test_images_match_sample_size() {
        let mut sample = Sample::new(3, 2);
        sample.add(2, 1, Energy::WHITE);
        sample.add(0, 0, Energy::gray(4.0));
        sample.add(0, 0, Energy::BLACK);

        let img = render_image(&sample, 1.0);
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(2, 1).0, [255, 255, 255]);
        assert_eq!(img.get_pixel(1, 0).0, [0, 0, 0]);

        let heat = heat_image(&sample);
        assert_eq!(heat.dimensions(), (3, 2));
        assert_eq!(heat.get_pixel(1, 1).0, [0]);
        assert!(heat.get_pixel(0, 0).0[0] > 0);
    }
}
