//! Image textures for mapped materials.
//!
//! Files are decoded with the `image` crate and stored as linear `Energy`
//! texels, so sampling never touches the sRGB curve again.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::Energy;

#[derive(Error, Debug)]
pub enum TextureError {
    #[error("Failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Texture is {width}x{height} but has {texels} texels")]
    BadSize { width: u32, height: u32, texels: usize },
}

pub type TextureResult<T> = Result<T, TextureError>;

/// Linear RGB texels, row-major from the top-left.
#[derive(Clone, Debug)]
pub struct Texture {
    width: u32,
    height: u32,
    texels: Vec<Energy>,
}

impl Texture {
    pub fn new(width: u32, height: u32, texels: Vec<Energy>) -> TextureResult<Self> {
        if width == 0 || height == 0 || texels.len() != width as usize * height as usize {
            return Err(TextureError::BadSize {
                width,
                height,
                texels: texels.len(),
            });
        }
        Ok(Self { width, height, texels })
    }

    /// 1x1 texture of a single colour.
    pub fn solid(color: Energy) -> Self {
        Self {
            width: 1,
            height: 1,
            texels: vec![color],
        }
    }

    /// Linearize an 8-bit sRGB image.
    pub fn from_rgb8(img: &image::RgbImage) -> TextureResult<Self> {
        let (width, height) = img.dimensions();
        let texels = img
            .pixels()
            .map(|p| Energy::new(srgb_to_linear(p[0]), srgb_to_linear(p[1]), srgb_to_linear(p[2])))
            .collect();
        Self::new(width, height, texels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bilinear lookup. UVs wrap and (0, 0) is the bottom-left corner.
    pub fn sample(&self, u: f64, v: f64) -> Energy {
        let x = u.rem_euclid(1.0) * (self.width - 1) as f64;
        let y = (1.0 - v.rem_euclid(1.0)) * (self.height - 1) as f64;

        let (x0, y0) = (x.floor() as u32, y.floor() as u32);
        let (x1, y1) = ((x0 + 1).min(self.width - 1), (y0 + 1).min(self.height - 1));
        let (fx, fy) = (x - x0 as f64, y - y0 as f64);

        let top = self.texel(x0, y0).lerp(self.texel(x1, y0), fx);
        let bottom = self.texel(x0, y1).lerp(self.texel(x1, y1), fx);
        top.lerp(bottom, fy)
    }

    fn texel(&self, x: u32, y: u32) -> Energy {
        self.texels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
            .unwrap_or(Energy::BLACK)
    }
}

/// Decodes each file once and hands out shared textures.
#[derive(Debug, Default)]
pub struct TextureCache {
    textures: HashMap<PathBuf, Arc<Texture>>,
    /// Relative paths are resolved against this
    dir: Option<PathBuf>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            textures: HashMap::new(),
            dir: Some(dir.into()),
        }
    }

    pub fn load(&mut self, path: impl AsRef<Path>) -> TextureResult<Arc<Texture>> {
        let path = match &self.dir {
            Some(dir) if path.as_ref().is_relative() => dir.join(path),
            _ => path.as_ref().to_path_buf(),
        };
        if let Some(texture) = self.textures.get(&path) {
            return Ok(Arc::clone(texture));
        }

        let img = image::open(&path).map_err(|e| TextureError::Decode {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let texture = Arc::new(Texture::from_rgb8(&img.to_rgb8())?);
        log::debug!(
            "Loaded texture {} ({}x{})",
            path.display(),
            texture.width,
            texture.height
        );
        self.textures.insert(path, Arc::clone(&texture));
        Ok(texture)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

fn srgb_to_linear(value: u8) -> f64 {
    let v = value as f64 / 255.0;
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_texture() {
        let tex = Texture::solid(Energy::new(1.0, 0.5, 0.0));
        assert_eq!((tex.width(), tex.height()), (1, 1));
        assert_eq!(tex.sample(0.3, 0.9), Energy::new(1.0, 0.5, 0.0));
        assert_eq!(tex.sample(-4.2, 7.0), Energy::new(1.0, 0.5, 0.0));
    }

    #[test]
    fn test_bilinear_sample() {
        // Top row white, bottom row black
        let tex = Texture::new(
            2,
            2,
            vec![Energy::WHITE, Energy::WHITE, Energy::BLACK, Energy::BLACK],
        )
        .unwrap();

        assert!(tex.sample(0.0, 0.0).is_zero());
        assert!((tex.sample(0.25, 0.5).mean() - 0.5).abs() < 1e-9);
        assert!((tex.sample(1.25, 0.5).mean() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_from_rgb8_linearizes() {
        let img = image::RgbImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                image::Rgb([0, 0, 0])
            } else {
                image::Rgb([255, 128, 255])
            }
        });
        let tex = Texture::from_rgb8(&img).unwrap();
        let right = tex.texel(1, 0);
        assert!((right.r - 1.0).abs() < 1e-9);
        // Mid-gray is darker in linear
        assert!(right.g > 0.2 && right.g < 0.23);
        assert!(tex.texel(0, 0).is_zero());
    }

    #[test]
    fn test_bad_size_rejected() {
        assert!(matches!(
            Texture::new(2, 2, vec![Energy::BLACK]),
            Err(TextureError::BadSize { texels: 1, .. })
        ));
        assert!(Texture::new(0, 0, Vec::new()).is_err());
    }

    #[test]
    fn test_cache_missing_file() {
        let mut cache = TextureCache::with_base_dir("/nonexistent");
        assert!(matches!(cache.load("missing.png"), Err(TextureError::Decode { .. })));
        assert!(cache.is_empty());
    }
}
