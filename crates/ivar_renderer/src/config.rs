//! Render settings.

use std::num::NonZeroUsize;

use ivar_core::{SceneError, SceneResult};
use serde::{Deserialize, Serialize};

/// Settings shared by every worker of a [`Frame`](crate::Frame).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Maximum bounces per path
    pub bounces: u32,
    /// Extra paths per pixel for the noisiest pixels
    pub branches: u32,
    /// Per-channel cap on `eval / pdf`, against fireflies
    pub max_weight: f64,
    /// Worker threads; defaults to the available parallelism
    pub workers: Option<usize>,
    /// Seed for reproducible renders; each worker adds its index
    pub seed: Option<u64>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 450,
            bounces: 8,
            branches: 8,
            max_weight: 20.0,
            workers: None,
            seed: None,
        }
    }
}

impl RenderConfig {
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Reject settings that would fail once workers are running.
    pub fn validate(&self) -> SceneResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(SceneError::InvalidResolution {
                width: self.width,
                height: self.height,
            });
        }
        if self.workers == Some(0) {
            return Err(SceneError::ZeroWorkers);
        }
        Ok(())
    }

    /// Resolved worker count.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        })
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RenderConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn test_validate() {
        let config = RenderConfig::default().with_resolution(0, 10);
        assert!(matches!(
            config.validate(),
            Err(SceneError::InvalidResolution { width: 0, height: 10 })
        ));

        let config = RenderConfig::default().with_workers(0);
        assert!(matches!(config.validate(), Err(SceneError::ZeroWorkers)));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RenderConfig = serde_json::from_str(r#"{ "width": 64, "seed": 3 }"#).unwrap();
        assert_eq!(config.width, 64);
        assert_eq!(config.height, 450);
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.bounces, 8);
    }
}
