//! `ivar [config.json]`
//!
//! Renders a built-in scene progressively, rewriting the output PNG about
//! once a second until the time or sample budget runs out.

mod output;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use ivar_renderer::{
    Energy, Flat, Frame, Gradient, Grid, Mapped, Material, Mesh, RenderConfig, Scene, Surface, TextureCache,
    ThinLensCamera, Uniform, Vec3,
};
use serde::Deserialize;

/// Everything the binary reads from its optional JSON config.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct CliConfig {
    render: RenderConfig,
    /// Render PNG path
    output: PathBuf,
    /// Noise heat map PNG path
    heat: Option<PathBuf>,
    /// Wall-clock budget in seconds
    time: Option<f64>,
    /// Stop once the average pixel has this many paths
    samples_per_pixel: Option<u64>,
    expose: f64,
    camera: Vec3,
    target: Vec3,
    vfov: f64,
    aperture: f64,
    /// Sky radiance
    sky: Energy,
    /// Radiance below the horizon; a flat sky when absent
    ground: Option<Energy>,
    /// Image mapped onto the textured ball
    texture: Option<PathBuf>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            render: RenderConfig::default(),
            output: PathBuf::from("ivar.png"),
            heat: None,
            time: Some(30.0),
            samples_per_pixel: None,
            expose: 1.0,
            camera: Vec3::new(-0.6, 0.12, 0.8),
            target: Vec3::new(0.0, 0.0, 0.0),
            vfov: 40.0,
            aperture: 0.0,
            sky: Energy::new(0.4, 0.5, 0.6),
            ground: None,
            texture: None,
        }
    }
}

impl CliConfig {
    fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Failed to parse config {}", path.display()))
    }

    fn finished(&self, elapsed: Duration, samples: u64) -> bool {
        if let Some(limit) = self.time {
            if elapsed.as_secs_f64() >= limit {
                return true;
            }
        }
        if let Some(spp) = self.samples_per_pixel {
            let pixels = self.render.pixel_count() as u64;
            if samples >= spp.saturating_mul(pixels) {
                return true;
            }
        }
        false
    }
}

/// Square pyramid with its base centered on `base`. Faces shade flat.
fn pyramid(base: Vec3, size: f64) -> Mesh {
    let positions = [
        Vec3::new(-0.5, 0.0, -0.5),
        Vec3::new(0.5, 0.0, -0.5),
        Vec3::new(0.5, 0.0, 0.5),
        Vec3::new(-0.5, 0.0, 0.5),
        Vec3::new(0.0, 0.8, 0.0),
    ]
    .iter()
    .map(|p| base + *p * size)
    .collect();
    let indices = vec![0, 1, 2, 0, 2, 3, 0, 1, 4, 1, 2, 4, 2, 3, 4, 3, 0, 4];
    Mesh::new(positions, indices, None)
}

fn build_surfaces(config: &CliConfig) -> Result<Vec<Surface>> {
    let light = Arc::new(Material::from(Uniform::light(15.0, 15.0, 15.0)));
    let white = Arc::new(Material::from(Uniform::plastic(1.0, 1.0, 1.0)));
    let blue = Arc::new(Material::from(Uniform::plastic(0.0, 0.0, 1.0)));
    let red = Arc::new(Material::from(Uniform::plastic(1.0, 0.0, 0.0)));
    let gold = Arc::new(Material::from(Uniform::gold(0.05)));
    let green_glass = Arc::new(Material::from(Uniform::tinted_glass(Energy::new(0.0, 1.0, 0.0), 0.001, 0.0)));
    let clear_glass = Arc::new(Material::from(Uniform::glass(0.0)));
    let floor = Arc::new(Material::Grid(Grid::new(
        Arc::new(Material::from(Uniform::plastic(0.9, 0.9, 0.9))),
        Arc::new(Material::from(Uniform::diffuse(0.1, 0.1, 0.1))),
        400,
        0.05,
    )));

    let mut surfaces = vec![
        Surface::cube(floor).shift(0.0, -0.55, 0.0).scale(1000.0, 1.0, 1000.0).build()?,
        Surface::sphere(light).shift(-1.5, 2.0, 0.0).scale(0.5, 0.5, 0.5).build()?,
        Surface::sphere(red).shift(-0.3, 0.0, 0.0).scale(0.2, 0.2, 0.2).build()?,
        Surface::cube(gold).shift(0.0, 0.0, 0.0).rotate(0.0, 0.785, 0.0).scale(0.2, 0.2, 0.2).build()?,
        Surface::cube(blue).shift(0.3, 0.0, 0.0).rotate(0.0, -0.3, 0.0).scale(0.2, 0.2, 0.2).build()?,
        Surface::sphere(green_glass).shift(0.45, 0.05, -0.4).scale(0.3, 0.3, 0.3).build()?,
        Surface::sphere(clear_glass).shift(0.0, 0.0, 0.2).scale(0.1, 0.1, 0.1).build()?,
        Surface::sphere(white).shift(-0.2, 0.0, -0.4).scale(0.2, 0.2, 0.2).build()?,
    ];

    let pyramid = pyramid(Vec3::new(-0.55, -0.05, -0.25), 0.25);
    let copper = Arc::new(Material::from(Uniform {
        color: Energy::new(0.955, 0.638, 0.538),
        metalness: 1.0,
        roughness: 0.3,
        ..Uniform::default()
    }));
    let triangles = Surface::from_mesh(&pyramid, copper).context("Failed to convert pyramid mesh")?;
    surfaces.extend(triangles);

    if let Some(path) = &config.texture {
        let mut cache = TextureCache::new();
        let texture = cache
            .load(path)
            .with_context(|| format!("Failed to load texture {}", path.display()))?;
        let mapped = Arc::new(Material::Mapped(Mapped::new(Uniform::plastic(1.0, 1.0, 1.0), texture)));
        surfaces.push(Surface::sphere(mapped).shift(0.25, 0.0, 0.35).scale(0.15, 0.15, 0.15).build()?);
    }

    Ok(surfaces)
}

fn build_scene(config: &CliConfig) -> Result<Scene> {
    let surfaces = build_surfaces(config)?;
    let camera = ThinLensCamera::new()
        .with_position(config.camera, config.target, Vec3::Y)
        .with_lens(config.vfov, config.aperture, 0.0);
    let scene = match config.ground {
        Some(ground) => Scene::new(camera, surfaces, Gradient::new(ground, config.sky))?,
        None => Scene::new(camera, surfaces, Flat::new(config.sky.r, config.sky.g, config.sky.b))?,
    };
    Ok(scene)
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = CliConfig::load(path.as_deref())?;
    log::info!("Starting Ivar: {:?}", config.render);

    let scene = Arc::new(build_scene(&config).context("Failed to build scene")?);
    let frame = Frame::new(scene, config.render.clone()).context("Invalid render settings")?;

    let started = Instant::now();
    let mut written = 0u64;
    frame.start();
    loop {
        thread::sleep(Duration::from_secs(1));
        let samples = frame.sample_count();
        let done = config.finished(started.elapsed(), samples);
        if done {
            frame.stop();
        }
        if samples > written || done {
            let (sample, total) = frame.snapshot();
            output::write_pngs(&sample, config.expose, &config.output, config.heat.as_deref())?;
            written = total;
            log::info!("Wrote {} ({} paths)", config.output.display(), total);
        }
        if done {
            break;
        }
    }

    let secs = started.elapsed().as_secs_f64();
    log::info!(
        "{} paths in {:.1} seconds ({:.0} paths/sec)",
        written,
        secs,
        written as f64 / secs.max(f64::EPSILON)
    );
    Ok(())
}
