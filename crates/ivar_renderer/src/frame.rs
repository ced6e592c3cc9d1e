//! Progressive render of one scene.
//!
//! A [`Frame`] owns a pool of worker threads, each running its own
//! [`Tracer`] and sweeping the whole image over and over. Finished sweeps go
//! through a bounded channel to a single aggregator thread, the only writer
//! of the shared accumulator. Readers take snapshots under a read lock while
//! merges continue.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use ivar_core::SceneResult;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::RenderConfig;
use crate::sample::Sample;
use crate::scene::Scene;
use crate::tracer::Tracer;

struct Shared {
    scene: Arc<Scene>,
    config: RenderConfig,
    accumulator: RwLock<Sample>,
    active: AtomicBool,
    samples: AtomicU64,
}

#[derive(Default)]
struct Lifecycle {
    workers: Vec<JoinHandle<()>>,
    aggregator: Option<JoinHandle<()>>,
    starts: u64,
}

pub struct Frame {
    shared: Arc<Shared>,
    lifecycle: Mutex<Lifecycle>,
}

impl Frame {
    /// Validate `config` and prepare an empty accumulator. No threads start
    /// until [`start`](Self::start).
    pub fn new(scene: Arc<Scene>, config: RenderConfig) -> SceneResult<Self> {
        config.validate()?;
        let accumulator = Sample::new(config.width, config.height);
        Ok(Self {
            shared: Arc::new(Shared {
                scene,
                config,
                accumulator: RwLock::new(accumulator),
                active: AtomicBool::new(false),
                samples: AtomicU64::new(0),
            }),
            lifecycle: Mutex::new(Lifecycle::default()),
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.shared.config
    }

    /// Spawn the workers. Does nothing if already running.
    pub fn start(&self) {
        let mut life = self.lifecycle();
        if self.shared.active.load(Ordering::SeqCst) {
            return;
        }

        let count = self.shared.config.worker_count();
        let (tx, rx) = crossbeam_channel::bounded::<Sample>(count * 2);

        let shared = Arc::clone(&self.shared);
        let aggregator = match thread::Builder::new()
            .name("ivar-aggregator".into())
            .spawn(move || aggregate(shared, rx))
        {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("Failed to spawn aggregator: {}", e);
                return;
            }
        };

        self.shared.active.store(true, Ordering::SeqCst);
        let mut workers = Vec::with_capacity(count);
        for index in 0..count {
            let rng = self.worker_rng(index, life.starts);
            let tracer = Tracer::new(
                Arc::clone(&self.shared.scene),
                self.shared.config.clone(),
                rng,
            );
            let shared = Arc::clone(&self.shared);
            let tx = tx.clone();
            match thread::Builder::new()
                .name(format!("ivar-worker-{}", index))
                .spawn(move || work(shared, tracer, tx, index))
            {
                Ok(handle) => workers.push(handle),
                Err(e) => log::error!("Failed to spawn worker {}: {}", index, e),
            }
        }
        // Aggregator ends once every worker has dropped its sender
        drop(tx);

        life.starts += 1;
        if workers.is_empty() {
            self.shared.active.store(false, Ordering::SeqCst);
            if aggregator.join().is_err() {
                log::error!("Aggregator panicked");
            }
            return;
        }

        log::info!(
            "Rendering {}x{} with {} workers",
            self.shared.config.width,
            self.shared.config.height,
            workers.len()
        );
        life.workers = workers;
        life.aggregator = Some(aggregator);
    }

    /// Stop and join every thread. Once this returns the accumulator no
    /// longer changes. Does nothing if already stopped.
    pub fn stop(&self) {
        let mut life = self.lifecycle();
        if !self.shared.active.swap(false, Ordering::SeqCst) {
            return;
        }
        for handle in life.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("Render worker panicked");
            }
        }
        if let Some(handle) = life.aggregator.take() {
            if handle.join().is_err() {
                log::error!("Aggregator panicked");
            }
        }
        log::info!("Stopped after {} samples", self.sample_count());
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Paths merged into the accumulator so far. Never decreases.
    pub fn sample_count(&self) -> u64 {
        self.shared.samples.load(Ordering::SeqCst)
    }

    /// Consistent copy of the accumulator and its total path count.
    pub fn snapshot(&self) -> (Sample, u64) {
        let acc = self
            .shared
            .accumulator
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let sample = acc.clone();
        let total = sample.total();
        (sample, total)
    }

    /// Noise estimate of one pixel of the accumulator.
    pub fn noise(&self, x: u32, y: u32) -> f64 {
        self.shared
            .accumulator
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .noise(x, y)
    }

    #[cfg(test)]
    fn worker_count(&self) -> usize {
        self.lifecycle().workers.len()
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn worker_rng(&self, index: usize, starts: u64) -> StdRng {
        let index = index as u64;
        match self.shared.config.seed {
            Some(seed) => {
                let workers = self.shared.config.worker_count() as u64;
                StdRng::seed_from_u64(seed.wrapping_add(index).wrapping_add(starts.wrapping_mul(workers)))
            }
            None => StdRng::seed_from_u64(rand::thread_rng().gen::<u64>() ^ index.rotate_left(32)),
        }
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.stop();
    }
}

fn work(shared: Arc<Shared>, mut tracer: Tracer, tx: Sender<Sample>, index: usize) {
    log::debug!("Worker {} started", index);
    let mut sweeps = 0u64;
    while shared.active.load(Ordering::SeqCst) {
        let sample = tracer.sweep(&shared.active);
        if sample.total() == 0 {
            continue;
        }
        if tx.send(sample).is_err() {
            break;
        }
        sweeps += 1;
    }
    log::debug!("Worker {} finished after {} sweeps", index, sweeps);
}

fn aggregate(shared: Arc<Shared>, rx: Receiver<Sample>) {
    for sample in rx.iter() {
        let paths = sample.total();
        {
            let mut acc = shared
                .accumulator
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = acc.merge(&sample) {
                log::warn!("Discarding sample: {}", e);
                continue;
            }
        }
        shared.samples.fetch_add(paths, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::ThinLensCamera;
    use crate::environment::Flat;
    use crate::material::{Material, Uniform};
    use crate::surface::Surface;
    use ivar_core::SceneError;
    use ivar_math::Vec3;
    use std::time::{Duration, Instant};

    fn small_scene() -> Arc<Scene> {
        let ball = Surface::sphere(Arc::new(Material::from(Uniform::default())))
            .build()
            .unwrap();
        let camera = ThinLensCamera::new().with_position(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, Vec3::Y);
        Arc::new(Scene::new(camera, vec![ball], Flat::new(1.0, 1.0, 1.0)).unwrap())
    }

    fn wait_for(frame: &Frame, count: u64, limit: Duration) {
        let start = Instant::now();
        while frame.sample_count() < count && start.elapsed() < limit {
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = RenderConfig::default().with_resolution(0, 0);
        assert!(matches!(
            Frame::new(small_scene(), config),
            Err(SceneError::InvalidResolution { .. })
        ));
    }

    #[test]
    fn test_start_stop_idempotent() {
        let config = RenderConfig::default()
            .with_resolution(8, 8)
            .with_workers(2)
            .with_seed(1);
        let frame = Frame::new(small_scene(), config).unwrap();

        frame.stop();
        assert!(!frame.is_active());
        assert_eq!(frame.sample_count(), 0);

        frame.start();
        frame.start();
        assert!(frame.is_active());
        assert_eq!(frame.worker_count(), 2);

        wait_for(&frame, 1, Duration::from_secs(30));
        let running = frame.sample_count();
        assert!(running > 0);

        frame.stop();
        frame.stop();
        assert!(!frame.is_active());
        let stopped = frame.sample_count();
        assert!(stopped >= running);

        // Nothing merges after stop returns
        thread::sleep(Duration::from_millis(50));
        assert_eq!(frame.sample_count(), stopped);
        let (snapshot, total) = frame.snapshot();
        assert_eq!(total, stopped);
        assert_eq!(snapshot.total(), stopped);

        // Restarting keeps accumulating
        frame.start();
        wait_for(&frame, stopped + 1, Duration::from_secs(30));
        frame.stop();
        assert!(frame.sample_count() > stopped);
    }

    #[test]
    fn test_drop_stops_workers() {
        let config = RenderConfig::default().with_resolution(4, 4).with_workers(1);
        let frame = Frame::new(small_scene(), config).unwrap();
        frame.start();
        drop(frame);
    }

    #[test]
    fn test_light_above_floor() {
        let floor = Surface::cube(Arc::new(Material::from(Uniform::diffuse(0.5, 0.5, 0.5))))
            .shift(0.0, -0.5, 0.0)
            .scale(100.0, 1.0, 100.0)
            .build()
            .unwrap();
        let light = Surface::sphere(Arc::new(Material::from(Uniform::light(100.0, 100.0, 100.0))))
            .shift(0.0, 8.0, 0.0)
            .scale(10.0, 10.0, 10.0)
            .build()
            .unwrap();
        let camera = ThinLensCamera::new()
            .with_position(Vec3::new(0.0, 4.0, 30.0), Vec3::new(0.0, 4.0, 0.0), Vec3::Y)
            .with_lens(40.0, 0.0, 0.0);
        let scene = Arc::new(Scene::new(camera, vec![floor, light], Flat::black()).unwrap());

        let config = RenderConfig::default()
            .with_resolution(16, 16)
            .with_workers(2)
            .with_seed(42);
        let frame = Frame::new(scene, config).unwrap();
        frame.start();
        wait_for(&frame, 16 * 16 * 1000, Duration::from_secs(300));
        frame.stop();

        let (sample, _) = frame.snapshot();
        // Floor right below the light
        let under = sample.average_brightness(6, 10, 10, 13);
        let corners = [
            sample.average_brightness(0, 0, 2, 2),
            sample.average_brightness(14, 0, 16, 2),
            sample.average_brightness(0, 14, 2, 16),
            sample.average_brightness(14, 14, 16, 16),
        ];
        let corner_mean = corners.iter().sum::<f64>() / 4.0;
        assert!(under > corner_mean, "under {} corners {}", under, corner_mean);
        assert!(sample.pixels().iter().all(|p| p.mean().is_finite()));
    }
}
