use crate::bvh::{BoundingVolume, BuildError};
use crate::camera::Camera;
use crate::entity::EntityList;
use crate::integrator::{cast, Background};
use crate::math::{Color, Vec4};
use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("failed to spawn render worker: {0}")]
    Spawn(#[from] std::io::Error),
}

// ─── Accumulator ────────────────────────────────────────────────────────────

/// One pixel lane: `(sum_r, sum_g, sum_b)` as f32 bit patterns plus the
/// sample count. Components are relaxed atomics — each lane has a single
/// writer (the worker owning that stripe), and the display reads are allowed
/// to tear across components for at most a one-frame glitch.
struct PixelCell {
    r: AtomicU32,
    g: AtomicU32,
    b: AtomicU32,
    count: AtomicU32,
}

impl PixelCell {
    fn zeroed() -> Self {
        Self {
            r: AtomicU32::new(0),
            g: AtomicU32::new(0),
            b: AtomicU32::new(0),
            count: AtomicU32::new(0),
        }
    }
}

/// The shared HDR accumulation buffer: `width · height` cells, row-major
/// with (0, 0) at the bottom-left. Displayed color is
/// `clamp(sqrt(sum / count)) · 255.99`.
pub struct Accumulator {
    width: u32,
    height: u32,
    cells: Vec<PixelCell>,
}

impl Accumulator {
    pub fn new(width: u32, height: u32) -> Self {
        let cells = (0..width as usize * height as usize)
            .map(|_| PixelCell::zeroed())
            .collect();
        Self {
            width,
            height,
            cells,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// First-epoch write: the fresh sample overwrites whatever was there.
    pub fn replace(&self, index: usize, color: Color) {
        let cell = &self.cells[index];
        cell.r.store((color.x as f32).to_bits(), Ordering::Relaxed);
        cell.g.store((color.y as f32).to_bits(), Ordering::Relaxed);
        cell.b.store((color.z as f32).to_bits(), Ordering::Relaxed);
        cell.count.store(1, Ordering::Relaxed);
    }

    /// Later-epoch write: adds the sample into the running sum and stamps
    /// the epoch number as the count.
    pub fn accumulate(&self, index: usize, color: Color, epoch: u32) {
        let cell = &self.cells[index];
        let r = f32::from_bits(cell.r.load(Ordering::Relaxed)) + color.x as f32;
        let g = f32::from_bits(cell.g.load(Ordering::Relaxed)) + color.y as f32;
        let b = f32::from_bits(cell.b.load(Ordering::Relaxed)) + color.z as f32;
        cell.r.store(r.to_bits(), Ordering::Relaxed);
        cell.g.store(g.to_bits(), Ordering::Relaxed);
        cell.b.store(b.to_bits(), Ordering::Relaxed);
        cell.count.store(epoch, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        for cell in &self.cells {
            cell.r.store(0, Ordering::Relaxed);
            cell.g.store(0, Ordering::Relaxed);
            cell.b.store(0, Ordering::Relaxed);
            cell.count.store(0, Ordering::Relaxed);
        }
    }

    /// Raw `(sum_r, sum_g, sum_b, count)` for one pixel.
    pub fn cell(&self, index: usize) -> Vec4 {
        let cell = &self.cells[index];
        Vec4::new(
            f32::from_bits(cell.r.load(Ordering::Relaxed)) as f64,
            f32::from_bits(cell.g.load(Ordering::Relaxed)) as f64,
            f32::from_bits(cell.b.load(Ordering::Relaxed)) as f64,
            cell.count.load(Ordering::Relaxed) as f64,
        )
    }

    /// Gamma-2 display conversion of one pixel. Unsampled pixels are black.
    pub fn srgb(&self, index: usize) -> (u8, u8, u8) {
        let cell = self.cell(index);
        if cell.w == 0.0 {
            return (0, 0, 0);
        }
        let mean = cell.rgb() / cell.w;
        let c = Color::new(mean.x.sqrt(), mean.y.sqrt(), mean.z.sqrt()).saturate();
        (
            (c.x * 255.99) as u8,
            (c.y * 255.99) as u8,
            (c.z * 255.99) as u8,
        )
    }

    /// Snapshot of the whole buffer in the frame-buffer protocol layout:
    /// contiguous row-major vec4s, (0, 0) at the bottom-left.
    pub fn snapshot(&self) -> Vec<Vec4> {
        (0..self.cells.len()).map(|i| self.cell(i)).collect()
    }
}

// ─── Progressive renderer ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub max_depth: u32,
    /// Worker count; 0 selects one per logical core.
    pub threads: usize,
    pub seed: u64,
}

impl RenderSettings {
    fn worker_count(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }
}

/// Timing summary a worker returns when it exits.
#[derive(Debug, Clone, Copy)]
pub struct WorkerReport {
    pub worker: usize,
    pub samples: u64,
    pub elapsed: Duration,
}

impl WorkerReport {
    /// Mean wall time for one pixel sample.
    pub fn average_sample_time(&self) -> Duration {
        if self.samples == 0 {
            Duration::ZERO
        } else {
            self.elapsed / self.samples as u32
        }
    }
}

/// The progressive sampler: owns the shared accumulator and a pool of
/// striped workers, and restarts them whenever the scene or camera changes.
///
/// Between restarts the workers hold immutable shares of the BVH and a
/// camera snapshot; the only mutable state they touch is their own pixel
/// stripe plus the two control flags.
pub struct Renderer {
    settings: RenderSettings,
    background: Background,
    accumulator: Arc<Accumulator>,
    quitting: Arc<AtomicBool>,
    moving: Arc<AtomicBool>,
    workers: Vec<JoinHandle<WorkerReport>>,
}

impl Renderer {
    pub fn new(settings: RenderSettings, background: Background) -> Self {
        Self {
            settings,
            background,
            accumulator: Arc::new(Accumulator::new(settings.width, settings.height)),
            quitting: Arc::new(AtomicBool::new(false)),
            moving: Arc::new(AtomicBool::new(false)),
            workers: Vec::new(),
        }
    }

    pub fn accumulator(&self) -> &Arc<Accumulator> {
        &self.accumulator
    }

    /// Marks the camera as in motion; workers drop back to epoch 1 so the
    /// image stays responsive while stale samples are displayed.
    pub fn set_moving(&self, moving: bool) {
        self.moving.store(moving, Ordering::Relaxed);
    }

    /// Full restart: join the pool, rebuild the BVH from the current scene,
    /// clear the buffer, respawn. Workers observe `quitting` between pixels,
    /// so the join latency is one pixel's worth of work per worker.
    pub fn restart(&mut self, world: &EntityList, camera: &Camera) -> Result<(), RenderError> {
        self.stop();
        self.launch(world, camera, None)
    }

    /// Bounded variant for profiling: every worker renders exactly
    /// `epochs` samples per pixel and exits.
    pub fn start_bounded(
        &mut self,
        world: &EntityList,
        camera: &Camera,
        epochs: u32,
    ) -> Result<(), RenderError> {
        self.stop();
        self.launch(world, camera, Some(epochs))
    }

    fn launch(
        &mut self,
        world: &EntityList,
        camera: &Camera,
        max_epochs: Option<u32>,
    ) -> Result<(), RenderError> {
        let mut rng = Pcg32::seed_from_u64(self.settings.seed);
        let bvh = Arc::new(BoundingVolume::new(world.clone(), &mut rng)?);
        let camera = Arc::new(camera.clone());

        self.accumulator.clear();
        self.quitting.store(false, Ordering::Relaxed);

        let workers = self.settings.worker_count();
        info!("starting {workers} render workers");
        for worker in 0..workers {
            let ctx = WorkerContext {
                worker,
                stride: workers,
                accumulator: Arc::clone(&self.accumulator),
                bvh: Arc::clone(&bvh),
                camera: Arc::clone(&camera),
                background: self.background,
                quitting: Arc::clone(&self.quitting),
                moving: Arc::clone(&self.moving),
                max_depth: self.settings.max_depth,
                max_epochs,
                seed: self.settings.seed,
            };
            let handle = thread::Builder::new()
                .name(format!("render-{worker}"))
                .spawn(move || worker_loop(ctx))?;
            self.workers.push(handle);
        }
        Ok(())
    }

    /// Cooperative shutdown: raise `quitting` and join everyone.
    pub fn stop(&mut self) -> Vec<WorkerReport> {
        if self.workers.is_empty() {
            return Vec::new();
        }
        self.quitting.store(true, Ordering::Relaxed);
        self.join()
    }

    /// Joins without signalling — used after a bounded run drains on its own.
    pub fn join(&mut self) -> Vec<WorkerReport> {
        let mut reports = Vec::with_capacity(self.workers.len());
        for handle in self.workers.drain(..) {
            match handle.join() {
                Ok(report) => {
                    debug!(
                        "worker {} exited after {} samples",
                        report.worker, report.samples
                    );
                    reports.push(report);
                }
                Err(_) => debug!("render worker panicked"),
            }
        }
        reports
    }

    pub fn is_running(&self) -> bool {
        !self.workers.is_empty()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.stop();
    }
}

// ─── Worker ─────────────────────────────────────────────────────────────────

struct WorkerContext {
    worker: usize,
    stride: usize,
    accumulator: Arc<Accumulator>,
    bvh: Arc<BoundingVolume>,
    camera: Arc<Camera>,
    background: Background,
    quitting: Arc<AtomicBool>,
    moving: Arc<AtomicBool>,
    max_depth: u32,
    max_epochs: Option<u32>,
    seed: u64,
}

/// Per-worker progressive loop. Worker `k` owns pixels `k, k + stride, …`;
/// one wrap of the cursor is one epoch, adding one fresh sample to each of
/// its pixels. The first epoch (including after a camera-motion reset)
/// replaces instead of accumulating.
fn worker_loop(ctx: WorkerContext) -> WorkerReport {
    // Distinct PCG stream per worker: same state seed, worker-id stream.
    let mut rng = Pcg32::new(ctx.seed, ctx.worker as u64);
    let width = ctx.accumulator.width() as usize;
    let height = ctx.accumulator.height() as usize;
    let pixels = ctx.accumulator.len();

    let started = Instant::now();
    let mut samples = 0u64;
    let mut cursor = ctx.worker;
    let mut epoch = 1u32;

    if cursor >= pixels {
        // More cores than pixels; nothing to own.
        return WorkerReport {
            worker: ctx.worker,
            samples: 0,
            elapsed: started.elapsed(),
        };
    }

    while !ctx.quitting.load(Ordering::Relaxed) {
        let x = cursor % width;
        let y = cursor / width;
        let u = (x as f64 + rng.gen::<f64>()) / width as f64;
        let v = (y as f64 + rng.gen::<f64>()) / height as f64;

        let ray = ctx.camera.ray(u, v, &mut rng);
        let color = cast(&ctx.bvh, &ctx.background, &ray, 0, ctx.max_depth, &mut rng);

        if epoch == 1 {
            ctx.accumulator.replace(cursor, color);
        } else {
            ctx.accumulator.accumulate(cursor, color, epoch);
        }
        samples += 1;

        cursor += ctx.stride;
        if cursor >= pixels {
            cursor = ctx.worker;
            if let Some(limit) = ctx.max_epochs {
                if epoch >= limit {
                    break;
                }
            }
            epoch += 1;
        }

        if ctx.moving.load(Ordering::Relaxed) {
            epoch = 1;
        }
    }

    WorkerReport {
        worker: ctx.worker,
        samples,
        elapsed: started.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::material::Material;
    use crate::math::Point3;
    use crate::texture::Texture;

    fn tiny_scene() -> (EntityList, Camera) {
        let mut world = EntityList::new();
        let gray = Arc::new(Material::diffuse(Some(Texture::solid(Color::new(
            0.5, 0.5, 0.5,
        )))));
        world.push(Entity::sphere(
            Point3::new(0.0, 1.0, 0.0),
            1.0,
            Some(gray.clone()),
        ));
        world.push(Entity::sphere(
            Point3::new(0.0, -1000.0, 0.0),
            1000.0,
            Some(gray),
        ));

        let mut camera = Camera::new(1.0);
        camera.look_at = Point3::new(0.0, 1.0, 0.0);
        camera.distance = 6.0;
        camera.yaw = 180.0;
        camera.pitch = -10.0;
        camera.fov = 30f64.to_radians();
        camera.update(0.0);
        (world, camera)
    }

    fn settings(width: u32, height: u32, threads: usize) -> RenderSettings {
        RenderSettings {
            width,
            height,
            max_depth: 8,
            threads,
            seed: 42,
        }
    }

    #[test]
    fn replace_then_accumulate_tracks_sums_and_counts() {
        let acc = Accumulator::new(4, 2);
        acc.replace(5, Color::new(0.5, 0.25, 1.0));
        acc.accumulate(5, Color::new(0.5, 0.25, 1.0), 2);
        acc.accumulate(5, Color::new(1.0, 0.5, 0.0), 3);
        let cell = acc.cell(5);
        assert_eq!(cell.w, 3.0);
        assert!((cell.x - 2.0).abs() < 1e-6);
        assert!((cell.y - 1.0).abs() < 1e-6);
        assert!((cell.z - 2.0).abs() < 1e-6);
    }

    #[test]
    fn replace_discards_previous_samples() {
        let acc = Accumulator::new(2, 2);
        acc.replace(0, Color::ones());
        acc.accumulate(0, Color::ones(), 2);
        acc.replace(0, Color::new(0.25, 0.25, 0.25));
        let cell = acc.cell(0);
        assert_eq!(cell.w, 1.0);
        assert!((cell.x - 0.25).abs() < 1e-6);
    }

    #[test]
    fn srgb_applies_gamma_and_clamp() {
        let acc = Accumulator::new(1, 1);
        acc.replace(0, Color::new(0.25, 1.0, 9.0));
        let (r, g, b) = acc.srgb(0);
        assert_eq!(r, (0.5 * 255.99) as u8);
        assert_eq!(g, 255);
        assert_eq!(b, 255);
        acc.clear();
        assert_eq!(acc.srgb(0), (0, 0, 0));
    }

    #[test]
    fn bounded_run_gives_every_pixel_exactly_n_samples() {
        let (world, camera) = tiny_scene();
        let mut renderer = Renderer::new(settings(16, 12, 3), Background::default());
        renderer
            .start_bounded(&world, &camera, 5)
            .expect("start workers");
        let reports = renderer.join();
        assert_eq!(reports.len(), 3);

        // The frame-buffer snapshot carries the same cells the display reads.
        let snapshot = renderer.accumulator().snapshot();
        assert_eq!(snapshot.len(), 16 * 12);
        for (i, cell) in snapshot.iter().enumerate() {
            assert_eq!(cell.w, 5.0, "pixel {i} has wrong sample count");
            assert!(cell.x >= 0.0 && cell.x.is_finite());
        }
        let total: u64 = reports.iter().map(|r| r.samples).sum();
        assert_eq!(total, 16 * 12 * 5);
    }

    #[test]
    fn restart_clears_stale_counts() {
        let (world, camera) = tiny_scene();
        let mut renderer = Renderer::new(settings(8, 8, 2), Background::default());
        renderer
            .start_bounded(&world, &camera, 4)
            .expect("start workers");
        renderer.join();

        // Immediately after a restart every count is 0 (cleared) or 1
        // (already resampled); stale counts above the first epoch may not
        // survive the boundary.
        renderer
            .start_bounded(&world, &camera, 1)
            .expect("restart workers");
        renderer.join();
        let acc = renderer.accumulator();
        for i in 0..acc.len() {
            let count = acc.cell(i).w;
            assert!(count == 0.0 || count == 1.0, "stale count {count} at {i}");
        }
    }

    #[test]
    fn stop_interrupts_an_unbounded_render() {
        let (world, camera) = tiny_scene();
        let mut renderer = Renderer::new(settings(32, 32, 2), Background::default());
        renderer.restart(&world, &camera).expect("start workers");
        assert!(renderer.is_running());
        std::thread::sleep(Duration::from_millis(50));
        let reports = renderer.stop();
        assert!(!renderer.is_running());
        assert!(reports.iter().any(|r| r.samples > 0));
    }

    #[test]
    fn lit_face_of_a_cornell_box_outshines_the_walls() {
        // Closed box: floor, back wall, two side walls, bright ceiling
        // light, diffuse block in the middle. After a progressive run the
        // pixels straight under the light read brighter than wall pixels.
        let mut world = EntityList::new();
        let white = Arc::new(Material::diffuse(Some(Texture::solid(Color::new(
            0.73, 0.73, 0.73,
        )))));
        let light = Arc::new(Material::diffuse_light(
            Some(Texture::solid(Color::ones())),
            15.0,
        ));

        world.push(Entity::rect_xz(
            Point3::new(0.0, 0.0, 0.0),
            4.0,
            4.0,
            Some(white.clone()),
        ));
        world.push(Entity::rect_xy(
            Point3::new(0.0, 2.0, -2.0),
            4.0,
            4.0,
            Some(white.clone()),
        ));
        world.push(Entity::rect_yz(
            Point3::new(-2.0, 2.0, 0.0),
            4.0,
            4.0,
            Some(white.clone()),
        ));
        world.push(Entity::flipped(Entity::rect_yz(
            Point3::new(2.0, 2.0, 0.0),
            4.0,
            4.0,
            Some(white.clone()),
        )));
        world.push(Entity::flipped(Entity::rect_xz(
            Point3::new(0.0, 3.99, 0.0),
            1.5,
            1.5,
            Some(light),
        )));
        world.push(Entity::cuboid(
            Point3::new(0.0, 0.6, 0.0),
            1.2,
            1.2,
            1.2,
            Some(white),
        ));

        let mut camera = Camera::new(1.0);
        camera.look_at = Point3::new(0.0, 1.2, 0.0);
        camera.distance = 3.6;
        camera.yaw = 180.0;
        camera.pitch = -20.0;
        camera.fov = 60f64.to_radians();
        camera.update(0.0);

        let mut renderer = Renderer::new(
            RenderSettings {
                width: 24,
                height: 24,
                max_depth: 8,
                threads: 2,
                seed: 7,
            },
            Background::black(),
        );
        renderer
            .start_bounded(&world, &camera, 48)
            .expect("start workers");
        renderer.join();

        let acc = renderer.accumulator();
        let mean = |x0: usize, x1: usize, y0: usize, y1: usize| {
            let mut sum = 0.0;
            let mut n = 0.0;
            for y in y0..y1 {
                for x in x0..x1 {
                    let cell = acc.cell(y * 24 + x);
                    sum += (cell.x + cell.y + cell.z) / (3.0 * cell.w.max(1.0));
                    n += 1.0;
                }
            }
            sum / n
        };
        // Top of the block (facing the light) versus a patch of side wall.
        let top_face = mean(10, 14, 11, 14);
        let side_wall = mean(1, 4, 8, 14);
        assert!(
            top_face > side_wall,
            "lit face {top_face} not brighter than wall {side_wall}"
        );
    }
}
