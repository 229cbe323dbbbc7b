//! # lumen-cli
//!
//! An interactive, progressively refining Monte-Carlo path tracer for the
//! terminal. A pool of worker threads shoots one ray per pixel per epoch
//! into a BVH-accelerated analytic scene, accumulating radiance into a
//! shared HDR buffer that the display tone-maps a few times per second.
//! Orbiting or zooming the camera restarts the pool, so the image sharpens
//! whenever the view rests.
//!
//! Scenes are spheres, axis rectangles, and boxes carrying diffuse, metal,
//! dielectric, or emissive materials with solid, checker, Perlin-noise, or
//! image textures. Scenes round-trip through a plain-text format in
//! `scenes/`, and `--profile` renders a fixed sample count headless and
//! reports per-worker timings.

mod bvh;
mod camera;
mod display;
mod entity;
mod integrator;
mod material;
mod math;
mod perlin;
mod presets;
mod sampler;
mod scene;
mod texture;

use anyhow::{bail, Context};
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use log::{info, warn};
use presets::ScenePreset;
use sampler::{RenderSettings, Renderer};
use scene::Scene;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const SCENES_DIR: &str = "scenes";
const SCREENSHOTS_DIR: &str = "screenshots";

/// Degrees of orbit per arrow-key press.
const ORBIT_STEP: f64 = 4.0;
/// Zoom impulse per key press.
const ZOOM_STEP: f64 = 1.5;
/// How often the accumulator is presented.
const REDRAW_INTERVAL: Duration = Duration::from_millis(200);

/// lumen-cli — a progressive path tracer in your terminal
#[derive(Parser, Debug)]
#[command(
    name = "lumen-cli",
    version,
    about = "An interactive progressive path tracer for the terminal",
    long_about = "Renders analytic scenes with Monte-Carlo path tracing, refining \
                  the image continuously. Orbit with the arrow keys, zoom with +/-, \
                  press s for a PPM screenshot, w to save the scene, q to quit.",
    after_help = "EXAMPLES:\n  \
                  lumen-cli --preset cornell\n  \
                  lumen-cli --scene scenes/three-spheres.txt --width 200 --height 100\n  \
                  lumen-cli --profile spheres --samples 16"
)]
struct Cli {
    /// Render a fixed number of samples for the named scene, print
    /// per-worker average sample times to stderr, and exit
    #[arg(long, value_name = "SCENE")]
    profile: Option<String>,

    /// Scene file to load instead of a built-in preset
    #[arg(short, long)]
    scene: Option<PathBuf>,

    /// Built-in scene preset
    #[arg(short, long, value_enum, default_value_t = ScenePreset::Spheres)]
    preset: ScenePreset,

    /// Image width in pixels
    #[arg(short = 'W', long, default_value_t = 160)]
    width: u32,

    /// Image height in pixels (two pixels per terminal row)
    #[arg(short = 'H', long, default_value_t = 90)]
    height: u32,

    /// Samples per pixel rendered by --profile
    #[arg(long, default_value_t = 32)]
    samples: u32,

    /// Maximum ray bounce depth
    #[arg(long, default_value_t = integrator::MAX_DEPTH)]
    bounces: u32,

    /// Worker thread count (0 = one per logical core)
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Base RNG seed for the sampler
    #[arg(long, default_value_t = 0x853c49e6748fea9b)]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let aspect = cli.width as f64 / cli.height as f64;
    let settings = RenderSettings {
        width: cli.width,
        height: cli.height,
        max_depth: cli.bounces,
        threads: cli.threads,
        seed: cli.seed,
    };

    if let Some(name) = &cli.profile {
        let scene = resolve_profile_scene(name, aspect)?;
        return run_profile(scene, settings, cli.samples);
    }

    let scene = match &cli.scene {
        Some(path) => Scene::load(path, aspect)
            .with_context(|| format!("loading scene {}", path.display()))?,
        None => cli.preset.build(aspect),
    };
    run_interactive(scene, settings)
}

/// A profile target is either a file in `scenes/` or a preset name.
fn resolve_profile_scene(name: &str, aspect: f64) -> anyhow::Result<Scene> {
    let path = Path::new(SCENES_DIR).join(format!("{name}.txt"));
    if path.exists() {
        return Scene::load(&path, aspect)
            .with_context(|| format!("loading scene {}", path.display()));
    }
    if let Some(preset) = ScenePreset::by_name(name) {
        return Ok(preset.build(aspect));
    }
    bail!(
        "no scene named {name:?}: neither {} nor a built-in preset",
        path.display()
    );
}

/// Headless profiling run: every worker renders exactly `samples` epochs,
/// then the per-worker averages go to stderr.
fn run_profile(scene: Scene, settings: RenderSettings, samples: u32) -> anyhow::Result<()> {
    let mut renderer = Renderer::new(settings, scene.background);
    let started = Instant::now();
    renderer.start_bounded(&scene.world, &scene.camera, samples)?;
    let mut reports = renderer.join();
    reports.sort_by_key(|r| r.worker);

    eprintln!(
        "profile: {}x{} at {} spp on {} workers in {:.2}s",
        settings.width,
        settings.height,
        samples,
        reports.len(),
        started.elapsed().as_secs_f64()
    );
    for report in &reports {
        eprintln!(
            "  worker {:>2}: {:>9} samples, {:>8.2} µs/sample",
            report.worker,
            report.samples,
            report.average_sample_time().as_secs_f64() * 1e6
        );
    }
    Ok(())
}

fn run_interactive(mut scene: Scene, settings: RenderSettings) -> anyhow::Result<()> {
    let mut renderer = Renderer::new(settings, scene.background);
    renderer.restart(&scene.world, &scene.camera)?;

    let session = display::TerminalSession::enter().context("initializing the terminal")?;
    let mut out = io::BufWriter::new(io::stdout());
    let status_row = settings.height as u16 / 2;

    let mut last_frame = Instant::now();
    let mut last_redraw = Instant::now() - REDRAW_INTERVAL;
    let mut status = String::from("arrows orbit · +/- zoom · s screenshot · w save · q quit");

    loop {
        let dt = last_frame.elapsed().as_secs_f64();
        last_frame = Instant::now();

        let mut camera_changed = false;
        if event::poll(Duration::from_millis(33))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break,
                    KeyCode::Left => {
                        scene.camera.orbit(-ORBIT_STEP, 0.0);
                        camera_changed = true;
                    }
                    KeyCode::Right => {
                        scene.camera.orbit(ORBIT_STEP, 0.0);
                        camera_changed = true;
                    }
                    KeyCode::Up => {
                        scene.camera.orbit(0.0, ORBIT_STEP);
                        camera_changed = true;
                    }
                    KeyCode::Down => {
                        scene.camera.orbit(0.0, -ORBIT_STEP);
                        camera_changed = true;
                    }
                    KeyCode::Char('+') | KeyCode::Char('=') => {
                        scene.camera.zoom(-ZOOM_STEP);
                        camera_changed = true;
                    }
                    KeyCode::Char('-') => {
                        scene.camera.zoom(ZOOM_STEP);
                        camera_changed = true;
                    }
                    KeyCode::Char('s') => {
                        status = take_screenshot(renderer.accumulator());
                    }
                    KeyCode::Char('w') => {
                        status = save_scene(&scene);
                    }
                    KeyCode::Char('r') => {
                        renderer.restart(&scene.world, &scene.camera)?;
                        status = "render restarted".into();
                    }
                    _ => {}
                },
                Event::Resize(..) => {
                    last_redraw = Instant::now() - REDRAW_INTERVAL;
                }
                _ => {}
            }
        }

        // Coasting zoom keeps the camera in motion for a few frames after
        // the last key press.
        if camera_changed || scene.camera.is_coasting() {
            renderer.set_moving(true);
            scene.camera.update(dt);
            renderer.restart(&scene.world, &scene.camera)?;
            renderer.set_moving(false);
            status = format!(
                "yaw {:.0}° · pitch {:.0}° · distance {:.1} · eye {}",
                scene.camera.yaw,
                scene.camera.pitch,
                scene.camera.distance,
                scene.camera.origin()
            );
        }

        if last_redraw.elapsed() >= REDRAW_INTERVAL {
            last_redraw = Instant::now();
            if let Err(e) = display::draw(renderer.accumulator(), &mut out) {
                warn!("display write failed: {e}");
            }
            if let Err(e) = display::draw_status(&mut out, status_row, &status) {
                warn!("status write failed: {e}");
            }
            let _ = out.flush();
        }
    }

    if renderer.is_running() {
        renderer.stop();
    }
    drop(session);
    info!("shutting down");
    Ok(())
}

fn take_screenshot(accumulator: &std::sync::Arc<sampler::Accumulator>) -> String {
    match display::next_screenshot_path(Path::new(SCREENSHOTS_DIR))
        .and_then(|path| display::write_ppm(accumulator, &path).map(|()| path))
    {
        Ok(path) => {
            info!("screenshot saved to {}", path.display());
            format!("screenshot saved to {}", path.display())
        }
        Err(e) => {
            warn!("screenshot failed: {e}");
            format!("screenshot failed: {e}")
        }
    }
}

fn save_scene(scene: &Scene) -> String {
    let save = |path: &Path| -> anyhow::Result<()> {
        std::fs::create_dir_all(SCENES_DIR)?;
        scene.save(path)?;
        Ok(())
    };
    let path = Path::new(SCENES_DIR).join("saved.txt");
    match save(&path) {
        Ok(()) => {
            info!("scene saved to {}", path.display());
            format!("scene saved to {}", path.display())
        }
        Err(e) => {
            warn!("scene save failed: {e}");
            format!("scene save failed: {e}")
        }
    }
}
