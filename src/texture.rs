use crate::math::{Color, Vec3};
use crate::perlin::Perlin;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use std::path::{Path, PathBuf};

/// Seed for the shared noise tables. Every noise texture samples the same
/// lattice, so saved scenes look identical from run to run.
const NOISE_TABLE_SEED: u64 = 0x9e3779b97f4a7c15;

// ─── Texture ────────────────────────────────────────────────────────────────

/// A sampled RGB color field over `(u, v, p)`.
#[derive(Debug, Clone)]
pub enum Texture {
    /// Constant color everywhere.
    Solid { color: Color },
    /// Two colors selected by the sign of sin(ωx)·sin(ωy)·sin(ωz).
    Checker {
        frequency: f64,
        odd: Color,
        even: Color,
    },
    /// Perlin-turbulence procedural patterns.
    Noise(NoiseTexture),
    /// Nearest-pixel lookup into a decoded image.
    Image(ImageTexture),
}

impl Texture {
    pub fn solid(color: Color) -> Self {
        Texture::Solid { color }
    }

    pub fn checker(frequency: f64, odd: Color, even: Color) -> Self {
        Texture::Checker {
            frequency,
            odd,
            even,
        }
    }

    pub fn sample(&self, u: f64, v: f64, p: Vec3) -> Color {
        match self {
            Texture::Solid { color } => *color,
            Texture::Checker {
                frequency,
                odd,
                even,
            } => {
                let sines =
                    (frequency * p.x).sin() * (frequency * p.y).sin() * (frequency * p.z).sin();
                if sines < 0.0 {
                    *odd
                } else {
                    *even
                }
            }
            Texture::Noise(noise) => noise.sample(p),
            Texture::Image(img) => img.sample(u, v),
        }
    }

    /// Wire code used by the scene text format. Declaration order with a
    /// zero start sentinel.
    pub fn type_code(&self) -> u32 {
        match self {
            Texture::Solid { .. } => 1,
            Texture::Checker { .. } => 2,
            Texture::Noise(_) => 3,
            Texture::Image(_) => 4,
        }
    }
}

// ─── Noise texture ──────────────────────────────────────────────────────────

/// How the turbulence field is shaped into a color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseMode {
    /// Raw turbulence remapped to [0, 1].
    Normal,
    /// Sine-banded turbulence along z — veined, marble-like.
    Marble,
    /// Fractional part of the turbulence — concentric ring bands.
    Wood,
}

impl NoiseMode {
    pub fn type_code(self) -> u32 {
        match self {
            NoiseMode::Normal => 0,
            NoiseMode::Marble => 1,
            NoiseMode::Wood => 2,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(NoiseMode::Normal),
            1 => Some(NoiseMode::Marble),
            2 => Some(NoiseMode::Wood),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NoiseTexture {
    pub color: Color,
    pub mode: NoiseMode,
    pub amplitude: f64,
    pub frequency: f64,
    pub amplitude_multiplier: f64,
    pub frequency_multiplier: f64,
    pub offset: Vec3,
    pub depth: u32,
    pub marble_amplitude: f64,
    pub marble_frequency: f64,
    perlin: Perlin,
}

impl NoiseTexture {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        color: Color,
        mode: NoiseMode,
        amplitude: f64,
        frequency: f64,
        amplitude_multiplier: f64,
        frequency_multiplier: f64,
        offset: Vec3,
        depth: u32,
        marble_amplitude: f64,
        marble_frequency: f64,
    ) -> Self {
        Self {
            color,
            mode,
            amplitude,
            frequency,
            amplitude_multiplier,
            frequency_multiplier,
            offset,
            depth,
            marble_amplitude,
            marble_frequency,
            perlin: Perlin::new(&mut Pcg32::seed_from_u64(NOISE_TABLE_SEED)),
        }
    }

    /// A marble texture with the customary octave cascade.
    pub fn marble(color: Color, frequency: f64) -> Self {
        Self::new(
            color,
            NoiseMode::Marble,
            1.0,
            frequency,
            0.5,
            2.0,
            Vec3::zero(),
            7,
            1.0,
            10.0,
        )
    }

    pub fn sample(&self, p: Vec3) -> Color {
        let turbulence = self.perlin.turbulence(
            p,
            self.amplitude,
            self.frequency,
            self.amplitude_multiplier,
            self.frequency_multiplier,
            self.offset,
            self.depth,
        );
        match self.mode {
            NoiseMode::Normal => self.color * 0.5 * (1.0 + turbulence),
            NoiseMode::Marble => {
                self.color
                    * 0.5
                    * (1.0
                        + self.marble_amplitude
                            * (p.z + self.marble_frequency * turbulence).sin())
            }
            NoiseMode::Wood => self.color * 0.5 * (1.0 + turbulence.fract()),
        }
    }
}

// ─── Image texture ──────────────────────────────────────────────────────────

/// RGBA8 pixels decoded once at scene build; sampled nearest-neighbor with
/// the v axis flipped so v = 0 lands on the bottom row.
#[derive(Debug, Clone)]
pub struct ImageTexture {
    pub path: PathBuf,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl ImageTexture {
    pub fn load(path: &Path) -> Result<Self, image::ImageError> {
        let decoded = image::open(path)?.to_rgba8();
        let (width, height) = decoded.dimensions();
        Ok(Self::from_rgba8(
            path.to_path_buf(),
            width,
            height,
            decoded.into_raw(),
        ))
    }

    /// Builds a texture from raw RGBA8 bytes, row-major from the top row.
    pub fn from_rgba8(path: PathBuf, width: u32, height: u32, data: Vec<u8>) -> Self {
        assert_eq!(data.len(), (width * height * 4) as usize);
        Self {
            path,
            width,
            height,
            data,
        }
    }

    pub fn sample(&self, u: f64, v: f64) -> Color {
        let i = (u * self.width as f64).clamp(0.0, self.width as f64 - 1.0) as u32;
        let j = ((1.0 - v) * self.height as f64 - 0.001).clamp(0.0, self.height as f64 - 1.0) as u32;
        let at = ((j * self.width + i) * 4) as usize;
        Color::new(
            self.data[at] as f64 / 255.0,
            self.data[at + 1] as f64 / 255.0,
            self.data[at + 2] as f64 / 255.0,
        )
    }
}
