use crate::math::Vec3;
use rand::Rng;

const POINT_COUNT: usize = 256;

/// Gradient-lattice Perlin noise.
///
/// Holds 256 precomputed unit gradients and one shuffled permutation table
/// per axis. A lattice cell's gradient is selected by XOR-ing the three
/// permuted axis indices, so a single small table serves the whole lattice.
#[derive(Debug, Clone)]
pub struct Perlin {
    gradients: Vec<Vec3>,
    permute_x: Vec<usize>,
    permute_y: Vec<usize>,
    permute_z: Vec<usize>,
}

impl Perlin {
    pub fn new(rng: &mut impl Rng) -> Self {
        Self {
            gradients: generate_gradients(rng),
            permute_x: generate_permutation(rng),
            permute_y: generate_permutation(rng),
            permute_z: generate_permutation(rng),
        }
    }

    /// Signed noise value at `p`, roughly in [-1, 1].
    pub fn noise(&self, p: Vec3) -> f64 {
        let i = p.x.floor() as i64;
        let j = p.y.floor() as i64;
        let k = p.z.floor() as i64;

        // Fractional position inside the lattice cell.
        let tx = p.x - i as f64;
        let ty = p.y - j as f64;
        let tz = p.z - k as f64;

        let mut grid = [[[Vec3::zero(); 2]; 2]; 2];
        for (di, plane) in grid.iter_mut().enumerate() {
            for (dj, row) in plane.iter_mut().enumerate() {
                for (dk, cell) in row.iter_mut().enumerate() {
                    let gx = self.permute_x[((i + di as i64) & 255) as usize];
                    let gy = self.permute_y[((j + dj as i64) & 255) as usize];
                    let gz = self.permute_z[((k + dk as i64) & 255) as usize];
                    *cell = self.gradients[gx ^ gy ^ gz];
                }
            }
        }

        interpolate(&grid, tx, ty, tz)
    }

    /// Multi-octave turbulence: the absolute value of a sum of noise octaves,
    /// each scaled by the running amplitude and frequency factors.
    #[allow(clippy::too_many_arguments)]
    pub fn turbulence(
        &self,
        p: Vec3,
        mut amplitude: f64,
        mut frequency: f64,
        amplitude_multiplier: f64,
        frequency_multiplier: f64,
        offset: Vec3,
        depth: u32,
    ) -> f64 {
        let mut sum = 0.0;
        for _ in 0..depth {
            sum += amplitude * self.noise(p * frequency + offset);
            amplitude *= amplitude_multiplier;
            frequency *= frequency_multiplier;
        }
        sum.abs()
    }
}

/// Unit gradients distributed uniformly over the sphere.
fn generate_gradients(rng: &mut impl Rng) -> Vec<Vec3> {
    (0..POINT_COUNT)
        .map(|_| {
            let theta = (2.0 * rng.gen::<f64>() - 1.0).acos();
            let phi = 2.0 * rng.gen::<f64>() * std::f64::consts::PI;
            Vec3::new(
                phi.cos() * theta.sin(),
                phi.sin() * theta.sin(),
                theta.cos(),
            )
            .normalized()
        })
        .collect()
}

/// A Fisher-Yates-shuffled table of the indices 0..256.
fn generate_permutation(rng: &mut impl Rng) -> Vec<usize> {
    let mut table: Vec<usize> = (0..POINT_COUNT).collect();
    for i in (1..POINT_COUNT).rev() {
        let target = rng.gen_range(0..=i);
        table.swap(i, target);
    }
    table
}

/// Hermite cubic 3t² - 2t³.
#[inline(always)]
fn smoothstep(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

/// Trilinear interpolation of the eight corner gradients, each weighted by
/// its smoothstepped distance and dotted with the offset to the corner.
fn interpolate(grid: &[[[Vec3; 2]; 2]; 2], tx: f64, ty: f64, tz: f64) -> f64 {
    let u = smoothstep(tx);
    let v = smoothstep(ty);
    let w = smoothstep(tz);

    let mut accum = 0.0;
    for i in 0..2 {
        for j in 0..2 {
            for k in 0..2 {
                let weight = Vec3::new(tx - i as f64, ty - j as f64, tz - k as f64);
                let fi = i as f64;
                let fj = j as f64;
                let fk = k as f64;
                accum += (fi * u + (1.0 - fi) * (1.0 - u))
                    * (fj * v + (1.0 - fj) * (1.0 - v))
                    * (fk * w + (1.0 - fk) * (1.0 - w))
                    * grid[i][j][k].dot(weight);
            }
        }
    }
    accum
}
