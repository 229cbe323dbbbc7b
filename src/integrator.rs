use crate::bvh::BoundingVolume;
use crate::math::{Color, Ray};
use rand::Rng;

/// Scattered rays below this bounce count keep recursing; beyond it the
/// path is cut and only emission survives.
pub const MAX_DEPTH: u32 = 50;

/// Epsilon on the near clip of every cast. Skips self-intersection at the
/// origin of a scattered ray.
const T_MIN: f64 = 0.001;

/// Vertical gradient returned for rays that escape the scene.
#[derive(Debug, Clone, Copy)]
pub struct Background {
    pub bottom: Color,
    pub top: Color,
}

impl Background {
    pub const fn new(bottom: Color, top: Color) -> Self {
        Self { bottom, top }
    }

    /// Black in both directions — for enclosed scenes lit by area lights.
    pub const fn black() -> Self {
        Self::new(Color::zero(), Color::zero())
    }

    pub fn sample(&self, ray: &Ray) -> Color {
        let unit_direction = ray.direction.normalized();
        let t = 0.5 * (unit_direction.y + 1.0);
        self.bottom.lerp(self.top, t)
    }
}

impl Default for Background {
    /// The familiar white-to-sky-blue daylight gradient.
    fn default() -> Self {
        Self::new(Color::ones(), Color::new(0.5, 0.7, 1.0))
    }
}

/// Casts one ray into the scene and returns the radiance it gathers.
///
/// Total over its whole domain: every numerical edge case inside is
/// absorbed as either a miss or a non-scatter, never an error.
pub fn cast(
    bvh: &BoundingVolume,
    background: &Background,
    ray: &Ray,
    depth: u32,
    max_depth: u32,
    rng: &mut impl Rng,
) -> Color {
    let Some(hit) = bvh.hit(ray, T_MIN, f64::INFINITY) else {
        return background.sample(ray);
    };

    let emitted = hit
        .material
        .map_or(Color::zero(), |m| m.emitted(hit.u, hit.v, hit.p));

    if depth < max_depth {
        if let Some(material) = hit.material {
            if let Some((attenuation, scattered)) = material.scatter(ray, &hit, rng) {
                return emitted
                    + attenuation * cast(bvh, background, &scattered, depth + 1, max_depth, rng);
            }
        }
    }

    emitted
}
