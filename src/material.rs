use crate::entity::Hit;
use crate::math::{random_in_unit_sphere, reflect, refract, schlick, Color, Ray, Vec3};
use crate::texture::Texture;
use rand::Rng;

/// Surface response model. `scatter` decides stochastically where an
/// incident photon goes next and how much of each channel survives;
/// `emitted` adds any radiance the surface produces on its own.
///
/// Closed set of variants dispatched by match — the contract is fixed, and
/// the scene format addresses materials by declaration-order code.
#[derive(Debug, Clone)]
pub enum Material {
    /// Lambertian-style diffuse: bounce toward a random point in the unit
    /// sphere above the hit.
    Diffuse { texture: Option<Texture> },
    /// Specular reflection with an optional fuzz perturbation.
    Metal {
        texture: Option<Texture>,
        fuzziness: f64,
    },
    /// Glass-like interface: Schlick-weighted choice between reflection
    /// and refraction.
    Dielectric {
        texture: Option<Texture>,
        refractive_index: f64,
    },
    /// Area light: emits, never scatters.
    DiffuseLight {
        texture: Option<Texture>,
        power: f64,
    },
}

impl Material {
    pub fn diffuse(texture: Option<Texture>) -> Self {
        Material::Diffuse { texture }
    }

    pub fn metal(texture: Option<Texture>, fuzziness: f64) -> Self {
        Material::Metal {
            texture,
            fuzziness: fuzziness.clamp(0.0, 1.0),
        }
    }

    pub fn dielectric(texture: Option<Texture>, refractive_index: f64) -> Self {
        Material::Dielectric {
            texture,
            refractive_index: refractive_index.clamp(1.0, 3.0),
        }
    }

    pub fn diffuse_light(texture: Option<Texture>, power: f64) -> Self {
        Material::DiffuseLight { texture, power }
    }

    pub fn texture(&self) -> Option<&Texture> {
        match self {
            Material::Diffuse { texture }
            | Material::Metal { texture, .. }
            | Material::Dielectric { texture, .. }
            | Material::DiffuseLight { texture, .. } => texture.as_ref(),
        }
    }

    /// Attenuation at the hit: the texture sample, or white when untextured.
    fn albedo(&self, hit: &Hit) -> Color {
        self.texture()
            .map_or(Color::ones(), |t| t.sample(hit.u, hit.v, hit.p))
    }

    /// Scatters the incident ray at `hit`. `None` means the photon is
    /// absorbed: metal reflecting below the horizon, or a degenerate
    /// zero-length scatter direction.
    pub fn scatter(&self, ray: &Ray, hit: &Hit, rng: &mut impl Rng) -> Option<(Color, Ray)> {
        match self {
            Material::Diffuse { .. } => {
                let target = hit.p + hit.normal + random_in_unit_sphere(rng);
                let direction = target - hit.p;
                if direction.near_zero() {
                    return None;
                }
                Some((self.albedo(hit), Ray::new(hit.p, direction)))
            }
            Material::Metal { fuzziness, .. } => {
                let reflected = reflect(ray.direction, hit.normal);
                let direction = if *fuzziness > 0.0 {
                    reflected + random_in_unit_sphere(rng) * *fuzziness
                } else {
                    reflected
                };
                let scattered = Ray::new(hit.p, direction);
                if scattered.direction.dot(hit.normal) > 0.0 {
                    Some((self.albedo(hit), scattered))
                } else {
                    None
                }
            }
            Material::Dielectric {
                refractive_index, ..
            } => {
                let reflected = reflect(ray.direction, hit.normal);
                let r_dot_n = ray.direction.normalized().dot(hit.normal);

                // Entering or leaving the medium decides which way the
                // interface normal faces and which ratio Snell gets.
                let (outward_normal, refraction_ratio, cosine) = if r_dot_n > 0.0 {
                    (-hit.normal, *refractive_index, r_dot_n)
                } else {
                    (hit.normal, 1.0 / refractive_index, -r_dot_n)
                };

                let direction = match refract(ray.direction, outward_normal, refraction_ratio) {
                    Some(refracted)
                        if rng.gen::<f64>() >= schlick(cosine, *refractive_index) =>
                    {
                        refracted
                    }
                    // Total internal reflection, or the Fresnel coin flip
                    // chose the mirror path.
                    _ => reflected,
                };
                Some((self.albedo(hit), Ray::new(hit.p, direction)))
            }
            Material::DiffuseLight { .. } => None,
        }
    }

    /// Emitted radiance at the hit. Zero for everything but lights.
    pub fn emitted(&self, u: f64, v: f64, p: Vec3) -> Color {
        match self {
            Material::DiffuseLight { texture, power } => {
                let base = texture
                    .as_ref()
                    .map_or(Color::ones(), |t| t.sample(u, v, p));
                base * *power
            }
            _ => Color::zero(),
        }
    }

    /// Wire code used by the scene text format.
    pub fn type_code(&self) -> u32 {
        match self {
            Material::Diffuse { .. } => 1,
            Material::Metal { .. } => 2,
            Material::Dielectric { .. } => 3,
            Material::DiffuseLight { .. } => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn rng() -> Pcg32 {
        Pcg32::seed_from_u64(99)
    }

    fn hit_at_origin(normal: Vec3) -> Hit<'static> {
        Hit {
            t: 1.0,
            p: Vec3::zero(),
            normal,
            u: 0.0,
            v: 0.0,
            material: None,
        }
    }

    #[test]
    fn diffuse_scatters_into_upper_hemisphere() {
        let m = Material::diffuse(Some(Texture::solid(Color::new(0.5, 0.5, 0.5))));
        let hit = hit_at_origin(Vec3::unit_y());
        let ray = Ray::new(Vec3::new(0.0, 1.0, -1.0), Vec3::new(0.0, -1.0, 1.0));
        let mut r = rng();
        for _ in 0..128 {
            let (attenuation, scattered) = m.scatter(&ray, &hit, &mut r).expect("diffuse scatters");
            assert_eq!(attenuation, Color::new(0.5, 0.5, 0.5));
            // target = p + n + unit-sphere point keeps the direction within
            // one unit of the normal tip, so it cannot dip below -0 on y by
            // more than the sphere radius allows.
            assert!(scattered.direction.y > -1.0);
            assert_eq!(scattered.origin, hit.p);
        }
    }

    #[test]
    fn polished_metal_reflects_exactly() {
        let m = Material::metal(Some(Texture::solid(Color::ones())), 0.0);
        let hit = hit_at_origin(Vec3::unit_y());
        let ray = Ray::new(Vec3::new(-1.0, 1.0, 0.0), Vec3::new(1.0, -1.0, 0.0));
        let (_, scattered) = m.scatter(&ray, &hit, &mut rng()).expect("metal reflects");
        assert_relative_eq!(scattered.direction.x, 1.0);
        assert_relative_eq!(scattered.direction.y, 1.0);
        assert_relative_eq!(scattered.direction.z, 0.0);
    }

    #[test]
    fn metal_absorbs_below_horizon_reflections() {
        let m = Material::metal(None, 1.0);
        let hit = hit_at_origin(Vec3::unit_y());
        // Grazing incidence plus full fuzz can push the scattered ray under
        // the surface; those must come back as absorption, never as a ray.
        let ray = Ray::new(Vec3::new(-10.0, 0.001, 0.0), Vec3::new(10.0, -0.001, 0.0));
        let mut r = rng();
        let mut absorbed = 0;
        for _ in 0..256 {
            match m.scatter(&ray, &hit, &mut r) {
                Some((_, scattered)) => assert!(scattered.direction.dot(hit.normal) > 0.0),
                None => absorbed += 1,
            }
        }
        assert!(absorbed > 0);
    }

    #[test]
    fn fuzziness_is_clamped_to_one() {
        match Material::metal(None, 4.2) {
            Material::Metal { fuzziness, .. } => assert_eq!(fuzziness, 1.0),
            _ => unreachable!(),
        }
    }

    #[test]
    fn dielectric_index_is_clamped_to_physical_range() {
        match Material::dielectric(None, 0.2) {
            Material::Dielectric {
                refractive_index, ..
            } => assert_eq!(refractive_index, 1.0),
            _ => unreachable!(),
        }
    }

    #[test]
    fn dielectric_total_internal_reflection_is_a_pure_mirror() {
        let m = Material::dielectric(None, 1.5);
        // Leaving the glass at a grazing angle: r·n > 0 selects the inside
        // branch and the refraction discriminant goes negative.
        let hit = hit_at_origin(Vec3::unit_y());
        let incident = Vec3::new(1.0, 0.05, 0.0);
        let ray = Ray::new(Vec3::new(-1.0, -0.05, 0.0), incident);
        let mut r = rng();
        for _ in 0..64 {
            let (attenuation, scattered) =
                m.scatter(&ray, &hit, &mut r).expect("dielectric always scatters");
            assert_eq!(attenuation, Color::ones());
            let mirror = reflect(incident, hit.normal);
            assert_eq!(scattered.direction, mirror);
        }
    }

    #[test]
    fn dielectric_refracts_head_on_rays() {
        let m = Material::dielectric(None, 1.5);
        let hit = hit_at_origin(Vec3::unit_y());
        // Straight down the normal: Schlick reflectance is r0 = 0.04, so
        // nearly every sample refracts, and the refracted direction is the
        // continuation of the incident one.
        let ray = Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, -1.0, 0.0));
        let mut r = rng();
        let mut refracted = 0;
        for _ in 0..256 {
            let (_, scattered) = m.scatter(&ray, &hit, &mut r).expect("scatters");
            if scattered.direction.y < 0.0 {
                refracted += 1;
                assert_relative_eq!(scattered.direction.x, 0.0, epsilon = 1e-12);
                assert_relative_eq!(scattered.direction.z, 0.0, epsilon = 1e-12);
            }
        }
        assert!(refracted > 200);
    }

    #[test]
    fn light_emits_and_never_scatters() {
        let m = Material::diffuse_light(Some(Texture::solid(Color::new(1.0, 0.5, 0.25))), 4.0);
        let hit = hit_at_origin(Vec3::unit_y());
        let ray = Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, -1.0, 0.0));
        assert!(m.scatter(&ray, &hit, &mut rng()).is_none());
        assert_eq!(m.emitted(0.0, 0.0, Vec3::zero()), Color::new(4.0, 2.0, 1.0));
    }

    #[test]
    fn non_emissive_materials_emit_black() {
        let m = Material::diffuse(None);
        assert_eq!(m.emitted(0.3, 0.7, Vec3::ones()), Color::zero());
    }
}
