use crate::camera::Camera;
use crate::entity::{Entity, EntityList};
use crate::integrator::Background;
use crate::material::Material;
use crate::math::{Color, Point3, Vec3};
use crate::scene::Scene;
use crate::texture::{NoiseTexture, Texture};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use std::sync::Arc;

/// Seed for the randomized sphere field, fixed so the demo is identical on
/// every run.
const FIELD_SEED: u64 = 2024;

/// Built-in demo scenes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ScenePreset {
    /// Three matte spheres on a dark ground plane.
    Diffuse,
    /// Mirror and brushed-metal spheres flanking a matte one.
    Metal,
    /// A glass sphere between two matte ones.
    Glass,
    /// The classic random field of small spheres around three hero spheres.
    Spheres,
    /// Enclosed box with a ceiling light and a matte block.
    Cornell,
    /// Marble, wood, and checker procedural textures side by side.
    Textured,
}

impl ScenePreset {
    pub fn name(self) -> &'static str {
        match self {
            ScenePreset::Diffuse => "diffuse",
            ScenePreset::Metal => "metal",
            ScenePreset::Glass => "glass",
            ScenePreset::Spheres => "spheres",
            ScenePreset::Cornell => "cornell",
            ScenePreset::Textured => "textured",
        }
    }

    /// Resolves a profile scene name against the built-in presets.
    pub fn by_name(name: &str) -> Option<Self> {
        [
            ScenePreset::Diffuse,
            ScenePreset::Metal,
            ScenePreset::Glass,
            ScenePreset::Spheres,
            ScenePreset::Cornell,
            ScenePreset::Textured,
        ]
        .into_iter()
        .find(|p| p.name() == name)
    }

    pub fn build(self, aspect: f64) -> Scene {
        match self {
            ScenePreset::Diffuse => build_diffuse(aspect),
            ScenePreset::Metal => build_metal(aspect),
            ScenePreset::Glass => build_glass(aspect),
            ScenePreset::Spheres => build_spheres(aspect),
            ScenePreset::Cornell => build_cornell(aspect),
            ScenePreset::Textured => build_textured(aspect),
        }
    }
}

fn diffuse(color: Color) -> Option<Arc<Material>> {
    Some(Arc::new(Material::diffuse(Some(Texture::solid(color)))))
}

fn metal(color: Color, fuzziness: f64) -> Option<Arc<Material>> {
    Some(Arc::new(Material::metal(
        Some(Texture::solid(color)),
        fuzziness,
    )))
}

fn glass(refractive_index: f64) -> Option<Arc<Material>> {
    Some(Arc::new(Material::dielectric(None, refractive_index)))
}

fn light(color: Color, power: f64) -> Option<Arc<Material>> {
    Some(Arc::new(Material::diffuse_light(
        Some(Texture::solid(color)),
        power,
    )))
}

/// Camera orbiting a point just above the ground, looking back along +z.
fn demo_camera(aspect: f64, look_at: Point3, distance: f64) -> Camera {
    let mut camera = Camera::new(aspect);
    camera.look_at = look_at;
    camera.distance = distance;
    camera.yaw = 180.0;
    camera.pitch = -10.0;
    camera.fov = 30f64.to_radians();
    camera.aperture = 0.1;
    camera.focus_distance = distance;
    camera.update(0.0);
    camera
}

fn ground(color: Color) -> Entity {
    Entity::sphere(Point3::new(0.0, -1000.0, 0.0), 1000.0, diffuse(color))
}

fn build_diffuse(aspect: f64) -> Scene {
    let mut world = EntityList::new();
    world.push(ground(Color::new(0.1, 0.1, 0.1)));
    world.push(Entity::sphere(
        Point3::new(-2.0, 1.0, -1.0),
        1.0,
        diffuse(Color::new(0.5, 0.5, 0.5)),
    ));
    world.push(Entity::sphere(
        Point3::new(0.0, 1.0, -1.0),
        1.0,
        diffuse(Color::new(0.2, 0.45, 0.85)),
    ));
    world.push(Entity::sphere(
        Point3::new(2.0, 1.0, -1.0),
        1.0,
        diffuse(Color::new(0.5, 0.5, 0.5)),
    ));

    Scene::new(
        demo_camera(aspect, Point3::new(0.0, 1.2, -1.0), 7.0),
        world,
        Background::default(),
    )
}

fn build_metal(aspect: f64) -> Scene {
    let mut world = EntityList::new();
    world.push(ground(Color::new(0.1, 0.1, 0.1)));
    world.push(Entity::sphere(
        Point3::new(-2.0, 1.0, -1.0),
        1.0,
        metal(Color::new(0.5, 0.5, 0.5), 0.0),
    ));
    world.push(Entity::sphere(
        Point3::new(0.0, 1.0, -1.0),
        1.0,
        diffuse(Color::new(0.2, 0.45, 0.85)),
    ));
    world.push(Entity::sphere(
        Point3::new(2.0, 1.0, -1.0),
        1.0,
        metal(Color::new(0.5, 0.5, 0.5), 0.3),
    ));

    Scene::new(
        demo_camera(aspect, Point3::new(0.0, 1.2, -1.0), 7.0),
        world,
        Background::default(),
    )
}

fn build_glass(aspect: f64) -> Scene {
    let mut world = EntityList::new();
    world.push(ground(Color::new(0.1, 0.1, 0.1)));
    world.push(Entity::sphere(
        Point3::new(-2.0, 1.0, -1.0),
        1.0,
        diffuse(Color::new(0.5, 0.5, 0.5)),
    ));
    world.push(Entity::sphere(Point3::new(0.0, 1.0, -1.0), 1.0, glass(1.5)));
    world.push(Entity::sphere(
        Point3::new(2.0, 1.0, -1.0),
        1.0,
        diffuse(Color::new(0.5, 0.5, 0.5)),
    ));

    Scene::new(
        demo_camera(aspect, Point3::new(0.0, 1.2, -1.0), 7.0),
        world,
        Background::default(),
    )
}

/// The random sphere field: 80% diffuse, 10% metal, 10% glass.
fn build_spheres(aspect: f64) -> Scene {
    let mut rng = Pcg32::seed_from_u64(FIELD_SEED);
    let mut world = EntityList::new();
    world.push(ground(Color::new(0.5, 0.5, 0.5)));

    for a in -11..11 {
        for b in -11..11 {
            let center = Point3::new(
                a as f64 + 0.9 * rng.gen::<f64>(),
                0.2,
                b as f64 + 0.9 * rng.gen::<f64>(),
            );
            if (center - Point3::new(4.0, 0.2, 0.0)).length() <= 0.9 {
                continue;
            }

            let choose: f64 = rng.gen();
            let material = if choose < 0.8 {
                diffuse(Color::new(
                    rng.gen::<f64>() * rng.gen::<f64>(),
                    rng.gen::<f64>() * rng.gen::<f64>(),
                    rng.gen::<f64>() * rng.gen::<f64>(),
                ))
            } else if choose < 0.9 {
                metal(
                    Color::new(
                        0.5 * (1.0 + rng.gen::<f64>()),
                        0.5 * (1.0 + rng.gen::<f64>()),
                        0.5 * (1.0 + rng.gen::<f64>()),
                    ),
                    0.5 * rng.gen::<f64>(),
                )
            } else {
                glass(1.5)
            };
            world.push(Entity::sphere(center, 0.2, material));
        }
    }

    world.push(Entity::sphere(Point3::new(0.0, 1.0, 0.0), 1.0, glass(1.5)));
    world.push(Entity::sphere(
        Point3::new(-4.0, 1.0, 0.0),
        1.0,
        diffuse(Color::new(0.4, 0.2, 0.1)),
    ));
    world.push(Entity::sphere(
        Point3::new(4.0, 1.0, 0.0),
        1.0,
        metal(Color::new(0.7, 0.6, 0.5), 0.0),
    ));

    let mut camera = Camera::new(aspect);
    camera.look_at = Point3::zero();
    camera.distance = 13.5;
    camera.yaw = 103.0;
    camera.pitch = -8.5;
    camera.fov = 20f64.to_radians();
    camera.aperture = 0.0;
    camera.focus_distance = 10.0;
    camera.update(0.0);

    Scene::new(camera, world, Background::default())
}

fn build_cornell(aspect: f64) -> Scene {
    let mut world = EntityList::new();
    let white = Color::new(0.73, 0.73, 0.73);
    let red = Color::new(0.65, 0.05, 0.05);
    let green = Color::new(0.12, 0.45, 0.15);

    // Floor, ceiling, back wall.
    world.push(Entity::rect_xz(
        Point3::new(0.0, 0.0, 0.0),
        4.0,
        4.0,
        diffuse(white),
    ));
    world.push(Entity::flipped(Entity::rect_xz(
        Point3::new(0.0, 4.0, 0.0),
        4.0,
        4.0,
        diffuse(white),
    )));
    world.push(Entity::rect_xy(
        Point3::new(0.0, 2.0, -2.0),
        4.0,
        4.0,
        diffuse(white),
    ));

    // Colored side walls; the +x wall faces inward via a normal flip.
    world.push(Entity::rect_yz(
        Point3::new(-2.0, 2.0, 0.0),
        4.0,
        4.0,
        diffuse(red),
    ));
    world.push(Entity::flipped(Entity::rect_yz(
        Point3::new(2.0, 2.0, 0.0),
        4.0,
        4.0,
        diffuse(green),
    )));

    // Ceiling light panel, just under the ceiling.
    world.push(Entity::flipped(Entity::rect_xz(
        Point3::new(0.0, 3.99, 0.0),
        1.4,
        1.4,
        light(Color::new(1.0, 0.95, 0.85), 15.0),
    )));

    // The block.
    world.push(Entity::cuboid(
        Point3::new(-0.4, 0.75, -0.4),
        1.5,
        1.5,
        1.5,
        diffuse(white),
    ));

    let mut camera = Camera::new(aspect);
    camera.look_at = Point3::new(0.0, 1.8, 0.0);
    camera.distance = 5.2;
    camera.yaw = 180.0;
    camera.pitch = 0.0;
    camera.fov = 55f64.to_radians();
    camera.aperture = 0.0;
    camera.focus_distance = 5.2;
    camera.update(0.0);

    Scene::new(camera, world, Background::black())
}

fn build_textured(aspect: f64) -> Scene {
    let mut world = EntityList::new();
    world.push(Entity::sphere(
        Point3::new(0.0, -1000.0, 0.0),
        1000.0,
        Some(Arc::new(Material::diffuse(Some(Texture::checker(
            10.0,
            Color::new(0.05, 0.05, 0.05),
            Color::new(0.9, 0.9, 0.9),
        ))))),
    ));
    world.push(Entity::sphere(
        Point3::new(-2.2, 1.0, -1.0),
        1.0,
        Some(Arc::new(Material::diffuse(Some(Texture::Noise(
            NoiseTexture::marble(Color::new(0.9, 0.9, 0.95), 2.0),
        ))))),
    ));
    world.push(Entity::sphere(
        Point3::new(0.0, 1.0, -1.0),
        1.0,
        Some(Arc::new(Material::diffuse(Some(Texture::Noise(
            NoiseTexture::new(
                Color::new(0.7, 0.5, 0.3),
                crate::texture::NoiseMode::Wood,
                1.0,
                4.0,
                0.5,
                2.0,
                Vec3::zero(),
                7,
                1.0,
                10.0,
            ),
        ))))),
    ));
    world.push(Entity::sphere(
        Point3::new(2.2, 1.0, -1.0),
        1.0,
        metal(Color::new(0.8, 0.85, 0.9), 0.05),
    ));

    Scene::new(
        demo_camera(aspect, Point3::new(0.0, 1.0, -1.0), 8.0),
        world,
        Background::default(),
    )
}
