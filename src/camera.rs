use crate::math::{random_in_unit_disk, Point3, Ray, Vec3};
use rand::Rng;

/// Pitch stops just short of the poles so the basis never degenerates
/// against the world up vector.
const PITCH_LIMIT: f64 = 89.99;
const DISTANCE_MIN: f64 = 3.0;
const DISTANCE_MAX: f64 = 1000.0;

/// How fast the damped zoom velocity moves the camera, and how quickly it
/// decays back to rest.
const ZOOM_RATE: f64 = 8.0;
const ZOOM_DAMPING: f64 = 6.0;

/// Orbit camera: yaw/pitch/distance about a look-at point, with a thin lens
/// for depth of field.
///
/// The orbit parameters are public and freely editable; `update` folds them
/// (and the damped zoom velocity) into the projection basis that `ray`
/// consumes. The sampler holds an immutable snapshot between restarts, so
/// edits become visible on the next restart.
#[derive(Debug, Clone)]
pub struct Camera {
    pub look_at: Point3,
    /// Degrees around the vertical axis.
    pub yaw: f64,
    /// Degrees above the horizon, clamped to ±89.99.
    pub pitch: f64,
    pub distance: f64,
    /// Scroll-style zoom velocity, damped every update.
    pub distance_vel: f64,
    pub aperture: f64,
    pub focus_distance: f64,
    /// Vertical field of view in radians.
    pub fov: f64,
    pub aspect: f64,

    origin: Point3,
    lower_left: Point3,
    horizontal: Vec3,
    vertical: Vec3,
    forward: Vec3,
    right: Vec3,
    up: Vec3,
    lens_radius: f64,
}

impl Camera {
    pub fn new(aspect: f64) -> Self {
        let mut camera = Self {
            look_at: Point3::zero(),
            yaw: 0.0,
            pitch: 0.0,
            distance: 10.0,
            distance_vel: 0.0,
            aperture: 0.0,
            focus_distance: 10.0,
            fov: 20f64.to_radians(),
            aspect,
            origin: Point3::zero(),
            lower_left: Point3::zero(),
            horizontal: Vec3::zero(),
            vertical: Vec3::zero(),
            forward: Vec3::unit_z(),
            right: Vec3::unit_x(),
            up: Vec3::unit_y(),
            lens_radius: 0.0,
        };
        camera.update(0.0);
        camera
    }

    /// Applies zoom velocity, clamps the orbit parameters, and recomputes
    /// the projection basis. Called once per frame with the frame delta.
    pub fn update(&mut self, dt: f64) {
        self.distance += self.distance_vel * ZOOM_RATE * dt;
        self.distance_vel *= (-ZOOM_DAMPING * dt).exp();
        if self.distance_vel.abs() < 1e-3 {
            self.distance_vel = 0.0;
        }

        self.pitch = self.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.distance = self.distance.clamp(DISTANCE_MIN, DISTANCE_MAX);

        let yaw = self.yaw.to_radians();
        let pitch = self.pitch.to_radians();
        self.origin = self.look_at
            + self.distance
                * Vec3::new(
                    -yaw.sin() * pitch.cos(),
                    -pitch.sin(),
                    -yaw.cos() * pitch.cos(),
                );

        self.forward = (self.origin - self.look_at).normalized();
        self.right = Vec3::unit_y().cross(self.forward).normalized();
        self.up = self.forward.cross(self.right).normalized();

        // Projection plane sits at the focus distance so lens jitter pivots
        // around in-focus points.
        let half_height = (self.fov / 2.0).tan();
        let half_width = self.aspect * half_height;
        self.lower_left = self.origin
            - half_width * self.focus_distance * self.right
            - half_height * self.focus_distance * self.up
            - self.focus_distance * self.forward;
        self.horizontal = 2.0 * half_width * self.focus_distance * self.right;
        self.vertical = 2.0 * half_height * self.focus_distance * self.up;
        self.lens_radius = self.aperture / 2.0;
    }

    /// Primary ray through screen coordinates `(s, t)` in [0, 1)², jittered
    /// across the lens when the aperture is open.
    pub fn ray(&self, s: f64, t: f64, rng: &mut impl Rng) -> Ray {
        let offset = if self.lens_radius > 0.0 {
            let lens_point = random_in_unit_disk(rng) * self.lens_radius;
            self.right * lens_point.x + self.up * lens_point.y
        } else {
            Vec3::zero()
        };
        let origin = self.origin + offset;
        Ray::new(
            origin,
            self.lower_left + self.horizontal * s + self.vertical * t - origin,
        )
    }

    pub fn origin(&self) -> Point3 {
        self.origin
    }

    pub fn orbit(&mut self, delta_yaw: f64, delta_pitch: f64) {
        self.yaw += delta_yaw;
        self.pitch += delta_pitch;
    }

    /// Adds scroll-style zoom impulse; `update` integrates and damps it.
    pub fn zoom(&mut self, impulse: f64) {
        self.distance_vel += impulse;
    }

    /// The camera keeps moving on its own while zoom velocity drains; the
    /// sampler drops back to epoch 1 for as long as this holds.
    pub fn is_coasting(&self) -> bool {
        self.distance_vel != 0.0
    }
}
