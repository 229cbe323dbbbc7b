use crate::material::Material;
use crate::math::{sphere_uv, Aabb, Point3, Ray, Vec3};
use std::cmp::Ordering;
use std::sync::Arc;

/// Half-thickness of the virtual slab that gives an axis rectangle a
/// non-degenerate bounding box.
const RECT_SLAB: f64 = 0.0001;

// ─── Hit record ─────────────────────────────────────────────────────────────

/// Everything the integrator needs to know about a ray/surface intersection.
/// `normal` is unit length in the surface's outward convention; `u`/`v` are
/// the surface parameterization for texture lookup.
#[derive(Debug, Clone, Copy)]
pub struct Hit<'a> {
    pub t: f64,
    pub p: Point3,
    pub normal: Vec3,
    pub u: f64,
    pub v: f64,
    pub material: Option<&'a Material>,
}

// ─── Entity ─────────────────────────────────────────────────────────────────

/// A scene primitive. Closed set of variants dispatched by match; each owns
/// an optional shared material (a missing material neither scatters nor
/// emits, so such surfaces render black).
#[derive(Debug, Clone)]
pub enum Entity {
    Sphere {
        center: Point3,
        radius: f64,
        material: Option<Arc<Material>>,
    },
    /// Axis rectangle in the XY plane: width spans x, height spans y,
    /// normal +z.
    RectXy {
        center: Point3,
        width: f64,
        height: f64,
        material: Option<Arc<Material>>,
    },
    /// Axis rectangle in the XZ plane: width spans x, height spans z,
    /// normal +y.
    RectXz {
        center: Point3,
        width: f64,
        height: f64,
        material: Option<Arc<Material>>,
    },
    /// Axis rectangle in the YZ plane: width spans y, height spans z,
    /// normal +x.
    RectYz {
        center: Point3,
        width: f64,
        height: f64,
        material: Option<Arc<Material>>,
    },
    /// Axis-aligned box assembled from six rectangles, the far-side three
    /// flipped to face outward.
    Cuboid {
        center: Point3,
        width: f64,
        height: f64,
        depth: f64,
        faces: EntityList,
        material: Option<Arc<Material>>,
    },
    /// Wrapper that negates the inner entity's surface normal.
    FlipNormals { inner: Box<Entity> },
}

impl Entity {
    pub fn sphere(center: Point3, radius: f64, material: Option<Arc<Material>>) -> Self {
        Entity::Sphere {
            center,
            radius,
            material,
        }
    }

    pub fn rect_xy(center: Point3, width: f64, height: f64, material: Option<Arc<Material>>) -> Self {
        Entity::RectXy {
            center,
            width,
            height,
            material,
        }
    }

    pub fn rect_xz(center: Point3, width: f64, height: f64, material: Option<Arc<Material>>) -> Self {
        Entity::RectXz {
            center,
            width,
            height,
            material,
        }
    }

    pub fn rect_yz(center: Point3, width: f64, height: f64, material: Option<Arc<Material>>) -> Self {
        Entity::RectYz {
            center,
            width,
            height,
            material,
        }
    }

    pub fn cuboid(
        center: Point3,
        width: f64,
        height: f64,
        depth: f64,
        material: Option<Arc<Material>>,
    ) -> Self {
        let (hw, hh, hd) = (width / 2.0, height / 2.0, depth / 2.0);
        let mut faces = EntityList::new();

        // +z / -z
        faces.push(Entity::rect_xy(
            Point3::new(center.x, center.y, center.z + hd),
            width,
            height,
            material.clone(),
        ));
        faces.push(Entity::flipped(Entity::rect_xy(
            Point3::new(center.x, center.y, center.z - hd),
            width,
            height,
            material.clone(),
        )));

        // +y / -y
        faces.push(Entity::rect_xz(
            Point3::new(center.x, center.y + hh, center.z),
            width,
            depth,
            material.clone(),
        ));
        faces.push(Entity::flipped(Entity::rect_xz(
            Point3::new(center.x, center.y - hh, center.z),
            width,
            depth,
            material.clone(),
        )));

        // +x / -x
        faces.push(Entity::rect_yz(
            Point3::new(center.x + hw, center.y, center.z),
            height,
            depth,
            material.clone(),
        ));
        faces.push(Entity::flipped(Entity::rect_yz(
            Point3::new(center.x - hw, center.y, center.z),
            height,
            depth,
            material.clone(),
        )));

        Entity::Cuboid {
            center,
            width,
            height,
            depth,
            faces,
            material,
        }
    }

    pub fn flipped(inner: Entity) -> Self {
        Entity::FlipNormals {
            inner: Box::new(inner),
        }
    }

    pub fn material(&self) -> Option<&Arc<Material>> {
        match self {
            Entity::Sphere { material, .. }
            | Entity::RectXy { material, .. }
            | Entity::RectXz { material, .. }
            | Entity::RectYz { material, .. }
            | Entity::Cuboid { material, .. } => material.as_ref(),
            Entity::FlipNormals { inner } => inner.material(),
        }
    }

    /// Nearest intersection with `t` strictly inside `(t_min, t_max)`.
    pub fn hit(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<Hit<'_>> {
        match self {
            Entity::Sphere {
                center,
                radius,
                material,
            } => hit_sphere(ray, t_min, t_max, *center, *radius, material.as_deref()),
            Entity::RectXy {
                center,
                width,
                height,
                material,
            } => hit_rect(
                ray,
                t_min,
                t_max,
                *center,
                *width,
                *height,
                RectPlane::Xy,
                material.as_deref(),
            ),
            Entity::RectXz {
                center,
                width,
                height,
                material,
            } => hit_rect(
                ray,
                t_min,
                t_max,
                *center,
                *width,
                *height,
                RectPlane::Xz,
                material.as_deref(),
            ),
            Entity::RectYz {
                center,
                width,
                height,
                material,
            } => hit_rect(
                ray,
                t_min,
                t_max,
                *center,
                *width,
                *height,
                RectPlane::Yz,
                material.as_deref(),
            ),
            Entity::Cuboid { faces, .. } => faces.hit(ray, t_min, t_max),
            Entity::FlipNormals { inner } => {
                let mut hit = inner.hit(ray, t_min, t_max)?;
                hit.normal = -hit.normal;
                Some(hit)
            }
        }
    }

    pub fn bounds(&self) -> Option<Aabb> {
        match self {
            Entity::Sphere { center, radius, .. } => {
                let r = radius.abs();
                let extent = Vec3::new(r, r, r);
                Some(Aabb::new(*center - extent, *center + extent))
            }
            Entity::RectXy {
                center,
                width,
                height,
                ..
            } => Some(Aabb::new(
                Point3::new(
                    center.x - width / 2.0,
                    center.y - height / 2.0,
                    center.z - RECT_SLAB,
                ),
                Point3::new(
                    center.x + width / 2.0,
                    center.y + height / 2.0,
                    center.z + RECT_SLAB,
                ),
            )),
            Entity::RectXz {
                center,
                width,
                height,
                ..
            } => Some(Aabb::new(
                Point3::new(
                    center.x - width / 2.0,
                    center.y - RECT_SLAB,
                    center.z - height / 2.0,
                ),
                Point3::new(
                    center.x + width / 2.0,
                    center.y + RECT_SLAB,
                    center.z + height / 2.0,
                ),
            )),
            Entity::RectYz {
                center,
                width,
                height,
                ..
            } => Some(Aabb::new(
                Point3::new(
                    center.x - RECT_SLAB,
                    center.y - width / 2.0,
                    center.z - height / 2.0,
                ),
                Point3::new(
                    center.x + RECT_SLAB,
                    center.y + width / 2.0,
                    center.z + height / 2.0,
                ),
            )),
            Entity::Cuboid {
                center,
                width,
                height,
                depth,
                ..
            } => {
                let extent = Vec3::new(width / 2.0, height / 2.0, depth / 2.0);
                Some(Aabb::new(*center - extent, *center + extent))
            }
            Entity::FlipNormals { inner } => inner.bounds(),
        }
    }

    /// Wire code used by the scene text format. `FlipNormals` is an
    /// in-memory composition tool and has no code.
    pub fn type_code(&self) -> Option<u32> {
        match self {
            Entity::Sphere { .. } => Some(1),
            Entity::RectXy { .. } => Some(2),
            Entity::RectXz { .. } => Some(3),
            Entity::RectYz { .. } => Some(4),
            Entity::Cuboid { .. } => Some(5),
            Entity::FlipNormals { .. } => None,
        }
    }
}

fn hit_sphere<'a>(
    ray: &Ray,
    t_min: f64,
    t_max: f64,
    center: Point3,
    radius: f64,
    material: Option<&'a Material>,
) -> Option<Hit<'a>> {
    let oc = ray.origin - center;
    let a = ray.direction.dot(ray.direction);
    let b = oc.dot(ray.direction);
    let c = oc.dot(oc) - radius * radius;
    let discriminant = b * b - a * c;

    if discriminant <= 0.0 {
        return None;
    }

    let sqrtd = discriminant.sqrt();
    let mut t = (-b - sqrtd) / a;
    if !(t > t_min && t < t_max) {
        t = (-b + sqrtd) / a;
        if !(t > t_min && t < t_max) {
            return None;
        }
    }

    let p = ray.at(t);
    let normal = (p - center) / radius;
    let (u, v) = sphere_uv(normal);
    Some(Hit {
        t,
        p,
        normal,
        u,
        v,
        material,
    })
}

#[derive(Clone, Copy)]
enum RectPlane {
    Xy,
    Xz,
    Yz,
}

impl RectPlane {
    /// (off-plane axis, first in-plane axis, second in-plane axis)
    fn axes(self) -> (usize, usize, usize) {
        match self {
            RectPlane::Xy => (2, 0, 1),
            RectPlane::Xz => (1, 0, 2),
            RectPlane::Yz => (0, 1, 2),
        }
    }

    fn normal(self) -> Vec3 {
        match self {
            RectPlane::Xy => Vec3::unit_z(),
            RectPlane::Xz => Vec3::unit_y(),
            RectPlane::Yz => Vec3::unit_x(),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn hit_rect<'a>(
    ray: &Ray,
    t_min: f64,
    t_max: f64,
    center: Point3,
    width: f64,
    height: f64,
    plane: RectPlane,
    material: Option<&'a Material>,
) -> Option<Hit<'a>> {
    let (off, a0, a1) = plane.axes();

    // Positive-form range check also rejects the NaN that a ray lying in
    // the rectangle's plane produces.
    let t = (center[off] - ray.origin[off]) / ray.direction[off];
    if !(t > t_min && t < t_max) {
        return None;
    }

    let p = ray.at(t);
    let da = p[a0] - (center[a0] - width / 2.0);
    let db = p[a1] - (center[a1] - height / 2.0);
    if da < 0.0 || da > width || db < 0.0 || db > height {
        return None;
    }

    Some(Hit {
        t,
        p,
        normal: plane.normal(),
        u: da / width,
        v: db / height,
        material,
    })
}

// ─── Entity list ────────────────────────────────────────────────────────────

/// Insertion-ordered collection of shared entities. Duplicates are allowed.
/// Provides the linear-scan hit query plus the sort/split operations the
/// BVH builder feeds on.
#[derive(Debug, Clone, Default)]
pub struct EntityList {
    entities: Vec<Arc<Entity>>,
}

impl EntityList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entity: Entity) {
        self.entities.push(Arc::new(entity));
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Entity>> {
        self.entities.iter()
    }

    /// Orders the list by the minimum bound on `axis`. Entities without a
    /// bounding box compare equal; the BVH builder rejects them before
    /// sorting matters.
    pub fn sort_by_axis(&mut self, axis: usize) {
        self.entities.sort_by(|a, b| {
            match (a.bounds(), b.bounds()) {
                (Some(ba), Some(bb)) => ba.min[axis]
                    .partial_cmp(&bb.min[axis])
                    .unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            }
        });
    }

    /// Splits at the midpoint in current order: first half, second half.
    pub fn split(&self) -> (EntityList, EntityList) {
        let mid = self.entities.len() / 2;
        let (first, second) = self.entities.split_at(mid);
        (
            EntityList {
                entities: first.to_vec(),
            },
            EntityList {
                entities: second.to_vec(),
            },
        )
    }

    /// Nearest hit across the whole list: each entity is queried with the
    /// closest `t` found so far as its upper bound.
    pub fn hit(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<Hit<'_>> {
        let mut closest = t_max;
        let mut result = None;
        for entity in &self.entities {
            if let Some(hit) = entity.hit(ray, t_min, closest) {
                closest = hit.t;
                result = Some(hit);
            }
        }
        result
    }

    /// Aggregate bounding box. `None` unless every entity reports a bound.
    pub fn bounds(&self) -> Option<Aabb> {
        let mut result: Option<Aabb> = None;
        for entity in &self.entities {
            let bounds = entity.bounds()?;
            result = Some(match result {
                Some(aggregate) => Aabb::surrounding(&aggregate, &bounds),
                None => bounds,
            });
        }
        result
    }
}
