use crate::entity::{EntityList, Hit};
use crate::math::{Aabb, Ray};
use rand::Rng;
use thiserror::Error;

/// Scene-build failures. These indicate a malformed scene rather than a
/// runtime condition, so callers treat them as fatal.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("cannot build a bounding volume over an empty entity list")]
    EmptyWorld,
    #[error("entity cannot produce a bounding box")]
    UnboundedEntity,
}

/// A node of the median-split bounding-volume hierarchy.
///
/// Internal nodes carry two children and an empty entity list; leaves carry
/// exactly one entity. Every entity reachable from a node lies inside that
/// node's box. The tree is immutable once built; the sampler shares it
/// read-only for the lifetime of a render.
#[derive(Debug)]
pub struct BoundingVolume {
    bounds: Aabb,
    left: Option<Box<BoundingVolume>>,
    right: Option<Box<BoundingVolume>>,
    entities: EntityList,
}

impl BoundingVolume {
    /// Builds the hierarchy over an owned list: sort along a uniformly
    /// random axis, split at the median, recurse.
    pub fn new(mut entities: EntityList, rng: &mut impl Rng) -> Result<Self, BuildError> {
        if entities.is_empty() {
            return Err(BuildError::EmptyWorld);
        }
        if entities.iter().any(|e| e.bounds().is_none()) {
            return Err(BuildError::UnboundedEntity);
        }

        let axis = rng.gen_range(0..3);
        entities.sort_by_axis(axis);

        if entities.len() == 1 {
            let bounds = entities.bounds().ok_or(BuildError::UnboundedEntity)?;
            return Ok(Self {
                bounds,
                left: None,
                right: None,
                entities,
            });
        }

        let (first, second) = entities.split();
        let left = Box::new(Self::new(first, rng)?);
        let right = Box::new(Self::new(second, rng)?);
        let bounds = Aabb::surrounding(&left.bounds, &right.bounds);
        Ok(Self {
            bounds,
            left: Some(left),
            right: Some(right),
            entities: EntityList::new(),
        })
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Depth-first query, pruned by the node box. Children are both visited
    /// and the nearer hit wins; on an exact tie the left child is kept.
    pub fn hit(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<Hit<'_>> {
        if !self.bounds.hit(ray, t_min, t_max) {
            return None;
        }

        match (&self.left, &self.right) {
            (Some(left), Some(right)) => {
                match (left.hit(ray, t_min, t_max), right.hit(ray, t_min, t_max)) {
                    (Some(lh), Some(rh)) => Some(if rh.t < lh.t { rh } else { lh }),
                    (Some(lh), None) => Some(lh),
                    (None, Some(rh)) => Some(rh),
                    (None, None) => None,
                }
            }
            _ => self.entities.hit(ray, t_min, t_max),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::math::{Point3, Vec3};
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn random_sphere_field(count: usize, rng: &mut Pcg32) -> EntityList {
        let mut list = EntityList::new();
        for _ in 0..count {
            let center = Point3::new(
                rng.gen_range(-11.0..11.0),
                rng.gen_range(0.1..1.0),
                rng.gen_range(-11.0..11.0),
            );
            list.push(Entity::sphere(center, rng.gen_range(0.1..0.5), None));
        }
        list
    }

    #[test]
    fn empty_world_is_rejected() {
        let mut rng = Pcg32::seed_from_u64(1);
        assert!(matches!(
            BoundingVolume::new(EntityList::new(), &mut rng),
            Err(BuildError::EmptyWorld)
        ));
    }

    #[test]
    fn single_entity_becomes_a_leaf_with_its_bounds() {
        let mut rng = Pcg32::seed_from_u64(1);
        let mut list = EntityList::new();
        list.push(Entity::sphere(Point3::new(2.0, 0.0, 0.0), 1.0, None));
        let bvh = BoundingVolume::new(list, &mut rng).expect("build");
        assert_eq!(bvh.bounds().min, Point3::new(1.0, -1.0, -1.0));
        assert_eq!(bvh.bounds().max, Point3::new(3.0, 1.0, 1.0));
    }

    #[test]
    fn node_boxes_contain_their_children() {
        let mut rng = Pcg32::seed_from_u64(5);
        let list = random_sphere_field(64, &mut rng);
        let expected = list.bounds().expect("bounds");
        let bvh = BoundingVolume::new(list, &mut rng).expect("build");
        let b = bvh.bounds();
        assert!(b.min.x <= expected.min.x && b.max.x >= expected.max.x);
        assert!(b.min.y <= expected.min.y && b.max.y >= expected.max.y);
        assert!(b.min.z <= expected.min.z && b.max.z >= expected.max.z);
    }

    #[test]
    fn bvh_queries_match_the_brute_force_scan() {
        let mut rng = Pcg32::seed_from_u64(0xb5);
        let list = random_sphere_field(250, &mut rng);
        let bvh = BoundingVolume::new(list.clone(), &mut rng).expect("build");

        for _ in 0..4000 {
            let origin = Point3::new(
                rng.gen_range(-15.0..15.0),
                rng.gen_range(-2.0..6.0),
                rng.gen_range(-15.0..15.0),
            );
            let direction = Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            if direction.near_zero() {
                continue;
            }
            let ray = Ray::new(origin, direction);
            let from_bvh = bvh.hit(&ray, 0.001, f64::INFINITY);
            let from_list = list.hit(&ray, 0.001, f64::INFINITY);
            match (from_bvh, from_list) {
                (None, None) => {}
                (Some(a), Some(b)) => {
                    assert_eq!(a.t, b.t, "hit distance diverged");
                    assert_eq!(a.normal, b.normal);
                    assert_eq!(a.p, b.p);
                }
                (a, b) => panic!(
                    "hit disagreement: bvh={:?} list={:?}",
                    a.map(|h| h.t),
                    b.map(|h| h.t)
                ),
            }
        }
    }

    #[test]
    fn rays_from_inside_the_scene_still_resolve() {
        let mut rng = Pcg32::seed_from_u64(17);
        let mut list = EntityList::new();
        // A shell of spheres around the origin.
        for i in 0..8 {
            let angle = i as f64 * std::f64::consts::FRAC_PI_4;
            list.push(Entity::sphere(
                Point3::new(4.0 * angle.cos(), 0.0, 4.0 * angle.sin()),
                1.0,
                None,
            ));
        }
        let bvh = BoundingVolume::new(list.clone(), &mut rng).expect("build");
        for i in 0..8 {
            let angle = i as f64 * std::f64::consts::FRAC_PI_4;
            let ray = Ray::new(Point3::zero(), Vec3::new(angle.cos(), 0.0, angle.sin()));
            let hit = bvh.hit(&ray, 0.001, f64::INFINITY).expect("shell hit");
            let brute = list.hit(&ray, 0.001, f64::INFINITY).expect("shell hit");
            assert_eq!(hit.t, brute.t);
        }
    }
}
