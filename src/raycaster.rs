//! Closest-hit ray queries against scene primitives.
//!
//! `cast_ray` tests a ray against every visible object in a slice and returns
//! the nearest hit beyond a small epsilon. Iteration order over the slice is
//! the tie-break, so results are deterministic for a fixed scene.

use crate::math::{EPSILON, Vec3};
use crate::scene::{SceneObject, Shape};
use uuid::Uuid;

/// Rays are never traced further than this, even with no geometry in range.
pub const MAX_RAY_DISTANCE: f32 = 50.0;

/// Result of a closest-hit ray query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Whether the ray hit any object
    pub hit: bool,

    /// Parametric distance from ray origin to the hit point
    ///
    /// Only meaningful if `hit` is true
    pub distance: f32,

    /// World-space hit point
    pub point: Vec3,

    /// Outward surface normal at the hit point (normalized)
    pub normal: Vec3,

    /// Index of the hit object in the queried slice
    pub object: Option<usize>,
}

impl RayHit {
    /// Creates a miss result (no hit)
    pub fn miss() -> Self {
        Self {
            hit: false,
            distance: 0.0,
            point: Vec3::ZERO,
            normal: Vec3::ZERO,
            object: None,
        }
    }
}

impl Default for RayHit {
    fn default() -> Self {
        Self::miss()
    }
}

/// Casts a ray against all visible objects and returns the closest hit.
///
/// `ignore` skips one object by id, used so a ray never self-intersects the
/// object it originates from. `direction` must be normalized.
pub fn cast_ray(
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
    objects: &[&SceneObject],
    ignore: Option<Uuid>,
) -> RayHit {
    let mut closest = max_distance;
    let mut best: Option<(usize, f32)> = None;

    for (index, obj) in objects.iter().enumerate() {
        if !obj.visible || Some(obj.id) == ignore {
            continue;
        }
        let t = match obj.shape {
            Shape::Sphere { radius } => intersect_sphere(origin, direction, obj.position, radius),
            Shape::Cuboid { half_extents } => {
                intersect_box(origin, direction, obj.position, half_extents, max_distance)
            }
        };
        if let Some(t) = t {
            if t > EPSILON && t < closest {
                closest = t;
                best = Some((index, t));
            }
        }
    }

    match best {
        Some((index, t)) => {
            let obj = objects[index];
            let point = origin + direction * t;
            RayHit {
                hit: true,
                distance: t,
                point,
                normal: surface_normal(obj, point),
                object: Some(index),
            }
        }
        None => RayHit::miss(),
    }
}

/// Smaller positive root of the ray-sphere quadratic, if any.
fn intersect_sphere(origin: Vec3, direction: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let oc = origin - center;
    let a = direction.dot(direction);
    let b = 2.0 * oc.dot(direction);
    let c = oc.dot(oc) - radius * radius;
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }
    let t = (-b - discriminant.sqrt()) / (2.0 * a);
    (t > EPSILON).then_some(t)
}

/// Slab-method entry parameter for an axis-aligned box, if the ray enters
/// within `(EPSILON, max_distance)`.
fn intersect_box(
    origin: Vec3,
    direction: Vec3,
    center: Vec3,
    half_extents: Vec3,
    max_distance: f32,
) -> Option<f32> {
    let min_bound = center - half_extents;
    let max_bound = center + half_extents;
    let mut t_min: f32 = 0.0;
    let mut t_max: f32 = max_distance;

    for axis in 0..3 {
        let dir = direction[axis];
        let o = origin[axis];
        if dir.abs() < EPSILON {
            // Parallel ray: outside this slab means an immediate miss.
            if o < min_bound[axis] || o > max_bound[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / dir;
        let mut t0 = (min_bound[axis] - o) * inv;
        let mut t1 = (max_bound[axis] - o) * inv;
        if inv < 0.0 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return None;
        }
    }

    (t_min > EPSILON).then_some(t_min)
}

/// Outward normal at a hit point.
///
/// Box normals are recovered by testing which face the point lies on; the
/// point-to-center fallback only triggers on boundary-precision degeneracies.
fn surface_normal(obj: &SceneObject, point: Vec3) -> Vec3 {
    match obj.shape {
        Shape::Sphere { .. } => (point - obj.position).normalize_or_zero(),
        Shape::Cuboid { half_extents } => {
            let c = obj.position;
            let d = half_extents;
            if (point.x - (c.x - d.x)).abs() < EPSILON {
                Vec3::NEG_X
            } else if (point.x - (c.x + d.x)).abs() < EPSILON {
                Vec3::X
            } else if (point.y - (c.y - d.y)).abs() < EPSILON {
                Vec3::NEG_Y
            } else if (point.y - (c.y + d.y)).abs() < EPSILON {
                Vec3::Y
            } else if (point.z - (c.z - d.z)).abs() < EPSILON {
                Vec3::NEG_Z
            } else if (point.z - (c.z + d.z)).abs() < EPSILON {
                Vec3::Z
            } else {
                (point - c).normalize_or_zero()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_with_no_objects() {
        let hit = cast_ray(Vec3::ZERO, Vec3::Z, MAX_RAY_DISTANCE, &[], None);
        assert!(!hit.hit);
        assert_eq!(hit.object, None);
    }

    #[test]
    fn sphere_frontal_hit_distance() {
        let sphere = SceneObject::sphere("S", Vec3::new(0.0, 0.0, 5.0), 1.0);
        let hit = cast_ray(Vec3::ZERO, Vec3::Z, MAX_RAY_DISTANCE, &[&sphere], None);
        assert!(hit.hit);
        assert!((hit.distance - 4.0).abs() < 1e-4);
        assert!((hit.normal - Vec3::NEG_Z).length() < 1e-3);
    }

    #[test]
    fn sphere_offset_hit_distance() {
        // Center offset 0.5 perpendicular to the ray, 5.0 along it:
        // entry at 5 - sqrt(r^2 - 0.5^2).
        let sphere = SceneObject::sphere("S", Vec3::new(0.5, 0.0, 5.0), 1.0);
        let hit = cast_ray(Vec3::ZERO, Vec3::Z, MAX_RAY_DISTANCE, &[&sphere], None);
        assert!(hit.hit);
        let expected = 5.0 - (1.0f32 - 0.25).sqrt();
        assert!((hit.distance - expected).abs() < 1e-3);
    }

    #[test]
    fn sphere_behind_ray_misses() {
        let sphere = SceneObject::sphere("S", Vec3::new(0.0, 0.0, -5.0), 1.0);
        let hit = cast_ray(Vec3::ZERO, Vec3::Z, MAX_RAY_DISTANCE, &[&sphere], None);
        assert!(!hit.hit);
    }

    #[test]
    fn box_face_hit_and_normal() {
        let cuboid = SceneObject::cuboid("B", Vec3::new(0.0, 0.0, 6.0), Vec3::new(2.0, 1.0, 1.0));
        let hit = cast_ray(Vec3::ZERO, Vec3::Z, MAX_RAY_DISTANCE, &[&cuboid], None);
        assert!(hit.hit);
        assert!((hit.distance - 5.0).abs() < 1e-4);
        assert_eq!(hit.normal, Vec3::NEG_Z);
    }

    #[test]
    fn parallel_ray_outside_slab_misses() {
        let cuboid = SceneObject::cuboid("B", Vec3::new(0.0, 5.0, 6.0), Vec3::ONE);
        let hit = cast_ray(Vec3::ZERO, Vec3::Z, MAX_RAY_DISTANCE, &[&cuboid], None);
        assert!(!hit.hit);
    }

    #[test]
    fn closest_hit_wins_regardless_of_order() {
        let near = SceneObject::sphere("Near", Vec3::new(0.0, 0.0, 3.0), 0.5);
        let far = SceneObject::cuboid("Far", Vec3::new(0.0, 0.0, 10.0), Vec3::ONE);
        let hit = cast_ray(Vec3::ZERO, Vec3::Z, MAX_RAY_DISTANCE, &[&far, &near], None);
        assert_eq!(hit.object, Some(1));
        assert!((hit.distance - 2.5).abs() < 1e-4);
    }

    #[test]
    fn ignore_and_invisible_objects_are_skipped() {
        let blocker = SceneObject::sphere("Blocker", Vec3::new(0.0, 0.0, 3.0), 0.5);
        let ignored_id = blocker.id;
        let hidden = SceneObject::sphere("Hidden", Vec3::new(0.0, 0.0, 5.0), 0.5).invisible();
        let target = SceneObject::cuboid("Target", Vec3::new(0.0, 0.0, 10.0), Vec3::ONE);
        let objects = [&blocker, &hidden, &target];
        let hit = cast_ray(Vec3::ZERO, Vec3::Z, MAX_RAY_DISTANCE, &objects, Some(ignored_id));
        assert_eq!(hit.object, Some(2));
    }

    #[test]
    fn results_are_repeatable() {
        let cuboid = SceneObject::cuboid("A", Vec3::new(0.0, 0.0, 8.0), Vec3::ONE);
        let sphere = SceneObject::sphere("B", Vec3::new(0.2, 0.1, 6.0), 1.2);
        let objects = [&cuboid, &sphere];
        let a = cast_ray(Vec3::ZERO, Vec3::Z, MAX_RAY_DISTANCE, &objects, None);
        let b = cast_ray(Vec3::ZERO, Vec3::Z, MAX_RAY_DISTANCE, &objects, None);
        assert_eq!(a, b);
    }
}
