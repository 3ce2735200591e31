//! Multi-bounce sound propagation and Fibonacci-weighted arrival scoring.
//!
//! Rays are distributed over the unit sphere with the Fibonacci-spiral
//! parametrization, reflected off scene geometry up to the bounce limit, and
//! checked against the listener sphere along every traced segment. Direct
//! arrivals earn a fixed base score; reflected arrivals earn the Fibonacci
//! number of their bounce count, capped so arbitrarily long paths stop being
//! rewarded.
//!
//! The full-resolution evaluation also emits colored line segments for the
//! rendering layer. The reduced-resolution variant used by the optimizer is a
//! pure function: fewer rays, no segment output, no shared state.

use crate::config::SimulationParams;
use crate::math::{Vec3, fibonacci_sphere_direction, reflect};
use crate::raycaster::{MAX_RAY_DISTANCE, RayHit, cast_ray};
use crate::scene::SceneObject;
use uuid::Uuid;

/// Score contributed by a ray that reaches the listener with zero bounces.
pub const BASE_DIRECT_HIT_SCORE: u32 = 10;

/// Bounce counts are clamped to this index into the Fibonacci table.
pub const FIBONACCI_SCORE_CAP_INDEX: usize = 20;

/// Rays whose remaining opacity falls below this are dropped.
pub const MIN_RAY_OPACITY: f32 = 0.01;

/// Reflected rays restart slightly off the surface to avoid re-hitting it.
const SURFACE_OFFSET: f32 = 0.01;

/// Reduced-resolution evaluation uses `num_rays / EVAL_RAY_DIVISOR` rays,
/// clamped to `[EVAL_RAYS_MIN, EVAL_RAYS_MAX]`.
const EVAL_RAY_DIVISOR: usize = 50;
const EVAL_RAYS_MIN: usize = 10;
const EVAL_RAYS_MAX: usize = 100;

/// Segment colors indexed by bounce depth, cycled when the bounce limit
/// exceeds the palette.
pub const BOUNCE_COLORS: [u32; 11] = [
    0xffff00, 0xffa500, 0xff00ff, 0x00ffff, 0x00fa9a, 0xdda0dd, 0xfa8072, 0xadd8e6, 0xf0e68c,
    0x90ee90, 0xffc0cb,
];

/// Override color for the exact segment that reaches the listener.
pub const LISTENER_RAY_COLOR: u32 = 0x00ff00;

/// A traced line segment for the rendering layer. Never read back by the
/// core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaySegment {
    pub start: Vec3,
    pub end: Vec3,
    pub color: u32,
    pub opacity: f32,
}

/// Result of a full-resolution evaluation.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Total weighted arrival score
    pub score: u32,
    /// Traced segments for visualization
    pub segments: Vec<RaySegment>,
}

/// Precomputes Fibonacci numbers up to and including `cap`.
///
/// On `u32` overflow the sequence clamps to the previous value instead of
/// wrapping, keeping the table monotonically non-decreasing.
pub fn fibonacci_table(cap: usize) -> Vec<u32> {
    let mut table = vec![0u32; cap + 1];
    if cap >= 1 {
        table[1] = 1;
    }
    for i in 2..=cap {
        table[i] = table[i - 1].checked_add(table[i - 2]).unwrap_or(table[i - 1]);
    }
    table
}

fn score_for_bounces(bounces: u32, table: &[u32]) -> u32 {
    if bounces == 0 {
        BASE_DIRECT_HIT_SCORE
    } else {
        let index = (bounces as usize).min(FIBONACCI_SCORE_CAP_INDEX);
        table.get(index).copied().unwrap_or(0)
    }
}

/// Number of rays used for reduced-resolution candidate scoring.
pub fn reduced_ray_count(num_rays: usize) -> usize {
    (num_rays / EVAL_RAY_DIVISOR).clamp(EVAL_RAYS_MIN, EVAL_RAYS_MAX)
}

/// Full-resolution evaluation: weighted score plus visual segments.
///
/// `collidables` must not contain the listener; the listener takes part only
/// as the detection sphere. The source object (identified by `source_id`) is
/// skipped for depth-0 rays but occludes reflected ones.
pub fn evaluate(
    collidables: &[&SceneObject],
    source_id: Option<Uuid>,
    source_pos: Vec3,
    listener_pos: Vec3,
    listener_radius: f32,
    params: &SimulationParams,
) -> Evaluation {
    let table = fibonacci_table(FIBONACCI_SCORE_CAP_INDEX);
    let tracer = Tracer {
        collidables,
        source_id,
        listener_pos,
        listener_radius,
        params,
    };

    let mut score = 0u32;
    let mut segments = Vec::new();
    for i in 0..params.num_rays {
        let direction = fibonacci_sphere_direction(i, params.num_rays);
        let outcome = tracer.trace_visual(source_pos, direction, 0, &mut segments);
        if outcome.hit_listener {
            if let Some(bounces) = outcome.bounces {
                score += score_for_bounces(bounces, &table);
            }
        }
    }
    Evaluation { score, segments }
}

/// Reduced-resolution scoring for optimizer candidates.
///
/// Pure function of its inputs: no segments, no mutation, safe to call many
/// times per optimizer step. Both the source and the listener must already be
/// excluded from `collidables`; candidate positions are hypothetical, so the
/// source object cannot act as an occluder here.
pub fn score(
    collidables: &[&SceneObject],
    source_pos: Vec3,
    listener_pos: Vec3,
    listener_radius: f32,
    params: &SimulationParams,
) -> u32 {
    let table = fibonacci_table(FIBONACCI_SCORE_CAP_INDEX);
    let tracer = Tracer {
        collidables,
        source_id: None,
        listener_pos,
        listener_radius,
        params,
    };

    let num_rays = reduced_ray_count(params.num_rays);
    let mut total = 0u32;
    for i in 0..num_rays {
        let direction = fibonacci_sphere_direction(i, num_rays);
        if let Some(bounces) = tracer.trace_score(source_pos, direction, 0) {
            total += score_for_bounces(bounces, &table);
        }
    }
    total
}

struct TraceOutcome {
    hit_listener: bool,
    /// Smallest bounce depth at which this path reached the listener
    bounces: Option<u32>,
}

impl TraceOutcome {
    fn none() -> Self {
        Self {
            hit_listener: false,
            bounces: None,
        }
    }
}

struct Tracer<'a> {
    collidables: &'a [&'a SceneObject],
    source_id: Option<Uuid>,
    listener_pos: Vec3,
    listener_radius: f32,
    params: &'a SimulationParams,
}

impl Tracer<'_> {
    fn ignore_at(&self, depth: u32) -> Option<Uuid> {
        // Depth-0 rays originate at the source; deeper segments may be
        // occluded by it.
        if depth == 0 { self.source_id } else { None }
    }

    fn opacity_at(&self, depth: u32) -> f32 {
        self.params.initial_ray_opacity * self.params.attenuation_factor.powi(depth as i32)
    }

    /// Whether the segment from `origin` of length `ray_length` passes
    /// through the listener sphere before any occluding geometry.
    fn segment_hits_listener(
        &self,
        origin: Vec3,
        direction: Vec3,
        ray_length: f32,
        hit: &RayHit,
    ) -> bool {
        let t = (self.listener_pos - origin).dot(direction);
        let closest = if t <= 0.0 {
            origin
        } else if t >= ray_length {
            origin + direction * ray_length
        } else {
            origin + direction * t
        };
        if (closest - self.listener_pos).length() >= self.listener_radius {
            return false;
        }
        let dist_to_closest = (closest - origin).length();
        !hit.hit || hit.distance > dist_to_closest
    }

    /// Scoring-only trace: bounce count if the path reaches the listener.
    fn trace_score(&self, origin: Vec3, direction: Vec3, depth: u32) -> Option<u32> {
        if depth > self.params.max_bounces {
            return None;
        }
        let hit = cast_ray(
            origin,
            direction,
            MAX_RAY_DISTANCE,
            self.collidables,
            self.ignore_at(depth),
        );
        let ray_length = if hit.hit { hit.distance } else { MAX_RAY_DISTANCE };

        if self.segment_hits_listener(origin, direction, ray_length, &hit) {
            return Some(depth);
        }

        if hit.hit && depth < self.params.max_bounces {
            if self.opacity_at(depth) < MIN_RAY_OPACITY {
                return None;
            }
            let reflected = reflect(direction, hit.normal);
            let next_origin = hit.point + reflected * SURFACE_OFFSET;
            return self.trace_score(next_origin, reflected, depth + 1);
        }
        None
    }

    /// Visual trace: appends drawable segments and propagates the deepest
    /// listener hit upward, keeping the smallest bounce count on the path.
    fn trace_visual(
        &self,
        origin: Vec3,
        direction: Vec3,
        depth: u32,
        out: &mut Vec<RaySegment>,
    ) -> TraceOutcome {
        if depth > self.params.max_bounces {
            return TraceOutcome::none();
        }
        let hit = cast_ray(
            origin,
            direction,
            MAX_RAY_DISTANCE,
            self.collidables,
            self.ignore_at(depth),
        );
        let ray_length = if hit.hit { hit.distance } else { MAX_RAY_DISTANCE };
        let end = origin + direction * ray_length;

        let mut color = BOUNCE_COLORS[depth as usize % BOUNCE_COLORS.len()];
        let mut opacity = self.opacity_at(depth);
        let mut result = TraceOutcome::none();

        let listener_hit_here = self.segment_hits_listener(origin, direction, ray_length, &hit);
        if listener_hit_here {
            color = LISTENER_RAY_COLOR;
            result.hit_listener = true;
            result.bounces = Some(depth);
            // The arriving segment is drawn at full opacity for clarity.
            opacity = self.params.initial_ray_opacity;
        }

        let mut reflection = TraceOutcome::none();
        if hit.hit && depth < self.params.max_bounces {
            let keep_tracing = opacity >= MIN_RAY_OPACITY
                || (self.params.show_only_listener_rays && result.hit_listener);
            if keep_tracing {
                let reflected = reflect(direction, hit.normal);
                let next_origin = hit.point + reflected * SURFACE_OFFSET;
                reflection = self.trace_visual(next_origin, reflected, depth + 1, out);
                if reflection.hit_listener {
                    result.hit_listener = true;
                    result.bounces = match (result.bounces, reflection.bounces) {
                        (Some(a), Some(b)) => Some(a.min(b)),
                        (a, b) => a.or(b),
                    };
                }
            }
        }

        let should_draw = opacity >= MIN_RAY_OPACITY
            && (!self.params.show_only_listener_rays
                || result.hit_listener
                || reflection.hit_listener);
        if should_draw {
            out.push(RaySegment {
                start: origin,
                end,
                color,
                opacity,
            });
        }
        result
    }
}
