//! # Continuous Collision Detection
//!
//! Pure functions answering "when do these two moving circles first touch?"
//! plus the axis-aligned box tests used to prune candidates before any exact
//! math runs.
//!
//! ## Moving circles
//!
//! Both movements are linear over the same parametric time `t ∈ [0, 1]`.
//! Subtracting the collider's displacement from the navigating movement leaves
//! a single segment against a stationary point, which reduces the problem to
//! the circle/segment quadratic
//!
//! ```text
//! |f + t·d|² = r²   with   f = start - p,  d = end' - start
//! ```
//!
//! Only the entry root is ever reported. A segment that begins inside the
//! circle is reported at `t = 0` rather than at its exit, so "already
//! touching" counts as an immediate hazard.
//!
//! ## Broad phase
//!
//! A full N×N continuous check per tick is far too slow, so every candidate
//! collider first has to pass a slab test of the navigating path against the
//! collider's inflated bounding box.

use crate::structs::{Collision, EntityId, Movement, Point};
use crate::trajectory::Trajectory;

/// Two step lengths closer than this are the same step.
const STEP_EPSILON: f64 = 0.0001;
/// Remaining distances closer than this are considered equal.
const REMAINING_EPSILON: f64 = 0.001;

/// Earliest `t ∈ [0, 1]` at which `movement` comes within `distance` of the
/// stationary point `p`.
pub fn collision_time(p: Point, movement: &Movement, distance: f64) -> Option<f64> {
    if movement.stands_still() {
        return (p.distance(&movement.start) <= distance).then_some(0.0);
    }

    let d = movement.delta();
    let f = movement.start - p;

    let a = d.dot(&d);
    let b = 2.0 * f.dot(&d);
    let c = f.dot(&f) - distance * distance;

    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }

    let t1 = (-b - discriminant.sqrt()) / (2.0 * a);

    // Impale or poke: the entry point lies on the segment.
    if (0.0..=1.0).contains(&t1) {
        return Some(t1);
    }

    // Exit wound or completely inside: we start out touching.
    if p.distance(&movement.start) <= distance {
        return Some(0.0);
    }

    // Falls short or already past.
    None
}

/// Earliest shared `t` at which the two movements come within `distance`.
pub fn movement_collision_time(movement: &Movement, collider: &Movement, distance: f64) -> Option<f64> {
    let relative = Movement::new(movement.entity, movement.start, movement.end - collider.delta());
    collision_time(collider.start, &relative, distance)
}

/// Like [`movement_collision_time`], expressed as a [`Collision`] whose
/// distance counts from `travelled` (the distance covered before `movement`).
pub fn movement_collision(
    movement: &Movement,
    collider: &Movement,
    distance: f64,
    travelled: f64,
) -> Option<Collision> {
    movement_collision_time(movement, collider, distance).map(|t| {
        Collision::new(
            collider.entity,
            collider.lerp(t),
            travelled + movement.distance() * t,
        )
    })
}

/// Shortest distance from `point` to the segment, with the segment parameter
/// of the closest point.
pub fn point_distance_to_segment(point: Point, movement: &Movement) -> (f64, f64) {
    let d = movement.delta();
    let length_sq = d.dot(&d);
    if length_sq == 0.0 {
        return (point.distance(&movement.start), 0.0);
    }

    let t = ((point - movement.start).dot(&d) / length_sq).clamp(0.0, 1.0);
    (point.distance(&movement.lerp(t)), t)
}

/// Splits the remaining lengths of two lockstep movements into the next pair
/// of steps.
///
/// If both are at least `max_speed` long, both advance by the same whole
/// multiple of `max_speed` (15 and 8 become 7 and 7). Otherwise each is capped
/// at `max_speed` on its own (6 and 8 become 6 and 7). Equal remainders always
/// advance fully, and a collider with nothing left lets the navigator finish
/// its movement in one step.
pub fn lockstep_steps(nav_remaining: f64, collider_remaining: f64, max_speed: f64) -> (f64, f64) {
    let both_long = nav_remaining >= max_speed && collider_remaining >= max_speed;
    let (mut nav_step, mut collider_step) = if both_long {
        let shared = (nav_remaining - nav_remaining % max_speed)
            .min(collider_remaining - collider_remaining % max_speed);
        (shared, shared)
    } else {
        (nav_remaining.min(max_speed), collider_remaining.min(max_speed))
    };

    if (nav_remaining - collider_remaining).abs() < REMAINING_EPSILON {
        nav_step = nav_remaining;
        collider_step = collider_remaining;
    }
    if collider_remaining.abs() < REMAINING_EPSILON {
        nav_step = nav_remaining;
    }

    (nav_step, collider_step)
}

/// Walks a trajectory frame by frame in arbitrary step lengths.
struct PathCursor<'a> {
    path: &'a Trajectory,
    frame: usize,
    frame_distance: f64,
    distance: f64,
}

impl<'a> PathCursor<'a> {
    fn at_distance(path: &'a Trajectory, distance: f64) -> Self {
        let frame = path.movement_frame_at_distance(distance);
        PathCursor {
            path,
            frame,
            frame_distance: path.distance_at_frame(frame),
            distance,
        }
    }

    fn movement(&self) -> Movement {
        self.path.movement_at_frame(self.frame)
    }

    fn remaining(&self, movement: &Movement) -> f64 {
        movement.distance() - (self.distance - self.frame_distance)
    }

    fn advance(&mut self, movement: &Movement, remaining: f64, step: f64) -> Point {
        let position = if movement.stands_still() {
            movement.start
        } else {
            movement.lerp((self.distance - self.frame_distance + step) / movement.distance())
        };

        self.distance += step;
        if (step - remaining).abs() < STEP_EPSILON {
            self.frame += 1;
            self.frame_distance += movement.distance();
        }
        position
    }
}

/// First collision of `path` against another committed trajectory.
///
/// Both paths are walked in lockstep (see [`lockstep_steps`]); `collider` is
/// entered at `path`'s distance offset so continuations line up with where the
/// collider will be by then.
pub fn find_collision_between_paths(
    path: &Trajectory,
    collider: &Trajectory,
    ignore: Option<EntityId>,
    max_distance: f64,
    max_speed: f64,
) -> Option<Collision> {
    if collider.entity == path.entity || Some(collider.entity.id) == ignore {
        return None;
    }

    let mut nav = PathCursor::at_distance(path, 0.0);
    let mut other = PathCursor::at_distance(collider, path.distance_offset);

    let mut nav_positions = vec![path.position_at_frame(0)];
    let mut collider_positions = vec![collider.position_at_distance(path.distance_offset)];

    while nav.frame < path.frames.len() && nav.distance < max_distance {
        let nav_movement = nav.movement();
        let collider_movement = other.movement();

        let nav_remaining = nav.remaining(&nav_movement);
        let collider_remaining = other.remaining(&collider_movement);
        let (nav_step, collider_step) = lockstep_steps(nav_remaining, collider_remaining, max_speed);

        nav_positions.push(nav.advance(&nav_movement, nav_remaining, nav_step));
        collider_positions.push(other.advance(&collider_movement, collider_remaining, collider_step));
    }

    let combined_radius = path.entity.radius + collider.entity.radius;
    let mut travelled = 0.0;

    for (nav_pair, collider_pair) in nav_positions.windows(2).zip(collider_positions.windows(2)) {
        let nav_movement = Movement::new(path.entity, nav_pair[0], nav_pair[1]);
        let collider_movement = Movement::new(collider.entity, collider_pair[0], collider_pair[1]);

        if let Some(collision) = movement_collision(&nav_movement, &collider_movement, combined_radius, travelled) {
            return Some(collision);
        }
        travelled += nav_movement.distance();
    }

    None
}

/// Axis-aligned box used for broad-phase pruning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Box around every frame of the trajectory, inflated by its entity's radius.
    pub fn from_trajectory(path: &Trajectory) -> Self {
        let radius = path.entity.radius;
        let mut bounds = BoundingBox {
            min_x: f64::MAX,
            max_x: f64::MIN,
            min_y: f64::MAX,
            max_y: f64::MIN,
        };

        for frame in &path.frames {
            bounds.min_x = bounds.min_x.min(frame.x - radius);
            bounds.max_x = bounds.max_x.max(frame.x + radius);
            bounds.min_y = bounds.min_y.min(frame.y - radius);
            bounds.max_y = bounds.max_y.max(frame.y + radius);
        }

        bounds
    }

    pub fn inflate(&self, radius: f64) -> Self {
        BoundingBox {
            min_x: self.min_x - radius,
            max_x: self.max_x + radius,
            min_y: self.min_y - radius,
            max_y: self.max_y + radius,
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    /// Slab test: the parameter at which the segment `start`–`end` enters the
    /// box (0 if it starts inside), or `None` if it never touches it.
    pub fn segment_entry(&self, start: Point, end: Point) -> Option<f64> {
        let mut t_min = f64::NEG_INFINITY;
        let mut t_max = f64::INFINITY;

        let slabs = [
            (start.x, end.x - start.x, self.min_x, self.max_x),
            (start.y, end.y - start.y, self.min_y, self.max_y),
        ];

        for (origin, direction, low, high) in slabs {
            if direction.abs() < f64::EPSILON {
                // Parallel to this slab: inside it forever or never.
                if origin < low || origin > high {
                    return None;
                }
                continue;
            }

            let t1 = (low - origin) / direction;
            let t2 = (high - origin) / direction;
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));
        }

        if t_max < t_min || t_min > 1.0 || t_max < 0.0 {
            return None;
        }

        Some(t_min.max(0.0))
    }

    /// Whether `path`, swept with its own radius, reaches this box within
    /// `max_distance` of travel.
    pub fn intersects_path(&self, path: &Trajectory, max_distance: f64) -> bool {
        let inflated = self.inflate(path.entity.radius);

        if path.frames.len() == 1 {
            return inflated.contains(path.frames[0]);
        }

        let mut distance = 0.0;
        for segment in path.frames.windows(2) {
            let length = segment[0].distance(&segment[1]);
            if let Some(t) = inflated.segment_entry(segment[0], segment[1]) {
                return distance + length * t <= max_distance;
            }

            distance += length;
            if distance > max_distance {
                return false;
            }
        }

        false
    }
}
