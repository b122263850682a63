//! # Trajectories
//!
//! A trajectory is one agent's plan for the current tick: an ordered list of
//! frames where each consecutive pair is one unit of travel time.
//!
//! ## Avoidance construction
//!
//! [`Trajectory::create_modified`] aims straight at the goal's intercept
//! point, then repeatedly bisects the path around whatever it would hit first:
//!
//! 1. Find the earliest collision along the current two-frame path.
//! 2. With budget left, replace the second frame by a tangent point that
//!    grazes the collider's expanded circle (on the side nearer the goal). On
//!    the last iteration, replace it by a stop point short of the collision.
//! 3. Re-check the shortened first half, one level deeper.
//! 4. Build the continuation from the new waypoint to the goal, one level
//!    deeper, and append it.
//!
//! The depth grows by one on every recursive call and stops at
//! `max_iterations`, which keeps the worst case predictable. When the budget is
//! exhausted and a collision remains, the trajectory is cut short before it
//! and marked volatile for the batch-level convergence pass.

use crate::commands::Move;
use crate::error::NavError;
use crate::structs::{
    angle_rad_to_deg_clipped, BoundedEntity, Collision, EntityId, Goal, Movement, Point, CEIL_EPSILON,
    STANDS_STILL_EPSILON,
};
use crate::world::WorldSnapshot;

/// Aim points closer than this to the start are not worth planning around.
const MIN_PLANNED_DISTANCE: f64 = 0.01;
/// Anything shorter produces a zero-thrust move.
const MIN_THRUST_DISTANCE: f64 = 0.01;
/// Smallest sampling increment accepted by [`IncrementalPositions`].
const MIN_SAMPLE_INCREMENT: f64 = 0.001;

#[derive(Debug, Clone)]
pub struct Trajectory {
    pub entity: BoundedEntity,
    pub goal: Option<Goal>,
    /// Never empty.
    pub frames: Vec<Point>,
    /// Distance already travelled before this trajectory starts, when it is
    /// the continuation of an earlier segment.
    pub distance_offset: f64,
    /// Sub-steps already elapsed before this trajectory starts.
    pub time_offset: usize,
    /// Still in conflict after the avoidance budget ran out.
    pub volatile: bool,
}

impl Trajectory {
    pub fn from_frames(entity: BoundedEntity, mut frames: Vec<Point>) -> Self {
        if frames.is_empty() {
            frames.push(entity.position);
        }
        Trajectory {
            entity,
            goal: None,
            frames,
            distance_offset: 0.0,
            time_offset: 0,
            volatile: false,
        }
    }

    /// The entity stays where it is.
    pub fn create_static(entity: BoundedEntity) -> Self {
        Trajectory::from_frames(entity, vec![entity.position])
    }

    /// A direct line to `target`, without avoidance.
    pub fn create_simple(entity: BoundedEntity, target: Point) -> Self {
        Trajectory::from_frames(entity, vec![entity.position, target])
    }

    /// Assumes the entity keeps its last observed displacement for
    /// `lookahead` more ticks.
    pub fn create_extrapolated(entity: BoundedEntity, previous_position: Point, lookahead: u32) -> Self {
        let displacement = entity.position - previous_position;
        let projected = entity.position + displacement * f64::from(lookahead);
        Trajectory::from_frames(entity, vec![entity.position, projected])
    }

    /// Plans from `start` towards `goal` around everything in `world`.
    pub fn create_modified(
        entity: BoundedEntity,
        start: Point,
        goal: &Goal,
        world: &WorldSnapshot,
        distance_offset: f64,
        time_offset: usize,
        max_iterations: usize,
    ) -> Result<Self, NavError> {
        Self::create_modified_at(entity, start, goal, world, distance_offset, time_offset, max_iterations, 0)
    }

    #[allow(clippy::too_many_arguments)]
    fn create_modified_at(
        entity: BoundedEntity,
        start: Point,
        goal: &Goal,
        world: &WorldSnapshot,
        distance_offset: f64,
        time_offset: usize,
        max_iterations: usize,
        iteration: usize,
    ) -> Result<Self, NavError> {
        let target = world.find_intercept_position(start, distance_offset, goal)?;

        let mut path = Trajectory {
            entity,
            goal: Some(*goal),
            frames: vec![start, start.overshoot_point(&target)],
            distance_offset,
            time_offset,
            volatile: false,
        };

        if path.movement_at_frame(0).distance() < MIN_PLANNED_DISTANCE {
            return Ok(path);
        }

        path.modify(world, goal, max_iterations, iteration, false)?;
        Ok(path)
    }

    /// One level of avoidance on a two-frame path. See the module docs.
    pub fn modify(
        &mut self,
        world: &WorldSnapshot,
        goal: &Goal,
        max_iterations: usize,
        iteration: usize,
        only_first_half: bool,
    ) -> Result<(), NavError> {
        if only_first_half && iteration >= max_iterations {
            return Ok(());
        }

        let max_distance = if only_first_half {
            self.movement_at_frame(0).distance()
        } else {
            f64::MAX
        };

        let Some(collision) = world.find_collision(self, goal.ignored_entity(), max_distance) else {
            return Ok(());
        };

        let config = world.config();

        if iteration >= max_iterations {
            log::trace!(
                "entity {} out of avoidance budget, stopping before {} at {:.2}",
                self.entity.id,
                collision.collider.id,
                collision.distance
            );
            self.modify_collision_stop(&collision, config.safety_margin);
            self.volatile = true;
            return Ok(());
        }

        let waypoint = if iteration + 1 < max_iterations {
            self.collision_avoidance_point(&collision, goal, config.safety_margin)
        } else {
            self.collision_stop_point(&collision, config.safety_margin)
        };

        let start = self.start();
        self.frames.truncate(1);
        self.frames.push(start.overshoot_point(&waypoint));

        // The waypoint itself may be unreachable; refine the first half.
        self.modify(world, goal, max_iterations, iteration + 1, true)?;

        if !only_first_half {
            let first = self.movement_at_frame(0).distance();
            let continuation = Self::create_modified_at(
                self.entity,
                self.frames[1],
                goal,
                world,
                self.distance_offset + first,
                self.time_offset + steps_to_cover(first, config.max_speed),
                max_iterations,
                iteration + 1,
            )?;

            // The waypoint is shared; keep the continuation's copy.
            self.volatile |= continuation.volatile;
            let shared = self.frames.len() - 1;
            self.combine_with(continuation, shared);
        }

        Ok(())
    }

    /// The collider may only be ignored when it is the goal itself.
    pub fn ignored_entity(&self) -> Option<EntityId> {
        self.goal.as_ref().and_then(Goal::ignored_entity)
    }

    /// A waypoint that slips past the collider on the side closer to the goal,
    /// pushed `safety_margin` beyond the touching distance.
    pub fn collision_avoidance_point(&self, collision: &Collision, goal: &Goal, safety_margin: f64) -> Point {
        let p = self.start();
        let c = collision.position;
        let radius = collision.collider.radius + self.entity.radius;

        let distance = p.distance(&c);
        if distance < radius {
            // No tangents from inside the circle; go nowhere.
            return p;
        }

        let spread = (radius / distance).asin();
        let heading = p.angle_to(&c);

        let t1 = heading - spread;
        let tangent1 = Point::new(c.x + radius * t1.sin(), c.y - radius * t1.cos());
        let t2 = heading + spread;
        let tangent2 = Point::new(c.x - radius * t2.sin(), c.y + radius * t2.cos());

        let target = goal.center();
        let closest = if target.distance(&tangent2) > target.distance(&tangent1) {
            tangent1
        } else {
            tangent2
        };

        c + (closest - c).normalize() * (radius + safety_margin)
    }

    /// The last whole-unit position at least `safety_margin` short of the collision.
    pub fn collision_stop_point(&self, collision: &Collision, safety_margin: f64) -> Point {
        self.position_at_distance(stop_distance(collision, safety_margin))
    }

    /// Cuts the trajectory at the stop point before `collision`, discarding
    /// every frame after it.
    pub fn modify_collision_stop(&mut self, collision: &Collision, safety_margin: f64) {
        if self.frames.len() < 2 {
            return;
        }

        let stop = stop_distance(collision, safety_margin);
        let frame = self.movement_frame_at_distance(stop).min(self.frames.len() - 2);
        let safe_position = self.position_at_distance(stop);

        self.frames[frame + 1] = safe_position;
        self.frames.truncate(frame + 2);
    }

    /// Replaces everything from `index` on with the frames of `addition`.
    pub fn combine_with(&mut self, addition: Trajectory, index: usize) {
        self.frames.truncate(index);
        self.frames.extend(addition.frames);
    }

    pub fn start(&self) -> Point {
        self.frames[0]
    }

    pub fn end(&self) -> Point {
        self.frames[self.frames.len() - 1]
    }

    /// Frame position, clamped to the last frame.
    pub fn position_at_frame(&self, frame: usize) -> Point {
        self.frames[frame.min(self.frames.len() - 1)]
    }

    /// Movement from `frame` to the next one; zero-length past the end.
    pub fn movement_at_frame(&self, frame: usize) -> Movement {
        Movement::new(self.entity, self.position_at_frame(frame), self.position_at_frame(frame + 1))
    }

    pub fn total_distance(&self) -> f64 {
        self.distance_at_frame(self.frames.len())
    }

    /// Position after travelling `distance` along the trajectory, interpolated
    /// inside a frame and clamped to the end.
    pub fn position_at_distance(&self, distance: f64) -> Point {
        let mut total = 0.0;
        for frame in 0..self.frames.len() {
            let movement = self.movement_at_frame(frame);
            if total + movement.distance() > distance {
                return movement.partway_position(distance - total);
            }
            total += movement.distance();
        }
        self.end()
    }

    /// Distance travelled before `frame` starts.
    pub fn distance_at_frame(&self, frame: usize) -> f64 {
        (0..frame).map(|i| self.movement_at_frame(i).distance()).sum()
    }

    /// Index of the movement during which `distance` is reached.
    pub fn movement_frame_at_distance(&self, distance: f64) -> usize {
        let mut total = 0.0;
        for frame in 0..self.frames.len() {
            let movement = self.movement_at_frame(frame);
            if total + movement.distance() >= distance {
                return frame;
            }
            total += movement.distance();
        }
        self.frames.len() - 1
    }

    /// Positions every `increment` units along the trajectory, ending with the
    /// final frame. A trajectory that does not move yields its start only.
    pub fn incremental_positions(&self, increment: f64) -> IncrementalPositions<'_> {
        IncrementalPositions {
            path: self,
            increment: increment.max(MIN_SAMPLE_INCREMENT),
            frame: 0,
            covered: 0.0,
            next_distance: 0.0,
            stationary: self.total_distance() < STANDS_STILL_EPSILON,
            done: false,
        }
    }

    /// Splits every non-zero movement into pieces no longer than `max_speed`.
    pub fn subdivide(&self, max_speed: f64) -> Vec<Movement> {
        let mut steps = Vec::new();

        for frame in 0..self.frames.len().saturating_sub(1) {
            let movement = self.movement_at_frame(frame);
            if movement.stands_still() {
                continue;
            }

            let length = movement.distance();
            let mut travelled = 0.0;
            let mut from = movement.start;

            // A remainder under CEIL_EPSILON is dropped rather than emitted.
            while length - travelled >= CEIL_EPSILON {
                let remaining = length - travelled;
                let to = if remaining <= max_speed {
                    travelled = length;
                    movement.end
                } else {
                    travelled += max_speed;
                    movement.lerp(travelled / length)
                };

                steps.push(Movement::new(self.entity, from, to));
                from = to;
            }
        }

        steps
    }

    /// The thrust command that executes the first movement.
    pub fn to_move(&self, max_speed: f64) -> Move {
        let movement = self.movement_at_frame(0);
        let delta = movement.delta();
        let angle = angle_rad_to_deg_clipped(delta.y.atan2(delta.x));

        let distance = movement.distance();
        let thrust = if distance > MIN_THRUST_DISTANCE {
            (distance - CEIL_EPSILON).ceil()
        } else {
            0.0
        };

        Move::Thrust {
            entity: self.entity.id,
            angle,
            magnitude: thrust.min(max_speed.floor()) as i32,
        }
    }
}

/// How far before `collision` to stop, in whole units.
fn stop_distance(collision: &Collision, safety_margin: f64) -> f64 {
    (collision.distance - safety_margin).max(0.0).floor()
}

/// Number of `max_speed` sub-steps needed to cover `distance`.
fn steps_to_cover(distance: f64, max_speed: f64) -> usize {
    let whole = (distance / max_speed).floor() as usize;
    if distance % max_speed < STANDS_STILL_EPSILON {
        whole
    } else {
        whole + 1
    }
}

/// Lazy sampling of a trajectory at a fixed spatial increment. Finite; call
/// [`Trajectory::incremental_positions`] again to restart.
#[derive(Debug, Clone)]
pub struct IncrementalPositions<'a> {
    path: &'a Trajectory,
    increment: f64,
    frame: usize,
    covered: f64,
    next_distance: f64,
    stationary: bool,
    done: bool,
}

impl Iterator for IncrementalPositions<'_> {
    type Item = Point;

    fn next(&mut self) -> Option<Point> {
        if self.done {
            return None;
        }

        if self.stationary {
            self.done = true;
            return Some(self.path.start());
        }

        while self.frame < self.path.frames.len() {
            let movement = self.path.movement_at_frame(self.frame);
            let frame_end = self.covered + movement.distance();

            if self.next_distance <= frame_end {
                let position = movement.partway_position(self.next_distance - self.covered);
                self.next_distance += self.increment;
                return Some(position);
            }

            self.covered = frame_end;
            self.frame += 1;
        }

        self.done = true;
        Some(self.path.end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::point_distance_to_segment;
    use crate::config::NavConfig;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn agent(id: usize, x: f64, y: f64, radius: f64) -> BoundedEntity {
        BoundedEntity::agent(id, Point::new(x, y), radius)
    }

    fn obstacle(id: usize, x: f64, y: f64, radius: f64) -> BoundedEntity {
        BoundedEntity::obstacle(id, Point::new(x, y), radius)
    }

    fn path(points: &[(f64, f64)]) -> Trajectory {
        let frames: Vec<Point> = points.iter().map(|&(x, y)| Point::new(x, y)).collect();
        Trajectory::from_frames(agent(0, points[0].0, points[0].1, 0.5), frames)
    }

    fn world_of(entities: &[BoundedEntity]) -> WorldSnapshot {
        WorldSnapshot::new(
            &NavConfig::default(),
            None,
            entities.iter().map(|e| Trajectory::create_static(*e)),
        )
    }

    fn min_clearance(trajectory: &Trajectory, center: Point) -> f64 {
        (0..trajectory.frames.len() - 1)
            .map(|i| point_distance_to_segment(center, &trajectory.movement_at_frame(i)).0)
            .fold(f64::INFINITY, f64::min)
    }

    // ==================== Constructors ====================

    #[test]
    fn test_create_static() {
        let e = agent(1, 3.0, 4.0, 0.5);
        let t = Trajectory::create_static(e);
        assert_eq!(t.frames, vec![Point::new(3.0, 4.0)]);
        assert!(!t.volatile);
        assert!(t.goal.is_none());
    }

    #[test]
    fn test_create_extrapolated() {
        let e = agent(1, 10.0, 10.0, 0.5);
        let t = Trajectory::create_extrapolated(e, Point::new(8.0, 9.0), 3);
        assert_eq!(t.frames, vec![Point::new(10.0, 10.0), Point::new(16.0, 13.0)]);
    }

    #[test]
    fn test_from_frames_never_empty() {
        let e = agent(1, 2.0, 2.0, 0.5);
        let t = Trajectory::from_frames(e, Vec::new());
        assert_eq!(t.frames, vec![Point::new(2.0, 2.0)]);
    }

    // ==================== Queries ====================

    #[test]
    fn test_position_at_frame_clamps() {
        let t = path(&[(0.0, 0.0), (3.0, 0.0)]);
        assert_eq!(t.position_at_frame(0), Point::new(0.0, 0.0));
        assert_eq!(t.position_at_frame(5), Point::new(3.0, 0.0));
        assert!(t.movement_at_frame(1).stands_still());
    }

    #[test]
    fn test_position_at_distance() {
        let t = path(&[(0.0, 0.0), (3.0, 0.0), (3.0, 4.0)]);
        assert_eq!(t.position_at_distance(0.0), Point::new(0.0, 0.0));
        assert_eq!(t.position_at_distance(2.0), Point::new(2.0, 0.0));
        assert_eq!(t.position_at_distance(5.0), Point::new(3.0, 2.0));
        assert_eq!(t.position_at_distance(7.0), Point::new(3.0, 4.0));
        assert_eq!(t.position_at_distance(100.0), Point::new(3.0, 4.0));
    }

    #[test]
    fn test_distance_at_frame() {
        let t = path(&[(0.0, 0.0), (3.0, 0.0), (3.0, 4.0)]);
        assert_eq!(t.distance_at_frame(0), 0.0);
        assert_eq!(t.distance_at_frame(1), 3.0);
        assert_eq!(t.distance_at_frame(2), 7.0);
        assert_eq!(t.total_distance(), 7.0);
    }

    #[test]
    fn test_movement_frame_at_distance() {
        let t = path(&[(0.0, 0.0), (3.0, 0.0), (3.0, 4.0)]);
        assert_eq!(t.movement_frame_at_distance(0.0), 0);
        assert_eq!(t.movement_frame_at_distance(3.0), 0);
        assert_eq!(t.movement_frame_at_distance(3.5), 1);
        assert_eq!(t.movement_frame_at_distance(50.0), 2);
    }

    #[test]
    fn test_incremental_positions() {
        let t = path(&[(0.0, 0.0), (2.5, 0.0)]);
        let samples: Vec<Point> = t.incremental_positions(1.0).collect();
        assert_eq!(
            samples,
            vec![
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(2.0, 0.0),
                Point::new(2.5, 0.0),
            ]
        );
    }

    #[test]
    fn test_incremental_positions_zero_length() {
        let still = path(&[(4.0, 4.0), (4.0, 4.0)]);
        assert_eq!(still.incremental_positions(1.0).count(), 1);
        let single = Trajectory::create_static(agent(2, 1.0, 1.0, 0.5));
        assert_eq!(single.incremental_positions(1.0).collect::<Vec<_>>(), vec![Point::new(1.0, 1.0)]);
    }

    #[test]
    fn test_incremental_positions_restartable() {
        let t = path(&[(0.0, 0.0), (0.0, 5.0), (3.0, 5.0)]);
        let first: Vec<Point> = t.incremental_positions(1.0).collect();
        let second: Vec<Point> = t.incremental_positions(1.0).collect();
        assert_eq!(first, second);
        assert_eq!(first.first(), Some(&Point::new(0.0, 0.0)));
        assert_eq!(first.last(), Some(&Point::new(3.0, 5.0)));
        assert!(first.len() >= 9);
    }

    #[test]
    fn test_subdivide() {
        let t = path(&[(0.0, 0.0), (16.0, 0.0), (16.0, 0.0), (16.0, 3.0)]);
        let steps = t.subdivide(7.0);
        let lengths: Vec<f64> = steps.iter().map(Movement::distance).collect();
        assert_eq!(lengths.len(), 4);
        assert_abs_diff_eq!(lengths[0], 7.0, epsilon = 1e-9);
        assert_abs_diff_eq!(lengths[1], 7.0, epsilon = 1e-9);
        assert_abs_diff_eq!(lengths[2], 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(lengths[3], 3.0, epsilon = 1e-9);
        assert_eq!(steps[2].end, Point::new(16.0, 0.0));
    }

    #[test]
    fn test_subdivide_never_exceeds_max_speed() {
        let t = path(&[(0.0, 0.0), (14.00005, 0.0)]);
        let steps = t.subdivide(7.0);
        assert_eq!(steps.len(), 2);
        assert!(steps.iter().all(|s| s.distance() <= 7.0 + 1e-9));
        assert_abs_diff_eq!(steps[1].end.x, 14.0, epsilon = 1e-9);
    }

    #[test]
    fn test_subdivide_static_is_empty() {
        let t = Trajectory::create_static(agent(0, 1.0, 1.0, 0.5));
        assert!(t.subdivide(7.0).is_empty());
    }

    #[test]
    fn test_steps_to_cover() {
        assert_eq!(steps_to_cover(0.0, 7.0), 0);
        assert_eq!(steps_to_cover(7.0, 7.0), 1);
        assert_eq!(steps_to_cover(10.0, 7.0), 2);
        assert_eq!(steps_to_cover(3.0, 7.0), 1);
    }

    // ==================== Moves ====================

    #[test]
    fn test_to_move_heading_and_thrust() {
        let t = path(&[(0.0, 0.0), (0.0, -5.0)]);
        assert_eq!(t.to_move(7.0), Move::Thrust { entity: 0, angle: 270, magnitude: 5 });
    }

    #[test]
    fn test_to_move_clamps_to_max_speed() {
        let t = path(&[(0.0, 0.0), (20.0, 0.0)]);
        assert_eq!(t.to_move(7.0), Move::Thrust { entity: 0, angle: 0, magnitude: 7 });
    }

    #[test]
    fn test_to_move_rounding_noise() {
        let t = path(&[(0.0, 0.0), (3.00000001, 0.0)]);
        assert_eq!(t.to_move(7.0), Move::Thrust { entity: 0, angle: 0, magnitude: 3 });
        let still = Trajectory::create_static(agent(0, 1.0, 1.0, 0.5));
        assert_eq!(still.to_move(7.0), Move::Thrust { entity: 0, angle: 0, magnitude: 0 });
    }

    // ==================== Stops ====================

    #[test]
    fn test_modify_collision_stop_truncates() {
        let mut t = path(&[(0.0, 0.0), (5.0, 0.0), (10.0, 0.0), (15.0, 0.0)]);
        let rock = obstacle(9, 9.0, 0.0, 1.0);
        t.modify_collision_stop(&Collision::new(rock, rock.position, 7.5), 1.0);
        assert_eq!(t.frames, vec![Point::new(0.0, 0.0), Point::new(5.0, 0.0), Point::new(6.0, 0.0)]);
    }

    #[test]
    fn test_modify_collision_stop_at_start() {
        let mut t = path(&[(0.0, 0.0), (5.0, 0.0)]);
        let rock = obstacle(9, 1.0, 0.0, 1.0);
        t.modify_collision_stop(&Collision::new(rock, rock.position, 0.0), 1.0);
        assert_eq!(t.frames, vec![Point::new(0.0, 0.0), Point::new(0.0, 0.0)]);
    }

    #[test]
    fn test_collision_avoidance_point_clears_collider() {
        let t = path(&[(0.0, 0.0), (20.0, 0.0)]);
        let rock = obstacle(9, 10.0, 0.0, 1.0);
        let goal = Goal::point(Point::new(20.0, 3.0), 0.0);
        let waypoint = t.collision_avoidance_point(&Collision::new(rock, rock.position, 8.0), &goal, 1.0);
        // Pushed to combined radius (1.5) + margin from the collider centre,
        // on the side of the goal.
        assert_abs_diff_eq!(waypoint.distance(&rock.position), 2.5, epsilon = 1e-9);
        assert!(waypoint.y > 0.0);
    }

    #[test]
    fn test_collision_avoidance_point_from_inside() {
        let t = path(&[(0.0, 0.0), (20.0, 0.0)]);
        let rock = obstacle(9, 1.0, 0.0, 1.0);
        let goal = Goal::point(Point::new(20.0, 0.0), 0.0);
        let waypoint = t.collision_avoidance_point(&Collision::new(rock, rock.position, 0.0), &goal, 1.0);
        assert_eq!(waypoint, Point::new(0.0, 0.0));
    }

    // ==================== Avoidance scenarios ====================

    #[test]
    fn test_open_field_goes_straight() {
        let me = agent(0, 0.0, 0.0, 1.0);
        let world = world_of(&[me]);
        let goal = Goal::point(Point::new(0.0, 12.0), 0.0);
        let t = Trajectory::create_modified(me, me.position, &goal, &world, 0.0, 0, 7).unwrap();
        assert_eq!(t.frames.len(), 2);
        assert_abs_diff_eq!(t.end().y, 12.0, epsilon = 1e-9);
        assert!(!t.volatile);
    }

    #[test]
    fn test_bends_around_obstacle() {
        let me = agent(0, 0.0, 0.0, 1.0);
        let rock = obstacle(1, 10.0, 0.0, 1.0);
        let world = world_of(&[me, rock]);
        let goal = Goal::point(Point::new(20.0, 0.0), 0.0);

        let t = Trajectory::create_modified(me, me.position, &goal, &world, 0.0, 0, 7).unwrap();

        assert!(t.frames.len() > 2, "path should bend: {:?}", t.frames);
        assert!(t.frames.iter().any(|p| p.y.abs() > 1.0));
        assert!(min_clearance(&t, rock.position) >= 2.0);
        assert!(t.end().distance(&Point::new(20.0, 0.0)) < 1.0);
        // Reachable within four ticks at top speed.
        assert!(t.total_distance() <= 4.0 * 7.0);
        assert!(!t.volatile);
        assert!(world.find_collision(&t, None, f64::MAX).is_none());
    }

    #[test]
    fn test_zero_budget_stops_short_and_is_volatile() {
        let me = agent(0, 0.0, 0.0, 1.0);
        let rock = obstacle(1, 5.0, 0.0, 1.0);
        let world = world_of(&[me, rock]);
        let goal = Goal::point(Point::new(20.0, 0.0), 0.0);

        let t = Trajectory::create_modified(me, me.position, &goal, &world, 0.0, 0, 0).unwrap();

        // First contact after 3 units, stop one unit earlier.
        assert_eq!(t.frames.len(), 2);
        assert_abs_diff_eq!(t.end().x, 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(t.end().y, 0.0, epsilon = 1e-9);
        assert!(t.volatile);
    }

    #[test]
    fn test_single_iteration_stops_short() {
        let me = agent(0, 0.0, 0.0, 1.0);
        let rock = obstacle(1, 5.0, 0.0, 1.0);
        let world = world_of(&[me, rock]);
        let goal = Goal::point(Point::new(20.0, 0.0), 0.0);

        let t = Trajectory::create_modified(me, me.position, &goal, &world, 0.0, 0, 1).unwrap();

        assert!(t.volatile);
        assert!(t.frames.iter().all(|p| p.x <= 2.0 + 1e-9));
        assert_eq!(t.to_move(7.0), Move::Thrust { entity: 0, angle: 0, magnitude: 2 });
    }

    #[test]
    fn test_frame_count_bounded_by_depth() {
        let me = agent(0, 0.0, 0.0, 0.5);
        let mut field = vec![me];
        for (i, x) in [6.0, 12.0, 18.0, 24.0].iter().enumerate() {
            field.push(obstacle(10 + i, *x, (i as f64 - 1.5) * 0.8, 1.5));
        }
        let world = world_of(&field);
        let goal = Goal::point(Point::new(30.0, 0.0), 0.0);

        for max_iterations in 0..=5 {
            let t = Trajectory::create_modified(me, me.position, &goal, &world, 0.0, 0, max_iterations).unwrap();
            assert!(
                t.frames.len() <= max_iterations + 2,
                "depth {} produced {} frames",
                max_iterations,
                t.frames.len()
            );
        }
    }

    #[test]
    fn test_ignored_target_is_rammed() {
        let me = agent(0, 0.0, 0.0, 0.5);
        let target = agent(1, 10.0, 0.0, 0.5);
        let world = world_of(&[me, target]);
        let goal = Goal::entity(target, 0.0, true);

        let t = Trajectory::create_modified(me, me.position, &goal, &world, 0.0, 0, 7).unwrap();

        assert_eq!(t.frames.len(), 2);
        assert!(t.frames.iter().all(|p| p.y.abs() < 1e-9));
        assert_eq!(t.ignored_entity(), Some(1));
    }

    #[test]
    fn test_unknown_goal_entity_is_an_error() {
        let me = agent(0, 0.0, 0.0, 0.5);
        let ghost = agent(42, 10.0, 0.0, 0.5);
        let world = world_of(&[me]);
        let goal = Goal::entity(ghost, 0.0, false);

        let result = Trajectory::create_modified(me, me.position, &goal, &world, 0.0, 0, 7);
        assert!(matches!(result, Err(NavError::UnknownEntity(42))));
    }

    proptest! {
        #[test]
        fn prop_position_at_distance_endpoints(
            points in prop::collection::vec((-100.0f64..100.0, -100.0f64..100.0), 1..6)
        ) {
            let t = path(&points);
            prop_assert_eq!(t.position_at_distance(0.0), t.start());
            prop_assert_eq!(t.position_at_distance(t.total_distance()), t.end());
        }

        #[test]
        fn prop_subdivision_preserves_length(
            points in prop::collection::vec((-100.0f64..100.0, -100.0f64..100.0), 1..6),
            max_speed in 1.0f64..10.0,
        ) {
            let t = path(&points);
            let steps = t.subdivide(max_speed);
            let sum: f64 = steps.iter().map(Movement::distance).sum();
            let still: f64 = (0..t.frames.len())
                .map(|i| t.movement_at_frame(i))
                .filter(Movement::stands_still)
                .map(|m| m.distance())
                .sum();
            let dropped = CEIL_EPSILON * t.frames.len() as f64;
            prop_assert!((sum + still - t.total_distance()).abs() < dropped);
            prop_assert!(steps.iter().all(|s| s.distance() <= max_speed + 1e-9));
        }
    }
}
