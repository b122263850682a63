//! The set of committed trajectories for one tick, plus the per-entity caches
//! the collision search needs: movement steps, bounding box and intercept
//! samples. Rebuilt every tick; updated in place whenever a plan is committed.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;

use crate::collision::{movement_collision, BoundingBox};
use crate::config::NavConfig;
use crate::error::NavError;
use crate::structs::{Collision, EntityId, Goal, MapBounds, Movement, Point};
use crate::trajectory::Trajectory;

/// A committed trajectory with its derived caches.
#[derive(Debug, Clone)]
pub struct EntityPlan {
    pub trajectory: Trajectory,
    /// Positions every `collision_increment` units, for intercept search.
    pub samples: Vec<Point>,
    pub bounds: BoundingBox,
    /// The trajectory cut into `max_speed` steps.
    pub steps: Vec<Movement>,
}

impl EntityPlan {
    fn build(trajectory: Trajectory, config: &NavConfig) -> Self {
        EntityPlan {
            samples: trajectory.incremental_positions(config.collision_increment).collect(),
            bounds: BoundingBox::from_trajectory(&trajectory),
            steps: trajectory.subdivide(config.max_speed),
            trajectory,
        }
    }

    /// Where the entity is during step `index`; parked at its end once its
    /// own steps run out.
    fn step_at(&self, index: usize) -> Movement {
        self.steps
            .get(index)
            .copied()
            .unwrap_or_else(|| Movement::stationary(self.trajectory.entity, self.trajectory.end()))
    }
}

#[derive(Debug, Clone)]
pub struct WorldSnapshot {
    config: NavConfig,
    map_bounds: Option<MapBounds>,
    plans: BTreeMap<EntityId, EntityPlan>,
}

impl WorldSnapshot {
    pub fn new(
        config: &NavConfig,
        map_bounds: Option<MapBounds>,
        trajectories: impl IntoIterator<Item = Trajectory>,
    ) -> Self {
        let plans = trajectories
            .into_iter()
            .map(|t| (t.entity.id, EntityPlan::build(t, config)))
            .collect();

        WorldSnapshot {
            config: config.clone(),
            map_bounds,
            plans,
        }
    }

    /// Commits `trajectory`, replacing whatever its entity had before.
    pub fn update(&mut self, trajectory: Trajectory) {
        let id = trajectory.entity.id;
        self.plans.insert(id, EntityPlan::build(trajectory, &self.config));
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    pub fn plan(&self, id: EntityId) -> Option<&EntityPlan> {
        self.plans.get(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.plans.len()
    }

    /// Earliest collision of `path` against every other committed trajectory,
    /// looking no further than `max_distance` along `path`.
    ///
    /// `path` is walked in `max_speed` steps. Step `i` is compared with each
    /// candidate's step `i + path.time_offset`, so continuation segments line
    /// up with where the others will be by then. Leaving the map counts as a
    /// collision with the navigating entity itself.
    pub fn find_collision(
        &self,
        path: &Trajectory,
        ignore: Option<EntityId>,
        max_distance: f64,
    ) -> Option<Collision> {
        let max_speed = self.config.max_speed;
        let steps = path.subdivide(max_speed);

        let candidates: Vec<&EntityPlan> = self
            .plans
            .iter()
            .filter(|(id, _)| **id != path.entity.id && Some(**id) != ignore)
            .map(|(_, plan)| plan)
            .filter(|plan| plan.bounds.intersects_path(path, max_distance))
            .collect();

        let mut travelled = 0.0;

        for (i, step) in steps.iter().enumerate() {
            if travelled > max_distance {
                break;
            }

            if let Some(bounds) = &self.map_bounds {
                if step.end.is_outside(bounds) {
                    return Some(Collision::new(path.entity, step.lerp(0.5), travelled));
                }
            }

            let step_index = i + path.time_offset;

            let earliest = candidates
                .iter()
                .filter_map(|plan| {
                    let collider_step = plan.step_at(step_index);
                    let combined_radius = path.entity.radius + collider_step.entity.radius;

                    // Too far apart to meet within one step.
                    let mut reach = combined_radius + max_speed;
                    if collider_step.entity.is_agent() {
                        reach += max_speed;
                    }
                    if collider_step.start.distance(&step.start) > reach {
                        return None;
                    }

                    movement_collision(step, &collider_step, combined_radius, travelled)
                })
                .min_by_key(|collision| OrderedFloat(collision.distance));

            if earliest.is_some() {
                return earliest;
            }

            travelled += step.distance();
        }

        None
    }

    /// Where to aim for `goal` from `start`.
    ///
    /// A fixed point is approached directly. A tracked entity is searched
    /// along its committed samples, starting `distance_offset` into them: the
    /// first sample reachable within the distance the entity itself covers by
    /// then wins, otherwise the approach to its final sample.
    pub fn find_intercept_position(
        &self,
        start: Point,
        distance_offset: f64,
        goal: &Goal,
    ) -> Result<Point, NavError> {
        let Some(target) = goal.tracked_entity() else {
            return Ok(goal.approach_point_from(start));
        };

        let plan = self
            .plans
            .get(&target.id)
            .ok_or(NavError::UnknownEntity(target.id))?;

        let samples = &plan.samples;
        let Some(&final_sample) = samples.last() else {
            return Ok(goal.approach_point_from(start));
        };
        let last = samples.len() - 1;

        let increment = self.config.collision_increment;
        let start_index = distance_offset / increment;
        let lerp = start_index.fract();

        let mut index = start_index;
        while index < samples.len() as f64 {
            let allowed = (index - start_index) * increment;

            let floor = (index.floor() as usize).min(last);
            let ceil = (floor + 1).min(last);
            let position = samples[floor].lerp(&samples[ceil], lerp);

            let intercept = goal.approach_point_toward(start, position);
            if intercept.distance(&start) <= allowed {
                return Ok(intercept);
            }

            index += 1.0;
        }

        Ok(goal.approach_point_toward(start, final_sample))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::BoundedEntity;
    use approx::assert_abs_diff_eq;

    fn agent(id: usize, x: f64, y: f64) -> BoundedEntity {
        BoundedEntity::agent(id, Point::new(x, y), 0.5)
    }

    fn rock(id: usize, x: f64, y: f64, radius: f64) -> BoundedEntity {
        BoundedEntity::obstacle(id, Point::new(x, y), radius)
    }

    fn world(trajectories: Vec<Trajectory>) -> WorldSnapshot {
        WorldSnapshot::new(&NavConfig::default(), None, trajectories)
    }

    // ==================== Bookkeeping ====================

    #[test]
    fn test_update_replaces_plan() {
        let me = agent(0, 0.0, 0.0);
        let mut w = world(vec![Trajectory::create_static(me)]);
        assert_eq!(w.plan(0).unwrap().steps.len(), 0);
        assert_eq!(w.plan(0).unwrap().samples.len(), 1);

        w.update(Trajectory::create_simple(me, Point::new(10.0, 0.0)));
        let plan = w.plan(0).unwrap();
        assert_eq!(w.len(), 1);
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.samples.len(), 12);
        assert_eq!(plan.bounds.max_x, 10.5);
    }

    // ==================== Collision search ====================

    #[test]
    fn test_find_collision_static_obstacle() {
        let me = agent(0, 0.0, 0.0);
        let w = world(vec![Trajectory::create_static(rock(1, 10.0, 0.0, 1.0))]);
        let path = Trajectory::create_simple(me, Point::new(20.0, 0.0));

        let collision = w.find_collision(&path, None, f64::MAX).unwrap();
        assert_eq!(collision.collider.id, 1);
        assert_abs_diff_eq!(collision.distance, 8.5, epsilon = 1e-9);
        assert_eq!(collision.position, Point::new(10.0, 0.0));
    }

    #[test]
    fn test_find_collision_respects_max_distance() {
        let me = agent(0, 0.0, 0.0);
        let w = world(vec![Trajectory::create_static(rock(1, 20.0, 0.0, 1.0))]);
        let path = Trajectory::create_simple(me, Point::new(30.0, 0.0));

        assert!(w.find_collision(&path, None, 10.0).is_none());
        assert!(w.find_collision(&path, None, f64::MAX).is_some());
    }

    #[test]
    fn test_find_collision_skips_self_and_ignored() {
        let me = agent(0, 0.0, 0.0);
        let target = agent(1, 5.0, 0.0);
        let w = world(vec![Trajectory::create_static(me), Trajectory::create_static(target)]);
        let path = Trajectory::create_simple(me, Point::new(10.0, 0.0));

        assert!(w.find_collision(&path, Some(1), f64::MAX).is_none());
        assert_eq!(w.find_collision(&path, None, f64::MAX).unwrap().collider.id, 1);
    }

    #[test]
    fn test_find_collision_picks_earliest_candidate() {
        let me = agent(0, 0.0, 0.0);
        let w = world(vec![
            Trajectory::create_static(rock(1, 6.0, 0.6, 1.0)),
            Trajectory::create_static(rock(2, 4.0, -0.6, 1.0)),
        ]);
        let path = Trajectory::create_simple(me, Point::new(7.0, 0.0));

        assert_eq!(w.find_collision(&path, None, f64::MAX).unwrap().collider.id, 2);
    }

    #[test]
    fn test_find_collision_aligns_time_offset() {
        // The other agent crosses our line during its first step only.
        let other = agent(1, 3.0, -3.0);
        let w = world(vec![Trajectory::create_simple(other, Point::new(3.0, 25.0))]);

        let me = agent(0, 0.0, 0.0);
        let now = Trajectory::create_simple(me, Point::new(6.0, 0.0));
        assert!(w.find_collision(&now, None, f64::MAX).is_some());

        let mut later = now.clone();
        later.time_offset = 1;
        assert!(w.find_collision(&later, None, f64::MAX).is_none());
    }

    #[test]
    fn test_find_collision_parks_finished_colliders() {
        // The other agent arrives during step 0 and stays at its end.
        let other = agent(1, 20.0, 10.0);
        let w = world(vec![Trajectory::create_simple(other, Point::new(20.0, 5.0))]);

        let me = agent(0, 0.0, 5.0);
        let path = Trajectory::create_simple(me, Point::new(30.0, 5.0));
        let collision = w.find_collision(&path, None, f64::MAX).unwrap();
        assert_eq!(collision.collider.id, 1);
        assert_eq!(collision.position, Point::new(20.0, 5.0));
    }

    #[test]
    fn test_leaving_map_is_a_collision() {
        let me = agent(0, 5.0, 5.0);
        let w = WorldSnapshot::new(&NavConfig::default(), Some(MapBounds::new(100.0, 50.0)), Vec::<Trajectory>::new());
        let path = Trajectory::create_simple(me, Point::new(5.0, -5.0));

        let collision = w.find_collision(&path, None, f64::MAX).unwrap();
        assert_eq!(collision.collider, me);
        assert_eq!(collision.distance, 0.0);
        assert_abs_diff_eq!(collision.position.y, 1.5, epsilon = 1e-9);

        let inside = Trajectory::create_simple(me, Point::new(50.0, 25.0));
        assert!(w.find_collision(&inside, None, f64::MAX).is_none());
    }

    // ==================== Intercepts ====================

    #[test]
    fn test_intercept_fixed_point() {
        let w = world(vec![]);
        let goal = Goal::point(Point::new(10.0, 0.0), 2.0);
        let aim = w.find_intercept_position(Point::new(0.0, 0.0), 0.0, &goal).unwrap();
        assert_abs_diff_eq!(aim.x, 8.0, epsilon = 1e-9);
    }

    #[test]
    fn test_intercept_static_entity() {
        let target = rock(1, 10.0, 0.0, 1.0);
        let w = world(vec![Trajectory::create_static(target)]);
        let goal = Goal::entity(target, 0.5, false);
        let aim = w.find_intercept_position(Point::new(0.0, 0.0), 0.0, &goal).unwrap();
        assert_abs_diff_eq!(aim.x, 8.5, epsilon = 1e-9);
        assert_abs_diff_eq!(aim.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_intercept_leads_moving_entity() {
        let target = agent(1, 10.0, 0.0);
        let w = world(vec![Trajectory::create_simple(target, Point::new(10.0, 20.0))]);
        let goal = Goal::entity(target, 0.0, false);
        let aim = w.find_intercept_position(Point::new(0.0, 10.0), 0.0, &goal).unwrap();

        // The target reaches (10, 10) after 10 units; we reach its hull in 9.5.
        assert_abs_diff_eq!(aim.x, 9.5, epsilon = 1e-9);
        assert_abs_diff_eq!(aim.y, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_intercept_falls_back_to_final_sample() {
        let target = agent(1, 10.0, 0.0);
        let w = world(vec![Trajectory::create_simple(target, Point::new(10.0, 3.0))]);
        let goal = Goal::entity(target, 0.0, false);
        let aim = w.find_intercept_position(Point::new(-50.0, 0.0), 0.0, &goal).unwrap();

        // Nothing is reachable in time; approach the final sample's hull.
        let expected = Point::new(10.0, 3.0) + (Point::new(-50.0, 0.0) - Point::new(10.0, 3.0)).normalize() * 0.5;
        assert_abs_diff_eq!(aim.x, expected.x, epsilon = 1e-9);
        assert_abs_diff_eq!(aim.y, expected.y, epsilon = 1e-9);
    }

    #[test]
    fn test_intercept_unknown_entity() {
        let w = world(vec![]);
        let goal = Goal::entity(agent(7, 1.0, 1.0), 0.0, false);
        let err = w.find_intercept_position(Point::new(0.0, 0.0), 0.0, &goal).unwrap_err();
        assert!(matches!(err, NavError::UnknownEntity(7)));
    }

    #[test]
    fn test_mutual_pursuit_with_ignore_goes_straight() {
        let a = agent(0, 0.0, 0.0);
        let b = agent(1, 10.0, 0.0);
        let w = world(vec![Trajectory::create_static(a), Trajectory::create_static(b)]);

        let path_a =
            Trajectory::create_modified(a, a.position, &Goal::entity(b, 0.0, true), &w, 0.0, 0, 7).unwrap();
        let path_b =
            Trajectory::create_modified(b, b.position, &Goal::entity(a, 0.0, true), &w, 0.0, 0, 7).unwrap();

        assert_eq!(path_a.frames.len(), 2);
        assert_eq!(path_b.frames.len(), 2);
        // Aimed at the far hull, rounded up to whole thrust units.
        assert_abs_diff_eq!(path_a.end().x, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(path_b.end().x, 0.0, epsilon = 1e-9);
        assert!(path_a.frames.iter().chain(&path_b.frames).all(|p| p.y.abs() < 1e-9));
    }
}
