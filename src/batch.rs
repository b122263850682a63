//! # Batch planning
//!
//! Turns one tick's worth of commands into executable moves while letting the
//! commanded agents react to each other's intentions.
//!
//! ## Phases
//!
//! 1. **Seed**: obstacles are static, other agents are extrapolated from
//!    their previous position. Agents that will not move this tick (idle,
//!    docking, undocking) are pinned in place.
//! 2. **First pass**: every navigating agent is planned in shuffled order and
//!    committed straight away, so later agents see earlier plans. Only the
//!    first `max_detailed_agents` get the full avoidance depth.
//! 3. **Refinement**: the detailed agents are re-planned a few more times
//!    against the latest snapshot.
//! 4. **Convergence**: trajectories that collide with a volatile one are cut
//!    short and become volatile themselves, until nothing is volatile or the
//!    round cap is reached.
//! 5. **Emit**: the first segment of every plan becomes a thrust.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::Instant;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::collision::find_collision_between_paths;
use crate::commands::{Command, Move};
use crate::config::NavConfig;
use crate::error::NavError;
use crate::structs::{BoundedEntity, Collision, EntityId, EntityKind, Goal, MapBounds, Point};
use crate::trajectory::Trajectory;
use crate::world::WorldSnapshot;

/// Everything the planner needs to know about one tick.
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Every agent and obstacle on the map.
    pub entities: Vec<BoundedEntity>,
    /// At most one command per controlled agent.
    pub commands: Vec<(EntityId, Command)>,
    pub map_bounds: Option<MapBounds>,
}

impl TickInput {
    pub fn new(entities: Vec<BoundedEntity>, commands: Vec<(EntityId, Command)>) -> Self {
        TickInput {
            entities,
            commands,
            map_bounds: None,
        }
    }

    pub fn with_map_bounds(mut self, bounds: MapBounds) -> Self {
        self.map_bounds = Some(bounds);
        self
    }
}

/// Plans moves tick after tick. The only state kept between ticks is the
/// previous position of every agent and the shuffle RNG.
#[derive(Debug)]
pub struct BatchPlanner {
    config: NavConfig,
    previous_positions: HashMap<EntityId, Point>,
    rng: Pcg32,
}

impl BatchPlanner {
    pub fn new(config: NavConfig) -> Result<Self, NavError> {
        config.validate()?;
        let rng = Pcg32::seed_from_u64(config.seed.unwrap_or_else(rand::random));
        Ok(BatchPlanner {
            config,
            previous_positions: HashMap::new(),
            rng,
        })
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    /// Where `id` was at the start of the last planned tick.
    pub fn previous_position(&self, id: EntityId) -> Option<Point> {
        self.previous_positions.get(&id).copied()
    }

    /// Plans one tick. On error nothing is remembered from `input`.
    pub fn plan_tick(&mut self, input: &TickInput) -> Result<Vec<Move>, NavError> {
        let tick_start = Instant::now();

        let entities: HashMap<EntityId, BoundedEntity> = input.entities.iter().map(|e| (e.id, *e)).collect();
        let commands = validate_commands(input, &entities)?;

        let mut tick = TickPlan::seed(&self.config, input, &self.previous_positions);

        let mut navigators = tick.apply_commands(&commands, &entities);
        log::debug!(
            "seeded {} trajectories, {} navigating, {} fixed moves",
            tick.world.len(),
            navigators.len(),
            tick.moves.len()
        );

        let phase = Instant::now();
        if self.config.randomize_order {
            navigators.shuffle(&mut self.rng);
        }
        for (index, navigator) in navigators.iter_mut().enumerate() {
            navigator.detailed = index < self.config.max_detailed_agents;
            tick.plan(navigator)?;
        }
        log::debug!("first pass planned {} agents in {:?}", navigators.len(), phase.elapsed());

        let phase = Instant::now();
        let mut detailed: Vec<Navigator> = navigators.iter().filter(|n| n.detailed).copied().collect();
        for _ in 0..self.config.refinement_passes {
            if self.config.randomize_order {
                detailed.shuffle(&mut self.rng);
            }
            for navigator in &detailed {
                tick.plan(navigator)?;
            }
        }
        log::debug!(
            "{} refinement passes over {} agents in {:?}",
            self.config.refinement_passes,
            detailed.len(),
            phase.elapsed()
        );

        if self.config.post_process {
            let phase = Instant::now();
            let rounds = tick.converge();
            log::debug!("convergence finished after {} rounds in {:?}", rounds, phase.elapsed());
        }

        let moves = tick.emit();
        self.previous_positions = input
            .entities
            .iter()
            .filter(|e| e.is_agent())
            .map(|e| (e.id, e.position))
            .collect();

        log::debug!("tick planned {} moves in {:?}", moves.len(), tick_start.elapsed());
        Ok(moves)
    }
}

/// Rejects commands for unknown agents, unknown targets and duplicate
/// commands before any state is touched.
fn validate_commands(
    input: &TickInput,
    entities: &HashMap<EntityId, BoundedEntity>,
) -> Result<Vec<(BoundedEntity, Command)>, NavError> {
    let mut seen = HashSet::new();
    let mut commands = Vec::with_capacity(input.commands.len());

    for (id, command) in &input.commands {
        let entity = entities.get(id).ok_or(NavError::UnknownEntity(*id))?;
        if !seen.insert(*id) {
            return Err(NavError::DuplicateCommand(*id));
        }

        match command {
            Command::Dock { target } if !entities.contains_key(target) => {
                return Err(NavError::UnknownEntity(*target));
            }
            Command::Navigate {
                goal: Goal::TrackedEntity { entity: target, .. },
                ..
            } if !entities.contains_key(&target.id) => {
                return Err(NavError::UnknownEntity(target.id));
            }
            _ => {}
        }

        commands.push((*entity, *command));
    }

    Ok(commands)
}

/// A commanded agent that has somewhere to go.
#[derive(Debug, Clone, Copy)]
struct Navigator {
    entity: BoundedEntity,
    goal: Goal,
    avoid_obstacles: bool,
    /// Gets the full avoidance depth and takes part in refinement.
    detailed: bool,
}

/// Scratch state for one tick.
struct TickPlan<'a> {
    config: &'a NavConfig,
    world: WorldSnapshot,
    /// Latest plan of every navigating agent.
    plans: BTreeMap<EntityId, Trajectory>,
    moves: Vec<Move>,
}

impl<'a> TickPlan<'a> {
    fn seed(config: &'a NavConfig, input: &TickInput, previous: &HashMap<EntityId, Point>) -> Self {
        let trajectories = input.entities.iter().map(|entity| match entity.kind {
            EntityKind::Obstacle => Trajectory::create_static(*entity),
            EntityKind::Agent => match previous.get(&entity.id) {
                Some(last) => Trajectory::create_extrapolated(*entity, *last, config.extrapolation_lookahead),
                None => Trajectory::create_static(*entity),
            },
        });

        TickPlan {
            config,
            world: WorldSnapshot::new(config, input.map_bounds, trajectories),
            plans: BTreeMap::new(),
            moves: Vec::new(),
        }
    }

    /// Pins every agent that will not move and returns the ones that will.
    fn apply_commands(
        &mut self,
        commands: &[(BoundedEntity, Command)],
        entities: &HashMap<EntityId, BoundedEntity>,
    ) -> Vec<Navigator> {
        let mut navigators = Vec::new();

        for (entity, command) in commands {
            let fixed = match command {
                Command::Navigate { goal, avoid_obstacles } => {
                    navigators.push(Navigator {
                        entity: *entity,
                        goal: resolve_goal(goal, entities),
                        avoid_obstacles: *avoid_obstacles,
                        detailed: true,
                    });
                    continue;
                }
                Command::Idle => Move::Stay { entity: entity.id },
                Command::Dock { target } => Move::Dock {
                    entity: entity.id,
                    target: *target,
                },
                Command::Undock => Move::Undock { entity: entity.id },
            };

            self.world.update(Trajectory::create_static(*entity));
            self.moves.push(fixed);
        }

        navigators
    }

    /// Plans `navigator` against the current snapshot and commits the result.
    fn plan(&mut self, navigator: &Navigator) -> Result<(), NavError> {
        let entity = navigator.entity;
        let iterations = if navigator.detailed {
            self.config.max_iterations()
        } else {
            self.config.degraded_iterations
        };

        let path = if navigator.avoid_obstacles {
            Trajectory::create_modified(entity, entity.position, &navigator.goal, &self.world, 0.0, 0, iterations)?
        } else {
            let aim = self.world.find_intercept_position(entity.position, 0.0, &navigator.goal)?;
            let mut path = Trajectory::create_simple(entity, entity.position.overshoot_point(&aim));
            path.goal = Some(navigator.goal);
            path
        };

        log::trace!(
            "entity {} planned {} frames over {:.2}{}",
            entity.id,
            path.frames.len(),
            path.total_distance(),
            if path.volatile { " (volatile)" } else { "" }
        );

        self.world.update(path.clone());
        self.plans.insert(entity.id, path);
        Ok(())
    }

    /// Cuts plans short until none collides with a volatile one. Returns the
    /// number of rounds run.
    fn converge(&mut self) -> usize {
        let max_speed = self.config.max_speed;
        let mut volatile: BTreeSet<EntityId> = self
            .plans
            .iter()
            .filter(|(_, path)| path.volatile)
            .map(|(id, _)| *id)
            .collect();

        let mut rounds = 0;
        while !volatile.is_empty() && rounds < self.config.convergence_rounds {
            rounds += 1;
            log::trace!("convergence round {}: {} volatile", rounds, volatile.len());

            let mut hits: BTreeMap<EntityId, Collision> = BTreeMap::new();
            for volatile_id in &volatile {
                let Some(volatile_path) = self.plans.get(volatile_id) else {
                    continue;
                };

                for (id, path) in &self.plans {
                    if id == volatile_id {
                        continue;
                    }

                    let found =
                        find_collision_between_paths(path, volatile_path, path.ignored_entity(), f64::MAX, max_speed);
                    if let Some(collision) = found {
                        hits.entry(*id)
                            .and_modify(|earliest| {
                                if collision.distance < earliest.distance {
                                    *earliest = collision;
                                }
                            })
                            .or_insert(collision);
                    }
                }
            }

            for (id, collision) in &hits {
                if let Some(path) = self.plans.get_mut(id) {
                    path.modify_collision_stop(collision, self.config.safety_margin);
                    path.volatile = true;
                }
            }

            volatile = hits.into_keys().collect();
        }

        if !volatile.is_empty() {
            log::warn!(
                "convergence stopped after {} rounds with {} agents still volatile",
                rounds,
                volatile.len()
            );
        }

        rounds
    }

    fn emit(mut self) -> Vec<Move> {
        let max_speed = self.config.max_speed;
        self.moves.extend(self.plans.values().map(|path| path.to_move(max_speed)));
        self.moves
    }
}

/// Tracks the goal entity as it is this tick, not as the decision layer saw it.
fn resolve_goal(goal: &Goal, entities: &HashMap<EntityId, BoundedEntity>) -> Goal {
    match goal {
        Goal::TrackedEntity {
            entity,
            radius,
            ignore_collision,
        } => match entities.get(&entity.id) {
            Some(current) => Goal::entity(*current, *radius, *ignore_collision),
            None => *goal,
        },
        Goal::FixedPoint { .. } => *goal,
    }
}
