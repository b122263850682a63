//! # Batch Navigation
//!
//! Per-tick motion planning for many circular agents moving at once, with
//! optional Python bindings.
//!
//! ## Pipeline
//!
//! - **Collision**: continuous circle/circle contact times and bounding-box
//!   pruning.
//! - **Trajectory**: one agent's waypoints for the tick, bent around the first
//!   thing it would hit with a bounded recursive search.
//! - **World**: every committed trajectory of the tick, answering "what do I
//!   hit first?" and "where can I catch my target?".
//! - **Batch**: seeds the world, lets commanded agents re-plan against each
//!   other a few times, cuts short whatever is still in conflict and emits
//!   one move per agent.
//!
//! ## Usage
//!
//! ```no_run
//! use batch_navigation::{BatchPlanner, BoundedEntity, Command, Goal, NavConfig, Point, TickInput};
//!
//! let mut planner = BatchPlanner::new(NavConfig::default())?;
//! let me = BoundedEntity::agent(0, Point::new(0.0, 0.0), 0.5);
//! let goal = Goal::point(Point::new(20.0, 0.0), 0.0);
//! let moves = planner.plan_tick(&TickInput::new(vec![me], vec![(0, Command::navigate(goal))]))?;
//! # Ok::<(), batch_navigation::NavError>(())
//! ```
//!
//! From Python (feature `python`): `batch_navigation.BatchPlanner`,
//! `batch_navigation.Command` and `batch_navigation.angle_rad_to_deg_clipped`.

pub mod batch;
pub mod collision;
pub mod commands;
pub mod config;
pub mod error;
pub mod structs;
pub mod trajectory;
pub mod world;

#[cfg(feature = "python")]
mod python;

pub use batch::{BatchPlanner, TickInput};
pub use commands::{Command, Move};
pub use config::{NavConfig, PlanningProfile};
pub use error::NavError;
pub use structs::{angle_rad_to_deg_clipped, BoundedEntity, Collision, EntityId, EntityKind, Goal, MapBounds, Point};
pub use trajectory::Trajectory;
pub use world::WorldSnapshot;
