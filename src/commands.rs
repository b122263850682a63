//! What the decision layer asks for and what the planner hands back.

use std::fmt;

use crate::structs::{EntityId, Goal};

/// One instruction for a controlled agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Stay put this tick.
    Idle,
    /// Dock at the stationary entity `target`.
    Dock { target: EntityId },
    Undock,
    /// Head for `goal`. With `avoid_obstacles` unset the agent flies straight
    /// at its intercept point.
    Navigate { goal: Goal, avoid_obstacles: bool },
}

impl Command {
    pub fn navigate(goal: Goal) -> Self {
        Command::Navigate {
            goal,
            avoid_obstacles: true,
        }
    }
}

/// One executable instruction for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    Stay { entity: EntityId },
    Dock { entity: EntityId, target: EntityId },
    Undock { entity: EntityId },
    /// `angle` in whole degrees within [0, 360), `magnitude` in whole units
    /// no larger than the speed cap.
    Thrust {
        entity: EntityId,
        angle: i32,
        magnitude: i32,
    },
}

impl Move {
    pub fn entity(&self) -> EntityId {
        match self {
            Move::Stay { entity }
            | Move::Dock { entity, .. }
            | Move::Undock { entity }
            | Move::Thrust { entity, .. } => *entity,
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Move::Stay { entity } => write!(f, "{} stays", entity),
            Move::Dock { entity, target } => write!(f, "{} docks at {}", entity, target),
            Move::Undock { entity } => write!(f, "{} undocks", entity),
            Move::Thrust {
                entity,
                angle,
                magnitude,
            } => write!(f, "{} thrusts {} at {}°", entity, magnitude, angle),
        }
    }
}
