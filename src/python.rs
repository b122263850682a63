//! Python bindings, built with the `python` feature.
//!
//! Entities cross the boundary as `(id, is_agent, x, y, radius)` tuples and
//! moves come back as `(kind, id, a, b)` tuples:
//! `("thrust", id, angle, magnitude)`, `("dock", id, target, 0)`,
//! `("undock", id, 0, 0)` or `("stay", id, 0, 0)`.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::batch::{BatchPlanner, TickInput};
use crate::commands::{Command, Move};
use crate::config::NavConfig;
use crate::error::NavError;
use crate::structs::{angle_rad_to_deg_clipped, BoundedEntity, EntityId, Goal, MapBounds, Point};

type EntityTuple = (EntityId, bool, f64, f64, f64);
type MoveTuple = (&'static str, EntityId, i32, i32);

impl From<NavError> for PyErr {
    fn from(err: NavError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

#[pyclass(name = "Command")]
#[derive(Debug, Clone, Copy)]
pub struct PyCommand {
    inner: Command,
}

#[pymethods]
impl PyCommand {
    #[staticmethod]
    fn idle() -> Self {
        PyCommand { inner: Command::Idle }
    }

    #[staticmethod]
    fn dock(target: EntityId) -> Self {
        PyCommand {
            inner: Command::Dock { target },
        }
    }

    #[staticmethod]
    fn undock() -> Self {
        PyCommand { inner: Command::Undock }
    }

    /// Head for a fixed point, stopping `radius` short of it.
    #[staticmethod]
    #[pyo3(signature = (x, y, radius=0.0, avoid_obstacles=true))]
    fn move_to(x: f64, y: f64, radius: f64, avoid_obstacles: bool) -> Self {
        PyCommand {
            inner: Command::Navigate {
                goal: Goal::point(Point::new(x, y), radius),
                avoid_obstacles,
            },
        }
    }

    /// Head for another entity. Its position and size are taken from the
    /// tick the command is planned in.
    #[staticmethod]
    #[pyo3(signature = (target, radius=0.0, ignore_collision=false, avoid_obstacles=true))]
    fn chase(target: EntityId, radius: f64, ignore_collision: bool, avoid_obstacles: bool) -> Self {
        let placeholder = BoundedEntity::agent(target, Point::new(0.0, 0.0), 0.0);
        PyCommand {
            inner: Command::Navigate {
                goal: Goal::entity(placeholder, radius, ignore_collision),
                avoid_obstacles,
            },
        }
    }

    fn __repr__(&self) -> String {
        format!("Command({:?})", self.inner)
    }
}

#[pyclass(name = "BatchPlanner")]
pub struct PyBatchPlanner {
    inner: BatchPlanner,
}

#[pymethods]
impl PyBatchPlanner {
    /// `config_json` overrides any subset of the default settings.
    #[new]
    #[pyo3(signature = (config_json=None))]
    fn new(config_json: Option<&str>) -> PyResult<Self> {
        let config = match config_json {
            Some(json) => NavConfig::from_json(json)?,
            None => NavConfig::default(),
        };
        Ok(PyBatchPlanner {
            inner: BatchPlanner::new(config)?,
        })
    }

    #[pyo3(signature = (entities, commands, map_size=None))]
    fn plan_tick(
        &mut self,
        entities: Vec<EntityTuple>,
        commands: Vec<(EntityId, PyCommand)>,
        map_size: Option<(f64, f64)>,
    ) -> PyResult<Vec<MoveTuple>> {
        let mut input = TickInput::new(
            entities.into_iter().map(entity_from_tuple).collect(),
            commands.into_iter().map(|(id, command)| (id, command.inner)).collect(),
        );
        if let Some((width, height)) = map_size {
            input = input.with_map_bounds(MapBounds::new(width, height));
        }

        let moves = self.inner.plan_tick(&input)?;
        Ok(moves.into_iter().map(move_to_tuple).collect())
    }

    fn config_json(&self) -> PyResult<String> {
        Ok(self.inner.config().to_json()?)
    }
}

#[pyfunction(name = "angle_rad_to_deg_clipped")]
fn angle_rad_to_deg_clipped_py(angle_rad: f64) -> i32 {
    angle_rad_to_deg_clipped(angle_rad)
}

fn entity_from_tuple((id, is_agent, x, y, radius): EntityTuple) -> BoundedEntity {
    let position = Point::new(x, y);
    if is_agent {
        BoundedEntity::agent(id, position, radius)
    } else {
        BoundedEntity::obstacle(id, position, radius)
    }
}

fn move_to_tuple(m: Move) -> MoveTuple {
    match m {
        Move::Stay { entity } => ("stay", entity, 0, 0),
        Move::Dock { entity, target } => ("dock", entity, target as i32, 0),
        Move::Undock { entity } => ("undock", entity, 0, 0),
        Move::Thrust {
            entity,
            angle,
            magnitude,
        } => ("thrust", entity, angle, magnitude),
    }
}

#[pymodule]
fn batch_navigation(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyBatchPlanner>()?;
    m.add_class::<PyCommand>()?;
    m.add_function(wrap_pyfunction!(angle_rad_to_deg_clipped_py, m)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_from_tuple() {
        let agent = entity_from_tuple((3, true, 1.0, 2.0, 0.5));
        assert!(agent.is_agent());
        assert_eq!(agent.position, Point::new(1.0, 2.0));

        let rock = entity_from_tuple((4, false, 0.0, 0.0, 6.0));
        assert!(!rock.is_agent());
        assert_eq!(rock.radius, 6.0);
    }

    #[test]
    fn test_move_to_tuple() {
        assert_eq!(move_to_tuple(Move::Dock { entity: 1, target: 9 }), ("dock", 1, 9, 0));
        assert_eq!(
            move_to_tuple(Move::Thrust {
                entity: 2,
                angle: 315,
                magnitude: 7
            }),
            ("thrust", 2, 315, 7)
        );
    }

    #[test]
    fn test_chase_target_resolved_at_plan_time() {
        let command = PyCommand::chase(8, 1.0, true, true).inner;
        let Command::Navigate { goal, .. } = command else {
            panic!("expected a navigate command");
        };
        assert_eq!(goal.ignored_entity(), Some(8));
    }
}
