//! # Core Data Structures
//!
//! This module defines the fundamental value types used throughout the library:
//!
//! - **Point**: 2D position in continuous space
//! - **Vector2D**: 2D displacement with arithmetic operations
//! - **BoundedEntity**: an identified circle (agent or static obstacle)
//! - **Movement**: a single linear displacement of one entity
//! - **Goal**: where a commanded agent wants to go (fixed point or tracked entity)
//! - **Collision**: the earliest contact found along a trajectory
//! - **MapBounds**: the playable area

use std::f64::consts::PI;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Mul, Sub};

/// Below this length a movement is treated as standing still.
pub const STANDS_STILL_EPSILON: f64 = 0.001;

/// Subtracted before rounding distances up, so that values like `7.0000000001`
/// do not become 8.
pub const CEIL_EPSILON: f64 = 0.0001;

pub type EntityId = usize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Linear interpolation; `t = 0` is `self`, `t = 1` is `other`.
    pub fn lerp(&self, other: &Point, t: f64) -> Point {
        Point {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Heading from `self` towards `target` in radians, as returned by `atan2`.
    pub fn angle_to(&self, target: &Point) -> f64 {
        (target.y - self.y).atan2(target.x - self.x)
    }

    /// The point a thrust command aimed at `target` would actually reach.
    ///
    /// Thrust is issued as whole units along whole-degree headings, so the
    /// distance is rounded up and the heading is quantised the same way the
    /// move will be.
    pub fn overshoot_point(&self, target: &Point) -> Point {
        let distance = self.distance(target);
        if distance == 0.0 {
            return *target;
        }

        let overshoot_distance = (distance - CEIL_EPSILON).ceil();
        let degrees = angle_rad_to_deg_clipped(self.angle_to(target));
        let heading = f64::from(degrees).to_radians();

        Point {
            x: self.x + heading.cos() * overshoot_distance,
            y: self.y + heading.sin() * overshoot_distance,
        }
    }

    pub fn is_outside(&self, bounds: &MapBounds) -> bool {
        self.x <= 0.0 || self.x >= bounds.width || self.y <= 0.0 || self.y >= bounds.height
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Point({:.2}, {:.2})", self.x, self.y)
    }
}

/// The displacement from `other` to `self`.
impl Sub for Point {
    type Output = Vector2D;

    fn sub(self, other: Point) -> Vector2D {
        Vector2D::new(self.x - other.x, self.y - other.y)
    }
}

impl Add<Vector2D> for Point {
    type Output = Point;

    fn add(self, offset: Vector2D) -> Point {
        Point::new(self.x + offset.x, self.y + offset.y)
    }
}

impl Sub<Vector2D> for Point {
    type Output = Point;

    fn sub(self, offset: Vector2D) -> Point {
        self + offset * -1.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vector2D {
    pub x: f64,
    pub y: f64,
}

impl Vector2D {
    pub fn new(x: f64, y: f64) -> Self {
        Vector2D { x, y }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Unit vector in the same direction; the zero vector stays zero.
    pub fn normalize(&self) -> Vector2D {
        match self.magnitude() {
            length if length > 0.0 => *self * (1.0 / length),
            _ => Vector2D::new(0.0, 0.0),
        }
    }

    pub fn dot(&self, other: &Vector2D) -> f64 {
        self.x * other.x + self.y * other.y
    }
}

impl Add for Vector2D {
    type Output = Vector2D;

    fn add(self, other: Vector2D) -> Vector2D {
        Vector2D::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Vector2D {
    type Output = Vector2D;

    fn sub(self, other: Vector2D) -> Vector2D {
        self + other * -1.0
    }
}

impl Mul<f64> for Vector2D {
    type Output = Vector2D;

    fn mul(self, factor: f64) -> Vector2D {
        Vector2D::new(self.x * factor, self.y * factor)
    }
}

/// Converts radians to whole degrees in `[0, 360)`.
pub fn angle_rad_to_deg_clipped(angle_rad: f64) -> i32 {
    let unclipped = (angle_rad / PI * 180.0).round() as i64;
    (((unclipped % 360) + 360) % 360) as i32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A ship-like mover, controlled by us or not.
    Agent,
    /// Never moves (planets, walls, ...).
    Obstacle,
}

/// An identified circle. Two entities are equal when their ids are equal,
/// whatever their current position.
#[derive(Debug, Clone, Copy)]
pub struct BoundedEntity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub position: Point,
    pub radius: f64,
}

impl BoundedEntity {
    pub fn new(id: EntityId, kind: EntityKind, position: Point, radius: f64) -> Self {
        BoundedEntity {
            id,
            kind,
            position,
            radius,
        }
    }

    pub fn agent(id: EntityId, position: Point, radius: f64) -> Self {
        BoundedEntity::new(id, EntityKind::Agent, position, radius)
    }

    pub fn obstacle(id: EntityId, position: Point, radius: f64) -> Self {
        BoundedEntity::new(id, EntityKind::Obstacle, position, radius)
    }

    pub fn is_agent(&self) -> bool {
        self.kind == EntityKind::Agent
    }
}

impl PartialEq for BoundedEntity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for BoundedEntity {}

impl Hash for BoundedEntity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// One linear displacement of `entity` from `start` to `end`.
#[derive(Debug, Clone, Copy)]
pub struct Movement {
    pub entity: BoundedEntity,
    pub start: Point,
    pub end: Point,
}

impl Movement {
    pub fn new(entity: BoundedEntity, start: Point, end: Point) -> Self {
        Movement { entity, start, end }
    }

    /// A zero-length movement at `position`.
    pub fn stationary(entity: BoundedEntity, position: Point) -> Self {
        Movement::new(entity, position, position)
    }

    pub fn delta(&self) -> Vector2D {
        self.end - self.start
    }

    pub fn distance(&self) -> f64 {
        self.delta().magnitude()
    }

    pub fn stands_still(&self) -> bool {
        self.distance() < STANDS_STILL_EPSILON
    }

    /// Position after travelling `distance` along this movement (not clamped).
    pub fn partway_position(&self, distance: f64) -> Point {
        let length = self.distance();
        if distance == 0.0 || length == 0.0 {
            return self.start;
        }
        self.start + self.delta() * (distance / length)
    }

    pub fn lerp(&self, t: f64) -> Point {
        self.start.lerp(&self.end, t)
    }
}

impl fmt::Display for Movement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// What a commanded agent is heading for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Goal {
    /// A fixed spot; the agent stops `radius` short of it.
    FixedPoint { position: Point, radius: f64 },
    /// Another entity, possibly moving; the agent stops `radius` outside its
    /// hull. With `ignore_collision` set, touching the target is intended.
    TrackedEntity {
        entity: BoundedEntity,
        radius: f64,
        ignore_collision: bool,
    },
}

impl Goal {
    pub fn point(position: Point, radius: f64) -> Self {
        Goal::FixedPoint { position, radius }
    }

    pub fn entity(entity: BoundedEntity, radius: f64, ignore_collision: bool) -> Self {
        Goal::TrackedEntity {
            entity,
            radius,
            ignore_collision,
        }
    }

    /// Current centre of the goal.
    pub fn center(&self) -> Point {
        match self {
            Goal::FixedPoint { position, .. } => *position,
            Goal::TrackedEntity { entity, .. } => entity.position,
        }
    }

    fn center_radius(&self) -> f64 {
        match self {
            Goal::FixedPoint { .. } => 0.0,
            Goal::TrackedEntity { entity, .. } => entity.radius,
        }
    }

    pub fn clearance(&self) -> f64 {
        match self {
            Goal::FixedPoint { radius, .. } | Goal::TrackedEntity { radius, .. } => *radius,
        }
    }

    pub fn tracked_entity(&self) -> Option<&BoundedEntity> {
        match self {
            Goal::FixedPoint { .. } => None,
            Goal::TrackedEntity { entity, .. } => Some(entity),
        }
    }

    /// The entity whose collisions should be disregarded while approaching.
    pub fn ignored_entity(&self) -> Option<EntityId> {
        match self {
            Goal::TrackedEntity {
                entity,
                ignore_collision: true,
                ..
            } => Some(entity.id),
            _ => None,
        }
    }

    /// Where to stop when approaching the goal's current centre from `current`.
    pub fn approach_point_from(&self, current: Point) -> Point {
        self.approach_point_toward(current, self.center())
    }

    /// Where to stop when approaching the goal, assumed to be centred at
    /// `target_position`, from `current`.
    pub fn approach_point_toward(&self, current: Point, target_position: Point) -> Point {
        let stop_distance = self.clearance() + self.center_radius();
        if current.distance(&target_position) < stop_distance {
            return current;
        }
        target_position + (current - target_position).normalize() * stop_distance
    }
}

/// Earliest contact along a path. Absence of contact is `None` wherever a
/// collision is searched for.
#[derive(Debug, Clone, Copy)]
pub struct Collision {
    pub collider: BoundedEntity,
    /// Collider centre at the moment of contact.
    pub position: Point,
    /// Distance travelled along the searched path before contact.
    pub distance: f64,
}

impl Collision {
    pub fn new(collider: BoundedEntity, position: Point, distance: f64) -> Self {
        Collision {
            collider,
            position,
            distance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapBounds {
    pub width: f64,
    pub height: f64,
}

impl MapBounds {
    pub fn new(width: f64, height: f64) -> Self {
        MapBounds { width, height }
    }
}
