//! Planner tuning.
//!
//! All limits that bound the cost of one tick live here. Hosts usually keep
//! the defaults and only pick a [`PlanningProfile`].

use serde::{Deserialize, Serialize};

use crate::error::NavError;

/// How much avoidance effort each agent gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PlanningProfile {
    /// Competitive play: deep avoidance.
    #[default]
    Live,
    /// Local runs and training: shallow avoidance, fast ticks.
    Local,
}

impl PlanningProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanningProfile::Live => "Live",
            PlanningProfile::Local => "Local",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "live" => Some(PlanningProfile::Live),
            "local" | "fast" => Some(PlanningProfile::Local),
            _ => None,
        }
    }

    /// Recursion depth allowed when bending a trajectory around obstacles.
    pub fn max_iterations(&self) -> usize {
        match self {
            PlanningProfile::Live => 7,
            PlanningProfile::Local => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    pub profile: PlanningProfile,

    // === Physics ===
    /// Longest distance an agent covers in one tick.
    pub max_speed: f64,
    /// Spacing of the samples used by the intercept search.
    pub collision_increment: f64,
    /// Gap kept in front of a collision when stopping short of it.
    pub safety_margin: f64,
    /// Ticks ahead to extrapolate agents we do not control.
    pub extrapolation_lookahead: u32,

    // === Budget ===
    /// Agents beyond this many get a single avoidance iteration and no refinement.
    pub max_detailed_agents: usize,
    /// Avoidance iterations for agents beyond `max_detailed_agents`.
    pub degraded_iterations: usize,
    /// Re-planning passes after the first pass.
    pub refinement_passes: usize,
    /// Hard cap on convergence rounds.
    pub convergence_rounds: usize,

    // === Behaviour ===
    pub randomize_order: bool,
    /// Truncate trajectories still in conflict after refinement.
    pub post_process: bool,
    /// Seed for the per-pass shuffle; `None` draws one at start-up.
    pub seed: Option<u64>,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            profile: PlanningProfile::Live,

            max_speed: 7.0,
            collision_increment: 1.0,
            safety_margin: 1.0,
            extrapolation_lookahead: 3,

            max_detailed_agents: 90,
            degraded_iterations: 1,
            refinement_passes: 3,
            convergence_rounds: 20,

            randomize_order: true,
            post_process: true,
            seed: None,
        }
    }
}

impl NavConfig {
    pub fn with_profile(profile: PlanningProfile) -> Self {
        Self {
            profile,
            ..Self::default()
        }
    }

    pub fn max_iterations(&self) -> usize {
        self.profile.max_iterations()
    }

    /// Parses a JSON document; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, NavError> {
        let config: NavConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, NavError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), NavError> {
        if !(self.max_speed.is_finite() && self.max_speed > 0.0) {
            return Err(NavError::InvalidConfig(format!(
                "max_speed must be positive, got {}",
                self.max_speed
            )));
        }
        if !(self.collision_increment.is_finite() && self.collision_increment > 0.0) {
            return Err(NavError::InvalidConfig(format!(
                "collision_increment must be positive, got {}",
                self.collision_increment
            )));
        }
        if !(self.safety_margin.is_finite() && self.safety_margin >= 0.0) {
            return Err(NavError::InvalidConfig(format!(
                "safety_margin must be non-negative, got {}",
                self.safety_margin
            )));
        }
        Ok(())
    }
}
