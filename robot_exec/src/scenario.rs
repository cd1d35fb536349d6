//! # Scenario parameters
//!
//! Describes the simulated situation run by the executable: the field, where the robot starts,
//! where it is sent, and what it has to avoid on the way.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::Arc;

use comms_if::{
    goal::GoalSpec,
    robot::{MotionConstraints, RobotInstant, RotationConstraints},
};
use nalgebra::Vector2;
use serde::Deserialize;

use crate::{obstacle::ObstacleSet, sim::SimParams};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioParams {
    pub start_position_m: Vector2<f64>,

    #[serde(default)]
    pub start_heading_rad: f64,

    pub goal: GoalSpec,

    /// Obstacles and field bounds, fixed for the whole run
    #[serde(default)]
    pub obstacles: ObstacleSet,

    #[serde(default)]
    pub motion: MotionConstraints,

    #[serde(default)]
    pub rotation: RotationConstraints,

    /// Length of simulated time to run for
    pub run_time_s: f64,

    /// Period between replanning requests, the robot also replans whenever the goal changes
    pub replan_period_s: f64,

    #[serde(default)]
    pub sim: SimParams,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ScenarioParams {
    /// The robot's state at the start of the run.
    pub fn start_instant(&self) -> RobotInstant {
        RobotInstant::stationary(self.start_position_m, self.start_heading_rad, 0.0)
    }

    /// A shareable snapshot of the scenario's obstacles.
    pub fn obstacle_snapshot(&self) -> Arc<ObstacleSet> {
        Arc::new(self.obstacles.clone())
    }
}
