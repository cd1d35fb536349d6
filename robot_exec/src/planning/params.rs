//! Parameters for the path planners

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use serde::Deserialize;

use super::SingleRobotPathPlanner;

// -----------------------------------------------------------------------------------------------
// STRUCTS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct PlannerParams {
    /// Physical radius of the robot, obstacles are inflated by this much before checking.
    pub robot_radius_m: f64,

    /// Order in which strategies are tried, the first to produce a path wins.
    #[serde(default = "default_order")]
    pub order: Vec<SingleRobotPathPlanner>,

    /// Seed from which each invocation's random source is derived.
    pub master_seed: u64,

    /// A previous path is reused if the robot is within this distance of where the path says it
    /// should be, and the goal has moved less than this distance.
    pub reuse_tolerance_m: f64,

    pub escape: EscapeParams,

    pub pivot: PivotParams,

    pub target_vel: TargetVelParams,

    pub rrt: RrtParams,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EscapeParams {
    /// Extra clearance left between the escape point and the inflated obstacle.
    pub clearance_m: f64,

    /// Distance between the rings searched for a free point.
    pub search_step_m: f64,

    /// Largest ring searched before giving up.
    pub max_search_radius_m: f64,

    /// Number of candidate points on each ring.
    pub num_ring_points: usize,

    /// If true, once out of the obstacle continue to a point goal with the remaining planners.
    pub continue_to_goal: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PivotParams {
    /// Largest translation to a point goal still treated as a pivot.
    pub max_translation_m: f64,

    /// Heading error below which no pivot is needed.
    pub heading_tolerance_rad: f64,

    /// Spacing of the samples making up the pivot path.
    pub sample_step_s: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TargetVelParams {
    /// How long the target velocity is held for once reached.
    pub horizon_s: f64,

    /// Spacing of the samples making up the path.
    pub sample_step_s: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RrtParams {
    /// Probability of sampling the goal rather than a uniform random point.
    pub goal_bias: f64,

    /// Maximum length of a new tree edge.
    pub step_m: f64,

    /// Maximum number of samples drawn.
    pub max_iterations: usize,

    /// Optional wall-clock budget for growing the tree.
    #[serde(default)]
    pub max_time_ms: Option<u64>,

    /// A node this close to the goal is connected straight to it.
    pub goal_tolerance_m: f64,

    /// Margin around the start and goal used to bound sampling when the field is unbounded.
    pub unbounded_margin_m: f64,

    /// If the budget runs out, return a path to the node closest to the goal instead of failing.
    pub best_effort: bool,

    /// Remove redundant waypoints from the found route.
    pub shortcut: bool,

    /// Save each tree into the session directory.
    #[serde(default)]
    pub save_report: bool,
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl Default for PlannerParams {
    fn default() -> Self {
        Self {
            robot_radius_m: 0.09,
            order: default_order(),
            master_seed: 0,
            reuse_tolerance_m: 0.1,
            escape: EscapeParams::default(),
            pivot: PivotParams::default(),
            target_vel: TargetVelParams::default(),
            rrt: RrtParams::default(),
        }
    }
}

impl Default for EscapeParams {
    fn default() -> Self {
        Self {
            clearance_m: 0.05,
            search_step_m: 0.05,
            max_search_radius_m: 2.0,
            num_ring_points: 16,
            continue_to_goal: true,
        }
    }
}

impl Default for PivotParams {
    fn default() -> Self {
        Self {
            max_translation_m: 0.05,
            heading_tolerance_rad: 0.02,
            sample_step_s: 0.02,
        }
    }
}

impl Default for TargetVelParams {
    fn default() -> Self {
        Self {
            horizon_s: 0.5,
            sample_step_s: 0.05,
        }
    }
}

impl Default for RrtParams {
    fn default() -> Self {
        Self {
            goal_bias: 0.1,
            step_m: 0.25,
            max_iterations: 2000,
            max_time_ms: None,
            goal_tolerance_m: 0.25,
            unbounded_margin_m: 2.0,
            best_effort: false,
            shortcut: true,
            save_report: false,
        }
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

fn default_order() -> Vec<SingleRobotPathPlanner> {
    use SingleRobotPathPlanner::*;
    vec![EscapeObstacles, TargetVelocity, Pivot, DirectTarget, Rrt]
}
