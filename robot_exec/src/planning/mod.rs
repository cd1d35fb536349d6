//! # Single robot path planning
//!
//! A family of planning strategies, each turning a start instant, a goal and an obstacle snapshot
//! into a [`Path`]. The [`Planner`] tries the strategies in a fixed order and uses the first one
//! which produces a collision free path. Strategies which don't apply to the request (for
//! example pivoting towards a velocity goal) return [`PlanningError::NotApplicable`] without
//! doing any work, so in practice only the cheapest applicable strategy runs.
//!
//! Each call to [`Planner::plan`] derives its random source from the configured master seed plus
//! an invocation counter, so a sequence of plans can be replayed exactly.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod direct_target;
mod escape_obstacles;
mod params;
mod pivot;
pub mod rrt;
mod target_vel;

pub use params::*;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::Arc;

use comms_if::{
    goal::{Facing, GoalSpec},
    robot::{MotionConstraints, RobotInstant, RotationConstraints},
};
use log::{debug, trace};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{
    obstacle::ObstacleSet,
    path::{AngleFunctionPath, CompositePath, Path, PathError, PathRef},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Everything a planner needs to produce a path.
///
/// The obstacle snapshot is shared rather than copied and is never modified once built, so a
/// planning invocation sees the same obstacles from start to finish.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub start: RobotInstant,
    pub goal: GoalSpec,
    pub motion: MotionConstraints,
    pub rotation: RotationConstraints,
    pub obstacles: Arc<ObstacleSet>,
    pub prior: Option<PriorPlan>,
}

/// The path currently being followed, offered for reuse.
#[derive(Debug, Clone)]
pub struct PriorPlan {
    pub path: PathRef,

    /// The goal the path was planned for
    pub goal: GoalSpec,

    /// How far along the path the robot currently is
    pub elapsed_s: f64,

    /// The strategy which produced the path
    pub planner: SingleRobotPathPlanner,
}

/// A successfully planned path.
#[derive(Debug, Clone)]
pub struct Plan {
    pub path: PathRef,

    /// The strategy which produced the path
    pub planner: SingleRobotPathPlanner,

    /// True if this is the prior path handed back unchanged
    pub reused: bool,
}

/// Tries planning strategies in order until one succeeds.
#[derive(Debug)]
pub struct Planner {
    params: PlannerParams,

    /// Number of plans made so far, used to derive each plan's seed
    invocation: u64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The available planning strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SingleRobotPathPlanner {
    /// Straight line to a point goal
    DirectTarget,

    /// Leave an obstacle the robot has ended up inside
    EscapeObstacles,

    /// Turn on the spot, or nearly so
    Pivot,

    /// Reach and hold a velocity
    TargetVelocity,

    /// Sampling tree search around obstacles
    Rrt,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanningError {
    #[error("No feasible path found: {0}")]
    PlanningFailure(String),

    #[error("Goal rejected: {0}")]
    InvalidGoal(String),

    #[error("Planner does not apply to this request")]
    NotApplicable,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SingleRobotPathPlanner {
    /// Plan a path using this strategy only.
    pub fn plan(
        &self,
        req: &PlanRequest,
        params: &PlannerParams,
        rng: &mut StdRng,
    ) -> Result<PathRef, PlanningError> {
        match self {
            Self::DirectTarget => direct_target::plan(req, params),
            Self::EscapeObstacles => escape_obstacles::plan(req, params),
            Self::Pivot => pivot::plan(req, params),
            Self::TargetVelocity => target_vel::plan(req, params),
            Self::Rrt => rrt::plan(req, params, rng),
        }
    }
}

impl Planner {
    pub fn new(params: PlannerParams) -> Self {
        Self {
            params,
            invocation: 0,
        }
    }

    pub fn params(&self) -> &PlannerParams {
        &self.params
    }

    /// Number of times [`Planner::plan`] has drawn a new seed.
    pub fn invocation(&self) -> u64 {
        self.invocation
    }

    /// Produce a path for the request.
    ///
    /// Returns [`PlanningError::InvalidGoal`] immediately for goals outside the field or
    /// malformed constraints, and [`PlanningError::PlanningFailure`] if no strategy succeeds.
    pub fn plan(&mut self, req: &PlanRequest) -> Result<Plan, PlanningError> {
        validate(req)?;

        if let Some(path) = self.reusable(req) {
            trace!("Reusing prior path");
            return Ok(Plan {
                path,
                planner: prior_planner(req),
                reused: true,
            });
        }

        let seed = self.params.master_seed.wrapping_add(self.invocation);
        self.invocation += 1;
        let mut rng = StdRng::seed_from_u64(seed);

        self.run_strategies(req, &self.params.order, &mut rng)
    }

    fn run_strategies(
        &self,
        req: &PlanRequest,
        order: &[SingleRobotPathPlanner],
        rng: &mut StdRng,
    ) -> Result<Plan, PlanningError> {
        let mut failures = Vec::new();

        for strategy in order {
            let path = match strategy.plan(req, &self.params, rng) {
                Ok(p) => p,
                Err(PlanningError::NotApplicable) => continue,
                Err(PlanningError::PlanningFailure(msg)) => {
                    debug!("{:?} failed: {}", strategy, msg);
                    failures.push(format!("{:?}: {}", strategy, msg));
                    continue;
                }
                Err(e) => return Err(e),
            };

            debug!(
                "{:?} planned a path of {:.3} s to {:?}",
                strategy,
                path.duration(),
                path.end().position_m
            );

            let path = match strategy {
                SingleRobotPathPlanner::EscapeObstacles => {
                    self.continue_after_escape(req, order, path, rng)
                }
                _ => path,
            };

            return Ok(Plan {
                path,
                planner: *strategy,
                reused: false,
            });
        }

        if failures.is_empty() {
            Err(PlanningError::PlanningFailure(
                "no planner applies to this goal".into(),
            ))
        } else {
            Err(PlanningError::PlanningFailure(failures.join("; ")))
        }
    }

    /// Once the escape path has left the obstacle, carry on towards a point goal with the other
    /// strategies. If that fails the escape path alone is returned and the rest of the journey is
    /// planned on a later cycle.
    fn continue_after_escape(
        &self,
        req: &PlanRequest,
        order: &[SingleRobotPathPlanner],
        escape: PathRef,
        rng: &mut StdRng,
    ) -> PathRef {
        if !self.params.escape.continue_to_goal || req.goal.target_position().is_none() {
            return escape;
        }

        let onward_req = PlanRequest {
            start: escape.end(),
            prior: None,
            ..req.clone()
        };
        let onward_order: Vec<_> = order
            .iter()
            .copied()
            .filter(|s| *s != SingleRobotPathPlanner::EscapeObstacles)
            .collect();

        match self.run_strategies(&onward_req, &onward_order, rng) {
            Ok(onward) => match CompositePath::new(vec![escape.clone(), onward.path]) {
                Ok(c) => Arc::new(c),
                Err(_) => escape,
            },
            Err(e) => {
                debug!("Could not continue after escaping: {}", e);
                escape
            }
        }
    }

    /// The prior path, if it is still safe and still heading for the same goal.
    fn reusable(&self, req: &PlanRequest) -> Option<PathRef> {
        let prior = req.prior.as_ref()?;
        let tol = self.params.reuse_tolerance_m;

        if !prior.goal.same_as(&req.goal, tol) {
            return None;
        }

        let expected = prior.path.evaluate(prior.elapsed_s);
        if (expected.position_m - req.start.position_m).norm() > tol {
            return None;
        }

        if prior
            .path
            .hit(&req.obstacles, self.params.robot_radius_m, prior.elapsed_s)
            .is_some()
        {
            return None;
        }

        Some(prior.path.clone())
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Reject goals which can never be planned for.
fn validate(req: &PlanRequest) -> Result<(), PlanningError> {
    req.motion
        .validate()
        .map_err(|e| PlanningError::InvalidGoal(format!("motion constraints: {}", e)))?;
    req.rotation
        .validate()
        .map_err(|e| PlanningError::InvalidGoal(format!("rotation constraints: {}", e)))?;

    match &req.goal {
        GoalSpec::Point {
            target_m,
            end_speed_ms,
            ..
        } => {
            if !target_m.iter().all(|v| v.is_finite()) || !end_speed_ms.is_finite() {
                return Err(PlanningError::InvalidGoal("target is not finite".into()));
            }
            if *end_speed_ms < 0.0 || *end_speed_ms > req.motion.max_speed_ms {
                return Err(PlanningError::InvalidGoal(format!(
                    "end speed {} outside [0, {}]",
                    end_speed_ms, req.motion.max_speed_ms
                )));
            }
            if let Some(bounds) = req.obstacles.field_bounds {
                if !bounds.contains(target_m) {
                    return Err(PlanningError::InvalidGoal(format!(
                        "target ({}, {}) is outside the field",
                        target_m.x, target_m.y
                    )));
                }
            }
        }
        GoalSpec::Velocity { velocity_ms, .. } => {
            if !velocity_ms.iter().all(|v| v.is_finite()) {
                return Err(PlanningError::InvalidGoal("velocity is not finite".into()));
            }
        }
        GoalSpec::Heading { heading_rad } => {
            if !heading_rad.is_finite() {
                return Err(PlanningError::InvalidGoal("heading is not finite".into()));
            }
        }
    }

    Ok(())
}

fn prior_planner(req: &PlanRequest) -> SingleRobotPathPlanner {
    req.prior
        .as_ref()
        .map(|p| p.planner)
        .unwrap_or(SingleRobotPathPlanner::DirectTarget)
}

/// Wrap a positional path so that it faces as the goal asks.
pub(crate) fn with_facing(
    path: PathRef,
    facing: Facing,
    rotation: &RotationConstraints,
) -> PathRef {
    Arc::new(AngleFunctionPath::facing(path, facing, rotation.max_speed_rads))
}

/// Map a path construction error into a planning error.
pub(crate) fn path_failure(e: PathError) -> PlanningError {
    match e {
        PathError::InvalidConstraints(c) => PlanningError::InvalidGoal(c.to_string()),
        e => PlanningError::PlanningFailure(e.to_string()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{geom::Rect, obstacle::Obstacle, path::test_util::max_steps};
    use nalgebra::Vector2;

    fn request(goal: GoalSpec, obstacles: ObstacleSet) -> PlanRequest {
        PlanRequest {
            start: RobotInstant::stationary(Vector2::new(0.0, 0.0), 0.0, 0.0),
            goal,
            motion: MotionConstraints::new(2.0, 1.0),
            rotation: RotationConstraints::default(),
            obstacles: Arc::new(obstacles),
            prior: None,
        }
    }

    fn field() -> ObstacleSet {
        ObstacleSet::new(vec![], Some(Rect::centred(12.0, 9.0)))
    }

    #[test]
    fn test_strategy_selection() {
        let mut planner = Planner::new(PlannerParams::default());

        let plan = planner
            .plan(&request(GoalSpec::point(Vector2::new(5.0, 0.0)), field()))
            .unwrap();
        assert_eq!(plan.planner, SingleRobotPathPlanner::DirectTarget);
        assert!(!plan.reused);

        let plan = planner
            .plan(&request(GoalSpec::Heading { heading_rad: 1.0 }, field()))
            .unwrap();
        assert_eq!(plan.planner, SingleRobotPathPlanner::Pivot);

        let goal = GoalSpec::Velocity {
            velocity_ms: Vector2::new(1.0, 0.0),
            facing: Facing::Travel,
        };
        let plan = planner.plan(&request(goal, field())).unwrap();
        assert_eq!(plan.planner, SingleRobotPathPlanner::TargetVelocity);

        // Blocked straight line falls through to the tree search
        let mut obstacles = field();
        obstacles
            .obstacles
            .push(Obstacle::circle(Vector2::new(2.5, 0.0), 0.5));
        let plan = planner
            .plan(&request(GoalSpec::point(Vector2::new(5.0, 0.0)), obstacles))
            .unwrap();
        assert_eq!(plan.planner, SingleRobotPathPlanner::Rrt);

        assert_eq!(planner.invocation(), 4);
    }

    #[test]
    fn test_invalid_goals() {
        let mut planner = Planner::new(PlannerParams::default());

        // Outside the field
        let res = planner.plan(&request(GoalSpec::point(Vector2::new(10.0, 0.0)), field()));
        assert!(matches!(res, Err(PlanningError::InvalidGoal(_))));

        // Malformed constraints
        let mut req = request(GoalSpec::point(Vector2::new(1.0, 0.0)), field());
        req.motion.max_accel_mss = -1.0;
        assert!(matches!(
            planner.plan(&req),
            Err(PlanningError::InvalidGoal(_))
        ));

        let res = planner.plan(&request(
            GoalSpec::Heading {
                heading_rad: std::f64::NAN,
            },
            field(),
        ));
        assert!(matches!(res, Err(PlanningError::InvalidGoal(_))));
    }

    #[test]
    fn test_all_strategies_fail() {
        let mut params = PlannerParams::default();
        params.rrt.max_iterations = 50;
        let mut planner = Planner::new(params);

        // Goal inside an obstacle
        let mut obstacles = field();
        obstacles
            .obstacles
            .push(Obstacle::circle(Vector2::new(3.0, 0.0), 0.5));

        let res = planner.plan(&request(GoalSpec::point(Vector2::new(3.0, 0.0)), obstacles));
        assert!(matches!(res, Err(PlanningError::PlanningFailure(_))));
    }

    #[test]
    fn test_prior_path_reused() {
        let mut planner = Planner::new(PlannerParams::default());
        let goal = GoalSpec::point(Vector2::new(5.0, 0.0));

        let first = planner.plan(&request(goal, field())).unwrap();

        // A second later, on track
        let mut req = request(goal, field());
        req.start = first.path.evaluate(1.0);
        req.prior = Some(PriorPlan {
            path: first.path.clone(),
            goal,
            elapsed_s: 1.0,
            planner: first.planner,
        });

        let second = planner.plan(&req).unwrap();
        assert!(second.reused);
        assert!(Arc::ptr_eq(&first.path, &second.path));

        // An obstacle appears ahead, so the path is replaced
        let mut obstacles = field();
        obstacles
            .obstacles
            .push(Obstacle::circle(Vector2::new(3.0, 0.0), 0.3));
        req.obstacles = Arc::new(obstacles);

        let third = planner.plan(&req).unwrap();
        assert!(!third.reused);
        assert!(third.path.hit(&req.obstacles, 0.09, 0.0).is_none());

        // Goal changes
        let mut req = request(GoalSpec::point(Vector2::new(-3.0, 0.0)), field());
        req.prior = Some(PriorPlan {
            path: first.path.clone(),
            goal,
            elapsed_s: 0.0,
            planner: first.planner,
        });
        assert!(!planner.plan(&req).unwrap().reused);
    }

    #[test]
    fn test_seeded_replay() {
        let mut obstacles = field();
        obstacles
            .obstacles
            .push(Obstacle::circle(Vector2::new(2.5, 0.0), 0.5));
        let req = request(GoalSpec::point(Vector2::new(5.0, 0.0)), obstacles);

        let mut a = Planner::new(PlannerParams::default());
        let mut b = Planner::new(PlannerParams::default());

        for _ in 0..3 {
            let pa = a.plan(&req).unwrap();
            let pb = b.plan(&req).unwrap();
            assert_eq!(pa.path.duration(), pb.path.duration());
            assert_eq!(pa.path.evaluate(1.0), pb.path.evaluate(1.0));
        }
    }

    #[test]
    fn test_escape_then_continue() {
        let mut obstacles = field();
        obstacles
            .obstacles
            .push(Obstacle::circle(Vector2::new(0.1, 0.0), 0.2));
        let goal = GoalSpec::point(Vector2::new(3.0, 0.0));

        let mut planner = Planner::new(PlannerParams::default());
        let plan = planner.plan(&request(goal, obstacles.clone())).unwrap();

        assert_eq!(plan.planner, SingleRobotPathPlanner::EscapeObstacles);
        assert!((plan.path.end().position_m - Vector2::new(3.0, 0.0)).norm() < 1e-9);

        // Without continuing only the escape is planned
        let mut params = PlannerParams::default();
        params.escape.continue_to_goal = false;
        let plan = Planner::new(params)
            .plan(&request(goal, obstacles.clone()))
            .unwrap();
        assert!(!obstacles.contains(&plan.path.end().position_m, 0.09));
        assert!((plan.path.end().position_m - Vector2::new(3.0, 0.0)).norm() > 1.0);
    }

    #[test]
    fn test_escape_then_continue_is_smooth() {
        let mut obstacles = field();
        obstacles
            .obstacles
            .push(Obstacle::circle(Vector2::new(0.1, 0.0), 0.2));
        let mut req = request(GoalSpec::point(Vector2::new(3.0, 1.0)), obstacles);
        req.start.heading_rad = 1.0;

        let plan = Planner::new(PlannerParams::default()).plan(&req).unwrap();
        assert_eq!(plan.planner, SingleRobotPathPlanner::EscapeObstacles);
        assert_eq!(plan.path.start().heading_rad, 1.0);

        // Nothing jumps where the escape hands over to the onward path
        let dt = 1e-3;
        let steps = max_steps(plan.path.as_ref(), dt);
        assert!(steps.position_m <= 2.0 * dt + 1e-9);
        assert!(steps.velocity_ms <= 1.0 * dt + 1e-6);
        assert!(steps.heading_rad < 0.2);
    }
}
