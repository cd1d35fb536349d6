//! # Rapidly exploring random tree planner
//!
//! The general purpose fallback. Grows a tree from the start position by repeatedly sampling a
//! point (the goal itself with probability `goal_bias`, otherwise uniformly over the field),
//! finding the nearest node and stepping from it towards the sample. Edges which would pass
//! through an inflated obstacle are discarded. Once a node lands within the goal tolerance the
//! goal is connected and the route is read back through the parent links.
//!
//! The route is then shortcut, replacing runs of waypoints with single straight segments where
//! they are clear, and timed with a trapezoidal profile.
//!
//! Running out of iterations (or time) is normal. Depending on `best_effort` the planner either
//! fails, to be retried next cycle, or returns a path to the node that got closest to the goal.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod tree;

pub use tree::{Tree, TreeNode};

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use comms_if::goal::GoalSpec;
use log::{debug, trace, warn};
use nalgebra::Vector2;
use rand::{rngs::StdRng, Rng};
use serde::Serialize;

use super::{path_failure, with_facing, PlanRequest, PlannerParams, PlanningError, RrtParams};
use crate::{
    geom::Rect,
    obstacle::{segment_clearance, ObstacleSet},
    path::{Path, PathRef, TrapezoidalPath},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Tree nodes closer together than this are treated as the same point.
const ZERO_LENGTH_M: f64 = 1e-6;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The outcome of growing a tree, before it is turned into a path.
#[derive(Debug, Clone, Serialize)]
pub struct RrtReport {
    pub start_m: Vector2<f64>,
    pub goal_m: Vector2<f64>,

    /// Number of samples drawn
    pub iterations: usize,

    /// True if the goal was connected to the tree
    pub reached: bool,

    pub tree: Tree,

    /// Route before shortcutting, empty on failure
    pub raw_route: Vec<Vector2<f64>>,

    /// Route after shortcutting, empty on failure
    pub route: Vec<Vector2<f64>>,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

pub(super) fn plan(
    req: &PlanRequest,
    params: &PlannerParams,
    rng: &mut StdRng,
) -> Result<PathRef, PlanningError> {
    let (goal_m, end_speed_ms) = match &req.goal {
        GoalSpec::Point {
            target_m,
            end_speed_ms,
            ..
        } => (*target_m, *end_speed_ms),
        _ => return Err(PlanningError::NotApplicable),
    };

    let inflation_m = params.robot_radius_m;
    let start_m = req.start.position_m;

    // Getting out of an obstacle is the escape planner's job
    if req.obstacles.contains(&start_m, inflation_m) {
        return Err(PlanningError::NotApplicable);
    }

    let report = grow(&req.obstacles, start_m, goal_m, inflation_m, &params.rrt, rng);

    if params.rrt.save_report {
        util::session::save_with_timestamp("rrt/rrt_report.json", report.clone());
    }

    if report.route.is_empty() {
        return Err(PlanningError::PlanningFailure(format!(
            "goal not reached after {} iterations ({} nodes)",
            report.iterations,
            report.tree.len()
        )));
    }

    if report.route.len() > 1 {
        let clearance_m = report
            .route
            .windows(2)
            .map(|w| segment_clearance(&req.obstacles, &w[0], &w[1], inflation_m))
            .fold(std::f64::INFINITY, f64::min);
        debug!(
            "RRT route of {} points, {:.3} m minimum clearance",
            report.route.len(),
            clearance_m
        );
    }

    let end_speed_ms = if report.reached { end_speed_ms } else { 0.0 };
    let path = TrapezoidalPath::from_instant(&req.start, report.route, end_speed_ms, &req.motion)
        .map_err(path_failure)?;

    // Braking from a moving start can leave the route the tree found
    if let Some(t_s) = path.hit(&req.obstacles, inflation_m, 0.0) {
        return Err(PlanningError::PlanningFailure(format!(
            "timed route hits an obstacle {:.2} s in",
            t_s
        )));
    }

    Ok(with_facing(Arc::new(path), req.goal.facing(), &req.rotation))
}

/// Grow a tree from `start_m` towards `goal_m` and extract the route.
///
/// On failure the report's route is empty, unless best effort is enabled and the tree made some
/// progress towards the goal.
pub fn grow<R: Rng>(
    obstacles: &ObstacleSet,
    start_m: Vector2<f64>,
    goal_m: Vector2<f64>,
    inflation_m: f64,
    params: &RrtParams,
    rng: &mut R,
) -> RrtReport {
    let mut report = RrtReport {
        start_m,
        goal_m,
        iterations: 0,
        reached: false,
        tree: Tree::new(start_m),
        raw_route: Vec::new(),
        route: Vec::new(),
    };

    let dist_to_goal_m = (goal_m - start_m).norm();

    // Already there, no motion needed
    if dist_to_goal_m <= params.goal_tolerance_m {
        report.reached = true;
        report.raw_route = vec![start_m];
        report.route = vec![start_m];
        return report;
    }

    let goal_blocked = obstacles.contains(&goal_m, inflation_m);
    if goal_blocked && !params.best_effort {
        debug!("RRT goal is inside an obstacle, not sampling");
        return report;
    }

    let bounds = sample_bounds(obstacles, &start_m, &goal_m, inflation_m, params);
    let deadline = params
        .max_time_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));

    let mut goal_idx = None;

    for _ in 0..params.max_iterations {
        if let Some(d) = deadline {
            if Instant::now() >= d {
                debug!("RRT time budget exhausted");
                break;
            }
        }
        report.iterations += 1;

        let sample_m = if rng.gen::<f64>() < params.goal_bias {
            goal_m
        } else {
            bounds.sample(rng)
        };

        let nearest = report.tree.nearest(&sample_m);
        let nearest_m = report.tree.position(nearest);
        let new_m = steer(&nearest_m, &sample_m, params.step_m);

        if (new_m - nearest_m).norm() <= ZERO_LENGTH_M {
            continue;
        }
        if obstacles.segment_hits(&nearest_m, &new_m, inflation_m) {
            continue;
        }

        let new_idx = report.tree.insert(new_m, nearest);

        if (goal_m - new_m).norm() <= params.goal_tolerance_m
            && !obstacles.segment_hits(&new_m, &goal_m, inflation_m)
        {
            goal_idx = Some(report.tree.insert(goal_m, new_idx));
            break;
        }
    }

    let end_idx = match goal_idx {
        Some(i) => {
            report.reached = true;
            trace!(
                "RRT reached goal after {} iterations with {} nodes",
                report.iterations,
                report.tree.len()
            );
            i
        }
        None if params.best_effort => {
            let closest = report.tree.nearest(&goal_m);
            if closest == Tree::ROOT {
                return report;
            }

            warn!(
                "RRT did not reach the goal, using best effort path ending {:.3} m short",
                (report.tree.position(closest) - goal_m).norm()
            );
            closest
        }
        None => return report,
    };

    report.raw_route = report.tree.route_to(end_idx);
    report.route = if params.shortcut {
        shortcut(&report.raw_route, obstacles, inflation_m)
    } else {
        report.raw_route.clone()
    };

    report
}

/// Replace runs of waypoints with single clear segments, greedily taking the furthest waypoint
/// that can be reached directly.
pub fn shortcut(
    route: &[Vector2<f64>],
    obstacles: &ObstacleSet,
    inflation_m: f64,
) -> Vec<Vector2<f64>> {
    if route.len() <= 2 {
        return route.to_vec();
    }

    let mut out = vec![route[0]];
    let mut i = 0;

    while i < route.len() - 1 {
        // The tree edge i -> i + 1 is known to be clear, so this always makes progress
        let mut j = route.len() - 1;
        while j > i + 1 && obstacles.segment_hits(&route[i], &route[j], inflation_m) {
            j -= 1;
        }

        out.push(route[j]);
        i = j;
    }

    out
}

/// Step from `from` towards `to`, by no more than `step_m`.
fn steer(from: &Vector2<f64>, to: &Vector2<f64>, step_m: f64) -> Vector2<f64> {
    let delta = to - from;
    let dist = delta.norm();

    if dist <= step_m {
        *to
    } else {
        from + delta * (step_m / dist)
    }
}

/// The area samples are drawn from.
fn sample_bounds(
    obstacles: &ObstacleSet,
    start_m: &Vector2<f64>,
    goal_m: &Vector2<f64>,
    inflation_m: f64,
    params: &RrtParams,
) -> Rect {
    match obstacles.free_bounds(inflation_m) {
        Some(b) => b,
        None => {
            let margin = Vector2::new(params.unbounded_margin_m, params.unbounded_margin_m);
            Rect::new(
                start_m.inf(goal_m) - margin,
                start_m.sup(goal_m) + margin,
            )
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        obstacle::{Obstacle, Shape},
        path::test_util::max_steps,
    };
    use comms_if::robot::{MotionConstraints, RobotInstant, RotationConstraints};
    use rand::SeedableRng;

    fn wall() -> ObstacleSet {
        // A wall between start and goal with gaps at either end
        ObstacleSet::new(
            vec![Obstacle::new(
                Shape::rect(Vector2::new(1.9, -1.0), Vector2::new(2.1, 1.0)),
                0.0,
            )],
            Some(Rect::centred(6.0, 4.0)),
        )
    }

    fn request(obstacles: ObstacleSet) -> PlanRequest {
        PlanRequest {
            start: RobotInstant::stationary(Vector2::new(0.0, 0.0), 0.0, 0.0),
            goal: GoalSpec::point(Vector2::new(2.5, 0.0)),
            motion: MotionConstraints::new(2.0, 1.0),
            rotation: RotationConstraints::default(),
            obstacles: Arc::new(obstacles),
            prior: None,
        }
    }

    #[test]
    fn test_steer() {
        let from = Vector2::new(0.0, 0.0);
        assert_eq!(steer(&from, &Vector2::new(0.1, 0.0), 0.25), Vector2::new(0.1, 0.0));
        assert!((steer(&from, &Vector2::new(0.0, 2.0), 0.25) - Vector2::new(0.0, 0.25)).norm() < 1e-12);
    }

    #[test]
    fn test_finds_route_around_wall() {
        let params = PlannerParams::default();
        let req = request(wall());
        let mut rng = StdRng::seed_from_u64(1);

        let path = plan(&req, &params, &mut rng).unwrap();

        assert_eq!(path.start().position_m, req.start.position_m);
        assert!((path.end().position_m - Vector2::new(2.5, 0.0)).norm() < 1e-9);
        assert!(path
            .hit(&req.obstacles, params.robot_radius_m, 0.0)
            .is_none());
    }

    #[test]
    fn test_route_is_smooth() {
        let params = PlannerParams::default();
        let mut req = request(wall());
        req.start.heading_rad = -2.0;

        let path = plan(&req, &params, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(path.start().heading_rad, -2.0);

        // Stops at each corner, and turns to face the way it goes without jumping
        let dt = 1e-3;
        let steps = max_steps(path.as_ref(), dt);
        assert!(steps.position_m <= 2.0 * dt + 1e-9);
        assert!(steps.velocity_ms <= 1.0 * dt + 1e-6);
        assert!(steps.heading_rad < 0.2);
    }

    #[test]
    fn test_same_seed_same_tree() {
        let params = PlannerParams::default();
        let obstacles = wall();
        let start = Vector2::new(0.0, 0.0);
        let goal = Vector2::new(2.5, 0.0);

        let a = grow(&obstacles, start, goal, 0.09, &params.rrt, &mut StdRng::seed_from_u64(7));
        let b = grow(&obstacles, start, goal, 0.09, &params.rrt, &mut StdRng::seed_from_u64(7));

        assert_eq!(a.iterations, b.iterations);
        assert_eq!(a.route, b.route);
        assert_eq!(a.tree.len(), b.tree.len());
    }

    #[test]
    fn test_start_in_obstacle_rejected() {
        let mut req = request(wall());
        req.start.position_m = Vector2::new(2.0, 0.0);

        assert_eq!(
            plan(&req, &PlannerParams::default(), &mut StdRng::seed_from_u64(0)).unwrap_err(),
            PlanningError::NotApplicable
        );
    }

    #[test]
    fn test_zero_length_goal() {
        let mut req = request(wall());
        req.goal = GoalSpec::point(req.start.position_m);

        let path = plan(&req, &PlannerParams::default(), &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(path.duration(), 0.0);
    }

    #[test]
    fn test_start_within_tolerance() {
        let params = PlannerParams::default();
        let mut req = request(wall());
        req.goal = GoalSpec::point(
            req.start.position_m + Vector2::new(0.5 * params.rrt.goal_tolerance_m, 0.0),
        );

        let path = plan(&req, &params, &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(path.duration(), 0.0);
        assert_eq!(path.end().position_m, req.start.position_m);

        let report = grow(
            &req.obstacles,
            req.start.position_m,
            req.goal.target_position().unwrap(),
            params.robot_radius_m,
            &params.rrt,
            &mut StdRng::seed_from_u64(0),
        );
        assert!(report.reached);
        assert_eq!(report.iterations, 0);
        assert_eq!(report.tree.len(), 1);
    }

    #[test]
    fn test_best_effort_policy() {
        // Goal enclosed in a box, it can never be reached
        let obstacles = ObstacleSet::new(
            vec![
                Obstacle::new(Shape::rect(Vector2::new(1.5, -1.0), Vector2::new(1.7, 1.0)), 0.0),
                Obstacle::new(Shape::rect(Vector2::new(2.5, -1.0), Vector2::new(2.7, 1.0)), 0.0),
                Obstacle::new(Shape::rect(Vector2::new(1.5, 0.8), Vector2::new(2.7, 1.0)), 0.0),
                Obstacle::new(Shape::rect(Vector2::new(1.5, -1.0), Vector2::new(2.7, -0.8)), 0.0),
            ],
            Some(Rect::centred(6.0, 4.0)),
        );
        let mut req = request(obstacles);
        req.goal = GoalSpec::point(Vector2::new(2.1, 0.0));

        let mut params = PlannerParams::default();
        params.rrt.max_iterations = 300;

        params.rrt.best_effort = false;
        assert!(matches!(
            plan(&req, &params, &mut StdRng::seed_from_u64(3)),
            Err(PlanningError::PlanningFailure(_))
        ));

        params.rrt.best_effort = true;
        let path = plan(&req, &params, &mut StdRng::seed_from_u64(3)).unwrap();
        assert!(path.duration() > 0.0);
        assert!((path.end().position_m - Vector2::new(2.1, 0.0)).norm() < 2.1);
        assert!(path.hit(&req.obstacles, params.robot_radius_m, 0.0).is_none());
    }

    #[test]
    fn test_shortcut_straightens_clear_route() {
        let route = vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(0.5, 0.3),
            Vector2::new(1.0, -0.2),
            Vector2::new(2.0, 0.0),
        ];

        let short = shortcut(&route, &ObstacleSet::empty(), 0.1);
        assert_eq!(short, vec![Vector2::new(0.0, 0.0), Vector2::new(2.0, 0.0)]);
    }
}
