//! Closed loop runs of the planners, motion control and the kinematic simulation together.

use std::{sync::Arc, time::Duration};

use comms_if::{
    goal::GoalSpec,
    robot::{MotionConstraints, RobotInstant, RotationConstraints},
};
use nalgebra::Vector2;
use robot_lib::{
    geom::Rect,
    motion_ctrl::{MotionCtrl, MotionCtrlParams},
    obstacle::{Obstacle, ObstacleSet},
    path::{Path, PathRef},
    plan_mgr::PlanMgr,
    planning::{PlanRequest, Planner, PlannerParams, SingleRobotPathPlanner},
    sim::{KinematicSim, SimParams},
};

const CYCLE_PERIOD_S: f64 = 0.01;

fn field() -> ObstacleSet {
    ObstacleSet::new(vec![], Some(Rect::centred(12.0, 9.0)))
}

fn request(start: RobotInstant, goal: GoalSpec, obstacles: ObstacleSet) -> PlanRequest {
    PlanRequest {
        start,
        goal,
        motion: MotionConstraints::new(2.0, 1.0),
        rotation: RotationConstraints::default(),
        obstacles: Arc::new(obstacles),
        prior: None,
    }
}

/// Track `path` for the given number of cycles, returning the final state and whether the end
/// of the path was reached.
fn track(path: &PathRef, start: RobotInstant, cycles: usize) -> (RobotInstant, bool) {
    let mut ctrl = MotionCtrl::new(
        MotionCtrlParams::default(),
        MotionConstraints::new(2.0, 1.0),
        RotationConstraints::default(),
    );
    let mut sim = KinematicSim::new(start, SimParams::default());
    let mut reached = false;

    for _ in 0..cycles {
        let current = sim.state();
        let (cmd, report) = ctrl
            .tick(&current, path, current.stamp_s - start.stamp_s)
            .unwrap();
        reached |= report.reached;
        sim.step(&cmd, CYCLE_PERIOD_S);
    }

    (sim.state(), reached)
}

#[test]
fn test_straight_line() {
    let start = RobotInstant::stationary(Vector2::new(0.0, 0.0), 0.0, 0.0);
    let goal_m = Vector2::new(5.0, 0.0);

    let plan = Planner::new(PlannerParams::default())
        .plan(&request(start, GoalSpec::point(goal_m), ObstacleSet::empty()))
        .unwrap();

    // 2 s up to 2 m/s, 0.5 s cruising, 2 s back down
    assert_eq!(plan.planner, SingleRobotPathPlanner::DirectTarget);
    assert!((plan.path.duration() - 4.5).abs() < 1e-9);
    assert!((plan.path.end().position_m - goal_m).norm() < 1e-9);

    let (end, _) = track(&plan.path, start, 450);
    assert!((end.stamp_s - 4.5).abs() < 1e-6);
    assert!((end.position_m - goal_m).norm() <= 0.05);

    // Given a little longer the robot settles and reports the goal reached
    let (end, reached) = track(&plan.path, start, 600);
    assert!(reached);
    assert!((end.position_m - goal_m).norm() <= 0.05);
    assert!(end.velocity_ms.norm() < 0.05);
}

#[test]
fn test_escape_from_circle() {
    let centre = Vector2::new(1.0, 1.0);
    let mut obstacles = field();
    obstacles.obstacles.push(Obstacle::circle(centre, 0.2));

    let start = RobotInstant::stationary(centre, 0.0, 0.0);

    let mut params = PlannerParams::default();
    params.escape.continue_to_goal = false;
    let inflation_m = params.robot_radius_m;

    let plan = Planner::new(params)
        .plan(&request(
            start,
            GoalSpec::point(Vector2::new(3.0, 3.0)),
            obstacles.clone(),
        ))
        .unwrap();

    assert_eq!(plan.planner, SingleRobotPathPlanner::EscapeObstacles);
    assert!((plan.path.end().position_m - centre).norm() >= 0.2 + inflation_m);
    assert!(!obstacles.contains(&plan.path.end().position_m, inflation_m));

    let cycles = (plan.path.duration() / CYCLE_PERIOD_S).ceil() as usize + 100;
    let (end, reached) = track(&plan.path, start, cycles);
    assert!(reached);
    assert!(!obstacles.contains(&end.position_m, inflation_m));
}

#[test]
fn test_escape_and_continue_around_obstacle() {
    let mut obstacles = field();
    obstacles
        .obstacles
        .push(Obstacle::circle(Vector2::new(0.0, 0.0), 0.2));
    obstacles
        .obstacles
        .push(Obstacle::circle(Vector2::new(1.5, 0.0), 0.4));

    let start = RobotInstant::stationary(Vector2::new(0.05, 0.0), 0.0, 0.0);
    let goal_m = Vector2::new(3.0, 0.0);

    let plan = Planner::new(PlannerParams::default())
        .plan(&request(start, GoalSpec::point(goal_m), obstacles.clone()))
        .unwrap();

    assert_eq!(plan.planner, SingleRobotPathPlanner::EscapeObstacles);
    assert!((plan.path.end().position_m - goal_m).norm() < 1e-9);

    // Once out of the first obstacle the path stays clear of everything
    let escape_s = (0..)
        .map(|i| i as f64 * 0.01)
        .find(|t| !obstacles.contains(&plan.path.evaluate(*t).position_m, 0.09))
        .unwrap();
    assert!(plan.path.hit(&obstacles, 0.09, escape_s).is_none());
}

#[test]
fn test_plan_mgr_closed_loop() {
    let mut plan_mgr = PlanMgr::new(PlannerParams::default()).unwrap();
    let mut ctrl = MotionCtrl::new(
        MotionCtrlParams::default(),
        MotionConstraints::new(2.0, 1.0),
        RotationConstraints::default(),
    );
    let mut sim = KinematicSim::new(
        RobotInstant::stationary(Vector2::new(0.0, 0.0), 0.0, 0.0),
        SimParams {
            response_time_s: 0.02,
        },
    );

    let goal_m = Vector2::new(2.0, 1.0);
    let obstacles = Arc::new(field());

    plan_mgr
        .request(
            sim.state(),
            GoalSpec::point(goal_m),
            MotionConstraints::new(2.0, 1.0),
            RotationConstraints::default(),
            obstacles.clone(),
        )
        .unwrap();
    let output = plan_mgr.wait(Duration::from_secs(5)).unwrap();
    assert!(output.new_path);
    assert!(output.failure.is_none());

    let mut reached = false;
    for i in 0..600 {
        let current = sim.state();

        // Replan every half second, which should hand back the same path while on track
        if i > 0 && i % 50 == 0 {
            plan_mgr
                .request(
                    current,
                    GoalSpec::point(goal_m),
                    MotionConstraints::new(2.0, 1.0),
                    RotationConstraints::default(),
                    obstacles.clone(),
                )
                .unwrap();
            plan_mgr.wait(Duration::from_secs(5)).unwrap();
        }
        plan_mgr.step().unwrap();

        let (path, elapsed_s) = plan_mgr.path(&current);
        let (cmd, report) = ctrl.tick(&current, &path, elapsed_s).unwrap();
        reached |= report.reached;

        sim.step(&cmd, CYCLE_PERIOD_S);
    }

    assert!(reached);
    assert!((sim.state().position_m - goal_m).norm() <= 0.05);
    assert_eq!(
        plan_mgr.active().unwrap().planner,
        SingleRobotPathPlanner::DirectTarget
    );

    plan_mgr.stop().unwrap();
}
