//! The parameter files shipped in `params/` must load into the structures they configure.

use robot_lib::{
    motion_ctrl::MotionCtrlParams,
    planning::{PlannerParams, SingleRobotPathPlanner},
    scenario::ScenarioParams,
};
use util::params;

fn params_path(file: &str) -> String {
    format!("{}/../params/{}", env!("CARGO_MANIFEST_DIR"), file)
}

#[test]
fn test_load_motion_ctrl() {
    let p: MotionCtrlParams = params::load_from(params_path("motion_ctrl.toml")).unwrap();

    assert!(p.cycle_period_s > 0.0);
    assert!(p.position.k_p > 0.0);
}

#[test]
fn test_load_planner() {
    let p: PlannerParams = params::load_from(params_path("planner.toml")).unwrap();

    assert_eq!(p.order.first(), Some(&SingleRobotPathPlanner::EscapeObstacles));
    assert_eq!(p.order.len(), 5);
    assert_eq!(p.rrt.max_time_ms, None);
}

#[test]
fn test_load_scenario() {
    let s: ScenarioParams = params::load_from(params_path("scenario.toml")).unwrap();

    // Both ends of the run are clear of the obstacles
    let target = s.goal.target_position().unwrap();
    assert!(!s.obstacles.contains(&target, 0.09));
    assert!(!s.obstacles.contains(&s.start_position_m, 0.09));
    assert!(s.replan_period_s > 0.0);
}
