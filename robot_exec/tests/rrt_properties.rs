//! Properties of the tree planner over randomly generated obstacle fields.

use std::sync::Arc;

use comms_if::{
    goal::GoalSpec,
    robot::{MotionConstraints, RobotInstant, RotationConstraints},
};
use nalgebra::Vector2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use robot_lib::{
    geom::Rect,
    obstacle::{Obstacle, ObstacleSet},
    path::Path,
    planning::{rrt, PlanRequest, Planner, PlannerParams, PlanningError, RrtParams},
};

const NUM_TRIALS: u64 = 20;
const INFLATION_M: f64 = 0.09;

/// A field with a scattering of round robots between x = -3.5 and 3.5, leaving the ends clear.
fn random_field(rng: &mut StdRng) -> ObstacleSet {
    let num_obstacles = rng.gen_range(1..=8);
    let obstacles = (0..num_obstacles)
        .map(|_| {
            Obstacle::circle(
                Vector2::new(rng.gen_range(-3.5..3.5), rng.gen_range(-4.0..4.0)),
                rng.gen_range(0.1..0.5),
            )
        })
        .collect();

    ObstacleSet::new(obstacles, Some(Rect::centred(12.0, 9.0)))
}

#[test]
fn test_tree_edges_are_clear() {
    let start_m = Vector2::new(-5.0, 0.0);
    let goal_m = Vector2::new(5.0, 0.0);
    let mut reached = 0;

    for seed in 0..NUM_TRIALS {
        let mut rng = StdRng::seed_from_u64(seed);
        let obstacles = random_field(&mut rng);

        let report = rrt::grow(
            &obstacles,
            start_m,
            goal_m,
            INFLATION_M,
            &RrtParams::default(),
            &mut rng,
        );

        for node in report.tree.nodes() {
            if let Some(parent) = node.parent {
                let parent_m = report.tree.position(parent);
                assert!(
                    !obstacles.segment_hits(&parent_m, &node.position_m, INFLATION_M),
                    "seed {}: edge ({:?}, {:?}) hits an obstacle",
                    seed,
                    parent_m,
                    node.position_m
                );
            }
        }

        for route in &[&report.raw_route, &report.route] {
            for pair in route.windows(2) {
                assert!(!obstacles.segment_hits(&pair[0], &pair[1], INFLATION_M));
            }
        }

        if report.reached {
            reached += 1;
            assert_eq!(report.route.first(), Some(&start_m));
            assert_eq!(report.route.last(), Some(&goal_m));
            assert!(report.route.len() <= report.raw_route.len());
        } else {
            assert!(report.route.is_empty());
        }
    }

    assert!(reached > NUM_TRIALS / 2);
}

#[test]
fn test_planned_paths_are_clear() {
    let start = RobotInstant::stationary(Vector2::new(-5.0, 0.0), 0.0, 0.0);
    let goal_m = Vector2::new(5.0, 0.0);

    for seed in 0..NUM_TRIALS {
        let mut rng = StdRng::seed_from_u64(1000 + seed);

        let mut params = PlannerParams::default();
        params.master_seed = seed;
        let mut planner = Planner::new(params);

        let req = PlanRequest {
            start,
            goal: GoalSpec::point(goal_m),
            motion: MotionConstraints::new(2.0, 1.0),
            rotation: RotationConstraints::default(),
            obstacles: Arc::new(random_field(&mut rng)),
            prior: None,
        };

        match planner.plan(&req) {
            Ok(plan) => {
                assert!(plan.path.hit(&req.obstacles, INFLATION_M, 0.0).is_none());
                assert!((plan.path.end().position_m - goal_m).norm() < 1e-9);
                assert_eq!(plan.path.end().velocity_ms, Vector2::zeros());
            }
            // Running out of iterations is allowed, anything else isn't
            Err(e) => assert!(matches!(e, PlanningError::PlanningFailure(_))),
        }
    }
}
