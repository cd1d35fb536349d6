//! Turn on the spot, or nearly so
//!
//! Rotation follows a trapezoidal angle profile under the rotation constraints, while any small
//! translation follows its own profile under the motion constraints. The two are sampled into an
//! interpolated path.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::Arc;

use comms_if::{
    goal::{Facing, GoalSpec},
    robot::RobotInstant,
};
use nalgebra::Vector2;
use util::maths::{ang_dist, wrap_to_pi};

use super::{path_failure, PlanRequest, PlannerParams, PlanningError};
use crate::{
    geom::heading_of,
    path::{InterpolatedPath, Interpolation, Path, PathRef, TrapezoidProfile},
};

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

pub(super) fn plan(req: &PlanRequest, params: &PlannerParams) -> Result<PathRef, PlanningError> {
    let start = &req.start;

    let (target_m, target_heading_rad) = match pivot_target(&req.goal, start, params) {
        Some(t) => t,
        None => return Err(PlanningError::NotApplicable),
    };

    let turn_rad = ang_dist(start.heading_rad, target_heading_rad);
    let offset_m = target_m - start.position_m;

    if turn_rad.abs() <= params.pivot.heading_tolerance_rad {
        return match req.goal {
            // Nothing to do
            GoalSpec::Heading { .. } => Ok(Arc::new(InterpolatedPath::hold(
                RobotInstant::stationary(start.position_m, start.heading_rad, start.stamp_s),
            ))),
            // Mostly translation, leave it to the other planners
            _ => Err(PlanningError::NotApplicable),
        };
    }

    // Keep any existing spin in the right direction
    let turn_sign = turn_rad.signum();
    let spin_rads = (start.angular_vel_rads * turn_sign).max(0.0);

    let rotation = TrapezoidProfile::new(
        turn_rad.abs(),
        spin_rads,
        0.0,
        req.rotation.max_speed_rads,
        req.rotation.max_accel_radss,
    );
    let translation = TrapezoidProfile::new(
        offset_m.norm(),
        0.0,
        0.0,
        req.motion.max_speed_ms,
        req.motion.max_accel_mss,
    );
    let direction = if offset_m.norm() > 0.0 {
        offset_m.normalize()
    } else {
        Vector2::zeros()
    };

    let duration_s = rotation.duration().max(translation.duration());
    let step_s = params.pivot.sample_step_s.max(1e-3);
    let num_steps = (duration_s / step_s).ceil().max(1.0) as usize;

    let waypoints = (0..=num_steps)
        .map(|i| {
            let t_s = (i as f64 * step_s).min(duration_s);
            let (angle, rate) = rotation.state_at(t_s);
            let (dist, speed) = translation.state_at(t_s);

            let inst = RobotInstant {
                position_m: start.position_m + direction * dist,
                heading_rad: wrap_to_pi(start.heading_rad + turn_sign * angle),
                velocity_ms: direction * speed,
                angular_vel_rads: turn_sign * rate,
                stamp_s: start.stamp_s + t_s,
            };
            (t_s, inst)
        })
        .collect::<Vec<_>>();

    // Drop a repeated final sample when the duration is a whole number of steps
    let waypoints = dedup_times(waypoints);

    let path = InterpolatedPath::new(waypoints, Interpolation::CubicHermite).map_err(path_failure)?;

    if let Some(t_s) = path.hit(&req.obstacles, params.robot_radius_m, 0.0) {
        return Err(PlanningError::PlanningFailure(format!(
            "pivot hits an obstacle {:.2} s in",
            t_s
        )));
    }

    Ok(Arc::new(path))
}

/// Where a pivot should end up, if the goal calls for one.
fn pivot_target(
    goal: &GoalSpec,
    start: &RobotInstant,
    params: &PlannerParams,
) -> Option<(Vector2<f64>, f64)> {
    match goal {
        GoalSpec::Heading { heading_rad } => Some((start.position_m, *heading_rad)),
        GoalSpec::Point {
            target_m, facing, ..
        } => {
            if (target_m - start.position_m).norm() > params.pivot.max_translation_m {
                return None;
            }

            match facing {
                Facing::Heading(h) => Some((*target_m, *h)),
                Facing::Point(p) if (p - target_m).norm() > 1e-6 => {
                    Some((*target_m, heading_of(&(p - target_m))))
                }
                _ => None,
            }
        }
        GoalSpec::Velocity { .. } => None,
    }
}

fn dedup_times(mut waypoints: Vec<(f64, RobotInstant)>) -> Vec<(f64, RobotInstant)> {
    waypoints.dedup_by(|b, a| b.0 <= a.0);
    waypoints
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{obstacle::ObstacleSet, path::test_util::max_position_step};
    use comms_if::robot::{MotionConstraints, RotationConstraints};
    use std::f64::consts::FRAC_PI_2;

    fn request(goal: GoalSpec) -> PlanRequest {
        PlanRequest {
            start: RobotInstant::stationary(Vector2::new(1.0, 1.0), 0.0, 3.0),
            goal,
            motion: MotionConstraints::new(2.0, 1.0),
            rotation: RotationConstraints::new(4.0, 4.0),
            obstacles: Arc::new(ObstacleSet::empty()),
            prior: None,
        }
    }

    #[test]
    fn test_pivot_in_place() {
        let path = plan(
            &request(GoalSpec::Heading {
                heading_rad: FRAC_PI_2,
            }),
            &PlannerParams::default(),
        )
        .unwrap();

        // Triangular profile, pi/2 at 4 rad/s^2 peaks below the speed limit
        let expected_s = 2.0 * (FRAC_PI_2 / 4.0f64).sqrt();
        assert!((path.duration() - expected_s).abs() < 1e-9);
        assert!((path.end().heading_rad - FRAC_PI_2).abs() < 1e-9);
        assert_eq!(path.end().position_m, Vector2::new(1.0, 1.0));
        assert!(path.evaluate(0.5 * expected_s).angular_vel_rads > 0.0);
    }

    #[test]
    fn test_pivot_short_way_round() {
        let path = plan(
            &request(GoalSpec::Heading { heading_rad: -3.0 }),
            &PlannerParams::default(),
        )
        .unwrap();

        assert!(path.evaluate(0.1).angular_vel_rads < 0.0);
        assert!((ang_dist(path.end().heading_rad, -3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_pivot_with_small_translation() {
        let path = plan(
            &request(GoalSpec::Point {
                target_m: Vector2::new(1.03, 1.0),
                end_speed_ms: 0.0,
                facing: Facing::Heading(2.0),
            }),
            &PlannerParams::default(),
        )
        .unwrap();

        assert!((path.end().position_m - Vector2::new(1.03, 1.0)).norm() < 1e-9);
        assert!((path.end().heading_rad - 2.0).abs() < 1e-9);
        assert!(max_position_step(path.as_ref(), 0.01) < 0.01);
    }

    #[test]
    fn test_already_facing() {
        let path = plan(
            &request(GoalSpec::Heading { heading_rad: 0.01 }),
            &PlannerParams::default(),
        )
        .unwrap();
        assert_eq!(path.duration(), 0.0);

        // Far away point goals aren't pivots
        assert_eq!(
            plan(
                &request(GoalSpec::Point {
                    target_m: Vector2::new(3.0, 1.0),
                    end_speed_ms: 0.0,
                    facing: Facing::Heading(1.0),
                }),
                &PlannerParams::default()
            )
            .unwrap_err(),
            PlanningError::NotApplicable
        );
    }
}
