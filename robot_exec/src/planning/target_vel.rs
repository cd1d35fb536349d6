//! Reach and hold a velocity
//!
//! Accelerates from the current velocity to the target at the maximum acceleration, then holds
//! the target for a short horizon. The path is replanned long before the horizon runs out, so it
//! only has to be good for the next few cycles. If the path would run into an obstacle it is cut
//! short and the robot brakes to rest at the maximum acceleration before reaching it.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::Arc;

use comms_if::{goal::GoalSpec, robot::RobotInstant};
use log::debug;
use nalgebra::Vector2;
use ordered_float::OrderedFloat;

use super::{path_failure, with_facing, PlanRequest, PlannerParams, PlanningError};
use crate::path::{InterpolatedPath, Interpolation, Path, PathRef};

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

pub(super) fn plan(req: &PlanRequest, params: &PlannerParams) -> Result<PathRef, PlanningError> {
    let (mut target_ms, facing) = match &req.goal {
        GoalSpec::Velocity {
            velocity_ms,
            facing,
        } => (*velocity_ms, *facing),
        _ => return Err(PlanningError::NotApplicable),
    };

    if target_ms.norm() > req.motion.max_speed_ms {
        target_ms = target_ms.normalize() * req.motion.max_speed_ms;
    }

    let start = &req.start;
    let delta_ms = target_ms - start.velocity_ms;
    let ramp_s = delta_ms.norm() / req.motion.max_accel_mss;
    let accel_mss = if ramp_s > 0.0 {
        delta_ms / ramp_s
    } else {
        Vector2::zeros()
    };
    let duration_s = ramp_s + params.target_vel.horizon_s;

    // Regular samples plus the end of the ramp, so the interpolation is exact either side of it
    let step_s = params.target_vel.sample_step_s.max(1e-3);
    let mut times: Vec<f64> = (0..)
        .map(|i| i as f64 * step_s)
        .take_while(|t| *t < duration_s)
        .collect();
    times.push(ramp_s);
    times.push(duration_s);
    times.sort_by_key(|t| OrderedFloat(*t));
    times.dedup_by(|b, a| *b - *a < 1e-9);

    let state_at = |t_s: f64| -> RobotInstant {
        let (position_m, velocity_ms) = if t_s <= ramp_s {
            (
                start.position_m + start.velocity_ms * t_s + accel_mss * (0.5 * t_s * t_s),
                start.velocity_ms + accel_mss * t_s,
            )
        } else {
            let ramp_end_m = start.position_m
                + start.velocity_ms * ramp_s
                + accel_mss * (0.5 * ramp_s * ramp_s);
            (ramp_end_m + target_ms * (t_s - ramp_s), target_ms)
        };

        RobotInstant {
            position_m,
            heading_rad: start.heading_rad,
            velocity_ms,
            angular_vel_rads: 0.0,
            stamp_s: start.stamp_s + t_s,
        }
    };

    let waypoints: Vec<_> = times.iter().map(|t| (*t, state_at(*t))).collect();

    let full =
        InterpolatedPath::new(waypoints.clone(), Interpolation::CubicHermite).map_err(path_failure)?;

    let hit_s = match full.hit(&req.obstacles, params.robot_radius_m, 0.0) {
        None => return Ok(with_facing(Arc::new(full), facing, &req.rotation)),
        Some(t) => t,
    };

    // Brake from the latest sample that still leaves room to stop clear of the obstacle
    for k in (0..waypoints.len()).rev() {
        if waypoints[k].0 >= hit_s {
            continue;
        }

        let mut braked = waypoints[..=k].to_vec();
        braked.extend(braking(&waypoints[k], req.motion.max_accel_mss, step_s).into_iter().skip(1));
        if braked.len() < 2 {
            continue;
        }

        let path =
            InterpolatedPath::new(braked, Interpolation::CubicHermite).map_err(path_failure)?;
        if path.hit(&req.obstacles, params.robot_radius_m, 0.0).is_none() {
            debug!(
                "Target velocity path cut at {:.3} s, stopping at {:.3} s before a hit at {:.3} s",
                waypoints[k].0,
                path.duration(),
                hit_s
            );
            return Ok(with_facing(Arc::new(path), facing, &req.rotation));
        }
    }

    Err(PlanningError::PlanningFailure(format!(
        "cannot stop before the obstacle hit {:.2} s in",
        hit_s
    )))
}

/// Samples of a straight line stop from `from` at `decel_mss`, starting with `from` itself.
fn braking(from: &(f64, RobotInstant), decel_mss: f64, step_s: f64) -> Vec<(f64, RobotInstant)> {
    let (t0_s, state) = from;
    let speed_ms = state.velocity_ms.norm();
    if speed_ms <= 0.0 || decel_mss <= 0.0 {
        return vec![*from];
    }

    let dir = state.velocity_ms / speed_ms;
    let stop_s = speed_ms / decel_mss;

    let mut taus: Vec<f64> = (0..)
        .map(|i| i as f64 * step_s)
        .take_while(|tau| *tau < stop_s)
        .collect();
    taus.push(stop_s);
    taus.dedup_by(|b, a| *b - *a < 1e-9);

    taus.into_iter()
        .map(|tau| {
            let velocity_ms = if tau >= stop_s {
                Vector2::zeros()
            } else {
                state.velocity_ms - dir * (decel_mss * tau)
            };
            let instant = RobotInstant {
                position_m: state.position_m + state.velocity_ms * tau
                    - dir * (0.5 * decel_mss * tau * tau),
                velocity_ms,
                stamp_s: state.stamp_s + tau,
                ..*state
            };
            (t0_s + tau, instant)
        })
        .collect()
}
