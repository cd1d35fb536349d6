//! Motion control module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::Arc;

use comms_if::{
    cmd::{MotionCmd, RotationCommand},
    robot::{MotionConstraints, RobotInstant, RotationConstraints},
};
use log::{debug, info};
use nalgebra::Vector2;
use serde::Serialize;
use util::{maths::ang_dist, params};

use super::{MotionCtrlParams, PidController};
use crate::path::{Path, PathRef};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Tracks the active path.
#[derive(Debug)]
pub struct MotionCtrl {
    params: MotionCtrlParams,

    motion: MotionConstraints,
    rotation: RotationConstraints,

    /// The path being tracked, used to detect replacement
    active_path: Option<PathRef>,

    /// Position controllers for the X and Y axes
    x_ctrl: PidController,
    y_ctrl: PidController,

    /// Heading controller
    head_ctrl: PidController,

    /// Velocity commanded on the previous cycle
    last_velocity_ms: Option<Vector2<f64>>,
}

/// The status report containing the tracking errors and goal state.
#[derive(Debug, Default, Copy, Clone, Serialize)]
pub struct StatusReport {
    /// The instant the path wants the robot in this cycle
    pub target: RobotInstant,

    /// Distance between the robot and the target
    pub position_error_m: f64,

    /// Heading error to the target, positive anticlockwise
    pub heading_error_rad: f64,

    /// Time left on the path
    pub remaining_s: f64,

    /// True if the path was replaced this cycle
    pub path_replaced: bool,

    /// True if the robot is at the end of the path
    pub reached: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Potential errors that can occur during processing of the module.
#[derive(Debug, thiserror::Error)]
pub enum MotionCtrlError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(params::LoadError),

    /// The robot is too far from the path for the state estimate to be believable.
    #[error("Robot is {error_m:.3} m from the path, beyond the limit of {limit_m:.3} m")]
    ControlDivergence { error_m: f64, limit_m: f64 },

    /// Attempted to track the active path before one was set.
    #[error("No path has been set")]
    NoPath,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MotionCtrl {
    /// Initialise motion control from a parameter file, relative to the parameters directory.
    pub fn init(
        params_path: &str,
        motion: MotionConstraints,
        rotation: RotationConstraints,
    ) -> Result<Self, MotionCtrlError> {
        let params = params::load(params_path).map_err(MotionCtrlError::ParamLoadError)?;

        Ok(Self::new(params, motion, rotation))
    }

    pub fn new(
        params: MotionCtrlParams,
        motion: MotionConstraints,
        rotation: RotationConstraints,
    ) -> Self {
        let dt_s = params.cycle_period_s;

        Self {
            x_ctrl: PidController::symmetric(params.position, motion.max_speed_ms, dt_s),
            y_ctrl: PidController::symmetric(params.position, motion.max_speed_ms, dt_s),
            head_ctrl: PidController::symmetric(params.heading, rotation.max_speed_rads, dt_s),
            params,
            motion,
            rotation,
            active_path: None,
            last_velocity_ms: None,
        }
    }

    pub fn params(&self) -> &MotionCtrlParams {
        &self.params
    }

    /// The path currently being tracked.
    pub fn active_path(&self) -> Option<&PathRef> {
        self.active_path.as_ref()
    }

    /// Set the path to track, resetting the controllers if it differs from the current one.
    ///
    /// Returns true if the path was replaced.
    pub fn set_path(&mut self, path: PathRef) -> bool {
        let replaced = match &self.active_path {
            Some(p) => !Arc::ptr_eq(p, &path),
            None => true,
        };

        // The previous command is kept so the new path starts from what the robot is doing
        if replaced {
            self.reset_controllers();
            self.active_path = Some(path);
        }

        replaced
    }

    /// Clear the controllers' history, for example after the robot has been stopped or moved
    /// by hand.
    pub fn reset(&mut self) {
        self.reset_controllers();
        self.last_velocity_ms = None;
    }

    fn reset_controllers(&mut self) {
        debug!("Resetting motion controllers");
        self.x_ctrl.reset();
        self.y_ctrl.reset();
        self.head_ctrl.reset();
    }

    /// Limit the change in commanded velocity since the last cycle to what the robot can
    /// accelerate through in one cycle.
    fn rate_limit(&mut self, current: &RobotInstant, velocity_ms: Vector2<f64>) -> Vector2<f64> {
        let last_ms = self.last_velocity_ms.unwrap_or(current.velocity_ms);
        let max_step_ms = self.motion.max_accel_mss * self.params.cycle_period_s;

        let step_ms = velocity_ms - last_ms;
        let limited_ms = if step_ms.norm() > max_step_ms {
            last_ms + step_ms * (max_step_ms / step_ms.norm())
        } else {
            velocity_ms
        };

        self.last_velocity_ms = Some(limited_ms);
        limited_ms
    }

    /// Compute the command for this cycle.
    ///
    /// `elapsed_s` is the time since the start of `path`. If `path` is not the path tracked on
    /// the previous cycle it becomes the active path and the controllers are reset.
    pub fn tick(
        &mut self,
        current: &RobotInstant,
        path: &PathRef,
        elapsed_s: f64,
    ) -> Result<(MotionCmd, StatusReport), MotionCtrlError> {
        let path_replaced = self.set_path(path.clone());
        if path_replaced {
            info!(
                "Tracking new path of {:.3} s ending at ({:.3}, {:.3})",
                path.duration(),
                path.end().position_m.x,
                path.end().position_m.y
            );
        }

        let target = path.evaluate(elapsed_s);
        let ahead = path.evaluate(elapsed_s + self.params.lookahead_s);

        let position_error_m = (target.position_m - current.position_m).norm();
        if position_error_m > self.params.divergence_limit_m {
            return Err(MotionCtrlError::ControlDivergence {
                error_m: position_error_m,
                limit_m: self.params.divergence_limit_m,
            });
        }

        let heading_error_rad = ang_dist(current.heading_rad, target.heading_rad);
        let remaining_s = path.remaining(elapsed_s);

        let mut report = StatusReport {
            target,
            position_error_m,
            heading_error_rad,
            remaining_s,
            path_replaced,
            reached: false,
        };

        // At the end of the path hold the final pose, coming to rest
        let end = path.end();
        let past_end = remaining_s <= self.params.remaining_tolerance_s;
        if past_end
            && (end.position_m - current.position_m).norm() <= self.params.position_tolerance_m
            && ang_dist(current.heading_rad, end.heading_rad).abs()
                <= self.params.heading_tolerance_rad
        {
            report.reached = true;

            let mut cmd = MotionCmd::hold(end.heading_rad);
            cmd.velocity_ms = self.rate_limit(current, Vector2::zeros());
            return Ok((cmd, report));
        }

        // Feedforward plus correction, limited to the maximum speed. Nothing is fed forward once
        // the path has run out, the robot only closes on the end point.
        let correction_ms = Vector2::new(
            self.x_ctrl.run(target.position_m.x, current.position_m.x),
            self.y_ctrl.run(target.position_m.y, current.position_m.y),
        );
        let feedforward_ms = if past_end {
            Vector2::zeros()
        } else {
            ahead.velocity_ms
        };
        let mut velocity_ms = feedforward_ms + correction_ms;
        let speed_ms = velocity_ms.norm();
        if speed_ms > self.motion.max_speed_ms {
            velocity_ms *= self.motion.max_speed_ms / speed_ms;
        }
        let velocity_ms = self.rate_limit(current, velocity_ms);

        let max_rate_rads = self.rotation.max_speed_rads;
        let rate_rads = util::maths::clamp(
            ahead.angular_vel_rads + self.head_ctrl.run_error(heading_error_rad),
            -max_rate_rads,
            max_rate_rads,
        );

        Ok((
            MotionCmd {
                velocity_ms,
                rotation: RotationCommand::AngularVelocity(rate_rads),
            },
            report,
        ))
    }

    /// Compute the command for this cycle against the active path.
    pub fn tick_active(
        &mut self,
        current: &RobotInstant,
        elapsed_s: f64,
    ) -> Result<(MotionCmd, StatusReport), MotionCtrlError> {
        let path = self.active_path.clone().ok_or(MotionCtrlError::NoPath)?;
        self.tick(current, &path, elapsed_s)
    }
}
