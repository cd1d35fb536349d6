//! # Kinematic simulation
//!
//! A stand-in for the real robot and state estimation. The robot's velocity follows the
//! commanded velocity with a first order lag, and its position and heading are integrated from
//! that. There are no dynamics, collisions or noise.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    cmd::{MotionCmd, RotationCommand},
    robot::RobotInstant,
};
use serde::Deserialize;
use util::maths::{ang_dist, wrap_to_pi};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SimParams {
    /// Time constant of the lag between commanded and actual velocity, zero for none
    #[serde(default)]
    pub response_time_s: f64,
}

#[derive(Debug, Clone)]
pub struct KinematicSim {
    params: SimParams,
    state: RobotInstant,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl KinematicSim {
    pub fn new(initial: RobotInstant, params: SimParams) -> Self {
        Self {
            params,
            state: initial,
        }
    }

    /// The current simulated state.
    pub fn state(&self) -> RobotInstant {
        self.state
    }

    /// Advance the simulation by `dt_s` under the given command.
    pub fn step(&mut self, cmd: &MotionCmd, dt_s: f64) -> RobotInstant {
        let gain = if self.params.response_time_s > 0.0 {
            (dt_s / self.params.response_time_s).min(1.0)
        } else {
            1.0
        };

        // Turning to a heading happens as fast as the lag allows
        let demand_rate_rads = match cmd.rotation {
            RotationCommand::AngularVelocity(w) => w,
            RotationCommand::Heading(h) => {
                ang_dist(self.state.heading_rad, h) / dt_s.max(self.params.response_time_s)
            }
        };

        let s = &mut self.state;
        s.velocity_ms += (cmd.velocity_ms - s.velocity_ms) * gain;
        s.angular_vel_rads += (demand_rate_rads - s.angular_vel_rads) * gain;

        s.position_m += s.velocity_ms * dt_s;
        s.heading_rad = wrap_to_pi(s.heading_rad + s.angular_vel_rads * dt_s);
        s.stamp_s += dt_s;

        *s
    }
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            response_time_s: 0.0,
        }
    }
}
