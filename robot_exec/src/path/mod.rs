//! # Paths
//!
//! A path is a continuous-time trajectory: a function from the time elapsed since the path began
//! to the [`RobotInstant`] the robot should be in, plus a total duration. Evaluation is clamped,
//! so times before zero give the start instant and times after the duration give the end
//! instant, never an extrapolation.
//!
//! Concrete paths:
//! - [`InterpolatedPath`] - timed waypoints, interpolated between.
//! - [`TrapezoidalPath`] - a polyline timed with a trapezoidal velocity profile.
//! - [`AngleFunctionPath`] - wraps another path, replacing its heading with a function of time.
//! - [`CompositePath`] - a sequence of sub-paths followed one after the other.
//!
//! Paths are immutable once built and shared as [`PathRef`]s, so a path can be handed from a
//! planning thread to the control loop without copying and without being observed half built.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod angle_fn;
mod composite;
mod interpolated;
mod trapezoid;

pub use angle_fn::{AngleFn, AngleFunctionPath};
pub use composite::CompositePath;
pub use interpolated::{Interpolation, InterpolatedPath};
pub use trapezoid::{TrapezoidProfile, TrapezoidalPath};

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{fmt::Debug, sync::Arc};

use comms_if::robot::{ConstraintError, RobotInstant};

use crate::obstacle::ObstacleSet;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Time step used when sampling a path for collision checking.
pub const HIT_CHECK_STEP_S: f64 = 0.02;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A shared, immutable path.
pub type PathRef = Arc<dyn Path>;

/// A continuous-time trajectory.
pub trait Path: Send + Sync + Debug {
    /// Total duration of the path in seconds, never negative.
    fn duration(&self) -> f64;

    /// The instant at `t_s` seconds after the start of the path, clamped to `[0, duration]`.
    fn evaluate(&self, t_s: f64) -> RobotInstant;

    /// The first instant of the path.
    fn start(&self) -> RobotInstant {
        self.evaluate(0.0)
    }

    /// The final instant of the path.
    fn end(&self) -> RobotInstant {
        self.evaluate(self.duration())
    }

    /// Time left on the path after `elapsed_s` seconds.
    fn remaining(&self, elapsed_s: f64) -> f64 {
        (self.duration() - elapsed_s).max(0.0)
    }

    /// Find the first time at or after `from_s` at which the path collides with the obstacles.
    ///
    /// The default implementation samples the path every [`HIT_CHECK_STEP_S`] and checks the
    /// segments joining consecutive samples.
    fn hit(&self, obstacles: &ObstacleSet, inflation_m: f64, from_s: f64) -> Option<f64> {
        let duration = self.duration();
        let mut t_s = from_s.max(0.0).min(duration);
        let mut prev = self.evaluate(t_s).position_m;

        if obstacles.contains(&prev, inflation_m) {
            return Some(t_s);
        }

        while t_s < duration {
            let next_t_s = (t_s + HIT_CHECK_STEP_S).min(duration);
            let next = self.evaluate(next_t_s).position_m;

            if obstacles.segment_hits(&prev, &next, inflation_m) {
                return Some(t_s);
            }

            prev = next;
            t_s = next_t_s;
        }

        None
    }
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PathError {
    #[error("Attempted to create a path from an empty sequence")]
    EmptySequence,

    #[error("Waypoint times must start at zero and be strictly increasing (bad time at index {0})")]
    InvalidWaypointTimes(usize),

    #[error("Path constraints are invalid: {0}")]
    InvalidConstraints(ConstraintError),

    #[error("A path position or speed was not finite")]
    NonFinite,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Clamp a query time into `[0, duration]`, treating NaN as the start.
pub(crate) fn clamp_time(t_s: f64, duration_s: f64) -> f64 {
    if t_s.is_nan() || t_s <= 0.0 {
        0.0
    } else if t_s >= duration_s {
        duration_s
    } else {
        t_s
    }
}
