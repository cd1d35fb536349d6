//! # Robot state and limits

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The state of a robot at one instant in time.
///
/// Produced by state estimation once per cycle and never mutated afterwards, and also produced by
/// evaluating a path at a time offset.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RobotInstant {
    /// Position in the field frame
    pub position_m: Vector2<f64>,

    /// Heading, the angle to the field +ve X axis, anticlockwise positive
    pub heading_rad: f64,

    /// Linear velocity in the field frame
    pub velocity_ms: Vector2<f64>,

    /// Angular velocity, anticlockwise positive
    pub angular_vel_rads: f64,

    /// Time at which this instant applies
    pub stamp_s: f64,
}

/// Limits on the linear motion of a robot.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionConstraints {
    /// Maximum linear speed
    pub max_speed_ms: f64,

    /// Maximum linear acceleration
    pub max_accel_mss: f64,
}

/// Limits on the rotation of a robot.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationConstraints {
    /// Maximum angular speed
    pub max_speed_rads: f64,

    /// Maximum angular acceleration
    pub max_accel_radss: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A malformed set of constraints.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConstraintError {
    #[error("Maximum speed must be positive and finite, got {0}")]
    InvalidMaxSpeed(f64),

    #[error("Maximum acceleration must be positive and finite, got {0}")]
    InvalidMaxAccel(f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RobotInstant {
    /// A stationary instant at the given position and heading.
    pub fn stationary(position_m: Vector2<f64>, heading_rad: f64, stamp_s: f64) -> Self {
        Self {
            position_m,
            heading_rad,
            velocity_ms: Vector2::zeros(),
            angular_vel_rads: 0.0,
            stamp_s,
        }
    }

    /// Unit vector pointing along the robot's heading.
    pub fn forward(&self) -> Vector2<f64> {
        Vector2::new(self.heading_rad.cos(), self.heading_rad.sin())
    }

    /// Linear speed of the robot.
    pub fn speed_ms(&self) -> f64 {
        self.velocity_ms.norm()
    }
}

impl MotionConstraints {
    pub fn new(max_speed_ms: f64, max_accel_mss: f64) -> Self {
        Self {
            max_speed_ms,
            max_accel_mss,
        }
    }

    /// Check that both limits are positive and finite.
    pub fn validate(&self) -> Result<(), ConstraintError> {
        if !is_positive_finite(self.max_speed_ms) {
            return Err(ConstraintError::InvalidMaxSpeed(self.max_speed_ms));
        }
        if !is_positive_finite(self.max_accel_mss) {
            return Err(ConstraintError::InvalidMaxAccel(self.max_accel_mss));
        }
        Ok(())
    }
}

impl RotationConstraints {
    pub fn new(max_speed_rads: f64, max_accel_radss: f64) -> Self {
        Self {
            max_speed_rads,
            max_accel_radss,
        }
    }

    /// Check that both limits are positive and finite.
    pub fn validate(&self) -> Result<(), ConstraintError> {
        if !is_positive_finite(self.max_speed_rads) {
            return Err(ConstraintError::InvalidMaxSpeed(self.max_speed_rads));
        }
        if !is_positive_finite(self.max_accel_radss) {
            return Err(ConstraintError::InvalidMaxAccel(self.max_accel_radss));
        }
        Ok(())
    }
}

impl Default for MotionConstraints {
    fn default() -> Self {
        Self::new(2.0, 1.0)
    }
}

impl Default for RotationConstraints {
    fn default() -> Self {
        Self::new(4.0, 8.0)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn is_positive_finite(value: f64) -> bool {
    value.is_finite() && value > 0.0
}
