//! # Robot commands

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The command sent to a robot each control cycle.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionCmd {
    /// Demanded linear velocity in the field frame
    pub velocity_ms: Vector2<f64>,

    /// Demanded rotation
    pub rotation: RotationCommand,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A rotation demand.
///
/// Either a heading to turn to or a rate to turn at, never both.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum RotationCommand {
    /// Turn to and hold the given heading.
    Heading(f64),

    /// Turn at the given rate, anticlockwise positive.
    AngularVelocity(f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MotionCmd {
    /// Stop all motion.
    pub fn stop() -> Self {
        Self {
            velocity_ms: Vector2::zeros(),
            rotation: RotationCommand::AngularVelocity(0.0),
        }
    }

    /// Stop translating and hold the given heading.
    pub fn hold(heading_rad: f64) -> Self {
        Self {
            velocity_ms: Vector2::zeros(),
            rotation: RotationCommand::Heading(heading_rad),
        }
    }
}
