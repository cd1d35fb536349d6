//! # Communications interface crate.
//!
//! Provides the data exchanged between the motion core and its collaborators: robot state from
//! state estimation, goals and constraints from the behaviour layer, and commands sent on to the
//! radio.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Robot state and motion limits
pub mod robot;

/// Goals requested by the behaviour layer
pub mod goal;

/// Velocity and rotation commands sent to the robot
pub mod cmd;
