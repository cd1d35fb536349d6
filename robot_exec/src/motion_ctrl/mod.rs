//! # Motion control module
//!
//! Motion control keeps the robot on the active path. Every cycle it evaluates the path at the
//! time elapsed since the path started, takes the path's velocity as a feedforward term and adds
//! the output of a PID controller on the position error of each axis. A separate PID controller
//! on the heading error, always taken the short way round, produces the rotation command.
//!
//! The controllers' integral and derivative history describes the error against one particular
//! path, so it is cleared whenever the path is replaced.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod controllers;
pub mod params;
pub mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use controllers::*;
pub use params::MotionCtrlParams;
pub use state::*;
