//! # Robot motion library.
//!
//! Single robot motion planning and tracking. Planners turn a goal and a snapshot of obstacles
//! into a timed path, and motion control turns that path into a command each cycle.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Geometry primitives - points, segments and rectangles in the field frame
pub mod geom;

/// Obstacle model - the snapshot of everything a robot must avoid
pub mod obstacle;

/// Timed paths - trajectories evaluated at a time offset
pub mod path;

/// Path planning - chooses a strategy and produces a path for a goal
pub mod planning;

/// Motion control - tracks the active path with PID feedback
pub mod motion_ctrl;

/// Plan manager - runs the planner off the control loop and swaps in new paths
pub mod plan_mgr;

/// Kinematic simulation - stands in for the robot in the executable and tests
pub mod sim;

/// Scenario parameters for the executable
pub mod scenario;
