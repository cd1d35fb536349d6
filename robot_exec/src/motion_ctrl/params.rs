//! Motion control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use super::PidGains;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for motion control
#[derive(Deserialize, Debug, Clone)]
pub struct MotionCtrlParams {
    /// Gains of the position controllers, the same for both axes
    pub position: PidGains,

    /// Gains of the heading controller
    pub heading: PidGains,

    /// Period of the control loop, used as the controllers' time step
    pub cycle_period_s: f64,

    /// How far ahead of the current time the path's velocity is taken as feedforward, to
    /// make up for actuation delay
    pub lookahead_s: f64,

    /// Distance from the path's end within which the goal is reached
    pub position_tolerance_m: f64,

    /// Heading difference from the path's end within which the goal is reached
    pub heading_tolerance_rad: f64,

    /// Remaining path time below which the path counts as finished
    pub remaining_tolerance_s: f64,

    /// Distance from the path above which the state estimate is not trusted
    pub divergence_limit_m: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for MotionCtrlParams {
    fn default() -> Self {
        Self {
            position: PidGains {
                k_p: 3.0,
                k_i: 0.2,
                k_d: 0.0,
            },
            heading: PidGains {
                k_p: 4.0,
                k_i: 0.0,
                k_d: 0.0,
            },
            cycle_period_s: 0.01,
            lookahead_s: 0.0,
            position_tolerance_m: 0.05,
            heading_tolerance_rad: 0.05,
            remaining_tolerance_s: 1e-3,
            divergence_limit_m: 1.0,
        }
    }
}
