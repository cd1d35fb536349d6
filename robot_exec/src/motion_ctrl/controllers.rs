//! # Feedback controllers
//!
//! A scalar PID controller with output clamping and anti-windup, used per axis by motion control.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use util::maths::clamp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gains for a single PID controller.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct PidGains {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    pub k_i: f64,

    /// Derivative gain
    pub k_d: f64,
}

/// A PID controller
///
/// The controller runs at a fixed period, given on construction, rather than measuring the time
/// between calls. This keeps its behaviour reproducible when driven by a simulation.
#[derive(Debug, Serialize, Clone)]
pub struct PidController {
    gains: PidGains,

    /// Lower output limit
    out_min: f64,

    /// Upper output limit
    out_max: f64,

    /// Time between calls to `run`
    dt_s: f64,

    /// Previous error, None after a reset
    prev_error: Option<f64>,

    /// The integral accumulation
    integral: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidController {
    /// Create a new controller with the given gains and output limits.
    pub fn new(gains: PidGains, out_min: f64, out_max: f64, dt_s: f64) -> Self {
        Self {
            gains,
            out_min,
            out_max,
            dt_s,
            prev_error: None,
            integral: 0.0,
        }
    }

    /// A controller whose output is limited to `[-limit, limit]`.
    pub fn symmetric(gains: PidGains, limit: f64, dt_s: f64) -> Self {
        Self::new(gains, -limit.abs(), limit.abs(), dt_s)
    }

    /// Get the output of the controller for the given setpoint and measurement.
    pub fn run(&mut self, setpoint: f64, measurement: f64) -> f64 {
        self.run_error(setpoint - measurement)
    }

    /// Get the output of the controller for an already computed error, for quantities such as
    /// angles where the error isn't a plain difference.
    pub fn run_error(&mut self, error: f64) -> f64 {
        // No derivative on the first call after a reset, otherwise the jump from nothing to the
        // current error produces a spike
        let deriv = match self.prev_error {
            Some(e) => (error - e) / self.dt_s,
            None => 0.0,
        };

        let integral = self.integral + error * self.dt_s;

        let raw = self.gains.k_p * error + self.gains.k_i * integral + self.gains.k_d * deriv;
        let out = clamp(raw, self.out_min, self.out_max);

        // Only accumulate while unsaturated, or while the error is pulling the output back
        // out of saturation
        let saturated_high = raw > self.out_max && error > 0.0;
        let saturated_low = raw < self.out_min && error < 0.0;
        if !saturated_high && !saturated_low {
            self.integral = integral;
        }

        self.prev_error = Some(error);

        out
    }

    /// Clear the accumulated integral and derivative history, keeping the gains.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = None;
    }

    /// The current integral accumulation.
    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn gains(&self) -> &PidGains {
        &self.gains
    }
}
