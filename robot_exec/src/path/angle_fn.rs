//! # Angle function path
//!
//! Wraps another path and replaces its heading with a function of time and the wrapped path's
//! instant. Used to decouple where the robot faces from where it drives.
//!
//! Headings built from a [`Facing`] start from the wrapped path's own starting heading and turn
//! in towards the requested one no faster than the rotation limit allows, so joining a path onto
//! the end of another never makes the heading jump.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{fmt, sync::Arc};

use comms_if::{goal::Facing, robot::RobotInstant};
use nalgebra::Vector2;
use util::maths::{ang_dist, wrap_to_pi};

use super::{Path, PathRef};
use crate::{geom::heading_of, obstacle::ObstacleSet};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Time step used to differentiate the heading function.
const DIFF_STEP_S: f64 = 1e-3;

/// Step back from the end of a path when looking for the arrival direction.
const ARRIVAL_STEP_S: f64 = 0.01;

/// How far ahead along the path the travel direction is taken from.
const TRAVEL_CHORD_S: f64 = 0.1;

/// Chords shorter than this don't define a direction.
const MIN_CHORD_M: f64 = 1e-6;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Heading as a function of path time and the wrapped path's instant at that time.
pub type AngleFn = Arc<dyn Fn(f64, &RobotInstant) -> f64 + Send + Sync>;

/// A path whose heading is given by a function rather than by the wrapped path.
#[derive(Clone)]
pub struct AngleFunctionPath {
    inner: PathRef,
    angle_fn: AngleFn,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl AngleFunctionPath {
    pub fn new(inner: PathRef, angle_fn: AngleFn) -> Self {
        Self { inner, angle_fn }
    }

    /// Build the heading function matching a [`Facing`] request.
    ///
    /// The travel direction is the chord to where the path will be a short time later, which
    /// turns smoothly through the stops at corners. Once there is nowhere left to go it is the
    /// direction the path arrived from.
    ///
    /// The heading starts at `inner`'s start heading and turns towards the requested one at up to
    /// `turn_rate_rads`. A non-positive rate disables the turn in.
    pub fn facing(inner: PathRef, facing: Facing, turn_rate_rads: f64) -> Self {
        let target_fn: AngleFn = match facing {
            Facing::Heading(heading_rad) => {
                let heading_rad = wrap_to_pi(heading_rad);
                Arc::new(move |_, _| heading_rad)
            }
            Facing::Point(target_m) => Arc::new(move |_, inst: &RobotInstant| {
                face_point(&inst.position_m, &target_m, inst.heading_rad)
            }),
            Facing::Travel => {
                let arrival_rad = arrival_heading(inner.as_ref());
                let path = inner.clone();
                Arc::new(move |t_s, inst: &RobotInstant| {
                    let ahead_m = path.evaluate(t_s + TRAVEL_CHORD_S).position_m;
                    face_point(&inst.position_m, &ahead_m, arrival_rad)
                })
            }
        };

        if !(turn_rate_rads > 0.0) {
            return Self::new(inner, target_fn);
        }

        let start_rad = inner.start().heading_rad;
        let angle_fn: AngleFn = Arc::new(move |t_s, inst: &RobotInstant| {
            turn_towards(start_rad, target_fn(t_s, inst), turn_rate_rads * t_s.max(0.0))
        });

        Self::new(inner, angle_fn)
    }

    /// The wrapped path.
    pub fn inner(&self) -> &PathRef {
        &self.inner
    }

    fn heading_at(&self, t_s: f64) -> f64 {
        let inst = self.inner.evaluate(t_s);
        (self.angle_fn)(t_s, &inst)
    }
}

impl Path for AngleFunctionPath {
    fn duration(&self) -> f64 {
        self.inner.duration()
    }

    fn evaluate(&self, t_s: f64) -> RobotInstant {
        let t_s = super::clamp_time(t_s, self.duration());
        let mut inst = self.inner.evaluate(t_s);

        inst.heading_rad = (self.angle_fn)(t_s, &inst);

        // Central difference where possible, one sided at the ends
        let t_lo = (t_s - DIFF_STEP_S).max(0.0);
        let t_hi = (t_s + DIFF_STEP_S).min(self.duration());
        inst.angular_vel_rads = if t_hi > t_lo {
            ang_dist(self.heading_at(t_lo), self.heading_at(t_hi)) / (t_hi - t_lo)
        } else {
            0.0
        };

        inst
    }

    fn hit(&self, obstacles: &ObstacleSet, inflation_m: f64, from_s: f64) -> Option<f64> {
        // Heading doesn't change the footprint of a round robot
        self.inner.hit(obstacles, inflation_m, from_s)
    }
}

impl fmt::Debug for AngleFunctionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AngleFunctionPath")
            .field("inner", &self.inner)
            .finish()
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Direction of the last movement along `path`, or its final heading if it never moves.
fn arrival_heading(path: &dyn Path) -> f64 {
    let end = path.end();
    let mut t_s = path.duration();

    while t_s > 0.0 {
        t_s = (t_s - ARRIVAL_STEP_S).max(0.0);
        let delta = end.position_m - path.evaluate(t_s).position_m;
        if delta.norm() > 1e-6 {
            return heading_of(&delta);
        }
    }

    end.heading_rad
}

/// Heading from `from` towards `to`, or `fallback` if the points coincide.
fn face_point(from: &Vector2<f64>, to: &Vector2<f64>, fallback: f64) -> f64 {
    let delta = to - from;
    if delta.norm() > MIN_CHORD_M {
        heading_of(&delta)
    } else {
        fallback
    }
}

/// `target_rad` if it is within `max_turn_rad` of `from_rad`, otherwise as far round towards it
/// as that allows.
fn turn_towards(from_rad: f64, target_rad: f64, max_turn_rad: f64) -> f64 {
    let diff_rad = ang_dist(from_rad, target_rad);
    if diff_rad.abs() <= max_turn_rad {
        target_rad
    } else {
        wrap_to_pi(from_rad + max_turn_rad * diff_rad.signum())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::path::{InterpolatedPath, Interpolation, TrapezoidalPath};
    use comms_if::robot::MotionConstraints;
    use std::f64::consts::FRAC_PI_2;

    fn straight_line() -> PathRef {
        Arc::new(
            InterpolatedPath::new(
                vec![
                    (0.0, RobotInstant::stationary(Vector2::new(0.0, 0.0), 1.0, 0.0)),
                    (2.0, RobotInstant::stationary(Vector2::new(0.0, 2.0), 1.0, 0.0)),
                ],
                Interpolation::Linear,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_constant_heading() {
        let path = AngleFunctionPath::facing(straight_line(), Facing::Heading(0.5), 4.0);

        assert_eq!(path.evaluate(1.0).heading_rad, 0.5);
        assert!(path.evaluate(1.0).angular_vel_rads.abs() < 1e-9);
        // Position is untouched
        assert_eq!(path.evaluate(1.0).position_m, Vector2::new(0.0, 1.0));
    }

    #[test]
    fn test_turns_in_from_start_heading() {
        let path = AngleFunctionPath::facing(straight_line(), Facing::Heading(-1.0), 4.0);

        assert_eq!(path.start().heading_rad, 1.0);
        assert!((path.evaluate(0.25).heading_rad - 0.0).abs() < 1e-9);
        assert!((path.evaluate(0.25).angular_vel_rads + 4.0).abs() < 1e-6);
        assert_eq!(path.evaluate(0.5).heading_rad, -1.0);

        // Without a rate the requested heading applies straight away
        let path = AngleFunctionPath::facing(straight_line(), Facing::Heading(-1.0), 0.0);
        assert_eq!(path.start().heading_rad, -1.0);
    }

    #[test]
    fn test_travel_heading() {
        let path = AngleFunctionPath::facing(straight_line(), Facing::Travel, 4.0);

        assert_eq!(path.start().heading_rad, 1.0);
        assert!((path.evaluate(1.0).heading_rad - FRAC_PI_2).abs() < 1e-9);

        // Stopped at the end it keeps facing the way it arrived, not the wrapped heading
        let stopping = Arc::new(
            InterpolatedPath::new(
                vec![
                    (0.0, RobotInstant::stationary(Vector2::new(0.0, 0.0), 1.0, 0.0)),
                    (2.0, RobotInstant::stationary(Vector2::new(0.0, 2.0), 1.0, 0.0)),
                ],
                Interpolation::CubicHermite,
            )
            .unwrap(),
        );
        let path = AngleFunctionPath::facing(stopping, Facing::Travel, 4.0);
        assert!((path.end().heading_rad - FRAC_PI_2).abs() < 1e-9);
        assert!((path.start().heading_rad - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_travel_heading_turns_through_corner() {
        // Stops at the corner of an L before setting off again
        let path: PathRef = Arc::new(
            TrapezoidalPath::new(
                vec![
                    Vector2::new(0.0, 0.0),
                    Vector2::new(1.0, 0.0),
                    Vector2::new(1.0, 1.0),
                ],
                0.0,
                0.0,
                0.0,
                0.0,
                &MotionConstraints::new(2.0, 1.0),
            )
            .unwrap(),
        );
        let path = AngleFunctionPath::facing(path, Facing::Travel, 4.0);

        let dt = 1e-3;
        let mut t = 0.0;
        let mut prev = path.evaluate(0.0).heading_rad;
        while t < path.duration() {
            t += dt;
            let heading = path.evaluate(t).heading_rad;
            assert!(ang_dist(prev, heading).abs() < 0.1, "heading jumps at {}", t);
            prev = heading;
        }
        assert!((path.end().heading_rad - FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn test_face_point_rate() {
        let path = AngleFunctionPath::facing(
            straight_line(),
            Facing::Point(Vector2::new(1.0, 1.0)),
            4.0,
        );

        // Driving past the point the heading sweeps round to -pi/4
        assert!((path.evaluate(0.5).heading_rad - 0.5f64.atan2(1.0)).abs() < 1e-9);
        assert!((path.evaluate(2.0).heading_rad + FRAC_PI_2 / 2.0).abs() < 1e-9);
        assert!(path.evaluate(1.0).angular_vel_rads < 0.0);
    }
}
