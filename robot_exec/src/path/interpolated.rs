//! # Interpolated path
//!
//! A path through a sequence of timed instants. Position is interpolated either linearly or with
//! a cubic Hermite spline using the velocities stored in each instant, heading always takes the
//! shortest way round between two instants.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::robot::RobotInstant;
use serde::{Deserialize, Serialize};
use util::maths::ang_dist;

use super::{clamp_time, Path, PathError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A path through timed waypoints.
#[derive(Debug, Clone, Serialize)]
pub struct InterpolatedPath {
    /// Waypoints as (time since path start, instant) pairs
    waypoints: Vec<(f64, RobotInstant)>,

    scheme: Interpolation,

    start_stamp_s: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// How positions are computed between waypoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Interpolation {
    /// Straight lines between waypoints, velocity is constant over each interval
    Linear,

    /// Cubic Hermite spline matching the position and velocity of each waypoint
    CubicHermite,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl InterpolatedPath {
    /// Create a new path from the given waypoints.
    ///
    /// The first waypoint must be at time zero and times must be strictly increasing. The
    /// stamps of evaluated instants are the first waypoint's stamp plus the path time.
    pub fn new(
        waypoints: Vec<(f64, RobotInstant)>,
        scheme: Interpolation,
    ) -> Result<Self, PathError> {
        let first = match waypoints.first() {
            Some(w) => w,
            None => return Err(PathError::EmptySequence),
        };

        if first.0 != 0.0 {
            return Err(PathError::InvalidWaypointTimes(0));
        }

        for (i, pair) in waypoints.windows(2).enumerate() {
            if !(pair[1].0 > pair[0].0) {
                return Err(PathError::InvalidWaypointTimes(i + 1));
            }
        }

        if waypoints.iter().any(|(t, w)| {
            !t.is_finite()
                || !w.position_m.iter().all(|v| v.is_finite())
                || !w.velocity_ms.iter().all(|v| v.is_finite())
                || !w.heading_rad.is_finite()
        }) {
            return Err(PathError::NonFinite);
        }

        let start_stamp_s = first.1.stamp_s;

        Ok(Self {
            waypoints,
            scheme,
            start_stamp_s,
        })
    }

    /// A path which holds a single instant forever.
    pub fn hold(instant: RobotInstant) -> Self {
        Self {
            waypoints: vec![(0.0, instant)],
            scheme: Interpolation::Linear,
            start_stamp_s: instant.stamp_s,
        }
    }

    /// The waypoints of the path.
    pub fn waypoints(&self) -> &[(f64, RobotInstant)] {
        &self.waypoints
    }
}

impl Path for InterpolatedPath {
    fn duration(&self) -> f64 {
        self.waypoints.last().map(|w| w.0).unwrap_or(0.0)
    }

    fn evaluate(&self, t_s: f64) -> RobotInstant {
        let t_s = clamp_time(t_s, self.duration());

        // Index of the interval containing t
        let idx = self
            .waypoints
            .partition_point(|w| w.0 <= t_s)
            .saturating_sub(1);

        let (t0, a) = self.waypoints[idx];
        let (t1, b) = match self.waypoints.get(idx + 1) {
            Some(w) => *w,
            None => {
                let mut end = a;
                end.stamp_s = self.start_stamp_s + t_s;
                return end;
            }
        };

        let dt = t1 - t0;
        let s = (t_s - t0) / dt;

        let (position_m, velocity_ms) = match self.scheme {
            Interpolation::Linear => {
                let vel = (b.position_m - a.position_m) / dt;
                (a.position_m + (b.position_m - a.position_m) * s, vel)
            }
            Interpolation::CubicHermite => {
                let s2 = s * s;
                let s3 = s2 * s;

                let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
                let h10 = s3 - 2.0 * s2 + s;
                let h01 = -2.0 * s3 + 3.0 * s2;
                let h11 = s3 - s2;

                let pos = a.position_m * h00
                    + a.velocity_ms * (h10 * dt)
                    + b.position_m * h01
                    + b.velocity_ms * (h11 * dt);

                // Derivatives of the basis functions with respect to s, divided through by dt
                let d00 = 6.0 * s2 - 6.0 * s;
                let d10 = 3.0 * s2 - 4.0 * s + 1.0;
                let d01 = -6.0 * s2 + 6.0 * s;
                let d11 = 3.0 * s2 - 2.0 * s;

                let vel = a.position_m * (d00 / dt)
                    + a.velocity_ms * d10
                    + b.position_m * (d01 / dt)
                    + b.velocity_ms * d11;

                (pos, vel)
            }
        };

        let dheading = ang_dist(a.heading_rad, b.heading_rad);

        RobotInstant {
            position_m,
            heading_rad: a.heading_rad + dheading * s,
            velocity_ms,
            angular_vel_rads: dheading / dt,
            stamp_s: self.start_stamp_s + t_s,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Vector2;

    fn instant(x: f64, y: f64, heading: f64) -> RobotInstant {
        RobotInstant::stationary(Vector2::new(x, y), heading, 5.0)
    }

    #[test]
    fn test_bad_times_rejected() {
        assert_eq!(
            InterpolatedPath::new(vec![], Interpolation::Linear).unwrap_err(),
            PathError::EmptySequence
        );
        assert_eq!(
            InterpolatedPath::new(vec![(0.5, instant(0.0, 0.0, 0.0))], Interpolation::Linear)
                .unwrap_err(),
            PathError::InvalidWaypointTimes(0)
        );
        assert_eq!(
            InterpolatedPath::new(
                vec![
                    (0.0, instant(0.0, 0.0, 0.0)),
                    (1.0, instant(1.0, 0.0, 0.0)),
                    (1.0, instant(2.0, 0.0, 0.0))
                ],
                Interpolation::Linear
            )
            .unwrap_err(),
            PathError::InvalidWaypointTimes(2)
        );
    }

    #[test]
    fn test_linear_evaluate() {
        let path = InterpolatedPath::new(
            vec![(0.0, instant(0.0, 0.0, 0.0)), (2.0, instant(2.0, 4.0, 1.0))],
            Interpolation::Linear,
        )
        .unwrap();

        let mid = path.evaluate(1.0);
        assert!((mid.position_m - Vector2::new(1.0, 2.0)).norm() < 1e-12);
        assert!((mid.velocity_ms - Vector2::new(1.0, 2.0)).norm() < 1e-12);
        assert!((mid.heading_rad - 0.5).abs() < 1e-12);
        assert_eq!(mid.stamp_s, 6.0);

        // Clamped outside the path
        assert_eq!(path.evaluate(-1.0).position_m, Vector2::new(0.0, 0.0));
        assert_eq!(path.evaluate(10.0).position_m, Vector2::new(2.0, 4.0));
        assert_eq!(path.end().stamp_s, 7.0);
    }

    #[test]
    fn test_heading_takes_shortest_way() {
        let path = InterpolatedPath::new(
            vec![
                (0.0, instant(0.0, 0.0, 3.0)),
                (1.0, instant(0.0, 0.0, -3.0)),
            ],
            Interpolation::Linear,
        )
        .unwrap();

        // Going from 3 to -3 the short way crosses pi, so the rate is positive
        assert!(path.evaluate(0.5).angular_vel_rads > 0.0);
        assert!(path.evaluate(0.5).heading_rad > 3.0);
    }

    #[test]
    fn test_hermite_matches_endpoints() {
        let mut a = instant(0.0, 0.0, 0.0);
        a.velocity_ms = Vector2::new(1.0, 0.0);
        let mut b = instant(1.0, 1.0, 0.0);
        b.velocity_ms = Vector2::new(0.0, 1.0);

        let path =
            InterpolatedPath::new(vec![(0.0, a), (1.0, b)], Interpolation::CubicHermite).unwrap();

        assert!((path.evaluate(0.0).velocity_ms - a.velocity_ms).norm() < 1e-12);
        assert!((path.evaluate(1.0).position_m - b.position_m).norm() < 1e-12);

        // Just before the end the interval is still being interpolated
        let near_end = path.evaluate(1.0 - 1e-9);
        assert!((near_end.velocity_ms - b.velocity_ms).norm() < 1e-6);
    }

    #[test]
    fn test_hold() {
        let path = InterpolatedPath::hold(instant(1.0, 1.0, 0.2));

        assert_eq!(path.duration(), 0.0);
        assert_eq!(path.evaluate(3.0).position_m, Vector2::new(1.0, 1.0));
    }
}
