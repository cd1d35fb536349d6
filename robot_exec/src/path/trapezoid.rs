//! # Trapezoidal velocity profiles
//!
//! [`TrapezoidProfile`] is the one dimensional timing law: accelerate at the maximum rate,
//! cruise at the maximum speed if there is room to, then decelerate to the end speed.
//! [`TrapezoidalPath`] applies one profile to each segment of a polyline. The direction of travel
//! only changes between segments, and it does so with the robot at rest, so neither the speed
//! nor the acceleration limit is ever exceeded.
//!
//! A path starting at speed may not have room to stop before its first corner (or its end). The
//! robot then brakes along its line of travel, past the corner, and comes back to it.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::robot::{MotionConstraints, RobotInstant};
use nalgebra::Vector2;
use serde::Serialize;

use super::{clamp_time, Path, PathError};
use crate::obstacle::ObstacleSet;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Points closer together than this are merged when building a path.
const MIN_SEGMENT_LENGTH_M: f64 = 1e-6;

/// Sine of the largest turn between segments still treated as a straight line.
const COLLINEAR_TOLERANCE: f64 = 1e-6;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A trapezoidal (or triangular) speed profile over a fixed distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrapezoidProfile {
    pub distance: f64,
    pub start_speed: f64,
    pub end_speed: f64,

    /// Highest speed reached, equal to the maximum speed if the profile has a cruise phase
    pub peak_speed: f64,

    pub accel: f64,
    pub accel_time_s: f64,
    pub cruise_time_s: f64,
    pub decel_time_s: f64,
}

/// A polyline timed with trapezoidal profiles, coming to rest at every corner.
#[derive(Debug, Clone, Serialize)]
pub struct TrapezoidalPath {
    points_m: Vec<Vector2<f64>>,
    segments: Vec<Segment>,
    heading_rad: f64,
    start_stamp_s: f64,
    duration_s: f64,
}

#[derive(Debug, Clone, Serialize)]
struct Segment {
    start_time_s: f64,
    start_m: Vector2<f64>,
    direction: Vector2<f64>,
    profile: TrapezoidProfile,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TrapezoidProfile {
    /// Build the fastest profile covering `distance` between the two speeds.
    ///
    /// If the requested end speed cannot be reached (or cannot be slowed down to) within the
    /// distance at the maximum acceleration, the end speed is adjusted to the nearest reachable
    /// one, since the acceleration limit takes priority.
    ///
    /// Limits must have been validated by the caller.
    pub fn new(
        distance: f64,
        start_speed: f64,
        end_speed: f64,
        max_speed: f64,
        max_accel: f64,
    ) -> Self {
        let distance = distance.max(0.0);
        let start_speed = start_speed.max(0.0).min(max_speed);
        let mut end_speed = end_speed.max(0.0).min(max_speed);

        let reach_sq = 2.0 * max_accel * distance;
        if end_speed.powi(2) > start_speed.powi(2) + reach_sq {
            end_speed = (start_speed.powi(2) + reach_sq).sqrt();
        } else if start_speed.powi(2) > end_speed.powi(2) + reach_sq {
            end_speed = (start_speed.powi(2) - reach_sq).sqrt();
        }

        // Peak of the triangular profile, limited to the maximum speed
        let peak_speed = ((reach_sq + start_speed.powi(2) + end_speed.powi(2)) / 2.0)
            .sqrt()
            .min(max_speed)
            .max(start_speed)
            .max(end_speed);

        let accel_time_s = (peak_speed - start_speed) / max_accel;
        let decel_time_s = (peak_speed - end_speed) / max_accel;

        let accel_dist = (peak_speed.powi(2) - start_speed.powi(2)) / (2.0 * max_accel);
        let decel_dist = (peak_speed.powi(2) - end_speed.powi(2)) / (2.0 * max_accel);
        let cruise_dist = (distance - accel_dist - decel_dist).max(0.0);
        let cruise_time_s = if peak_speed > 0.0 {
            cruise_dist / peak_speed
        } else {
            0.0
        };

        Self {
            distance,
            start_speed,
            end_speed,
            peak_speed,
            accel: max_accel,
            accel_time_s,
            cruise_time_s,
            decel_time_s,
        }
    }

    /// Distance needed to slow from `speed` to `end_speed` at `max_accel`, zero if `end_speed`
    /// is the faster of the two.
    pub fn stopping_distance(speed: f64, end_speed: f64, max_accel: f64) -> f64 {
        ((speed.powi(2) - end_speed.powi(2)) / (2.0 * max_accel)).max(0.0)
    }

    /// Total time taken by the profile.
    pub fn duration(&self) -> f64 {
        self.accel_time_s + self.cruise_time_s + self.decel_time_s
    }

    /// Distance travelled and speed at time `t_s` into the profile.
    pub fn state_at(&self, t_s: f64) -> (f64, f64) {
        if t_s <= 0.0 {
            return (0.0, self.start_speed);
        }

        let accel_dist = self.start_speed * self.accel_time_s
            + 0.5 * self.accel * self.accel_time_s.powi(2);
        let cruise_end_s = self.accel_time_s + self.cruise_time_s;

        let (dist, speed) = if t_s < self.accel_time_s {
            (
                self.start_speed * t_s + 0.5 * self.accel * t_s.powi(2),
                self.start_speed + self.accel * t_s,
            )
        } else if t_s < cruise_end_s {
            (
                accel_dist + self.peak_speed * (t_s - self.accel_time_s),
                self.peak_speed,
            )
        } else if t_s < self.duration() {
            let tau_s = t_s - cruise_end_s;
            (
                accel_dist
                    + self.peak_speed * self.cruise_time_s
                    + self.peak_speed * tau_s
                    - 0.5 * self.accel * tau_s.powi(2),
                self.peak_speed - self.accel * tau_s,
            )
        } else {
            return (self.distance, self.end_speed);
        };

        (dist.min(self.distance), speed.max(0.0))
    }
}

impl TrapezoidalPath {
    /// Build a path through `points_m`, starting at `start_speed` along the first segment and
    /// finishing at `end_speed`.
    ///
    /// If `start_speed` is too high to slow down before the first corner, a braking leg past the
    /// corner is added. The path always finishes at rest when `end_speed` is zero. A non-zero
    /// `end_speed` which cannot be reached within the final segment is lowered to the fastest
    /// reachable speed.
    ///
    /// Returns [`PathError::InvalidConstraints`] for non-positive or non-finite limits rather
    /// than clamping them, as they can only come from misconfiguration.
    pub fn new(
        points_m: Vec<Vector2<f64>>,
        start_speed_ms: f64,
        end_speed_ms: f64,
        heading_rad: f64,
        start_stamp_s: f64,
        constraints: &MotionConstraints,
    ) -> Result<Self, PathError> {
        constraints
            .validate()
            .map_err(PathError::InvalidConstraints)?;

        if points_m.is_empty() {
            return Err(PathError::EmptySequence);
        }
        if points_m.iter().any(|p| !p.x.is_finite() || !p.y.is_finite())
            || !start_speed_ms.is_finite()
            || !end_speed_ms.is_finite()
        {
            return Err(PathError::NonFinite);
        }

        let max_speed_ms = constraints.max_speed_ms;
        let max_accel_mss = constraints.max_accel_mss;
        let start_speed_ms = start_speed_ms.max(0.0).min(max_speed_ms);
        let end_speed_ms = end_speed_ms.max(0.0).min(max_speed_ms);

        let mut points_m = simplify_polyline(points_m);

        // Too fast to make the first corner, so overshoot it in a straight line and come back
        if points_m.len() >= 2 && start_speed_ms > 0.0 {
            let delta = points_m[1] - points_m[0];
            let first_len_m = delta.norm();
            let first_end_ms = if points_m.len() == 2 {
                end_speed_ms
            } else {
                0.0
            };

            if TrapezoidProfile::stopping_distance(start_speed_ms, first_end_ms, max_accel_mss)
                > first_len_m
            {
                let brake_m =
                    TrapezoidProfile::stopping_distance(start_speed_ms, 0.0, max_accel_mss)
                        .max(first_len_m + 2.0 * MIN_SEGMENT_LENGTH_M);
                let overshoot_m = points_m[0] + delta * (brake_m / first_len_m);
                points_m.insert(1, overshoot_m);
            }
        }

        let num_segments = points_m.len() - 1;

        let mut segments = Vec::with_capacity(num_segments);
        let mut time_s = 0.0;

        for (i, pair) in points_m.windows(2).enumerate() {
            let delta = pair[1] - pair[0];
            let length_m = delta.norm();

            // Only the first segment starts moving and only the last can end moving, every
            // corner is taken from rest
            let v_start = if i == 0 { start_speed_ms } else { 0.0 };
            let v_end = if i + 1 == num_segments {
                end_speed_ms
            } else {
                0.0
            };

            let profile = TrapezoidProfile::new(length_m, v_start, v_end, max_speed_ms, max_accel_mss);

            segments.push(Segment {
                start_time_s: time_s,
                start_m: pair[0],
                direction: delta / length_m,
                profile,
            });

            time_s += profile.duration();
        }

        Ok(Self {
            points_m,
            segments,
            heading_rad,
            start_stamp_s,
            duration_s: time_s,
        })
    }

    /// Build a path from the robot's current instant through the given route.
    ///
    /// The first point of `route_m` is replaced by the robot's position, and the robot's
    /// velocity along the first segment is carried in as the start speed.
    pub fn from_instant(
        start: &RobotInstant,
        mut route_m: Vec<Vector2<f64>>,
        end_speed_ms: f64,
        constraints: &MotionConstraints,
    ) -> Result<Self, PathError> {
        if route_m.is_empty() {
            route_m.push(start.position_m);
        } else {
            route_m[0] = start.position_m;
        }

        let route_m = simplify_polyline(route_m);
        let start_speed_ms = match route_m.get(1) {
            Some(next) => {
                let dir = (next - start.position_m).normalize();
                start.velocity_ms.dot(&dir).max(0.0)
            }
            None => 0.0,
        };

        Self::new(
            route_m,
            start_speed_ms,
            end_speed_ms,
            start.heading_rad,
            start.stamp_s,
            constraints,
        )
    }

    /// The corner points of the path, including the start and end.
    pub fn waypoints(&self) -> &[Vector2<f64>] {
        &self.points_m
    }
}

impl Path for TrapezoidalPath {
    fn duration(&self) -> f64 {
        self.duration_s
    }

    fn evaluate(&self, t_s: f64) -> RobotInstant {
        let t_s = clamp_time(t_s, self.duration_s);

        let (mut position_m, velocity_ms) = if self.segments.is_empty() {
            (self.points_m[0], Vector2::zeros())
        } else {
            // Last segment starting at or before t
            let idx = self
                .segments
                .partition_point(|s| s.start_time_s <= t_s)
                .saturating_sub(1);
            let seg = &self.segments[idx];
            let (dist, speed) = seg.profile.state_at(t_s - seg.start_time_s);

            (seg.start_m + seg.direction * dist, seg.direction * speed)
        };

        // Pin the end exactly onto the final waypoint
        if t_s >= self.duration_s {
            if let Some(last) = self.points_m.last() {
                position_m = *last;
            }
        }

        RobotInstant {
            position_m,
            heading_rad: self.heading_rad,
            velocity_ms,
            angular_vel_rads: 0.0,
            stamp_s: self.start_stamp_s + t_s,
        }
    }

    fn hit(&self, obstacles: &ObstacleSet, inflation_m: f64, from_s: f64) -> Option<f64> {
        let from_s = clamp_time(from_s, self.duration_s);
        let first = self.evaluate(from_s).position_m;

        if obstacles.contains(&first, inflation_m) {
            return Some(from_s);
        }

        // The path is made of straight segments, so checking each remaining one is exact
        let mut from_m = first;
        for seg in self.segments.iter() {
            let seg_end_s = seg.start_time_s + seg.profile.duration();
            if seg_end_s < from_s {
                continue;
            }

            let to_m = seg.start_m + seg.direction * seg.profile.distance;
            if obstacles.segment_hits(&from_m, &to_m, inflation_m) {
                return Some(seg.start_time_s.max(from_s));
            }
            from_m = to_m;
        }

        None
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Drop repeated points and merge collinear runs, keeping the first and last points.
fn simplify_polyline(points_m: Vec<Vector2<f64>>) -> Vec<Vector2<f64>> {
    let mut out: Vec<Vector2<f64>> = Vec::with_capacity(points_m.len());

    for point in points_m {
        if let Some(last) = out.last() {
            if (point - last).norm() < MIN_SEGMENT_LENGTH_M {
                continue;
            }
        }

        // If the last two kept points and this one are collinear, and we keep going forwards,
        // the middle point is redundant
        if out.len() >= 2 {
            let a = out[out.len() - 2];
            let b = out[out.len() - 1];
            let ab = (b - a).normalize();
            let bc = (point - b).normalize();
            if crate::geom::cross(&ab, &bc).abs() < COLLINEAR_TOLERANCE && ab.dot(&bc) > 0.0 {
                out.pop();
            }
        }

        out.push(point);
    }

    out
}
