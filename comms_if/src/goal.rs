//! # Motion goals
//!
//! A goal describes *where* the behaviour layer wants a robot to be. How the robot gets there is
//! up to the planners.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use util::maths::ang_dist;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The goal of a single robot.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GoalSpec {
    /// Drive to a target position, arriving with the given speed along the final approach.
    Point {
        target_m: Vector2<f64>,

        #[serde(default)]
        end_speed_ms: f64,

        #[serde(default)]
        facing: Facing,
    },

    /// Match the given field-frame velocity, for chasing or intercepting.
    Velocity {
        velocity_ms: Vector2<f64>,

        #[serde(default)]
        facing: Facing,
    },

    /// Stay where we are and turn to the given heading.
    Heading { heading_rad: f64 },
}

/// How the robot should orient itself while following a path.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum Facing {
    /// Face along the direction of travel, keeping the current heading when stationary.
    Travel,

    /// Hold a fixed heading.
    Heading(f64),

    /// Keep facing a point in the field frame.
    Point(Vector2<f64>),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl GoalSpec {
    /// Goal to stop at the given target, facing along the direction of travel.
    pub fn point(target_m: Vector2<f64>) -> Self {
        GoalSpec::Point {
            target_m,
            end_speed_ms: 0.0,
            facing: Facing::Travel,
        }
    }

    /// The target position of this goal, if it has one.
    pub fn target_position(&self) -> Option<Vector2<f64>> {
        match self {
            GoalSpec::Point { target_m, .. } => Some(*target_m),
            _ => None,
        }
    }

    /// The facing requested by this goal.
    pub fn facing(&self) -> Facing {
        match self {
            GoalSpec::Point { facing, .. } | GoalSpec::Velocity { facing, .. } => *facing,
            GoalSpec::Heading { heading_rad } => Facing::Heading(*heading_rad),
        }
    }

    /// True if `other` asks for the same thing as this goal, to within `tolerance`.
    ///
    /// Used to decide whether a previously planned path still leads to the goal.
    pub fn same_as(&self, other: &GoalSpec, tolerance: f64) -> bool {
        match (self, other) {
            (
                GoalSpec::Point {
                    target_m: a,
                    end_speed_ms: sa,
                    facing: fa,
                },
                GoalSpec::Point {
                    target_m: b,
                    end_speed_ms: sb,
                    facing: fb,
                },
            ) => {
                (a - b).norm() <= tolerance
                    && (sa - sb).abs() <= tolerance
                    && fa.same_as(fb, tolerance)
            }
            (
                GoalSpec::Velocity {
                    velocity_ms: a,
                    facing: fa,
                },
                GoalSpec::Velocity {
                    velocity_ms: b,
                    facing: fb,
                },
            ) => (a - b).norm() <= tolerance && fa.same_as(fb, tolerance),
            (GoalSpec::Heading { heading_rad: a }, GoalSpec::Heading { heading_rad: b }) => {
                ang_dist(*a, *b).abs() <= tolerance
            }
            _ => false,
        }
    }
}

impl Facing {
    /// True if `other` is the same facing to within `tolerance`, comparing headings the short
    /// way round.
    pub fn same_as(&self, other: &Facing, tolerance: f64) -> bool {
        match (self, other) {
            (Facing::Travel, Facing::Travel) => true,
            (Facing::Heading(a), Facing::Heading(b)) => ang_dist(*a, *b).abs() <= tolerance,
            (Facing::Point(a), Facing::Point(b)) => (a - b).norm() <= tolerance,
            _ => false,
        }
    }
}

impl Default for Facing {
    fn default() -> Self {
        Facing::Travel
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_same_as() {
        let a = GoalSpec::point(Vector2::new(1.0, 1.0));
        let b = GoalSpec::point(Vector2::new(1.0, 1.005));
        let c = GoalSpec::point(Vector2::new(2.0, 1.0));

        assert!(a.same_as(&b, 0.01));
        assert!(!a.same_as(&c, 0.01));
        assert!(!a.same_as(&GoalSpec::Heading { heading_rad: 0.0 }, 0.01));
    }

    #[test]
    fn test_same_as_wraps_headings() {
        let pi = std::f64::consts::PI;

        let a = GoalSpec::Heading { heading_rad: pi };
        let b = GoalSpec::Heading {
            heading_rad: -pi + 0.001,
        };
        assert!(a.same_as(&b, 0.01));
        assert!(!a.same_as(&GoalSpec::Heading { heading_rad: 0.0 }, 0.01));

        let facing_a = GoalSpec::Point {
            target_m: Vector2::new(1.0, 1.0),
            end_speed_ms: 0.0,
            facing: Facing::Heading(-pi),
        };
        let facing_b = GoalSpec::Point {
            target_m: Vector2::new(1.0, 1.0),
            end_speed_ms: 0.0,
            facing: Facing::Heading(pi),
        };
        assert!(facing_a.same_as(&facing_b, 0.01));
        assert!(!Facing::Travel.same_as(&Facing::Heading(0.0), 0.01));
    }

    #[test]
    fn test_deserialise_point_defaults() {
        let goal: GoalSpec =
            serde_json::from_str(r#"{"type": "Point", "target_m": [1.0, 2.0]}"#).unwrap();

        assert_eq!(goal, GoalSpec::point(Vector2::new(1.0, 2.0)));
    }
}
