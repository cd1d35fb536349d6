//! # Obstacle model
//!
//! An [`ObstacleSet`] is a snapshot of everything a robot must avoid during one planning cycle:
//! the field boundary, other robots, and exclusion zones imposed by the game state. Snapshots
//! are built fresh each cycle, wrapped in an `Arc`, and never mutated once handed to a planner.
//!
//! All collision queries take an `inflation_m`, normally the controlled robot's radius, which is
//! added to each obstacle's own margin before testing.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod shape;

pub use shape::Shape;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::geom::{self, Rect};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single obstacle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub shape: Shape,

    /// Extra clearance to keep from this obstacle, on top of the robot's own inflation.
    #[serde(default)]
    pub margin_m: f64,
}

/// An immutable snapshot of the avoidance geometry for one planning invocation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObstacleSet {
    #[serde(default)]
    pub obstacles: Vec<Obstacle>,

    /// Limits of the field. Points outside the bounds (less inflation) count as collisions.
    #[serde(default)]
    pub field_bounds: Option<Rect>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ObstacleError {
    #[error("A polygon needs at least 3 vertices, got {0}")]
    TooFewVertices(usize),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Obstacle {
    pub fn new(shape: Shape, margin_m: f64) -> Self {
        Self { shape, margin_m }
    }

    pub fn circle(centre_m: Vector2<f64>, radius_m: f64) -> Self {
        Self::new(Shape::circle(centre_m, radius_m), 0.0)
    }

    /// Clearance between `point` and this obstacle once inflated, negative when inside.
    pub fn clearance(&self, point: &Vector2<f64>, inflation_m: f64) -> f64 {
        self.shape.distance(point) - self.margin_m - inflation_m
    }

    /// True if `point` lies strictly inside this obstacle once inflated.
    pub fn contains(&self, point: &Vector2<f64>, inflation_m: f64) -> bool {
        self.clearance(point, inflation_m) < 0.0
    }

    /// True if the segment `a`-`b` passes strictly inside this obstacle once inflated.
    pub fn segment_hits(&self, a: &Vector2<f64>, b: &Vector2<f64>, inflation_m: f64) -> bool {
        self.shape.segment_distance(a, b) < self.margin_m + inflation_m
    }
}

impl ObstacleSet {
    pub fn new(obstacles: Vec<Obstacle>, field_bounds: Option<Rect>) -> Self {
        Self {
            obstacles,
            field_bounds,
        }
    }

    /// An empty snapshot with no field bounds.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    /// The area a robot of the given inflation can occupy, if the field is bounded.
    pub fn free_bounds(&self, inflation_m: f64) -> Option<Rect> {
        self.field_bounds.map(|b| b.shrunk(inflation_m))
    }

    /// True if `point` is outside the field or inside any inflated obstacle.
    pub fn contains(&self, point: &Vector2<f64>, inflation_m: f64) -> bool {
        !self.in_field(point, inflation_m) || self.containing(point, inflation_m).is_some()
    }

    /// The first obstacle that `point` is inside of, once inflated.
    pub fn containing(&self, point: &Vector2<f64>, inflation_m: f64) -> Option<&Obstacle> {
        self.obstacles
            .iter()
            .find(|o| o.contains(point, inflation_m))
    }

    /// True if the segment `a`-`b` leaves the field or passes through any inflated obstacle.
    pub fn segment_hits(&self, a: &Vector2<f64>, b: &Vector2<f64>, inflation_m: f64) -> bool {
        // The free area of the field is convex, so both endpoints being inside is enough
        if !self.in_field(a, inflation_m) || !self.in_field(b, inflation_m) {
            return true;
        }

        self.obstacles
            .iter()
            .any(|o| o.segment_hits(a, b, inflation_m))
    }

    /// The obstacle with the least clearance to `point`, and that clearance.
    pub fn nearest_obstacle(
        &self,
        point: &Vector2<f64>,
        inflation_m: f64,
    ) -> Option<(&Obstacle, f64)> {
        self.obstacles
            .iter()
            .map(|o| (o, o.clearance(point, inflation_m)))
            .fold(None, |best: Option<(&Obstacle, f64)>, (o, c)| match best {
                Some((_, best_c)) if best_c <= c => best,
                _ => Some((o, c)),
            })
    }

    fn in_field(&self, point: &Vector2<f64>, inflation_m: f64) -> bool {
        match self.free_bounds(inflation_m) {
            Some(b) => b.contains(point),
            None => true,
        }
    }
}

/// Distance between the segment and the nearest inflated obstacle, for diagnostics.
pub fn segment_clearance(
    obstacles: &ObstacleSet,
    a: &Vector2<f64>,
    b: &Vector2<f64>,
    inflation_m: f64,
) -> f64 {
    obstacles
        .obstacles
        .iter()
        .map(|o| o.shape.segment_distance(a, b) - o.margin_m - inflation_m)
        .fold(std::f64::INFINITY, f64::min)
        .min(match obstacles.free_bounds(inflation_m) {
            Some(r) => [a, b]
                .iter()
                .map(|p| {
                    (p.x - r.min_m.x)
                        .min(r.max_m.x - p.x)
                        .min(p.y - r.min_m.y)
                        .min(r.max_m.y - p.y)
                })
                .fold(std::f64::INFINITY, f64::min),
            None => std::f64::INFINITY,
        })
}

#[cfg(test)]
mod test {
    use super::*;

    fn snapshot() -> ObstacleSet {
        ObstacleSet::new(
            vec![
                Obstacle::circle(Vector2::new(1.0, 1.0), 0.2),
                Obstacle::new(
                    Shape::rect(Vector2::new(-2.0, -2.0), Vector2::new(-1.0, -1.0)),
                    0.1,
                ),
            ],
            Some(Rect::centred(9.0, 6.0)),
        )
    }

    #[test]
    fn test_contains() {
        let obs = snapshot();

        assert!(obs.contains(&Vector2::new(1.0, 1.0), 0.0));
        assert!(obs.contains(&Vector2::new(1.25, 1.0), 0.1));
        assert!(!obs.contains(&Vector2::new(1.25, 1.0), 0.0));

        // Margin on the box
        assert!(obs.contains(&Vector2::new(-0.95, -1.5), 0.0));
        assert!(!obs.contains(&Vector2::new(-0.85, -1.5), 0.0));

        // Outside the field
        assert!(obs.contains(&Vector2::new(4.45, 0.0), 0.1));
        assert!(!obs.contains(&Vector2::new(4.35, 0.0), 0.1));
    }

    #[test]
    fn test_segment_hits() {
        let obs = snapshot();

        assert!(obs.segment_hits(&Vector2::new(0.0, 1.0), &Vector2::new(2.0, 1.0), 0.0));
        assert!(!obs.segment_hits(&Vector2::new(0.0, 0.0), &Vector2::new(2.0, 0.0), 0.0));
        assert!(obs.segment_hits(&Vector2::new(0.0, 0.0), &Vector2::new(5.0, 0.0), 0.0));

        assert!(segment_clearance(&obs, &Vector2::new(0.0, 0.0), &Vector2::new(2.0, 0.0), 0.0) > 0.0);
    }

    #[test]
    fn test_nearest_obstacle() {
        let obs = snapshot();
        let point = Vector2::new(1.3, 1.0);

        let (nearest, clearance_m) = obs.nearest_obstacle(&point, 0.05).unwrap();
        assert_eq!(nearest.shape, Shape::circle(Vector2::new(1.0, 1.0), 0.2));
        assert!((clearance_m - 0.05).abs() < 1e-9);

        assert!(ObstacleSet::default().nearest_obstacle(&point, 0.0).is_none());
    }
}
