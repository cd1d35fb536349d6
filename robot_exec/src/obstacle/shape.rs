//! # Obstacle shapes

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::geom;

use super::ObstacleError;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The geometry of an obstacle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Shape {
    Circle {
        centre_m: Vector2<f64>,
        radius_m: f64,
    },

    /// A simple polygon, vertices given in order (either winding).
    Polygon { vertices_m: Vec<Vector2<f64>> },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Shape {
    pub fn circle(centre_m: Vector2<f64>, radius_m: f64) -> Self {
        Shape::Circle { centre_m, radius_m }
    }

    /// Build a polygon, which must have at least 3 vertices.
    pub fn polygon(vertices_m: Vec<Vector2<f64>>) -> Result<Self, ObstacleError> {
        if vertices_m.len() < 3 {
            return Err(ObstacleError::TooFewVertices(vertices_m.len()));
        }
        Ok(Shape::Polygon { vertices_m })
    }

    /// An axis aligned box polygon between the two corners.
    pub fn rect(a: Vector2<f64>, b: Vector2<f64>) -> Self {
        let r = geom::Rect::new(a, b);
        Shape::Polygon {
            vertices_m: vec![
                r.min_m,
                Vector2::new(r.max_m.x, r.min_m.y),
                r.max_m,
                Vector2::new(r.min_m.x, r.max_m.y),
            ],
        }
    }

    /// Signed-ish distance from the shape boundary to `point`: zero or negative when inside.
    ///
    /// Inside a circle this is the true negative depth, inside a polygon it is the negative
    /// distance to the nearest edge.
    pub fn distance(&self, point: &Vector2<f64>) -> f64 {
        match self {
            Shape::Circle { centre_m, radius_m } => (point - centre_m).norm() - radius_m,
            Shape::Polygon { vertices_m } => {
                let edge_dist = edges(vertices_m)
                    .map(|(a, b)| geom::segment_point_dist(a, b, point))
                    .fold(std::f64::INFINITY, f64::min);

                if geom::point_in_polygon(vertices_m, point) {
                    -edge_dist
                } else {
                    edge_dist
                }
            }
        }
    }

    /// Minimum distance between the segment `a`-`b` and the shape, zero if they overlap.
    pub fn segment_distance(&self, a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
        match self {
            Shape::Circle { centre_m, radius_m } => {
                (geom::segment_point_dist(a, b, centre_m) - radius_m).max(0.0)
            }
            Shape::Polygon { vertices_m } => {
                // A segment wholly inside the polygon crosses no edge, so check the endpoints
                if geom::point_in_polygon(vertices_m, a) || geom::point_in_polygon(vertices_m, b)
                {
                    return 0.0;
                }

                edges(vertices_m)
                    .map(|(v0, v1)| geom::segment_segment_dist(a, b, v0, v1))
                    .fold(std::f64::INFINITY, f64::min)
            }
        }
    }

    /// The point on the shape's boundary closest to `point`, and the outward normal there.
    pub fn closest_boundary_point(&self, point: &Vector2<f64>) -> (Vector2<f64>, Vector2<f64>) {
        match self {
            Shape::Circle { centre_m, radius_m } => {
                let offset = point - centre_m;
                // At the exact centre every direction is as good as any other
                let normal = if offset.norm() > std::f64::EPSILON {
                    offset.normalize()
                } else {
                    Vector2::x()
                };
                (centre_m + normal * *radius_m, normal)
            }
            Shape::Polygon { vertices_m } => {
                let inside = geom::point_in_polygon(vertices_m, point);
                let centroid = vertices_m.iter().sum::<Vector2<f64>>() / vertices_m.len() as f64;

                let mut best = (vertices_m[0], Vector2::x());
                let mut best_dist = std::f64::INFINITY;

                for (a, b) in edges(vertices_m) {
                    let closest = geom::closest_point_on_segment(a, b, point);
                    let dist = (closest - point).norm();
                    if dist < best_dist {
                        best_dist = dist;

                        // Edge normal, flipped to point away from the centroid
                        let edge = b - a;
                        let mut normal = Vector2::new(edge.y, -edge.x);
                        if normal.norm() > std::f64::EPSILON {
                            normal.normalize_mut();
                        }
                        if normal.dot(&(closest - centroid)) < 0.0 {
                            normal = -normal;
                        }
                        best = (closest, normal);
                    }
                }

                // Outside the polygon the normal can just point from the boundary to the point
                if !inside && best_dist > std::f64::EPSILON {
                    best.1 = (point - best.0) / best_dist;
                }

                best
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Iterate over the closed edges of a polygon.
fn edges(vertices: &[Vector2<f64>]) -> impl Iterator<Item = (&Vector2<f64>, &Vector2<f64>)> {
    vertices
        .iter()
        .zip(vertices.iter().cycle().skip(1))
        .take(vertices.len())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_circle_distance() {
        let c = Shape::circle(Vector2::new(1.0, 1.0), 0.5);

        assert!((c.distance(&Vector2::new(2.0, 1.0)) - 0.5).abs() < 1e-12);
        assert!((c.distance(&Vector2::new(1.0, 1.0)) + 0.5).abs() < 1e-12);
        assert!(
            (c.segment_distance(&Vector2::new(0.0, 2.0), &Vector2::new(2.0, 2.0)) - 0.5).abs()
                < 1e-12
        );
        assert_eq!(
            c.segment_distance(&Vector2::new(0.0, 1.0), &Vector2::new(2.0, 1.0)),
            0.0
        );
    }

    #[test]
    fn test_polygon_distance() {
        let square = Shape::rect(Vector2::new(0.0, 0.0), Vector2::new(2.0, 2.0));

        assert!((square.distance(&Vector2::new(3.0, 1.0)) - 1.0).abs() < 1e-12);
        assert!((square.distance(&Vector2::new(1.0, 0.5)) + 0.5).abs() < 1e-12);

        // Segment crossing the square
        assert_eq!(
            square.segment_distance(&Vector2::new(-1.0, 1.0), &Vector2::new(3.0, 1.0)),
            0.0
        );
        // Segment wholly inside
        assert_eq!(
            square.segment_distance(&Vector2::new(0.5, 0.5), &Vector2::new(1.5, 0.5)),
            0.0
        );
        // Segment passing above
        assert!(
            (square.segment_distance(&Vector2::new(-1.0, 3.0), &Vector2::new(3.0, 3.0)) - 1.0)
                .abs()
                < 1e-12
        );

        assert!(matches!(
            Shape::polygon(vec![Vector2::zeros(), Vector2::x()]),
            Err(ObstacleError::TooFewVertices(2))
        ));
    }

    #[test]
    fn test_closest_boundary_point() {
        let square = Shape::rect(Vector2::new(0.0, 0.0), Vector2::new(2.0, 2.0));
        let (point, normal) = square.closest_boundary_point(&Vector2::new(1.0, 0.2));

        assert!((point - Vector2::new(1.0, 0.0)).norm() < 1e-12);
        assert!((normal - Vector2::new(0.0, -1.0)).norm() < 1e-12);

        let circle = Shape::circle(Vector2::new(1.0, 1.0), 0.2);
        let (point, normal) = circle.closest_boundary_point(&Vector2::new(1.1, 1.0));
        assert!((point - Vector2::new(1.2, 1.0)).norm() < 1e-12);
        assert!((normal - Vector2::x()).norm() < 1e-12);
    }
}
