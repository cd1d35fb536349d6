//! # Geometry primitives
//!
//! Value types and free functions on 2D points, segments and rectangles. Points are plain
//! `nalgebra::Vector2<f64>` in the field frame.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use rand::Rng;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An axis aligned rectangle, used for the field bounds.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min_m: Vector2<f64>,
    pub max_m: Vector2<f64>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Rect {
    /// Create a rectangle from two opposite corners, in any order.
    pub fn new(a: Vector2<f64>, b: Vector2<f64>) -> Self {
        Self {
            min_m: Vector2::new(a.x.min(b.x), a.y.min(b.y)),
            max_m: Vector2::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// A rectangle of the given size centred on the origin.
    pub fn centred(width_m: f64, height_m: f64) -> Self {
        let half = Vector2::new(width_m, height_m) * 0.5;
        Self::new(-half, half)
    }

    pub fn width(&self) -> f64 {
        self.max_m.x - self.min_m.x
    }

    pub fn height(&self) -> f64 {
        self.max_m.y - self.min_m.y
    }

    pub fn contains(&self, point: &Vector2<f64>) -> bool {
        point.x >= self.min_m.x
            && point.x <= self.max_m.x
            && point.y >= self.min_m.y
            && point.y <= self.max_m.y
    }

    /// Clamp the point into the rectangle.
    pub fn clamp(&self, point: &Vector2<f64>) -> Vector2<f64> {
        Vector2::new(
            point.x.max(self.min_m.x).min(self.max_m.x),
            point.y.max(self.min_m.y).min(self.max_m.y),
        )
    }

    /// Shrink the rectangle by `margin_m` on every side.
    ///
    /// A margin larger than half the width or height collapses that axis onto the centre line.
    pub fn shrunk(&self, margin_m: f64) -> Self {
        let centre = (self.min_m + self.max_m) * 0.5;
        let half_w = (self.width() * 0.5 - margin_m).max(0.0);
        let half_h = (self.height() * 0.5 - margin_m).max(0.0);
        let half = Vector2::new(half_w, half_h);

        Self {
            min_m: centre - half,
            max_m: centre + half,
        }
    }

    /// Draw a point uniformly from inside the rectangle.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vector2<f64> {
        Vector2::new(
            sample_range(rng, self.min_m.x, self.max_m.x),
            sample_range(rng, self.min_m.y, self.max_m.y),
        )
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Closest point to `point` on the segment `a`-`b`.
pub fn closest_point_on_segment(
    a: &Vector2<f64>,
    b: &Vector2<f64>,
    point: &Vector2<f64>,
) -> Vector2<f64> {
    let ab = b - a;
    let len_sq = ab.norm_squared();

    if len_sq <= std::f64::EPSILON {
        return *a;
    }

    let t = ((point - a).dot(&ab) / len_sq).max(0.0).min(1.0);
    a + ab * t
}

/// Distance between `point` and the segment `a`-`b`.
pub fn segment_point_dist(a: &Vector2<f64>, b: &Vector2<f64>, point: &Vector2<f64>) -> f64 {
    (closest_point_on_segment(a, b, point) - point).norm()
}

/// True if the segments `a0`-`a1` and `b0`-`b1` touch or cross.
pub fn segments_intersect(
    a0: &Vector2<f64>,
    a1: &Vector2<f64>,
    b0: &Vector2<f64>,
    b1: &Vector2<f64>,
) -> bool {
    let d1 = cross(&(b1 - b0), &(a0 - b0));
    let d2 = cross(&(b1 - b0), &(a1 - b0));
    let d3 = cross(&(a1 - a0), &(b0 - a0));
    let d4 = cross(&(a1 - a0), &(b1 - a0));

    // Proper crossing, each segment straddles the other
    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    // Collinear or touching cases
    (d1 == 0.0 && on_segment(b0, b1, a0))
        || (d2 == 0.0 && on_segment(b0, b1, a1))
        || (d3 == 0.0 && on_segment(a0, a1, b0))
        || (d4 == 0.0 && on_segment(a0, a1, b1))
}

/// Minimum distance between the segments `a0`-`a1` and `b0`-`b1`.
pub fn segment_segment_dist(
    a0: &Vector2<f64>,
    a1: &Vector2<f64>,
    b0: &Vector2<f64>,
    b1: &Vector2<f64>,
) -> f64 {
    if segments_intersect(a0, a1, b0, b1) {
        return 0.0;
    }

    segment_point_dist(a0, a1, b0)
        .min(segment_point_dist(a0, a1, b1))
        .min(segment_point_dist(b0, b1, a0))
        .min(segment_point_dist(b0, b1, a1))
}

/// True if `point` lies inside the polygon described by `vertices` (ray casting).
pub fn point_in_polygon(vertices: &[Vector2<f64>], point: &Vector2<f64>) -> bool {
    if vertices.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let vi = &vertices[i];
        let vj = &vertices[j];

        if (vi.y > point.y) != (vj.y > point.y)
            && point.x < (vj.x - vi.x) * (point.y - vi.y) / (vj.y - vi.y) + vi.x
        {
            inside = !inside;
        }

        j = i;
    }

    inside
}

/// The z component of the 3D cross product of two planar vectors.
pub fn cross(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Heading of a vector, the angle to the +ve X axis.
pub fn heading_of(vec: &Vector2<f64>) -> f64 {
    vec.y.atan2(vec.x)
}

fn on_segment(a: &Vector2<f64>, b: &Vector2<f64>, point: &Vector2<f64>) -> bool {
    point.x >= a.x.min(b.x)
        && point.x <= a.x.max(b.x)
        && point.y >= a.y.min(b.y)
        && point.y <= a.y.max(b.y)
}

fn sample_range<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64) -> f64 {
    if max > min {
        rng.gen_range(min..max)
    } else {
        min
    }
}
