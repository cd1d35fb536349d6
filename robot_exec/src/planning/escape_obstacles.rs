//! Leave an obstacle the robot has ended up inside
//!
//! The robot can be pushed into an obstacle's inflated area by contact with other robots, or an
//! exclusion zone can appear around it. No other planner will start from inside an obstacle, so
//! this one drives straight out to the nearest free point, ignoring the obstacle it is in.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{f64::consts::PI, sync::Arc};

use log::debug;
use nalgebra::Vector2;

use super::{path_failure, PlanRequest, PlannerParams, PlanningError};
use crate::{
    geom::heading_of,
    obstacle::ObstacleSet,
    path::{PathRef, TrapezoidalPath},
};

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

pub(super) fn plan(req: &PlanRequest, params: &PlannerParams) -> Result<PathRef, PlanningError> {
    let start_m = req.start.position_m;
    let inflation_m = params.robot_radius_m;

    if !req.obstacles.contains(&start_m, inflation_m) {
        return Err(PlanningError::NotApplicable);
    }

    let escape_m = escape_point(&req.obstacles, &start_m, params).ok_or_else(|| {
        PlanningError::PlanningFailure(format!(
            "no free point within {} m of ({:.3}, {:.3})",
            params.escape.max_search_radius_m, start_m.x, start_m.y
        ))
    })?;

    let clearance_m = req
        .obstacles
        .nearest_obstacle(&escape_m, inflation_m)
        .map(|(_, c)| c)
        .unwrap_or(std::f64::INFINITY);
    debug!(
        "Escaping from ({:.3}, {:.3}) to ({:.3}, {:.3}), {:.3} m clear of the nearest obstacle",
        start_m.x, start_m.y, escape_m.x, escape_m.y, clearance_m
    );

    // Heading is left as it is, getting out matters more than facing the right way
    let path = TrapezoidalPath::from_instant(&req.start, vec![start_m, escape_m], 0.0, &req.motion)
        .map_err(path_failure)?;

    Ok(Arc::new(path))
}

/// Find the nearest point from which the robot is clear of every obstacle.
///
/// The point straight out through the nearest boundary of the obstacle we're in is tried first,
/// then rings of increasing radius around the start are searched, starting with the direction
/// out of the obstacle.
fn escape_point(
    obstacles: &ObstacleSet,
    start_m: &Vector2<f64>,
    params: &PlannerParams,
) -> Option<Vector2<f64>> {
    let inflation_m = params.robot_radius_m;
    let escape = &params.escape;
    let is_free = |p: &Vector2<f64>| !obstacles.contains(p, inflation_m + escape.clearance_m);

    // Preferred direction and first guess
    let (guess_m, out_dir) = match obstacles.containing(start_m, inflation_m) {
        Some(obstacle) => {
            let (boundary_m, normal) = obstacle.shape.closest_boundary_point(start_m);
            let guess_m =
                boundary_m + normal * (obstacle.margin_m + inflation_m + 2.0 * escape.clearance_m);
            (Some(guess_m), normal)
        }
        // Outside the field, head back in
        None => match obstacles.free_bounds(inflation_m + 2.0 * escape.clearance_m) {
            Some(bounds) => {
                let guess_m = bounds.clamp(start_m);
                (Some(guess_m), guess_m - start_m)
            }
            None => (None, Vector2::x()),
        },
    };

    if let Some(g) = guess_m {
        if is_free(&g) {
            return Some(g);
        }
    }

    let base_angle = heading_of(&out_dir);
    let num_points = escape.num_ring_points.max(1);
    let angle_step = 2.0 * PI / num_points as f64;
    let num_rings = (escape.max_search_radius_m / escape.search_step_m).floor() as usize;

    for ring in 1..=num_rings {
        let radius_m = ring as f64 * escape.search_step_m;

        // Alternate either side of the preferred direction: 0, +1, -1, +2, ...
        for k in 0..num_points {
            let offset = ((k + 1) / 2) as f64 * if k % 2 == 0 { -1.0 } else { 1.0 };
            let angle = base_angle + offset * angle_step;
            let candidate_m = start_m + Vector2::new(angle.cos(), angle.sin()) * radius_m;

            if is_free(&candidate_m) {
                return Some(candidate_m);
            }
        }
    }

    None
}
