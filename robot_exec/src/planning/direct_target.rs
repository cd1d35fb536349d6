//! Straight line to a point goal

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::Arc;

use comms_if::goal::GoalSpec;

use super::{path_failure, with_facing, PlanRequest, PlannerParams, PlanningError};
use crate::path::{Path, PathRef, TrapezoidalPath};

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

pub(super) fn plan(req: &PlanRequest, params: &PlannerParams) -> Result<PathRef, PlanningError> {
    let (target_m, end_speed_ms, facing) = match &req.goal {
        GoalSpec::Point {
            target_m,
            end_speed_ms,
            facing,
        } => (*target_m, *end_speed_ms, *facing),
        _ => return Err(PlanningError::NotApplicable),
    };

    let line = TrapezoidalPath::from_instant(
        &req.start,
        vec![req.start.position_m, target_m],
        end_speed_ms,
        &req.motion,
    )
    .map_err(path_failure)?;

    if let Some(t_s) = line.hit(&req.obstacles, params.robot_radius_m, 0.0) {
        return Err(PlanningError::PlanningFailure(format!(
            "straight line hits an obstacle {:.2} s in",
            t_s
        )));
    }

    Ok(with_facing(Arc::new(line), facing, &req.rotation))
}
