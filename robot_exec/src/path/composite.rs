//! # Composite path
//!
//! A sequence of sub-paths followed one after the other. Each sub-path is evaluated in its own
//! local time, and the stamps of the returned instants are rewritten onto the composite's
//! timeline.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::robot::RobotInstant;

use super::{clamp_time, Path, PathError, PathRef};
use crate::obstacle::ObstacleSet;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CompositePath {
    parts: Vec<PathRef>,

    /// Composite time at which each part starts
    offsets_s: Vec<f64>,

    duration_s: f64,
    start_stamp_s: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CompositePath {
    pub fn new(parts: Vec<PathRef>) -> Result<Self, PathError> {
        let start_stamp_s = match parts.first() {
            Some(p) => p.start().stamp_s,
            None => return Err(PathError::EmptySequence),
        };

        let mut offsets_s = Vec::with_capacity(parts.len());
        let mut duration_s = 0.0;
        for part in parts.iter() {
            offsets_s.push(duration_s);
            duration_s += part.duration();
        }

        Ok(Self {
            parts,
            offsets_s,
            duration_s,
            start_stamp_s,
        })
    }

    /// Number of sub-paths.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Index of the part covering composite time `t_s`.
    ///
    /// At a boundary the later part wins, except at the very end where the last part is used.
    fn part_at(&self, t_s: f64) -> usize {
        self.offsets_s
            .partition_point(|o| *o <= t_s)
            .saturating_sub(1)
    }
}

impl Path for CompositePath {
    fn duration(&self) -> f64 {
        self.duration_s
    }

    fn evaluate(&self, t_s: f64) -> RobotInstant {
        let t_s = clamp_time(t_s, self.duration_s);
        let idx = self.part_at(t_s);

        let mut inst = self.parts[idx].evaluate(t_s - self.offsets_s[idx]);
        inst.stamp_s = self.start_stamp_s + t_s;
        inst
    }

    fn hit(&self, obstacles: &ObstacleSet, inflation_m: f64, from_s: f64) -> Option<f64> {
        let from_s = clamp_time(from_s, self.duration_s);
        let first = self.part_at(from_s);

        for idx in first..self.parts.len() {
            let offset_s = self.offsets_s[idx];
            let local_from_s = (from_s - offset_s).max(0.0);

            if let Some(t_s) = self.parts[idx].hit(obstacles, inflation_m, local_from_s) {
                return Some(offset_s + t_s);
            }
        }

        None
    }
}
